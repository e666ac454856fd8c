/// ffmpeg 编码器
/// Streams rgb24 frames to an `ffmpeg` child process
use super::{OutputSpec, VideoSink};
use crate::error::{PipelineError, Result};
use crate::types::RenderedFrame;
use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use tracing::{debug, info, warn};

pub struct FfmpegEncoder {
    spec: OutputSpec,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames_written: u64,
}

impl FfmpegEncoder {
    pub fn open(spec: &OutputSpec) -> Result<Self> {
        let open_err = |reason: String| PipelineError::SinkOpen {
            path: spec.path.display().to_string(),
            reason,
        };

        if spec.width == 0 || spec.height == 0 {
            return Err(open_err(format!(
                "invalid frame size {}x{}",
                spec.width, spec.height
            )));
        }

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y", "-nostdin"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{}x{}", spec.width, spec.height))
            .arg("-r")
            .arg(format!("{}", spec.fps))
            .args(["-i", "-", "-an"])
            .arg("-c:v")
            .arg(&spec.codec)
            // yuv420p 要求偶数尺寸
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2", "-pix_fmt", "yuv420p"])
            .arg(&spec.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| open_err(format!("cannot start ffmpeg: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| open_err("ffmpeg stdin unavailable".into()))?;

        info!(
            "输出视频: {} | {} | {}x{} @ {:.2} fps",
            spec.path.display(),
            spec.codec,
            spec.width,
            spec.height,
            spec.fps
        );

        Ok(Self {
            spec: spec.clone(),
            child: Some(child),
            stdin: Some(stdin),
            frames_written: 0,
        })
    }
}

impl VideoSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &RenderedFrame) -> Result<()> {
        let write_err = |reason: String| PipelineError::SinkWrite {
            frame: frame.index,
            reason,
        };

        if frame.width() != self.spec.width || frame.height() != self.spec.height {
            return Err(write_err(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.spec.width,
                self.spec.height
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| write_err("encoder already closed".into()))?;
        stdin
            .write_all(frame.image.as_raw())
            .map_err(|e| write_err(e.to_string()))?;

        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // 关闭stdin让ffmpeg收尾
        self.stdin.take();
        let Some(child) = self.child.take() else {
            return Ok(());
        };

        let output = child.wait_with_output().map_err(|e| PipelineError::SinkWrite {
            frame: self.frames_written,
            reason: e.to_string(),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::SinkWrite {
                frame: self.frames_written,
                reason: format!("ffmpeg exited with {}: {}", output.status, stderr.trim()),
            });
        }

        debug!(frames = self.frames_written, "编码器已关闭");
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.close() {
                warn!("关闭编码器失败: {}", e);
            }
        }
    }
}
