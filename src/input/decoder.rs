/// 本地视频文件解码器
/// Local video file decoder built on ez-ffmpeg
///
/// 探测元数据后在独立线程中运行FFmpeg, 解码帧经有界通道交给 `read_next_frame`。
use super::decode_filter::GrayFilter;
use super::FrameSource;
use crate::error::{PipelineError, Result};
use crate::types::{Frame, VideoMetadata};
use crossbeam_channel::{bounded, Receiver};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext};
use std::path::Path;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// 解码线程与读取端之间的缓冲帧数
const DECODE_BUFFER: usize = 8;

/// 读取视频元数据 (帧率 / 帧数 / 分辨率)
pub fn probe(path: &Path) -> Result<VideoMetadata> {
    if !path.is_file() {
        return Err(PipelineError::SourceUnavailable(format!(
            "{} does not exist",
            path.display()
        )));
    }

    let url = path.to_string_lossy().to_string();
    let info = find_video_stream_info(url.as_str())
        .map_err(|e| PipelineError::SourceUnavailable(format!("{}: {}", url, e)))?
        .ok_or_else(|| PipelineError::SourceUnavailable(format!("{}: no video stream", url)))?;

    let StreamInfo::Video {
        fps,
        nb_frames,
        width,
        height,
        ..
    } = info
    else {
        return Err(PipelineError::SourceUnavailable(format!(
            "{}: no video stream",
            url
        )));
    };

    if nb_frames <= 0 {
        return Err(PipelineError::SourceUnavailable(format!(
            "{}: source reports zero frames",
            url
        )));
    }
    if width <= 0 || height <= 0 {
        return Err(PipelineError::SourceUnavailable(format!(
            "{}: invalid frame size {}x{}",
            url, width, height
        )));
    }
    if !(fps > 0.0 && fps.is_finite()) {
        return Err(PipelineError::SourceUnavailable(format!(
            "{}: invalid frame rate {}",
            url, fps
        )));
    }

    Ok(VideoMetadata {
        fps,
        frame_count: nb_frames as u64,
        width: width as u32,
        height: height as u32,
    })
}

/// 视频文件帧源
pub struct FfmpegSource {
    metadata: VideoMetadata,
    rx: Option<Receiver<Frame>>,
    decode_thread: Option<JoinHandle<std::result::Result<(), String>>>,
    delivered: u64,
}

impl FfmpegSource {
    /// 打开视频文件; `max_frames` 限制最多解码的帧数
    pub fn open(path: &Path, max_frames: Option<u64>) -> Result<Self> {
        let mut metadata = probe(path)?;
        if let Some(max) = max_frames {
            metadata.frame_count = metadata.frame_count.min(max);
        }
        info!(
            "视频源: {} | {}x{} | {:.2} fps | {} 帧",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.frame_count
        );

        let (tx, rx) = bounded::<Frame>(DECODE_BUFFER);
        let filter = GrayFilter::new(tx, metadata.frame_count);
        let url = path.to_string_lossy().to_string();

        let decode_thread = std::thread::Builder::new()
            .name("esim-decode".into())
            .spawn(move || software_decode(&url, filter))
            .map_err(|e| PipelineError::SourceUnavailable(e.to_string()))?;

        Ok(Self {
            metadata,
            rx: Some(rx),
            decode_thread: Some(decode_thread),
            delivered: 0,
        })
    }

    /// 解码线程结束后取回其结果
    fn finish_decode(&mut self) -> Result<()> {
        let Some(handle) = self.decode_thread.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(Ok(())) => Ok(()),
            // 达到帧数上限时过滤器主动结束解码
            Ok(Err(_)) if self.delivered >= self.metadata.frame_count => Ok(()),
            Ok(Err(e)) => Err(PipelineError::SourceUnavailable(e)),
            Err(_) => Err(PipelineError::SourceUnavailable(
                "decode thread panicked".into(),
            )),
        }
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn read_next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(rx) = self.rx.as_ref() else {
            return Ok(None);
        };
        match rx.recv() {
            Ok(frame) => {
                self.delivered += 1;
                Ok(Some(frame))
            }
            Err(_) => {
                self.rx = None;
                self.finish_decode()?;
                Ok(None)
            }
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // 先关闭接收端, 解码线程的下一次发送失败后退出
        self.rx.take();
        if let Some(handle) = self.decode_thread.take() {
            if handle.join().is_err() {
                warn!("解码线程异常退出");
            }
        }
    }
}

/// CPU软件解码, 输出灰度帧
fn software_decode(url: &str, filter: GrayFilter) -> std::result::Result<(), String> {
    debug!("使用CPU软件解码: {}", url);

    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("gray", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(url)
        .filter_desc("format=gray")
        .output(out)
        .build()
        .map_err(|e| format!("构建失败: {}", e))?;

    let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
    sch.wait().map_err(|e| format!("解码失败: {}", e))?;
    Ok(())
}
