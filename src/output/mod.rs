/// 视频输出 (Video Output)
///
/// - VideoSink:     顺序写帧的抽象, 保证在所有退出路径上关闭
/// - FfmpegEncoder: 将RGB原始帧通过管道交给 `ffmpeg` 编码
pub mod encoder;

pub use encoder::FfmpegEncoder;

use crate::error::Result;
use crate::types::RenderedFrame;
use std::path::PathBuf;

/// 输出视频参数
#[derive(Clone, Debug, PartialEq)]
pub struct OutputSpec {
    pub path: PathBuf,
    pub codec: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

pub trait VideoSink {
    fn write_frame(&mut self, frame: &RenderedFrame) -> Result<()>;

    /// 结束写出; 重复调用无副作用
    fn close(&mut self) -> Result<()>;
}

impl<S: VideoSink + ?Sized> VideoSink for Box<S> {
    fn write_frame(&mut self, frame: &RenderedFrame) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
