/// 视频输入系统 (Video Input System)
///
/// - FrameSource: 顺序读帧的抽象 (元数据 + 逐帧读取)
/// - FfmpegSource: 基于 ez-ffmpeg 的本地视频文件解码
/// - GrayFilter:  FFmpeg帧过滤器, 解码帧 → 归一化灰度帧
pub mod decode_filter;
pub mod decoder;

pub use decode_filter::GrayFilter;
pub use decoder::{probe, FfmpegSource};

use crate::error::Result;
use crate::types::{Frame, VideoMetadata};

/// 顺序视频源
///
/// `read_next_frame` 返回 `Ok(None)` 表示流结束。
pub trait FrameSource {
    fn metadata(&self) -> VideoMetadata;

    fn read_next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn metadata(&self) -> VideoMetadata {
        (**self).metadata()
    }

    fn read_next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).read_next_frame()
    }
}
