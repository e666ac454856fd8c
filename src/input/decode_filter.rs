/// FFmpeg解码过滤器模块
/// FFmpeg decode filter: gray8 frames → normalized `Frame`
use crate::types::Frame;
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame as AvFrame};
use tracing::{debug, warn};

/// 解码过滤器: 视频文件 → 灰度帧
///
/// 上游滤镜链为 `format=gray`, 因此 data[0] 即为8位亮度平面。
pub struct GrayFilter {
    tx: Option<Sender<Frame>>,
    next_index: u64,
    limit: u64,
}

impl GrayFilter {
    /// `limit`: 最多送出的帧数, 之后让解码结束
    pub fn new(tx: Sender<Frame>, limit: u64) -> Self {
        Self {
            tx: Some(tx),
            next_index: 0,
            limit,
        }
    }
}

/// 行跨度必须为正且不小于宽度, 负跨度 (倒置帧) 不支持
fn row_stride(linesize: i32, width: usize) -> Option<usize> {
    usize::try_from(linesize).ok().filter(|&stride| stride >= width)
}

impl FrameFilter for GrayFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: AvFrame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<AvFrame>, String> {
        if self.next_index >= self.limit {
            return Err("frame limit reached".to_string());
        }

        let gray = unsafe {
            if frame.as_ptr().is_null() {
                return Ok(Some(frame));
            }

            let w = (*frame.as_ptr()).width as usize;
            let h = (*frame.as_ptr()).height as usize;
            let plane = (*frame.as_ptr()).data[0];
            let linesize = (*frame.as_ptr()).linesize[0];

            if w == 0 || h == 0 || plane.is_null() {
                return Err(format!(
                    "undecodable frame #{} ({}x{})",
                    self.next_index, w, h
                ));
            }
            let Some(stride) = row_stride(linesize, w) else {
                return Err(format!(
                    "unsupported stride {} for frame #{} (width {})",
                    linesize, self.next_index, w
                ));
            };

            // 按行拷贝, 去掉行尾填充
            let mut data = Vec::with_capacity(w * h);
            for y in 0..h {
                let row = std::slice::from_raw_parts(plane.add(y * stride), w);
                data.extend_from_slice(row);
            }
            Frame::from_gray8(self.next_index, w as u32, h as u32, &data)
        };

        let Some(gray) = gray else {
            return Err(format!("bad gray plane for frame #{}", self.next_index));
        };

        let Some(tx) = self.tx.as_ref() else {
            return Err("decoder output closed".to_string());
        };
        if tx.send(gray).is_err() {
            // 消费端已放弃 (流水线结束或取消)
            return Err("frame receiver dropped".to_string());
        }
        self.next_index += 1;

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        // 关闭通道即流结束
        self.tx.take();
        if self.next_index == 0 {
            warn!("解码线程退出, 未产出任何帧");
        } else {
            debug!(frames = self.next_index, "解码线程退出");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_stride() {
        assert_eq!(row_stride(64, 64), Some(64));
        assert_eq!(row_stride(128, 100), Some(128));
        assert_eq!(row_stride(-64, 64), None);
        assert_eq!(row_stride(32, 64), None);
        assert_eq!(row_stride(0, 1), None);
    }
}
