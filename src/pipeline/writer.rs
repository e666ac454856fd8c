/// 写出阶段 (Video Sink)
/// 职责: 队列C取渲染帧 → 按序写入输出视频
///
/// 输出资源在本阶段内打开, 无论成功、失败还是被取消都会关闭。
/// 始终取出全部 frame_count 帧, 由 `OutputWindow` 决定哪些写出。
use super::recv;
use crate::config::OutputWindow;
use crate::error::Result;
use crate::output::VideoSink;
use crate::queue::BoundedQueue;
use crate::stats::StageStats;
use crate::types::RenderedFrame;
use std::time::Duration;
use tracing::{debug, info};

pub const STAGE: &str = "write";

pub struct VideoSinkStage {
    frame_count: u64,
    window: OutputWindow,
    stall_timeout: Option<Duration>,
}

impl VideoSinkStage {
    pub fn new(frame_count: u64, window: OutputWindow) -> Self {
        Self {
            frame_count,
            window,
            stall_timeout: None,
        }
    }

    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// 打开输出并写出窗口内的帧, 返回写出帧数
    pub fn run<S, F>(&self, input: &BoundedQueue<RenderedFrame>, open: F) -> Result<u64>
    where
        S: VideoSink,
        F: FnOnce() -> Result<S>,
    {
        let mut sink = open()?;
        info!("写出线程启动");

        let written = self.write_all(input, &mut sink);
        let closed = sink.close();

        let written = written?;
        closed?;
        info!(frames = written, "写出线程退出");
        Ok(written)
    }

    fn write_all<S: VideoSink>(
        &self,
        input: &BoundedQueue<RenderedFrame>,
        sink: &mut S,
    ) -> Result<u64> {
        let total = self.window.written(self.frame_count);
        let mut stats = StageStats::new(STAGE);
        let mut written = 0u64;

        for frame_number in 0..self.frame_count {
            let frame = recv(input, self.stall_timeout, STAGE)?;
            debug_assert_eq!(frame.index, frame_number);

            if self.window.includes(frame_number, self.frame_count) {
                sink.write_frame(&frame)?;
                written += 1;
                debug!("wrote {}/{}", written, total);
            }
            stats.tick(self.frame_count);
        }

        Ok(written)
    }
}
