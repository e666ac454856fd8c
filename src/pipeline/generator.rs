/// 事件生成阶段 (Event Generation)
/// 职责: 队列A取帧 → 模拟器 → 事件批次推入队列B
use super::{recv, send};
use crate::error::{PipelineError, Result};
use crate::queue::BoundedQueue;
use crate::simulator::EventSimulator;
use crate::stats::StageStats;
use crate::types::{EventBatch, Frame};
use std::time::Duration;
use tracing::{debug, info};

pub const STAGE: &str = "generate";

pub struct EventGenerationStage<S> {
    simulator: S,
    fps: f64,
    frame_count: u64,
    stall_timeout: Option<Duration>,
}

impl<S: EventSimulator> EventGenerationStage<S> {
    pub fn new(simulator: S, fps: f64, frame_count: u64) -> Self {
        Self {
            simulator,
            fps,
            frame_count,
            stall_timeout: None,
        }
    }

    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// 第 `frame_number` 帧的时间戳 (毫秒)
    pub fn timestamp_ms(&self, frame_number: u64) -> f64 {
        1e3 * frame_number as f64 / self.fps
    }

    /// 处理全部 frame_count 帧, 返回产生的事件总数
    pub fn run(
        &mut self,
        input: &BoundedQueue<Frame>,
        output: &BoundedQueue<EventBatch>,
    ) -> Result<u64> {
        info!("事件生成线程启动");
        let mut stats = StageStats::new(STAGE);
        let mut total_events = 0u64;

        for frame_number in 0..self.frame_count {
            let time_msec = self.timestamp_ms(frame_number);
            let frame = recv(input, self.stall_timeout, STAGE)?;
            debug_assert_eq!(frame.index, frame_number);

            // 模拟器失败是致命错误, 不能用空批次占位
            let events = self
                .simulator
                .simulate(&frame, time_msec)
                .map_err(|e| PipelineError::Simulator {
                    frame: frame_number,
                    reason: format!("{:#}", e),
                })?;
            drop(frame);

            debug!(frame = frame_number, events = events.len(), "事件批次");
            total_events += events.len() as u64;
            send(output, EventBatch::new(frame_number, events), STAGE)?;
            stats.tick(self.frame_count);
        }

        output.close();
        info!(events = total_events, "事件生成线程退出");
        Ok(total_events)
    }
}
