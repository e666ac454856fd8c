/// 事件视频处理流水线 (Event Video Pipeline)
///
/// 四个并发执行单元, 通过三个有界阻塞队列单向连接:
/// - 采集:     FrameSource 读帧 (协调线程)          → 队列A
/// - 事件生成: 队列A → 模拟器 → 事件批次            → 队列B
/// - 事件渲染: 队列B → 三通道可视化帧               → 队列C
/// - 写出:     队列C → VideoSink
///
/// 每个阶段恰好处理 frame_count 个元素, 各队列FIFO保证端到端按帧序号有序。
/// 任一阶段失败时中止全部队列, 所有阻塞的阶段被唤醒并退出。
pub mod coordinator;
pub mod generator;
pub mod renderer;
pub mod shutdown;
pub mod writer;

pub use coordinator::{PipelineCoordinator, PipelineReport};
pub use generator::EventGenerationStage;
pub use renderer::{render_events, EventRenderingStage};
pub use shutdown::{Queues, Shutdown};
pub use writer::VideoSinkStage;

use crate::error::{PipelineError, Result};
use crate::queue::{BoundedQueue, PopError};
use std::time::Duration;

/// 从上游取一个元素; 队列被中止视为取消, 超时视为停滞
pub(crate) fn recv<T>(
    queue: &BoundedQueue<T>,
    stall_timeout: Option<Duration>,
    stage: &'static str,
) -> Result<T> {
    match stall_timeout {
        Some(timeout) => queue.pop_timeout(timeout).map_err(|e| match e {
            PopError::Closed => PipelineError::Cancelled(stage),
            PopError::Timeout => PipelineError::Stalled { stage, timeout },
        }),
        None => queue.pop().map_err(|_| PipelineError::Cancelled(stage)),
    }
}

/// 向下游推送; 队列已关闭说明流水线正在中止
pub(crate) fn send<T>(queue: &BoundedQueue<T>, item: T, stage: &'static str) -> Result<()> {
    queue
        .push(item)
        .map_err(|_| PipelineError::Cancelled(stage))
}
