//! 首错终止: 记录第一个根因错误并中止所有队列

use crate::error::PipelineError;
use crate::queue::BoundedQueue;
use crate::types::{EventBatch, Frame, RenderedFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::error;

/// 流水线的三个队列
pub struct Queues {
    pub frames: BoundedQueue<Frame>,
    pub batches: BoundedQueue<EventBatch>,
    pub rendered: BoundedQueue<RenderedFrame>,
}

impl Queues {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: BoundedQueue::new(capacity),
            batches: BoundedQueue::new(capacity),
            rendered: BoundedQueue::new(capacity),
        }
    }

    pub fn abort_all(&self) {
        self.frames.abort();
        self.batches.abort();
        self.rendered.abort();
    }
}

pub struct Shutdown<'a> {
    queues: &'a Queues,
    cancelled: AtomicBool,
    first_error: Mutex<Option<PipelineError>>,
}

impl<'a> Shutdown<'a> {
    pub fn new(queues: &'a Queues) -> Self {
        Self {
            queues,
            cancelled: AtomicBool::new(false),
            first_error: Mutex::new(None),
        }
    }

    /// 报告失败并中止流水线; 取消类错误不会覆盖根因
    pub fn fail(&self, err: PipelineError) {
        if !err.is_cancellation() {
            let mut slot = self
                .first_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                error!("流水线失败: {}", err);
                *slot = Some(err);
            }
        }
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.queues.abort_all();
        }
    }

    pub fn queues(&self) -> &'a Queues {
        self.queues
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn take_error(&self) -> Option<PipelineError> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// 工作线程守卫: 线程panic时中止流水线, 避免其他阶段永久阻塞
    pub fn guard(&self, stage: &'static str) -> PanicGuard<'_, 'a> {
        PanicGuard {
            shutdown: self,
            stage,
        }
    }
}

pub struct PanicGuard<'s, 'a> {
    shutdown: &'s Shutdown<'a>,
    stage: &'static str,
}

impl Drop for PanicGuard<'_, '_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shutdown.fail(PipelineError::WorkerPanicked(self.stage));
        }
    }
}
