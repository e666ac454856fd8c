/// 流水线错误类型
/// Pipeline error taxonomy
use std::time::Duration;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    /// 输入视频无法打开或首帧不可读
    #[error("video source unavailable: {0}")]
    SourceUnavailable(String),

    /// 解码在 frame_count 之前结束
    #[error("video source ended after {got} of {expected} frames")]
    SourceExhausted { expected: u64, got: u64 },

    #[error("event simulator failed on frame {frame}: {reason}")]
    Simulator { frame: u64, reason: String },

    #[error("cannot open video sink {path}: {reason}")]
    SinkOpen { path: String, reason: String },

    #[error("failed to write frame {frame}: {reason}")]
    SinkWrite { frame: u64, reason: String },

    /// 看门狗: 阻塞等待超过配置的时长
    #[error("{stage} stalled: no input for {timeout:?}")]
    Stalled {
        stage: &'static str,
        timeout: Duration,
    },

    /// 其他阶段失败导致的取消, 不是根因
    #[error("{0} cancelled")]
    Cancelled(&'static str),

    /// 工作线程panic
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::Cancelled(_))
    }
}
