//! 视频 → 亮度变化事件 → 可视化视频
//!
//! 采集 → 事件生成 → 事件渲染 → 写出, 四个并发单元通过有界阻塞队列连接,
//! 严格保持逐帧顺序。视频解码、事件模拟与编码都是可替换的外部协作者:
//! [`input::FrameSource`], [`simulator::EventSimulator`], [`output::VideoSink`]。
pub mod config; // 命令行参数与JSON配置
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod output; // 视频输出
pub mod pipeline; // 三阶段流水线与协调器
pub mod queue; // 有界阻塞队列
pub mod simulator; // 事件模拟器
pub mod stats; // 吞吐统计
pub mod types; // 帧 / 事件 / 渲染帧

pub use crate::config::{Args, OutputWindow, PipelineConfig, SimulatorConfig};
pub use crate::error::{PipelineError, Result};
pub use crate::input::{FfmpegSource, FrameSource};
pub use crate::output::{FfmpegEncoder, OutputSpec, VideoSink};
pub use crate::pipeline::{render_events, PipelineCoordinator, PipelineReport};
pub use crate::queue::BoundedQueue;
pub use crate::simulator::{ContrastSimulator, EventSimulator};
pub use crate::types::{Event, EventBatch, Frame, RenderedFrame, VideoMetadata};
