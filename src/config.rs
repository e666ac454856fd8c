//! 配置 - 命令行参数 + JSON配置文件
//!
//! 命令行参数优先于配置文件中的值。

use crate::error::{PipelineError, Result};
use crate::types::DEFAULT_RENDER_INTENSITY;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// 写出窗口: 渲染的 frame_count 帧中哪些写入输出视频
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputWindow {
    /// 丢弃最后一帧 (写 frame_count - 1 帧)
    #[default]
    DropLast,
    /// 丢弃第一帧 (模拟器预热帧)
    DropFirst,
    /// 全部写出
    All,
}

impl OutputWindow {
    /// 第 `index` 帧是否写出
    pub fn includes(&self, index: u64, frame_count: u64) -> bool {
        match self {
            OutputWindow::DropLast => index + 1 < frame_count,
            OutputWindow::DropFirst => index > 0 && index < frame_count,
            OutputWindow::All => index < frame_count,
        }
    }

    /// 实际写出的帧数
    pub fn written(&self, frame_count: u64) -> u64 {
        match self {
            OutputWindow::All => frame_count,
            OutputWindow::DropLast | OutputWindow::DropFirst => frame_count.saturating_sub(1),
        }
    }
}

/// 事件模拟器参数 (默认值与原始程序一致)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub contrast_positive: f32, // 正极性对比度阈值 Cp
    pub contrast_negative: f32, // 负极性对比度阈值 Cn
    pub refractory_period: f64, // 不应期 (与时间戳同单位: 毫秒)
    pub log_eps: f32,           // log(I + eps)
    pub use_log: bool,          // 是否在对数域比较
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            contrast_positive: 0.1,
            contrast_negative: 0.1,
            refractory_period: 1e-4,
            log_eps: 1e-3,
            use_log: true,
        }
    }
}

/// 流水线参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 队列 ===
    pub queue_capacity: usize, // 每个队列容量, 0 = 无界

    // === 渲染 / 写出 ===
    pub render_intensity: u8,
    pub output_window: OutputWindow,
    pub codec: String, // ffmpeg 编码器名称

    // === 运行控制 ===
    pub stall_timeout_secs: Option<f64>, // 看门狗超时, None = 无限等待
    pub max_frames: Option<u64>,         // 最多处理的帧数

    pub simulator: SimulatorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            render_intensity: DEFAULT_RENDER_INTENSITY,
            output_window: OutputWindow::DropLast,
            codec: String::from("mpeg4"),
            stall_timeout_secs: None,
            max_frames: None,
            simulator: SimulatorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        info!("配置已从 {} 加载", path.display());
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        fs::write(path, json)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        info!("配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulator;
        if !(sim.contrast_positive > 0.0 && sim.contrast_negative > 0.0) {
            return Err(PipelineError::Config(
                "contrast thresholds must be positive".into(),
            ));
        }
        if !(sim.log_eps > 0.0) || sim.refractory_period < 0.0 {
            return Err(PipelineError::Config(
                "log_eps must be positive and refractory_period non-negative".into(),
            ));
        }
        if self.render_intensity == 0 {
            return Err(PipelineError::Config("render_intensity must be non-zero".into()));
        }
        if self.codec.trim().is_empty() {
            return Err(PipelineError::Config("codec must not be empty".into()));
        }
        if let Some(secs) = self.stall_timeout_secs {
            if !(secs > 0.0 && secs.is_finite()) {
                return Err(PipelineError::Config(
                    "stall_timeout_secs must be a positive number".into(),
                ));
            }
        }
        if self.max_frames == Some(0) {
            return Err(PipelineError::Config("max_frames must be at least 1".into()));
        }
        Ok(())
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs.map(Duration::from_secs_f64)
    }
}

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "视频 → 亮度变化事件 → 可视化视频", long_about = None)]
pub struct Args {
    /// 输入视频路径
    pub input: PathBuf,

    /// 输出视频路径
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// JSON配置文件
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 将最终生效的配置保存到该文件
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// ffmpeg 编码器 (mpeg4 / libx264 / ...)
    #[arg(long)]
    pub codec: Option<String>,

    /// 队列容量 (0 = 无界)
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// 写出窗口
    #[arg(long, value_enum)]
    pub output_window: Option<OutputWindow>,

    /// 渲染强度
    #[arg(long)]
    pub render_intensity: Option<u8>,

    /// 看门狗: 单次等待上游超过该秒数视为停滞
    #[arg(long, allow_negative_numbers = true)]
    pub stall_timeout_secs: Option<f64>,

    /// 最多处理的帧数
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// 正极性对比度阈值
    #[arg(long)]
    pub cp: Option<f32>,

    /// 负极性对比度阈值
    #[arg(long)]
    pub cn: Option<f32>,

    /// 不应期 (毫秒)
    #[arg(long)]
    pub refractory: Option<f64>,

    /// log(I + eps) 中的 eps
    #[arg(long)]
    pub log_eps: Option<f32>,

    /// 在线性亮度域比较 (默认对数域)
    #[arg(long)]
    pub no_log: bool,
}

impl Args {
    /// 合并配置文件与命令行参数
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(codec) = &self.codec {
            config.codec = codec.clone();
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(window) = self.output_window {
            config.output_window = window;
        }
        if let Some(intensity) = self.render_intensity {
            config.render_intensity = intensity;
        }
        if self.stall_timeout_secs.is_some() {
            config.stall_timeout_secs = self.stall_timeout_secs;
        }
        if self.max_frames.is_some() {
            config.max_frames = self.max_frames;
        }
        if let Some(cp) = self.cp {
            config.simulator.contrast_positive = cp;
        }
        if let Some(cn) = self.cn {
            config.simulator.contrast_negative = cn;
        }
        if let Some(refractory) = self.refractory {
            config.simulator.refractory_period = refractory;
        }
        if let Some(eps) = self.log_eps {
            config.simulator.log_eps = eps;
        }
        if self.no_log {
            config.simulator.use_log = false;
        }

        config.validate()?;
        Ok(config)
    }
}
