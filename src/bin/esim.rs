/// 事件相机模拟器 (Event Camera Simulator)
///
/// 读取视频 → 模拟亮度变化事件 → 将事件渲染为可视化视频
///
/// 系统架构:
/// 1. 采集:     视频解码 (主线程)
/// 2. 事件生成: 对比度阈值模拟 (独立工作线程)
/// 3. 事件渲染: 正/负极性 → R/G 通道 (独立工作线程)
/// 4. 写出:     ffmpeg 编码 (独立工作线程)
///
/// 直接运行: cargo run --bin esim --release -- input.mp4
use anyhow::Context;
use clap::Parser;
use esim_rs::{Args, ContrastSimulator, FfmpegEncoder, FfmpegSource, PipelineCoordinator};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_names(true)
        .init();

    match run(Args::parse()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args.resolve().context("加载配置失败")?;
    if let Some(path) = &args.save_config {
        config.save(path).context("保存配置失败")?;
    }

    info!("🚀 事件模拟启动");
    info!("📹 输入: {}", args.input.display());
    info!("💾 输出: {}", args.output.display());

    // 先打开视频源, 失败时不会创建输出文件
    let source = FfmpegSource::open(&args.input, config.max_frames)
        .with_context(|| format!("无法打开输入视频 {}", args.input.display()))?;
    let simulator = ContrastSimulator::new(config.simulator.clone());

    let coordinator = PipelineCoordinator::new(config, &args.output);
    let report = coordinator
        .run(source, simulator, FfmpegEncoder::open)
        .context("流水线执行失败")?;

    info!(
        "✅ 完成: {} 帧 → {} 个事件 → 写出 {} 帧",
        report.frames_read, report.events_generated, report.frames_written
    );
    Ok(())
}
