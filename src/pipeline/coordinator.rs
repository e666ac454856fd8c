/// 流水线协调器 (Pipeline Coordinator)
///
/// 启动前一次性确定 frame_count / fps / 尺寸并读取首帧 (失败即退出);
/// 然后启动三个阶段线程, 在当前线程运行采集循环, 最后等待全部阶段结束。
use super::generator::{self, EventGenerationStage};
use super::renderer::{self, EventRenderingStage};
use super::shutdown::{Queues, Shutdown};
use super::writer::{self, VideoSinkStage};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::input::FrameSource;
use crate::output::{OutputSpec, VideoSink};
use crate::simulator::EventSimulator;
use crate::stats::StageStats;
use crate::types::{Frame, VideoMetadata};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

const ACQUIRE: &str = "acquire";

/// 一次运行的统计结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineReport {
    pub metadata: Option<VideoMetadata>,
    pub frames_read: u64,
    pub events_generated: u64,
    pub frames_rendered: u64,
    pub frames_written: u64,
}

pub struct PipelineCoordinator {
    config: PipelineConfig,
    output: PathBuf,
}

impl PipelineCoordinator {
    pub fn new(config: PipelineConfig, output: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output: output.into(),
        }
    }

    /// 运行完整流水线
    ///
    /// `open_sink` 在写出线程中以输出参数调用一次。
    pub fn run<Src, Sim, Snk, F>(
        &self,
        mut source: Src,
        simulator: Sim,
        open_sink: F,
    ) -> Result<PipelineReport>
    where
        Src: FrameSource,
        Sim: EventSimulator,
        Snk: VideoSink,
        F: FnOnce(&OutputSpec) -> Result<Snk> + Send,
    {
        self.config.validate()?;
        let (metadata, first) = self.prepare(&mut source)?;
        let frame_count = metadata.frame_count;
        let stall_timeout = self.config.stall_timeout();

        let spec = OutputSpec {
            path: self.output.clone(),
            codec: self.config.codec.clone(),
            fps: metadata.fps,
            width: metadata.width,
            height: metadata.height,
        };

        let mut generation = EventGenerationStage::new(simulator, metadata.fps, frame_count)
            .with_stall_timeout(stall_timeout);
        let rendering = EventRenderingStage::new(
            metadata.width,
            metadata.height,
            self.config.render_intensity,
            frame_count,
        )
        .with_stall_timeout(stall_timeout);
        let sink = VideoSinkStage::new(frame_count, self.config.output_window)
            .with_stall_timeout(stall_timeout);

        let queues = Queues::new(self.config.queue_capacity);
        let shutdown = Shutdown::new(&queues);
        let started = Instant::now();
        let spec = &spec;

        let (acquired, generated, rendered, written) = thread::scope(|s| {
            let gen_handle = thread::Builder::new()
                .name("esim-generate".into())
                .spawn_scoped(s, || {
                    let _guard = shutdown.guard(generator::STAGE);
                    generation
                        .run(&queues.frames, &queues.batches)
                        .inspect_err(|e| shutdown.fail(e.clone()))
                });
            let render_handle = thread::Builder::new()
                .name("esim-render".into())
                .spawn_scoped(s, || {
                    let _guard = shutdown.guard(renderer::STAGE);
                    rendering
                        .run(&queues.batches, &queues.rendered)
                        .inspect_err(|e| shutdown.fail(e.clone()))
                });
            let write_handle = thread::Builder::new()
                .name("esim-write".into())
                .spawn_scoped(s, || {
                    let _guard = shutdown.guard(writer::STAGE);
                    sink.run(&queues.rendered, move || open_sink(spec))
                        .inspect_err(|e| shutdown.fail(e.clone()))
                });

            // 采集循环在协调线程上运行
            let acquired = match (&gen_handle, &render_handle, &write_handle) {
                (Ok(_), Ok(_), Ok(_)) => acquire(&mut source, first, frame_count, &shutdown)
                    .inspect_err(|e| shutdown.fail(e.clone())),
                _ => {
                    let err = PipelineError::WorkerPanicked("spawn");
                    shutdown.fail(err.clone());
                    Err(err)
                }
            };

            (
                acquired,
                join(gen_handle, generator::STAGE, &shutdown),
                join(render_handle, renderer::STAGE, &shutdown),
                join(write_handle, writer::STAGE, &shutdown),
            )
        });

        if let Some(err) = shutdown.take_error() {
            return Err(err);
        }

        let report = PipelineReport {
            metadata: Some(metadata),
            frames_read: acquired?,
            events_generated: generated?,
            frames_rendered: rendered?,
            frames_written: written?,
        };
        info!(
            "流水线完成: 读取{}帧 | 事件{}个 | 写出{}帧 | 耗时{:.2}s",
            report.frames_read,
            report.events_generated,
            report.frames_written,
            started.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    /// 确定元数据并读取首帧
    fn prepare<Src: FrameSource>(&self, source: &mut Src) -> Result<(VideoMetadata, Frame)> {
        let mut metadata = source.metadata();
        if let Some(max) = self.config.max_frames {
            metadata.frame_count = metadata.frame_count.min(max);
        }
        if metadata.frame_count == 0 {
            return Err(PipelineError::SourceUnavailable(
                "source reports zero frames".into(),
            ));
        }
        if !(metadata.fps > 0.0 && metadata.fps.is_finite()) {
            return Err(PipelineError::SourceUnavailable(format!(
                "invalid frame rate {}",
                metadata.fps
            )));
        }

        let first = source.read_next_frame()?.ok_or_else(|| {
            PipelineError::SourceUnavailable("first frame is unreadable".into())
        })?;

        // 以实际解码尺寸为准
        if (first.width(), first.height()) != (metadata.width, metadata.height) {
            warn!(
                "元数据尺寸 {}x{} 与首帧 {}x{} 不一致, 使用首帧尺寸",
                metadata.width,
                metadata.height,
                first.width(),
                first.height()
            );
            metadata.width = first.width();
            metadata.height = first.height();
        }
        if metadata.width == 0 || metadata.height == 0 {
            return Err(PipelineError::SourceUnavailable("first frame is empty".into()));
        }

        info!(
            "帧数 {} | {:.2} fps | {}x{} | 队列容量 {} | 写出 {} 帧",
            metadata.frame_count,
            metadata.fps,
            metadata.width,
            metadata.height,
            self.config.queue_capacity,
            self.config.output_window.written(metadata.frame_count)
        );
        Ok((metadata, first))
    }
}

/// 采集循环: 读取恰好 frame_count 帧推入队列A, 帧序号由此处统一编号
fn acquire<Src: FrameSource>(
    source: &mut Src,
    first: Frame,
    frame_count: u64,
    shutdown: &Shutdown<'_>,
) -> Result<u64> {
    let queues = shutdown.queues();
    let mut stats = StageStats::new(ACQUIRE);
    let mut next = Some(first);

    for frame_number in 0..frame_count {
        // 下游已失败时不再解码
        if shutdown.is_cancelled() {
            return Err(PipelineError::Cancelled(ACQUIRE));
        }
        let mut frame = match next.take() {
            Some(frame) => frame,
            None => source
                .read_next_frame()?
                .ok_or(PipelineError::SourceExhausted {
                    expected: frame_count,
                    got: frame_number,
                })?,
        };
        frame.index = frame_number;
        super::send(&queues.frames, frame, ACQUIRE)?;
        stats.tick(frame_count);
    }

    queues.frames.close();
    Ok(frame_count)
}

fn join<T>(
    handle: std::io::Result<thread::ScopedJoinHandle<'_, Result<T>>>,
    stage: &'static str,
    shutdown: &Shutdown<'_>,
) -> Result<T> {
    match handle {
        Ok(handle) => handle.join().unwrap_or_else(|_| {
            let err = PipelineError::WorkerPanicked(stage);
            shutdown.fail(err.clone());
            Err(err)
        }),
        Err(_) => Err(PipelineError::WorkerPanicked(stage)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// 记录读取次数的帧源
    struct CountingSource {
        reads: u64,
    }

    impl FrameSource for CountingSource {
        fn metadata(&self) -> VideoMetadata {
            VideoMetadata {
                fps: 10.0,
                frame_count: 8,
                width: 2,
                height: 2,
            }
        }

        fn read_next_frame(&mut self) -> Result<Option<Frame>> {
            self.reads += 1;
            Ok(Some(Frame::new(99, Array2::zeros((2, 2)))))
        }
    }

    fn first() -> Frame {
        Frame::new(42, Array2::zeros((2, 2)))
    }

    #[test]
    fn test_acquire_renumbers_and_closes() {
        let queues = Queues::new(0);
        let shutdown = Shutdown::new(&queues);
        let mut source = CountingSource { reads: 0 };

        assert_eq!(acquire(&mut source, first(), 3, &shutdown).unwrap(), 3);
        assert_eq!(source.reads, 2);
        for i in 0..3 {
            assert_eq!(queues.frames.pop().unwrap().index, i);
        }
        assert!(queues.frames.is_closed());
    }

    #[test]
    fn test_acquire_stops_reading_after_failure() {
        let queues = Queues::new(0);
        let shutdown = Shutdown::new(&queues);
        shutdown.fail(PipelineError::Config("downstream failed".into()));
        let mut source = CountingSource { reads: 0 };

        let err = acquire(&mut source, first(), 8, &shutdown).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled(ACQUIRE)));
        assert_eq!(source.reads, 0);
    }
}
