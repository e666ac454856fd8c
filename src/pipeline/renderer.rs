/// 事件渲染阶段 (Event Rendering)
/// 职责: 队列B取事件批次 → 三通道可视化帧推入队列C
///
/// 空批次同样渲染为一帧全零图像, 保证每个帧序号占一个位置。
use super::{recv, send};
use crate::error::Result;
use crate::queue::BoundedQueue;
use crate::stats::StageStats;
use crate::types::{Event, EventBatch, RenderedFrame, NEGATIVE_CHANNEL, POSITIVE_CHANNEL};
use image::RgbImage;
use std::time::Duration;
use tracing::{debug, info};

pub const STAGE: &str = "render";

/// 将一个事件批次绘制为三通道图像
///
/// 正极性 → R, 负极性 → G, B 保留为0。同一像素两种极性都保留标记,
/// 同一通道重复命中只写一次强度 (不累加)。非法极性和越界坐标被忽略。
pub fn render_events(
    index: u64,
    events: &[Event],
    width: u32,
    height: u32,
    intensity: u8,
) -> RenderedFrame {
    let mut image = RgbImage::new(width, height);
    let mut skipped = 0usize;

    for event in events {
        let channel = match event.polarity {
            1 => POSITIVE_CHANNEL,
            -1 => NEGATIVE_CHANNEL,
            _ => {
                skipped += 1;
                continue;
            }
        };
        if event.x >= width || event.y >= height {
            skipped += 1;
            continue;
        }
        image.get_pixel_mut(event.x, event.y).0[channel] = intensity;
    }

    if skipped > 0 {
        debug!(frame = index, skipped, "忽略非法事件");
    }

    RenderedFrame { index, image }
}

pub struct EventRenderingStage {
    width: u32,
    height: u32,
    intensity: u8,
    frame_count: u64,
    stall_timeout: Option<Duration>,
}

impl EventRenderingStage {
    pub fn new(width: u32, height: u32, intensity: u8, frame_count: u64) -> Self {
        Self {
            width,
            height,
            intensity,
            frame_count,
            stall_timeout: None,
        }
    }

    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// 渲染全部 frame_count 个批次, 返回渲染帧数
    pub fn run(
        &self,
        input: &BoundedQueue<EventBatch>,
        output: &BoundedQueue<RenderedFrame>,
    ) -> Result<u64> {
        info!("渲染线程启动 ({}x{})", self.width, self.height);
        let mut stats = StageStats::new(STAGE);

        for frame_number in 0..self.frame_count {
            let batch = recv(input, self.stall_timeout, STAGE)?;
            debug_assert_eq!(batch.index, frame_number);

            let rendered = render_events(
                batch.index,
                &batch.events,
                self.width,
                self.height,
                self.intensity,
            );
            send(output, rendered, STAGE)?;
            stats.tick(self.frame_count);
        }

        output.close();
        info!("渲染线程退出");
        Ok(stats.total())
    }
}
