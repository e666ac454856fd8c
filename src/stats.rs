/// 阶段吞吐统计 (每秒打印一次)
use std::time::Instant;
use tracing::info;

pub struct StageStats {
    stage: &'static str,
    count: u64,
    total: u64,
    last: Instant,
    current_fps: f64,
}

impl StageStats {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            count: 0,
            total: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    /// 记录处理完一帧, 满一秒时输出统计
    pub fn tick(&mut self, frame_count: u64) {
        self.count += 1;
        self.total += 1;

        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.current_fps = self.count as f64 / elapsed;
            info!(
                stage = self.stage,
                "{}/{} frames | {:.1} fps", self.total, frame_count, self.current_fps
            );
            self.last = Instant::now();
            self.count = 0;
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
