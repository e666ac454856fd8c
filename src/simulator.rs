/// 事件模拟器
/// Event simulator contract + reference contrast-threshold implementation
///
/// 流水线只依赖 `EventSimulator` trait。模拟器可以在调用之间保留内部状态,
/// 因此必须按帧序号顺序、单线程调用, 时间戳严格递增。
use crate::config::SimulatorConfig;
use crate::types::{Event, Frame};
use anyhow::{bail, Result};
use ndarray::Array2;

pub trait EventSimulator: Send {
    /// 模拟一帧, 返回该帧对应的事件批次 (可以为空)
    fn simulate(&mut self, frame: &Frame, timestamp_ms: f64) -> Result<Vec<Event>>;
}

impl<S: EventSimulator + ?Sized> EventSimulator for Box<S> {
    fn simulate(&mut self, frame: &Frame, timestamp_ms: f64) -> Result<Vec<Event>> {
        (**self).simulate(frame, timestamp_ms)
    }
}

/// 对比度阈值模拟器
///
/// 每个像素维护一个参考亮度, 当前亮度相对参考值每越过一次阈值 (Cp / Cn)
/// 产生一个事件, 时间戳在前后两帧之间线性插值。第一帧只用于初始化。
pub struct ContrastSimulator {
    config: SimulatorConfig,
    state: Option<PixelState>,
}

struct PixelState {
    reference: Array2<f32>,
    previous: Array2<f32>,
    last_event: Array2<f64>,
    last_time: f64,
}

impl ContrastSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    fn intensity(&self, frame: &Frame) -> Array2<f32> {
        if self.config.use_log {
            let eps = self.config.log_eps;
            frame.pixels.mapv(|v| (v + eps).ln())
        } else {
            frame.pixels.clone()
        }
    }
}

impl EventSimulator for ContrastSimulator {
    fn simulate(&mut self, frame: &Frame, timestamp_ms: f64) -> Result<Vec<Event>> {
        let current = self.intensity(frame);

        let Some(state) = self.state.as_mut() else {
            self.state = Some(PixelState {
                reference: current.clone(),
                previous: current,
                last_event: Array2::from_elem(frame.pixels.dim(), f64::NEG_INFINITY),
                last_time: timestamp_ms,
            });
            return Ok(Vec::new());
        };

        if current.dim() != state.previous.dim() {
            bail!(
                "frame size changed from {:?} to {:?}",
                state.previous.dim(),
                current.dim()
            );
        }
        if timestamp_ms <= state.last_time {
            bail!(
                "timestamp {} ms is not after previous {} ms",
                timestamp_ms,
                state.last_time
            );
        }

        let t0 = state.last_time;
        let dt = timestamp_ms - t0;
        let mut events = Vec::new();

        for ((y, x), &cur) in current.indexed_iter() {
            let prev = state.previous[[y, x]];
            let delta = cur - prev;
            if delta == 0.0 {
                continue;
            }

            let (polarity, step) = if delta > 0.0 {
                (1i8, self.config.contrast_positive)
            } else {
                (-1i8, -self.config.contrast_negative)
            };

            let mut level = state.reference[[y, x]] + step;
            while (polarity > 0 && level <= cur) || (polarity < 0 && level >= cur) {
                let fraction = ((level - prev) / delta).clamp(0.0, 1.0) as f64;
                let t = t0 + fraction * dt;
                if t - state.last_event[[y, x]] >= self.config.refractory_period {
                    events.push(Event::new(x as u32, y as u32, t, polarity));
                    state.last_event[[y, x]] = t;
                }
                state.reference[[y, x]] = level;
                level += step;
            }
        }

        state.previous = current;
        state.last_time = timestamp_ms;

        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_config() -> SimulatorConfig {
        SimulatorConfig {
            use_log: false,
            ..SimulatorConfig::default()
        }
    }

    fn frame(index: u64, values: &[f32], width: usize) -> Frame {
        let height = values.len() / width;
        Frame::new(
            index,
            Array2::from_shape_vec((height, width), values.to_vec()).unwrap(),
        )
    }

    #[test]
    fn test_first_frame_only_primes() {
        let mut sim = ContrastSimulator::new(linear_config());
        let events = sim.simulate(&frame(0, &[0.5; 4], 2), 0.0).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_positive_crossings() {
        let mut sim = ContrastSimulator::new(linear_config());
        sim.simulate(&frame(0, &[0.0, 0.5], 2), 0.0).unwrap();
        let events = sim.simulate(&frame(1, &[0.35, 0.5], 2), 10.0).unwrap();

        // 0.0 → 0.35 越过 0.1 / 0.2 / 0.3 三个阈值
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.x == 0 && e.y == 0 && e.polarity == 1));
        assert!(events.iter().all(|e| e.timestamp > 0.0 && e.timestamp <= 10.0));
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_negative_crossings() {
        let mut sim = ContrastSimulator::new(linear_config());
        sim.simulate(&frame(0, &[0.9], 1), 0.0).unwrap();
        let events = sim.simulate(&frame(1, &[0.65], 1), 5.0).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.polarity == -1));
    }

    #[test]
    fn test_reference_carries_over_between_frames() {
        let mut sim = ContrastSimulator::new(linear_config());
        sim.simulate(&frame(0, &[0.0], 1), 0.0).unwrap();
        // 0.05 未越过阈值
        assert!(sim.simulate(&frame(1, &[0.05], 1), 1.0).unwrap().is_empty());
        // 累计 0.12 越过 0.1
        assert_eq!(sim.simulate(&frame(2, &[0.12], 1), 2.0).unwrap().len(), 1);
    }

    #[test]
    fn test_refractory_period_suppresses_bursts() {
        let config = SimulatorConfig {
            refractory_period: 100.0,
            ..linear_config()
        };
        let mut sim = ContrastSimulator::new(config);
        sim.simulate(&frame(0, &[0.0], 1), 0.0).unwrap();
        let events = sim.simulate(&frame(1, &[0.55], 1), 10.0).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_log_domain() {
        let mut sim = ContrastSimulator::new(SimulatorConfig::default());
        sim.simulate(&frame(0, &[0.2], 1), 0.0).unwrap();
        // ln(0.4) - ln(0.2) ≈ 0.69 → 6个正事件
        let events = sim.simulate(&frame(1, &[0.4], 1), 33.3).unwrap();
        assert_eq!(events.len(), 6);
    }

    #[test]
    fn test_rejects_non_increasing_timestamp() {
        let mut sim = ContrastSimulator::new(linear_config());
        sim.simulate(&frame(0, &[0.0], 1), 10.0).unwrap();
        assert!(sim.simulate(&frame(1, &[0.5], 1), 10.0).is_err());
    }

    #[test]
    fn test_rejects_size_change() {
        let mut sim = ContrastSimulator::new(linear_config());
        sim.simulate(&frame(0, &[0.0; 4], 2), 0.0).unwrap();
        assert!(sim.simulate(&frame(1, &[0.0; 6], 3), 1.0).is_err());
    }
}
