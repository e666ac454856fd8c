/// 流水线数据结构定义
/// Data structures flowing between pipeline stages
use image::{Rgb, RgbImage};
use ndarray::Array2;

// ========== 公共常量 ==========

/// 渲染强度 (原始实现固定为100)
pub const DEFAULT_RENDER_INTENSITY: u8 = 100;

/// 正极性事件所在通道 (R)
pub const POSITIVE_CHANNEL: usize = 0;
/// 负极性事件所在通道 (G)
pub const NEGATIVE_CHANNEL: usize = 1;
/// 保留通道 (B), 始终为0
pub const RESERVED_CHANNEL: usize = 2;

// ========== 数据结构 ==========

/// 视频元数据, 启动时确定一次
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoMetadata {
    pub fps: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

/// 灰度帧 (采集 → 事件生成)
///
/// 亮度归一化到 [0, 1], 形状为 (height, width)。
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub pixels: Array2<f32>,
}

impl Frame {
    pub fn new(index: u64, pixels: Array2<f32>) -> Self {
        Self { index, pixels }
    }

    /// 由8位灰度数据构造 (按 1/255 归一化)
    pub fn from_gray8(index: u64, width: u32, height: u32, data: &[u8]) -> Option<Self> {
        let (w, h) = (width as usize, height as usize);
        if data.len() != w * h {
            return None;
        }
        let pixels = Array2::from_shape_fn((h, w), |(y, x)| data[y * w + x] as f32 / 255.0);
        Some(Self { index, pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.pixels.nrows() as u32
    }
}

/// 亮度变化事件
///
/// `polarity` 合法取值为 +1 / -1, 其他值视为非法输入, 渲染时忽略。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub x: u32,
    pub y: u32,
    pub timestamp: f64,
    pub polarity: i8,
}

impl Event {
    pub fn new(x: u32, y: u32, timestamp: f64, polarity: i8) -> Self {
        Self {
            x,
            y,
            timestamp,
            polarity,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.polarity == 1
    }

    pub fn is_negative(&self) -> bool {
        self.polarity == -1
    }
}

/// 单帧对应的事件批次 (事件生成 → 渲染), 可以为空
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventBatch {
    pub index: u64,
    pub events: Vec<Event>,
}

impl EventBatch {
    pub fn new(index: u64, events: Vec<Event>) -> Self {
        Self { index, events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// 渲染后的三通道帧 (渲染 → 写出)
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFrame {
    pub index: u64,
    pub image: RgbImage,
}

impl RenderedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.image.get_pixel(x, y)
    }

    /// 是否所有通道全为0
    pub fn is_blank(&self) -> bool {
        self.image.as_raw().iter().all(|&v| v == 0)
    }

    /// 某通道中被点亮的像素数
    pub fn lit_count(&self, channel: usize) -> usize {
        self.image.pixels().filter(|p| p.0[channel] != 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_gray8_normalizes() {
        let frame = Frame::from_gray8(3, 2, 1, &[0, 255]).unwrap();
        assert_eq!(frame.index, 3);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.pixels[[0, 0]], 0.0);
        assert_eq!(frame.pixels[[0, 1]], 1.0);
    }

    #[test]
    fn test_from_gray8_rejects_short_buffer() {
        assert!(Frame::from_gray8(0, 4, 4, &[0; 15]).is_none());
    }

    #[test]
    fn test_polarity() {
        assert!(Event::new(0, 0, 0.0, 1).is_positive());
        assert!(Event::new(0, 0, 0.0, -1).is_negative());
        let invalid = Event::new(0, 0, 0.0, 0);
        assert!(!invalid.is_positive() && !invalid.is_negative());
    }
}
