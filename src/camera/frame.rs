/// カメラフレーム (0x00RRGGBB, 行優先)
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// 単色フレーム
    pub fn filled(width: u32, height: u32, color: u32) -> Self {
        Self::new(width, height, vec![color; (width * height) as usize])
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    /// BGR 3ch バイト列から変換
    pub fn from_bgr(width: u32, height: u32, bgr: &[u8]) -> Self {
        let pixels = bgr
            .chunks_exact(3)
            .take((width * height) as usize)
            .map(|p| ((p[2] as u32) << 16) | ((p[1] as u32) << 8) | p[0] as u32)
            .collect();
        Self::new(width, height, pixels)
    }

    /// 平均輝度 (0.0〜255.0)
    pub fn mean_luma(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .pixels
            .iter()
            .map(|&p| {
                let (r, g, b) = unpack_rgb(p);
                0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
            })
            .sum();
        sum / self.pixels.len() as f32
    }
}

pub fn unpack_rgb(pixel: u32) -> (u8, u8, u8) {
    (
        ((pixel >> 16) & 0xFF) as u8,
        ((pixel >> 8) & 0xFF) as u8,
        (pixel & 0xFF) as u8,
    )
}
