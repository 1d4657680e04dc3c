use anyhow::Result;

use crate::camera::Frame;

/// 描画先
///
/// 色は 0x00RRGGBB。`draw_text` の (x, y) は文字列の左下（ベースライン）。
pub trait Surface {
    fn clear(&mut self) -> Result<()>;
    fn draw_image(&mut self, frame: &Frame) -> Result<()>;
    fn draw_circle(&mut self, x: i32, y: i32, radius: i32, color: u32) -> Result<()>;
    fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: u32) -> Result<()>;
    fn draw_text(&mut self, x: i32, y: i32, label: &str, color: u32) -> Result<()>;
}
