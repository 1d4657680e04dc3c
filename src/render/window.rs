use std::sync::mpsc::Receiver;

use anyhow::Result;
use minifb::{Key, KeyRepeat, Scale, ScaleMode, Window, WindowOptions};

use super::canvas::Canvas;
use super::surface::Surface;
use crate::camera::Frame;
use crate::pipeline::{Display, FramePacer, Refresh};

/// minifbのウィンドウに Canvas を表示する
///
/// `next_refresh` で前回描いた内容を出してから、目標FPSの境界まで待つ。
pub struct MinifbDisplay {
    window: Window,
    canvas: Canvas,
    pacer: FramePacer,
    titles: Option<Receiver<String>>,
}

impl MinifbDisplay {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize, target_fps: u32) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                scale: Scale::X1,
                scale_mode: ScaleMode::AspectRatioStretch,
                ..WindowOptions::default()
            },
        )?;

        Ok(Self {
            window,
            canvas: Canvas::new(width, height)?,
            pacer: FramePacer::new(target_fps),
            titles: None,
        })
    }

    pub fn with_label_scale(mut self, scale: f64) -> Self {
        self.canvas = self.canvas.with_label_scale(scale);
        self
    }

    /// 受け取ったテキストをリフレッシュごとにタイトルへ反映する
    pub fn with_title_feed(mut self, titles: Receiver<String>) -> Self {
        self.titles = Some(titles);
        self
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// R キーが押されたか（押しっぱなしは1回）
    pub fn retry_requested(&self) -> bool {
        self.window.is_key_pressed(Key::R, KeyRepeat::No)
    }

    /// バッファをウィンドウに表示
    fn present(&mut self) -> Result<()> {
        let buffer = self.canvas.to_buffer()?;
        self.window
            .update_with_buffer(&buffer, self.canvas.width(), self.canvas.height())?;
        Ok(())
    }
}

impl Surface for MinifbDisplay {
    fn clear(&mut self) -> Result<()> {
        self.canvas.clear()
    }

    fn draw_image(&mut self, frame: &Frame) -> Result<()> {
        self.canvas.draw_image(frame)
    }

    fn draw_circle(&mut self, x: i32, y: i32, radius: i32, color: u32) -> Result<()> {
        self.canvas.draw_circle(x, y, radius, color)
    }

    fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: u32) -> Result<()> {
        self.canvas.draw_line(x1, y1, x2, y2, color)
    }

    fn draw_text(&mut self, x: i32, y: i32, label: &str, color: u32) -> Result<()> {
        self.canvas.draw_text(x, y, label, color)
    }
}

impl Display for MinifbDisplay {
    fn next_refresh(&mut self) -> Refresh {
        if let Some(title) = self.titles.as_ref().and_then(|rx| rx.try_iter().last()) {
            self.window.set_title(&title);
        }
        if let Err(e) = self.present() {
            log::error!("Failed to present frame: {:#}", e);
            return Refresh::Closed;
        }
        if !self.is_open() {
            return Refresh::Closed;
        }
        Refresh::Ready {
            skipped: self.pacer.wait(),
        }
    }
}
