use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Scalar, Vec3b, CV_8UC3},
    imgproc,
    prelude::*,
};

use super::surface::Surface;
use crate::camera::frame::unpack_rgb;
use crate::camera::{frame_to_mat, mat_to_frame, Frame};

/// 骨格線の太さ
const LINE_THICKNESS: i32 = 2;

/// OpenCV の BGR Mat に描くキャンバス
///
/// `draw_image` で受けたフレームのサイズに合わせて作り直すので、
/// フレーム座標のランドマークをそのまま描ける。
pub struct Canvas {
    mat: Mat,
    label_scale: f64,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let mat =
            Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC3, Scalar::all(0.0))?;
        Ok(Self {
            mat,
            label_scale: 0.6,
        })
    }

    pub fn with_label_scale(mut self, scale: f64) -> Self {
        self.label_scale = scale;
        self
    }

    pub fn width(&self) -> usize {
        self.mat.cols() as usize
    }

    pub fn height(&self) -> usize {
        self.mat.rows() as usize
    }

    /// 表示用に 0x00RRGGBB のバッファへ変換
    pub fn to_buffer(&self) -> Result<Vec<u32>> {
        Ok(mat_to_frame(&self.mat)?.pixels)
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let px = self.mat.at_2d::<Vec3b>(y as i32, x as i32).ok()?;
        Some(((px[2] as u32) << 16) | ((px[1] as u32) << 8) | px[0] as u32)
    }
}

/// 0x00RRGGBB → BGR Scalar
fn bgr(color: u32) -> Scalar {
    let (r, g, b) = unpack_rgb(color);
    Scalar::new(b as f64, g as f64, r as f64, 0.0)
}

impl Surface for Canvas {
    fn clear(&mut self) -> Result<()> {
        self.mat.set_to(&Scalar::all(0.0), &core::no_array())?;
        Ok(())
    }

    fn draw_image(&mut self, frame: &Frame) -> Result<()> {
        self.mat = frame_to_mat(frame)?;
        Ok(())
    }

    fn draw_circle(&mut self, x: i32, y: i32, radius: i32, color: u32) -> Result<()> {
        imgproc::circle(
            &mut self.mat,
            Point::new(x, y),
            radius,
            bgr(color),
            -1,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }

    fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: u32) -> Result<()> {
        imgproc::line(
            &mut self.mat,
            Point::new(x1, y1),
            Point::new(x2, y2),
            bgr(color),
            LINE_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }

    fn draw_text(&mut self, x: i32, y: i32, label: &str, color: u32) -> Result<()> {
        // 背景（黒）で視認性確保
        imgproc::put_text(
            &mut self.mat,
            label,
            Point::new(x, y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            self.label_scale,
            Scalar::all(0.0),
            3,
            imgproc::LINE_8,
            false,
        )?;
        imgproc::put_text(
            &mut self.mat,
            label,
            Point::new(x, y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            self.label_scale,
            bgr(color),
            1,
            imgproc::LINE_8,
            false,
        )?;
        Ok(())
    }
}
