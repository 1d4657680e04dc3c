use anyhow::Result;
use ndarray::Array4;
use opencv::{
    core::{AlgorithmHint, Mat, Size, Vec3f, CV_32FC3},
    imgproc,
    prelude::*,
};

use crate::camera::{frame_to_mat, Frame};

/// MoveNet用の入力サイズ
pub const MOVENET_INPUT_SIZE: i32 = 192;

/// フレームを MoveNet用の入力テンソルに変換
///
/// - BGR -> RGB
/// - 192x192 にバイリニアでリサイズ
/// - [1, 192, 192, 3] の f32 テンソル (0.0-255.0)
///
/// 空のフレームはゼロのテンソルになる。
pub fn preprocess_for_movenet(frame: &Frame) -> Result<Array4<f32>> {
    let size = MOVENET_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
    if frame.width == 0 || frame.height == 0 {
        return Ok(tensor);
    }

    let bgr = frame_to_mat(frame)?;
    let mut rgb = Mat::default();
    imgproc::cvt_color(
        &bgr,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;

    let mut resized = Mat::default();
    imgproc::resize(
        &rgb,
        &mut resized,
        Size::new(MOVENET_INPUT_SIZE, MOVENET_INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut float_mat = Mat::default();
    resized.convert_to(&mut float_mat, CV_32FC3, 1.0, 0.0)?;

    for y in 0..MOVENET_INPUT_SIZE {
        for x in 0..MOVENET_INPUT_SIZE {
            let pixel = float_mat.at_2d::<Vec3f>(y, x)?;
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c];
            }
        }
    }

    Ok(tensor)
}
