use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Vec3b},
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use super::capture::{CameraHost, CameraStream, DeviceError, Facing, StreamRequest};
use super::frame::{unpack_rgb, Frame};
use crate::config::CameraConfig;

/// 連続でこの回数読み取りに失敗したらストリーム終了とみなす
const MAX_CONSECUTIVE_READ_FAILURES: u32 = 30;

/// OpenCV の VideoCapture を使うホスト
pub struct OpenCvHost {
    config: CameraConfig,
}

impl OpenCvHost {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    fn facing_index(&self, facing: Facing) -> i32 {
        match facing {
            Facing::Front => self.config.index,
            Facing::Back => self.config.back_index,
        }
    }
}

/// プラットフォームごとの代替キャプチャAPI
fn legacy_api() -> Option<VideoCaptureAPIs> {
    if cfg!(target_os = "linux") {
        Some(VideoCaptureAPIs::CAP_V4L2)
    } else if cfg!(target_os = "windows") {
        Some(VideoCaptureAPIs::CAP_DSHOW)
    } else if cfg!(target_os = "macos") {
        Some(VideoCaptureAPIs::CAP_AVFOUNDATION)
    } else {
        None
    }
}

impl CameraHost for OpenCvHost {
    fn request(&self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, DeviceError> {
        let stream = match request {
            StreamRequest::Constrained(c) => OpenCvStream::open(
                self.facing_index(c.facing),
                VideoCaptureAPIs::CAP_ANY,
                Some((c.width, c.height)),
                Some(self.config.fps),
            )?,
            StreamRequest::Unconstrained => {
                OpenCvStream::open(self.config.index, VideoCaptureAPIs::CAP_ANY, None, None)?
            }
            StreamRequest::Legacy => {
                let api = legacy_api()
                    .ok_or_else(|| DeviceError::Other("no legacy capture API".to_string()))?;
                let mut last_err = DeviceError::NotFound;
                let mut opened = None;
                for &index in &self.config.legacy_indices {
                    match OpenCvStream::open(index, api, None, None) {
                        Ok(stream) => {
                            opened = Some(stream);
                            break;
                        }
                        Err(e) => last_err = e,
                    }
                }
                opened.ok_or(last_err)?
            }
        };
        Ok(Box::new(stream))
    }

    fn has_legacy_capability(&self) -> bool {
        legacy_api().is_some() && !self.config.legacy_indices.is_empty()
    }

    /// ネイティブ環境ではブラウザのようなセキュアコンテキスト制約はない
    fn is_secure_context(&self) -> bool {
        true
    }
}

/// 最新フレームをバックグラウンドスレッドで読み続けるストリーム
pub struct OpenCvStream {
    capture: Option<VideoCapture>,
    latest: Arc<Mutex<Option<Frame>>>,
    running: Arc<AtomicBool>,
    ended: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    width: u32,
    height: u32,
}

impl OpenCvStream {
    fn open(
        index: i32,
        api: VideoCaptureAPIs,
        resolution: Option<(u32, u32)>,
        fps: Option<u32>,
    ) -> Result<Self, DeviceError> {
        let mut capture = VideoCapture::new(index, api as i32)
            .map_err(|e| DeviceError::Other(format!("camera {}: {}", index, e)))?;

        if !capture.is_opened().unwrap_or(false) {
            return Err(DeviceError::NotFound);
        }

        let configure = |capture: &mut VideoCapture| -> opencv::Result<()> {
            if let Some((w, h)) = resolution {
                capture.set(videoio::CAP_PROP_FRAME_WIDTH, w as f64)?;
                capture.set(videoio::CAP_PROP_FRAME_HEIGHT, h as f64)?;
            }
            if let Some(f) = fps {
                capture.set(videoio::CAP_PROP_FPS, f as f64)?;
            }
            capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;
            Ok(())
        };
        configure(&mut capture).map_err(|e| DeviceError::Other(e.to_string()))?;

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;
        let actual_fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        log::debug!(
            "Opened camera {} ({:?}): {}x{} @ {} fps",
            index,
            api,
            width,
            height,
            actual_fps
        );

        Ok(Self {
            capture: Some(capture),
            latest: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            ended: Arc::new(AtomicBool::new(false)),
            handle: None,
            width,
            height,
        })
    }
}

/// BGR Mat をフレームに変換
pub fn mat_to_frame(mat: &Mat) -> Result<Frame> {
    let owned;
    let mat = if mat.is_continuous() {
        mat
    } else {
        owned = mat.try_clone()?;
        &owned
    };
    let bytes = mat.data_bytes().context("Failed to access frame data")?;
    Ok(Frame::from_bgr(mat.cols() as u32, mat.rows() as u32, bytes))
}

/// フレームを所有権付きの BGR (CV_8UC3) Mat に変換
pub fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    if frame.width == 0 || frame.height == 0 {
        return Ok(Mat::default());
    }
    let bgr: Vec<Vec3b> = frame
        .pixels
        .iter()
        .map(|&p| {
            let (r, g, b) = unpack_rgb(p);
            Vec3b::from([b, g, r])
        })
        .collect();
    let view = Mat::new_rows_cols_with_data(frame.height as i32, frame.width as i32, &bgr)?;
    Ok(view.try_clone()?)
}

fn read_frame(capture: &mut VideoCapture) -> Result<Frame> {
    let mut mat = Mat::default();
    capture.read(&mut mat).context("Failed to read frame")?;
    if mat.empty() {
        anyhow::bail!("Empty frame received");
    }
    mat_to_frame(&mat)
}

impl CameraStream for OpenCvStream {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn bind_inline(&mut self) -> Result<()> {
        let mut capture = self
            .capture
            .take()
            .context("Camera stream already bound or stopped")?;

        // 最初のフレームが読めることを確認してからスレッドへ渡す
        let first = read_frame(&mut capture)?;
        *self
            .latest
            .lock()
            .map_err(|_| anyhow::anyhow!("frame lock poisoned"))? = Some(first);

        self.running.store(true, Ordering::Release);
        let latest = self.latest.clone();
        let running = self.running.clone();
        let ended = self.ended.clone();

        let handle = thread::Builder::new()
            .name("camera-reader".to_string())
            .spawn(move || {
                let mut failures = 0u32;
                while running.load(Ordering::Acquire) {
                    match read_frame(&mut capture) {
                        Ok(frame) => {
                            failures = 0;
                            match latest.lock() {
                                Ok(mut slot) => *slot = Some(frame),
                                Err(_) => {
                                    log::error!("Camera frame lock poisoned, stopping reader");
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            failures += 1;
                            if failures >= MAX_CONSECUTIVE_READ_FAILURES {
                                log::warn!("Camera stream ended: {:#}", e);
                                break;
                            }
                        }
                    }
                }
                ended.store(true, Ordering::Release);
                if let Err(e) = capture.release() {
                    log::warn!("Failed to release camera: {}", e);
                }
            })
            .context("Failed to spawn camera reader thread")?;

        self.handle = Some(handle);
        Ok(())
    }

    fn current_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(capture) = self.capture.as_mut() {
            return read_frame(capture).map(Some);
        }
        let slot = self
            .latest
            .lock()
            .map_err(|_| anyhow::anyhow!("frame lock poisoned"))?;
        Ok(slot.clone())
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Camera reader thread panicked");
            }
        }
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                log::warn!("Failed to release camera: {}", e);
            }
        }
        self.ended.store(true, Ordering::Release);
    }
}

impl Drop for OpenCvStream {
    fn drop(&mut self) {
        self.stop();
    }
}
