//! カメラ取得のフォールバック戦略
//!
//! 理想条件 → 条件なし → レガシー の順に試し、最初に成功したストリームを返す。

use anyhow::Result;
use serde::Deserialize;
use thiserror::Error;

use super::frame::Frame;
use crate::error::{AcquisitionCause, AcquisitionFailure};

/// カメラの向き
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    Back,
}

/// 理想的な取得条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraints {
    pub facing: Facing,
    pub width: u32,
    pub height: u32,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            facing: Facing::Front,
            width: 640,
            height: 480,
        }
    }
}

/// ホストへのデバイス要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRequest {
    Constrained(Constraints),
    Unconstrained,
    Legacy,
}

/// 取得ティア（試行順）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionTier {
    Ideal,
    Unconstrained,
    Legacy,
}

impl AcquisitionTier {
    pub const ORDER: [AcquisitionTier; 3] = [Self::Ideal, Self::Unconstrained, Self::Legacy];
}

/// ホストが返すデバイスエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("no matching camera device")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

/// 取得済みのカメラストリーム
pub trait CameraStream {
    fn resolution(&self) -> (u32, u32);

    /// ノンブロッキング再生にバインドする。以後 `current_frame` は待たない。
    fn bind_inline(&mut self) -> Result<()>;

    /// 最新フレーム。まだ届いていなければ None。
    fn current_frame(&mut self) -> Result<Option<Frame>>;

    fn is_ended(&self) -> bool;

    /// 全トラックを停止してデバイスを解放する。複数回呼んでもよい。
    fn stop(&mut self);
}

/// カメラデバイスを提供するホスト環境
pub trait CameraHost {
    fn request(&self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, DeviceError>;

    /// 代替の取得手段を持つか
    fn has_legacy_capability(&self) -> bool;

    fn is_secure_context(&self) -> bool;
}

/// 取得に成功したストリームと、成功したティア
pub struct Acquired {
    pub stream: Box<dyn CameraStream>,
    pub tier: AcquisitionTier,
}

pub struct AcquisitionManager<H: CameraHost> {
    host: H,
    constraints: Constraints,
}

impl<H: CameraHost> AcquisitionManager<H> {
    pub fn new(host: H, constraints: Constraints) -> Self {
        Self { host, constraints }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// ティアを順に試す。成功したらそこで打ち切る。
    ///
    /// 既存のストリームは呼び出し側が先に解放しておくこと。
    pub fn acquire(&self) -> Result<Acquired, AcquisitionFailure> {
        let mut errors = Vec::new();

        for tier in AcquisitionTier::ORDER {
            let request = match tier {
                AcquisitionTier::Ideal => StreamRequest::Constrained(self.constraints),
                AcquisitionTier::Unconstrained => StreamRequest::Unconstrained,
                AcquisitionTier::Legacy => {
                    if !self.host.has_legacy_capability() {
                        log::debug!("Host has no legacy capture capability, skipping");
                        continue;
                    }
                    StreamRequest::Legacy
                }
            };

            let mut stream = match self.host.request(&request) {
                Ok(stream) => stream,
                Err(e) => {
                    log::warn!("Camera tier {:?} failed: {}", tier, e);
                    errors.push(e);
                    continue;
                }
            };

            if let Err(e) = stream.bind_inline() {
                log::warn!("Camera tier {:?} opened but could not bind: {:#}", tier, e);
                stream.stop();
                errors.push(DeviceError::Other(format!("{:#}", e)));
                continue;
            }

            let (w, h) = stream.resolution();
            log::info!("Camera acquired via {:?} tier at {}x{}", tier, w, h);
            return Ok(Acquired { stream, tier });
        }

        Err(self.diagnose(&errors))
    }

    fn diagnose(&self, errors: &[DeviceError]) -> AcquisitionFailure {
        let detail = errors
            .last()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no acquisition tier available".to_string());

        if !self.host.is_secure_context() {
            return AcquisitionFailure::new(AcquisitionCause::InsecureContext, detail);
        }
        if errors.contains(&DeviceError::PermissionDenied) {
            return AcquisitionFailure::new(AcquisitionCause::PermissionDenied, detail);
        }
        if !errors.is_empty() && errors.iter().all(|e| *e == DeviceError::NotFound) {
            return AcquisitionFailure::new(AcquisitionCause::NoDevice, detail);
        }
        AcquisitionFailure::new(AcquisitionCause::Unknown, detail)
    }
}
