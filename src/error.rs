//! パイプラインの終端エラー
//!
//! どちらも明示的なリトライまでセッションを止める。フレーム単位の推論エラーは
//! ここに含めない（`anyhow::Error` のままスケジューラで握りつぶす）。

use thiserror::Error;

/// カメラ取得失敗の原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionCause {
    PermissionDenied,
    InsecureContext,
    NoDevice,
    Unknown,
}

/// 全ティアを試しても取得できなかった
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("camera acquisition failed ({cause:?}): {detail}")]
pub struct AcquisitionFailure {
    pub cause: AcquisitionCause,
    pub detail: String,
}

impl AcquisitionFailure {
    pub fn new<S: Into<String>>(cause: AcquisitionCause, detail: S) -> Self {
        Self {
            cause,
            detail: detail.into(),
        }
    }
}

/// モデル初期化失敗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelInitFailure {
    /// 使えるアクセラレーション付き実行バックエンドがない
    #[error("no usable execution backend (hardware acceleration required)")]
    HardwareUnavailable,

    #[error("model initialization failed: {0}")]
    Unknown(String),
}

impl ModelInitFailure {
    pub fn unknown<S: Into<String>>(msg: S) -> Self {
        Self::Unknown(msg.into())
    }
}

/// `Error` 状態が保持する診断原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    Acquisition(AcquisitionFailure),
    Model(ModelInitFailure),
}

impl From<AcquisitionFailure> for FailureCause {
    fn from(e: AcquisitionFailure) -> Self {
        Self::Acquisition(e)
    }
}

impl From<ModelInitFailure> for FailureCause {
    fn from(e: ModelInitFailure) -> Self {
        Self::Model(e)
    }
}

/// パイプライン操作のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline is not ready to stream (model not loaded or in error state)")]
    NotReady,

    #[error(transparent)]
    Acquisition(#[from] AcquisitionFailure),

    #[error(transparent)]
    Model(#[from] ModelInitFailure),
}
