//! トラッキング状態の分類とフィードバック文言
//!
//! ```text
//! Loading -> AwaitingStream -> {TrackingHigh, TrackingLow, NoSubject} <-> ...
//!                 ^                                 |
//!                 +------- retry ------ Error <------+
//! ```

use crate::error::{AcquisitionCause, FailureCause, ModelInitFailure};
use crate::pose::LandmarkSet;

/// 平均信頼度がこれを超えれば TrackingHigh
pub const TRACKING_CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Loading,
    AwaitingStream,
    TrackingHigh,
    TrackingLow,
    NoSubject,
    Error,
}

impl PipelineStatus {
    pub fn is_tracking(self) -> bool {
        matches!(
            self,
            PipelineStatus::TrackingHigh | PipelineStatus::TrackingLow | PipelineStatus::NoSubject
        )
    }
}

/// フィードバック面へ渡す内容
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub status: PipelineStatus,
    pub text: String,
    pub confidence_percent: u8,
    /// 姿勢ガイダンス（TrackingHigh のときのみ）
    pub hint: Option<String>,
}

/// 平滑化済みセットを分類する
pub fn classify(set: &LandmarkSet) -> PipelineStatus {
    let mean = set.mean_confidence();
    if set.is_empty() || mean <= 0.0 {
        PipelineStatus::NoSubject
    } else if mean > TRACKING_CONFIDENCE_THRESHOLD {
        PipelineStatus::TrackingHigh
    } else {
        PipelineStatus::TrackingLow
    }
}

pub fn confidence_percent(set: &LandmarkSet) -> u8 {
    (set.mean_confidence().clamp(0.0, 1.0) * 100.0).round() as u8
}

pub fn status_text(status: PipelineStatus, cause: Option<&FailureCause>) -> String {
    match status {
        PipelineStatus::Loading => "Loading pose model...".to_string(),
        PipelineStatus::AwaitingStream => "Waiting for camera...".to_string(),
        PipelineStatus::TrackingHigh => "Analysing alignment...".to_string(),
        PipelineStatus::TrackingLow => "Low confidence - improve lighting or step closer".to_string(),
        PipelineStatus::NoSubject => {
            "No one detected - ensure your full torso is in view".to_string()
        }
        PipelineStatus::Error => match cause {
            Some(cause) => error_text(cause),
            None => "Something went wrong - retry".to_string(),
        },
    }
}

fn error_text(cause: &FailureCause) -> String {
    match cause {
        FailureCause::Acquisition(failure) => match failure.cause {
            AcquisitionCause::PermissionDenied => {
                "Camera permission denied - allow camera access and retry".to_string()
            }
            AcquisitionCause::InsecureContext => {
                "Camera access requires a secure context (HTTPS or localhost)".to_string()
            }
            AcquisitionCause::NoDevice => "No camera found - connect a camera and retry".to_string(),
            AcquisitionCause::Unknown => format!("Camera unavailable: {}", failure.detail),
        },
        FailureCause::Model(ModelInitFailure::HardwareUnavailable) => {
            "Hardware acceleration required for pose tracking".to_string()
        }
        FailureCause::Model(ModelInitFailure::Unknown(detail)) => {
            format!("Pose model failed to load: {}", detail)
        }
    }
}

/// 状態遷移を管理する
#[derive(Debug)]
pub struct StatusMachine {
    status: PipelineStatus,
    cause: Option<FailureCause>,
    confidence_percent: u8,
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMachine {
    pub fn new() -> Self {
        Self {
            status: PipelineStatus::Loading,
            cause: None,
            confidence_percent: 0,
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        self.cause.as_ref()
    }

    /// モデル準備完了
    pub fn model_ready(&mut self) -> bool {
        if self.status == PipelineStatus::Loading {
            self.status = PipelineStatus::AwaitingStream;
            true
        } else {
            false
        }
    }

    pub fn fail<C: Into<FailureCause>>(&mut self, cause: C) {
        self.status = PipelineStatus::Error;
        self.cause = Some(cause.into());
        self.confidence_percent = 0;
    }

    /// Error からの唯一の出口
    pub fn retry(&mut self) -> bool {
        if self.status == PipelineStatus::Error {
            self.status = PipelineStatus::AwaitingStream;
            self.cause = None;
            true
        } else {
            false
        }
    }

    /// 1フレーム分を反映する。Loading / Error 中は無視。状態が変わったら true。
    pub fn observe(&mut self, set: &LandmarkSet) -> bool {
        if matches!(self.status, PipelineStatus::Loading | PipelineStatus::Error) {
            return false;
        }
        let next = classify(set);
        self.confidence_percent = confidence_percent(set);
        let changed = next != self.status;
        self.status = next;
        changed
    }

    /// ストリーム停止後の待機状態へ戻す
    pub fn await_stream(&mut self) {
        if self.status.is_tracking() {
            self.status = PipelineStatus::AwaitingStream;
            self.confidence_percent = 0;
        }
    }

    pub fn feedback(&self, hint: Option<String>) -> Feedback {
        Feedback {
            status: self.status,
            text: status_text(self.status, self.cause.as_ref()),
            confidence_percent: self.confidence_percent,
            hint: if self.status == PipelineStatus::TrackingHigh {
                hint
            } else {
                None
            },
        }
    }
}
