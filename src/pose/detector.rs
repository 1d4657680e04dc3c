use anyhow::Result;
use serde::Deserialize;

use super::keypoint::{BodyPartId, LandmarkSet};
use crate::camera::Frame;
use crate::error::ModelInitFailure;

/// 推論の実行バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Cuda,
    CoreMl,
    Cpu,
}

impl Backend {
    pub fn is_accelerated(self) -> bool {
        !matches!(self, Backend::Cpu)
    }
}

/// モデルが返す候補人物
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub score: f32,
    pub landmarks: LandmarkSet,
}

/// 外部の姿勢推定モデル
pub trait PoseModel {
    /// このホストで使えるバックエンド
    fn available_backends(&self) -> Vec<Backend>;

    /// 重みを読み込む
    fn load(&mut self, backend: Backend) -> Result<()>;

    /// 1フレーム分の推論。候補がなければ空。
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<Subject>>;

    /// 解剖学的に隣接する部位ペア
    fn adjacency(&self) -> &[(BodyPartId, BodyPartId)];
}

/// 推論アダプタの設定
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub backends: Vec<Backend>,
    pub require_acceleration: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            backends: vec![Backend::Cuda, Backend::CoreMl, Backend::Cpu],
            require_acceleration: false,
        }
    }
}

/// モデルのライフサイクルを管理し、フレームを1人分のランドマークに変換する
pub struct InferenceAdapter<M: PoseModel> {
    model: M,
    options: AdapterOptions,
    backend: Option<Backend>,
}

impl<M: PoseModel> InferenceAdapter<M> {
    pub fn new(model: M, options: AdapterOptions) -> Self {
        Self {
            model,
            options,
            backend: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Option<Backend> {
        self.backend
    }

    pub fn adjacency(&self) -> &[(BodyPartId, BodyPartId)] {
        self.model.adjacency()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// バックエンドを選んでモデルを読み込む。読み込み済みなら何もしない。
    pub fn initialize(&mut self) -> Result<Backend, ModelInitFailure> {
        if let Some(backend) = self.backend {
            return Ok(backend);
        }

        let available = self.model.available_backends();
        let backend = self
            .options
            .backends
            .iter()
            .copied()
            .filter(|b| !self.options.require_acceleration || b.is_accelerated())
            .find(|b| available.contains(b))
            .ok_or(ModelInitFailure::HardwareUnavailable)?;

        self.model
            .load(backend)
            .map_err(|e| ModelInitFailure::unknown(format!("{:#}", e)))?;

        log::info!("Pose model loaded on {:?} backend", backend);
        self.backend = Some(backend);
        Ok(backend)
    }

    /// 最もスコアの高い1人だけを返す。未検出は空（エラーではない）。
    pub fn estimate(&mut self, frame: &Frame) -> Result<LandmarkSet> {
        if self.backend.is_none() {
            anyhow::bail!("Pose model is not initialized");
        }

        let best = self
            .model
            .estimate(frame)?
            .into_iter()
            .filter(|s| !s.landmarks.is_empty())
            .max_by(|a, b| a.score.total_cmp(&b.score));

        Ok(best.map(|s| s.landmarks).unwrap_or_default())
    }
}
