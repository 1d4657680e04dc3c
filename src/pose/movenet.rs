use anyhow::{bail, Context, Result};
use ndarray::ArrayViewD;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::PathBuf;

use super::detector::{Backend, PoseModel, Subject};
use super::keypoint::{BodyPartId, Landmark, LandmarkSet, SKELETON_CONNECTIONS};
use super::preprocess::preprocess_for_movenet;
use crate::camera::Frame;

/// 出力テンソルの形 [batch, person, keypoint, (y, x, confidence)]
const OUTPUT_SHAPE: [usize; 4] = [1, 1, 17, 3];

/// MoveNet SinglePose (ONNX) による姿勢推定
pub struct MoveNetModel {
    model_path: PathBuf,
    session: Option<Session>,
}

impl MoveNetModel {
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: model_path.into(),
            session: None,
        }
    }

    fn provider(backend: Backend) -> ExecutionProviderDispatch {
        match backend {
            Backend::Cuda => CUDAExecutionProvider::default().build().error_on_failure(),
            Backend::CoreMl => CoreMLExecutionProvider::default().build().error_on_failure(),
            Backend::Cpu => CPUExecutionProvider::default().build(),
        }
    }
}

impl PoseModel for MoveNetModel {
    fn available_backends(&self) -> Vec<Backend> {
        let mut backends = Vec::new();
        if CUDAExecutionProvider::default().is_available().unwrap_or(false) {
            backends.push(Backend::Cuda);
        }
        if CoreMLExecutionProvider::default().is_available().unwrap_or(false) {
            backends.push(Backend::CoreMl);
        }
        backends.push(Backend::Cpu);
        backends
    }

    fn load(&mut self, backend: Backend) -> Result<()> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers([Self::provider(backend)])?
            .commit_from_file(&self.model_path)
            .with_context(|| format!("Failed to load ONNX model {}", self.model_path.display()))?;
        self.session = Some(session);
        Ok(())
    }

    /// 出力 [1, 1, 17, 3] (y, x, confidence) を 1 候補に変換する
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<Subject>> {
        let session = self.session.as_mut().context("MoveNet session not loaded")?;

        let input_tensor = Tensor::from_array(preprocess_for_movenet(frame)?)?;
        let outputs = session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Inference failed")?;

        let output: ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract output tensor")?;

        let landmarks = landmarks_from_output(&output, frame.width as f32, frame.height as f32)?;
        let score = landmarks.mean_confidence();
        Ok(vec![Subject { score, landmarks }])
    }

    fn adjacency(&self) -> &[(BodyPartId, BodyPartId)] {
        &SKELETON_CONNECTIONS
    }
}

/// 正規化座標の出力をフレームのピクセル座標に直す
fn landmarks_from_output(
    output: &ArrayViewD<f32>,
    width: f32,
    height: f32,
) -> Result<LandmarkSet> {
    if output.shape() != OUTPUT_SHAPE {
        bail!(
            "Unexpected MoveNet output shape {:?} (expected {:?})",
            output.shape(),
            OUTPUT_SHAPE
        );
    }

    Ok(BodyPartId::ALL
        .iter()
        .map(|&id| {
            let i = id as usize;
            let y = output[[0, 0, i, 0]];
            let x = output[[0, 0, i, 1]];
            let confidence = output[[0, 0, i, 2]];
            Landmark::new(id, x * width, y * height, confidence)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_output_scaled_to_frame() {
        let mut output = ArrayD::<f32>::zeros(IxDyn(&OUTPUT_SHAPE));
        let nose = BodyPartId::Nose as usize;
        output[[0, 0, nose, 0]] = 0.25;
        output[[0, 0, nose, 1]] = 0.5;
        output[[0, 0, nose, 2]] = 0.8;

        let set = landmarks_from_output(&output.view(), 640.0, 480.0).unwrap();
        assert_eq!(set.len(), 17);
        let lm = set.get(BodyPartId::Nose).unwrap();
        assert!((lm.x - 320.0).abs() < 1e-3);
        assert!((lm.y - 120.0).abs() < 1e-3);
        assert!((lm.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_unexpected_shape_is_error() {
        // MultiPose の [1, 6, 56] など
        let output = ArrayD::<f32>::zeros(IxDyn(&[1, 6, 56]));
        let err = landmarks_from_output(&output.view(), 640.0, 480.0).unwrap_err();
        assert!(err.to_string().contains("Unexpected MoveNet output shape"));

        let short = ArrayD::<f32>::zeros(IxDyn(&[1, 1, 5, 3]));
        assert!(landmarks_from_output(&short.view(), 640.0, 480.0).is_err());
    }
}
