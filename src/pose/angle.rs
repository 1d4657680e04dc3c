//! 3点から関節角度を計算する

use super::keypoint::{BodyPartId, Landmark, LandmarkSet};

/// 角度を表示するための最低信頼度（各点とも厳密に超える必要がある）
pub const ANGLE_CONFIDENCE_THRESHOLD: f32 = 0.3;

/// 関節角度の定義 (端点A, 頂点, 端点B)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointAngleSpec {
    pub label: &'static str,
    pub endpoint_a: BodyPartId,
    pub vertex: BodyPartId,
    pub endpoint_b: BodyPartId,
}

impl JointAngleSpec {
    pub const fn new(
        label: &'static str,
        endpoint_a: BodyPartId,
        vertex: BodyPartId,
        endpoint_b: BodyPartId,
    ) -> Self {
        Self {
            label,
            endpoint_a,
            vertex,
            endpoint_b,
        }
    }
}

/// 人型骨格の標準セット: 肘 (肩-肘-手首) と膝 (腰-膝-足首)
pub const HUMANOID_JOINTS: [JointAngleSpec; 4] = [
    JointAngleSpec::new(
        "left elbow",
        BodyPartId::LeftShoulder,
        BodyPartId::LeftElbow,
        BodyPartId::LeftWrist,
    ),
    JointAngleSpec::new(
        "right elbow",
        BodyPartId::RightShoulder,
        BodyPartId::RightElbow,
        BodyPartId::RightWrist,
    ),
    JointAngleSpec::new(
        "left knee",
        BodyPartId::LeftHip,
        BodyPartId::LeftKnee,
        BodyPartId::LeftAnkle,
    ),
    JointAngleSpec::new(
        "right knee",
        BodyPartId::RightHip,
        BodyPartId::RightKnee,
        BodyPartId::RightAnkle,
    ),
];

/// 計測された関節角度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointAngle {
    pub label: &'static str,
    /// 頂点の位置（ラベル描画用）
    pub x: f32,
    pub y: f32,
    pub degrees: f32,
}

/// b を頂点とする角度 [0, 180] 度
///
/// atan2 の差の絶対値が 180 を超える場合は 360 から引く。
/// a == b や b == c でも atan2(0, 0) = 0 なので有限値を返す。
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
    let radians = f32::atan2(c.y - b.y, c.x - b.x) - f32::atan2(a.y - b.y, a.x - b.x);
    let raw = radians.to_degrees().abs();
    if raw > 180.0 {
        360.0 - raw
    } else {
        raw
    }
}

/// 各関節を計測する。3点のいずれかが閾値以下ならその関節は出力しない。
pub fn compute_joint_angles(set: &LandmarkSet, specs: &[JointAngleSpec]) -> Vec<JointAngle> {
    specs
        .iter()
        .filter_map(|spec| {
            let a = set.get(spec.endpoint_a)?;
            let b = set.get(spec.vertex)?;
            let c = set.get(spec.endpoint_b)?;
            if ![a, b, c]
                .iter()
                .all(|l| l.exceeds(ANGLE_CONFIDENCE_THRESHOLD))
            {
                return None;
            }
            Some(JointAngle {
                label: spec.label,
                x: b.x,
                y: b.y,
                degrees: joint_angle(a, b, c),
            })
        })
        .collect()
}
