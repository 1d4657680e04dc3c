use crate::config::GuidanceTarget;
use crate::pose::JointAngle;

/// 関節角度を目標と比べて一言アドバイスを作る
pub struct PostureGuide {
    targets: Vec<GuidanceTarget>,
}

impl PostureGuide {
    pub fn new(targets: Vec<GuidanceTarget>) -> Self {
        Self { targets }
    }

    /// 許容範囲外の最初の関節についてヒントを返す。
    /// 対象関節が1つも計測されていなければ None。
    pub fn advise(&self, angles: &[JointAngle]) -> Option<String> {
        let mut measured = false;
        for target in &self.targets {
            let Some(angle) = angles.iter().find(|a| a.label == target.joint) else {
                continue;
            };
            measured = true;

            let delta = angle.degrees - target.target;
            if delta.abs() <= target.tolerance {
                continue;
            }
            // 角度が大きい = 伸びている
            let verb = if delta > 0.0 { "Bend" } else { "Straighten" };
            return Some(format!(
                "{} your {} - aim for {:.0}°",
                verb, target.joint, target.target
            ));
        }

        measured.then(|| "Good form - hold it".to_string())
    }
}
