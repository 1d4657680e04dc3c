use anyhow::Result;

use super::surface::Surface;
use crate::camera::Frame;
use crate::pose::{BodyPartId, JointAngle, LandmarkSet};

/// 点・線を描くための最低信頼度（厳密に超える必要がある）
pub const RENDER_CONFIDENCE_THRESHOLD: f32 = 0.3;

/// キーポイントの色 (RGB)
pub const KEYPOINT_COLOR: u32 = 0x00FF00; // 緑

/// 骨格線の色 (RGB)
pub const SKELETON_COLOR: u32 = 0xFFFF00; // 黄色

/// 角度ラベルの色 (RGB)
pub const LABEL_COLOR: u32 = 0xFFFFFF; // 白

/// フレームと骨格を毎回まるごと描き直すレンダラー
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    point_radius: i32,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(4)
    }
}

impl OverlayRenderer {
    pub fn new(point_radius: i32) -> Self {
        Self { point_radius }
    }

    pub fn draw<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        frame: &Frame,
        set: &LandmarkSet,
        angles: &[JointAngle],
        adjacency: &[(BodyPartId, BodyPartId)],
    ) -> Result<()> {
        surface.clear()?;
        surface.draw_image(frame)?;

        for lm in set.iter().filter(|l| l.exceeds(RENDER_CONFIDENCE_THRESHOLD)) {
            let (px, py) = lm.to_pixel();
            surface.draw_circle(px, py, self.point_radius, KEYPOINT_COLOR)?;
        }

        for (start_id, end_id) in adjacency {
            let (Some(start), Some(end)) = (set.get(*start_id), set.get(*end_id)) else {
                continue;
            };
            if start.exceeds(RENDER_CONFIDENCE_THRESHOLD) && end.exceeds(RENDER_CONFIDENCE_THRESHOLD) {
                let (x1, y1) = start.to_pixel();
                let (x2, y2) = end.to_pixel();
                surface.draw_line(x1, y1, x2, y2, SKELETON_COLOR)?;
            }
        }

        // 頂点の右上にずらして点と重ならないようにする
        // Hershey フォントに ° が無いので数値のみ
        let offset = self.point_radius + 2;
        for angle in angles {
            let label = format!("{:.0}", angle.degrees);
            surface.draw_text(
                angle.x.round() as i32 + offset,
                angle.y.round() as i32 - offset,
                &label,
                LABEL_COLOR,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;
    use crate::render::surface::testing::{Op, Recorder};

    const ARM: [(BodyPartId, BodyPartId); 2] = [
        (BodyPartId::LeftShoulder, BodyPartId::LeftElbow),
        (BodyPartId::LeftElbow, BodyPartId::LeftWrist),
    ];

    fn arm(wrist_confidence: f32) -> LandmarkSet {
        [
            Landmark::new(BodyPartId::LeftShoulder, 10.0, 10.0, 0.9),
            Landmark::new(BodyPartId::LeftElbow, 20.0, 10.0, 0.9),
            Landmark::new(BodyPartId::LeftWrist, 20.0, 20.0, wrist_confidence),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_draw_order_and_filtering() {
        let mut surface = Recorder::default();
        let angles = [JointAngle {
            label: "left elbow",
            x: 20.0,
            y: 10.0,
            degrees: 90.4,
        }];
        OverlayRenderer::default()
            .draw(
                &mut surface,
                &Frame::filled(32, 32, 0),
                &arm(0.3),
                &angles,
                &ARM,
            )
            .unwrap();
        assert_eq!(
            surface.ops,
            vec![
                Op::Clear,
                Op::Image(32, 32),
                Op::Circle(10, 10),
                Op::Circle(20, 10),
                Op::Line(10, 10, 20, 10),
                Op::Text("90".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_set_draws_only_frame() {
        let mut surface = Recorder::default();
        OverlayRenderer::default()
            .draw(
                &mut surface,
                &Frame::filled(8, 8, 0),
                &LandmarkSet::new(),
                &[],
                &ARM,
            )
            .unwrap();
        assert_eq!(surface.ops, vec![Op::Clear, Op::Image(8, 8)]);
    }

    #[test]
    fn test_each_draw_starts_with_clear() {
        let mut surface = Recorder::default();
        let renderer = OverlayRenderer::default();
        let frame = Frame::filled(32, 32, 0);
        renderer.draw(&mut surface, &frame, &arm(0.9), &[], &ARM).unwrap();
        renderer
            .draw(&mut surface, &frame, &LandmarkSet::new(), &[], &ARM)
            .unwrap();
        assert_eq!(surface.last_frame(), &[Op::Clear, Op::Image(32, 32)]);
    }
}
