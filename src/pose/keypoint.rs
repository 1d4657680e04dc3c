use std::collections::BTreeMap;

/// MoveNet / COCO の 17 部位
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum BodyPartId {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl BodyPartId {
    pub const COUNT: usize = 17;

    pub const ALL: [BodyPartId; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// 骨格の接続定義（モデルのメタデータとしてレンダラーへ渡す）
pub const SKELETON_CONNECTIONS: [(BodyPartId, BodyPartId); 16] = [
    // 顔
    (BodyPartId::LeftEar, BodyPartId::LeftEye),
    (BodyPartId::LeftEye, BodyPartId::Nose),
    (BodyPartId::Nose, BodyPartId::RightEye),
    (BodyPartId::RightEye, BodyPartId::RightEar),
    // 上半身
    (BodyPartId::LeftShoulder, BodyPartId::RightShoulder),
    (BodyPartId::LeftShoulder, BodyPartId::LeftElbow),
    (BodyPartId::LeftElbow, BodyPartId::LeftWrist),
    (BodyPartId::RightShoulder, BodyPartId::RightElbow),
    (BodyPartId::RightElbow, BodyPartId::RightWrist),
    // 胴体
    (BodyPartId::LeftShoulder, BodyPartId::LeftHip),
    (BodyPartId::RightShoulder, BodyPartId::RightHip),
    (BodyPartId::LeftHip, BodyPartId::RightHip),
    // 下半身
    (BodyPartId::LeftHip, BodyPartId::LeftKnee),
    (BodyPartId::LeftKnee, BodyPartId::LeftAnkle),
    (BodyPartId::RightHip, BodyPartId::RightKnee),
    (BodyPartId::RightKnee, BodyPartId::RightAnkle),
];

/// 単一ランドマーク（フレームのピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub id: BodyPartId,
    pub x: f32,
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl Landmark {
    pub fn new(id: BodyPartId, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            id,
            x,
            y,
            confidence,
        }
    }

    /// 信頼度が閾値を厳密に超えているか
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }

    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// 1フレーム・1人分のランドマーク。未検出なら空。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    landmarks: BTreeMap<BodyPartId, Landmark>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, landmark: Landmark) {
        self.landmarks.insert(landmark.id, landmark);
    }

    pub fn get(&self, id: BodyPartId) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.values()
    }

    /// 全ランドマークの平均信頼度。空なら 0.0。
    pub fn mean_confidence(&self) -> f32 {
        if self.landmarks.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.landmarks.values().map(|l| l.confidence).sum();
        sum / self.landmarks.len() as f32
    }
}

impl FromIterator<Landmark> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        let mut set = LandmarkSet::new();
        for landmark in iter {
            set.insert(landmark);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_part_count() {
        assert_eq!(BodyPartId::COUNT, 17);
        assert_eq!(BodyPartId::ALL.len(), BodyPartId::COUNT);
    }

    #[test]
    fn test_body_part_from_index() {
        assert_eq!(BodyPartId::from_index(0), Some(BodyPartId::Nose));
        assert_eq!(BodyPartId::from_index(16), Some(BodyPartId::RightAnkle));
        assert_eq!(BodyPartId::from_index(17), None);
        for (i, id) in BodyPartId::ALL.iter().enumerate() {
            assert_eq!(*id as usize, i);
        }
    }

    #[test]
    fn test_landmark_exceeds_is_strict() {
        let lm = Landmark::new(BodyPartId::Nose, 10.0, 10.0, 0.3);
        assert!(!lm.exceeds(0.3));
        assert!(lm.exceeds(0.29));
    }

    #[test]
    fn test_set_insert_replaces_same_id() {
        let mut set = LandmarkSet::new();
        set.insert(Landmark::new(BodyPartId::Nose, 1.0, 1.0, 0.5));
        set.insert(Landmark::new(BodyPartId::Nose, 2.0, 2.0, 0.7));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(BodyPartId::Nose).map(|l| l.x), Some(2.0));
    }

    #[test]
    fn test_mean_confidence() {
        let set: LandmarkSet = [
            Landmark::new(BodyPartId::LeftElbow, 0.0, 0.0, 0.4),
            Landmark::new(BodyPartId::RightElbow, 0.0, 0.0, 0.8),
        ]
        .into_iter()
        .collect();
        assert!((set.mean_confidence() - 0.6).abs() < 1e-6);
        assert_eq!(LandmarkSet::new().mean_confidence(), 0.0);
    }

    #[test]
    fn test_iteration_is_ordered_by_id() {
        let set: LandmarkSet = [
            Landmark::new(BodyPartId::RightAnkle, 0.0, 0.0, 0.9),
            Landmark::new(BodyPartId::Nose, 0.0, 0.0, 0.9),
        ]
        .into_iter()
        .collect();
        let ids: Vec<_> = set.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![BodyPartId::Nose, BodyPartId::RightAnkle]);
    }
}
