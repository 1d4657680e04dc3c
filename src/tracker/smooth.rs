use crate::pose::{Landmark, LandmarkSet};

/// 前フレームの重み
pub const SMOOTHING_ALPHA: f32 = 0.5;

/// smooth() の結果
#[derive(Debug, Clone, PartialEq)]
pub struct Smoothed {
    pub set: LandmarkSet,
    /// 保持している前フレームを破棄すべきか（トラッキングロスト）
    pub reset_state: bool,
}

/// ランドマーク単位のEMA
///
/// 位置・信頼度とも `prev * α + current * (1 - α)`。
/// 前フレームにないIDはそのまま通す。
pub fn smooth(current: &LandmarkSet, previous: Option<&LandmarkSet>) -> Smoothed {
    if current.is_empty() {
        return Smoothed {
            set: LandmarkSet::new(),
            reset_state: true,
        };
    }

    let Some(previous) = previous else {
        return Smoothed {
            set: current.clone(),
            reset_state: false,
        };
    };

    let a = SMOOTHING_ALPHA;
    let set = current
        .iter()
        .map(|cur| match previous.get(cur.id) {
            Some(prev) => Landmark::new(
                cur.id,
                prev.x * a + cur.x * (1.0 - a),
                prev.y * a + cur.y * (1.0 - a),
                prev.confidence * a + cur.confidence * (1.0 - a),
            ),
            None => *cur,
        })
        .collect();

    Smoothed {
        set,
        reset_state: false,
    }
}

/// 前フレームを保持する平滑化フィルタ
///
/// 空フレームを受けたら状態を捨てる。次に検出されたフレームは生の値がそのまま出る。
#[derive(Debug, Default)]
pub struct LandmarkSmoother {
    prev: Option<LandmarkSet>,
}

impl LandmarkSmoother {
    pub fn new() -> Self {
        Self { prev: None }
    }

    pub fn apply(&mut self, current: &LandmarkSet) -> LandmarkSet {
        let smoothed = smooth(current, self.prev.as_ref());
        if smoothed.reset_state {
            self.prev = None;
        } else {
            self.prev = Some(smoothed.set.clone());
        }
        smoothed.set
    }

    pub fn state(&self) -> Option<&LandmarkSet> {
        self.prev.as_ref()
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}
