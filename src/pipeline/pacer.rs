use std::thread;
use std::time::{Duration, Instant};

use crate::render::Surface;

/// 表示リフレッシュの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// 次のフレームを描いてよい。`skipped` は取りこぼしたリフレッシュ数。
    Ready { skipped: u32 },
    /// 表示が閉じられた
    Closed,
}

/// 表示リフレッシュに同期する描画先
pub trait Display: Surface {
    /// 前回描いた内容を表示し、次のリフレッシュまで待つ
    fn next_refresh(&mut self) -> Refresh;
}

/// 固定周期のリフレッシュを模したペーサー
///
/// 反復が周期を超えた場合、過ぎたリフレッシュは溜めずに捨てて次の境界まで待つ。
#[derive(Debug)]
pub struct FramePacer {
    period: Duration,
    next: Option<Instant>,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            next: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 次のリフレッシュまでスリープし、取りこぼし数を返す
    pub fn wait(&mut self) -> u32 {
        let (delay, skipped) = self.schedule(Instant::now());
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        skipped
    }

    /// `now` 時点から次のリフレッシュまでの待ち時間と取りこぼし数
    pub fn schedule(&mut self, now: Instant) -> (Duration, u32) {
        let Some(next) = self.next else {
            self.next = Some(now + self.period);
            return (Duration::ZERO, 0);
        };

        if now <= next {
            self.next = Some(next + self.period);
            return (next - now, 0);
        }

        // next 以降 now までに過ぎた境界はすべて捨てる
        let late = (now - next).as_nanos();
        let missed = (late / self.period.as_nanos().max(1)) as u32 + 1;
        let target = next + self.period * missed;
        self.next = Some(target + self.period);
        (target - now, missed)
    }
}
