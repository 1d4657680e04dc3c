use std::time::{Duration, Instant};

/// セッション中のカウンタ。FPS は1秒ごとに debug ログへ出す。
#[derive(Debug)]
pub struct SessionStats {
    frames: u64,
    dropped: u64,
    inference_errors: u64,
    window_start: Instant,
    window_frames: u32,
    fps: f32,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            frames: 0,
            dropped: 0,
            inference_errors: 0,
            window_start: Instant::now(),
            window_frames: 0,
            fps: 0.0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn inference_errors(&self) -> u64 {
        self.inference_errors
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn record_frame(&mut self) {
        self.record_frame_at(Instant::now());
    }

    pub fn record_dropped(&mut self, skipped: u32) {
        self.dropped += u64::from(skipped);
    }

    pub fn record_inference_error(&mut self) {
        self.inference_errors += 1;
    }

    fn record_frame_at(&mut self, now: Instant) {
        self.frames += 1;
        self.window_frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.window_frames as f32 / elapsed.as_secs_f32();
            log::debug!(
                "FPS: {:.1} (frames: {}, dropped refreshes: {}, inference errors: {})",
                self.fps,
                self.frames,
                self.dropped,
                self.inference_errors
            );
            self.window_start = now;
            self.window_frames = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = SessionStats::new();
        stats.record_frame();
        stats.record_frame();
        stats.record_dropped(3);
        stats.record_inference_error();
        assert_eq!(stats.frames(), 2);
        assert_eq!(stats.dropped(), 3);
        assert_eq!(stats.inference_errors(), 1);
    }

    #[test]
    fn test_fps_window() {
        let mut stats = SessionStats::new();
        let t0 = stats.window_start;
        for i in 1..=20 {
            stats.record_frame_at(t0 + Duration::from_millis(100 * i));
        }
        // 10フレーム目で1秒経過 → 10 FPS
        assert!((stats.fps() - 10.0).abs() < 0.01);
        assert_eq!(stats.frames(), 20);
    }
}
