use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::camera::{Acquired, AcquisitionTier, CameraStream};

/// ループの実行フラグ。クローンして別スレッドから止められる。
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn arm(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// 取得済みストリームの唯一の所有者
///
/// 解放時は実行フラグを先に落としてからデバイスを止める。
pub struct SessionHandle {
    stream: Box<dyn CameraStream>,
    tier: AcquisitionTier,
    run: StopHandle,
}

impl SessionHandle {
    pub fn new(acquired: Acquired, run: StopHandle) -> Self {
        run.arm();
        Self {
            stream: acquired.stream,
            tier: acquired.tier,
            run,
        }
    }

    pub fn tier(&self) -> AcquisitionTier {
        self.tier
    }

    pub fn is_running(&self) -> bool {
        self.run.is_running()
    }

    pub fn stream(&self) -> &dyn CameraStream {
        self.stream.as_ref()
    }

    pub fn stream_mut(&mut self) -> &mut dyn CameraStream {
        self.stream.as_mut()
    }

    /// 明示的に解放する（Drop と同じ）
    pub fn release(self) {}
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.run.stop();
        self.stream.stop();
        log::info!("Camera session ({:?} tier) released", self.tier);
    }
}
