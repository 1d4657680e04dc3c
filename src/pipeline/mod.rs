pub mod pacer;
pub mod scheduler;
pub mod session;
pub mod stats;

pub use pacer::{Display, FramePacer, Refresh};
pub use scheduler::{FeedbackSink, PosePipeline, StopReason, Tick};
pub use session::{SessionHandle, StopHandle};
pub use stats::SessionStats;
