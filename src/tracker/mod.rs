pub mod guidance;
pub mod smooth;
pub mod status;

pub use guidance::PostureGuide;
pub use smooth::{smooth, LandmarkSmoother, Smoothed, SMOOTHING_ALPHA};
pub use status::{
    classify, Feedback, PipelineStatus, StatusMachine, TRACKING_CONFIDENCE_THRESHOLD,
};
