pub mod capture;
pub mod frame;
#[cfg(feature = "desktop")]
pub mod opencv_host;

pub use capture::{
    Acquired, AcquisitionManager, AcquisitionTier, CameraHost, CameraStream, Constraints,
    DeviceError, Facing, StreamRequest,
};
pub use frame::Frame;
#[cfg(feature = "desktop")]
pub use opencv_host::{frame_to_mat, mat_to_frame, OpenCvHost, OpenCvStream};
