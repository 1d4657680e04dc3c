#[cfg(feature = "desktop")]
pub mod canvas;
pub mod skeleton;
pub mod surface;
#[cfg(feature = "desktop")]
pub mod window;

#[cfg(feature = "desktop")]
pub use canvas::Canvas;
pub use skeleton::{
    OverlayRenderer, KEYPOINT_COLOR, LABEL_COLOR, RENDER_CONFIDENCE_THRESHOLD, SKELETON_COLOR,
};
pub use surface::Surface;
#[cfg(feature = "desktop")]
pub use window::MinifbDisplay;
