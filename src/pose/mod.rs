pub mod angle;
pub mod detector;
pub mod keypoint;
#[cfg(feature = "desktop")]
pub mod movenet;
#[cfg(feature = "desktop")]
pub mod preprocess;

pub use angle::{
    compute_joint_angles, joint_angle, JointAngle, JointAngleSpec, ANGLE_CONFIDENCE_THRESHOLD,
    HUMANOID_JOINTS,
};
pub use detector::{AdapterOptions, Backend, InferenceAdapter, PoseModel, Subject};
pub use keypoint::{BodyPartId, Landmark, LandmarkSet, SKELETON_CONNECTIONS};
#[cfg(feature = "desktop")]
pub use movenet::MoveNetModel;
#[cfg(feature = "desktop")]
pub use preprocess::preprocess_for_movenet;
