//! # Provisioning Progress
//!
//! Client-side mirror of a server-managed tenant provisioning job:
//!
//! - [`steps`] maps the server's current step onto the fixed step order
//! - [`tracker`] is the pure `Idle -> Polling -> terminal` state machine
//! - [`controller`] drives the tracker on tokio with polling and a timeout

pub mod controller;
pub mod steps;
pub mod tracker;

pub use controller::{ProgressController, ProgressHandle};
pub use steps::{
    map_status, StepDescriptor, StepId, StepPlan, StepStatus, StepStatusMap, UnknownStepError,
};
pub use tracker::{ProgressSnapshot, ProgressTracker, TrackerAction, TrackerState};
