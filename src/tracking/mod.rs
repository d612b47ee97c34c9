pub mod controller;
pub mod state;
pub mod tick;

pub use controller::{TrackingCommand, TrackingController, TrackingDeps};
pub use state::{
    ActiveSession, ClosedSession, LabelSource, OverlayEffect, Transition, TrackingState,
    DWELL_THRESHOLD_MS,
};
