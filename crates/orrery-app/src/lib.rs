//! Orrery application: window, event loop and per-frame scheduling.

pub mod scheduler;
pub mod window;

pub use scheduler::{FrameOutcome, FrameScheduler, MotionTargets, resize_view};
pub use window::{AppError, AppState, run};
