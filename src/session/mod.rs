//! Session coordination
//!
//! The coordinator arbitrates between wake/stop detections, idle expiry, and
//! explicit requests, and sequences the greeting and goodbye audio around a
//! paused detector.

mod coordinator;
mod idle;
mod subscription;

pub use coordinator::{Activity, EndReason, SessionCoordinator, SessionHandle, SessionSnapshot};
pub use idle::IdleTimer;
pub use subscription::{DetectorSubscription, PauseGuard, SubscriptionState};
