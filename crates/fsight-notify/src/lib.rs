//! Change notification fan-out for the FrameSight pipeline.
//!
//! This crate provides:
//! - Project-scoped subscriptions with backpressure-aware delivery
//! - A change-feed tail with reconnect backoff
//! - A polling fallback with a UX-driven throttle policy

pub mod notifier;
pub mod poller;
pub mod throttle;

pub use notifier::{ChangeNotifier, NotificationStream, NotifierConfig};
pub use poller::{PollerConfig, StatusPoller};
pub use throttle::ThrottlePolicy;
