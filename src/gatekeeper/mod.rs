//! Gatekeeper module: abuse controls for the unauthenticated boundary.

pub mod attempt_limiter;

pub use attempt_limiter::AttemptLimiter;
