//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch to backend:
//!     → timeouts.rs (configured bound ∧ caller's grpc-timeout)
//!     → On expiry: future dropped, DeadlineExceeded returned
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - No retries: routing and auth outcomes are deterministic, and business
//!   errors are passed through as-is

pub mod timeouts;
