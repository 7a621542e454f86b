//! Timeout enforcement.
//!
//! # Responsibilities
//! - Parse the caller's `grpc-timeout` metadata
//! - Combine it with the configured backend bound
//! - Run a backend call under the resulting deadline
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; expiry drops (cancels) the call
//! - Timeout errors are distinct from other errors
//! - Timed-out requests return 504 / DEADLINE_EXCEEDED

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Metadata key carrying the caller's deadline.
pub const GRPC_TIMEOUT: &str = "grpc-timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Parse a `grpc-timeout` value: up to 8 ASCII digits and a unit
/// (`H`, `M`, `S`, `m`, `u`, `n`).
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.len() < 2 || value.len() > 9 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    let duration = match unit {
        "H" => Duration::from_secs(amount.checked_mul(3600)?),
        "M" => Duration::from_secs(amount.checked_mul(60)?),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

/// The tighter of the configured bound and the caller's own deadline.
pub fn effective_deadline(configured: Duration, requested: Option<Duration>) -> Duration {
    match requested {
        Some(requested) => configured.min(requested),
        None => configured,
    }
}

/// Run `fut` for at most `deadline`.
pub async fn with_deadline<F: Future>(deadline: Duration, fut: F) -> Result<F::Output, DeadlineExceeded> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| DeadlineExceeded(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grpc_timeout() {
        assert_eq!(parse_grpc_timeout("1H"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_grpc_timeout("2M"), Some(Duration::from_secs(120)));
        assert_eq!(parse_grpc_timeout("30S"), Some(Duration::from_secs(30)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("10u"), Some(Duration::from_micros(10)));
        assert_eq!(parse_grpc_timeout("99999999n"), Some(Duration::from_nanos(99_999_999)));

        assert_eq!(parse_grpc_timeout("S"), None);
        assert_eq!(parse_grpc_timeout("10"), None);
        assert_eq!(parse_grpc_timeout("10s"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
        assert_eq!(parse_grpc_timeout("-1S"), None);
    }

    #[test]
    fn test_effective_deadline() {
        let configured = Duration::from_secs(10);
        assert_eq!(effective_deadline(configured, None), configured);
        assert_eq!(
            effective_deadline(configured, Some(Duration::from_millis(5))),
            Duration::from_millis(5)
        );
        assert_eq!(effective_deadline(configured, Some(Duration::from_secs(60))), configured);
    }

    #[tokio::test]
    async fn test_with_deadline() {
        assert_eq!(with_deadline(Duration::from_secs(1), async { 7 }).await, Ok(7));

        let slow = tokio::time::sleep(Duration::from_secs(5));
        let err = with_deadline(Duration::from_millis(10), slow).await.unwrap_err();
        assert_eq!(err, DeadlineExceeded(Duration::from_millis(10)));
    }
}
