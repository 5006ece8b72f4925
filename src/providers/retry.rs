use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

const MAX_ATTEMPTS: usize = 3;
const BASE_DELAY: Duration = Duration::from_secs(2);
const MAX_DELAY: Duration = Duration::from_secs(20);

/// Only throttling and temporary unavailability are worth another attempt.
pub(crate) fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Doubling delay for one request, capped in both attempts and wait time.
#[derive(Debug)]
pub(crate) struct Backoff {
    attempt: usize,
    delay: Duration,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self {
            attempt: 1,
            delay: BASE_DELAY,
        }
    }

    /// The wait before the next attempt, or `None` once attempts are used up.
    /// A server-provided `retry_after` longer than the current delay wins.
    pub(crate) fn next_wait(&mut self, retry_after: Option<Duration>) -> Option<Duration> {
        if self.attempt >= MAX_ATTEMPTS {
            return None;
        }
        self.attempt += 1;
        let wait = retry_after.map_or(self.delay, |hint| hint.max(self.delay)).min(MAX_DELAY);
        self.delay = (self.delay * 2).min(MAX_DELAY);
        Some(wait)
    }

    pub(crate) async fn wait(&mut self, provider: &str, retry_after: Option<Duration>) -> bool {
        let Some(wait) = self.next_wait(retry_after) else {
            return false;
        };
        warn!(
            "{} throttled; retrying in {:.1}s (attempt {}/{})",
            provider,
            wait.as_secs_f32(),
            self.attempt,
            MAX_ATTEMPTS
        );
        sleep(wait).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn delays_double_until_attempts_run_out() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.next_wait(None), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_wait(None), Some(Duration::from_secs(4)));
        assert_eq!(backoff.next_wait(None), None);
    }

    #[test]
    fn retry_after_hint_is_honoured_within_cap() {
        let mut backoff = Backoff::new();
        assert_eq!(
            backoff.next_wait(Some(Duration::from_secs(7))),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            backoff.next_wait(Some(Duration::from_secs(90))),
            Some(MAX_DELAY)
        );
    }

    #[test]
    fn reads_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(5)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn only_throttling_is_retryable() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }
}
