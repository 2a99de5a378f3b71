use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Runs `operation` up to `1 + retries` times while it fails with a
/// connection-level error. The pause starts at `delay_ms` and doubles after
/// each failed attempt.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut delay = Duration::from_millis(delay_ms);
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(err) if attempt <= retries && is_retryable(&err) => {
                debug!("Request attempt {attempt} of {} failed: {err}", retries + 1);
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Connection problems are retried; an HTTP error status is an answer.
fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

/// Strips query parameters from URLs embedded in error messages.
pub fn redact_query(message: &str) -> String {
    match message.find('?') {
        Some(idx) => format!("{}?<query redacted>", &message[..idx]),
        None => message.to_string(),
    }
}
