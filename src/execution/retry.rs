use std::fmt::Display;
use std::future::Future;

/// Run `attempt` up to `max_attempts` times, stopping at the first success.
///
/// The attempt number (starting at 1) is passed to each call. On exhaustion
/// every failure is returned in order.
pub async fn bounded<T, E, F, Fut>(max_attempts: u32, mut attempt: F) -> Result<T, Vec<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut failures = Vec::new();

    for n in 1..=max_attempts {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!("Attempt {}/{} failed: {}", n, max_attempts, e);
                failures.push(e);
            }
        }
    }

    Err(failures)
}
