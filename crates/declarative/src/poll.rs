//! Fixed-interval polling until a remote operation reaches a terminal state.

use std::thread;
use std::time::{Duration, Instant};

/// Polling configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two probes
    pub interval: Duration,
    /// Overall deadline; `None` polls until a terminal state is observed
    pub deadline: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            deadline: None,
        }
    }
}

impl PollConfig {
    /// Configuration that never sleeps, for tests.
    pub fn immediate() -> Self {
        Self {
            interval: Duration::ZERO,
            deadline: None,
        }
    }
}

/// What a single probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    /// Still in flight; carries the observed status for reporting
    Pending(String),
    /// Terminal
    Ready(T),
}

/// Receives a notification each time a probe is still pending.
pub trait PollObserver {
    /// # Arguments
    /// * `attempt` - Probe number that just ran (1-indexed)
    /// * `status` - Status reported by that probe
    fn on_pending(&self, attempt: u32, status: &str);
}


/// Why polling stopped without a terminal result.
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error(transparent)]
    Probe(E),

    #[error("gave up after {attempts} attempts ({elapsed:?})")]
    DeadlineExceeded { attempts: u32, elapsed: Duration },
}

/// Run `probe` until it reports [`Poll::Ready`] or fails.
///
/// The first probe runs immediately; later probes wait `config.interval`.
/// A probe error ends polling at once and is never retried.
pub fn poll_until<T, E, F>(
    config: &PollConfig,
    observer: Option<&dyn PollObserver>,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Result<Poll<T>, E>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match probe(attempt).map_err(PollError::Probe)? {
            Poll::Ready(value) => return Ok(value),
            Poll::Pending(status) => {
                log::debug!("poll attempt {attempt}: still {status}");
                if let Some(observer) = observer {
                    observer.on_pending(attempt, &status);
                }
            }
        }

        if let Some(deadline) = config.deadline {
            let elapsed = started.elapsed();
            if elapsed + config.interval > deadline {
                return Err(PollError::DeadlineExceeded {
                    attempts: attempt,
                    elapsed,
                });
            }
        }

        if !config.interval.is_zero() {
            thread::sleep(config.interval);
        }
    }
}
