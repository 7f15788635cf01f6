use std::thread;
use std::time::Duration;

/// Clock seam for waits between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    /// The classifier marked the error terminal.
    Stopped { error: E, attempts: u32 },
    /// Every attempt failed with a retryable error.
    Exhausted { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Stopped { attempts, .. }
            | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Bounded attempts with a fixed pause between them. No backoff growth, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after the given failed attempt (1-based).
    pub fn delay_after(&self, _attempt: u32) -> Duration {
        self.delay
    }

    /// Runs `op` until it succeeds, the classifier stops it, or the budget runs out.
    /// `on_retry` sees the failed attempt number, its error and the pause before the next.
    pub fn run<T, E>(
        &self,
        sleeper: &dyn Sleeper,
        mut op: impl FnMut(u32) -> Result<T, E>,
        classify: impl Fn(&E) -> RetryDecision,
        mut on_retry: impl FnMut(u32, &E, Duration),
    ) -> RetryOutcome<T, E> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    }
                }
                Err(error) => {
                    if classify(&error) == RetryDecision::Stop {
                        return RetryOutcome::Stopped {
                            error,
                            attempts: attempt,
                        };
                    }
                    if attempt >= self.max_attempts {
                        return RetryOutcome::Exhausted {
                            error,
                            attempts: attempt,
                        };
                    }
                    let delay = self.delay_after(attempt);
                    on_retry(attempt, &error, delay);
                    sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
