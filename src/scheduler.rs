use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

struct Timer {
    period: watch::Sender<Duration>,
    handle: JoinHandle<()>,
}

/// Named recurring timers. A timer first fires one period after it is armed;
/// a zero or out-of-range period keeps it disarmed until rescheduled.
#[derive(Default)]
pub struct Scheduler {
    timers: Mutex<HashMap<String, Timer>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `callback` every `period`. Registering an existing name replaces it.
    pub fn register<F, Fut>(&self, name: &str, period: Duration, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = watch::channel(period);
        let timer_name = name.to_owned();

        let handle = tokio::spawn(async move {
            loop {
                let period = *rx.borrow_and_update();

                /* Two periods must fit, the interval adds one after every tick */
                let now = Instant::now();
                let start = Some(period)
                    .filter(|p| !p.is_zero())
                    .and_then(|p| p.checked_mul(2))
                    .and_then(|p| now.checked_add(p))
                    .map(|_| now + period);

                let start = match start {
                    Some(start) => start,
                    None => {
                        if period.is_zero() {
                            log::debug!("Timer {} disarmed", timer_name);
                        } else {
                            log::warn!(
                                "Timer {} disarmed, period {:?} out of range",
                                timer_name,
                                period
                            );
                        }
                        if rx.changed().await.is_err() {
                            return;
                        }
                        continue;
                    }
                };

                let mut interval = time::interval_at(start, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            log::trace!("Timer {} fired", timer_name);
                            callback().await;
                        }
                        changed = rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            log::debug!("Timer {} rearmed", timer_name);
                            break;
                        }
                    }
                }
            }
        });

        if let Ok(mut timers) = self.timers.lock() {
            if let Some(old) = timers.insert(name.to_owned(), Timer { period: tx, handle }) {
                old.handle.abort();
            }
        }
    }

    /// Re-arm timer `name` with `period`. Returns `false` for unknown timers.
    pub fn reschedule(&self, name: &str, period: Duration) -> bool {
        self.timers
            .lock()
            .ok()
            .and_then(|timers| timers.get(name).map(|t| t.period.send(period).is_ok()))
            .unwrap_or(false)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Ok(timers) = self.timers.lock() {
            for timer in timers.values() {
                timer.handle.abort();
            }
        }
    }
}
