/*!
 * Per-backend request throttling.
 *
 * Each backend has a requests-per-minute ceiling. A permit is granted only
 * when the number of grants in the trailing 60 seconds stays within the
 * ceiling and at least `60 / rpm` seconds have passed since the previous
 * grant. Callers wait on the backend's lock, so they are served in the
 * order they arrived. All timing goes through `tokio::time`, which lets
 * tests run against a paused clock.
 */

use log::debug;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::app_config::{BackendId, Config};
use crate::errors::ConfigError;

/// Length of the sliding window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Proof that a request may be sent now
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    pub backend: BackendId,
    pub granted_at: Instant,
    /// Time spent waiting for the permit
    pub waited: Duration,
}

#[derive(Debug)]
struct BackendLimit {
    rpm: u32,
    spacing: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl BackendLimit {
    fn new(rpm: u32) -> Self {
        Self {
            rpm,
            spacing: Duration::from_secs_f64(60.0 / rpm as f64),
            grants: Mutex::new(VecDeque::with_capacity(rpm as usize)),
        }
    }

    /// Time until the next grant is allowed, given the grants so far
    fn wait_for(&self, grants: &mut VecDeque<Instant>, now: Instant) -> Duration {
        while let Some(oldest) = grants.front() {
            if now.saturating_duration_since(*oldest) >= WINDOW {
                grants.pop_front();
            } else {
                break;
            }
        }

        let mut wait = Duration::ZERO;
        if grants.len() >= self.rpm as usize {
            if let Some(oldest) = grants.front() {
                wait = wait.max((*oldest + WINDOW).saturating_duration_since(now));
            }
        }
        if let Some(last) = grants.back() {
            wait = wait.max((*last + self.spacing).saturating_duration_since(now));
        }
        wait
    }
}

/// Rate limiter shared by all in-flight cells of a pipeline
#[derive(Debug, Default)]
pub struct RateLimiter {
    limits: HashMap<BackendId, BackendLimit>,
}

impl RateLimiter {
    /// Create a limiter from `(backend, rpm)` pairs; `None` means unlimited
    pub fn new<I>(limits: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (BackendId, Option<u32>)>,
    {
        let mut map = HashMap::new();
        for (backend, rpm) in limits {
            match rpm {
                Some(0) => {
                    return Err(ConfigError::Invalid(format!(
                        "rate limit for {} must be positive",
                        backend
                    )));
                }
                Some(rpm) => {
                    map.insert(backend, BackendLimit::new(rpm));
                }
                None => {}
            }
        }
        Ok(Self { limits: map })
    }

    /// Limiter with no throttling at all
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Build the limiter for the configured backends
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        if !config.retry.respect_rate_limits {
            return Ok(Self::unlimited());
        }
        Self::new(
            BackendId::all()
                .into_iter()
                .map(|id| (id, config.apis.get(id).rate_limit_rpm)),
        )
    }

    /// Configured requests per minute for a backend
    pub fn limit(&self, backend: BackendId) -> Option<u32> {
        self.limits.get(&backend).map(|l| l.rpm)
    }

    /// Wait until a request to `backend` is allowed and record it
    pub async fn acquire(&self, backend: BackendId) -> Permit {
        let start = Instant::now();
        let Some(limit) = self.limits.get(&backend) else {
            return Permit {
                backend,
                granted_at: start,
                waited: Duration::ZERO,
            };
        };

        let mut grants = limit.grants.lock().await;
        loop {
            let now = Instant::now();
            let wait = limit.wait_for(&mut grants, now);
            if wait.is_zero() {
                grants.push_back(now);
                let waited = now.saturating_duration_since(start);
                if !waited.is_zero() {
                    debug!("Rate limit for {}: waited {:.2}s", backend, waited.as_secs_f64());
                }
                return Permit {
                    backend,
                    granted_at: now,
                    waited,
                };
            }
            // The lock stays held so later callers queue behind this one
            tokio::time::sleep(wait).await;
        }
    }

    /// Time a caller would currently wait for a permit
    pub async fn wait_time(&self, backend: BackendId) -> Duration {
        match self.limits.get(&backend) {
            Some(limit) => {
                let mut grants = limit.grants.lock().await;
                limit.wait_for(&mut grants, Instant::now())
            }
            None => Duration::ZERO,
        }
    }
}
