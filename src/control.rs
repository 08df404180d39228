// Control plane: admission control and per-protocol circuit breakers
//
// Concurrency limiting for bridge() calls and sliding-window failure
// tracking that temporarily removes a misbehaving protocol from route
// comparison.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tracing::debug;

use crate::protocols::ProtocolId;

#[derive(Clone)]
pub struct AdmissionControl {
    max_inflight: Arc<Semaphore>,
}

impl AdmissionControl {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            max_inflight: Arc::new(Semaphore::new(max_inflight)),
        }
    }

    /// Acquire an admission permit respecting max inflight bridge attempts.
    pub async fn acquire(&self) -> AdmissionPermit {
        let permit = self
            .max_inflight
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore not closed");
        AdmissionPermit { _permit: permit }
    }
}

pub struct AdmissionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[derive(Clone, Default)]
pub struct CircuitBreakers {
    inner: Arc<Mutex<HashMap<ProtocolId, Breaker>>>,
}

struct Breaker {
    window: VecDeque<bool>, // true = failure
    max_window: usize,
    threshold: f32,
    min_samples: usize,
    open_until: Option<Instant>,
    open_cooldown: Duration,
}

impl Default for Breaker {
    fn default() -> Self {
        Self {
            window: VecDeque::with_capacity(50),
            max_window: 50,
            threshold: 0.5,
            min_samples: 10,
            open_until: None,
            open_cooldown: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakers {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_open(&self, protocol: ProtocolId) -> bool {
        let mut inner = self.inner.lock().await;
        let b = inner.entry(protocol).or_default();
        if let Some(until) = b.open_until {
            if Instant::now() < until {
                return true;
            }
            b.open_until = None;
        }
        false
    }

    pub async fn record_success(&self, protocol: ProtocolId) {
        self.record(protocol, false).await;
    }

    pub async fn record_failure(&self, protocol: ProtocolId) {
        self.record(protocol, true).await;
    }

    async fn record(&self, protocol: ProtocolId, failure: bool) {
        let mut inner = self.inner.lock().await;
        let b = inner.entry(protocol).or_default();
        if b.window.len() == b.max_window {
            b.window.pop_front();
        }
        b.window.push_back(failure);

        let samples = b.window.len();
        if samples >= b.min_samples {
            let fails = b.window.iter().filter(|x| **x).count();
            let rate = fails as f32 / samples as f32;
            if rate >= b.threshold && b.open_until.is_none() {
                b.open_until = Some(Instant::now() + b.open_cooldown);
                debug!(%protocol, rate, samples, "circuit opened");
            }
        }
    }
}
