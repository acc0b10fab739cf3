//! In-memory collaborators for unit tests

use crate::clock::Clock;
use crate::cluster::{ControlPlane, WorkloadRef};
use crate::error::{ControlPlaneError, MetricsError};
use crate::metrics::MetricsSource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Control plane holding a single replica count in memory
pub struct FakeControlPlane {
    replicas: Mutex<i32>,
    writes: Mutex<Vec<i32>>,
    reads: AtomicUsize,
    failures_remaining: AtomicU32,
    read_failures_remaining: AtomicU32,
    permanent_failure: AtomicBool,
}

impl FakeControlPlane {
    pub fn new(replicas: i32) -> Self {
        Self {
            replicas: Mutex::new(replicas),
            writes: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            failures_remaining: AtomicU32::new(0),
            read_failures_remaining: AtomicU32::new(0),
            permanent_failure: AtomicBool::new(false),
        }
    }

    /// Fail the next `n` calls with a retryable error
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` reads with a retryable error; writes keep working
    pub fn fail_reads(&self, n: u32) {
        self.read_failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Fail every call with a non-retryable error
    pub fn fail_permanently(&self) {
        self.permanent_failure.store(true, Ordering::SeqCst);
    }

    pub fn replicas(&self) -> i32 {
        *self.replicas.lock().unwrap()
    }

    /// Change the live count behind the controller's back
    pub fn set_live(&self, replicas: i32) {
        *self.replicas.lock().unwrap() = replicas;
    }

    pub fn writes(&self) -> Vec<i32> {
        self.writes.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), ControlPlaneError> {
        if self.permanent_failure.load(Ordering::SeqCst) {
            return Err(ControlPlaneError::MissingReplicas);
        }
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(ControlPlaneError::Unavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn read_replica_count(&self, _workload: &WorkloadRef) -> Result<i32, ControlPlaneError> {
        self.check_failure()?;
        let remaining = self.read_failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.read_failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ControlPlaneError::Timeout(Duration::from_secs(10)));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.replicas())
    }

    async fn patch_replica_count(
        &self,
        _workload: &WorkloadRef,
        target: i32,
    ) -> Result<(), ControlPlaneError> {
        self.check_failure()?;
        self.writes.lock().unwrap().push(target);
        *self.replicas.lock().unwrap() = target;
        Ok(())
    }
}

/// Metrics source replaying queued results, then a steady value
pub struct FakeMetricsSource {
    queued: Mutex<VecDeque<Result<f64, MetricsError>>>,
    steady: Mutex<f64>,
    queries: AtomicUsize,
}

impl FakeMetricsSource {
    /// `steady` is the raw rate returned once the queue is empty
    pub fn new(steady: f64) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            steady: Mutex::new(steady),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn push_ok(&self, raw: f64) {
        self.queued.lock().unwrap().push_back(Ok(raw));
    }

    pub fn push_err(&self) {
        self.queued
            .lock()
            .unwrap()
            .push_back(Err(MetricsError::EmptyResult));
    }

    pub fn set_steady(&self, raw: f64) {
        *self.steady.lock().unwrap() = raw;
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSource for FakeMetricsSource {
    async fn instant_query(&self, _query: &str) -> Result<f64, MetricsError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.queued.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(*self.steady.lock().unwrap()),
        }
    }
}

/// Clock that returns immediately and remembers every requested wait
#[derive(Default)]
pub struct RecordingClock {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}
