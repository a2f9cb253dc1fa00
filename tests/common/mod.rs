//! Scripted session layer used by the batch command tests.
#![allow(dead_code)]

use async_trait::async_trait;
use batchwrite::{
    BatchWriteRequest, BatchWriteResponse, BatchWriteStream, CallOptions, CancellationToken,
    DbError, Result, Session, SessionProvider, TransactionId,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One step of a scripted response stream
#[derive(Clone)]
pub enum Step {
    Message(BatchWriteResponse),
    Fail(DbError),
    /// Never resolves; only cancellation or a deadline gets past it
    Hang,
}

/// Counters and captured state shared between the test and the doubles
#[derive(Default)]
pub struct Probe {
    pub acquire_calls: AtomicUsize,
    pub open_calls: AtomicUsize,
    pub dispose_calls: AtomicUsize,
    pub sessions_released: AtomicUsize,
    pub last_request: Mutex<Option<BatchWriteRequest>>,
}

impl Probe {
    pub fn acquires(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn disposals(&self) -> usize {
        self.dispose_calls.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.sessions_released.load(Ordering::SeqCst)
    }

    pub fn request(&self) -> BatchWriteRequest {
        self.last_request
            .lock()
            .unwrap()
            .clone()
            .expect("no request was sent")
    }
}

/// Session provider whose sessions replay a fixed script
pub struct ScriptedProvider {
    pub probe: Arc<Probe>,
    script: Vec<Step>,
    acquire_error: Option<DbError>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            probe: Arc::new(Probe::default()),
            script,
            acquire_error: None,
        })
    }

    pub fn failing(error: DbError) -> Arc<Self> {
        Arc::new(Self {
            probe: Arc::new(Probe::default()),
            script: Vec::new(),
            acquire_error: Some(error),
        })
    }
}

#[async_trait]
impl SessionProvider for ScriptedProvider {
    async fn acquire_session(
        &self,
        _transaction: Option<&TransactionId>,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn Session>> {
        self.probe.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.acquire_error {
            return Err(err.clone());
        }
        Ok(Box::new(ScriptedSession {
            probe: Arc::clone(&self.probe),
            script: self.script.clone(),
        }))
    }
}

struct ScriptedSession {
    probe: Arc<Probe>,
    script: Vec<Step>,
}

#[async_trait]
impl Session for ScriptedSession {
    fn name(&self) -> &str {
        "projects/test/instances/test/databases/test/sessions/scripted"
    }

    async fn open_batch_write(
        &mut self,
        request: BatchWriteRequest,
        _options: CallOptions,
    ) -> Result<Box<dyn BatchWriteStream>> {
        self.probe.open_calls.fetch_add(1, Ordering::SeqCst);
        *self.probe.last_request.lock().unwrap() = Some(request);
        Ok(Box::new(ScriptedStream {
            probe: Arc::clone(&self.probe),
            steps: std::mem::take(&mut self.script).into(),
        }))
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.probe.sessions_released.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedStream {
    probe: Arc<Probe>,
    steps: VecDeque<Step>,
}

#[async_trait]
impl BatchWriteStream for ScriptedStream {
    async fn next_message(&mut self) -> Result<Option<BatchWriteResponse>> {
        match self.steps.pop_front() {
            Some(Step::Message(message)) => Ok(Some(message)),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(None),
        }
    }

    fn dispose(&mut self) {
        self.probe.dispose_calls.fetch_add(1, Ordering::SeqCst);
    }
}
