use super::config::ConnectionConfig;
use crate::batch::BatchWriteRequest;
use crate::core::{DbError, Result};
use crate::interface::{BatchWriteStream, CallOptions, Session, SessionFactory, SessionProvider};
use crate::transaction::TransactionId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Session pool
///
/// Keeps sessions from a [`SessionFactory`] alive between commands and hands
/// them out through [`SessionProvider`].
pub struct SessionPool {
    config: ConnectionConfig,
    database: String,
    factory: Arc<dyn SessionFactory>,
    /// Idle sessions
    available: Arc<Mutex<VecDeque<PooledSession>>>,
    /// Total number of live sessions, idle or checked out
    total_sessions: Arc<AtomicUsize>,
}

/// A session at rest in the pool
struct PooledSession {
    session: Box<dyn Session>,
    created_at: Instant,
    last_used: Instant,
}

impl PooledSession {
    fn new(session: Box<dyn Session>) -> Self {
        let now = Instant::now();
        Self {
            session,
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|lifetime| self.created_at.elapsed() > lifetime)
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|timeout| self.last_used.elapsed() > timeout)
    }
}

/// A counted pool slot, given back on drop unless kept
///
/// Session creation can be abandoned at any await point, so the count is only
/// committed once a session actually exists.
struct SlotReservation<'a> {
    total_sessions: &'a AtomicUsize,
    kept: bool,
}

impl<'a> SlotReservation<'a> {
    fn try_reserve(total_sessions: &'a AtomicUsize, max: usize) -> Option<Self> {
        total_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |total| {
                (total < max).then_some(total + 1)
            })
            .ok()
            .map(|_| Self {
                total_sessions,
                kept: false,
            })
    }

    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if !self.kept {
            self.total_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl SessionPool {
    /// Create a pool and pre-create `min_sessions` sessions
    pub async fn new(config: ConnectionConfig, factory: Arc<dyn SessionFactory>) -> Result<Self> {
        config.validate()?;

        let pool = Self {
            database: config.database_path(),
            config,
            factory,
            available: Arc::new(Mutex::new(VecDeque::new())),
            total_sessions: Arc::new(AtomicUsize::new(0)),
        };

        pool.ensure_min_sessions().await?;

        Ok(pool)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Check out a session, waiting up to `acquire_timeout` for one to free up
    pub async fn get_session(&self, cancel: &CancellationToken) -> Result<SessionGuard> {
        let deadline = Instant::now() + self.config.acquire_timeout;

        loop {
            if let Some(pooled) = self.try_get_available().await {
                return Ok(self.guard(pooled.session, pooled.created_at));
            }

            if let Some(session) = self.try_create_session(cancel, deadline).await? {
                return Ok(self.guard(session, Instant::now()));
            }

            if Instant::now() >= deadline {
                return Err(DbError::Timeout(
                    "Session pool timeout: no sessions available".into(),
                ));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DbError::Cancelled),
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }
    }

    fn guard(&self, session: Box<dyn Session>, created_at: Instant) -> SessionGuard {
        SessionGuard {
            session: Some(session),
            created_at,
            pool: Arc::clone(&self.available),
            total_sessions: Arc::clone(&self.total_sessions),
        }
    }

    /// Pop an idle session, discarding stale or unhealthy ones on the way
    async fn try_get_available(&self) -> Option<PooledSession> {
        let mut available = self.available.lock().await;

        let mut removed = 0usize;
        let mut found = None;
        while let Some(pooled) = available.pop_front() {
            if pooled.is_expired(self.config.max_lifetime)
                || pooled.is_idle_too_long(self.config.idle_timeout)
                || !self.factory.is_healthy(pooled.session.as_ref())
            {
                debug!(session = pooled.session.name(), "discarding stale session");
                removed += 1;
                continue;
            }
            found = Some(pooled);
            break;
        }

        if removed > 0 {
            self.total_sessions.fetch_sub(removed, Ordering::SeqCst);
        }

        found
    }

    /// Create a new session if under the limit
    async fn try_create_session(
        &self,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<Option<Box<dyn Session>>> {
        let Some(slot) = SlotReservation::try_reserve(&self.total_sessions, self.config.max_sessions)
        else {
            return Ok(None);
        };

        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DbError::Cancelled),
            created = tokio::time::timeout_at(deadline, self.factory.create_session(&self.database)) => {
                created.map_err(|_| DbError::Timeout("Session pool timeout: session creation".into()))?
            }
        };

        let session = created?;
        slot.keep();
        debug!(session = session.name(), "created session");
        Ok(Some(session))
    }

    async fn ensure_min_sessions(&self) -> Result<()> {
        let mut available = self.available.lock().await;

        while self.total_sessions.load(Ordering::SeqCst) < self.config.min_sessions {
            let session = self.factory.create_session(&self.database).await?;
            available.push_back(PooledSession::new(session));
            self.total_sessions.fetch_add(1, Ordering::SeqCst);
        }

        Ok(())
    }

    pub async fn stats(&self) -> PoolStats {
        let available = self.available.lock().await;
        let total = self.total_sessions.load(Ordering::SeqCst);

        PoolStats {
            total_sessions: total,
            available_sessions: available.len(),
            active_sessions: total.saturating_sub(available.len()),
            max_sessions: self.config.max_sessions,
        }
    }
}

#[async_trait]
impl SessionProvider for SessionPool {
    async fn acquire_session(
        &self,
        transaction: Option<&TransactionId>,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn Session>> {
        if let Some(txn) = transaction {
            debug!(transaction = %txn, "acquiring session for transaction");
        }
        Ok(Box::new(self.get_session(cancel).await?))
    }
}

/// Session pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total_sessions: usize,
    pub available_sessions: usize,
    pub active_sessions: usize,
    pub max_sessions: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}",
            self.active_sessions,
            self.total_sessions,
            self.available_sessions,
            self.max_sessions
        )
    }
}

/// RAII guard for a checked-out session
///
/// Returns the session to the pool when dropped.
pub struct SessionGuard {
    session: Option<Box<dyn Session>>,
    created_at: Instant,
    pool: Arc<Mutex<VecDeque<PooledSession>>>,
    total_sessions: Arc<AtomicUsize>,
}

impl SessionGuard {
    fn inner(&mut self) -> Result<&mut Box<dyn Session>> {
        self.session
            .as_mut()
            .ok_or_else(|| DbError::InvalidOperation("Session already returned to pool".into()))
    }
}

#[async_trait]
impl Session for SessionGuard {
    fn name(&self) -> &str {
        self.session.as_ref().map_or("", |session| session.name())
    }

    async fn open_batch_write(
        &mut self,
        request: BatchWriteRequest,
        options: CallOptions,
    ) -> Result<Box<dyn BatchWriteStream>> {
        self.inner()?.open_batch_write(request, options).await
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let pooled = PooledSession {
            session,
            created_at: self.created_at,
            last_used: Instant::now(),
        };

        let pooled = match self.pool.try_lock() {
            Ok(mut pool) => {
                pool.push_back(pooled);
                return;
            }
            Err(_) => pooled,
        };

        // Lock is held by another checkout; hand the session back once it frees up.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = Arc::clone(&self.pool);
                handle.spawn(async move {
                    pool.lock().await.push_back(pooled);
                });
            }
            Err(_) => {
                warn!(
                    session = pooled.session.name(),
                    "pool lock busy outside a runtime; dropping session"
                );
                self.total_sessions.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}
