//! Bounded pool of warm browser sessions.
//!
//! Checkout is gated by a semaphore sized to the pool, so at most
//! `max_size` sessions exist in use at any time. Healthy sessions come back
//! through [`Pool::checkin`]; failed ones go through [`Pool::discard`] and
//! are torn down. A lease that is dropped without either still releases
//! its permit, and the session's own `Drop` is responsible for cleanup.
//! Once the pool is closed, sessions coming back are destroyed rather than
//! parked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use super::RenderError;

/// Creates, checks and destroys pooled sessions.
#[async_trait]
pub trait SessionManager: Send + Sync + 'static {
    type Session: Send + 'static;

    /// Start a new session.
    async fn create(&self) -> Result<Self::Session, RenderError>;

    /// Cheap liveness check run before an idle session is reused.
    fn is_healthy(&self, session: &Self::Session) -> bool;

    /// Tear a session down, releasing every resource it holds.
    async fn destroy(&self, session: Self::Session);
}

/// Exclusive use of one pooled session.
pub struct SessionLease<S> {
    session: S,
    permit: OwnedSemaphorePermit,
}

impl<S> SessionLease<S> {
    pub fn session(&self) -> &S {
        &self.session
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    pub idle: usize,
    pub available: usize,
}

/// Semaphore-bounded pool of sessions produced by `M`.
pub struct Pool<M: SessionManager> {
    manager: M,
    idle: Mutex<Vec<M::Session>>,
    permits: Arc<Semaphore>,
    max_size: usize,
    keep_warm: bool,
    closed: AtomicBool,
}

impl<M: SessionManager> Pool<M> {
    pub fn new(manager: M, max_size: usize, keep_warm: bool) -> Self {
        Self {
            manager,
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(max_size)),
            max_size,
            keep_warm,
            closed: AtomicBool::new(false),
        }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// Take a session, reusing a healthy idle one or starting a new one.
    ///
    /// Waits while `max_size` sessions are checked out.
    pub async fn checkout(&self) -> Result<SessionLease<M::Session>, RenderError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RenderError::BrowserClosed)?;

        loop {
            let candidate = self.idle.lock().await.pop();
            match candidate {
                Some(session) if self.manager.is_healthy(&session) => {
                    tracing::debug!("reusing warm browser session");
                    return Ok(SessionLease { session, permit });
                }
                Some(session) => {
                    tracing::debug!("discarding dead idle browser session");
                    self.manager.destroy(session).await;
                }
                None => break,
            }
        }

        let session = self.manager.create().await?;
        Ok(SessionLease { session, permit })
    }

    /// Return a session after a successful render.
    ///
    /// The session is kept idle when warm reuse is enabled, the pool is
    /// still open and the session is healthy; otherwise it is destroyed.
    pub async fn checkin(&self, lease: SessionLease<M::Session>) {
        // Hold the permit until the session is parked or gone.
        let SessionLease { session, permit: _permit } = lease;
        if self.keep_warm && self.manager.is_healthy(&session) {
            let mut idle = self.idle.lock().await;
            // Checked under the idle lock so a concurrent close cannot miss it.
            if !self.closed.load(Ordering::SeqCst) {
                idle.push(session);
                return;
            }
        }
        self.manager.destroy(session).await;
    }

    /// Destroy a session after a failed render.
    pub async fn discard(&self, lease: SessionLease<M::Session>) {
        let SessionLease { session, permit: _permit } = lease;
        self.manager.destroy(session).await;
    }

    /// Destroy every idle session and stop parking returned ones.
    pub async fn close(&self) {
        let sessions: Vec<_> = {
            let mut idle = self.idle.lock().await;
            self.closed.store(true, Ordering::SeqCst);
            idle.drain(..).collect()
        };
        for session in sessions {
            self.manager.destroy(session).await;
        }
    }

    pub async fn status(&self) -> PoolStatus {
        PoolStatus {
            max_size: self.max_size,
            idle: self.idle.lock().await.len(),
            available: self.permits.available_permits(),
        }
    }
}
