//! Checkout/checkin pool for validation sessions

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use tracing::info;

use super::PgSession;
use crate::error::SessionError;

/// A small session pool. Documents validated concurrently each check out
/// their own session; the guard returns it on every exit path.
pub struct SessionPool {
    config: tokio_postgres::Config,
    idle: Arc<Mutex<Vec<PgSession>>>,
}

impl SessionPool {
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self {
            config,
            idle: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Check out a session, connecting when the idle list is empty.
    pub async fn acquire(&self) -> Result<PooledSession, SessionError> {
        let reused = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        let session = match reused {
            Some(session) => session,
            None => {
                info!("opening new validation session");
                PgSession::connect(&self.config).await?
            }
        };
        Ok(PooledSession {
            session: Some(session),
            idle: Arc::clone(&self.idle),
        })
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

/// Checked-out session; returns to the pool when dropped.
pub struct PooledSession {
    session: Option<PgSession>,
    idle: Arc<Mutex<Vec<PgSession>>>,
}

impl Deref for PooledSession {
    type Target = PgSession;

    fn deref(&self) -> &PgSession {
        self.session.as_ref().expect("session present until drop")
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let (Some(session), Ok(mut idle)) = (self.session.take(), self.idle.lock()) {
            idle.push(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_starts_empty() {
        let pool = SessionPool::new(tokio_postgres::Config::new());
        assert_eq!(pool.idle_count(), 0);
    }
}
