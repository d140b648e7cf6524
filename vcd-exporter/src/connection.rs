//! Scoped session handling.
//!
//! `with_connection` logs in, hands the session to the body and logs out
//! exactly once on every way out of the scope: normal return, error, timeout,
//! or the whole request future being dropped (the guard then spawns the
//! logout on the current runtime).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, warn};

use crate::config::TargetConfig;
use crate::error::{CollectError, Result};
use crate::inventory::{Connector, Session};

/// Upper bound for the logout call itself.
pub const LOGOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs `body` inside a session opened for `target`, within `limit`.
///
/// The login is part of the time budget. A failed login returns its error
/// without running `body`; there is nothing to log out from in that case.
pub async fn with_connection<C, F, Fut, T>(
    connector: &C,
    target: &TargetConfig,
    limit: Duration,
    body: F,
) -> Result<T>
where
    C: Connector,
    F: FnOnce(Arc<C::Session>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + limit;

    let session = match timeout_at(deadline, connector.connect(target)).await {
        Ok(session) => session?,
        Err(_) => {
            warn!(section = %target.section, host = %target.host, "login did not complete in time");
            return Err(CollectError::Timeout(limit));
        }
    };
    debug!(section = %target.section, host = %target.host, "session opened");

    let guard = SessionGuard::new(session, &target.section);
    let outcome = match timeout_at(deadline, body(guard.session())).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(section = %target.section, ?limit, "collection timed out, abandoning traversal");
            Err(CollectError::Timeout(limit))
        }
    };
    guard.close().await;
    outcome
}

struct SessionGuard<S: Session> {
    session: Arc<S>,
    section: String,
    closed: bool,
}

impl<S: Session> SessionGuard<S> {
    fn new(session: S, section: &str) -> Self {
        Self {
            session: Arc::new(session),
            section: section.to_string(),
            closed: false,
        }
    }

    fn session(&self) -> Arc<S> {
        Arc::clone(&self.session)
    }

    async fn close(mut self) {
        // Flag first: if this future is dropped mid-logout, Drop must not retry.
        self.closed = true;
        logout(self.session.as_ref(), &self.section).await;
    }
}

impl<S: Session> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let session = Arc::clone(&self.session);
        let section = std::mem::take(&mut self.section);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(section = %section, "request dropped, closing session in background");
                handle.spawn(async move {
                    logout(session.as_ref(), &section).await;
                });
            }
            Err(_) => {
                warn!(section = %section, "session dropped outside a runtime, not logged out");
            }
        }
    }
}

async fn logout<S: Session>(session: &S, section: &str) {
    match timeout(LOGOUT_TIMEOUT, session.logout()).await {
        Ok(Ok(())) => debug!(section, "session closed"),
        Ok(Err(e)) => warn!(section, error = %e, "logout failed"),
        Err(_) => warn!(section, "logout timed out"),
    }
}
