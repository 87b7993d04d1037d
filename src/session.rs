//! Process-wide session state.
//!
//! `SessionContext` is the single writer; consumers hold a `watch::Receiver`
//! (via [`SessionContext::subscribe`]) and read [`SessionSnapshot`]s. Until
//! [`SessionContext::initialize`] has run the snapshot reports `loading`, and
//! consumers must not treat that as "logged out".

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::derive_session;
use crate::error::StoreError;
use crate::models::Session;
use crate::rest::Navigator;
use crate::storage::TokenStore;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub loading: bool,
    pub session: Option<Session>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.session.as_ref().map(Session::is_admin).unwrap_or(false)
    }
}

pub struct SessionContext {
    store: TokenStore,
    tx: watch::Sender<SessionSnapshot>,
}

impl SessionContext {
    /// Create in the loading state; nothing is read from the store yet
    pub fn new(store: TokenStore) -> Arc<Self> {
        let (tx, _rx) = watch::channel(SessionSnapshot {
            loading: true,
            session: None,
        });
        Arc::new(Self { store, tx })
    }

    /// One derivation attempt at startup. Clears the loading flag either way.
    pub fn initialize(&self) {
        let session = derive_session(&self.store);
        match &session {
            Some(s) => info!("Restored session for {}", s.username),
            None => info!("No active session"),
        }
        self.publish(session);
    }

    /// Store the token, then re-derive and republish
    pub fn login(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.store.set(token)?;
        let session = derive_session(&self.store);
        if session.is_none() {
            warn!("Login token did not yield a valid session");
        }
        self.publish(session.clone());
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.store.clear()?;
        self.publish(None);
        info!("Logged out");
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.tx.borrow().session.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.tx.borrow().loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub fn is_admin(&self) -> bool {
        self.tx.borrow().is_admin()
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    fn publish(&self, session: Option<Session>) {
        // send_replace never fails, even with no receivers alive
        self.tx.send_replace(SessionSnapshot {
            loading: false,
            session,
        });
    }
}

/// Redirect to the login entry point behaves like a fresh start: the
/// gateway has already cleared the store, so re-deriving publishes "no session".
impl Navigator for SessionContext {
    fn redirect(&self, path: &str) {
        info!("Redirecting to {}", path);
        self.initialize();
    }
}
