//! Storefront actions: local validation first, then the gateway.
//!
//! Also home of [`ResultSlot`], which keeps the listing view from being
//! overwritten by a response to an older request.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::forms::{validate_purchase, validate_restock, SweetForm};
use crate::models::{Credentials, RegisterResponse, RegisterUser, Session, Sweet};
use crate::query::{SearchSink, SweetQuery};
use crate::rest::ApiClient;
use crate::session::SessionContext;

pub struct Storefront {
    api: ApiClient,
    session: Arc<SessionContext>,
}

impl Storefront {
    pub fn new(api: ApiClient, session: Arc<SessionContext>) -> Self {
        Self { api, session }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Option<Session>, ApiError> {
        let response = self.api.login(credentials).await?;
        Ok(self.session.login(&response.token)?)
    }

    /// Logs straight in when the backend hands back a token
    pub async fn register(&self, user: &RegisterUser) -> Result<RegisterResponse, ApiError> {
        let response = self.api.register(user).await?;
        if let Some(token) = &response.token {
            self.session.login(token)?;
        }
        Ok(response)
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        Ok(self.session.logout()?)
    }

    pub async fn browse(&self, query: &SweetQuery) -> Result<Vec<Sweet>, ApiError> {
        self.api.fetch(query).await
    }

    /// No get-by-id endpoint: fetch the list and pick the listing out of it
    pub async fn find_sweet(&self, id: &str) -> Result<Sweet, ApiError> {
        self.api
            .list_all()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ApiError::NotFound("Sweet not found".to_string()))
    }

    /// `sweet` is the listing as the user saw it; its quantity bounds the request
    pub async fn purchase(&self, sweet: &Sweet, quantity: i64) -> Result<Sweet, ApiError> {
        let quantity = validate_purchase(sweet, quantity)?;
        let updated = self.api.purchase(&sweet.id, quantity).await?;
        info!("Purchased {} x {}", quantity, sweet.name);
        Ok(updated)
    }

    /// Create when `id` is None, update otherwise
    pub async fn save(&self, id: Option<&str>, form: &SweetForm) -> Result<Sweet, ApiError> {
        self.require_admin()?;
        let sweet = form.validate()?;
        match id {
            Some(id) => self.api.update(id, &sweet).await,
            None => self.api.create(&sweet).await,
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.require_admin()?;
        self.api.delete(id).await
    }

    pub async fn restock(&self, id: &str, quantity: i64) -> Result<Sweet, ApiError> {
        self.require_admin()?;
        let quantity = validate_restock(quantity)?;
        self.api.restock(id, quantity).await
    }

    /// UI gating only; the backend makes the real decision
    fn require_admin(&self) -> Result<(), ApiError> {
        if self.session.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// Current listing view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub seq: u64,
    pub sweets: Vec<Sweet>,
    pub error: Option<String>,
}

/// Listing state stamped with request sequence numbers.
///
/// Each request takes a number from [`ResultSlot::begin`]; a response is only
/// applied if its number is newer than the one currently shown.
pub struct ResultSlot {
    issued: AtomicU64,
    tx: watch::Sender<Listing>,
}

impl Default for ResultSlot {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(Listing::default());
        Self {
            issued: AtomicU64::new(0),
            tx,
        }
    }
}

impl ResultSlot {
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns false when the response was stale and dropped
    pub fn apply(&self, seq: u64, result: Result<Vec<Sweet>, String>) -> bool {
        self.tx.send_if_modified(|current| {
            if seq <= current.seq {
                return false;
            }
            current.seq = seq;
            match result {
                Ok(sweets) => {
                    current.sweets = sweets;
                    current.error = None;
                }
                // Keep the previous rows on screen next to the error
                Err(message) => current.error = Some(message),
            }
            true
        })
    }

    pub fn current(&self) -> Listing {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Listing> {
        self.tx.subscribe()
    }
}

/// Debouncer sink that runs the query and publishes into a [`ResultSlot`]
pub struct ListingSink {
    api: ApiClient,
    slot: Arc<ResultSlot>,
}

impl ListingSink {
    pub fn new(api: ApiClient, slot: Arc<ResultSlot>) -> Self {
        Self { api, slot }
    }
}

#[async_trait]
impl SearchSink for ListingSink {
    async fn dispatch(&self, query: SweetQuery) {
        let seq = self.slot.begin();
        let result = self.api.fetch(&query).await.map_err(|e| {
            let message = e.user_message("Failed to fetch sweets");
            warn!("Listing request #{} failed: {}", seq, e);
            message
        });
        if !self.slot.apply(seq, result) {
            info!("Dropped stale listing response #{}", seq);
        }
    }
}
