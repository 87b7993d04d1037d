//! REST gateway to the shop backend.
//!
//! One shared `reqwest::Client` with a fixed base URL and a JSON content-type
//! default. Every call goes through two interceptors:
//! - outbound: attach `Authorization: Bearer <token>` when the store holds one
//! - inbound: on 401, clear the store and redirect to the login entry point,
//!   then still hand the failure back to the caller

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::models::{
    Credentials, ErrorBody, LoginResponse, NewSweet, QuantityRequest, RegisterResponse,
    RegisterUser, Sweet,
};
use crate::query::{SearchParams, SweetQuery};
use crate::storage::TokenStore;

pub const LOGIN_ROUTE: &str = "/login";

/// Client-side navigation hook used by the unauthorized interceptor
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    store: TokenStore,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        store: TokenStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ApiError::InvalidBaseUrl(base_url.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            store,
            navigator,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // --- Auth ---

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let rb = self.request(Method::POST, &["api", "auth", "login"]).json(credentials);
        self.send_json(rb).await
    }

    pub async fn register(&self, user: &RegisterUser) -> Result<RegisterResponse, ApiError> {
        let rb = self.request(Method::POST, &["api", "auth", "register"]).json(user);
        let res = self.send(rb).await?;
        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Ok(RegisterResponse::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    // --- Sweets ---

    pub async fn list_all(&self) -> Result<Vec<Sweet>, ApiError> {
        self.send_json(self.request(Method::GET, &["api", "sweets"])).await
    }

    pub async fn search(&self, params: &SearchParams) -> Result<Vec<Sweet>, ApiError> {
        let rb = self.request(Method::GET, &["api", "sweets", "search"]).query(params);
        self.send_json(rb).await
    }

    /// List or search depending on which operation the query names
    pub async fn fetch(&self, query: &SweetQuery) -> Result<Vec<Sweet>, ApiError> {
        match query {
            SweetQuery::All => self.list_all().await,
            SweetQuery::Search(params) => self.search(params).await,
        }
    }

    pub async fn create(&self, sweet: &NewSweet) -> Result<Sweet, ApiError> {
        let rb = self.request(Method::POST, &["api", "sweets"]).json(sweet);
        self.send_json(rb).await
    }

    pub async fn update(&self, id: &str, sweet: &NewSweet) -> Result<Sweet, ApiError> {
        let rb = self.sweet_request(Method::PUT, id, None)?.json(sweet);
        self.send_json(rb).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.send(self.sweet_request(Method::DELETE, id, None)?).await?;
        Ok(())
    }

    pub async fn purchase(&self, id: &str, quantity: u32) -> Result<Sweet, ApiError> {
        let rb = self
            .sweet_request(Method::POST, id, Some("purchase"))?
            .json(&QuantityRequest { quantity });
        self.send_json(rb).await
    }

    pub async fn restock(&self, id: &str, quantity: u32) -> Result<Sweet, ApiError> {
        let rb = self
            .sweet_request(Method::POST, id, Some("restock"))?
            .json(&QuantityRequest { quantity });
        self.send_json(rb).await
    }

    // --- Interceptors ---

    /// `/api/sweets/{id}[/{action}]`. The id is a single percent-encoded
    /// segment, so ids containing `/`, `?` or `#` cannot address another route.
    fn sweet_request(
        &self,
        method: Method,
        id: &str,
        action: Option<&str>,
    ) -> Result<RequestBuilder, ApiError> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(ApiError::InvalidId(id.to_string()));
        }
        let mut segments = vec!["api", "sweets", id];
        segments.extend(action);
        Ok(self.request(method, &segments))
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Always Ok: cannot-be-a-base URLs are rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Outbound: build the request and attach the bearer token if there is one
    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let rb = self.http.request(method, self.endpoint(segments));
        match self.store.get() {
            Ok(Some(token)) => rb.bearer_auth(token),
            Ok(None) => rb,
            Err(e) => {
                warn!("Token store unreadable, sending unauthenticated: {}", e);
                rb
            }
        }
    }

    async fn send(&self, rb: RequestBuilder) -> Result<Response, ApiError> {
        let res = rb.send().await?;
        self.inbound(res).await
    }

    async fn send_json<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<T, ApiError> {
        let res = self.send(rb).await?;
        let bytes = res.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Inbound: the 401 side effects happen before the error reaches the caller
    async fn inbound(&self, res: Response) -> Result<Response, ApiError> {
        let status = res.status();
        debug!("{} {}", status.as_u16(), res.url().path());

        if status == StatusCode::UNAUTHORIZED {
            let message = error_message(res).await;
            if let Err(e) = self.store.clear() {
                warn!("Failed to clear token after 401: {}", e);
            }
            info!("Unauthorized response, forcing logout");
            self.navigator.redirect(LOGIN_ROUTE);
            return Err(ApiError::Unauthorized { message });
        }

        if !status.is_success() {
            let message = error_message(res).await;
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(res)
    }
}

/// `message` field of the error body, if the body is JSON and has one
async fn error_message(res: Response) -> Option<String> {
    let bytes = res.bytes().await.ok()?;
    serde_json::from_slice::<ErrorBody>(&bytes).ok()?.message
}
