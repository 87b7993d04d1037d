//! sweet_shop: storefront/admin client for the candy-shop inventory API
//!
//! Client-side session guard and search pipeline over a remote REST backend:
//! token storage (Sled), unverified session derivation (base64url payload decode), a
//! process-wide session context, a debounced/cancellable search pipeline and a
//! single reqwest-based gateway with auth + unauthorized interceptors.
//!
//! Tokens are decoded, never verified: role checks here only shape what the UI
//! offers. The backend is the authority on every privileged call.

pub mod error;
pub mod models;
pub mod storage;
pub mod auth;
pub mod session;
// Filters, query construction and the debouncer
pub mod query;
// HTTP gateway (reqwest) with the auth/unauthorized interceptors
pub mod rest;
pub mod forms;
pub mod shop;
pub mod config;
