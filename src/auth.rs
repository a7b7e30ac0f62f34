//! # API Key Authentication
//!
//! Key-based access control for the developer API.
//!
//! Design invariant carried over from the original service: when no keys
//! file exists (or it is empty/malformed), every endpoint stays open (dev
//! mode). Auth only activates once at least one key is configured. With keys
//! configured, a missing `X-API-Key` header yields 401 and an unknown or
//! inactive key yields 403.
//!
//! HTTP requests are checked by the [`ApiKeyAuth`] middleware; WebSocket
//! upgrades cannot carry custom headers from browsers, so the stream
//! endpoint checks an `api_key` query parameter against the same key set.

use crate::error::AppError;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::{ready, Ready};
use std::path::Path;
use tracing::{info, warn};

/// Header carrying the API key on HTTP requests.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// One entry in the keys file. Fields beyond `active` (label, created_at,
/// ...) are tolerated and ignored.
#[derive(Debug, Clone, Deserialize)]
struct KeyEntry {
    #[serde(default)]
    active: bool,
}

/// The configured API key set, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: HashMap<String, KeyEntry>,
}

impl ApiKeys {
    /// Load keys from a JSON file of the shape `{"<key>": {"active": true}}`.
    /// A missing file is dev mode; a malformed file is logged and treated
    /// the same, never a startup failure.
    pub fn load(path: &str) -> Self {
        if !Path::new(path).exists() {
            info!("No API keys file at {}; running with open access", path);
            return Self::default();
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Could not read {}: {}; running with open access", path, err);
                return Self::default();
            }
        };

        match serde_json::from_str::<HashMap<String, KeyEntry>>(&raw) {
            Ok(keys) => {
                info!("Loaded {} API key(s) from {}", keys.len(), path);
                Self { keys }
            }
            Err(err) => {
                warn!("Could not parse {}: {}; running with open access", path, err);
                Self::default()
            }
        }
    }

    #[cfg(test)]
    fn from_entries(entries: &[(&str, bool)]) -> Self {
        Self {
            keys: entries
                .iter()
                .map(|(key, active)| (key.to_string(), KeyEntry { active: *active }))
                .collect(),
        }
    }

    /// True when at least one key is configured.
    pub fn enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Check that a key exists and is active.
    pub fn verify(&self, key: &str) -> bool {
        self.keys.get(key).map(|entry| entry.active).unwrap_or(false)
    }

    /// WebSocket variant: passes when auth is disabled or the key is valid.
    pub fn verify_ws(&self, key: Option<&str>) -> bool {
        if !self.enabled() {
            return true;
        }
        key.map(|k| self.verify(k)).unwrap_or(false)
    }

    /// Check an HTTP request's key, producing the matching error when it is
    /// missing or invalid.
    fn check_request(&self, req: &ServiceRequest) -> Result<(), AppError> {
        if !self.enabled() {
            return Ok(());
        }

        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        match provided {
            None => Err(AppError::Unauthorized(format!(
                "{} header required.",
                API_KEY_HEADER
            ))),
            Some(key) if self.verify(key) => Ok(()),
            Some(_) => Err(AppError::Forbidden("Invalid or inactive API key.".to_string())),
        }
    }
}

/// Middleware enforcing API key auth on the routes it wraps.
pub struct ApiKeyAuth;

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthMiddleware { service }))
    }
}

pub struct ApiKeyAuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let verdict = req
            .app_data::<web::Data<ApiKeys>>()
            .map(|keys| keys.check_request(&req))
            // No key set registered means auth was never configured
            .unwrap_or(Ok(()));

        match verdict {
            Ok(()) => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(err) => Box::pin(async move { Err(err.into()) }),
        }
    }
}
