// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider integration.
//!
//! Handles:
//! - Password sign-in and account creation against Firebase Authentication
//! - An in-process provider for local runs and tests
//! - Client-side signed-in state ([`AuthClient`])

use crate::error::{AppError, AuthFailure};
use crate::ids::random_id;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Deserialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::watch;

const MIN_PASSWORD_LEN: usize = 6;

/// Authenticated identity issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Credential checks and account creation.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an email/password pair.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AppError>;

    /// Register a new principal.
    async fn create_principal(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Principal, AppError>;
}

// ─── Firebase ────────────────────────────────────────────────

/// Firebase Authentication via the Identity Toolkit REST API.
#[derive(Clone)]
pub struct FirebaseAuth {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

impl From<AccountResponse> for Principal {
    fn from(account: AccountResponse) -> Self {
        Self {
            uid: account.local_id,
            email: account.email,
            display_name: account.display_name.filter(|n| !n.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseAuth {
    /// Create a client for the given Web API key.
    ///
    /// For local development with emulator, set FIREBASE_AUTH_EMULATOR_HOST.
    pub fn new(api_key: String) -> Self {
        let base_url = match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) if !host.is_empty() => {
                tracing::info!(host = %host, "Using Firebase Auth emulator");
                format!("http://{}/identitytoolkit.googleapis.com/v1", host)
            }
            _ => "https://identitytoolkit.googleapis.com/v1".to_string(),
        };
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, AppError> {
        let url = format!("{}/accounts:{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let failure = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => map_provider_error(&envelope.error.message),
                Err(_) => AuthFailure::Provider(format!("HTTP {}", status)),
            };
            tracing::info!(method, status = %status, failure = ?failure, "Identity provider rejected request");
            return Err(failure.into());
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("JSON parse error: {}", e)))
    }
}

/// Map an Identity Toolkit error message to a known failure.
///
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be ...`.
fn map_provider_error(message: &str) -> AuthFailure {
    let code = message
        .split(|c: char| c == ' ' || c == ':')
        .next()
        .unwrap_or_default();
    match code {
        "EMAIL_EXISTS" => AuthFailure::EmailInUse,
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS"
        | "INVALID_EMAIL" | "USER_DISABLED" => AuthFailure::InvalidCredentials,
        "WEAK_PASSWORD" => AuthFailure::WeakPassword,
        other => AuthFailure::Provider(other.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AppError> {
        let account: AccountResponse = self
            .call(
                "signInWithPassword",
                &serde_json::json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Ok(account.into())
    }

    async fn create_principal(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Principal, AppError> {
        let mut body = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        if let Some(name) = display_name {
            body["displayName"] = serde_json::Value::String(name.to_string());
        }

        let account: AccountResponse = self.call("signUp", &body).await?;
        let mut principal = Principal::from(account);
        if principal.display_name.is_none() {
            principal.display_name = display_name.map(str::to_string);
        }
        tracing::info!(uid = %principal.uid, "Principal created");
        Ok(principal)
    }
}

// ─── In-memory ───────────────────────────────────────────────

struct Account {
    uid: String,
    email: String,
    display_name: Option<String>,
    salt: String,
    password_hash: String,
}

/// In-process identity provider. Clones share the same accounts.
#[derive(Clone, Default)]
pub struct MemoryIdentity {
    accounts: Arc<DashMap<String, Account>>,
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AppError> {
        let account = self
            .accounts
            .get(&email.trim().to_lowercase())
            .ok_or(AuthFailure::InvalidCredentials)?;

        if hash_password(&account.salt, password) != account.password_hash {
            return Err(AuthFailure::InvalidCredentials.into());
        }

        Ok(Principal {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
            display_name: account.display_name.clone(),
        })
    }

    async fn create_principal(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Principal, AppError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthFailure::WeakPassword.into());
        }

        let key = email.trim().to_lowercase();
        let salt = random_id()?;
        let account = Account {
            uid: random_id()?,
            email: key.clone(),
            display_name: display_name.map(str::to_string),
            password_hash: hash_password(&salt, password),
            salt,
        };
        let principal = Principal {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
            display_name: account.display_name.clone(),
        };

        match self.accounts.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AuthFailure::EmailInUse.into()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(principal)
            }
        }
    }
}

// ─── Client-side session ─────────────────────────────────────

/// Signed-in state for a single client, layered over an [`IdentityProvider`].
///
/// Every sign-in, sign-up and sign-out is published on the principal stream
/// returned by [`AuthClient::subscribe`].
pub struct AuthClient {
    provider: Arc<dyn IdentityProvider>,
    principal: watch::Sender<Option<Principal>>,
}

impl AuthClient {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            principal: watch::channel(None).0,
        }
    }

    /// Stream of the signed-in principal; `None` while signed out.
    pub fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.principal.subscribe()
    }

    pub fn current(&self) -> Option<Principal> {
        self.principal.borrow().clone()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AppError> {
        let principal = self.provider.sign_in(email, password).await?;
        self.principal.send_replace(Some(principal.clone()));
        Ok(principal)
    }

    /// Create a principal and sign in as it.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Principal, AppError> {
        let principal = self
            .provider
            .create_principal(email, password, display_name)
            .await?;
        self.principal.send_replace(Some(principal.clone()));
        Ok(principal)
    }

    pub fn sign_out(&self) {
        self.principal.send_replace(None);
    }
}
