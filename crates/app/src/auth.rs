//! Bearer-token authentication against the identity provider.
//!
//! Tokens are verified with the provider's published RS256 keys, or with a
//! shared HS256 secret when one is configured (local development, tests).
//! A verified token is trusted as-is; its claims become an [`Identity`].

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use courtside_models::{Error, Identity, User};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

/// The claims we read from an identity-provider token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self {
        Identity {
            subject: c.sub,
            email: c.email,
            first_name: c.given_name,
            last_name: c.family_name,
            full_name: c.name,
            avatar_url: c.picture,
        }
    }
}

enum Keys {
    Secret(DecodingKey),
    Jwks {
        url: String,
        http: reqwest::Client,
        cached: RwLock<Option<JwkSet>>,
    },
}

pub struct Authenticator {
    keys: Keys,
    audience: String,
    issuer: Option<String>,
}

impl Authenticator {
    pub fn with_secret(secret: &str, audience: &str) -> Self {
        Self {
            keys: Keys::Secret(DecodingKey::from_secret(secret.as_bytes())),
            audience: audience.to_string(),
            issuer: None,
        }
    }

    pub fn with_jwks(domain: &str, audience: &str) -> Self {
        Self {
            keys: Keys::Jwks {
                url: format!("https://{domain}/.well-known/jwks.json"),
                http: reqwest::Client::new(),
                cached: RwLock::new(None),
            },
            audience: audience.to_string(),
            issuer: Some(format!("https://{domain}/")),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, Error> {
        let (key, algorithm) = match &self.keys {
            Keys::Secret(key) => (key.clone(), Algorithm::HS256),
            Keys::Jwks { .. } => (self.signing_key(token).await?, Algorithm::RS256),
        };

        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&self.audience]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| Error::Unauthorized(format!("invalid token: {e}")))?;
        Ok(data.claims)
    }

    /// The provider key named by the token's `kid`. Keys are fetched once and
    /// refetched only when a token names one we haven't seen (rotation).
    async fn signing_key(&self, token: &str) -> Result<DecodingKey, Error> {
        let kid = decode_header(token)
            .map_err(|e| Error::Unauthorized(format!("invalid token: {e}")))?
            .kid
            .ok_or_else(|| Error::Unauthorized("token has no key id".to_string()))?;

        if let Some(key) = self.cached_key(&kid).await? {
            return Ok(key);
        }
        self.refresh_keys().await?;
        self.cached_key(&kid)
            .await?
            .ok_or_else(|| Error::Unauthorized(format!("unknown signing key {kid}")))
    }

    async fn cached_key(&self, kid: &str) -> Result<Option<DecodingKey>, Error> {
        let Keys::Jwks { cached, .. } = &self.keys else {
            return Ok(None);
        };
        let guard = cached.read().await;
        let Some(jwk) = guard.as_ref().and_then(|set| set.find(kid)) else {
            return Ok(None);
        };
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| Error::Upstream(format!("unusable signing key {kid}: {e}")))?;
        Ok(Some(key))
    }

    async fn refresh_keys(&self) -> Result<(), Error> {
        let Keys::Jwks { url, http, cached } = &self.keys else {
            return Ok(());
        };
        info!("Fetching signing keys from {url}");
        let set = fetch_keys(http, url)
            .await
            .map_err(|e| Error::Upstream(format!("fetching signing keys: {e}")))?;
        debug!("{} signing keys loaded", set.keys.len());
        *cached.write().await = Some(set);
        Ok(())
    }
}

async fn fetch_keys(http: &reqwest::Client, url: &str) -> reqwest::Result<JwkSet> {
    http.get(url).send().await?.error_for_status()?.json().await
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The verified identity behind a request. Rejects with 401 without one.
pub struct CurrentIdentity(pub Identity);

impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(&parts.headers)
            .ok_or_else(|| Error::Unauthorized("missing bearer token".to_string()))?;
        let claims = state.auth.verify(token).await?;
        Ok(CurrentIdentity(claims.into()))
    }
}

/// The internal user behind a request, synced on first sight so that a
/// fresh identity can act without calling `/users/sync` first.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentIdentity(identity) = CurrentIdentity::from_request_parts(parts, state).await?;
        let user = match courtside_db::find_user_by_external_id(&state.pool, &identity.subject).await? {
            Some(user) => user,
            None => courtside_db::sync_user(&state.pool, state.views.as_ref(), &identity).await?,
        };
        Ok(CurrentUser(user))
    }
}
