use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use courtside_config::Config;
use courtside_models::Moment;
use courtside_places::PlacesClient;
use sqlx::SqlitePool;

use crate::auth::Authenticator;
use crate::cache::ViewCache;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub views: Arc<ViewCache>,
    pub auth: Arc<Authenticator>,
    pub places: Option<Arc<PlacesClient>>,
    pub tz: Tz,
}

impl AppState {
    pub fn from_config(pool: SqlitePool, config: &Config) -> Result<Self> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|e| anyhow!("unknown timezone {}: {e}", config.timezone))?;
        let auth = match &config.auth_secret {
            Some(secret) => Authenticator::with_secret(secret, &config.auth_audience),
            None => Authenticator::with_jwks(&config.auth_domain, &config.auth_audience),
        };
        Ok(Self {
            pool,
            views: Arc::new(ViewCache::new(Duration::from_secs(config.view_cache_ttl_secs))),
            auth: Arc::new(auth),
            places: config.places_api_key.as_deref().map(|key| Arc::new(PlacesClient::new(key))),
            tz,
        })
    }

    /// Current wall-clock time in the server timezone.
    pub fn now(&self) -> Moment {
        Moment::now_in(self.tz)
    }
}
