// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AccessGateway, AssertionValidator, IdentityBinder, KeyFetchError, KeyResolver};
use crate::config::{AppConfig, AuthSettings};
use crate::store::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<AccessGateway>,
}

impl AppState {
    pub fn new(gateway: AccessGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    /// Build the gateway described by `config` over `users`.
    pub fn from_config(config: &AppConfig, users: Arc<dyn UserStore>) -> Result<Self, KeyFetchError> {
        let binder = IdentityBinder::new(users).with_timeout(config.store_timeout);

        let gateway = match &config.auth {
            AuthSettings::Bypass(bypass) => AccessGateway::bypassing(bypass.clone(), binder),
            AuthSettings::Verify {
                team_domain,
                audience,
            } => {
                let resolver = KeyResolver::over_https(config.key_fetch_timeout)?
                    .with_certs_path(config.certs_path.clone())
                    .with_cache_ttl(config.key_cache_ttl)
                    .with_refresh_cooldown(config.key_refresh_cooldown);
                let validator = AssertionValidator::new(Arc::new(resolver));
                AccessGateway::verifying(validator, team_domain.clone(), audience.clone(), binder)
            }
        };

        Ok(Self::new(gateway))
    }
}
