// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge Access Gateway - identity assertion authentication for an API
//! behind an edge identity provider.
//!
//! Every protected request carries a signed assertion from the edge. The
//! gateway verifies it against the provider's published keys, binds the
//! subject email to a local identity (creating it on first sight) and hands
//! the identity to handlers.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Key resolution, assertion validation, identity binding, bypass mode
//! - `config` - Environment configuration
//! - `store` - User record store contract and in-memory store

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;

#[cfg(test)]
pub mod testutil;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Install the global tracing subscriber.
pub fn setup_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => subscriber.with(fmt::layer().json()).init(),
        LogFormat::Pretty => subscriber.with(fmt::layer()).init(),
    }
}
