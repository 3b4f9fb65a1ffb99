// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated requests.
//!
//! Use the `Authenticated` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Authenticated(context): Authenticated) -> impl IntoResponse {
//!     // context.identity is the bound local identity
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, RequestContext};
use crate::state::AppState;

/// Extractor for authenticated requests.
///
/// Reuses the context inserted by
/// [`access_middleware`](super::middleware::access_middleware) when present,
/// otherwise authenticates the request itself through the gateway.
pub struct Authenticated(pub RequestContext);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<RequestContext>().cloned() {
            return Ok(Authenticated(context));
        }

        let context = state.gateway.authenticate(&parts.headers).await?;
        parts.extensions.insert(context.clone());
        Ok(Authenticated(context))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use chrono::Utc;

    use super::*;
    use crate::auth::{TokenClaims, ACCESS_ASSERTION_HEADER};
    use crate::models::{Identity, IdentityId};
    use crate::testutil::{access_claims, signed_token, test_state};

    fn parts_with(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header(ACCESS_ASSERTION_HEADER, token);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn requires_assertion_header() {
        let (state, _) = test_state();
        let mut parts = parts_with(None);

        let result = Authenticated::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::NoAssertion)));
    }

    #[tokio::test]
    async fn authenticates_valid_assertion() {
        let (state, _) = test_state();
        let token = signed_token(&access_claims("jane@example.com"));
        let mut parts = parts_with(Some(&token));

        let Authenticated(context) = Authenticated::from_request_parts(&mut parts, &state)
            .await
            .unwrap();

        assert_eq!(context.identity.email, "jane@example.com");
        assert!(parts.extensions.get::<RequestContext>().is_some());
    }

    #[tokio::test]
    async fn prefers_extensions() {
        let (state, fetcher) = test_state();
        let mut parts = parts_with(None);

        let context = RequestContext {
            identity: Identity {
                id: IdentityId::new(),
                display_name: "From Middleware".to_string(),
                email: "middleware@example.com".to_string(),
                external_auth: true,
                created_at: Utc::now(),
            },
            claims: TokenClaims::synthetic("middleware@example.com", Utc::now()),
        };
        parts.extensions.insert(context);

        let Authenticated(context) = Authenticated::from_request_parts(&mut parts, &state)
            .await
            .unwrap();

        assert_eq!(context.identity.display_name, "From Middleware");
        assert_eq!(fetcher.fetch_count(), 0);
    }
}
