// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access middleware for Axum.
//!
//! Authenticates every request in a router subtree and inserts the
//! resulting [`RequestContext`](super::RequestContext) into request
//! extensions. Rejections short-circuit with an [`AuthError`](super::AuthError)
//! response; the inner handler never runs.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/me", get(me))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), access_middleware));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Authentication middleware function.
pub async fn access_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.gateway.authenticate(request.headers()).await {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
