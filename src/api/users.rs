// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Current-user endpoints.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::auth::{Authenticated, RequestContext};
use crate::error::ApiError;
use crate::models::{Identity, IdentityId};
use crate::state::AppState;

/// Response for GET /api/auth/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Local identity ID
    pub id: IdentityId,
    /// Display name
    pub name: String,
    /// Normalized email
    pub email: String,
    /// Whether the identity was provisioned from an edge assertion
    pub external_auth: bool,
    /// When the identity was created
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for UserMeResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.display_name,
            email: identity.email,
            external_auth: identity.external_auth,
            created_at: identity.created_at,
        }
    }
}

/// Identity summary in a token info response.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenUser {
    pub id: IdentityId,
    pub name: String,
    pub email: String,
}

/// Response for GET /api/auth/token-info
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenInfoResponse {
    pub user: TokenUser,
    /// Every claim carried by the verified assertion
    #[schema(value_type = Object)]
    pub token: Map<String, Value>,
}

impl From<RequestContext> for TokenInfoResponse {
    fn from(context: RequestContext) -> Self {
        Self {
            user: TokenUser {
                id: context.identity.id,
                name: context.identity.display_name,
                email: context.identity.email,
            },
            token: context.claims.raw,
        }
    }
}

/// Get the current authenticated user's record.
///
/// The record is re-read from the store so the response reflects the
/// persisted identity, not the copy attached to the request.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("access_assertion" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Missing or invalid access assertion"),
        (status = 404, description = "User record no longer exists"),
        (status = 500, description = "Identity store unavailable"),
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Authenticated(context): Authenticated,
) -> Result<Json<UserMeResponse>, ApiError> {
    let identity = state
        .gateway
        .binder()
        .find_by_id(context.identity.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(identity.into()))
}

/// Get the verified claims of the current request.
#[utoipa::path(
    get,
    path = "/api/auth/token-info",
    tag = "Auth",
    security(("access_assertion" = [])),
    responses(
        (status = 200, description = "Identity and raw token claims", body = TokenInfoResponse),
        (status = 401, description = "Missing or invalid access assertion"),
    )
)]
pub async fn get_token_info(Authenticated(context): Authenticated) -> Json<TokenInfoResponse> {
    Json(context.into())
}
