// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{access_middleware, ACCESS_ASSERTION_HEADER};
use crate::models::{Identity, IdentityId};
use crate::state::AppState;

pub mod health;
pub mod users;

/// Response for GET /
#[derive(Debug, Serialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
}

/// API banner.
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses((status = 200, description = "API banner", body = RootResponse))
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Edge Access Gateway API".to_string(),
    })
}

pub fn router(state: AppState, frontend_url: &str) -> Router {
    let auth_routes = Router::new()
        .route("/me", get(users::get_current_user))
        .route("/token-info", get(users::get_token_info))
        .route_layer(from_fn_with_state(state.clone(), access_middleware));

    let request_layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id,
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(frontend_url))
        .layer(request_layers)
}

/// CORS for the single frontend origin, with credentials. A wildcard
/// cannot carry credentials, so it disables cross-origin access.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(ACCESS_ASSERTION_HEADER),
        ])
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) if origin != "*" => layer.allow_origin(origin),
        _ => {
            tracing::warn!(frontend_url, "Invalid frontend origin, cross-origin requests disabled");
            layer
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "access_assertion",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("Cf-Access-Jwt-Assertion"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        root,
        health::health,
        health::liveness,
        health::readiness,
        users::get_current_user,
        users::get_token_info
    ),
    components(
        schemas(
            Identity,
            IdentityId,
            RootResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            users::UserMeResponse,
            users::TokenUser,
            users::TokenInfoResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Auth", description = "Authenticated identity")
    )
)]
struct ApiDoc;
