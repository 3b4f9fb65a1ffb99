// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Edge identity assertion authentication.
//!
//! ## Auth Flow
//!
//! 1. The edge provider authenticates the user and forwards the request
//!    with a signed assertion in `Cf-Access-Jwt-Assertion`
//! 2. The gateway:
//!    - Resolves the signing key by `kid` from the team's cached key set
//!    - Verifies the RS256 signature, audience, issuer and validity window
//!    - Binds the subject email to a local identity, creating it on first sight
//! 3. Handlers read the [`RequestContext`] through [`Authenticated`]
//!
//! ## Security
//!
//! - Only RS256 is accepted; the algorithm is checked before any key lookup
//! - Key sets are fetched over HTTPS only and cached per team domain for 24h
//! - Key fetches and store calls are bounded by timeouts and fail closed
//! - Clock skew tolerance is 60 seconds
//! - Bypass mode requires both a development environment and an explicit opt-in

pub mod binder;
pub mod bypass;
pub mod claims;
pub mod clock;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod jwks;
pub mod middleware;
pub mod validator;

pub use binder::{BindError, IdentityBinder};
pub use bypass::{BypassMode, Environment};
pub use claims::{RequestContext, TokenClaims};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AuthError;
pub use extractor::Authenticated;
pub use gateway::{AccessGateway, AuthMode, KeySetStatus, ACCESS_ASSERTION_HEADER};
pub use jwks::{HttpKeySetFetcher, KeyFetchError, KeyResolver, KeySetFetcher, SigningKey};
pub use middleware::access_middleware;
pub use validator::{AssertionValidator, ValidationError};
