//! Bearer-token (JWT) authentication for the image service.
//!
//! Protected routes expect an `Authorization: Bearer <token>` header carrying
//! an HMAC-signed JWT (HS256, HS384 or HS512). The gate runs three checks in
//! a fixed order:
//!
//! 1. A bearer token must be present, otherwise `401 Unauthorized`.
//! 2. The server must have a signing secret, otherwise `500`. This is checked
//!    per request, after the token check, so a missing header always wins.
//! 3. The token's signature and time claims must verify, otherwise
//!    `403 Forbidden`.
//!
//! On success the decoded claims are stored in the request extensions as
//! [`AuthClaims`] and can be extracted by handlers.
//!
//! # Example
//!
//! ```rust
//! use image_service::server::auth::{AuthClaims, TokenValidator};
//! use std::time::Duration;
//!
//! let validator = TokenValidator::new(Some("my-secret-key"));
//!
//! let token = validator
//!     .issue(&AuthClaims::for_subject("alice"), Some(Duration::from_secs(3600)))
//!     .unwrap();
//!
//! let claims = validator.validate(&token).unwrap();
//! assert_eq!(claims.subject(), Some("alice"));
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

// =============================================================================
// Types
// =============================================================================

/// Authentication error types.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No `Authorization: Bearer <token>` header
    MissingToken,

    /// The server has no signing secret configured
    ServerMisconfigured,

    /// Token failed signature or claim verification
    InvalidToken {
        /// Why verification failed
        reason: String,
    },
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing bearer token"),
            AuthError::ServerMisconfigured => write!(f, "JWT secret is not configured"),
            AuthError::InvalidToken { reason } => write!(f, "Invalid token: {}", reason),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::ServerMisconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::InvalidToken { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        // A missing token is routine; a bad token may be an attack; a missing
        // secret is an operator problem
        match &self {
            AuthError::MissingToken => {
                debug!(status = status.as_u16(), "Authentication failed: {}", self);
            }
            AuthError::InvalidToken { .. } => {
                warn!(status = status.as_u16(), "Authentication failed: {}", self);
            }
            AuthError::ServerMisconfigured => {
                error!(
                    status = status.as_u16(),
                    "JWT secret is not set. Server configuration error."
                );
            }
        }

        let body = status.canonical_reason().unwrap_or("Error");
        (status, body).into_response()
    }
}

// =============================================================================
// Claims
// =============================================================================

/// Claims of a verified token.
///
/// Kept as an opaque JSON object; the service only ever looks at the
/// subject, but whatever the issuer put in the token is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthClaims(Map<String, Value>);

impl AuthClaims {
    /// Claims with just a `sub`.
    pub fn for_subject(subject: impl Into<String>) -> Self {
        let mut claims = Map::new();
        claims.insert("sub".to_string(), Value::String(subject.into()));
        Self(claims)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Who the token was issued to: `sub`, falling back to `username`.
    pub fn subject(&self) -> Option<&str> {
        self.get("sub")
            .or_else(|| self.get("username"))
            .and_then(Value::as_str)
    }
}

/// Extract the claims placed in the request by [`auth_middleware`].
///
/// Rejects with `401` when used on a route the middleware does not cover.
impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthClaims>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

// =============================================================================
// Token Validator
// =============================================================================

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Verifies (and, for tooling, issues) HMAC-signed JWTs.
///
/// The secret is fixed at construction. A validator built without a secret
/// still exists so the gate can answer `500` per request instead of the
/// service refusing to start.
#[derive(Clone)]
pub struct TokenValidator {
    keys: Option<SigningKeys>,
}

impl TokenValidator {
    /// Create a validator. `None` or an empty secret leaves it unconfigured.
    pub fn new(secret: Option<impl AsRef<[u8]>>) -> Self {
        let keys = secret
            .as_ref()
            .map(|s| s.as_ref())
            .filter(|s| !s.is_empty())
            .map(|s| SigningKeys {
                encoding: EncodingKey::from_secret(s),
                decoding: DecodingKey::from_secret(s),
            });
        Self { keys }
    }

    /// A validator with no secret; every validation fails with
    /// [`AuthError::ServerMisconfigured`].
    pub fn unconfigured() -> Self {
        Self { keys: None }
    }

    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    /// Verify a token and return its claims.
    ///
    /// `exp` and `nbf` are enforced when present but not required; there is
    /// no clock leeway. A present `exp` or `nbf` must be a number. `aud` is
    /// not checked.
    pub fn validate(&self, token: &str) -> Result<AuthClaims, AuthError> {
        let keys = self.keys.as_ref().ok_or(AuthError::ServerMisconfigured)?;

        let claims = decode::<AuthClaims>(token, &keys.decoding, &validation())
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken {
                reason: e.to_string(),
            })?;

        // jsonwebtoken skips time claims it cannot parse
        for name in TIME_CLAIMS {
            if claims.get(name).is_some_and(|value| !value.is_number()) {
                return Err(AuthError::InvalidToken {
                    reason: format!("invalid {} value", name),
                });
            }
        }

        Ok(claims)
    }

    /// Sign `claims` with HS256, adding `iat` and (when `ttl` is given) `exp`.
    pub fn issue(&self, claims: &AuthClaims, ttl: Option<Duration>) -> Result<String, AuthError> {
        let keys = self.keys.as_ref().ok_or(AuthError::ServerMisconfigured)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut claims = claims.clone();
        claims.insert("iat", now);
        if let Some(ttl) = ttl {
            claims.insert("exp", now + ttl.as_secs());
        }

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(|e| {
            AuthError::InvalidToken {
                reason: e.to_string(),
            }
        })
    }
}

/// Registered claims that must be numeric when present.
const TIME_CLAIMS: [&str; 2] = ["exp", "nbf"];

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.required_spec_claims.clear();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.leeway = 0;
    validation
}

/// The token from an `Authorization: Bearer <token>` header, if any.
///
/// The scheme is matched case-insensitively; other schemes and empty tokens
/// count as no token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Axum middleware enforcing bearer-token authentication.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware, routing::post};
/// use image_service::server::auth::{TokenValidator, auth_middleware};
///
/// let validator = TokenValidator::new(Some("secret-key"));
/// let app = Router::new()
///     .route("/upload", post(upload_handler))
///     .route_layer(middleware::from_fn_with_state(validator, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(validator): State<TokenValidator>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::MissingToken)?;
    let claims = validator.validate(token)?;

    debug!(subject = claims.subject().unwrap_or("-"), "Authenticated request");
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

// =============================================================================
// Tests
// =============================================================================
