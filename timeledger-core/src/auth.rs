use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;

/// Container for the authenticated user's id stored in request extensions.
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub Uuid);

/// User id every request runs as when no token is presented in local mode.
pub const LOCAL_USER_ID: Uuid = Uuid::nil();

/// Claims expected inside the JWT for authenticated users.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// Subject - should be the user's UUID as a string.
    pub sub: String,
    pub exp: usize,
}

/// Middleware to validate a Bearer JWT in the `Authorization` header.
///
/// On success the request is forwarded with `CurrentUser` attached. A missing
/// header is tolerated in local mode, where the request runs as the local
/// user; a header that is present but invalid is always a `401`.
pub async fn auth_guard(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req.headers().get("authorization");
    let token = match auth_header.and_then(|v| v.to_str().ok()) {
        Some(s) if s.starts_with("Bearer ") => Some(&s[7..]),
        Some(_) => return Err(StatusCode::UNAUTHORIZED),
        None => None,
    };

    let user_id = match token {
        Some(token) => {
            let decoding_key = DecodingKey::from_secret(state.config.jwt_secret.as_bytes());
            let decoded =
                match decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256)) {
                    Ok(c) => c.claims,
                    Err(_) => return Err(StatusCode::UNAUTHORIZED),
                };

            // Parse subject as UUID and attach to request extensions for
            // downstream handlers.
            match Uuid::parse_str(&decoded.sub) {
                Ok(id) => id,
                Err(_) => return Err(StatusCode::UNAUTHORIZED),
            }
        }
        None if state.config.local_mode => LOCAL_USER_ID,
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    req.extensions_mut().insert(CurrentUser(user_id));

    Ok(next.run(req).await)
}

/// Identity response for `GET /api/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub local: bool,
}

/// Returns the id the current request is running as.
pub async fn me(Extension(CurrentUser(user_id)): Extension<CurrentUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id,
        local: user_id == LOCAL_USER_ID,
    })
}
