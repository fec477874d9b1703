use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use busline_core::{Role, Session};

use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Session { user_id: claims.sub, role: claims.role }
    }
}

pub fn issue_token(auth: &AuthConfig, sub: &str, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: sub.to_string(),
        role,
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
}

fn session_from_request(state: &AppState, req: &Request) -> Result<Session, StatusCode> {
    let auth_header = req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    ).map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(token_data.claims.into())
}

// ============================================================================
// Session Middleware (any signed-in caller)
// ============================================================================

pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = session_from_request(&state, &req)?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

// ============================================================================
// Admin Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = session_from_request(&state, &req)?;
    if !session.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_decodes_to_session() {
        let auth = AuthConfig { secret: "test-secret".into(), expiration: 60, admin_key: None };
        let token = issue_token(&auth, "admin-1", Role::Admin).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        ).unwrap();
        let session: Session = data.claims.into();
        assert_eq!(session, Session::admin("admin-1"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let auth = AuthConfig { secret: "one".into(), expiration: 60, admin_key: None };
        let token = issue_token(&auth, "u", Role::User).unwrap();
        assert!(decode::<Claims>(&token, &DecodingKey::from_secret(b"two"), &Validation::default()).is_err());
    }
}
