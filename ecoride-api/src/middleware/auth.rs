use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use ecoride_core::{Actor, Role};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn actor(&self) -> Actor {
        Actor { user_id: self.sub, role: self.role }
    }
}

/// Signs a bearer token for `actor`, valid for the configured lifetime.
pub fn issue_token(auth: &AuthConfig, actor: Actor, now: DateTime<Utc>) -> Result<String, AppError> {
    let claims = Claims {
        sub: actor.user_id,
        role: actor.role,
        exp: (now + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Token encoding failed: {}", e)))
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Decodes the bearer token and puts the caller's `Actor` into the request extensions.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let token = bearer_token(&req).ok_or_else(|| AppError::Authentication("Missing bearer token".into()))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::Authentication("Invalid or expired token".into())
    })?;

    req.extensions_mut().insert(token_data.claims.actor());
    Ok(next.run(req).await)
}
