use anyhow::anyhow;
use axum::body::Body;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::{extract::Request, response::Response};

use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use lextrail_common::{decrypt, get_current_timestamp, EnvVars};
use lextrail_study::{StudyError, User};

use crate::env::ApiServerEnv;
use crate::response::AppError;
use crate::utils::extract_bearer_token;
use crate::GlobalState;

/// Tokens carry the issue time and go stale after this many seconds.
pub const TOKEN_FRESHNESS_SECS: i64 = 60;

/// Payload inside the encrypted bearer token. Minting happens on the
/// identity side; this service only decrypts and checks freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedRequest {
    pub user_id: Uuid,
    pub timestamp: i64,
}

fn decode_token(token: &str, secret: &str, now: i64) -> Result<Uuid, AppError> {
    let decrypted = decrypt(token, secret)
        .map_err(|e| AppError::new(StatusCode::UNAUTHORIZED, anyhow!(e)))?;
    let request = serde_json::from_str::<AuthenticatedRequest>(&decrypted)
        .map_err(|e| AppError::new(StatusCode::UNAUTHORIZED, anyhow!(e)))?;

    if request.timestamp < now - TOKEN_FRESHNESS_SECS {
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            anyhow!("token expired"),
        ));
    }
    Ok(request.user_id)
}

/// Rejects the request outright on a missing or bad token; handlers behind
/// this layer can rely on the `Uuid` extension being present.
pub async fn authenticate(mut req: Request, next: Next) -> Result<Response<Body>, AppError> {
    let env = ApiServerEnv::load();
    let token = extract_bearer_token(&req)?;
    let user_id = decode_token(
        &token,
        &env.get_env_var("SECRET_SALT"),
        get_current_timestamp(),
    )?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

/// Loads the account behind the token. Unknown ids get 401, accounts still
/// waiting for approval get 403.
pub async fn ensure_account(state: &GlobalState, user_id: Uuid) -> Result<User, AppError> {
    let user = match state.engine.user(user_id).await {
        Ok(user) => user,
        Err(StudyError::NotFound(_)) => {
            return Err(AppError::new(
                StatusCode::UNAUTHORIZED,
                anyhow!("unknown account"),
            ))
        }
        Err(err) => return Err(err.into()),
    };

    if !user.is_approved {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            anyhow!("account pending approval"),
        ));
    }
    Ok(user)
}

pub async fn ensure_admin(state: &GlobalState, user_id: Uuid) -> Result<User, AppError> {
    let user = ensure_account(state, user_id).await?;
    if !user.is_admin() {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            anyhow!("admin role required"),
        ));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lextrail_common::encrypt;

    fn token_for(user_id: Uuid, timestamp: i64, secret: &str) -> String {
        let payload =
            serde_json::to_string(&AuthenticatedRequest { user_id, timestamp }).unwrap();
        encrypt(&payload, secret).unwrap()
    }

    #[test]
    fn test_decode_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let now = get_current_timestamp();
        let token = token_for(user_id, now, "salt");

        let decoded = decode_token(&token, "salt", now).unwrap();
        assert_eq!(decoded, user_id);
    }

    #[test]
    fn test_decode_token_expired() {
        let now = get_current_timestamp();
        let token = token_for(Uuid::new_v4(), now - TOKEN_FRESHNESS_SECS - 1, "salt");

        assert!(decode_token(&token, "salt", now).is_err());
    }

    #[test]
    fn test_decode_token_wrong_secret() {
        let now = get_current_timestamp();
        let token = token_for(Uuid::new_v4(), now, "salt-a");

        assert!(decode_token(&token, "salt-b", now).is_err());
    }

    #[test]
    fn test_decode_token_garbage() {
        let now = get_current_timestamp();
        assert!(decode_token("not-a-token", "salt", now).is_err());
    }
}
