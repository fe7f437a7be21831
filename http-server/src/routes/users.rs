use axum::{Json, extract::State, http::StatusCode};
use hex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ApiError, ApiResult};
use crate::{AppState, middleware::AuthUser, models::AuthenticatedUser};

// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub session_id: String,
    pub user: AuthenticatedUser,
}

// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<(StatusCode, Json<LoginResponse>)> {
    // Validate input
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }
    if !payload.email.contains('@') {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    // Generate session_id hash from email + password
    let mut hasher = Sha256::new();
    hasher.update(payload.email.as_bytes());
    hasher.update(payload.password.as_bytes());
    let session_id = hex::encode(hasher.finalize());

    // Get or create user account with the generated session_id
    let is_admin = state.admin_emails.iter().any(|admin| {
        admin.eq_ignore_ascii_case(&payload.email)
    });
    let user =
        state
            .storage
            .get_or_create_account_with_session(&payload.email, &session_id, is_admin);
    let authenticated_user = AuthenticatedUser::from(user.clone());

    let response = LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        session_id: user.session_id,
        user: authenticated_user,
    };
    Ok((StatusCode::OK, Json(response)))
}

// User profile response
#[derive(Serialize)]
pub struct UserProfileResponse {
    pub success: bool,
    pub user: AuthenticatedUser,
    pub message: String,
}

// Get user profile endpoint (protected route)
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<(StatusCode, Json<UserProfileResponse>)> {
    // Re-read so the wallet balance is current, not the login-time snapshot
    let user = state
        .storage
        .get_user(user.user_id)
        .map(AuthenticatedUser::from)
        .unwrap_or(user);

    let response = UserProfileResponse {
        success: true,
        user,
        message: "Profile retrieved successfully".to_string(),
    };
    Ok((StatusCode::OK, Json(response)))
}
