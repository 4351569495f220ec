use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::db::entities::user;
use crate::db::services::{self, UserChanges};
use crate::web::error::AppError;
use crate::web::models::{Claims, RegisterRequest, UpdateUserRequest};

pub const MIN_PASSWORD_LENGTH: usize = 5;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST).map_err(|e| AppError::PasswordHashingError(e.to_string()))
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long."
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::InvalidInput("Enter a valid email address.".to_string())),
    }
}

pub async fn register_user(pool: &DatabaseConnection, req: RegisterRequest) -> Result<user::Model, AppError> {
    let email = services::normalize_email(&req.email);
    validate_email(&email)?;
    validate_password(&req.password)?;

    if services::get_user_by_email(pool, &email).await?.is_some() {
        return Err(AppError::UserAlreadyExists(
            "A user with this email already exists.".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user = services::create_user(pool, &email, req.name.trim(), &password_hash).await?;
    info!(user_id = user.id, "Registered new user.");
    Ok(user)
}

/// Checks email and password. Unknown users, inactive users and wrong passwords all
/// yield `InvalidCredentials`.
pub async fn authenticate(pool: &DatabaseConnection, email: &str, password: &str) -> Result<user::Model, AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::InvalidCredentials);
    }

    let email = services::normalize_email(email);
    let user = services::get_user_by_email(pool, &email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !user.is_active {
        warn!(user_id = user.id, "Login attempt for inactive user.");
        return Err(AppError::InvalidCredentials);
    }

    let valid_password = verify(password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;
    if !valid_password {
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

pub fn create_jwt_for_user(user: &user::Model, jwt_secret: &str, ttl_hours: i64) -> Result<String, AppError> {
    let out_of_range = || AppError::TokenCreationError(format!("token lifetime of {ttl_hours} hours is out of range"));
    let expires_at = Duration::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(out_of_range)?;
    let expiration = usize::try_from(expires_at.timestamp()).map_err(|_| out_of_range())?;

    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(jwt_secret.as_ref()))
        .map_err(|e| AppError::TokenCreationError(e.to_string()))
}

pub fn decode_jwt(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        warn!(error = ?e, "JWT decoding failed.");
        AppError::InvalidCredentials
    })
}

/// Applies a profile update. With `partial == false` every field must be present.
pub async fn update_profile(
    pool: &DatabaseConnection,
    user: user::Model,
    req: UpdateUserRequest,
    partial: bool,
) -> Result<user::Model, AppError> {
    if !partial && (req.email.is_none() || req.name.is_none() || req.password.is_none()) {
        return Err(AppError::InvalidInput(
            "email, name and password are required.".to_string(),
        ));
    }

    let mut changes = UserChanges::default();

    if let Some(email) = req.email {
        let email = services::normalize_email(&email);
        validate_email(&email)?;
        if email != user.email && services::get_user_by_email(pool, &email).await?.is_some() {
            return Err(AppError::UserAlreadyExists(
                "A user with this email already exists.".to_string(),
            ));
        }
        changes.email = Some(email);
    }
    if let Some(name) = req.name {
        changes.name = Some(name.trim().to_string());
    }
    if let Some(password) = req.password {
        validate_password(&password)?;
        changes.password_hash = Some(hash_password(&password)?);
    }

    Ok(services::update_user(pool, user, changes).await?)
}
