// src/auth.rs

use std::collections::HashSet;

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Duration;
use futures_util::TryStreamExt;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::employee::Employee;
use crate::models::role::{Permission, Role, SUPER_ADMIN_ROLE, USER_ROLE};
use crate::models::user::User;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// ─── TOKENS ────────────────────────────────────────────────────────────────────

pub fn create_jwt(
    user_id: &str,
    secret: &str,
    lifetime_days: i64,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<String, ApiError> {
    let expiration = now + Duration::days(lifetime_days);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| ApiError::Internal(format!("Token encode error: {}", e)))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// The authenticated subject, placed in request extensions by the
/// bearer-token middleware.
pub fn current_user(req: &HttpRequest) -> Result<ObjectId, ApiError> {
    let id = req
        .extensions()
        .get::<String>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;
    ObjectId::parse_str(&id).map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))
}

// ─── ROLE GATE ─────────────────────────────────────────────────────────────────

/// Resolves the caller's role names in one `$in` query.
pub async fn role_names(
    data: &AppState,
    user_id: &ObjectId,
) -> Result<HashSet<String>, ApiError> {
    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let roles = data.mongodb.db.collection::<Role>("roles");
    let found: Vec<Role> = roles
        .find(doc! { "_id": { "$in": &user.roles } })
        .await?
        .try_collect()
        .await?;
    Ok(found.into_iter().map(|role| role.name).collect())
}

pub async fn require_role(
    data: &AppState,
    user_id: &ObjectId,
    role: &str,
) -> Result<(), ApiError> {
    let names = role_names(data, user_id).await?;
    if names.contains(role) || names.contains(SUPER_ADMIN_ROLE) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Require {}", role)))
    }
}

/// Gate for the dashboard shipping-stage actions: super admins pass;
/// anyone else must be an employee holding the named permission tag.
pub async fn require_permission(
    data: &AppState,
    user_id: &ObjectId,
    permission: &str,
) -> Result<(), ApiError> {
    let names = role_names(data, user_id).await?;
    if names.contains(SUPER_ADMIN_ROLE) {
        return Ok(());
    }
    if !names.contains(crate::models::role::ADMIN_ROLE) {
        return Err(ApiError::Forbidden(format!(
            "Require {}",
            crate::models::role::ADMIN_ROLE
        )));
    }

    let employees = data.mongodb.db.collection::<Employee>("employees");
    let employee = employees
        .find_one(doc! { "user": user_id })
        .await?
        .ok_or_else(|| ApiError::Forbidden(format!("Require {}", permission)))?;

    let permissions = data.mongodb.db.collection::<Permission>("permissions");
    let held: Vec<Permission> = permissions
        .find(doc! { "_id": { "$in": &employee.permissions } })
        .await?
        .try_collect()
        .await?;
    if held.iter().any(|p| p.name == permission) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Require {}", permission)))
    }
}

// ─── REQUEST PAYLOADS ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupInfo {
    pub name: String,
    pub surname: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInfo {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInfo {
    pub phone_number: String,
    pub new_password: String,
}

// ─── HANDLERS ──────────────────────────────────────────────────────────────────

/// POST /auth/signup
pub async fn signup(
    data: web::Data<AppState>,
    signup_info: web::Json<SignupInfo>,
) -> Result<HttpResponse, ApiError> {
    let info = signup_info.into_inner();
    if info.name.trim().is_empty()
        || info.surname.trim().is_empty()
        || info.phone_number.trim().is_empty()
        || info.username.trim().is_empty()
        || info.password.is_empty()
    {
        return Err(ApiError::Validation(
            "Complete the required fields".to_string(),
        ));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let lower_username = info.username.to_lowercase();
    if users
        .find_one(doc! { "username": &lower_username })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "This username already exists".to_string(),
        ));
    }

    let roles = data.mongodb.db.collection::<Role>("roles");
    let user_role = roles
        .find_one(doc! { "name": USER_ROLE })
        .await?
        .and_then(|role| role.id)
        .ok_or(ApiError::NotFound("Role"))?;

    let hashed_password = hash(&info.password, DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("Error hashing password: {}", e)))?;

    let now = DateTime::from_millis(data.clock.now().timestamp_millis());
    let new_user = User {
        id: None,
        name: info.name,
        surname: info.surname,
        phone_number: info.phone_number,
        email: info.email,
        image: None,
        username: lower_username,
        password: hashed_password,
        roles: vec![user_role],
        state: true,
        created_at: now,
        updated_at: now,
    };
    users.insert_one(&new_user).await?;
    info!("User created: {}", new_user.username);

    Ok(HttpResponse::Ok().json(json!({ "message": "The user has been created correctly" })))
}

/// POST /auth/signin
pub async fn signin(
    data: web::Data<AppState>,
    login_info: web::Json<LoginInfo>,
) -> Result<HttpResponse, ApiError> {
    if login_info.username.trim().is_empty() || login_info.password.is_empty() {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let lower_username = login_info.username.to_lowercase();
    let user = users
        .find_one(doc! { "username": &lower_username })
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Incorrect username or password".to_string()))?;

    if !user.state {
        return Err(ApiError::Forbidden(
            "This account has been deleted".to_string(),
        ));
    }
    if !verify(&login_info.password, &user.password).unwrap_or(false) {
        return Err(ApiError::Unauthorized(
            "Incorrect username or password".to_string(),
        ));
    }

    let user_id = user.id.ok_or(ApiError::NotFound("User"))?;
    let token = create_jwt(
        &user_id.to_hex(),
        &data.config.jwt_secret,
        data.config.token_expiration_days,
        data.clock.now(),
    )?;
    Ok(HttpResponse::Ok().json(json!({ "token": token })))
}

/// POST /auth/dashboard/signin
///
/// Staff login: besides the credentials it resolves the account's roles
/// and, when an employee record exists, the permission tags held at the
/// branch. Plain users are turned away here.
pub async fn dashboard_signin(
    data: web::Data<AppState>,
    login_info: web::Json<LoginInfo>,
) -> Result<HttpResponse, ApiError> {
    if login_info.username.trim().is_empty() || login_info.password.is_empty() {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let lower_username = login_info.username.to_lowercase();
    let user = users
        .find_one(doc! { "username": &lower_username })
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Incorrect username or password".to_string()))?;

    if !user.state {
        return Err(ApiError::Forbidden(
            "This account has been deleted".to_string(),
        ));
    }
    if !verify(&login_info.password, &user.password).unwrap_or(false) {
        return Err(ApiError::Unauthorized(
            "Incorrect username or password".to_string(),
        ));
    }

    let user_id = user.id.ok_or(ApiError::NotFound("User"))?;
    let roles = data.mongodb.db.collection::<Role>("roles");
    let role_docs: Vec<Role> = roles
        .find(doc! { "_id": { "$in": &user.roles } })
        .await?
        .try_collect()
        .await?;

    let token = create_jwt(
        &user_id.to_hex(),
        &data.config.jwt_secret,
        data.config.token_expiration_days,
        data.clock.now(),
    )?;

    let employees = data.mongodb.db.collection::<Employee>("employees");
    match employees.find_one(doc! { "user": user_id }).await? {
        Some(employee) => {
            let permissions = data.mongodb.db.collection::<Permission>("permissions");
            let permission_docs: Vec<Permission> = permissions
                .find(doc! { "_id": { "$in": &employee.permissions } })
                .await?
                .try_collect()
                .await?;
            Ok(HttpResponse::Ok().json(json!({
                "roles": role_docs,
                "permissions": permission_docs,
                "token": token,
            })))
        }
        None => {
            if role_docs.iter().any(|role| role.name == SUPER_ADMIN_ROLE) {
                Ok(HttpResponse::Ok().json(json!({ "roles": role_docs, "token": token })))
            } else {
                Err(ApiError::Unauthorized(
                    "Incorrect username or password".to_string(),
                ))
            }
        }
    }
}

/// PATCH /auth/resetPassword
pub async fn reset_password(
    data: web::Data<AppState>,
    reset_info: web::Json<ResetPasswordInfo>,
) -> Result<HttpResponse, ApiError> {
    if reset_info.phone_number.trim().is_empty() || reset_info.new_password.is_empty() {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "phoneNumber": &reset_info.phone_number })
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let hashed_password = hash(&reset_info.new_password, DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("Error hashing password: {}", e)))?;
    users
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": {
                "password": hashed_password,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The password has been updated correctly" })))
}

/// POST /auth/signout — bearer tokens carry no server-side session, so
/// this is an acknowledgement only.
pub async fn signout() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "You've been signed out!" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn jwt_round_trips_the_subject() {
        // Decoding checks expiry against the real clock, so the token
        // must be issued relative to it.
        let now = Utc::now();
        let token = create_jwt("64f0aa0000000000000000aa", "topsecret", 1, now).unwrap();
        let claims = validate_jwt(&token, "topsecret").unwrap();
        assert_eq!(claims.sub, "64f0aa0000000000000000aa");
        assert_eq!(claims.exp as i64, (now + Duration::days(1)).timestamp());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let issued = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let token = create_jwt("someone", "topsecret", 1, issued).unwrap();
        assert!(validate_jwt(&token, "topsecret").is_err());
    }

    #[test]
    fn jwt_rejects_the_wrong_secret() {
        let now = Utc::now();
        let token = create_jwt("someone", "secret-a", 1, now).unwrap();
        assert!(validate_jwt(&token, "secret-b").is_err());
    }
}
