// src/profile.rs

use actix_web::{web, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use log::info;
use mongodb::bson::{doc, DateTime};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{current_user, require_role};
use crate::error::ApiError;
use crate::models::role::USER_ROLE;
use crate::models::user::User;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub surname: String,
    pub email: Option<String>,
    pub username: String,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeImageRequest {
    pub image: String,
}

/// PUT /profiles/profile
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    if payload.name.trim().is_empty()
        || payload.surname.trim().is_empty()
        || payload.username.trim().is_empty()
    {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let lower_username = payload.username.to_lowercase();
    if users
        .find_one(doc! { "username": &lower_username, "_id": { "$ne": caller } })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "This username already exists".to_string(),
        ));
    }

    let result = users
        .update_one(
            doc! { "_id": caller },
            doc! { "$set": {
                "name": &payload.name,
                "surname": &payload.surname,
                "email": payload.email.as_deref().unwrap_or_default(),
                "username": &lower_username,
                "image": payload.image.as_deref().unwrap_or_default(),
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::NotFound("User"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The user has been updated correctly" })))
}

/// PATCH /profiles/password
pub async fn change_password(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "_id": caller })
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    if !verify(&payload.current_password, &user.password).unwrap_or(false) {
        return Err(ApiError::Validation("Incorrect password".to_string()));
    }

    let hashed_password = hash(&payload.new_password, DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("Error hashing password: {}", e)))?;
    users
        .update_one(
            doc! { "_id": caller },
            doc! { "$set": {
                "password": hashed_password,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The password has been updated correctly" })))
}

/// PUT /profiles/image — the reference must already be stored.
pub async fn change_image(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<ChangeImageRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    if payload.image.trim().is_empty() {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }
    if !data.images.exists(&payload.image).await {
        return Err(ApiError::Validation(
            "The image has not been uploaded".to_string(),
        ));
    }

    let users = data.mongodb.db.collection::<User>("users");
    users
        .update_one(
            doc! { "_id": caller },
            doc! { "$set": {
                "image": &payload.image,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The image has been updated correctly" })))
}

/// DELETE /profiles — soft disable; the account stays behind for
/// record-keeping but can no longer sign in.
pub async fn disable_account(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    let users = data.mongodb.db.collection::<User>("users");
    users
        .update_one(
            doc! { "_id": caller },
            doc! { "$set": {
                "state": false,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;
    info!("Account disabled: {}", caller.to_hex());

    Ok(HttpResponse::Ok().json(json!({ "message": "The account has been disabled correctly" })))
}
