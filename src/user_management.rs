// src/user_management.rs

use actix_web::{web, HttpRequest, HttpResponse};
use bcrypt::{hash, DEFAULT_COST};
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{current_user, require_role};
use crate::error::ApiError;
use crate::models::role::{Role, ADMIN_ROLE, SUPER_ADMIN_ROLE};
use crate::models::user::User;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub surname: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: String,
    pub surname: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub username: String,
}

fn parse_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::Validation("Invalid user id".to_string()))
}

/// GET /users
pub async fn list_users(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let users = data.mongodb.db.collection::<User>("users");
    let found: Vec<User> = users.find(doc! {}).await?.try_collect().await?;
    Ok(HttpResponse::Ok().json(found))
}

/// GET /users/{id}
pub async fn get_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = parse_id(&path.into_inner())?;
    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(HttpResponse::Ok().json(user))
}

/// POST /users — registers a staff account; it gets the admin role
/// rather than the plain user role.
pub async fn create_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let payload = payload.into_inner();
    if payload.name.trim().is_empty()
        || payload.surname.trim().is_empty()
        || payload.phone_number.trim().is_empty()
        || payload.username.trim().is_empty()
        || payload.password.is_empty()
    {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let lower_username = payload.username.to_lowercase();
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
    let admin_role = roles
        .find_one(doc! { "name": ADMIN_ROLE })
        .await?
        .and_then(|role| role.id)
        .ok_or(ApiError::NotFound("Role"))?;

    let hashed_password = hash(&payload.password, DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("Error hashing password: {}", e)))?;
    let now = DateTime::from_millis(data.clock.now().timestamp_millis());
    let new_user = User {
        id: None,
        name: payload.name,
        surname: payload.surname,
        phone_number: payload.phone_number,
        email: payload.email,
        image: None,
        username: lower_username,
        password: hashed_password,
        roles: vec![admin_role],
        state: true,
        created_at: now,
        updated_at: now,
    };
    users.insert_one(&new_user).await?;
    info!("Staff user created: {}", new_user.username);

    Ok(HttpResponse::Ok().json(json!({ "message": "The user has been created correctly" })))
}

/// PUT /users/{id}
pub async fn update_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = parse_id(&path.into_inner())?;
    if payload.name.trim().is_empty()
        || payload.surname.trim().is_empty()
        || payload.phone_number.trim().is_empty()
        || payload.username.trim().is_empty()
    {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let lower_username = payload.username.to_lowercase();
    if users
        .find_one(doc! { "username": &lower_username, "_id": { "$ne": id } })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "This username already exists".to_string(),
        ));
    }

    let result = users
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "name": &payload.name,
                "surname": &payload.surname,
                "phoneNumber": &payload.phone_number,
                "email": payload.email.as_deref().unwrap_or_default(),
                "username": &lower_username,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::NotFound("User"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The user has been updated correctly" })))
}

/// DELETE /users/{id} — hard delete.
pub async fn delete_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = parse_id(&path.into_inner())?;
    let users = data.mongodb.db.collection::<User>("users");
    let result = users.delete_one(doc! { "_id": id }).await?;
    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("User"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The user has been deleted correctly" })))
}
