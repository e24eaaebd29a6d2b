// src/permission.rs

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{current_user, require_role};
use crate::error::ApiError;
use crate::models::role::{Permission, SUPER_ADMIN_ROLE};

#[derive(Debug, Deserialize)]
pub struct PermissionPayload {
    pub name: String,
}

/// GET /permissions
pub async fn list_permissions(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let permissions = data.mongodb.db.collection::<Permission>("permissions");
    let found: Vec<Permission> = permissions.find(doc! {}).await?.try_collect().await?;
    Ok(HttpResponse::Ok().json(found))
}

/// GET /permissions/{id}
pub async fn get_permission(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid permission id".to_string()))?;
    let permissions = data.mongodb.db.collection::<Permission>("permissions");
    let permission = permissions
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("Permission"))?;
    Ok(HttpResponse::Ok().json(permission))
}

/// POST /permissions
pub async fn create_permission(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<PermissionPayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }
    let permissions = data.mongodb.db.collection::<Permission>("permissions");
    if permissions
        .find_one(doc! { "name": &payload.name })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "This permission already exists".to_string(),
        ));
    }

    let now = DateTime::from_millis(data.clock.now().timestamp_millis());
    let new_permission = Permission {
        id: None,
        name: payload.name.clone(),
        created_at: now,
        updated_at: now,
    };
    permissions.insert_one(&new_permission).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The permission has been created correctly" })))
}

/// PUT /permissions/{id}
pub async fn update_permission(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PermissionPayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid permission id".to_string()))?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }

    let permissions = data.mongodb.db.collection::<Permission>("permissions");
    let result = permissions
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "name": &payload.name,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Permission"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The permission has been updated correctly" })))
}

/// DELETE /permissions/{id}
pub async fn delete_permission(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid permission id".to_string()))?;
    let permissions = data.mongodb.db.collection::<Permission>("permissions");
    let result = permissions.delete_one(doc! { "_id": id }).await?;
    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Permission"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The permission has been deleted correctly" })))
}
