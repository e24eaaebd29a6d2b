// src/local.rs

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{current_user, require_role};
use crate::error::ApiError;
use crate::models::local::Local;
use crate::models::role::SUPER_ADMIN_ROLE;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPayload {
    pub country: String,
    pub city: String,
    pub direction: String,
    pub phone_number: String,
}

fn validate_local(payload: &LocalPayload) -> Result<(), ApiError> {
    let fields = [
        &payload.country,
        &payload.city,
        &payload.direction,
        &payload.phone_number,
    ];
    if fields.iter().any(|field| field.trim().is_empty()) {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }
    Ok(())
}

/// GET /locals
pub async fn list_locals(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let locals = data.mongodb.db.collection::<Local>("locals");
    let found: Vec<Local> = locals.find(doc! {}).await?.try_collect().await?;
    Ok(HttpResponse::Ok().json(found))
}

/// GET /locals/{id}
pub async fn get_local(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid local id".to_string()))?;
    let locals = data.mongodb.db.collection::<Local>("locals");
    let local = locals
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("Local"))?;
    Ok(HttpResponse::Ok().json(local))
}

/// POST /locals
pub async fn create_local(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<LocalPayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;
    validate_local(&payload)?;

    let locals = data.mongodb.db.collection::<Local>("locals");
    if locals
        .find_one(doc! { "phoneNumber": &payload.phone_number })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "This phone number already exists".to_string(),
        ));
    }

    let now = DateTime::from_millis(data.clock.now().timestamp_millis());
    let new_local = Local {
        id: None,
        country: payload.country.clone(),
        city: payload.city.clone(),
        direction: payload.direction.clone(),
        phone_number: payload.phone_number.clone(),
        created_at: now,
        updated_at: now,
    };
    locals.insert_one(&new_local).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The local has been created correctly" })))
}

/// PUT /locals/{id}
pub async fn update_local(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<LocalPayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid local id".to_string()))?;
    validate_local(&payload)?;

    let locals = data.mongodb.db.collection::<Local>("locals");
    let result = locals
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "country": &payload.country,
                "city": &payload.city,
                "direction": &payload.direction,
                "phoneNumber": &payload.phone_number,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Local"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The local has been updated correctly" })))
}

/// DELETE /locals/{id}
pub async fn delete_local(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid local id".to_string()))?;
    let locals = data.mongodb.db.collection::<Local>("locals");
    let result = locals.delete_one(doc! { "_id": id }).await?;
    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Local"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The local has been deleted correctly" })))
}
