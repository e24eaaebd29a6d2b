// src/dashboard.rs

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{current_user, require_permission, require_role};
use crate::error::ApiError;
use crate::models::package::{Package, PackageState};
use crate::models::role::{
    ADMIN_ROLE, COMPLETE_PERMISSION, DELIVERY_PERMISSION, RECEIVING_PERMISSION,
    SHIPPING_PERMISSION,
};
use crate::models::user::{User, UserSummary};
use crate::package::{transition, validate_package, PackagePayload};

// ─── PROJECTIONS ───────────────────────────────────────────────────────────────

/// Listing entry for the staff dashboard, with the user references
/// expanded to summaries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageView {
    #[serde(rename = "_id")]
    pub id: Option<ObjectId>,
    pub description: String,
    pub weight: f64,
    pub image: String,
    pub receiver_name: String,
    pub receiver_surname: String,
    pub receiver_city: String,
    pub receiver_street: String,
    pub receiver_phone: String,
    pub state: PackageState,
    pub proprietor: Option<UserSummary>,
    pub traveler: Option<UserSummary>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

async fn to_views(
    data: &AppState,
    packages: Vec<Package>,
) -> Result<Vec<PackageView>, ApiError> {
    let mut ids: Vec<ObjectId> = Vec::new();
    for package in &packages {
        ids.push(package.proprietor);
        if let Some(traveler) = package.traveler {
            ids.push(traveler);
        }
    }
    let summaries: HashMap<ObjectId, UserSummary> =
        UserSummary::map_for(&data.mongodb.db, ids).await?;

    Ok(packages
        .into_iter()
        .map(|package| PackageView {
            id: package.id,
            description: package.description,
            weight: package.weight,
            image: package.image,
            receiver_name: package.receiver_name,
            receiver_surname: package.receiver_surname,
            receiver_city: package.receiver_city,
            receiver_street: package.receiver_street,
            receiver_phone: package.receiver_phone,
            state: package.state,
            proprietor: summaries.get(&package.proprietor).cloned(),
            traveler: package
                .traveler
                .and_then(|traveler| summaries.get(&traveler).cloned()),
            created_at: package.created_at,
            updated_at: package.updated_at,
        })
        .collect())
}

async fn list_by_state(
    req: &HttpRequest,
    data: &web::Data<AppState>,
    state: Option<PackageState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(req)?;
    require_role(data, &caller, ADMIN_ROLE).await?;

    let filter = match state {
        Some(state) => doc! { "state": state.wire() },
        None => doc! {},
    };
    let packages = data.mongodb.db.collection::<Package>("packages");
    let found: Vec<Package> = packages
        .find(filter)
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(to_views(data, found).await?))
}

/// GET /dashboard/packages
pub async fn list_all(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    list_by_state(&req, &data, None).await
}

/// GET /dashboard/packages/approved — agreed, waiting for pickup.
pub async fn list_approved(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    list_by_state(&req, &data, Some(PackageState::Approved)).await
}

/// GET /dashboard/packages/shipped — picked up at the origin branch.
pub async fn list_shipped(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    list_by_state(&req, &data, Some(PackageState::Shipped)).await
}

/// GET /dashboard/packages/delivered — en route, pending receipt.
pub async fn list_delivered(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    list_by_state(&req, &data, Some(PackageState::InTransitToLocal)).await
}

/// GET /dashboard/packages/completed
pub async fn list_completed(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    list_by_state(&req, &data, Some(PackageState::Completed)).await
}

// ─── SHIPPING PIPELINE ─────────────────────────────────────────────────────────

async fn confirm_stage(
    req: &HttpRequest,
    data: &web::Data<AppState>,
    raw_id: String,
    permission: &str,
    from: PackageState,
    to: PackageState,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(req)?;
    require_permission(data, &caller, permission).await?;

    let id = ObjectId::parse_str(raw_id.as_str())
        .map_err(|_| ApiError::Validation("Invalid package id".to_string()))?;
    let packages = data.mongodb.db.collection::<Package>("packages");
    transition(
        &packages,
        id,
        &[from],
        doc! { "$set": {
            "state": to.wire(),
            "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
        } },
    )
    .await?;
    info!("Package {} moved to {} by {}", id.to_hex(), to, caller.to_hex());

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been updated correctly" })))
}

/// POST /dashboard/packages/shipped/{package}
pub async fn confirm_shipped(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    confirm_stage(
        &req,
        &data,
        path.into_inner(),
        SHIPPING_PERMISSION,
        PackageState::Approved,
        PackageState::Shipped,
    )
    .await
}

/// POST /dashboard/packages/delivered/{package}
pub async fn confirm_delivered(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    confirm_stage(
        &req,
        &data,
        path.into_inner(),
        DELIVERY_PERMISSION,
        PackageState::Shipped,
        PackageState::InTransitToLocal,
    )
    .await
}

/// POST /dashboard/packages/received/{package}
pub async fn confirm_received(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    confirm_stage(
        &req,
        &data,
        path.into_inner(),
        RECEIVING_PERMISSION,
        PackageState::InTransitToLocal,
        PackageState::ReceivedAtLocal,
    )
    .await
}

/// POST /dashboard/packages/completed/{package}
pub async fn confirm_completed(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    confirm_stage(
        &req,
        &data,
        path.into_inner(),
        COMPLETE_PERMISSION,
        PackageState::ReceivedAtLocal,
        PackageState::Completed,
    )
    .await
}

// ─── STAFF PACKAGE MANAGEMENT ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffPackagePayload {
    #[serde(flatten)]
    pub package: PackagePayload,
    /// The sender the package is registered for.
    pub proprietor: String,
}

/// POST /dashboard/packages — staff registers a package on behalf of a
/// sender; it starts on the open board like any other.
pub async fn create_package_for(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<StaffPackagePayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, ADMIN_ROLE).await?;

    let payload = payload.into_inner();
    validate_package(&payload.package)?;
    let proprietor = ObjectId::parse_str(payload.proprietor.as_str())
        .map_err(|_| ApiError::Validation("Invalid user id".to_string()))?;
    let users = data.mongodb.db.collection::<User>("users");
    if users.find_one(doc! { "_id": proprietor }).await?.is_none() {
        return Err(ApiError::NotFound("User"));
    }
    if !data.images.exists(&payload.package.image).await {
        return Err(ApiError::Validation(
            "The package image has not been uploaded".to_string(),
        ));
    }

    let fields = payload.package;
    let stamp = DateTime::from_millis(data.clock.now().timestamp_millis());
    let new_package = Package {
        id: None,
        description: fields.description,
        weight: fields.weight,
        image: fields.image,
        receiver_name: fields.receiver_name,
        receiver_surname: fields.receiver_surname,
        receiver_city: fields.receiver_city,
        receiver_street: fields.receiver_street,
        receiver_phone: fields.receiver_phone,
        state: PackageState::Published,
        proprietor,
        traveler: None,
        created_at: stamp,
        updated_at: stamp,
    };
    let packages = data.mongodb.db.collection::<Package>("packages");
    packages.insert_one(&new_package).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been created correctly" })))
}

/// PUT /dashboard/packages/{id} — staff corrects package fields; the
/// lifecycle state is not touched here.
pub async fn update_package_fields(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PackagePayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid package id".to_string()))?;
    validate_package(&payload)?;
    if !data.images.exists(&payload.image).await {
        return Err(ApiError::Validation(
            "The package image has not been uploaded".to_string(),
        ));
    }

    let packages = data.mongodb.db.collection::<Package>("packages");
    let result = packages
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "description": &payload.description,
                "weight": payload.weight,
                "image": &payload.image,
                "receiverName": &payload.receiver_name,
                "receiverSurname": &payload.receiver_surname,
                "receiverCity": &payload.receiver_city,
                "receiverStreet": &payload.receiver_street,
                "receiverPhone": &payload.receiver_phone,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Package"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been updated correctly" })))
}
