// src/package.rs

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{current_user, require_role, role_names};
use crate::error::ApiError;
use crate::models::package::{Package, PackageState};
use crate::models::role::{ADMIN_ROLE, SUPER_ADMIN_ROLE, USER_ROLE};
use crate::models::travel::Travel;
use crate::models::user::User;

// ─── REQUEST PAYLOADS ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagePayload {
    pub description: String,
    pub weight: f64,
    /// Reference returned by the image upload; must already be stored.
    pub image: String,
    pub receiver_name: String,
    pub receiver_surname: String,
    pub receiver_city: String,
    pub receiver_street: String,
    pub receiver_phone: String,
}

pub fn validate_package(payload: &PackagePayload) -> Result<(), ApiError> {
    let text_fields = [
        &payload.description,
        &payload.image,
        &payload.receiver_name,
        &payload.receiver_surname,
        &payload.receiver_city,
        &payload.receiver_street,
        &payload.receiver_phone,
    ];
    if text_fields.iter().any(|field| field.trim().is_empty()) || payload.weight <= 0.0 {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }
    Ok(())
}

fn parse_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::Validation("Invalid package id".to_string()))
}

// ─── STATE TRANSITIONS ─────────────────────────────────────────────────────────

/// Conditionally moves a package out of one of `sources` in a single
/// round trip: the state is part of the update filter, so two racing
/// actors can never both win. When nothing matched, a re-fetch decides
/// whether the package is missing or just not in an eligible state.
pub async fn transition(
    packages: &Collection<Package>,
    id: ObjectId,
    sources: &[PackageState],
    update: Document,
) -> Result<Package, ApiError> {
    let source_literals: Vec<&str> = sources.iter().map(|state| state.wire()).collect();
    let filter = doc! { "_id": id, "state": { "$in": source_literals } };

    match packages
        .find_one_and_update(filter, update)
        .return_document(ReturnDocument::After)
        .await?
    {
        Some(package) => Ok(package),
        None => match packages.find_one(doc! { "_id": id }).await? {
            Some(current) => Err(ApiError::InvalidTransition(
                current.state.wire().to_string(),
            )),
            None => Err(ApiError::NotFound("Package")),
        },
    }
}

async fn fetch_package(
    packages: &Collection<Package>,
    id: ObjectId,
) -> Result<Package, ApiError> {
    packages
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("Package"))
}

// ─── HANDLERS ──────────────────────────────────────────────────────────────────

/// POST /packages — open offer: Publicado, no traveler yet.
pub async fn create_package(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<PackagePayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;
    validate_package(&payload)?;

    if !data.images.exists(&payload.image).await {
        return Err(ApiError::Validation(
            "The package image has not been uploaded".to_string(),
        ));
    }

    let payload = payload.into_inner();
    let stamp = DateTime::from_millis(data.clock.now().timestamp_millis());
    let new_package = Package {
        id: None,
        description: payload.description,
        weight: payload.weight,
        image: payload.image,
        receiver_name: payload.receiver_name,
        receiver_surname: payload.receiver_surname,
        receiver_city: payload.receiver_city,
        receiver_street: payload.receiver_street,
        receiver_phone: payload.receiver_phone,
        state: PackageState::Published,
        proprietor: caller,
        traveler: None,
        created_at: stamp,
        updated_at: stamp,
    };
    let packages = data.mongodb.db.collection::<Package>("packages");
    packages.insert_one(&new_package).await?;
    info!("Package published by {}", caller.to_hex());

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been created correctly" })))
}

/// POST /packages/requests/{traveler} — the owner sends the package
/// directly to a chosen traveler: Proceso, traveler assigned up front.
pub async fn create_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PackagePayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;
    validate_package(&payload)?;

    let traveler = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid user id".to_string()))?;
    if traveler == caller {
        return Err(ApiError::Validation(
            "You cannot send a package to yourself".to_string(),
        ));
    }
    let users = data.mongodb.db.collection::<User>("users");
    if users.find_one(doc! { "_id": traveler }).await?.is_none() {
        return Err(ApiError::NotFound("User"));
    }

    if !data.images.exists(&payload.image).await {
        return Err(ApiError::Validation(
            "The package image has not been uploaded".to_string(),
        ));
    }

    let payload = payload.into_inner();
    let stamp = DateTime::from_millis(data.clock.now().timestamp_millis());
    let new_package = Package {
        id: None,
        description: payload.description,
        weight: payload.weight,
        image: payload.image,
        receiver_name: payload.receiver_name,
        receiver_surname: payload.receiver_surname,
        receiver_city: payload.receiver_city,
        receiver_street: payload.receiver_street,
        receiver_phone: payload.receiver_phone,
        state: PackageState::Requested,
        proprietor: caller,
        traveler: Some(traveler),
        created_at: stamp,
        updated_at: stamp,
    };
    let packages = data.mongodb.db.collection::<Package>("packages");
    packages.insert_one(&new_package).await?;
    info!(
        "Package requested to traveler {} by {}",
        traveler.to_hex(),
        caller.to_hex()
    );

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been created correctly" })))
}

/// POST /packages/suggestions/{package} — a traveler offers to carry an
/// open package. Requires an upcoming active travel whose destination
/// matches the package.
pub async fn send_suggestion(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;
    let id = parse_id(&path.into_inner())?;

    let travels = data.mongodb.db.collection::<Travel>("travels");
    let travel = travels
        .find_one(doc! {
            "traveler": caller,
            "date": { "$gt": DateTime::from_millis(data.clock.now().timestamp_millis()) },
            "state": true,
        })
        .await?
        .ok_or(ApiError::NoActiveTravel)?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let package = fetch_package(&packages, id).await?;
    if package.proprietor == caller {
        return Err(ApiError::Forbidden(
            "You cannot carry your own package".to_string(),
        ));
    }
    if package.receiver_city != travel.destination {
        return Err(ApiError::Validation(
            "Your travel does not match the package destination".to_string(),
        ));
    }

    transition(
        &packages,
        id,
        &[PackageState::Published],
        doc! { "$set": {
            "state": PackageState::Suggested.wire(),
            "traveler": caller,
            "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
        } },
    )
    .await?;
    info!("Suggestion sent for package {} by {}", id.to_hex(), caller.to_hex());

    Ok(HttpResponse::Ok().json(json!({ "message": "The suggestion has been sent correctly" })))
}

/// POST /packages/suggestions/confirmation/{package} — the owner
/// accepts the traveler's offer.
pub async fn confirm_suggestion(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;
    let id = parse_id(&path.into_inner())?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let package = fetch_package(&packages, id).await?;
    if package.proprietor != caller {
        return Err(ApiError::Forbidden(
            "Only the package owner can confirm".to_string(),
        ));
    }

    transition(
        &packages,
        id,
        &[PackageState::Suggested],
        doc! { "$set": {
            "state": PackageState::Approved.wire(),
            "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
        } },
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been updated correctly" })))
}

/// POST /packages/requests/confirmation/{package} — the owner confirms
/// a direct request. The targeted traveler is not consulted; this
/// mirrors the historic flow.
pub async fn confirm_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;
    let id = parse_id(&path.into_inner())?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let package = fetch_package(&packages, id).await?;
    if package.proprietor != caller {
        return Err(ApiError::Forbidden(
            "Only the package owner can confirm".to_string(),
        ));
    }

    transition(
        &packages,
        id,
        &[PackageState::Requested],
        doc! { "$set": {
            "state": PackageState::Approved.wire(),
            "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
        } },
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been updated correctly" })))
}

/// POST /packages/requests/rejection/{package} — the owner withdraws a
/// direct request; the package goes back on the open board.
pub async fn reject_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;
    let id = parse_id(&path.into_inner())?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let package = fetch_package(&packages, id).await?;
    if package.proprietor != caller {
        return Err(ApiError::Forbidden(
            "Only the package owner can reject".to_string(),
        ));
    }

    transition(
        &packages,
        id,
        &[PackageState::Requested],
        doc! { "$set": {
            "state": PackageState::Published.wire(),
            "traveler": Bson::Null,
            "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
        } },
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been updated correctly" })))
}

/// DELETE /packages/cancelation/{package} — owner or admin, only before
/// the shipping pipeline starts. Cancelling twice reports the state
/// error rather than succeeding silently.
pub async fn cancel_package(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let id = parse_id(&path.into_inner())?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let package = fetch_package(&packages, id).await?;
    if package.proprietor != caller {
        let names = role_names(&data, &caller).await?;
        if !names.contains(ADMIN_ROLE) && !names.contains(SUPER_ADMIN_ROLE) {
            return Err(ApiError::Forbidden(
                "You can only cancel your own packages".to_string(),
            ));
        }
    }

    transition(
        &packages,
        id,
        &PackageState::CANCELLATION_SOURCES,
        doc! { "$set": {
            "state": PackageState::Cancelled.wire(),
            "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
        } },
    )
    .await?;
    info!("Package {} cancelled by {}", id.to_hex(), caller.to_hex());

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been canceled correctly" })))
}

/// PUT /packages/{id} — owner edits; only while the package is still
/// Publicado, enforced by the same conditional update as the lifecycle
/// moves.
pub async fn update_package(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PackagePayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;
    let id = parse_id(&path.into_inner())?;
    validate_package(&payload)?;

    if !data.images.exists(&payload.image).await {
        return Err(ApiError::Validation(
            "The package image has not been uploaded".to_string(),
        ));
    }

    let packages = data.mongodb.db.collection::<Package>("packages");
    let package = fetch_package(&packages, id).await?;
    if package.proprietor != caller {
        return Err(ApiError::Forbidden(
            "You can only modify your own packages".to_string(),
        ));
    }

    transition(
        &packages,
        id,
        &[PackageState::Published],
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

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been updated correctly" })))
}

/// GET /packages — every package (staff view).
pub async fn list_packages(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, ADMIN_ROLE).await?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let found: Vec<Package> = packages
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

/// GET /packages/proprietor — the caller's packages, cancelled ones
/// left out.
pub async fn list_own_packages(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let found: Vec<Package> = packages
        .find(doc! {
            "proprietor": caller,
            "state": { "$ne": PackageState::Cancelled.wire() },
        })
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

/// GET /packages/{id}
pub async fn get_package(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path.into_inner())?;
    let packages = data.mongodb.db.collection::<Package>("packages");
    let package = fetch_package(&packages, id).await?;
    Ok(HttpResponse::Ok().json(package))
}

/// GET /packages/image/{image}
pub async fn get_image(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let bytes = data.images.resolve(&name).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound("Image")
        } else {
            ApiError::Storage(err)
        }
    })?;
    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .body(bytes))
}

/// DELETE /packages/{id} — hard delete, super admin only.
pub async fn delete_package(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = parse_id(&path.into_inner())?;
    let packages = data.mongodb.db.collection::<Package>("packages");
    let result = packages.delete_one(doc! { "_id": id }).await?;
    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Package"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The package has been deleted correctly" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> PackagePayload {
        PackagePayload {
            description: "Books".to_string(),
            weight: 2.5,
            image: "abc.png".to_string(),
            receiver_name: "Ana".to_string(),
            receiver_surname: "Obiang".to_string(),
            receiver_city: "Malabo".to_string(),
            receiver_street: "Calle 3".to_string(),
            receiver_phone: "+240222000111".to_string(),
        }
    }

    #[test]
    fn a_complete_package_passes() {
        assert!(validate_package(&payload()).is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut p = payload();
        p.receiver_city = String::new();
        assert!(matches!(
            validate_package(&p),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn non_positive_weight_is_rejected() {
        let mut p = payload();
        p.weight = 0.0;
        assert!(validate_package(&p).is_err());
        p.weight = -1.0;
        assert!(validate_package(&p).is_err());
    }

    #[test]
    fn invalid_ids_are_validation_errors() {
        assert!(matches!(parse_id("nope"), Err(ApiError::Validation(_))));
        assert!(parse_id("64f0aa0000000000000000aa").is_ok());
    }
}
