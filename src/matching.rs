// src/matching.rs

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};

use crate::app_state::AppState;
use crate::auth::{current_user, require_role};
use crate::error::ApiError;
use crate::models::package::{Package, PackageState};
use crate::models::role::USER_ROLE;
use crate::models::travel::Travel;

/// Open packages a traveler can offer to carry: published, bound for
/// the travel's destination, and not the traveler's own. Sorted by
/// creation time so pages are stable.
fn match_filter(destination: &str, traveler: &ObjectId) -> Document {
    doc! {
        "state": PackageState::Published.wire(),
        "receiverCity": destination,
        "proprietor": { "$ne": traveler },
    }
}

/// GET /packages/filterByMatch
pub async fn list_matches(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

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
    let found: Vec<Package> = packages
        .find(match_filter(&travel.destination, &caller))
        .sort(doc! { "createdAt": 1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

/// GET /packages/filterByRequest — direct requests targeting the
/// caller, still awaiting the owner's confirmation.
pub async fn list_requests_for_traveler(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let found: Vec<Package> = packages
        .find(doc! {
            "traveler": caller,
            "state": PackageState::Requested.wire(),
        })
        .sort(doc! { "createdAt": 1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

/// GET /packages/filterByAcceptedRequest — the caller's own packages
/// with an agreed carrier, waiting for the shipping pipeline.
pub async fn list_accepted_for_proprietor(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let found: Vec<Package> = packages
        .find(doc! {
            "proprietor": caller,
            "state": PackageState::Approved.wire(),
        })
        .sort(doc! { "createdAt": 1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

/// GET /packages/filterIsNotPublished — the caller's in-progress
/// packages: past the open board, not cancelled.
pub async fn list_not_published(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    let packages = data.mongodb.db.collection::<Package>("packages");
    let found: Vec<Package> = packages
        .find(doc! {
            "proprietor": caller,
            "state": { "$nin": [
                PackageState::Published.wire(),
                PackageState::Cancelled.wire(),
            ] },
        })
        .sort(doc! { "createdAt": 1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_are_published_only_and_never_the_callers_own() {
        let traveler = ObjectId::new();
        let filter = match_filter("Malabo", &traveler);

        assert_eq!(filter.get_str("state").unwrap(), "Publicado");
        assert_eq!(filter.get_str("receiverCity").unwrap(), "Malabo");
        let ne = filter
            .get_document("proprietor")
            .unwrap()
            .get_object_id("$ne")
            .unwrap();
        assert_eq!(ne, traveler);
    }
}
