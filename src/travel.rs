// src/travel.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime as ChronoDateTime, Utc};
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{current_user, require_role};
use crate::error::ApiError;
use crate::models::role::{ADMIN_ROLE, SUPER_ADMIN_ROLE, USER_ROLE};
use crate::models::travel::{valid_billing_time, Travel};
use crate::models::user::UserSummary;

// ─── REQUEST PAYLOADS ──────────────────────────────────────────────────────────

/// Shared by creation and update; both validate the same invariants.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelPayload {
    pub origin: String,
    pub destination: String,
    pub date: ChronoDateTime<Utc>,
    pub airport: String,
    pub terminal: String,
    pub company: String,
    pub billing_time: String,
    pub available_weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub origin: String,
    pub destination: String,
}

/// Listing entry with the traveler expanded to a summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelView {
    #[serde(rename = "_id")]
    pub id: Option<ObjectId>,
    pub origin: String,
    pub destination: String,
    pub date: DateTime,
    pub airport: String,
    pub terminal: String,
    pub company: String,
    pub billing_time: String,
    pub available_weight: f64,
    pub traveler: Option<UserSummary>,
    pub state: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl TravelView {
    fn new(travel: Travel, traveler: Option<UserSummary>) -> Self {
        TravelView {
            id: travel.id,
            origin: travel.origin,
            destination: travel.destination,
            date: travel.date,
            airport: travel.airport,
            terminal: travel.terminal,
            company: travel.company,
            billing_time: travel.billing_time,
            available_weight: travel.available_weight,
            traveler,
            state: travel.state,
            created_at: travel.created_at,
            updated_at: travel.updated_at,
        }
    }
}

pub fn validate_travel(
    payload: &TravelPayload,
    now: ChronoDateTime<Utc>,
) -> Result<(), ApiError> {
    let text_fields = [
        &payload.origin,
        &payload.destination,
        &payload.airport,
        &payload.terminal,
        &payload.company,
        &payload.billing_time,
    ];
    if text_fields.iter().any(|field| field.trim().is_empty())
        || payload.available_weight <= 0.0
    {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }
    if !valid_billing_time(&payload.billing_time) {
        return Err(ApiError::Validation(format!(
            "{} is not a valid hour format. Please use HH:mm",
            payload.billing_time
        )));
    }
    if payload.origin == payload.destination {
        return Err(ApiError::Validation(
            "Origin and destination cannot be the same".to_string(),
        ));
    }
    if payload.date <= now {
        return Err(ApiError::Validation(
            "Please enter a correct date".to_string(),
        ));
    }
    Ok(())
}

async fn populate(
    data: &AppState,
    travels: Vec<Travel>,
) -> Result<Vec<TravelView>, ApiError> {
    let ids: Vec<ObjectId> = travels.iter().map(|t| t.traveler).collect();
    let summaries = UserSummary::map_for(&data.mongodb.db, ids).await?;
    Ok(travels
        .into_iter()
        .map(|travel| {
            let traveler = summaries.get(&travel.traveler).cloned();
            TravelView::new(travel, traveler)
        })
        .collect())
}

// ─── HANDLERS ──────────────────────────────────────────────────────────────────

/// GET /travels — every travel, newest date first.
pub async fn list_travels(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, ADMIN_ROLE).await?;

    let travels = data.mongodb.db.collection::<Travel>("travels");
    let found: Vec<Travel> = travels
        .find(doc! {})
        .sort(doc! { "date": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(populate(&data, found).await?))
}

/// GET /travels/filterByDate — upcoming travels with capacity left.
pub async fn list_upcoming(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let now = DateTime::from_millis(data.clock.now().timestamp_millis());
    let travels = data.mongodb.db.collection::<Travel>("travels");
    let found: Vec<Travel> = travels
        .find(doc! {
            "date": { "$gt": now },
            "state": true,
            "availableWeight": { "$gt": 0.0 },
        })
        .sort(doc! { "date": 1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(populate(&data, found).await?))
}

/// GET /travels/filterByCity?origin=..&destination=..
pub async fn list_by_route(
    data: web::Data<AppState>,
    query: web::Query<RouteQuery>,
) -> Result<HttpResponse, ApiError> {
    let now = DateTime::from_millis(data.clock.now().timestamp_millis());
    let travels = data.mongodb.db.collection::<Travel>("travels");
    let found: Vec<Travel> = travels
        .find(doc! {
            "date": { "$gt": now },
            "origin": &query.origin,
            "destination": &query.destination,
            "state": true,
            "availableWeight": { "$gt": 0.0 },
        })
        .sort(doc! { "date": 1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(populate(&data, found).await?))
}

/// GET /travels/proprietor — the caller's own active travels.
pub async fn list_own_travels(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    let travels = data.mongodb.db.collection::<Travel>("travels");
    let found: Vec<Travel> = travels
        .find(doc! { "traveler": caller, "state": true })
        .sort(doc! { "date": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

/// GET /travels/{id}
pub async fn get_travel(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid travel id".to_string()))?;
    let travels = data.mongodb.db.collection::<Travel>("travels");
    let travel = travels
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("Travel"))?;
    let views = populate(&data, vec![travel]).await?;
    Ok(HttpResponse::Ok().json(&views[0]))
}

/// POST /travels
pub async fn create_travel(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<TravelPayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    let now = data.clock.now();
    validate_travel(&payload, now)?;

    // One upcoming travel per traveler, whatever its state flag says.
    let travels = data.mongodb.db.collection::<Travel>("travels");
    let existing = travels
        .find_one(doc! {
            "traveler": caller,
            "date": { "$gt": DateTime::from_millis(now.timestamp_millis()) },
        })
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("You have a current travel".to_string()));
    }

    let payload = payload.into_inner();
    let stamp = DateTime::from_millis(now.timestamp_millis());
    let new_travel = Travel {
        id: None,
        origin: payload.origin,
        destination: payload.destination,
        date: DateTime::from_millis(payload.date.timestamp_millis()),
        airport: payload.airport,
        terminal: payload.terminal,
        company: payload.company,
        billing_time: payload.billing_time,
        available_weight: payload.available_weight,
        traveler: caller,
        state: true,
        created_at: stamp,
        updated_at: stamp,
    };
    travels.insert_one(&new_travel).await?;
    info!("Travel created: {} -> {}", new_travel.origin, new_travel.destination);

    Ok(HttpResponse::Ok().json(json!({ "message": "The travel has been created correctly" })))
}

/// PUT /travels/{id} — owner only; same invariants as creation except
/// the duplicate-upcoming-travel check.
pub async fn update_travel(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<TravelPayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid travel id".to_string()))?;
    let now = data.clock.now();
    validate_travel(&payload, now)?;

    let travels = data.mongodb.db.collection::<Travel>("travels");
    let travel = travels
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("Travel"))?;
    if travel.traveler != caller {
        return Err(ApiError::Forbidden(
            "You can only modify your own travels".to_string(),
        ));
    }

    travels
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "origin": &payload.origin,
                "destination": &payload.destination,
                "date": DateTime::from_millis(payload.date.timestamp_millis()),
                "airport": &payload.airport,
                "terminal": &payload.terminal,
                "company": &payload.company,
                "billingTime": &payload.billing_time,
                "availableWeight": payload.available_weight,
                "updatedAt": DateTime::from_millis(now.timestamp_millis()),
            } },
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The travel has been updated correctly" })))
}

/// DELETE /travels/cancelation/{travel} — owner only; packages already
/// matched to the travel are left untouched.
pub async fn cancel_travel(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, USER_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid travel id".to_string()))?;
    let travels = data.mongodb.db.collection::<Travel>("travels");
    let travel = travels
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("Travel"))?;
    if travel.traveler != caller {
        return Err(ApiError::Forbidden(
            "You can only cancel your own travels".to_string(),
        ));
    }

    travels
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "state": false,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "The travel has been canceled correctly" })))
}

/// DELETE /travels/{id} — hard delete, super admin only.
pub async fn delete_travel(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid travel id".to_string()))?;
    let travels = data.mongodb.db.collection::<Travel>("travels");
    let result = travels.delete_one(doc! { "_id": id }).await?;
    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Travel"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The travel has been deleted correctly" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn base_payload(now: ChronoDateTime<Utc>) -> TravelPayload {
        TravelPayload {
            origin: "Madrid".to_string(),
            destination: "Malabo".to_string(),
            date: now + Duration::days(7),
            airport: "Barajas".to_string(),
            terminal: "T4".to_string(),
            company: "Ceiba".to_string(),
            billing_time: "08:30".to_string(),
            available_weight: 20.0,
        }
    }

    fn now() -> ChronoDateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn a_well_formed_travel_passes() {
        assert!(validate_travel(&base_payload(now()), now()).is_ok());
    }

    #[test]
    fn origin_equal_to_destination_is_rejected() {
        let mut payload = base_payload(now());
        payload.destination = "Madrid".to_string();
        assert!(matches!(
            validate_travel(&payload, now()),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn past_dates_are_rejected() {
        let mut payload = base_payload(now());
        payload.date = now() - Duration::days(1);
        assert!(matches!(
            validate_travel(&payload, now()),
            Err(ApiError::Validation(_))
        ));
        payload.date = now();
        assert!(validate_travel(&payload, now()).is_err());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut payload = base_payload(now());
        payload.airport = "  ".to_string();
        assert!(validate_travel(&payload, now()).is_err());
    }

    #[test]
    fn zero_weight_is_rejected() {
        let mut payload = base_payload(now());
        payload.available_weight = 0.0;
        assert!(validate_travel(&payload, now()).is_err());
    }

    #[test]
    fn the_loose_billing_time_is_still_accepted() {
        let mut payload = base_payload(now());
        payload.billing_time = "29:00".to_string();
        assert!(validate_travel(&payload, now()).is_ok());
        payload.billing_time = "8:30".to_string();
        assert!(validate_travel(&payload, now()).is_err());
    }
}
