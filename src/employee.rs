// src/employee.rs

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{current_user, require_role};
use crate::error::ApiError;
use crate::models::employee::Employee;
use crate::models::local::Local;
use crate::models::role::{Permission, SUPER_ADMIN_ROLE};
use crate::models::user::{User, UserSummary};

#[derive(Debug, Deserialize)]
pub struct EmployeePayload {
    pub user: String,
    pub local: String,
    pub permissions: Vec<String>,
}

/// Listing entry with the references expanded.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeView {
    #[serde(rename = "_id")]
    pub id: Option<ObjectId>,
    pub user: Option<UserSummary>,
    pub local: Option<Local>,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

struct EmployeeRefs {
    user: ObjectId,
    local: ObjectId,
    permissions: Vec<ObjectId>,
}

/// Parses and verifies every reference in the payload; an employee
/// record must never point at ids that do not exist.
async fn resolve_refs(
    data: &AppState,
    payload: &EmployeePayload,
) -> Result<EmployeeRefs, ApiError> {
    let user = ObjectId::parse_str(payload.user.as_str())
        .map_err(|_| ApiError::Validation("Invalid user id".to_string()))?;
    let local = ObjectId::parse_str(payload.local.as_str())
        .map_err(|_| ApiError::Validation("Invalid local id".to_string()))?;
    let mut permissions = Vec::with_capacity(payload.permissions.len());
    for raw in &payload.permissions {
        permissions.push(
            ObjectId::parse_str(raw.as_str())
                .map_err(|_| ApiError::Validation("Invalid permission id".to_string()))?,
        );
    }

    let users = data.mongodb.db.collection::<User>("users");
    if users.find_one(doc! { "_id": user }).await?.is_none() {
        return Err(ApiError::NotFound("User"));
    }
    let locals = data.mongodb.db.collection::<Local>("locals");
    if locals.find_one(doc! { "_id": local }).await?.is_none() {
        return Err(ApiError::NotFound("Local"));
    }
    let permissions_coll = data.mongodb.db.collection::<Permission>("permissions");
    let found: Vec<Permission> = permissions_coll
        .find(doc! { "_id": { "$in": &permissions } })
        .await?
        .try_collect()
        .await?;
    if found.len() != permissions.len() {
        return Err(ApiError::NotFound("Permission"));
    }

    Ok(EmployeeRefs {
        user,
        local,
        permissions,
    })
}

/// GET /employees
pub async fn list_employees(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let employees = data.mongodb.db.collection::<Employee>("employees");
    let found: Vec<Employee> = employees.find(doc! {}).await?.try_collect().await?;

    let user_ids: Vec<ObjectId> = found.iter().map(|e| e.user).collect();
    let summaries = UserSummary::map_for(&data.mongodb.db, user_ids).await?;

    let locals = data.mongodb.db.collection::<Local>("locals");
    let permissions_coll = data.mongodb.db.collection::<Permission>("permissions");

    let mut views = Vec::with_capacity(found.len());
    for employee in found {
        let local = locals.find_one(doc! { "_id": employee.local }).await?;
        let permissions: Vec<Permission> = permissions_coll
            .find(doc! { "_id": { "$in": &employee.permissions } })
            .await?
            .try_collect()
            .await?;
        views.push(EmployeeView {
            id: employee.id,
            user: summaries.get(&employee.user).cloned(),
            local,
            permissions,
            created_at: employee.created_at,
            updated_at: employee.updated_at,
        });
    }
    Ok(HttpResponse::Ok().json(views))
}

/// GET /employees/{id}
pub async fn get_employee(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid employee id".to_string()))?;
    let employees = data.mongodb.db.collection::<Employee>("employees");
    let employee = employees
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("Employee"))?;
    Ok(HttpResponse::Ok().json(employee))
}

/// POST /employees
pub async fn create_employee(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<EmployeePayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let refs = resolve_refs(&data, &payload).await?;
    let employees = data.mongodb.db.collection::<Employee>("employees");
    if employees
        .find_one(doc! { "user": refs.user })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "This user is already an employee".to_string(),
        ));
    }

    let now = DateTime::from_millis(data.clock.now().timestamp_millis());
    let new_employee = Employee {
        id: None,
        user: refs.user,
        local: refs.local,
        permissions: refs.permissions,
        created_at: now,
        updated_at: now,
    };
    employees.insert_one(&new_employee).await?;
    info!("Employee created for user {}", refs.user.to_hex());

    Ok(HttpResponse::Ok().json(json!({ "message": "The employee has been created correctly" })))
}

/// PUT /employees/{id}
pub async fn update_employee(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<EmployeePayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid employee id".to_string()))?;
    let refs = resolve_refs(&data, &payload).await?;

    let employees = data.mongodb.db.collection::<Employee>("employees");
    let result = employees
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "user": refs.user,
                "local": refs.local,
                "permissions": refs.permissions,
                "updatedAt": DateTime::from_millis(data.clock.now().timestamp_millis()),
            } },
        )
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Employee"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The employee has been updated correctly" })))
}

/// DELETE /employees/{id}
pub async fn delete_employee(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    require_role(&data, &caller, SUPER_ADMIN_ROLE).await?;

    let id = ObjectId::parse_str(path.into_inner().as_str())
        .map_err(|_| ApiError::Validation("Invalid employee id".to_string()))?;
    let employees = data.mongodb.db.collection::<Employee>("employees");
    let result = employees.delete_one(doc! { "_id": id }).await?;
    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Employee"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The employee has been deleted correctly" })))
}
