// src/models/employee.rs

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Joins a user to a branch office with the staff permissions they hold
/// there.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    pub local: ObjectId,
    pub permissions: Vec<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
