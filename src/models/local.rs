// src/models/local.rs

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Branch office where staff process packages.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Local {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub country: String,
    pub city: String,
    pub direction: String,
    pub phone_number: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
