// src/models/role.rs

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

pub const USER_ROLE: &str = "USER_ROLE";
pub const ADMIN_ROLE: &str = "ADMIN_ROLE";
pub const SUPER_ADMIN_ROLE: &str = "SUPER_ADMIN_ROLE";

pub const DELIVERY_PERMISSION: &str = "DELIVERY_PERMISSION";
pub const SHIPPING_PERMISSION: &str = "SHIPPING_PERMISSION";
pub const RECEIVING_PERMISSION: &str = "RECEIVING_PERMISSION";
pub const COMPLETE_PERMISSION: &str = "COMPLETE_PERMISSION";

/// Flat name tag attached to users. No hierarchy.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Flat name tag attached to employees; gates the shipping-stage
/// actions on the dashboard.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
