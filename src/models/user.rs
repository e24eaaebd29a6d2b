// src/models/user.rs

use std::collections::HashMap;

use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub surname: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub username: String,
    pub password: String,
    pub roles: Vec<ObjectId>,
    /// false once the account is disabled.
    pub state: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// What gets embedded when a package or travel listing expands its
/// user references. Never includes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub surname: String,
    pub phone_number: String,
    pub username: String,
}

impl UserSummary {
    pub fn of(user: &User) -> Option<Self> {
        user.id.map(|id| UserSummary {
            id,
            name: user.name.clone(),
            surname: user.surname.clone(),
            phone_number: user.phone_number.clone(),
            username: user.username.clone(),
        })
    }

    /// One `$in` fetch for every id a listing needs to expand.
    pub async fn map_for(
        db: &Database,
        ids: Vec<ObjectId>,
    ) -> Result<HashMap<ObjectId, UserSummary>, mongodb::error::Error> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users = db.collection::<User>("users");
        let found: Vec<User> = users
            .find(doc! { "_id": { "$in": ids } })
            .await?
            .try_collect()
            .await?;
        Ok(found
            .iter()
            .filter_map(UserSummary::of)
            .map(|summary| (summary.id, summary))
            .collect())
    }
}
