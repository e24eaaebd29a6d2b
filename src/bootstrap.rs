// src/bootstrap.rs

use bcrypt::{hash, DEFAULT_COST};
use futures_util::TryStreamExt;
use log::{info, warn};
use mongodb::bson::{doc, DateTime};
use mongodb::Database;

use crate::models::role::{
    Permission, Role, ADMIN_ROLE, COMPLETE_PERMISSION, DELIVERY_PERMISSION, RECEIVING_PERMISSION,
    SHIPPING_PERMISSION, SUPER_ADMIN_ROLE, USER_ROLE,
};
use crate::models::user::User;

const ROLE_NAMES: [&str; 3] = [USER_ROLE, ADMIN_ROLE, SUPER_ADMIN_ROLE];
const PERMISSION_NAMES: [&str; 4] = [
    DELIVERY_PERMISSION,
    SHIPPING_PERMISSION,
    RECEIVING_PERMISSION,
    COMPLETE_PERMISSION,
];

/// Seeds the role and permission tags plus a default admin account.
/// Safe to run on every boot.
pub async fn init(db: &Database) -> Result<(), mongodb::error::Error> {
    let now = DateTime::now();

    let roles = db.collection::<Role>("roles");
    for name in ROLE_NAMES {
        if roles.find_one(doc! { "name": name }).await?.is_none() {
            roles
                .insert_one(&Role {
                    id: None,
                    name: name.to_string(),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            info!("Role created: {}", name);
        }
    }

    let permissions = db.collection::<Permission>("permissions");
    for name in PERMISSION_NAMES {
        if permissions.find_one(doc! { "name": name }).await?.is_none() {
            permissions
                .insert_one(&Permission {
                    id: None,
                    name: name.to_string(),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            info!("Permission created: {}", name);
        }
    }

    let users = db.collection::<User>("users");
    if users.find_one(doc! { "username": "admin" }).await?.is_some() {
        return Ok(());
    }

    let all_roles: Vec<Role> = roles.find(doc! {}).await?.try_collect().await?;
    let role_ids = all_roles.into_iter().filter_map(|role| role.id).collect();

    let hashed_password = match hash("admin", DEFAULT_COST) {
        Ok(hashed) => hashed,
        Err(e) => {
            warn!("Error hashing the default admin password: {}", e);
            return Ok(());
        }
    };
    let admin = User {
        id: None,
        name: "Administrator".to_string(),
        surname: "Account".to_string(),
        phone_number: "+240000000000".to_string(),
        email: None,
        image: None,
        username: "admin".to_string(),
        password: hashed_password,
        roles: role_ids,
        state: true,
        created_at: now,
        updated_at: now,
    };
    users.insert_one(&admin).await?;
    info!("User admin created");

    Ok(())
}
