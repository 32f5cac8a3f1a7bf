//! Database bootstrap: baseline modules with their CRUD permission grids,
//! plus an admin account wired through Administrators -> Super Admin so the
//! instance is administrable from first start. Every step is idempotent.

use sea_orm::DatabaseConnection;

use crate::errors::GatehouseError;
use crate::storage;

const BASELINE_MODULES: &[(&str, &str)] = &[
    ("Users", "User management module"),
    ("Groups", "Group management module"),
    ("Roles", "Role management module"),
    ("Modules", "Module management module"),
    ("Permissions", "Permission management module"),
];

const ADMIN_USERNAME: &str = "admin";
const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin123";

pub async fn ensure_baseline(db: &DatabaseConnection) -> Result<(), GatehouseError> {
    for (name, description) in BASELINE_MODULES {
        if storage::get_module_by_name(db, name).await?.is_none() {
            storage::create_module(db, name, Some(description)).await?;
            tracing::info!(module = name, "Created baseline module");
        }
    }

    let admin = match storage::get_user_by_username(db, ADMIN_USERNAME).await? {
        Some(user) => user,
        None => {
            let user = storage::create_user(db, ADMIN_USERNAME, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
            tracing::info!(
                "Created default admin user (username: {}, password: {})",
                ADMIN_USERNAME,
                ADMIN_PASSWORD
            );
            user
        }
    };

    let group = match storage::get_group_by_name(db, "Administrators").await? {
        Some(group) => group,
        None => {
            storage::create_group(db, "Administrators", Some("System administrators with full access"))
                .await?
        }
    };

    let role = match storage::get_role_by_name(db, "Super Admin").await? {
        Some(role) => role,
        None => {
            storage::create_role(db, "Super Admin", Some("Role with all system permissions")).await?
        }
    };

    storage::insert_membership(db, admin.id, group.id).await?;
    storage::insert_role_assignment(db, group.id, role.id).await?;
    for permission_id in storage::all_permission_ids(db).await? {
        storage::insert_grant(db, role.id, permission_id).await?;
    }

    Ok(())
}
