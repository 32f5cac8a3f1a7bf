//! Assignment coordinator: bulk attach/detach for the three relation pairs
//! (user<->group, group<->role, role<->permission).
//!
//! Every counterpart id is verified to exist before any row is written; an
//! unresolved id rejects the whole batch. The mutation phase runs inside a
//! single transaction, so a store-level item failure leaves nothing applied.
//! Duplicate pairs are absorbed silently and excluded from the added count.

use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;

use crate::errors::GatehouseError;
use crate::storage;

/// One failed counterpart in a bulk attach.
#[derive(Debug, Clone, Serialize)]
pub struct AttachError {
    pub counterpart_id: i32,
    pub reason: String,
}

/// Aggregate result of a bulk attach. `added` counts effectively-new rows;
/// pairs that already existed contribute nothing.
#[derive(Debug, Default, Serialize)]
pub struct AttachReport {
    pub added: u64,
    pub errors: Vec<AttachError>,
}

impl AttachReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

fn ensure_not_empty(ids: &[i32], what: &str) -> Result<(), GatehouseError> {
    if ids.is_empty() {
        return Err(GatehouseError::InvalidArgument(format!(
            "{what} array is required and must not be empty"
        )));
    }
    Ok(())
}

fn unresolved(what: &str, missing: &[i32]) -> GatehouseError {
    let ids: Vec<String> = missing.iter().map(|id| id.to_string()).collect();
    GatehouseError::InvalidArgument(format!("unknown {what} ids: {}", ids.join(", ")))
}

/// Attach `user_ids` to a group as members.
pub async fn attach_users_to_group(
    db: &DatabaseConnection,
    group_id: i32,
    user_ids: &[i32],
) -> Result<AttachReport, GatehouseError> {
    ensure_not_empty(user_ids, "user_ids")?;

    storage::get_group(db, group_id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Group not found".to_string()))?;

    let missing = storage::missing_user_ids(db, user_ids).await?;
    if !missing.is_empty() {
        return Err(unresolved("user", &missing));
    }

    let txn = db.begin().await?;
    let mut report = AttachReport::default();
    for &user_id in user_ids {
        match storage::insert_membership(&txn, user_id, group_id).await {
            Ok(rows) => report.added += rows,
            Err(err) => report.errors.push(AttachError {
                counterpart_id: user_id,
                reason: err.to_string(),
            }),
        }
    }

    if report.is_clean() {
        txn.commit().await?;
    } else {
        report.added = 0;
        txn.rollback().await?;
    }
    Ok(report)
}

/// Remove one user from a group. Removing an absent pair is an error.
pub async fn detach_user_from_group(
    db: &DatabaseConnection,
    group_id: i32,
    user_id: i32,
) -> Result<(), GatehouseError> {
    let rows = storage::delete_membership(db, user_id, group_id).await?;
    if rows == 0 {
        return Err(GatehouseError::NotFound(
            "User not found in group".to_string(),
        ));
    }
    Ok(())
}

/// Attach `role_ids` to a group.
pub async fn attach_roles_to_group(
    db: &DatabaseConnection,
    group_id: i32,
    role_ids: &[i32],
) -> Result<AttachReport, GatehouseError> {
    ensure_not_empty(role_ids, "role_ids")?;

    storage::get_group(db, group_id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Group not found".to_string()))?;

    let missing = storage::missing_role_ids(db, role_ids).await?;
    if !missing.is_empty() {
        return Err(unresolved("role", &missing));
    }

    let txn = db.begin().await?;
    let mut report = AttachReport::default();
    for &role_id in role_ids {
        match storage::insert_role_assignment(&txn, group_id, role_id).await {
            Ok(rows) => report.added += rows,
            Err(err) => report.errors.push(AttachError {
                counterpart_id: role_id,
                reason: err.to_string(),
            }),
        }
    }

    if report.is_clean() {
        txn.commit().await?;
    } else {
        report.added = 0;
        txn.rollback().await?;
    }
    Ok(report)
}

/// Remove one role from a group. Removing an absent pair is an error.
pub async fn detach_role_from_group(
    db: &DatabaseConnection,
    group_id: i32,
    role_id: i32,
) -> Result<(), GatehouseError> {
    let rows = storage::delete_role_assignment(db, group_id, role_id).await?;
    if rows == 0 {
        return Err(GatehouseError::NotFound(
            "Role not found in group".to_string(),
        ));
    }
    Ok(())
}

/// Grant `permission_ids` to a role.
pub async fn attach_permissions_to_role(
    db: &DatabaseConnection,
    role_id: i32,
    permission_ids: &[i32],
) -> Result<AttachReport, GatehouseError> {
    ensure_not_empty(permission_ids, "permission_ids")?;

    storage::get_role(db, role_id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Role not found".to_string()))?;

    let missing = storage::missing_permission_ids(db, permission_ids).await?;
    if !missing.is_empty() {
        return Err(unresolved("permission", &missing));
    }

    let txn = db.begin().await?;
    let mut report = AttachReport::default();
    for &permission_id in permission_ids {
        match storage::insert_grant(&txn, role_id, permission_id).await {
            Ok(rows) => report.added += rows,
            Err(err) => report.errors.push(AttachError {
                counterpart_id: permission_id,
                reason: err.to_string(),
            }),
        }
    }

    if report.is_clean() {
        txn.commit().await?;
    } else {
        report.added = 0;
        txn.rollback().await?;
    }
    Ok(report)
}

/// Revoke one permission from a role. Revoking an absent pair is an error.
pub async fn detach_permission_from_role(
    db: &DatabaseConnection,
    role_id: i32,
    permission_id: i32,
) -> Result<(), GatehouseError> {
    let rows = storage::delete_grant(db, role_id, permission_id).await?;
    if rows == 0 {
        return Err(GatehouseError::NotFound(
            "Permission not found in role".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities;
    use crate::testutil::TestDb;
    use sea_orm::EntityTrait;

    async fn seed_users(db: &DatabaseConnection, n: usize) -> Vec<i32> {
        let mut ids = Vec::new();
        for i in 0..n {
            let user = storage::create_user(
                db,
                &format!("user{i}"),
                &format!("user{i}@example.com"),
                "pw123456",
            )
            .await
            .expect("Failed to create user");
            ids.push(user.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_attach_users_to_group() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let group = storage::create_group(db, "Engineering", None)
            .await
            .expect("Failed to create group");
        let users = seed_users(db, 3).await;

        let report = attach_users_to_group(db, group.id, &users)
            .await
            .expect("Attach failed");
        assert_eq!(report.added, 3);
        assert!(report.is_clean());

        let detail = storage::get_group_detail(db, group.id)
            .await
            .expect("Query failed")
            .expect("Group not found");
        assert_eq!(detail.users.len(), 3);
    }

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let group = storage::create_group(db, "Engineering", None)
            .await
            .expect("Failed to create group");
        let users = seed_users(db, 2).await;

        let first = attach_users_to_group(db, group.id, &users)
            .await
            .expect("Attach failed");
        assert_eq!(first.added, 2);

        // Same counterparts again: success, zero net change
        let second = attach_users_to_group(db, group.id, &users)
            .await
            .expect("Attach failed");
        assert_eq!(second.added, 0);
        assert!(second.is_clean());

        let detail = storage::get_group_detail(db, group.id)
            .await
            .expect("Query failed")
            .expect("Group not found");
        assert_eq!(detail.users.len(), 2);
    }

    #[tokio::test]
    async fn test_attach_empty_list_is_invalid() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let group = storage::create_group(db, "Engineering", None)
            .await
            .expect("Failed to create group");

        let result = attach_users_to_group(db, group.id, &[]).await;
        assert!(matches!(result, Err(GatehouseError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_attach_unknown_anchor() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let users = seed_users(db, 1).await;
        let result = attach_users_to_group(db, 999, &users).await;
        assert!(matches!(result, Err(GatehouseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_attach_precheck_is_all_or_nothing() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let group = storage::create_group(db, "Engineering", None)
            .await
            .expect("Failed to create group");
        let users = seed_users(db, 2).await;

        let mut with_ghost = users.clone();
        with_ghost.push(999);

        let err = attach_users_to_group(db, group.id, &with_ghost)
            .await
            .expect_err("Attach should have been rejected");
        match err {
            GatehouseError::InvalidArgument(msg) => {
                assert!(msg.contains("999"), "error must name the missing id: {msg}")
            }
            other => panic!("expected InvalidArgument, got {other:?}"),
        }

        // Zero relation rows were written
        let memberships = entities::Membership::find()
            .all(db)
            .await
            .expect("Query failed");
        assert!(memberships.is_empty());
    }

    #[tokio::test]
    async fn test_attach_roles_and_permissions() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let group = storage::create_group(db, "Engineering", None)
            .await
            .expect("Failed to create group");
        let role = storage::create_role(db, "Developer", None)
            .await
            .expect("Failed to create role");
        storage::create_module(db, "Billing", None)
            .await
            .expect("Failed to create module");

        let report = attach_roles_to_group(db, group.id, &[role.id])
            .await
            .expect("Attach failed");
        assert_eq!(report.added, 1);

        let permission_ids = storage::all_permission_ids(db)
            .await
            .expect("Query failed");
        assert_eq!(permission_ids.len(), 4);

        let report = attach_permissions_to_role(db, role.id, &permission_ids)
            .await
            .expect("Attach failed");
        assert_eq!(report.added, 4);

        let detail = storage::get_role_detail(db, role.id)
            .await
            .expect("Query failed")
            .expect("Role not found");
        assert_eq!(detail.permissions.len(), 4);
        assert_eq!(detail.groups.len(), 1);
    }

    #[tokio::test]
    async fn test_attach_permissions_rejects_unknown_ids() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let role = storage::create_role(db, "Developer", None)
            .await
            .expect("Failed to create role");

        let err = attach_permissions_to_role(db, role.id, &[123, 456])
            .await
            .expect_err("Attach should have been rejected");
        match err {
            GatehouseError::InvalidArgument(msg) => {
                assert!(msg.contains("123") && msg.contains("456"));
            }
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_detach_is_not_idempotent() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let group = storage::create_group(db, "Engineering", None)
            .await
            .expect("Failed to create group");
        let users = seed_users(db, 1).await;

        attach_users_to_group(db, group.id, &users)
            .await
            .expect("Attach failed");

        detach_user_from_group(db, group.id, users[0])
            .await
            .expect("Detach failed");

        // Second removal of the same pair is reported, unlike creation
        let result = detach_user_from_group(db, group.id, users[0]).await;
        assert!(matches!(result, Err(GatehouseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_detach_role_and_permission_absent_pairs() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let group = storage::create_group(db, "Engineering", None)
            .await
            .expect("Failed to create group");
        let role = storage::create_role(db, "Developer", None)
            .await
            .expect("Failed to create role");

        let result = detach_role_from_group(db, group.id, role.id).await;
        assert!(matches!(result, Err(GatehouseError::NotFound(_))));

        let result = detach_permission_from_role(db, role.id, 1).await;
        assert!(matches!(result, Err(GatehouseError::NotFound(_))));
    }
}
