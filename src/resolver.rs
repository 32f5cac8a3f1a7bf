//! Authorization resolver: computes the permissions a user can reach
//! through the membership -> role assignment -> grant chain.
//!
//! Reads only. A user may reach the same permission over several chains;
//! the result is a set, never a multiset.

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;

use crate::entities;
use crate::entities::permission::Action;
use crate::entities::{grant, membership, module, permission, role_assignment};
use crate::errors::GatehouseError;

/// One effective permission, joined with its owning module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct PermissionRecord {
    pub permission_id: i32,
    pub module_id: i32,
    pub module_name: String,
    pub action: String,
}

/// Inner joins from `permissions` down to `memberships`. The chain walks
/// permissions -> grants -> roles -> role_assignments -> groups -> memberships,
/// so a row survives only if a complete chain exists.
fn reachable_from_user(
    query: sea_orm::Select<entities::Permission>,
    user_id: i32,
) -> sea_orm::Select<entities::Permission> {
    query
        .join(JoinType::InnerJoin, permission::Relation::Module.def())
        .join_rev(JoinType::InnerJoin, grant::Relation::Permission.def())
        .join(JoinType::InnerJoin, grant::Relation::Role.def())
        .join_rev(JoinType::InnerJoin, role_assignment::Relation::Role.def())
        .join(JoinType::InnerJoin, role_assignment::Relation::Group.def())
        .join_rev(JoinType::InnerJoin, membership::Relation::Group.def())
        .filter(membership::Column::UserId.eq(user_id))
}

/// Compute the distinct set of permissions reachable by `user_id`, ordered
/// by module name then action. An unknown user resolves to an empty set.
pub async fn effective_permissions(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<PermissionRecord>, GatehouseError> {
    let query = entities::Permission::find()
        .select_only()
        .column_as(permission::Column::Id, "permission_id")
        .column(permission::Column::ModuleId)
        .column_as(module::Column::Name, "module_name")
        .column(permission::Column::Action)
        .distinct();

    Ok(reachable_from_user(query, user_id)
        .order_by_asc(module::Column::Name)
        .order_by_asc(permission::Column::Action)
        .into_model::<PermissionRecord>()
        .all(db)
        .await?)
}

/// Targeted existence check: does (user, module, action) lie in the resolved
/// set? Runs as a single counted join, not a full resolution.
pub async fn has_permission(
    db: &DatabaseConnection,
    user_id: i32,
    module_name: &str,
    action: Action,
) -> Result<bool, GatehouseError> {
    let matches = reachable_from_user(entities::Permission::find(), user_id)
        .filter(module::Column::Name.eq(module_name))
        .filter(permission::Column::Action.eq(action.as_str()))
        .count(db)
        .await?;

    Ok(matches > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;
    use crate::testutil::{permission_id, TestDb};

    /// user -> group -> role, returning (user_id, group_id, role_id)
    async fn seed_chain(db: &DatabaseConnection, username: &str) -> (i32, i32, i32) {
        let user = storage::create_user(
            db,
            username,
            &format!("{username}@example.com"),
            "pw123456",
        )
        .await
        .expect("Failed to create user");
        let group = storage::create_group(db, &format!("{username}-group"), None)
            .await
            .expect("Failed to create group");
        let role = storage::create_role(db, &format!("{username}-role"), None)
            .await
            .expect("Failed to create role");

        storage::insert_membership(db, user.id, group.id)
            .await
            .expect("Failed to insert membership");
        storage::insert_role_assignment(db, group.id, role.id)
            .await
            .expect("Failed to insert role assignment");

        (user.id, group.id, role.id)
    }

    #[tokio::test]
    async fn test_resolution_completeness() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let (user_id, _, role_id) = seed_chain(db, "alice").await;
        let module = storage::create_module(db, "Billing", None)
            .await
            .expect("Failed to create module");
        let read_id = permission_id(db, module.id, "read").await;

        storage::insert_grant(db, role_id, read_id)
            .await
            .expect("Failed to insert grant");

        let resolved = effective_permissions(db, user_id)
            .await
            .expect("Resolution failed");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].permission_id, read_id);
        assert_eq!(resolved[0].module_name, "Billing");
        assert_eq!(resolved[0].action, "read");
    }

    #[tokio::test]
    async fn test_resolution_minimality() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        // A full chain for alice and a granted role that alice cannot reach
        let (alice_id, _, alice_role) = seed_chain(db, "alice").await;
        let (_bob_id, _, bob_role) = seed_chain(db, "bob").await;

        let module = storage::create_module(db, "Billing", None)
            .await
            .expect("Failed to create module");
        let read_id = permission_id(db, module.id, "read").await;
        let update_id = permission_id(db, module.id, "update").await;

        storage::insert_grant(db, alice_role, read_id)
            .await
            .expect("Failed to insert grant");
        storage::insert_grant(db, bob_role, update_id)
            .await
            .expect("Failed to insert grant");

        let resolved = effective_permissions(db, alice_id)
            .await
            .expect("Resolution failed");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].action, "read");
    }

    #[tokio::test]
    async fn test_resolution_dedup_across_paths() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        // Two distinct chains from alice to the same permission
        let (user_id, group_a, role_a) = seed_chain(db, "alice").await;
        let group_b = storage::create_group(db, "second-group", None)
            .await
            .expect("Failed to create group");
        let role_b = storage::create_role(db, "second-role", None)
            .await
            .expect("Failed to create role");
        storage::insert_membership(db, user_id, group_b.id)
            .await
            .expect("Failed to insert membership");
        storage::insert_role_assignment(db, group_b.id, role_b.id)
            .await
            .expect("Failed to insert role assignment");

        let module = storage::create_module(db, "Billing", None)
            .await
            .expect("Failed to create module");
        let read_id = permission_id(db, module.id, "read").await;

        storage::insert_grant(db, role_a, read_id)
            .await
            .expect("Failed to insert grant");
        storage::insert_grant(db, role_b.id, read_id)
            .await
            .expect("Failed to insert grant");

        // Also a second role on the first group granting the same permission
        storage::insert_role_assignment(db, group_a, role_b.id)
            .await
            .expect("Failed to insert role assignment");

        let resolved = effective_permissions(db, user_id)
            .await
            .expect("Resolution failed");
        assert_eq!(resolved.len(), 1, "permission must appear exactly once");
    }

    #[tokio::test]
    async fn test_resolution_ordering() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let (user_id, _, role_id) = seed_chain(db, "alice").await;
        let zebra = storage::create_module(db, "Zebra", None)
            .await
            .expect("Failed to create module");
        let apple = storage::create_module(db, "Apple", None)
            .await
            .expect("Failed to create module");

        for module_id in [zebra.id, apple.id] {
            for action in ["update", "read"] {
                let id = permission_id(db, module_id, action).await;
                storage::insert_grant(db, role_id, id)
                    .await
                    .expect("Failed to insert grant");
            }
        }

        let resolved = effective_permissions(db, user_id)
            .await
            .expect("Resolution failed");
        let keys: Vec<(String, String)> = resolved
            .into_iter()
            .map(|p| (p.module_name, p.action))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Apple".to_string(), "read".to_string()),
                ("Apple".to_string(), "update".to_string()),
                ("Zebra".to_string(), "read".to_string()),
                ("Zebra".to_string(), "update".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_user_resolves_empty() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let resolved = effective_permissions(db, 424242)
            .await
            .expect("Resolution failed");
        assert!(resolved.is_empty());

        let allowed = has_permission(db, 424242, "Billing", Action::Read)
            .await
            .expect("Check failed");
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_broken_chain_grants_nothing() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        // Membership and grant exist, but the group carries no role
        let user = storage::create_user(db, "alice", "alice@example.com", "pw123456")
            .await
            .expect("Failed to create user");
        let group = storage::create_group(db, "Engineering", None)
            .await
            .expect("Failed to create group");
        let role = storage::create_role(db, "Auditor", None)
            .await
            .expect("Failed to create role");
        storage::insert_membership(db, user.id, group.id)
            .await
            .expect("Failed to insert membership");

        let module = storage::create_module(db, "Billing", None)
            .await
            .expect("Failed to create module");
        let read_id = permission_id(db, module.id, "read").await;
        storage::insert_grant(db, role.id, read_id)
            .await
            .expect("Failed to insert grant");

        assert!(effective_permissions(db, user.id)
            .await
            .expect("Resolution failed")
            .is_empty());
    }

    #[tokio::test]
    async fn test_has_permission_matches_full_resolution() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let (user_id, _, role_id) = seed_chain(db, "alice").await;
        let module = storage::create_module(db, "Billing", None)
            .await
            .expect("Failed to create module");
        let read_id = permission_id(db, module.id, "read").await;
        storage::insert_grant(db, role_id, read_id)
            .await
            .expect("Failed to insert grant");

        assert!(has_permission(db, user_id, "Billing", Action::Read)
            .await
            .expect("Check failed"));
        assert!(!has_permission(db, user_id, "Billing", Action::Delete)
            .await
            .expect("Check failed"));
        assert!(!has_permission(db, user_id, "Payroll", Action::Read)
            .await
            .expect("Check failed"));
    }

    #[tokio::test]
    async fn test_revoked_grant_disappears_from_resolution() {
        let test_db = TestDb::new().await;
        let db = test_db.connection();

        let (user_id, _, role_id) = seed_chain(db, "alice").await;
        let module = storage::create_module(db, "Billing", None)
            .await
            .expect("Failed to create module");
        let read_id = permission_id(db, module.id, "read").await;
        storage::insert_grant(db, role_id, read_id)
            .await
            .expect("Failed to insert grant");

        assert!(has_permission(db, user_id, "Billing", Action::Read)
            .await
            .expect("Check failed"));

        storage::delete_grant(db, role_id, read_id)
            .await
            .expect("Failed to delete grant");

        assert!(!has_permission(db, user_id, "Billing", Action::Read)
            .await
            .expect("Check failed"));
        assert!(effective_permissions(db, user_id)
            .await
            .expect("Resolution failed")
            .is_empty());
    }
}
