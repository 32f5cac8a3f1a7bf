use crate::entities;
use crate::entities::permission::Action;
use crate::entities::{grant, group, membership, module, permission, role, role_assignment, user};
use crate::errors::GatehouseError;
use crate::settings::Database as DbCfg;
use base64ct::Encoding;
use chrono::Utc;
use migration::MigratorTrait;
use rand::RngCore;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    FromQueryResult, JoinType, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set, SqlErr,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Short reference shapes embedded in detail views.
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: i32,
    pub username: String,
    pub email: String,
}

impl From<user::Model> for UserRef {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupRef {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

impl From<group::Model> for GroupRef {
    fn from(g: group::Model) -> Self {
        Self {
            id: g.id,
            name: g.name,
            description: g.description,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleRef {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

impl From<role::Model> for RoleRef {
    fn from(r: role::Model) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
        }
    }
}

/// A permission joined with its owning module.
#[derive(Debug, Clone, Serialize, FromQueryResult)]
pub struct PermissionInfo {
    pub id: i32,
    pub name: String,
    pub action: String,
    pub module_id: i32,
    pub module_name: String,
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: user::Model,
    pub groups: Vec<GroupRef>,
}

#[derive(Debug, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: group::Model,
    pub users: Vec<UserRef>,
    pub roles: Vec<RoleRef>,
}

#[derive(Debug, Serialize)]
pub struct RoleSummary {
    #[serde(flatten)]
    pub role: role::Model,
    pub group_count: u64,
    pub permission_count: u64,
}

#[derive(Debug, Serialize)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: role::Model,
    pub permissions: Vec<PermissionInfo>,
    pub groups: Vec<GroupRef>,
}

#[derive(Debug, Serialize)]
pub struct ModuleSummary {
    #[serde(flatten)]
    pub module: module::Model,
    pub permission_count: u64,
}

#[derive(Debug, Serialize)]
pub struct ModuleDetail {
    #[serde(flatten)]
    pub module: module::Model,
    pub permissions: Vec<permission::Model>,
}

#[derive(Debug, Serialize)]
pub struct PermissionDetail {
    #[serde(flatten)]
    pub permission: PermissionInfo,
    pub roles: Vec<RoleRef>,
}

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, GatehouseError> {
    let db = Database::connect(&cfg.url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Map constraint violations onto the stable error taxonomy; everything
/// else stays a store error.
fn constraint_error(what: &str, err: sea_orm::DbErr) -> GatehouseError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            GatehouseError::Conflict(format!("{what} already exists"))
        }
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            GatehouseError::NotFound(format!("referenced entity for {what} does not exist"))
        }
        _ => GatehouseError::Db(err),
    }
}

fn random_id() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}

fn hash_password(password: &str) -> Result<String, GatehouseError> {
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| GatehouseError::Other(format!("Password hashing failed: {}", e)))
}

// User management functions

pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
) -> Result<user::Model, GatehouseError> {
    let now = now();
    let password_hash = hash_password(password)?;

    let user = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    user.insert(db)
        .await
        .map_err(|e| constraint_error("username or email", e))
}

pub async fn get_user(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<user::Model>, GatehouseError> {
    Ok(entities::User::find_by_id(id).one(db).await?)
}

pub async fn get_user_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<user::Model>, GatehouseError> {
    Ok(entities::User::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?)
}

pub async fn verify_user_password(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<Option<user::Model>, GatehouseError> {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let user = match get_user_by_username(db, username).await? {
        Some(u) => u,
        None => return Ok(None),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| GatehouseError::Other(format!("Invalid password hash: {}", e)))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
    {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<UserDetail>, GatehouseError> {
    let users = entities::User::find()
        .order_by_asc(user::Column::Username)
        .all(db)
        .await?;

    // Second read, joined in memory
    let pairs = entities::Membership::find()
        .find_also_related(entities::Group)
        .all(db)
        .await?;

    let mut groups_by_user: HashMap<i32, Vec<GroupRef>> = HashMap::new();
    for (m, g) in pairs {
        if let Some(g) = g {
            groups_by_user.entry(m.user_id).or_default().push(g.into());
        }
    }

    Ok(users
        .into_iter()
        .map(|u| {
            let groups = groups_by_user.remove(&u.id).unwrap_or_default();
            UserDetail { user: u, groups }
        })
        .collect())
}

pub async fn get_user_detail(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<UserDetail>, GatehouseError> {
    let user = match get_user(db, id).await? {
        Some(u) => u,
        None => return Ok(None),
    };

    let groups = user
        .find_related(entities::Group)
        .all(db)
        .await?
        .into_iter()
        .map(GroupRef::from)
        .collect();

    Ok(Some(UserDetail { user, groups }))
}

pub async fn update_user(
    db: &DatabaseConnection,
    id: i32,
    username: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<user::Model, GatehouseError> {
    let user = get_user(db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("User not found".to_string()))?;

    let mut active: user::ActiveModel = user.into();
    if let Some(username) = username {
        active.username = Set(username.to_string());
    }
    if let Some(email) = email {
        active.email = Set(email.to_string());
    }
    if let Some(password) = password {
        active.password_hash = Set(hash_password(password)?);
    }
    active.updated_at = Set(now());

    active
        .update(db)
        .await
        .map_err(|e| constraint_error("username or email", e))
}

pub async fn delete_user(db: &DatabaseConnection, id: i32) -> Result<(), GatehouseError> {
    let res = entities::User::delete_by_id(id).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(GatehouseError::NotFound("User not found".to_string()));
    }
    Ok(())
}

pub async fn missing_user_ids(
    db: &DatabaseConnection,
    ids: &[i32],
) -> Result<Vec<i32>, GatehouseError> {
    let found: HashSet<i32> = entities::User::find()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::Id.is_in(ids.iter().copied()))
        .into_tuple::<i32>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let mut missing: Vec<i32> = ids
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect();
    missing.sort_unstable();
    missing.dedup();
    Ok(missing)
}

// Group management functions

pub async fn create_group(
    db: &DatabaseConnection,
    name: &str,
    description: Option<&str>,
) -> Result<group::Model, GatehouseError> {
    let now = now();
    let group = group::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description.map(|d| d.to_string())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    group
        .insert(db)
        .await
        .map_err(|e| constraint_error("Group name", e))
}

pub async fn get_group(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<group::Model>, GatehouseError> {
    Ok(entities::Group::find_by_id(id).one(db).await?)
}

pub async fn get_group_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<group::Model>, GatehouseError> {
    Ok(entities::Group::find()
        .filter(group::Column::Name.eq(name))
        .one(db)
        .await?)
}

pub async fn list_groups(db: &DatabaseConnection) -> Result<Vec<GroupDetail>, GatehouseError> {
    let groups = entities::Group::find()
        .order_by_asc(group::Column::Name)
        .all(db)
        .await?;

    let member_pairs = entities::Membership::find()
        .find_also_related(entities::User)
        .all(db)
        .await?;
    let mut users_by_group: HashMap<i32, Vec<UserRef>> = HashMap::new();
    for (m, u) in member_pairs {
        if let Some(u) = u {
            users_by_group.entry(m.group_id).or_default().push(u.into());
        }
    }

    let role_pairs = entities::RoleAssignment::find()
        .find_also_related(entities::Role)
        .all(db)
        .await?;
    let mut roles_by_group: HashMap<i32, Vec<RoleRef>> = HashMap::new();
    for (a, r) in role_pairs {
        if let Some(r) = r {
            roles_by_group.entry(a.group_id).or_default().push(r.into());
        }
    }

    Ok(groups
        .into_iter()
        .map(|g| {
            let users = users_by_group.remove(&g.id).unwrap_or_default();
            let roles = roles_by_group.remove(&g.id).unwrap_or_default();
            GroupDetail {
                group: g,
                users,
                roles,
            }
        })
        .collect())
}

pub async fn get_group_detail(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<GroupDetail>, GatehouseError> {
    let group = match get_group(db, id).await? {
        Some(g) => g,
        None => return Ok(None),
    };

    let users = group
        .find_related(entities::User)
        .all(db)
        .await?
        .into_iter()
        .map(UserRef::from)
        .collect();
    let roles = group
        .find_related(entities::Role)
        .all(db)
        .await?
        .into_iter()
        .map(RoleRef::from)
        .collect();

    Ok(Some(GroupDetail {
        group,
        users,
        roles,
    }))
}

pub async fn update_group(
    db: &DatabaseConnection,
    id: i32,
    name: &str,
    description: Option<&str>,
) -> Result<group::Model, GatehouseError> {
    let group = get_group(db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Group not found".to_string()))?;

    let mut active: group::ActiveModel = group.into();
    active.name = Set(name.to_string());
    active.description = Set(description.map(|d| d.to_string()));
    active.updated_at = Set(now());

    active
        .update(db)
        .await
        .map_err(|e| constraint_error("Group name", e))
}

pub async fn delete_group(db: &DatabaseConnection, id: i32) -> Result<(), GatehouseError> {
    let res = entities::Group::delete_by_id(id).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(GatehouseError::NotFound("Group not found".to_string()));
    }
    Ok(())
}

// Role management functions

pub async fn create_role(
    db: &DatabaseConnection,
    name: &str,
    description: Option<&str>,
) -> Result<role::Model, GatehouseError> {
    let now = now();
    let role = role::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description.map(|d| d.to_string())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    role.insert(db)
        .await
        .map_err(|e| constraint_error("Role name", e))
}

pub async fn get_role(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<role::Model>, GatehouseError> {
    Ok(entities::Role::find_by_id(id).one(db).await?)
}

pub async fn get_role_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<role::Model>, GatehouseError> {
    Ok(entities::Role::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await?)
}

pub async fn list_roles(db: &DatabaseConnection) -> Result<Vec<RoleSummary>, GatehouseError> {
    let roles = entities::Role::find()
        .order_by_asc(role::Column::Name)
        .all(db)
        .await?;

    let assignments = entities::RoleAssignment::find().all(db).await?;
    let mut group_counts: HashMap<i32, u64> = HashMap::new();
    for a in assignments {
        *group_counts.entry(a.role_id).or_default() += 1;
    }

    let grants = entities::Grant::find().all(db).await?;
    let mut permission_counts: HashMap<i32, u64> = HashMap::new();
    for g in grants {
        *permission_counts.entry(g.role_id).or_default() += 1;
    }

    Ok(roles
        .into_iter()
        .map(|r| {
            let group_count = group_counts.remove(&r.id).unwrap_or_default();
            let permission_count = permission_counts.remove(&r.id).unwrap_or_default();
            RoleSummary {
                role: r,
                group_count,
                permission_count,
            }
        })
        .collect())
}

pub async fn get_role_detail(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<RoleDetail>, GatehouseError> {
    let role = match get_role(db, id).await? {
        Some(r) => r,
        None => return Ok(None),
    };

    let permissions = permissions_for_role(db, id).await?;
    let groups = role
        .find_related(entities::Group)
        .all(db)
        .await?
        .into_iter()
        .map(GroupRef::from)
        .collect();

    Ok(Some(RoleDetail {
        role,
        permissions,
        groups,
    }))
}

pub async fn update_role(
    db: &DatabaseConnection,
    id: i32,
    name: &str,
    description: Option<&str>,
) -> Result<role::Model, GatehouseError> {
    let role = get_role(db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Role not found".to_string()))?;

    let mut active: role::ActiveModel = role.into();
    active.name = Set(name.to_string());
    active.description = Set(description.map(|d| d.to_string()));
    active.updated_at = Set(now());

    active
        .update(db)
        .await
        .map_err(|e| constraint_error("Role name", e))
}

pub async fn delete_role(db: &DatabaseConnection, id: i32) -> Result<(), GatehouseError> {
    let res = entities::Role::delete_by_id(id).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(GatehouseError::NotFound("Role not found".to_string()));
    }
    Ok(())
}

pub async fn missing_role_ids(
    db: &DatabaseConnection,
    ids: &[i32],
) -> Result<Vec<i32>, GatehouseError> {
    let found: HashSet<i32> = entities::Role::find()
        .select_only()
        .column(role::Column::Id)
        .filter(role::Column::Id.is_in(ids.iter().copied()))
        .into_tuple::<i32>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let mut missing: Vec<i32> = ids
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect();
    missing.sort_unstable();
    missing.dedup();
    Ok(missing)
}

// Module management functions

pub async fn create_module(
    db: &DatabaseConnection,
    name: &str,
    description: Option<&str>,
) -> Result<module::Model, GatehouseError> {
    let now = now();
    let module = module::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description.map(|d| d.to_string())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let module = module
        .insert(db)
        .await
        .map_err(|e| constraint_error("Module name", e))?;

    // Every module starts with the full CRUD permission set
    for action in Action::ALL {
        let label = format!(
            "{}_{}",
            action.as_str(),
            module.name.to_lowercase().replace(' ', "_")
        );
        let permission = permission::ActiveModel {
            name: Set(label),
            action: Set(action.as_str().to_string()),
            module_id: Set(module.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        permission
            .insert(db)
            .await
            .map_err(|e| constraint_error("Permission", e))?;
    }

    Ok(module)
}

pub async fn get_module(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<module::Model>, GatehouseError> {
    Ok(entities::Module::find_by_id(id).one(db).await?)
}

pub async fn get_module_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<module::Model>, GatehouseError> {
    Ok(entities::Module::find()
        .filter(module::Column::Name.eq(name))
        .one(db)
        .await?)
}

pub async fn list_modules(db: &DatabaseConnection) -> Result<Vec<ModuleSummary>, GatehouseError> {
    let modules = entities::Module::find()
        .order_by_asc(module::Column::Name)
        .all(db)
        .await?;

    let permissions = entities::Permission::find().all(db).await?;
    let mut counts: HashMap<i32, u64> = HashMap::new();
    for p in permissions {
        *counts.entry(p.module_id).or_default() += 1;
    }

    Ok(modules
        .into_iter()
        .map(|m| {
            let permission_count = counts.remove(&m.id).unwrap_or_default();
            ModuleSummary {
                module: m,
                permission_count,
            }
        })
        .collect())
}

pub async fn get_module_detail(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<ModuleDetail>, GatehouseError> {
    let module = match get_module(db, id).await? {
        Some(m) => m,
        None => return Ok(None),
    };

    let permissions = module
        .find_related(entities::Permission)
        .order_by_asc(permission::Column::Action)
        .all(db)
        .await?;

    Ok(Some(ModuleDetail {
        module,
        permissions,
    }))
}

pub async fn update_module(
    db: &DatabaseConnection,
    id: i32,
    name: &str,
    description: Option<&str>,
) -> Result<module::Model, GatehouseError> {
    let module = get_module(db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Module not found".to_string()))?;

    let mut active: module::ActiveModel = module.into();
    active.name = Set(name.to_string());
    active.description = Set(description.map(|d| d.to_string()));
    active.updated_at = Set(now());

    active
        .update(db)
        .await
        .map_err(|e| constraint_error("Module name", e))
}

pub async fn delete_module(db: &DatabaseConnection, id: i32) -> Result<(), GatehouseError> {
    get_module(db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Module not found".to_string()))?;

    // Deletion order matters: a module's permissions must be ungranted first
    let granted = entities::Grant::find()
        .join(JoinType::InnerJoin, grant::Relation::Permission.def())
        .filter(permission::Column::ModuleId.eq(id))
        .count(db)
        .await?;
    if granted > 0 {
        return Err(GatehouseError::DependencyInUse(
            "Cannot delete module with permissions assigned to roles. Remove permissions from roles first."
                .to_string(),
        ));
    }

    entities::Module::delete_by_id(id).exec(db).await?;
    Ok(())
}

// Permission management functions

fn permission_info_select() -> sea_orm::Select<entities::Permission> {
    entities::Permission::find()
        .select_only()
        .column(permission::Column::Id)
        .column(permission::Column::Name)
        .column(permission::Column::Action)
        .column(permission::Column::ModuleId)
        .column_as(module::Column::Name, "module_name")
        .column(permission::Column::CreatedAt)
        .join(JoinType::InnerJoin, permission::Relation::Module.def())
}

pub async fn create_permission(
    db: &DatabaseConnection,
    name: &str,
    action: Action,
    module_id: i32,
) -> Result<permission::Model, GatehouseError> {
    get_module(db, module_id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Module not found".to_string()))?;

    let now = now();
    let permission = permission::ActiveModel {
        name: Set(name.to_string()),
        action: Set(action.as_str().to_string()),
        module_id: Set(module_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    permission.insert(db).await.map_err(|e| {
        constraint_error("Permission for this module and action", e)
    })
}

pub async fn get_permission(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<permission::Model>, GatehouseError> {
    Ok(entities::Permission::find_by_id(id).one(db).await?)
}

pub async fn list_permissions(
    db: &DatabaseConnection,
) -> Result<Vec<PermissionInfo>, GatehouseError> {
    Ok(permission_info_select()
        .order_by_asc(module::Column::Name)
        .order_by_asc(permission::Column::Action)
        .into_model::<PermissionInfo>()
        .all(db)
        .await?)
}

pub async fn permissions_for_role(
    db: &DatabaseConnection,
    role_id: i32,
) -> Result<Vec<PermissionInfo>, GatehouseError> {
    Ok(permission_info_select()
        .join_rev(JoinType::InnerJoin, grant::Relation::Permission.def())
        .filter(grant::Column::RoleId.eq(role_id))
        .order_by_asc(module::Column::Name)
        .order_by_asc(permission::Column::Action)
        .into_model::<PermissionInfo>()
        .all(db)
        .await?)
}

pub async fn get_permission_detail(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<PermissionDetail>, GatehouseError> {
    let model = match get_permission(db, id).await? {
        Some(p) => p,
        None => return Ok(None),
    };

    let info = permission_info_select()
        .filter(permission::Column::Id.eq(id))
        .into_model::<PermissionInfo>()
        .one(db)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Permission not found".to_string()))?;

    let roles = model
        .find_related(entities::Role)
        .all(db)
        .await?
        .into_iter()
        .map(RoleRef::from)
        .collect();

    Ok(Some(PermissionDetail {
        permission: info,
        roles,
    }))
}

pub async fn update_permission(
    db: &DatabaseConnection,
    id: i32,
    name: &str,
    action: Action,
    module_id: i32,
) -> Result<permission::Model, GatehouseError> {
    let permission = get_permission(db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Permission not found".to_string()))?;

    get_module(db, module_id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Module not found".to_string()))?;

    let mut active: permission::ActiveModel = permission.into();
    active.name = Set(name.to_string());
    active.action = Set(action.as_str().to_string());
    active.module_id = Set(module_id);
    active.updated_at = Set(now());

    active.update(db).await.map_err(|e| {
        constraint_error("Permission for this module and action", e)
    })
}

pub async fn delete_permission(db: &DatabaseConnection, id: i32) -> Result<(), GatehouseError> {
    get_permission(db, id)
        .await?
        .ok_or_else(|| GatehouseError::NotFound("Permission not found".to_string()))?;

    let granted = entities::Grant::find()
        .filter(grant::Column::PermissionId.eq(id))
        .count(db)
        .await?;
    if granted > 0 {
        return Err(GatehouseError::DependencyInUse(
            "Cannot delete permission assigned to roles. Remove from roles first.".to_string(),
        ));
    }

    entities::Permission::delete_by_id(id).exec(db).await?;
    Ok(())
}

pub async fn missing_permission_ids(
    db: &DatabaseConnection,
    ids: &[i32],
) -> Result<Vec<i32>, GatehouseError> {
    let found: HashSet<i32> = entities::Permission::find()
        .select_only()
        .column(permission::Column::Id)
        .filter(permission::Column::Id.is_in(ids.iter().copied()))
        .into_tuple::<i32>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let mut missing: Vec<i32> = ids
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect();
    missing.sort_unstable();
    missing.dedup();
    Ok(missing)
}

pub async fn all_permission_ids(db: &DatabaseConnection) -> Result<Vec<i32>, GatehouseError> {
    Ok(entities::Permission::find()
        .select_only()
        .column(permission::Column::Id)
        .into_tuple::<i32>()
        .all(db)
        .await?)
}

// Relation pair functions
//
// Inserts are idempotent: an already-present pair is absorbed by the unique
// pair constraint and reported as zero rows. Deletes report rows affected so
// callers can distinguish removal of an absent pair.

pub async fn insert_membership<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    group_id: i32,
) -> Result<u64, GatehouseError> {
    let row = membership::ActiveModel {
        user_id: Set(user_id),
        group_id: Set(group_id),
        created_at: Set(now()),
    };

    entities::Membership::insert(row)
        .on_conflict(
            OnConflict::columns([membership::Column::UserId, membership::Column::GroupId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(|e| constraint_error("membership", e))
}

pub async fn delete_membership(
    db: &DatabaseConnection,
    user_id: i32,
    group_id: i32,
) -> Result<u64, GatehouseError> {
    let res = entities::Membership::delete_many()
        .filter(membership::Column::UserId.eq(user_id))
        .filter(membership::Column::GroupId.eq(group_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

pub async fn insert_role_assignment<C: ConnectionTrait>(
    conn: &C,
    group_id: i32,
    role_id: i32,
) -> Result<u64, GatehouseError> {
    let row = role_assignment::ActiveModel {
        group_id: Set(group_id),
        role_id: Set(role_id),
        created_at: Set(now()),
    };

    entities::RoleAssignment::insert(row)
        .on_conflict(
            OnConflict::columns([
                role_assignment::Column::GroupId,
                role_assignment::Column::RoleId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(|e| constraint_error("role assignment", e))
}

pub async fn delete_role_assignment(
    db: &DatabaseConnection,
    group_id: i32,
    role_id: i32,
) -> Result<u64, GatehouseError> {
    let res = entities::RoleAssignment::delete_many()
        .filter(role_assignment::Column::GroupId.eq(group_id))
        .filter(role_assignment::Column::RoleId.eq(role_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

pub async fn insert_grant<C: ConnectionTrait>(
    conn: &C,
    role_id: i32,
    permission_id: i32,
) -> Result<u64, GatehouseError> {
    let row = grant::ActiveModel {
        role_id: Set(role_id),
        permission_id: Set(permission_id),
        created_at: Set(now()),
    };

    entities::Grant::insert(row)
        .on_conflict(
            OnConflict::columns([grant::Column::RoleId, grant::Column::PermissionId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(|e| constraint_error("grant", e))
}

pub async fn delete_grant(
    db: &DatabaseConnection,
    role_id: i32,
    permission_id: i32,
) -> Result<u64, GatehouseError> {
    let res = entities::Grant::delete_many()
        .filter(grant::Column::RoleId.eq(role_id))
        .filter(grant::Column::PermissionId.eq(permission_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

// Session management functions

pub async fn create_session(
    db: &DatabaseConnection,
    user_id: i32,
    ttl_secs: i64,
) -> Result<entities::session::Model, GatehouseError> {
    let session_id = random_id();
    let now = now();

    let session = entities::session::ActiveModel {
        session_id: Set(session_id),
        user_id: Set(user_id),
        created_at: Set(now),
        expires_at: Set(now + ttl_secs),
    };

    Ok(session.insert(db).await?)
}

pub async fn get_session(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<Option<entities::session::Model>, GatehouseError> {
    if let Some(model) = entities::Session::find_by_id(session_id.to_string())
        .one(db)
        .await?
    {
        if now() > model.expires_at {
            return Ok(None);
        }
        Ok(Some(model))
    } else {
        Ok(None)
    }
}

pub async fn delete_session(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<(), GatehouseError> {
    entities::Session::delete_by_id(session_id.to_string())
        .exec(db)
        .await?;
    Ok(())
}

pub async fn cleanup_expired_sessions(db: &DatabaseConnection) -> Result<u64, GatehouseError> {
    let res = entities::Session::delete_many()
        .filter(entities::session::Column::ExpiresAt.lt(now()))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}
