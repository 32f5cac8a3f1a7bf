//! Shared helpers for in-crate unit tests.

use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use tempfile::NamedTempFile;

/// Test database helper that keeps its temp file alive
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    pub async fn new() -> Self {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

/// Find the id of one of a module's auto-created permissions by action
pub async fn permission_id(db: &DatabaseConnection, module_id: i32, action: &str) -> i32 {
    let detail = crate::storage::get_module_detail(db, module_id)
        .await
        .expect("Failed to load module")
        .expect("Module not found");

    detail
        .permissions
        .iter()
        .find(|p| p.action == action)
        .unwrap_or_else(|| panic!("Module has no `{action}` permission"))
        .id
}
