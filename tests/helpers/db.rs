use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        // Connect to database
        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        // Run migrations
        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

/// Find the id of one of a module's auto-created permissions by action
pub async fn permission_id(db: &DatabaseConnection, module_id: i32, action: &str) -> i32 {
    let detail = gatehouse::storage::get_module_detail(db, module_id)
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
