use gatehouse::entities;
use gatehouse::storage;
use sea_orm::DatabaseConnection;

/// Builder for creating test users
pub struct UserBuilder {
    username: String,
    email: Option<String>,
    password: String,
}

impl UserBuilder {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            email: None,
            password: "password123".to_string(),
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> entities::user::Model {
        let email = self
            .email
            .unwrap_or_else(|| format!("{}@example.com", self.username));
        storage::create_user(db, &self.username, &email, &self.password)
            .await
            .expect("Failed to create test user")
    }
}

/// Builder for creating test groups
pub struct GroupBuilder {
    name: String,
    description: Option<String>,
}

impl GroupBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> entities::group::Model {
        storage::create_group(db, &self.name, self.description.as_deref())
            .await
            .expect("Failed to create test group")
    }
}

/// Builder for creating test roles
pub struct RoleBuilder {
    name: String,
    description: Option<String>,
}

impl RoleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> entities::role::Model {
        storage::create_role(db, &self.name, self.description.as_deref())
            .await
            .expect("Failed to create test role")
    }
}

/// Builder for creating test modules (with their CRUD permission grid)
pub struct ModuleBuilder {
    name: String,
    description: Option<String>,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> entities::module::Model {
        storage::create_module(db, &self.name, self.description.as_deref())
            .await
            .expect("Failed to create test module")
    }
}
