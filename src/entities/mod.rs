pub mod grant;
pub mod group;
pub mod membership;
pub mod module;
pub mod permission;
pub mod role;
pub mod role_assignment;
pub mod session;
pub mod user;

pub use grant::Entity as Grant;
pub use group::Entity as Group;
pub use membership::Entity as Membership;
pub use module::Entity as Module;
pub use permission::Entity as Permission;
pub use role::Entity as Role;
pub use role_assignment::Entity as RoleAssignment;
pub use session::Entity as Session;
pub use user::Entity as User;
