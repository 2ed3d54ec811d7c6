use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account: records expenses against its own balance
    User,
    /// Administrator: manages accounts and categories
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Can this role record expenses and add funds against its own balance?
    pub fn can_spend(&self) -> bool {
        matches!(self, Role::User)
    }

    /// Can this role create, rename and delete categories?
    pub fn can_manage_categories(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Can this role list, promote and delete accounts?
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An account. The balance is only ever mutated through ledger adjustments
/// applied by the repository; `password_hash` is opaque credential material
/// produced and verified by the external authentication layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub balance_cents: Cents,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new account. Registration always starts at the user role
    /// with an empty balance.
    pub fn new(username: String, password_hash: String, full_name: String, email: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            full_name,
            email,
            role: Role::User,
            balance_cents: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::User, Role::Admin] {
            let s = role.as_str();
            let parsed = Role::from_str(s).unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_capabilities_split_by_role() {
        assert!(Role::User.can_spend());
        assert!(!Role::User.can_manage_categories());
        assert!(!Role::User.can_manage_users());

        assert!(!Role::Admin.can_spend());
        assert!(Role::Admin.can_manage_categories());
        assert!(Role::Admin.can_manage_users());
    }

    #[test]
    fn test_new_account_defaults() {
        let user = User::new(
            "alice".into(),
            "$2b$fake-hash".into(),
            "Alice Example".into(),
            "alice@example.com".into(),
        );
        assert_eq!(user.role, Role::User);
        assert_eq!(user.balance_cents, 0);
        assert!(!user.is_admin());
    }
}
