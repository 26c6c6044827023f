//! Group and membership models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::ServiceError;

/// Role held by a user within a single group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /// Parse a requested role, where an empty value means `member`.
    pub fn from_requested(value: &str) -> Result<Self, ServiceError> {
        if value.is_empty() {
            return Ok(Role::Member);
        }
        value.parse()
    }
}

impl std::str::FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(ServiceError::InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String, created_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// A user's membership in a group, keyed by `(user_id, group_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: Uuid, group_id: Uuid, role: Role, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            group_id,
            role,
            joined_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Request to create a group.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroupInput {
    pub name: String,
}

impl CreateGroupInput {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.name.is_empty() {
            return Err(ServiceError::NameRequired);
        }
        Ok(())
    }
}

/// Request to add a user to a group. An empty role defaults to `member`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddMemberInput {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: String,
}

impl AddMemberInput {
    /// Validate the input and resolve the effective role.
    pub fn validate(&self) -> Result<Role, ServiceError> {
        if self.user_id.is_nil() {
            return Err(ServiceError::UserIdRequired);
        }
        Role::from_requested(&self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_requested("").unwrap(), Role::Member);
        assert_eq!(Role::from_requested("member").unwrap(), Role::Member);
        assert_eq!(Role::from_requested("admin").unwrap(), Role::Admin);
        assert!(matches!(
            Role::from_requested("owner"),
            Err(ServiceError::InvalidRole(role)) if role == "owner"
        ));
        // Roles are stored lowercase; anything else is rejected.
        assert!(Role::from_requested("Admin").is_err());
    }

    #[test]
    fn test_add_member_requires_user() {
        let input = AddMemberInput {
            user_id: Uuid::nil(),
            role: "admin".to_string(),
        };
        assert!(matches!(input.validate(), Err(ServiceError::UserIdRequired)));
    }

    #[test]
    fn test_create_group_requires_name() {
        let input = CreateGroupInput {
            name: String::new(),
        };
        assert!(matches!(input.validate(), Err(ServiceError::NameRequired)));
    }
}
