//! Caller identity resolved once per request

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MemorialError, Result};

/// Role attached to an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May change media, biography and comments
    Admin,
    /// Read-only access
    Visitor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Visitor => "visitor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MemorialError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "visitor" => Ok(Role::Visitor),
            other => Err(MemorialError::Validation(format!("unknown role: {}", other))),
        }
    }
}

/// Who is making a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub role: Role,
}

impl Identity {
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role,
        }
    }

    pub fn admin(subject: impl Into<String>) -> Self {
        Self::new(subject, Role::Admin)
    }

    pub fn visitor(subject: impl Into<String>) -> Self {
        Self::new(subject, Role::Visitor)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Gate for every operation that mutates the profile
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(MemorialError::Forbidden(format!(
                "{} is not allowed to modify this profile",
                self.subject
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin() {
        assert!(Identity::admin("kora").require_admin().is_ok());

        let err = Identity::visitor("guest").require_admin().unwrap_err();
        assert!(matches!(err, MemorialError::Forbidden(_)));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Visitor".parse::<Role>().unwrap(), Role::Visitor);
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
