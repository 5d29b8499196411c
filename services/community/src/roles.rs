//! Platform roles and the rank comparison every access check is built on.
//!
//! Roles form a fixed total order `user < admin < superadmin`. Anything the
//! store hands back that is not one of those three strings becomes
//! [`Role::Unrecognized`], which ranks below `user` and fails every check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Platform-wide role attached to every user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Superadmin,
    /// A stored value outside the known hierarchy.
    #[serde(other)]
    Unrecognized,
}

impl Role {
    /// Integer rank of the role; `0` for unrecognized values.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::User => 1,
            Self::Admin => 2,
            Self::Superadmin => 3,
            Self::Unrecognized => 0,
        }
    }

    /// Lenient parse used when reading stored values.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        value.parse().unwrap_or(Self::Unrecognized)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// The three assignable roles, lowest first.
    #[must_use]
    pub const fn assignable() -> &'static [Self] {
        &[Self::User, Self::Admin, Self::Superadmin]
    }
}

/// Error returned by the strict [`FromStr`] parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller an action runs on behalf of.
///
/// Actions receive `Option<&Actor>`; `None` is an anonymous caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Shorthand for `evaluate_role(self.role, minimum)`.
    #[must_use]
    pub fn has_role(&self, minimum: Role) -> bool {
        evaluate_role(self.role, minimum)
    }
}

/// True iff `role` ranks at least as high as `minimum`.
///
/// An unrecognized `role` is denied even when `minimum` is itself
/// unrecognized.
#[must_use]
pub fn evaluate_role(role: Role, minimum: Role) -> bool {
    let have = role.rank();
    have > 0 && have >= minimum.rank()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Role; 4] = [Role::Unrecognized, Role::User, Role::Admin, Role::Superadmin];

    #[test]
    fn test_ranks_are_fixed() {
        assert_eq!(Role::User.rank(), 1);
        assert_eq!(Role::Admin.rank(), 2);
        assert_eq!(Role::Superadmin.rank(), 3);
        assert_eq!(Role::Unrecognized.rank(), 0);
    }

    #[test]
    fn test_lower_roles_never_satisfy_higher_minimums() {
        for lower in Role::assignable() {
            for higher in Role::assignable() {
                if lower.rank() < higher.rank() {
                    assert!(!evaluate_role(*lower, *higher), "{lower} passed {higher}");
                }
            }
        }
    }

    #[test]
    fn test_each_role_satisfies_itself_and_below() {
        for role in Role::assignable() {
            assert!(evaluate_role(*role, *role));
            assert!(evaluate_role(*role, Role::User));
        }
        assert!(evaluate_role(Role::Superadmin, Role::Admin));
    }

    #[test]
    fn test_unrecognized_role_fails_everything() {
        for minimum in ALL {
            assert!(!evaluate_role(Role::Unrecognized, minimum));
        }
    }

    #[test]
    fn test_parse_is_lenient_and_from_str_is_strict() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("Admin"), Role::Unrecognized);
        assert_eq!(Role::parse("root"), Role::Unrecognized);
        assert_eq!("superadmin".parse::<Role>(), Ok(Role::Superadmin));
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_and_absorbs_unknowns() {
        assert_eq!(serde_json::to_string(&Role::Superadmin).unwrap(), "\"superadmin\"");
        let parsed: Role = serde_json::from_str("\"editor\"").unwrap();
        assert_eq!(parsed, Role::Unrecognized);
    }
}
