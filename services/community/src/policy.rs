//! Access policies layered on top of the role hierarchy.
//!
//! Each action names the [`Policy`] it runs under and calls [`authorize`]
//! before validating input or touching the store.

use tracing::warn;
use uuid::Uuid;

use crate::error::{ActionError, ActionResult};
use crate::roles::{Actor, Role};

/// Rule attached to an operation on a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// No actor required
    Public,
    /// Any signed-in actor with a recognized role
    Authenticated,
    /// Actor ranks at least `admin`
    AdminOnly,
    /// Actor owns the resource, or ranks at least `admin`
    OwnerOrAdmin { owner_id: Uuid },
}

impl Policy {
    /// Evaluate the policy without producing an error.
    #[must_use]
    pub fn allows(&self, actor: Option<&Actor>) -> bool {
        match (self, actor) {
            (Policy::Public, _) => true,
            (_, None) => false,
            (Policy::Authenticated, Some(actor)) => actor.has_role(Role::User),
            (Policy::AdminOnly, Some(actor)) => actor.has_role(Role::Admin),
            (Policy::OwnerOrAdmin { owner_id }, Some(actor)) => {
                actor.id == *owner_id || actor.has_role(Role::Admin)
            }
        }
    }
}

/// Check `policy` for `actor`, returning the generic unauthorized error on denial.
pub fn authorize(actor: Option<&Actor>, policy: Policy) -> ActionResult<()> {
    if policy.allows(actor) {
        return Ok(());
    }
    warn!(
        actor = ?actor.map(|a| a.id),
        policy = ?policy,
        "Access denied"
    );
    Err(ActionError::Unauthorized)
}

/// Like [`authorize`], but hands back the actor for policies that need one.
pub fn require_actor<'a>(actor: Option<&'a Actor>, policy: Policy) -> ActionResult<&'a Actor> {
    debug_assert!(policy != Policy::Public, "public policy has no actor to return");
    authorize(actor, policy)?;
    actor.ok_or(ActionError::Unauthorized)
}

/// An actor may hand out a platform role only up to their own rank.
pub fn may_grant(actor: &Actor, role: Role) -> bool {
    role.rank() > 0 && actor.has_role(Role::Admin) && role.rank() <= actor.role.rank()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), role)
    }

    #[test]
    fn test_public_allows_anonymous() {
        assert!(authorize(None, Policy::Public).is_ok());
    }

    #[test]
    fn test_non_public_policies_deny_anonymous() {
        let owner_id = Uuid::new_v4();
        for policy in [
            Policy::Authenticated,
            Policy::AdminOnly,
            Policy::OwnerOrAdmin { owner_id },
        ] {
            assert_eq!(authorize(None, policy), Err(ActionError::Unauthorized));
        }
    }

    #[test]
    fn test_authenticated_requires_recognized_role() {
        assert!(authorize(Some(&actor(Role::User)), Policy::Authenticated).is_ok());
        assert!(authorize(Some(&actor(Role::Unrecognized)), Policy::Authenticated).is_err());
    }

    #[test]
    fn test_admin_only() {
        assert!(authorize(Some(&actor(Role::User)), Policy::AdminOnly).is_err());
        assert!(authorize(Some(&actor(Role::Admin)), Policy::AdminOnly).is_ok());
        assert!(authorize(Some(&actor(Role::Superadmin)), Policy::AdminOnly).is_ok());
    }

    #[test]
    fn test_owner_or_admin_matrix() {
        let owner = actor(Role::User);
        let policy = Policy::OwnerOrAdmin { owner_id: owner.id };

        assert!(policy.allows(Some(&owner)));
        assert!(!policy.allows(Some(&actor(Role::User))));
        assert!(policy.allows(Some(&actor(Role::Admin))));
        assert!(policy.allows(Some(&actor(Role::Superadmin))));
    }

    #[test]
    fn test_owner_is_allowed_whatever_the_role() {
        for role in [Role::Unrecognized, Role::User, Role::Admin] {
            let owner = actor(role);
            let policy = Policy::OwnerOrAdmin { owner_id: owner.id };
            assert!(policy.allows(Some(&owner)), "owner with {role} denied");
        }
    }

    #[test]
    fn test_require_actor_returns_the_caller() {
        let admin = actor(Role::Admin);
        let got = require_actor(Some(&admin), Policy::AdminOnly).unwrap();
        assert_eq!(got.id, admin.id);
    }

    #[test]
    fn test_grants_are_capped_at_own_rank() {
        let admin = actor(Role::Admin);
        assert!(may_grant(&admin, Role::User));
        assert!(may_grant(&admin, Role::Admin));
        assert!(!may_grant(&admin, Role::Superadmin));
        assert!(!may_grant(&admin, Role::Unrecognized));
        assert!(may_grant(&actor(Role::Superadmin), Role::Superadmin));
        assert!(!may_grant(&actor(Role::User), Role::User));
    }
}
