//! User administration

use std::str::FromStr;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{Services, paths};
use crate::error::{ActionError, ActionResult};
use crate::models::platform::NewAuditLog;
use crate::models::users::{UpdateUserRoleRequest, User};
use crate::policy::{Policy, authorize, may_grant, require_actor};
use crate::roles::{Actor, Role};

pub async fn get_users(services: &Services, actor: Option<&Actor>) -> ActionResult<Vec<User>> {
    authorize(actor, Policy::AdminOnly)?;
    Ok(services.store.list_users().await?)
}

/// Change a user's platform role.
///
/// The new role must be one of the recognized roles and may not outrank the
/// actor. Users who already outrank the actor cannot be changed by them.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), user_id = %user_id))]
pub async fn update_user_role(
    services: &Services,
    actor: Option<&Actor>,
    user_id: Uuid,
    request: UpdateUserRoleRequest,
) -> ActionResult<User> {
    let actor = require_actor(actor, Policy::AdminOnly)?;
    let role = Role::from_str(request.role.trim())
        .map_err(|e| ActionError::invalid("role", &e.to_string()))?;
    if !may_grant(actor, role) {
        warn!(requested = %role, "Role grant above own rank");
        return Err(ActionError::Unauthorized);
    }

    let target = services
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ActionError::not_found("User"))?;
    if target.role.rank() > actor.role.rank() {
        warn!(current = %target.role, "Target outranks actor");
        return Err(ActionError::Unauthorized);
    }

    let updated = services.store.update_user_role(user_id, role).await?;
    info!(from = %target.role, to = %updated.role, "User role changed");

    services
        .audit(
            NewAuditLog::new(Some(actor.id), "user.role_change", "user", user_id).with_details(
                serde_json::json!({ "from": target.role, "to": updated.role }),
            ),
        )
        .await;
    services
        .invalidate([paths::USERS.to_string(), paths::under(paths::USERS, &user_id.to_string())])
        .await;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::Fixture;
    use crate::store::CommunityStore;

    fn to(role: &str) -> UpdateUserRoleRequest {
        UpdateUserRoleRequest { role: role.into() }
    }

    #[tokio::test]
    async fn test_admin_promotes_user_and_audits() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let member = fx.actor(Role::User).await;

        let updated = update_user_role(&fx.services, Some(&admin), member.id, to("admin"))
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);

        let logs = fx.store.list_audit_logs(10).await.unwrap();
        assert_eq!(logs[0].action, "user.role_change");
        assert_eq!(logs[0].entity_id, member.id.to_string());
        assert!(fx.views.invalidated().contains(&"/admin/users".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_role_is_a_validation_error() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let member = fx.actor(Role::User).await;
        let err = update_user_role(&fx.services, Some(&admin), member.id, to("owner"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(ref fields) if fields[0].field == "role"));
        assert_eq!(fx.side_effects(), (0, 0));
    }

    #[tokio::test]
    async fn test_admin_cannot_mint_superadmin() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let member = fx.actor(Role::User).await;
        let err = update_user_role(&fx.services, Some(&admin), member.id, to("superadmin"))
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::Unauthorized);
        assert_eq!(fx.side_effects(), (0, 0));
    }

    #[tokio::test]
    async fn test_admin_cannot_demote_superadmin() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let superadmin = fx.actor(Role::Superadmin).await;
        let err = update_user_role(&fx.services, Some(&admin), superadmin.id, to("user"))
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::Unauthorized);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let fx = Fixture::new();
        let superadmin = fx.actor(Role::Superadmin).await;
        let err = update_user_role(&fx.services, Some(&superadmin), Uuid::new_v4(), to("user"))
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::not_found("User"));
    }

    #[tokio::test]
    async fn test_listing_users_is_admin_only() {
        let fx = Fixture::new();
        let member = fx.actor(Role::User).await;
        assert_eq!(
            get_users(&fx.services, Some(&member)).await.unwrap_err(),
            ActionError::Unauthorized
        );
        let admin = fx.actor(Role::Admin).await;
        assert_eq!(get_users(&fx.services, Some(&admin)).await.unwrap().len(), 2);
    }
}
