//! Community roles, permissions and contributor profiles
//!
//! Community roles are descriptive groupings ("maintainer", "mentor") kept
//! apart from the platform [`Role`](crate::roles::Role) that access policies
//! check. System roles ship with the platform and cannot be renamed or
//! deleted.

use tracing::{info, instrument};
use uuid::Uuid;

use super::{Services, paths};
use crate::error::{ActionError, ActionResult};
use crate::models::governance::{
    CommunityRole, ContributorProfile, NewCommunityRole, NewPermission, Permission,
    UpdateCommunityRole, UpdateContributorProfile, UserRoleAssignment,
};
use crate::models::platform::NewAuditLog;
use crate::policy::{Policy, authorize, require_actor};
use crate::roles::Actor;

async fn existing_role(services: &Services, id: i32) -> ActionResult<CommunityRole> {
    services
        .store
        .find_role(id)
        .await?
        .ok_or_else(|| ActionError::not_found("Role"))
}

async fn existing_permission(services: &Services, id: i32) -> ActionResult<Permission> {
    services
        .store
        .list_permissions()
        .await?
        .into_iter()
        .find(|permission| permission.id == id)
        .ok_or_else(|| ActionError::not_found("Permission"))
}

pub async fn get_roles(
    services: &Services,
    actor: Option<&Actor>,
) -> ActionResult<Vec<CommunityRole>> {
    authorize(actor, Policy::Public)?;
    Ok(services.store.list_roles().await?)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn create_role(
    services: &Services,
    actor: Option<&Actor>,
    input: NewCommunityRole,
) -> ActionResult<CommunityRole> {
    authorize(actor, Policy::AdminOnly)?;
    input.validate()?;

    let role = services.store.create_role(input).await?;
    info!(role_id = role.id, name = %role.name, "Community role created");

    services.invalidate([paths::ROLES]).await;
    Ok(role)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), role_id = id))]
pub async fn update_role(
    services: &Services,
    actor: Option<&Actor>,
    id: i32,
    patch: UpdateCommunityRole,
) -> ActionResult<CommunityRole> {
    authorize(actor, Policy::AdminOnly)?;
    let current = existing_role(services, id).await?;
    patch.validate()?;
    let renames = patch.name.as_ref().is_some_and(|name| *name != current.name);
    if current.is_system && renames {
        return Err(ActionError::invalid("name", "System roles cannot be renamed"));
    }

    let role = services.store.update_role(id, patch).await?;
    info!(role_id = id, "Community role updated");

    services.invalidate([paths::ROLES]).await;
    Ok(role)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), role_id = id))]
pub async fn delete_role(services: &Services, actor: Option<&Actor>, id: i32) -> ActionResult<()> {
    authorize(actor, Policy::AdminOnly)?;
    let current = existing_role(services, id).await?;
    if current.is_system {
        return Err(ActionError::invalid("id", "System roles cannot be deleted"));
    }

    services.store.delete_role(id).await?;
    info!(role_id = id, name = %current.name, "Community role deleted");

    services.invalidate([paths::ROLES]).await;
    Ok(())
}

pub async fn get_permissions(
    services: &Services,
    actor: Option<&Actor>,
) -> ActionResult<Vec<Permission>> {
    authorize(actor, Policy::Public)?;
    Ok(services.store.list_permissions().await?)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn create_permission(
    services: &Services,
    actor: Option<&Actor>,
    input: NewPermission,
) -> ActionResult<Permission> {
    authorize(actor, Policy::AdminOnly)?;
    input.validate()?;

    let permission = services.store.create_permission(input).await?;
    info!(permission_id = permission.id, code = %permission.code, "Permission created");

    services.invalidate([paths::ROLES]).await;
    Ok(permission)
}

pub async fn get_role_permissions(
    services: &Services,
    actor: Option<&Actor>,
    role_id: i32,
) -> ActionResult<Vec<Permission>> {
    authorize(actor, Policy::Public)?;
    existing_role(services, role_id).await?;
    Ok(services.store.role_permissions(role_id).await?)
}

/// Grant a permission to a role. Granting twice is not an error.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), role_id, permission_id))]
pub async fn grant_permission(
    services: &Services,
    actor: Option<&Actor>,
    role_id: i32,
    permission_id: i32,
) -> ActionResult<()> {
    let actor = require_actor(actor, Policy::AdminOnly)?;
    existing_role(services, role_id).await?;
    let permission = existing_permission(services, permission_id).await?;

    services
        .store
        .grant_permission(role_id, permission_id)
        .await?;
    info!(role_id, code = %permission.code, "Permission granted");

    services
        .audit(
            NewAuditLog::new(Some(actor.id), "permission.grant", "community_role", role_id)
                .with_details(serde_json::json!({ "permission": permission.code })),
        )
        .await;
    services.invalidate([paths::ROLES]).await;
    Ok(())
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), role_id, permission_id))]
pub async fn revoke_permission(
    services: &Services,
    actor: Option<&Actor>,
    role_id: i32,
    permission_id: i32,
) -> ActionResult<()> {
    let actor = require_actor(actor, Policy::AdminOnly)?;
    existing_role(services, role_id).await?;

    if !services
        .store
        .revoke_permission(role_id, permission_id)
        .await?
    {
        return Err(ActionError::not_found("Permission grant"));
    }
    info!(role_id, permission_id, "Permission revoked");

    services
        .audit(
            NewAuditLog::new(Some(actor.id), "permission.revoke", "community_role", role_id)
                .with_details(serde_json::json!({ "permission_id": permission_id })),
        )
        .await;
    services.invalidate([paths::ROLES]).await;
    Ok(())
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), user_id = %user_id, role_id))]
pub async fn assign_role_to_user(
    services: &Services,
    actor: Option<&Actor>,
    user_id: Uuid,
    role_id: i32,
) -> ActionResult<UserRoleAssignment> {
    let actor = require_actor(actor, Policy::AdminOnly)?;
    if services.store.find_user(user_id).await?.is_none() {
        return Err(ActionError::not_found("User"));
    }
    let role = existing_role(services, role_id).await?;

    let assignment = services
        .store
        .assign_user_role(user_id, role_id, actor.id)
        .await?;
    info!(user_id = %user_id, role = %role.name, "Community role assigned");

    services
        .audit(
            NewAuditLog::new(Some(actor.id), "community_role.assign", "user", user_id)
                .with_details(serde_json::json!({ "role": role.name })),
        )
        .await;
    services.invalidate([paths::USERS, paths::ROLES]).await;
    Ok(assignment)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), user_id = %user_id, role_id))]
pub async fn remove_role_from_user(
    services: &Services,
    actor: Option<&Actor>,
    user_id: Uuid,
    role_id: i32,
) -> ActionResult<()> {
    let actor = require_actor(actor, Policy::AdminOnly)?;

    if !services.store.remove_user_role(user_id, role_id).await? {
        return Err(ActionError::not_found("Role assignment"));
    }
    info!(user_id = %user_id, role_id, "Community role removed");

    services
        .audit(
            NewAuditLog::new(Some(actor.id), "community_role.remove", "user", user_id)
                .with_details(serde_json::json!({ "role_id": role_id })),
        )
        .await;
    services.invalidate([paths::USERS, paths::ROLES]).await;
    Ok(())
}

/// A user without a profile yields `None`.
pub async fn get_contributor_profile(
    services: &Services,
    actor: Option<&Actor>,
    user_id: Uuid,
) -> ActionResult<Option<ContributorProfile>> {
    authorize(actor, Policy::Public)?;
    Ok(services.store.find_contributor_profile(user_id).await?)
}

/// Create or patch the actor's own contributor profile.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn update_contributor_profile(
    services: &Services,
    actor: Option<&Actor>,
    patch: UpdateContributorProfile,
) -> ActionResult<ContributorProfile> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    patch.validate()?;

    let profile = services
        .store
        .upsert_contributor_profile(actor.id, patch)
        .await?;
    info!(profile_id = profile.id, "Contributor profile saved");

    services
        .invalidate([
            paths::PROFILE.to_string(),
            paths::under(paths::PROFILE, &actor.id.to_string()),
        ])
        .await;
    Ok(profile)
}
