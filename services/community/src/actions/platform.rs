//! System settings, notifications and the audit trail

use tracing::{info, instrument};

use super::{Services, paths};
use crate::error::{ActionError, ActionResult};
use crate::models::platform::{
    AuditLog, MAX_AUDIT_PAGE, NewAuditLog, NewNotification, Notification,
    NotificationPreference, SystemSetting, UpdatePreferenceRequest, UpdateSettingRequest,
};
use crate::policy::{Policy, authorize, require_actor};
use crate::roles::Actor;

/// Look up a setting. An unknown key is not an error.
pub async fn get_system_setting(
    services: &Services,
    actor: Option<&Actor>,
    key: &str,
) -> ActionResult<Option<SystemSetting>> {
    authorize(actor, Policy::Public)?;
    Ok(services.store.find_setting(key).await?)
}

/// Create or replace a setting. Omitting the description keeps the stored one.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), key = %key))]
pub async fn update_system_setting(
    services: &Services,
    actor: Option<&Actor>,
    key: &str,
    update: UpdateSettingRequest,
) -> ActionResult<SystemSetting> {
    let actor = require_actor(actor, Policy::AdminOnly)?;
    update.validate(key)?;

    let setting = services.store.upsert_setting(key, update, actor.id).await?;
    info!(key = %setting.key, "System setting saved");

    services
        .audit(
            NewAuditLog::new(Some(actor.id), "setting.update", "system_setting", key)
                .with_details(serde_json::json!({ "value": setting.value })),
        )
        .await;
    services
        .invalidate([paths::SETTINGS.to_string(), paths::under(paths::SETTINGS, key)])
        .await;
    Ok(setting)
}

pub async fn get_notifications(
    services: &Services,
    actor: Option<&Actor>,
) -> ActionResult<Vec<Notification>> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    Ok(services.store.list_notifications(actor.id).await?)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn create_notification(
    services: &Services,
    actor: Option<&Actor>,
    input: NewNotification,
) -> ActionResult<Notification> {
    authorize(actor, Policy::AdminOnly)?;
    input.validate()?;

    let notification = services.store.create_notification(input).await?;
    info!(
        notification_id = notification.id,
        recipient = %notification.user_id,
        kind = %notification.kind,
        "Notification created"
    );

    services.invalidate([paths::NOTIFICATIONS]).await;
    Ok(notification)
}

/// Mark one of the actor's notifications read. Marking it again succeeds
/// and leaves it read.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), notification_id = id))]
pub async fn mark_notification_as_read(
    services: &Services,
    actor: Option<&Actor>,
    id: i32,
) -> ActionResult<()> {
    let actor = require_actor(actor, Policy::Authenticated)?;

    if !services.store.mark_notification_read(id, actor.id).await? {
        return Err(ActionError::not_found("Notification"));
    }

    services.invalidate([paths::NOTIFICATIONS]).await;
    Ok(())
}

/// Returns how many notifications changed state.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn mark_all_notifications_as_read(
    services: &Services,
    actor: Option<&Actor>,
) -> ActionResult<u64> {
    let actor = require_actor(actor, Policy::Authenticated)?;

    let marked = services.store.mark_all_notifications_read(actor.id).await?;
    info!(marked, "Notifications marked read");

    services.invalidate([paths::NOTIFICATIONS]).await;
    Ok(marked)
}

pub async fn get_notification_preferences(
    services: &Services,
    actor: Option<&Actor>,
) -> ActionResult<Vec<NotificationPreference>> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    Ok(services.store.list_preferences(actor.id).await?)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn update_notification_preference(
    services: &Services,
    actor: Option<&Actor>,
    request: UpdatePreferenceRequest,
) -> ActionResult<NotificationPreference> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    request.validate()?;

    let preference = services.store.upsert_preference(actor.id, request).await?;
    info!(
        channel = ?preference.channel,
        category = %preference.category,
        enabled = preference.enabled,
        "Notification preference saved"
    );

    services.invalidate([paths::NOTIFICATIONS]).await;
    Ok(preference)
}

/// Record an audit entry on behalf of `actor`. Never fails the caller.
pub async fn log_audit_action(
    services: &Services,
    actor: Option<&Actor>,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    details: Option<serde_json::Value>,
) {
    let mut entry = NewAuditLog::new(actor.map(|a| a.id), action, entity_type, entity_id);
    entry.details = details;
    services.audit(entry).await;
}

/// Newest entries first; `limit` is clamped to `1..=MAX_AUDIT_PAGE`.
pub async fn get_audit_logs(
    services: &Services,
    actor: Option<&Actor>,
    limit: i64,
) -> ActionResult<Vec<AuditLog>> {
    authorize(actor, Policy::AdminOnly)?;
    Ok(services
        .store
        .list_audit_logs(limit.clamp(1, MAX_AUDIT_PAGE))
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::Fixture;
    use crate::models::platform::NotificationChannel;
    use crate::roles::Role;
    use serde_json::json;

    fn notice(user: &Actor) -> NewNotification {
        NewNotification {
            user_id: user.id,
            title: "Welcome".into(),
            message: "Thanks for joining".into(),
            kind: "system".into(),
            link: None,
        }
    }

    #[tokio::test]
    async fn test_mark_as_read_is_idempotent() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let member = fx.actor(Role::User).await;
        let created = create_notification(&fx.services, Some(&admin), notice(&member))
            .await
            .unwrap();

        mark_notification_as_read(&fx.services, Some(&member), created.id)
            .await
            .unwrap();
        mark_notification_as_read(&fx.services, Some(&member), created.id)
            .await
            .unwrap();

        let listed = get_notifications(&fx.services, Some(&member)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].read);
    }

    #[tokio::test]
    async fn test_cannot_mark_someone_elses_notification() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let owner = fx.actor(Role::User).await;
        let other = fx.actor(Role::User).await;
        let created = create_notification(&fx.services, Some(&admin), notice(&owner))
            .await
            .unwrap();

        let err = mark_notification_as_read(&fx.services, Some(&other), created.id)
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::not_found("Notification"));
        let listed = get_notifications(&fx.services, Some(&owner)).await.unwrap();
        assert!(!listed[0].read);
    }

    #[tokio::test]
    async fn test_mark_all_counts_only_unread() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let member = fx.actor(Role::User).await;
        for _ in 0..3 {
            create_notification(&fx.services, Some(&admin), notice(&member))
                .await
                .unwrap();
        }
        assert_eq!(
            mark_all_notifications_as_read(&fx.services, Some(&member))
                .await
                .unwrap(),
            3
        );
        assert_eq!(
            mark_all_notifications_as_read(&fx.services, Some(&member))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_anonymous_notification_access_is_denied() {
        let fx = Fixture::new();
        assert_eq!(
            get_notifications(&fx.services, None).await.unwrap_err(),
            ActionError::Unauthorized
        );
        assert_eq!(
            mark_notification_as_read(&fx.services, None, 1)
                .await
                .unwrap_err(),
            ActionError::Unauthorized
        );
        assert_eq!(fx.side_effects(), (0, 0));
    }

    #[tokio::test]
    async fn test_settings_upsert_keeps_description_and_audits() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        assert!(
            get_system_setting(&fx.services, None, "site_name")
                .await
                .unwrap()
                .is_none()
        );

        update_system_setting(
            &fx.services,
            Some(&admin),
            "site_name",
            UpdateSettingRequest {
                value: json!("Community"),
                description: Some("Shown in the header".into()),
            },
        )
        .await
        .unwrap();
        let saved = update_system_setting(
            &fx.services,
            Some(&admin),
            "site_name",
            UpdateSettingRequest {
                value: json!("Rust Community"),
                description: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(saved.value, json!("Rust Community"));
        assert_eq!(saved.description.as_deref(), Some("Shown in the header"));
        assert_eq!(saved.updated_by, Some(admin.id));

        let fetched = get_system_setting(&fx.services, None, "site_name")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, saved.id);

        let logs = get_audit_logs(&fx.services, Some(&admin), 0).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "setting.update");
    }

    #[tokio::test]
    async fn test_users_cannot_change_settings() {
        let fx = Fixture::new();
        let user = fx.actor(Role::User).await;
        let err = update_system_setting(
            &fx.services,
            Some(&user),
            "site_name",
            UpdateSettingRequest {
                value: json!("Mine"),
                description: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err, ActionError::Unauthorized);
        assert_eq!(fx.side_effects(), (0, 0));
    }

    #[tokio::test]
    async fn test_preference_upsert_replaces_flag() {
        let fx = Fixture::new();
        let member = fx.actor(Role::User).await;
        let request = |enabled| UpdatePreferenceRequest {
            channel: NotificationChannel::Email,
            category: "events".into(),
            enabled,
        };
        update_notification_preference(&fx.services, Some(&member), request(true))
            .await
            .unwrap();
        update_notification_preference(&fx.services, Some(&member), request(false))
            .await
            .unwrap();

        let preferences = get_notification_preferences(&fx.services, Some(&member))
            .await
            .unwrap();
        assert_eq!(preferences.len(), 1);
        assert!(!preferences[0].enabled);
    }

    #[tokio::test]
    async fn test_audit_logging_is_fire_and_forget() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        log_audit_action(
            &fx.services,
            Some(&admin),
            "export.run",
            "report",
            "monthly",
            Some(json!({ "rows": 12 })),
        )
        .await;
        log_audit_action(&fx.services, None, "login.failed", "user", "unknown", None).await;

        let logs = get_audit_logs(&fx.services, Some(&admin), 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, "login.failed");
        assert_eq!(logs[1].details, Some(json!({ "rows": 12 })));

        assert_eq!(
            get_audit_logs(&fx.services, None, 10).await.unwrap_err(),
            ActionError::Unauthorized
        );
    }
}
