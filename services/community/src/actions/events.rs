//! Event actions: administration, listings and registrations

use tracing::{info, instrument};

use super::{Services, paths};
use crate::error::{ActionError, ActionResult};
use crate::models::events::{
    CommunityEvent, EventDetail, NewEvent, RegistrationOutcome, UpdateEvent,
};
use crate::policy::{Policy, authorize, require_actor};
use crate::roles::{Actor, Role};

async fn existing_event(services: &Services, id: i32) -> ActionResult<CommunityEvent> {
    services
        .store
        .find_event(id)
        .await?
        .ok_or_else(|| ActionError::not_found("Event"))
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn create_event(
    services: &Services,
    actor: Option<&Actor>,
    input: NewEvent,
) -> ActionResult<CommunityEvent> {
    let actor = require_actor(actor, Policy::AdminOnly)?;
    input.validate()?;

    let event = services.store.create_event(actor.id, input).await?;
    info!(event_id = event.id, slug = %event.slug, "Event created");

    services
        .invalidate([
            paths::EVENTS.to_string(),
            paths::under(paths::EVENTS, &event.slug),
        ])
        .await;
    Ok(event)
}

/// Published events are public; the full list is for administrators.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), published_only))]
pub async fn get_events(
    services: &Services,
    actor: Option<&Actor>,
    published_only: bool,
) -> ActionResult<Vec<CommunityEvent>> {
    let policy = if published_only {
        Policy::Public
    } else {
        Policy::AdminOnly
    };
    authorize(actor, policy)?;
    Ok(services.store.list_events(published_only).await?)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), slug = %slug))]
pub async fn get_event_by_slug(
    services: &Services,
    actor: Option<&Actor>,
    slug: &str,
) -> ActionResult<EventDetail> {
    authorize(actor, Policy::Public)?;
    let is_admin = actor.is_some_and(|a| a.has_role(Role::Admin));
    match services.store.find_event_by_slug(slug).await? {
        Some(detail) if detail.event.published || is_admin => Ok(detail),
        _ => Err(ActionError::not_found("Event")),
    }
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), event_id = id))]
pub async fn update_event(
    services: &Services,
    actor: Option<&Actor>,
    id: i32,
    patch: UpdateEvent,
) -> ActionResult<CommunityEvent> {
    authorize(actor, Policy::AdminOnly)?;
    let current = existing_event(services, id).await?;
    patch.validate(&current)?;

    let event = services.store.update_event(id, patch).await?;
    info!(event_id = id, "Event updated");

    services
        .invalidate(paths::renamed(paths::EVENTS, &current.slug, &event.slug))
        .await;
    Ok(event)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), event_id = id))]
pub async fn delete_event(services: &Services, actor: Option<&Actor>, id: i32) -> ActionResult<()> {
    authorize(actor, Policy::AdminOnly)?;
    let current = existing_event(services, id).await?;

    services.store.delete_event(id).await?;
    info!(event_id = id, "Event deleted");

    services
        .invalidate([
            paths::EVENTS.to_string(),
            paths::under(paths::EVENTS, &current.slug),
        ])
        .await;
    Ok(())
}

/// Register the actor, or reinstate a cancelled registration.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), event_id))]
pub async fn register_for_event(
    services: &Services,
    actor: Option<&Actor>,
    event_id: i32,
) -> ActionResult<RegistrationOutcome> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    let event = existing_event(services, event_id).await?;
    if !event.published {
        return Err(ActionError::not_found("Event"));
    }
    if event.cancelled {
        return Err(ActionError::Conflict("Event has been cancelled".to_string()));
    }

    let outcome = services
        .store
        .register_for_event(event_id, actor.id)
        .await?;
    if outcome == RegistrationOutcome::AlreadyRegistered {
        return Err(ActionError::Conflict("Already registered".to_string()));
    }
    info!(event_id, outcome = ?outcome, "Event registration recorded");

    services
        .invalidate([paths::under(paths::EVENTS, &event.slug)])
        .await;
    Ok(outcome)
}

/// Cancel the actor's registration. Cancelling twice is not an error.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), event_id))]
pub async fn cancel_registration(
    services: &Services,
    actor: Option<&Actor>,
    event_id: i32,
) -> ActionResult<()> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    let event = existing_event(services, event_id).await?;

    if services
        .store
        .cancel_registration(event_id, actor.id)
        .await?
    {
        info!(event_id, "Event registration cancelled");
        services
            .invalidate([paths::under(paths::EVENTS, &event.slug)])
            .await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::Fixture;
    use crate::models::events::LocationType;
    use chrono::{Duration, Utc};

    fn meetup(slug: &str, published: bool) -> NewEvent {
        let start = Utc::now() + Duration::days(7);
        NewEvent {
            title: "Rust meetup".into(),
            description: "Talks and pizza".into(),
            slug: slug.into(),
            date: start,
            capacity: Some(40),
            registration_required: true,
            start_at: start,
            end_at: start + Duration::hours(3),
            timezone: "Europe/Berlin".into(),
            visibility: Default::default(),
            cover_image_url: None,
            published,
            location: "Community hall".into(),
            location_type: LocationType::InPerson,
            flagship: false,
        }
    }

    #[tokio::test]
    async fn test_only_admins_create_events() {
        let fx = Fixture::new();
        let user = fx.actor(Role::User).await;
        let err = create_event(&fx.services, Some(&user), meetup("m", true))
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::Unauthorized);
        assert_eq!(fx.side_effects(), (0, 0));

        let superadmin = fx.actor(Role::Superadmin).await;
        let event = create_event(&fx.services, Some(&superadmin), meetup("m", true))
            .await
            .unwrap();
        assert_eq!(event.created_by, superadmin.id);
        assert_eq!(
            fx.views.invalidated(),
            vec!["/events".to_string(), "/events/m".to_string()]
        );
    }

    #[tokio::test]
    async fn test_end_before_start_is_rejected() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let mut input = meetup("backwards", true);
        input.end_at = input.start_at - Duration::hours(1);
        let err = create_event(&fx.services, Some(&admin), input)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
        assert_eq!(fx.store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_unpublished_events_are_hidden_from_public() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        create_event(&fx.services, Some(&admin), meetup("draft", false))
            .await
            .unwrap();

        assert!(get_events(&fx.services, None, true).await.unwrap().is_empty());
        assert_eq!(
            get_events(&fx.services, None, false).await.unwrap_err(),
            ActionError::Unauthorized
        );
        assert_eq!(
            get_event_by_slug(&fx.services, None, "draft")
                .await
                .unwrap_err(),
            ActionError::not_found("Event")
        );
        assert!(
            get_event_by_slug(&fx.services, Some(&admin), "draft")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_registration_lifecycle() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let member = fx.actor(Role::User).await;
        let event = create_event(&fx.services, Some(&admin), meetup("lifecycle", true))
            .await
            .unwrap();

        let first = register_for_event(&fx.services, Some(&member), event.id)
            .await
            .unwrap();
        assert_eq!(first, RegistrationOutcome::Registered);

        let again = register_for_event(&fx.services, Some(&member), event.id).await;
        assert_eq!(
            again.unwrap_err(),
            ActionError::Conflict("Already registered".into())
        );

        cancel_registration(&fx.services, Some(&member), event.id)
            .await
            .unwrap();
        cancel_registration(&fx.services, Some(&member), event.id)
            .await
            .unwrap();

        let back = register_for_event(&fx.services, Some(&member), event.id)
            .await
            .unwrap();
        assert_eq!(back, RegistrationOutcome::Reinstated);
    }

    #[tokio::test]
    async fn test_cannot_register_for_cancelled_event() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let member = fx.actor(Role::User).await;
        let event = create_event(&fx.services, Some(&admin), meetup("off", true))
            .await
            .unwrap();
        let patch = UpdateEvent {
            cancelled: Some(true),
            ..Default::default()
        };
        update_event(&fx.services, Some(&admin), event.id, patch)
            .await
            .unwrap();

        let err = register_for_event(&fx.services, Some(&member), event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_anonymous_registration_is_denied() {
        let fx = Fixture::new();
        let err = register_for_event(&fx.services, None, 1).await.unwrap_err();
        assert_eq!(err, ActionError::Unauthorized);
    }
}
