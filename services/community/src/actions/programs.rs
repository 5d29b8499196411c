//! Program and project actions

use tracing::{info, instrument};
use uuid::Uuid;

use super::{Services, paths};
use crate::error::{ActionError, ActionResult};
use crate::models::programs::{
    DEFAULT_MEMBER_ROLE, JoinProjectRequest, NewProgram, NewProject, Program, ProgramLead,
    ProgramStatusChange, Project, ProjectMember, UpdateProgram, UpdateProject,
};
use crate::policy::{Policy, authorize, require_actor};
use crate::roles::Actor;
use crate::validation::Validator;

async fn existing_program(services: &Services, id: i32) -> ActionResult<Program> {
    services
        .store
        .find_program(id)
        .await?
        .ok_or_else(|| ActionError::not_found("Program"))
}

async fn existing_project(services: &Services, id: i32) -> ActionResult<Project> {
    services
        .store
        .find_project(id)
        .await?
        .ok_or_else(|| ActionError::not_found("Project"))
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn create_program(
    services: &Services,
    actor: Option<&Actor>,
    input: NewProgram,
) -> ActionResult<Program> {
    authorize(actor, Policy::AdminOnly)?;
    input.validate()?;

    let program = services.store.create_program(input).await?;
    info!(program_id = program.id, slug = %program.slug, "Program created");

    services.invalidate([paths::PROGRAMS]).await;
    Ok(program)
}

pub async fn get_programs(services: &Services, actor: Option<&Actor>) -> ActionResult<Vec<Program>> {
    authorize(actor, Policy::Public)?;
    Ok(services.store.list_programs().await?)
}

pub async fn get_program_by_slug(
    services: &Services,
    actor: Option<&Actor>,
    slug: &str,
) -> ActionResult<Program> {
    authorize(actor, Policy::Public)?;
    services
        .store
        .find_program_by_slug(slug)
        .await?
        .ok_or_else(|| ActionError::not_found("Program"))
}

/// Update a program. A status change is recorded in the program's history
/// together with the patch.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), program_id = id))]
pub async fn update_program(
    services: &Services,
    actor: Option<&Actor>,
    id: i32,
    patch: UpdateProgram,
) -> ActionResult<Program> {
    let actor = require_actor(actor, Policy::AdminOnly)?;
    let current = existing_program(services, id).await?;
    patch.validate(&current)?;
    let status_change = patch.status_change(&current);

    let program = services.store.update_program(id, patch, actor.id).await?;
    info!(program_id = id, status_change = ?status_change, "Program updated");

    services
        .invalidate(paths::renamed(paths::PROGRAMS, &current.slug, &program.slug))
        .await;
    Ok(program)
}

/// Delete a program together with its projects.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), program_id = id))]
pub async fn delete_program(services: &Services, actor: Option<&Actor>, id: i32) -> ActionResult<()> {
    authorize(actor, Policy::AdminOnly)?;
    let current = existing_program(services, id).await?;

    services.store.delete_program(id).await?;
    info!(program_id = id, "Program deleted");

    services
        .invalidate([
            paths::PROGRAMS.to_string(),
            paths::under(paths::PROGRAMS, &current.slug),
            paths::PROJECTS.to_string(),
        ])
        .await;
    Ok(())
}

pub async fn get_program_status_history(
    services: &Services,
    actor: Option<&Actor>,
    program_id: i32,
) -> ActionResult<Vec<ProgramStatusChange>> {
    authorize(actor, Policy::AdminOnly)?;
    existing_program(services, program_id).await?;
    Ok(services.store.program_status_history(program_id).await?)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), program_id, user_id = %user_id))]
pub async fn add_program_lead(
    services: &Services,
    actor: Option<&Actor>,
    program_id: i32,
    user_id: Uuid,
) -> ActionResult<ProgramLead> {
    authorize(actor, Policy::AdminOnly)?;
    let program = existing_program(services, program_id).await?;

    let lead = services.store.add_program_lead(program_id, user_id).await?;
    info!(program_id, user_id = %user_id, "Program lead assigned");

    services
        .invalidate([paths::under(paths::PROGRAMS, &program.slug)])
        .await;
    Ok(lead)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), program_id, user_id = %user_id))]
pub async fn remove_program_lead(
    services: &Services,
    actor: Option<&Actor>,
    program_id: i32,
    user_id: Uuid,
) -> ActionResult<()> {
    authorize(actor, Policy::AdminOnly)?;
    let program = existing_program(services, program_id).await?;

    if !services
        .store
        .remove_program_lead(program_id, user_id)
        .await?
    {
        return Err(ActionError::not_found("Program lead"));
    }
    info!(program_id, user_id = %user_id, "Program lead removed");

    services
        .invalidate([paths::under(paths::PROGRAMS, &program.slug)])
        .await;
    Ok(())
}

/// Any member may propose a project; maintenance is left to administrators.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn create_project(
    services: &Services,
    actor: Option<&Actor>,
    input: NewProject,
) -> ActionResult<Project> {
    authorize(actor, Policy::Authenticated)?;
    input.validate()?;
    if let Some(program_id) = input.program_id {
        existing_program(services, program_id).await?;
    }

    let project = services.store.create_project(input).await?;
    info!(project_id = project.id, slug = %project.slug, "Project created");

    services.invalidate([paths::PROJECTS]).await;
    Ok(project)
}

pub async fn get_projects(
    services: &Services,
    actor: Option<&Actor>,
    program_id: Option<i32>,
) -> ActionResult<Vec<Project>> {
    authorize(actor, Policy::Public)?;
    Ok(services.store.list_projects(program_id).await?)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), project_id = id))]
pub async fn update_project(
    services: &Services,
    actor: Option<&Actor>,
    id: i32,
    patch: UpdateProject,
) -> ActionResult<Project> {
    authorize(actor, Policy::AdminOnly)?;
    let current = existing_project(services, id).await?;
    patch.validate()?;
    if let Some(program_id) = patch.program_id {
        existing_program(services, program_id).await?;
    }

    let project = services.store.update_project(id, patch).await?;
    info!(project_id = id, "Project updated");

    services
        .invalidate(paths::renamed(paths::PROJECTS, &current.slug, &project.slug))
        .await;
    Ok(project)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), project_id = id))]
pub async fn delete_project(services: &Services, actor: Option<&Actor>, id: i32) -> ActionResult<()> {
    authorize(actor, Policy::AdminOnly)?;
    let current = existing_project(services, id).await?;

    services.store.delete_project(id).await?;
    info!(project_id = id, "Project deleted");

    services
        .invalidate([
            paths::PROJECTS.to_string(),
            paths::under(paths::PROJECTS, &current.slug),
        ])
        .await;
    Ok(())
}

/// Join a project. Joining again returns the existing membership.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), project_id))]
pub async fn join_project(
    services: &Services,
    actor: Option<&Actor>,
    project_id: i32,
    request: JoinProjectRequest,
) -> ActionResult<ProjectMember> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    let role = request.role.as_deref().unwrap_or(DEFAULT_MEMBER_ROLE);
    Validator::new().required("role", role, 50).finish()?;
    let project = existing_project(services, project_id).await?;

    let member = services
        .store
        .join_project(project_id, actor.id, role)
        .await?;
    info!(project_id, role = %member.role, "Joined project");

    services
        .invalidate([paths::under(paths::PROJECTS, &project.slug)])
        .await;
    Ok(member)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), project_id))]
pub async fn leave_project(
    services: &Services,
    actor: Option<&Actor>,
    project_id: i32,
) -> ActionResult<()> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    let project = existing_project(services, project_id).await?;

    if services.store.leave_project(project_id, actor.id).await? {
        info!(project_id, "Left project");
        services
            .invalidate([paths::under(paths::PROJECTS, &project.slug)])
            .await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::Fixture;
    use crate::models::programs::ProgramStatus;
    use crate::roles::Role;

    fn program(slug: &str) -> NewProgram {
        NewProgram {
            title: format!("Program {slug}"),
            slug: slug.into(),
            description: "Mentoring for new contributors".into(),
            status: ProgramStatus::Active,
            start_date: None,
            end_date: None,
        }
    }

    fn project(slug: &str, program_id: Option<i32>) -> NewProject {
        NewProject {
            program_id,
            title: format!("Project {slug}"),
            slug: slug.into(),
            description: "A small tool".into(),
            repository_url: Some("https://example.com/repo".into()),
            status: ProgramStatus::Draft,
        }
    }

    #[tokio::test]
    async fn test_admin_deletes_program_seven() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        for n in 1..=7 {
            let created = create_program(&fx.services, Some(&admin), program(&format!("p{n}")))
                .await
                .unwrap();
            // Rows in other tables must not advance the program sequence.
            create_project(
                &fx.services,
                Some(&admin),
                project(&format!("tool-{n}"), Some(created.id)),
            )
            .await
            .unwrap();
        }
        let target = get_programs(&fx.services, None)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.id == 7)
            .unwrap();
        assert_eq!(target.slug, "p7");

        delete_program(&fx.services, Some(&admin), 7).await.unwrap();

        let remaining = get_programs(&fx.services, None).await.unwrap();
        assert_eq!(remaining.len(), 6);
        assert!(remaining.iter().all(|p| p.id != 7));
        assert!(
            fx.views
                .invalidated()
                .contains(&format!("/programs/{}", target.slug))
        );
        assert!(fx.views.invalidated().contains(&"/projects".to_string()));
    }

    #[tokio::test]
    async fn test_user_cannot_delete_program() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let user = fx.actor(Role::User).await;
        let created = create_program(&fx.services, Some(&admin), program("keep"))
            .await
            .unwrap();
        let before = fx.side_effects();

        let err = delete_program(&fx.services, Some(&user), created.id)
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::Unauthorized);
        assert_eq!(fx.side_effects(), before);
    }

    #[tokio::test]
    async fn test_deleting_missing_program_is_not_found() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let err = delete_program(&fx.services, Some(&admin), 99)
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::not_found("Program"));
        assert_eq!(fx.side_effects(), (0, 0));
    }

    #[tokio::test]
    async fn test_status_change_is_recorded_with_actor() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let created = create_program(&fx.services, Some(&admin), program("history"))
            .await
            .unwrap();

        let patch = UpdateProgram {
            status: Some(ProgramStatus::OnHold),
            status_reason: Some("Waiting on funding".into()),
            ..Default::default()
        };
        update_program(&fx.services, Some(&admin), created.id, patch)
            .await
            .unwrap();
        let retitle = UpdateProgram {
            title: Some("Renamed".into()),
            ..Default::default()
        };
        update_program(&fx.services, Some(&admin), created.id, retitle)
            .await
            .unwrap();

        let history = get_program_status_history(&fx.services, Some(&admin), created.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ProgramStatus::OnHold);
        assert_eq!(history[0].changed_by, Some(admin.id));
    }

    #[tokio::test]
    async fn test_members_create_and_join_projects() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let member = fx.actor(Role::User).await;
        let parent = create_program(&fx.services, Some(&admin), program("parent"))
            .await
            .unwrap();
        let created = create_project(&fx.services, Some(&member), project("tool", Some(parent.id)))
            .await
            .unwrap();

        let joined = join_project(&fx.services, Some(&member), created.id, Default::default())
            .await
            .unwrap();
        assert_eq!(joined.role, DEFAULT_MEMBER_ROLE);
        let again = join_project(
            &fx.services,
            Some(&member),
            created.id,
            JoinProjectRequest {
                role: Some("maintainer".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(again.role, DEFAULT_MEMBER_ROLE);
        assert_eq!(again.joined_at, joined.joined_at);

        let listed = get_projects(&fx.services, None, Some(parent.id)).await.unwrap();
        assert_eq!(listed.len(), 1);

        leave_project(&fx.services, Some(&member), created.id)
            .await
            .unwrap();
        leave_project(&fx.services, Some(&member), created.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_project_under_missing_program_is_not_found() {
        let fx = Fixture::new();
        let member = fx.actor(Role::User).await;
        let err = create_project(&fx.services, Some(&member), project("orphan", Some(5)))
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::not_found("Program"));
        assert_eq!(fx.store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_only_admins_maintain_projects() {
        let fx = Fixture::new();
        let member = fx.actor(Role::User).await;
        let created = create_project(&fx.services, Some(&member), project("mine", None))
            .await
            .unwrap();
        let patch = UpdateProject {
            title: Some("Taken over".into()),
            ..Default::default()
        };
        let err = update_project(&fx.services, Some(&member), created.id, patch)
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::Unauthorized);
    }

    #[tokio::test]
    async fn test_program_leads() {
        let fx = Fixture::new();
        let admin = fx.actor(Role::Admin).await;
        let lead = fx.actor(Role::User).await;
        let created = create_program(&fx.services, Some(&admin), program("led"))
            .await
            .unwrap();

        add_program_lead(&fx.services, Some(&admin), created.id, lead.id)
            .await
            .unwrap();
        remove_program_lead(&fx.services, Some(&admin), created.id, lead.id)
            .await
            .unwrap();
        let err = remove_program_lead(&fx.services, Some(&admin), created.id, lead.id)
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::not_found("Program lead"));
    }
}
