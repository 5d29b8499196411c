//! Admin dashboard counters

use super::Services;
use crate::error::ActionResult;
use crate::models::users::DashboardStats;
use crate::policy::{Policy, authorize};
use crate::roles::Actor;

pub async fn get_dashboard_stats(
    services: &Services,
    actor: Option<&Actor>,
) -> ActionResult<DashboardStats> {
    authorize(actor, Policy::AdminOnly)?;
    Ok(services.store.dashboard_stats().await?)
}
