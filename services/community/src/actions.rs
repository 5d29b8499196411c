//! Server-side actions
//!
//! Every action runs the same sequence: resolve the actor's access under the
//! operation's [`Policy`](crate::policy::Policy), validate input, persist
//! through the store, then invalidate the cached views the change affects.
//! A denied or invalid request stops before the store is touched.
//!
//! Actions take the actor explicitly; the HTTP layer resolves it from the
//! session and passes it in.

use std::sync::Arc;
use tracing::warn;

use crate::models::platform::NewAuditLog;
use crate::store::CommunityStore;
use crate::views::ViewCache;

pub mod blog;
pub mod dashboard;
pub mod events;
pub mod governance;
pub mod platform;
pub mod programs;
pub mod users;

/// Collaborators every action needs
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn CommunityStore>,
    pub views: Arc<dyn ViewCache>,
}

impl Services {
    pub fn new(store: Arc<dyn CommunityStore>, views: Arc<dyn ViewCache>) -> Self {
        Self { store, views }
    }

    /// Drop cached renders of `paths`. The write has already committed, so
    /// failures are logged and otherwise ignored.
    pub(crate) async fn invalidate<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        for path in paths {
            let path = path.as_ref();
            if let Err(e) = self.views.invalidate(path).await {
                warn!(path, "Failed to invalidate cached view: {}", e);
            }
        }
    }

    /// Write an audit entry without letting a failure reach the caller.
    pub(crate) async fn audit(&self, entry: NewAuditLog) {
        let action = entry.action.clone();
        if let Err(e) = self.store.insert_audit_log(entry).await {
            warn!(action, "Failed to write audit log: {}", e);
        }
    }
}

pub(crate) mod paths {
    pub const BLOG: &str = "/blog";
    pub const EVENTS: &str = "/events";
    pub const PROGRAMS: &str = "/programs";
    pub const PROJECTS: &str = "/projects";
    pub const ROLES: &str = "/roles";
    pub const SETTINGS: &str = "/settings";
    pub const USERS: &str = "/admin/users";
    pub const NOTIFICATIONS: &str = "/notifications";
    pub const PROFILE: &str = "/profile";

    pub fn under(base: &str, slug: &str) -> String {
        format!("{base}/{slug}")
    }

    /// Detail paths for the current slug and, when it changed, the old one.
    pub fn renamed(base: &str, old: &str, new: &str) -> Vec<String> {
        let mut paths = vec![base.to_string(), under(base, new)];
        if old != new {
            paths.push(under(base, old));
        }
        paths
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    use super::Services;
    use crate::models::users::User;
    use crate::roles::{Actor, Role};
    use crate::store::memory::MemoryStore;
    use crate::views::MemoryViewCache;

    pub struct Fixture {
        pub services: Services,
        pub store: Arc<MemoryStore>,
        pub views: Arc<MemoryViewCache>,
    }

    impl Fixture {
        pub fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let views = Arc::new(MemoryViewCache::new());
            Self {
                services: Services::new(store.clone(), views.clone()),
                store,
                views,
            }
        }

        /// Seed a user with `role` and return them as an actor.
        pub async fn actor(&self, role: Role) -> Actor {
            let now = Utc::now();
            let id = Uuid::new_v4();
            self.store
                .insert_user(User {
                    id,
                    name: format!("{role} user"),
                    email: format!("{id}@example.com"),
                    image: None,
                    role,
                    created_at: now,
                    updated_at: now,
                })
                .await;
            Actor::new(id, role)
        }

        /// Mutations and invalidations recorded so far.
        pub fn side_effects(&self) -> (usize, usize) {
            (self.store.mutation_count(), self.views.invalidated().len())
        }
    }
}
