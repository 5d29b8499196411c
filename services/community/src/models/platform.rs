//! Settings, notifications and the audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ActionResult;
use crate::validation::Validator;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SystemSetting {
    pub id: i32,
    pub key: String,
    pub value: Value,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: Value,
    pub description: Option<String>,
}

impl UpdateSettingRequest {
    pub fn validate(&self, key: &str) -> ActionResult<()> {
        Validator::new()
            .key("key", key)
            .optional("description", self.description.as_deref(), 500)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_channel", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Push,
    InApp,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: i32,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .required("title", &self.title, 200)
            .required("message", &self.message, 2_000)
            .required("kind", &self.kind, 50)
            .optional("link", self.link.as_deref(), 500)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationPreference {
    pub id: i32,
    pub user_id: Uuid,
    pub channel: NotificationChannel,
    pub category: String,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePreferenceRequest {
    pub channel: NotificationChannel,
    pub category: String,
    pub enabled: bool,
}

impl UpdatePreferenceRequest {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .required("category", &self.category, 50)
            .key("category", &self.category)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLog {
    pub id: i32,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Option<Value>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit record about to be written
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Option<Value>,
    pub ip_address: Option<String>,
}

impl NewAuditLog {
    pub fn new(
        user_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: impl ToString,
    ) -> Self {
        Self {
            user_id,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            details: None,
            ip_address: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Upper bound on audit rows returned in one listing
pub const MAX_AUDIT_PAGE: i64 = 500;
