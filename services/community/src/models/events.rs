//! Community events, their programme and registrations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ActionResult;
use crate::validation::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_location_type")]
pub enum LocationType {
    #[sqlx(rename = "online")]
    #[serde(rename = "online")]
    Online,
    #[sqlx(rename = "in-person")]
    #[serde(rename = "in-person")]
    InPerson,
    #[sqlx(rename = "hybrid")]
    #[serde(rename = "hybrid")]
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_visibility")]
pub enum Visibility {
    #[default]
    #[sqlx(rename = "public")]
    #[serde(rename = "public")]
    Public,
    #[sqlx(rename = "private")]
    #[serde(rename = "private")]
    Private,
    #[sqlx(rename = "members-only")]
    #[serde(rename = "members-only")]
    MembersOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "registration_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommunityEvent {
    pub id: i32,
    pub created_by: Uuid,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub date: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub registration_required: bool,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub timezone: String,
    pub cancelled: bool,
    pub visibility: Visibility,
    pub cover_image_url: Option<String>,
    pub published: bool,
    pub location: String,
    pub location_type: LocationType,
    pub flagship: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventSession {
    pub id: i32,
    pub event_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventSpeaker {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventSponsor {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub logo_url: Option<String>,
    pub website_url: Option<String>,
}

/// An event with its sessions, speakers and sponsors
#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: CommunityEvent,
    pub sessions: Vec<EventSession>,
    pub speakers: Vec<EventSpeaker>,
    pub sponsors: Vec<EventSponsor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub date: DateTime<Utc>,
    pub capacity: Option<i32>,
    #[serde(default)]
    pub registration_required: bool,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub timezone: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    pub location: String,
    pub location_type: LocationType,
    #[serde(default)]
    pub flagship: bool,
}

impl NewEvent {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .required("title", &self.title, 200)
            .required("description", &self.description, 20_000)
            .slug("slug", &self.slug)
            .required("timezone", &self.timezone, 64)
            .required("location", &self.location, 300)
            .url("cover_image_url", self.cover_image_url.as_deref())
            .check(self.end_at >= self.start_at, "end_at", "End must not precede start")
            .check(
                self.capacity.is_none_or(|c| c > 0),
                "capacity",
                "Capacity must be positive",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub registration_required: Option<bool>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub cancelled: Option<bool>,
    pub visibility: Option<Visibility>,
    pub cover_image_url: Option<String>,
    pub published: Option<bool>,
    pub location: Option<String>,
    pub location_type: Option<LocationType>,
    pub flagship: Option<bool>,
}

impl UpdateEvent {
    /// Validate the patch against the event it will be applied to.
    pub fn validate(&self, current: &CommunityEvent) -> ActionResult<()> {
        let start = self.start_at.unwrap_or(current.start_at);
        let end = self.end_at.unwrap_or(current.end_at);
        Validator::new()
            .optional("title", self.title.as_deref(), 200)
            .optional("description", self.description.as_deref(), 20_000)
            .optional_slug("slug", self.slug.as_deref())
            .optional("timezone", self.timezone.as_deref(), 64)
            .optional("location", self.location.as_deref(), 300)
            .url("cover_image_url", self.cover_image_url.as_deref())
            .check(end >= start, "end_at", "End must not precede start")
            .check(
                self.capacity.is_none_or(|c| c > 0),
                "capacity",
                "Capacity must be positive",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventRegistration {
    pub id: i32,
    pub event_id: i32,
    pub user_id: Uuid,
    pub registered_at: DateTime<Utc>,
    pub status: RegistrationStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

/// Result of the registration upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Registered,
    /// A cancelled registration was confirmed again
    Reinstated,
    AlreadyRegistered,
}
