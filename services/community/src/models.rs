//! Persisted entities and the request payloads that create or patch them

pub mod blog;
pub mod events;
pub mod governance;
pub mod platform;
pub mod programs;
pub mod users;
