//! Community platform core
//!
//! Access control, CRUD actions and comment threading for the community
//! site, served over HTTP by the `community` binary.

pub mod actions;
pub mod comments;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod response;
pub mod roles;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod validation;
pub mod views;
