//! Input validation utilities
//!
//! Actions validate after the access check and before touching the store.
//! [`Validator`] collects every failing field so the caller sees them all at
//! once.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{ActionError, ActionResult, FieldError};

fn slug_regex() -> &'static Regex {
    static SLUG_REGEX: OnceLock<Regex> = OnceLock::new();
    SLUG_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("Failed to compile slug regex")
    })
}

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(r"^https?://[^\s]+$").expect("Failed to compile url regex"))
}

fn key_regex() -> &'static Regex {
    static KEY_REGEX: OnceLock<Regex> = OnceLock::new();
    KEY_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9_]*(?:[.:][a-z][a-z0-9_]*)*$").expect("Failed to compile key regex")
    })
}

/// Derive a URL slug from free text: lower-cased, whitespace runs become `-`.
pub fn slugify(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Accumulates field errors across one input payload
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    /// Non-blank text of at most `max` characters.
    pub fn required(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.trim().is_empty() {
            self.errors
                .push(FieldError::new(field, format!("{} is required", label(field))));
        } else if value.chars().count() > max {
            self.errors.push(FieldError::new(
                field,
                format!("{} must be at most {} characters long", label(field), max),
            ));
        }
        self
    }

    /// Like [`Validator::required`] but only when a value is supplied.
    pub fn optional(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(value) = value {
            self.required(field, value, max);
        }
        self
    }

    pub fn slug(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(
            slug_regex().is_match(value),
            field,
            "Slug may only contain lowercase letters, digits and single dashes",
        )
    }

    pub fn optional_slug(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.slug(field, value);
        }
        self
    }

    pub fn url(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.check(url_regex().is_match(value), field, "Invalid URL");
        }
        self
    }

    /// Dotted or colon-separated lower-case identifier such as `site.name`
    /// or `blog:create`.
    pub fn key(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(key_regex().is_match(value), field, "Invalid identifier")
    }

    pub fn finish(&mut self) -> ActionResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ActionError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

fn label(field: &str) -> String {
    let mut chars = field.replace('_', " ").chars().collect::<Vec<_>>();
    if let Some(first) = chars.first_mut() {
        *first = first.to_ascii_uppercase();
    }
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_reports_blank_and_long_values() {
        let err = Validator::new()
            .required("title", "   ", 10)
            .required("content", "abcdefghijk", 10)
            .finish()
            .unwrap_err();

        let ActionError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Title is required");
        assert_eq!(errors[1].message, "Content must be at most 10 characters long");
    }

    #[test]
    fn test_slug_rules() {
        assert!(Validator::new().slug("slug", "rust-meetup-2025").finish().is_ok());
        assert!(Validator::new().slug("slug", "Rust Meetup").finish().is_err());
        assert!(Validator::new().slug("slug", "double--dash").finish().is_err());
    }

    #[test]
    fn test_optional_fields_skip_when_absent() {
        assert!(
            Validator::new()
                .optional("excerpt", None, 5)
                .url("cover_image_url", None)
                .finish()
                .is_ok()
        );
        assert!(Validator::new().url("link", Some("ftp://x")).finish().is_err());
    }

    #[test]
    fn test_keys() {
        assert!(Validator::new().key("code", "blog:create").finish().is_ok());
        assert!(Validator::new().key("key", "site.maintenance_mode").finish().is_ok());
        assert!(Validator::new().key("key", "Site Name").finish().is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Rust  Async\tTips"), "rust-async-tips");
    }
}
