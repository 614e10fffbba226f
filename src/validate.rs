// SPDX-License-Identifier: MPL-2.0

//! Client-side form checks and text helpers.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const PREVIEW_LEN: usize = 100;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Per-field validation failures, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: Vec<(&'static str, &'static str)>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| *message)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.fields.iter().copied()
    }

    pub(crate) fn missing_photo() -> Self {
        Self {
            fields: vec![("photo", "Photo is required")],
        }
    }

    fn check(&mut self, field: &'static str, value: &str) {
        let value = value.trim();
        let message = if value.is_empty() {
            Some("This field is required")
        } else if field == "email" && !is_valid_email(value) {
            Some("Please enter a valid email")
        } else if field == "password" && value.chars().count() < MIN_PASSWORD_LEN {
            Some("Password must be at least 8 characters")
        } else {
            None
        };

        if let Some(message) = message {
            self.fields.push((field, message));
        }
    }

    fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FormErrors {}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), FormErrors> {
    let mut errors = FormErrors::default();
    errors.check("name", name);
    errors.check("email", email);
    errors.check("password", password);
    errors.into_result()
}

pub fn validate_login(email: &str, password: &str) -> Result<(), FormErrors> {
    let mut errors = FormErrors::default();
    errors.check("email", email);
    errors.check("password", password);
    errors.into_result()
}

pub fn validate_story(description: &str, has_photo: bool) -> Result<(), FormErrors> {
    let mut errors = FormErrors::default();
    if !has_photo {
        errors = FormErrors::missing_photo();
    }
    if description.trim().is_empty() {
        errors.fields.push(("description", "Description is required"));
    }
    errors.into_result()
}

/// Cut to `max` graphemes, appending "..." when anything was dropped
pub fn truncate_text(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
