//! # Topic
//!
//! Hierarchical 6-level address: `organization.project.network_id.group.name.method`.
//!
//! Levels are populated from the root. A topic with `organization` and
//! `project` is level 2; a fully qualified method topic is level 6. The model
//! assumes contiguity but does not enforce it.

use crate::errors::TopicError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of levels in a fully qualified topic.
pub const MAX_LEVEL: u8 = 6;

/// Minimum number of dotted segments `Topic::parse` accepts.
pub const MIN_SEGMENTS: usize = 2;

/// A hierarchical bus address.
///
/// Each field is an opaque token; an empty string means the level is not
/// populated. Equality is structural across all six fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Topic {
    pub organization: String,
    pub project: String,
    pub network_id: String,
    pub group: String,
    pub name: String,
    pub method: String,
}

impl Topic {
    /// Create a level-2 topic.
    #[must_use]
    pub fn new(organization: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_network_id(mut self, network_id: impl Into<String>) -> Self {
        self.network_id = network_id.into();
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Parse a dotted topic string.
    ///
    /// # Errors
    ///
    /// Fails when the string has fewer than 2 or more than 6 segments.
    pub fn parse(s: &str) -> Result<Self, TopicError> {
        let segments: Vec<&str> = s.split('.').collect();
        if segments.len() < MIN_SEGMENTS {
            return Err(TopicError::TooShort {
                segments: segments.len(),
            });
        }
        if segments.len() > MAX_LEVEL as usize {
            return Err(TopicError::TooLong {
                segments: segments.len(),
            });
        }

        let mut topic = Self::default();
        for (slot, segment) in topic.fields_mut().into_iter().zip(segments) {
            *slot = segment.to_string();
        }
        Ok(topic)
    }

    /// Build a topic from a JSON object keyed by field name.
    ///
    /// Absent keys leave the level unpopulated.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, TopicError> {
        if !value.is_object() {
            return Err(TopicError::InvalidJson("expected an object".into()));
        }
        serde_json::from_value(value.clone()).map_err(|e| TopicError::InvalidJson(e.to_string()))
    }

    /// JSON object form, keyed by field name.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "organization": self.organization,
            "project": self.project,
            "network_id": self.network_id,
            "group": self.group,
            "name": self.name,
            "method": self.method,
        })
    }

    /// Count of populated fields, independent of any rendering depth.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.fields().iter().filter(|f| !f.is_empty()).count() as u8
    }

    /// Render exactly `level` segments, dot-joined.
    ///
    /// Level 0 or anything above 6 renders as an empty string.
    #[must_use]
    pub fn to_string_level(&self, level: u8) -> String {
        if level == 0 || level > MAX_LEVEL {
            return String::new();
        }
        self.fields()[..level as usize].join(".")
    }

    /// Field at a 1-based level.
    #[must_use]
    pub fn field(&self, level: u8) -> Option<&str> {
        match level {
            1..=MAX_LEVEL => Some(self.fields()[level as usize - 1]),
            _ => None,
        }
    }

    fn fields(&self) -> [&str; 6] {
        [
            &self.organization,
            &self.project,
            &self.network_id,
            &self.group,
            &self.name,
            &self.method,
        ]
    }

    fn fields_mut(&mut self) -> [&mut String; 6] {
        [
            &mut self.organization,
            &mut self.project,
            &mut self.network_id,
            &mut self.group,
            &mut self.name,
            &mut self.method,
        ]
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_level(self.level()))
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
