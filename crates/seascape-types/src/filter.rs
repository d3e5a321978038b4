//! # Topic Filter
//!
//! A set-per-level predicate over topics. An empty list at a level leaves
//! that level unconstrained.
//!
//! ## Canonical Form
//!
//! One `tag:values;` segment per non-empty level, in the fixed tag order
//! `o,p,n,g,s,m,e`, for example `o:a,b;p:c;`. Values keep the order the caller gave them, so
//! two filters holding the same values in a different order have different
//! keys.

use crate::errors::TopicError;
use crate::topic::Topic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scoping predicate for subscriptions and queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicFilter {
    #[serde(rename = "o", skip_serializing_if = "Vec::is_empty")]
    pub organizations: Vec<String>,
    #[serde(rename = "p", skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
    #[serde(rename = "n", skip_serializing_if = "Vec::is_empty")]
    pub network_ids: Vec<String>,
    #[serde(rename = "g", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(rename = "s", skip_serializing_if = "Vec::is_empty")]
    pub smartcontracts: Vec<String>,
    #[serde(rename = "m", skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(rename = "e", skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

fn owned<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl TopicFilter {
    /// An unconstrained filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_organizations<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.organizations = owned(v);
        self
    }

    #[must_use]
    pub fn with_projects<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.projects = owned(v);
        self
    }

    #[must_use]
    pub fn with_network_ids<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.network_ids = owned(v);
        self
    }

    #[must_use]
    pub fn with_groups<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.groups = owned(v);
        self
    }

    #[must_use]
    pub fn with_smartcontracts<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.smartcontracts = owned(v);
        self
    }

    #[must_use]
    pub fn with_methods<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.methods = owned(v);
        self
    }

    #[must_use]
    pub fn with_events<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.events = owned(v);
        self
    }

    /// Parse the JSON object form. Absent tags default to empty.
    ///
    /// # Errors
    ///
    /// Fails when the value is not an object or a tag is not a string list.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, TopicError> {
        if !value.is_object() {
            return Err(TopicError::InvalidJson("expected a filter object".into()));
        }
        serde_json::from_value(value.clone()).map_err(|e| TopicError::InvalidJson(e.to_string()))
    }

    /// JSON object keyed by level tag, empty levels omitted.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    /// Opaque lookup key for caching and deduplication.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// True if no level is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels().iter().all(|(_, values)| values.is_empty())
    }

    /// Cardinality at a level.
    ///
    /// Levels 1..=5 count a single list; level 6 counts methods and events
    /// together; anything else sums every list.
    #[must_use]
    pub fn len(&self, level: u8) -> usize {
        match level {
            1 => self.organizations.len(),
            2 => self.projects.len(),
            3 => self.network_ids.len(),
            4 => self.groups.len(),
            5 => self.smartcontracts.len(),
            6 => self.methods.len() + self.events.len(),
            _ => self.levels().iter().map(|(_, values)| values.len()).sum(),
        }
    }

    /// Whether `topic` falls inside this filter.
    ///
    /// The topic's `name` is checked against `smartcontracts`, and its
    /// `method` against methods and events combined.
    #[must_use]
    pub fn matches(&self, topic: &Topic) -> bool {
        let admits = |values: &[String], field: &str| values.is_empty() || values.iter().any(|v| v == field);

        let method_or_event = (self.methods.is_empty() && self.events.is_empty())
            || self
                .methods
                .iter()
                .chain(self.events.iter())
                .any(|v| *v == topic.method);

        admits(&self.organizations, &topic.organization)
            && admits(&self.projects, &topic.project)
            && admits(&self.network_ids, &topic.network_id)
            && admits(&self.groups, &topic.group)
            && admits(&self.smartcontracts, &topic.name)
            && method_or_event
    }

    fn levels(&self) -> [(&'static str, &Vec<String>); 7] {
        [
            ("o", &self.organizations),
            ("p", &self.projects),
            ("n", &self.network_ids),
            ("g", &self.groups),
            ("s", &self.smartcontracts),
            ("m", &self.methods),
            ("e", &self.events),
        ]
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (tag, values) in self.levels() {
            if values.is_empty() {
                continue;
            }
            write!(f, "{}:{};", tag, values.join(","))?;
        }
        Ok(())
    }
}
