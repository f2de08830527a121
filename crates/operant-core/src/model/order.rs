//! Orders coming in and output records going out of a run

use super::value::{Attachment, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The external request seeding a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Prompt text, bound at the ingress
    pub text: String,

    /// Attachments, bound positionally at the ingress
    #[serde(default)]
    pub files: Vec<Attachment>,
}

impl Order {
    /// Order with no attachments
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            files: Vec::new(),
        }
    }

    /// Attach a file
    pub fn with_file(mut self, file: Attachment) -> Self {
        self.files.push(file);
        self
    }
}

/// Field name → value mapping assembled at an egress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputRecord(BTreeMap<String, Value>);

impl OutputRecord {
    /// Empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `field`
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub(crate) fn insert(&mut self, field: String, value: Value) {
        self.0.insert(field, value);
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// The underlying map
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl FromIterator<(String, Value)> for OutputRecord {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
