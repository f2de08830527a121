//! Foundry - the immutable apparatus registry
//!
//! A foundry is built once from processors and switchers, validated at
//! construction, and then only read. It is `Send + Sync` and meant to be shared
//! (by reference or `Arc`) across any number of concurrent runs.
//!
//! # Examples
//!
//! ```
//! use operant_core::foundry::{Foundry, Processor};
//! use operant_core::model::{record, VirtualType};
//!
//! let shout = Processor::builder()
//!     .name("uppercase")
//!     .input("text", VirtualType::text("text to transform"))
//!     .output("text", VirtualType::text("transformed text"))
//!     .handler(|input| async move {
//!         let text = input["text"].text().unwrap_or_default().to_uppercase();
//!         Ok(record([("text", text)]))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let foundry = Foundry::register(vec![shout], vec![]).unwrap();
//! assert!(foundry.lookup("uppercase").is_ok());
//! assert!(foundry.lookup("lowercase").is_err());
//! ```

pub mod apparatus;

pub use apparatus::{
    ApparatusKind, CheckFn, Contract, ProcessFn, Processor, ProcessorBuilder, Switcher,
    SwitcherBuilder,
};

use crate::error::RegistryError;
use serde::Serialize;
use std::collections::BTreeMap;

/// A registered callable
#[derive(Debug, Clone)]
pub enum Apparatus {
    /// A data transform
    Processor(Processor),
    /// A branch predicate
    Switcher(Switcher),
}

impl Apparatus {
    /// Registry name
    pub fn name(&self) -> &str {
        match self {
            Apparatus::Processor(p) => p.name(),
            Apparatus::Switcher(s) => s.name(),
        }
    }

    /// Human-readable purpose
    pub fn description(&self) -> &str {
        match self {
            Apparatus::Processor(p) => p.description(),
            Apparatus::Switcher(s) => s.description(),
        }
    }

    /// Processor or switcher
    pub fn kind(&self) -> ApparatusKind {
        match self {
            Apparatus::Processor(_) => ApparatusKind::Processor,
            Apparatus::Switcher(_) => ApparatusKind::Switcher,
        }
    }

    /// Serializable description of this apparatus
    pub fn signature(&self) -> ApparatusSignature {
        match self {
            Apparatus::Processor(p) => ApparatusSignature {
                name: p.name().to_string(),
                kind: ApparatusKind::Processor,
                description: p.description().to_string(),
                input: p.input().clone(),
                output: Some(p.output().clone()),
                output_when_true: None,
                output_when_false: None,
            },
            Apparatus::Switcher(s) => ApparatusSignature {
                name: s.name().to_string(),
                kind: ApparatusKind::Switcher,
                description: s.description().to_string(),
                input: s.input().clone(),
                output: None,
                output_when_true: Some(s.output_when_true().clone()),
                output_when_false: Some(s.output_when_false().clone()),
            },
        }
    }
}

/// What a planner needs to know about an apparatus
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApparatusSignature {
    /// Registry name
    pub name: String,
    /// Processor or switcher
    pub kind: ApparatusKind,
    /// Human-readable purpose
    pub description: String,
    /// Declared input vars
    pub input: Contract,

    /// Processor outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Contract>,

    /// Switcher outputs on a true verdict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_when_true: Option<Contract>,

    /// Switcher outputs on a false verdict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_when_false: Option<Contract>,
}

/// The registry of available apparatus
#[derive(Debug, Clone, Default)]
pub struct Foundry {
    apparatus: BTreeMap<String, Apparatus>,
}

impl Foundry {
    /// Build a foundry from processors and switchers
    ///
    /// # Errors
    ///
    /// Returns `Err` if two apparatus share a name, whatever their kinds.
    pub fn register(
        processors: Vec<Processor>,
        switchers: Vec<Switcher>,
    ) -> Result<Self, RegistryError> {
        let mut apparatus = BTreeMap::new();

        let all = processors
            .into_iter()
            .map(Apparatus::Processor)
            .chain(switchers.into_iter().map(Apparatus::Switcher));

        for entry in all {
            let name = entry.name().to_string();
            if name.trim().is_empty() {
                return Err(RegistryError::MissingName);
            }
            if apparatus.contains_key(&name) {
                return Err(RegistryError::DuplicateName(name));
            }
            apparatus.insert(name, entry);
        }

        tracing::debug!(count = apparatus.len(), "Foundry registered");

        Ok(Self { apparatus })
    }

    /// Look up an apparatus by name
    pub fn lookup(&self, name: &str) -> Result<&Apparatus, RegistryError> {
        self.apparatus
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// The processor registered as `name`, if it is one
    pub fn processor(&self, name: &str) -> Option<&Processor> {
        match self.apparatus.get(name) {
            Some(Apparatus::Processor(p)) => Some(p),
            _ => None,
        }
    }

    /// The switcher registered as `name`, if it is one
    pub fn switcher(&self, name: &str) -> Option<&Switcher> {
        match self.apparatus.get(name) {
            Some(Apparatus::Switcher(s)) => Some(s),
            _ => None,
        }
    }

    /// True if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.apparatus.contains_key(name)
    }

    /// Number of registered apparatus
    pub fn len(&self) -> usize {
        self.apparatus.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.apparatus.is_empty()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.apparatus.keys().map(String::as_str)
    }

    /// Signatures of every apparatus, sorted by name
    pub fn manifest(&self) -> Vec<ApparatusSignature> {
        self.apparatus.values().map(Apparatus::signature).collect()
    }
}
