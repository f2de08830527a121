//! Alignment - the program the interpreter runs
//!
//! Alignments are drafted outside the engine (usually by a planning model) and
//! are never trusted: [`Alignment::validate`] checks the structural invariants
//! and resolves every apparatus against a [`Foundry`] before a run starts.
//!
//! # Invariants
//!
//! - Exactly one ingress, at least one egress
//! - Node names are non-empty and unique
//! - Every successor edge names an existing node
//! - The ingress binds at most [`MAX_FILE_ADDRESSES`] attachments
//! - Process nodes name processors, switch nodes name switchers

use super::operation::{Egress, Ingress, Operation, MAX_FILE_ADDRESSES};
use crate::error::{Fault, Result, StructuralFault};
use crate::foundry::{ApparatusKind, Foundry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An ordered collection of operations forming a graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    /// Operations in declaration order; order carries no meaning
    pub operations: Vec<Operation>,
}

impl Alignment {
    /// Alignment over `operations`
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// Parse an alignment from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StructuralFault::Malformed(e.to_string()).into())
    }

    /// Pretty-printed JSON form
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StructuralFault::Malformed(e.to_string()).into())
    }

    /// Append an operation, builder style
    pub fn then(mut self, op: impl Into<Operation>) -> Self {
        self.operations.push(op.into());
        self
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True if there are no operations
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operations in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Position and body of the first ingress
    pub fn ingress(&self) -> Option<(usize, &Ingress)> {
        self.operations.iter().enumerate().find_map(|(i, op)| match op {
            Operation::Ingress(ingress) => Some((i, ingress)),
            _ => None,
        })
    }

    /// Every egress
    pub fn egresses(&self) -> impl Iterator<Item = &Egress> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Egress(e) => Some(e),
            _ => None,
        })
    }

    /// Find a named operation
    pub fn find(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name() == Some(name))
    }

    /// Check the graph invariants that do not depend on a foundry
    pub fn validate_structure(&self) -> Result<()> {
        let ingress_count = self
            .operations
            .iter()
            .filter(|op| matches!(op, Operation::Ingress(_)))
            .count();
        match ingress_count {
            0 => return Err(StructuralFault::MissingIngress.into()),
            1 => {}
            count => return Err(StructuralFault::DuplicateIngress { count }.into()),
        }

        if self.egresses().next().is_none() {
            return Err(StructuralFault::MissingEgress.into());
        }

        let mut names = HashSet::new();
        for (position, op) in self.operations.iter().enumerate() {
            let Some(name) = op.name() else { continue };
            if name.trim().is_empty() {
                return Err(StructuralFault::EmptyName { position }.into());
            }
            if !names.insert(name) {
                return Err(StructuralFault::DuplicateName {
                    name: name.to_string(),
                }
                .into());
            }
        }

        if let Some((_, ingress)) = self.ingress() {
            if ingress.file_addrs.len() > MAX_FILE_ADDRESSES {
                return Err(StructuralFault::TooManyFileAddresses {
                    count: ingress.file_addrs.len(),
                    max: MAX_FILE_ADDRESSES,
                }
                .into());
            }
        }

        for op in &self.operations {
            for target in op.successors() {
                if !names.contains(target) {
                    return Err(StructuralFault::UnresolvedReference {
                        from: op.label().to_string(),
                        target: target.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    /// Full pre-execution validation against a foundry
    ///
    /// # Errors
    ///
    /// - [`Fault::Structural`] for any broken graph invariant
    /// - [`Fault::UnknownApparatus`] when a node names an unregistered apparatus
    pub fn validate(&self, foundry: &Foundry) -> Result<()> {
        self.validate_structure()?;

        for op in &self.operations {
            let (node, apparatus, expected) = match op {
                Operation::Process(p) => (&p.name, &p.apparatus, ApparatusKind::Processor),
                Operation::Switch(s) => (&s.name, &s.apparatus, ApparatusKind::Switcher),
                Operation::Ingress(_) | Operation::Egress(_) => continue,
            };

            let found = foundry
                .lookup(apparatus)
                .map_err(|_| Fault::UnknownApparatus {
                    node: node.clone(),
                    apparatus: apparatus.clone(),
                })?;

            if found.kind() != expected {
                return Err(StructuralFault::ApparatusKindMismatch {
                    node: node.clone(),
                    apparatus: apparatus.clone(),
                    expected,
                }
                .into());
            }
        }

        Ok(())
    }

    /// Apparatus names referenced by this alignment, deduplicated
    pub fn referenced_apparatus(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.operations
            .iter()
            .filter_map(Operation::apparatus)
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Alignment {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;
    use crate::foundry::{Processor, Switcher};
    use crate::model::{Egress, Ingress, Process, Switch, VirtualType};

    fn foundry() -> Foundry {
        let echo = Processor::builder()
            .name("echo")
            .input("text", VirtualType::text("anything"))
            .output("text", VirtualType::text("the same thing"))
            .handler(|input| async move { Ok(input) })
            .build()
            .unwrap();
        let always = Switcher::builder()
            .name("always")
            .input("text", VirtualType::text("ignored"))
            .output_when_true_contract(Default::default())
            .output_when_false_contract(Default::default())
            .handler(|_| async move { Ok((true, Default::default())) })
            .build()
            .unwrap();
        Foundry::register(vec![echo], vec![always]).unwrap()
    }

    fn linear() -> Alignment {
        Alignment::default()
            .then(Ingress::new("prompt", "echo"))
            .then(Process::new("echo", "echo", "done").input("text", "prompt").output("text", "out"))
            .then(Egress::new("done").field("result", "out"))
    }

    fn structural(alignment: &Alignment) -> StructuralFault {
        match alignment.validate_structure() {
            Err(Fault::Structural(s)) => s,
            other => panic!("expected structural fault, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_linear_alignment() {
        let alignment = linear();
        assert!(alignment.validate(&foundry()).is_ok());
        assert_eq!(alignment.referenced_apparatus(), vec!["echo"]);
        assert!(alignment.find("done").is_some());
    }

    #[test]
    fn test_missing_ingress_and_egress() {
        let no_ingress = Alignment::default().then(Egress::new("done"));
        assert_eq!(structural(&no_ingress), StructuralFault::MissingIngress);

        let no_egress = Alignment::default()
            .then(Ingress::new("prompt", "echo"))
            .then(Process::new("echo", "echo", "echo"));
        assert_eq!(structural(&no_egress), StructuralFault::MissingEgress);
    }

    #[test]
    fn test_two_ingresses_rejected() {
        let alignment = linear().then(Ingress::new("again", "done"));
        assert_eq!(
            structural(&alignment),
            StructuralFault::DuplicateIngress { count: 2 }
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let alignment = linear().then(Egress::new("done"));
        assert_eq!(
            structural(&alignment),
            StructuralFault::DuplicateName {
                name: "done".to_string()
            }
        );
    }

    #[test]
    fn test_unresolved_successor_rejected() {
        let alignment = Alignment::default()
            .then(Ingress::new("prompt", "nowhere"))
            .then(Egress::new("done"));
        assert_eq!(
            structural(&alignment),
            StructuralFault::UnresolvedReference {
                from: "ingress".to_string(),
                target: "nowhere".to_string()
            }
        );
    }

    #[test]
    fn test_too_many_file_addresses() {
        let mut ingress = Ingress::new("prompt", "done");
        for i in 0..=MAX_FILE_ADDRESSES {
            ingress = ingress.file(format!("file{i}"));
        }
        let alignment = Alignment::default().then(ingress).then(Egress::new("done"));
        assert_eq!(
            structural(&alignment),
            StructuralFault::TooManyFileAddresses { count: 6, max: 5 }
        );
    }

    #[test]
    fn test_unknown_apparatus() {
        let alignment = Alignment::default()
            .then(Ingress::new("prompt", "ghost"))
            .then(Process::new("ghost", "does-not-exist", "done"))
            .then(Egress::new("done"));

        let fault = alignment.validate(&foundry()).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::UnknownApparatus);
        assert_eq!(fault.node(), Some("ghost"));
    }

    #[test]
    fn test_apparatus_kind_mismatch() {
        let alignment = Alignment::default()
            .then(Ingress::new("prompt", "gate"))
            .then(Switch::new("gate", "echo", "done", "done"))
            .then(Egress::new("done"));

        match alignment.validate(&foundry()) {
            Err(Fault::Structural(StructuralFault::ApparatusKindMismatch { expected, .. })) => {
                assert_eq!(expected, ApparatusKind::Switcher)
            }
            other => panic!("expected kind mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_json_roundtrip_and_malformed() {
        let alignment = linear();
        let json = alignment.to_json_pretty().unwrap();
        assert_eq!(Alignment::from_json(&json).unwrap(), alignment);

        let fault = Alignment::from_json("{\"operations\": [{\"kind\": \"teleport\"}]}")
            .unwrap_err();
        assert!(matches!(fault, Fault::Structural(StructuralFault::Malformed(_))));
    }
}
