//! Operations - the four node kinds of an alignment
//!
//! An alignment is a graph over these nodes. `Ingress` is the single entry,
//! `Process` and `Switch` are internal nodes that call into the foundry and
//! `Egress` nodes are exits. Successor edges are plain node names.

use super::value::{Address, Var};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of order attachments an ingress can bind
pub const MAX_FILE_ADDRESSES: usize = 5;

/// Label used for the ingress in diagnostics, since it has no name
pub const INGRESS_LABEL: &str = "ingress";

/// Var → register mapping of a node
pub type Bindings = BTreeMap<Var, Address>;

/// A node of an alignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// Binds the order
    Ingress(Ingress),
    /// Calls a processor
    Process(Process),
    /// Calls a switcher and branches
    Switch(Switch),
    /// Ends the run
    Egress(Egress),
}

impl Operation {
    /// Node name; `None` for the ingress, which can never be a successor
    pub fn name(&self) -> Option<&str> {
        match self {
            Operation::Ingress(_) => None,
            Operation::Process(p) => Some(&p.name),
            Operation::Switch(s) => Some(&s.name),
            Operation::Egress(e) => Some(&e.name),
        }
    }

    /// Name used in logs and faults
    pub fn label(&self) -> &str {
        self.name().unwrap_or(INGRESS_LABEL)
    }

    /// Successor edges in declaration order
    pub fn successors(&self) -> Vec<&str> {
        match self {
            Operation::Ingress(i) => vec![i.next.as_str()],
            Operation::Process(p) => vec![p.next.as_str()],
            Operation::Switch(s) => vec![s.next_when_true.as_str(), s.next_when_false.as_str()],
            Operation::Egress(_) => Vec::new(),
        }
    }

    /// Apparatus invoked by this node, if any
    pub fn apparatus(&self) -> Option<&str> {
        match self {
            Operation::Process(p) => Some(&p.apparatus),
            Operation::Switch(s) => Some(&s.apparatus),
            _ => None,
        }
    }
}

/// Entry node: binds the order into registers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    /// Node the run continues at
    pub next: String,

    /// Register receiving `order.text`
    pub prompt_addr: Address,

    /// Registers receiving the order attachments, positionally
    #[serde(default)]
    pub file_addrs: Vec<Address>,
}

impl Ingress {
    /// Ingress binding the prompt to `prompt_addr`
    pub fn new(prompt_addr: impl Into<Address>, next: impl Into<String>) -> Self {
        Self {
            next: next.into(),
            prompt_addr: prompt_addr.into(),
            file_addrs: Vec::new(),
        }
    }

    /// Bind the next attachment to `addr`
    pub fn file(mut self, addr: impl Into<Address>) -> Self {
        self.file_addrs.push(addr.into());
        self
    }
}

/// Transform node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// Unique node name
    pub name: String,
    /// Processor to call
    pub apparatus: String,

    /// Apparatus var → register read before the call
    #[serde(default)]
    pub inputs: Bindings,

    /// Apparatus var → register written after the call
    #[serde(default)]
    pub outputs: Bindings,

    /// Node the run continues at
    pub next: String,
}

impl Process {
    /// Process node with no bindings
    pub fn new(
        name: impl Into<String>,
        apparatus: impl Into<String>,
        next: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            apparatus: apparatus.into(),
            inputs: Bindings::new(),
            outputs: Bindings::new(),
            next: next.into(),
        }
    }

    /// Feed register `addr` into apparatus var `var`
    pub fn input(mut self, var: impl Into<Var>, addr: impl Into<Address>) -> Self {
        self.inputs.insert(var.into(), addr.into());
        self
    }

    /// Store apparatus output `var` into register `addr`
    pub fn output(mut self, var: impl Into<Var>, addr: impl Into<Address>) -> Self {
        self.outputs.insert(var.into(), addr.into());
        self
    }
}

/// Branching node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Switch {
    /// Unique node name
    pub name: String,
    /// Switcher to call
    pub apparatus: String,

    /// Apparatus var → register read before the call
    #[serde(default)]
    pub inputs: Bindings,

    /// Writes made when the verdict is true
    #[serde(default)]
    pub outputs_when_true: Bindings,

    /// Writes made when the verdict is false
    #[serde(default)]
    pub outputs_when_false: Bindings,

    /// Successor on a true verdict
    pub next_when_true: String,
    /// Successor on a false verdict
    pub next_when_false: String,
}

impl Switch {
    /// Switch node with no bindings
    pub fn new(
        name: impl Into<String>,
        apparatus: impl Into<String>,
        next_when_true: impl Into<String>,
        next_when_false: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            apparatus: apparatus.into(),
            inputs: Bindings::new(),
            outputs_when_true: Bindings::new(),
            outputs_when_false: Bindings::new(),
            next_when_true: next_when_true.into(),
            next_when_false: next_when_false.into(),
        }
    }

    /// Feed register `addr` into apparatus var `var`
    pub fn input(mut self, var: impl Into<Var>, addr: impl Into<Address>) -> Self {
        self.inputs.insert(var.into(), addr.into());
        self
    }

    /// Store true-branch output `var` into register `addr`
    pub fn output_when_true(mut self, var: impl Into<Var>, addr: impl Into<Address>) -> Self {
        self.outputs_when_true.insert(var.into(), addr.into());
        self
    }

    /// Store false-branch output `var` into register `addr`
    pub fn output_when_false(mut self, var: impl Into<Var>, addr: impl Into<Address>) -> Self {
        self.outputs_when_false.insert(var.into(), addr.into());
        self
    }

    /// Successor and output bindings for a verdict
    pub fn branch(&self, verdict: bool) -> (&str, &Bindings) {
        if verdict {
            (&self.next_when_true, &self.outputs_when_true)
        } else {
            (&self.next_when_false, &self.outputs_when_false)
        }
    }
}

/// Exit node: maps registers to named result fields
///
/// An egress with no result fields is legal and ends the run with an empty
/// [`OutputRecord`](crate::model::OutputRecord).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Egress {
    /// Unique node name
    pub name: String,

    /// Output field → register read at exit
    #[serde(default)]
    pub result: BTreeMap<String, Address>,
}

impl Egress {
    /// Egress with no result fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: BTreeMap::new(),
        }
    }

    /// Expose register `addr` as result field `field`
    pub fn field(mut self, field: impl Into<String>, addr: impl Into<Address>) -> Self {
        self.result.insert(field.into(), addr.into());
        self
    }
}

impl From<Ingress> for Operation {
    fn from(op: Ingress) -> Self {
        Operation::Ingress(op)
    }
}

impl From<Process> for Operation {
    fn from(op: Process) -> Self {
        Operation::Process(op)
    }
}

impl From<Switch> for Operation {
    fn from(op: Switch) -> Self {
        Operation::Switch(op)
    }
}

impl From<Egress> for Operation {
    fn from(op: Egress) -> Self {
        Operation::Egress(op)
    }
}
