//! Per-run interpreter state

use crate::env::Env;
use crate::error::{Fault, Result};
use crate::foundry::{Contract, Foundry};
use crate::medium::NodeRef;
use crate::model::{Alignment, Bindings, Operation, Record};
use std::collections::HashMap;
use tokio::time::Instant;
use uuid::Uuid;

/// Everything one run owns
///
/// The foundry and alignment are borrowed read-only; the register file, step
/// counter and visit log belong to this run alone.
#[derive(Debug)]
pub struct OperationContext<'a> {
    /// Identifier of this run
    pub run_id: Uuid,
    /// Registry the run calls into
    pub foundry: &'a Foundry,
    /// Program being run
    pub alignment: &'a Alignment,
    /// Registers of this run
    pub env: Env,
    /// Node visits admitted so far
    pub step_count: u64,
    /// When the run started, on the tokio clock
    pub started: Instant,
    /// Nodes that completed, in order
    pub visited: Vec<NodeRef>,
    index: HashMap<&'a str, usize>,
}

impl<'a> OperationContext<'a> {
    /// Fresh state for one run of `alignment`
    pub fn new(run_id: Uuid, foundry: &'a Foundry, alignment: &'a Alignment) -> Self {
        let index = alignment
            .iter()
            .enumerate()
            .filter_map(|(position, op)| op.name().map(|name| (name, position)))
            .collect();

        Self {
            run_id,
            foundry,
            alignment,
            env: Env::new(),
            step_count: 0,
            started: Instant::now(),
            visited: Vec::new(),
            index,
        }
    }

    /// Operation at `position`
    pub fn operation(&self, position: usize) -> &'a Operation {
        &self.alignment.operations[position]
    }

    /// Position of the node a successor edge names
    pub fn resolve(&self, from: &str, target: &str) -> Result<usize> {
        self.index
            .get(target)
            .copied()
            .ok_or_else(|| Fault::DanglingReference {
                node: from.to_string(),
                target: target.to_string(),
            })
    }

    /// Read the registers a node feeds into its apparatus
    ///
    /// An unbound register is skipped when the apparatus declares the var
    /// optional, and faults otherwise.
    pub fn gather(&self, node: &str, bindings: &Bindings, contract: &Contract) -> Result<Record> {
        let mut input = Record::new();

        for (var, address) in bindings {
            match self.env.read(address) {
                Some(param) => {
                    input.insert(var.clone(), param.clone());
                }
                None if is_optional(contract, var) => {
                    tracing::debug!(
                        node,
                        var = %var,
                        address = %address,
                        "Optional input unbound, skipped"
                    );
                }
                None => {
                    return Err(Fault::UnboundRegister {
                        node: node.to_string(),
                        address: address.clone(),
                    })
                }
            }
        }

        Ok(input)
    }

    /// Write apparatus outputs into the registers a node maps them to
    ///
    /// Every mapped var is checked before anything is written, so a node with a
    /// missing output leaves the registers untouched.
    pub fn scatter(
        &mut self,
        node: &str,
        bindings: &Bindings,
        output: &Record,
        contract: &Contract,
    ) -> Result<()> {
        let mut writes = Vec::with_capacity(bindings.len());

        for (var, address) in bindings {
            match output.get(var) {
                Some(param) => writes.push((address.clone(), param.clone())),
                None if is_optional(contract, var) => {
                    tracing::debug!(node, var = %var, "Optional output absent, write skipped");
                }
                None => {
                    return Err(Fault::MissingOutput {
                        node: node.to_string(),
                        var: var.clone(),
                    })
                }
            }
        }

        for (address, param) in writes {
            self.env.write(address, param);
        }

        Ok(())
    }
}

fn is_optional(contract: &Contract, var: &str) -> bool {
    contract.get(var).is_some_and(|vtype| vtype.optional)
}
