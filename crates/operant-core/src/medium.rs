//! Medium - per-step execution trace
//!
//! After every transition the interpreter hands a [`Step`] to the configured
//! [`Medium`], if any. Recording is best effort: an error returned by a medium
//! is logged and the run carries on.

use crate::model::{Operation, Record};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use uuid::Uuid;

/// The node a step executed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum NodeRef {
    /// The unnamed entry node
    Ingress,
    /// A process node, by name
    Process(String),
    /// A switch node, by name
    Switch(String),
    /// An egress node, by name
    Egress(String),
}

impl NodeRef {
    /// The node an operation stands for
    pub fn of(op: &Operation) -> Self {
        match op {
            Operation::Ingress(_) => NodeRef::Ingress,
            Operation::Process(p) => NodeRef::Process(p.name.clone()),
            Operation::Switch(s) => NodeRef::Switch(s.name.clone()),
            Operation::Egress(e) => NodeRef::Egress(e.name.clone()),
        }
    }

    /// Node name, `None` for the ingress
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeRef::Ingress => None,
            NodeRef::Process(n) | NodeRef::Switch(n) | NodeRef::Egress(n) => Some(n),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Ingress => write!(f, "ingress"),
            NodeRef::Process(n) => write!(f, "process:{n}"),
            NodeRef::Switch(n) => write!(f, "switch:{n}"),
            NodeRef::Egress(n) => write!(f, "egress:{n}"),
        }
    }
}

/// One completed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Run this step belongs to
    pub run_id: Uuid,

    /// 1-based position of this step in the run
    pub index: u64,

    /// Node that completed
    pub node: NodeRef,
    /// When the node started
    pub started_at: DateTime<Utc>,
    /// When the node finished
    pub ended_at: DateTime<Utc>,

    /// Record handed to the apparatus (or read at an egress)
    pub inputs: Record,

    /// Record produced by the apparatus (or bound at the ingress)
    pub outputs: Record,

    /// Verdict of a switch step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<bool>,
}

/// Sink for execution steps
pub trait Medium: Send + Sync {
    /// Record one step; errors are logged by the caller and never fault a run
    fn record(&self, step: &Step) -> anyhow::Result<()>;
}

/// In-memory, append-only trace
///
/// Clones share the same buffer, so a caller can keep one handle and give the
/// other to an operator.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    steps: Arc<Mutex<Vec<Step>>>,
}

impl Transcript {
    /// Empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every step recorded so far
    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().clone()
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.steps.lock().len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.steps.lock().is_empty()
    }

    /// Node sequence of the recorded steps
    pub fn path(&self) -> Vec<NodeRef> {
        self.steps.lock().iter().map(|s| s.node.clone()).collect()
    }
}

impl Medium for Transcript {
    fn record(&self, step: &Step) -> anyhow::Result<()> {
        self.steps.lock().push(step.clone());
        Ok(())
    }
}

/// Emits every step as a `tracing` event at `info`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMedium;

impl Medium for TracingMedium {
    fn record(&self, step: &Step) -> anyhow::Result<()> {
        let duration_us = (step.ended_at - step.started_at)
            .num_microseconds()
            .unwrap_or_default();

        tracing::info!(
            run_id = %step.run_id,
            index = step.index,
            node = %step.node,
            branch = ?step.branch,
            inputs = step.inputs.len(),
            outputs = step.outputs.len(),
            duration_us,
            "Step completed"
        );
        Ok(())
    }
}

/// Writes one JSON object per step, newline separated
pub struct JsonLinesMedium<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesMedium<W> {
    /// Medium writing to `writer`
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Medium for JsonLinesMedium<W> {
    fn record(&self, step: &Step) -> anyhow::Result<()> {
        let line = serde_json::to_string(step)?;
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> fmt::Debug for JsonLinesMedium<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesMedium").finish_non_exhaustive()
    }
}
