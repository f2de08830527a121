//! Error types for Operant Core
//!
//! Every way a run can end without an [`OutputRecord`](crate::OutputRecord) is a
//! [`Fault`]. Faults abort the current run only; they never take down the host.
//! Registry construction has its own [`RegistryError`] and configuration loading
//! its own [`ConfigError`], both of which convert into `Fault`.

use crate::foundry::ApparatusKind;
use crate::model::Address;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Fault>;

/// A fault that terminates a single run
#[derive(Error, Debug)]
pub enum Fault {
    /// The alignment failed pre-execution validation
    #[error("Structural fault: {0}")]
    Structural(#[from] StructuralFault),

    /// A node references an apparatus the foundry does not know
    #[error("Node '{node}' references unknown apparatus '{apparatus}'")]
    UnknownApparatus { node: String, apparatus: String },

    /// A node read a register nothing wrote during this run
    #[error("Node '{node}' read unbound register '{address}'")]
    UnboundRegister { node: String, address: Address },

    /// A successor edge names a node that does not exist
    #[error("Node '{node}' points at missing node '{target}'")]
    DanglingReference { node: String, target: String },

    /// The step ceiling was crossed
    #[error("Step limit of {limit} exceeded at node '{node}'")]
    StepLimitExceeded { limit: u64, node: String },

    /// The wall-clock budget ran out
    #[error("Run exceeded its {budget_ms}ms budget after {elapsed_ms}ms")]
    TimeoutExceeded { elapsed_ms: u64, budget_ms: u64 },

    /// The caller cancelled the run
    #[error("Run cancelled after {steps} steps")]
    Cancelled { steps: u64 },

    /// The invoked processor or switcher returned an error
    #[error("Apparatus '{apparatus}' failed at node '{node}': {source}")]
    ApparatusFailure {
        node: String,
        apparatus: String,
        #[source]
        source: anyhow::Error,
    },

    /// An apparatus did not produce a var the node maps to a register
    #[error("Apparatus at node '{node}' did not produce required output '{var}'")]
    MissingOutput { node: String, var: String },

    /// Foundry construction or lookup failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The blueprint collaborator could not produce an alignment
    #[error("Blueprint failed: {0}")]
    Blueprint(#[source] anyhow::Error),

    /// Run configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Fieldless discriminant of [`Fault`], handy for matching and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Structural,
    UnknownApparatus,
    UnboundRegister,
    DanglingReference,
    StepLimitExceeded,
    TimeoutExceeded,
    Cancelled,
    ApparatusFailure,
    MissingOutput,
    Registry,
    Blueprint,
    Config,
}

impl Fault {
    /// The discriminant of this fault
    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::Structural(_) => FaultKind::Structural,
            Fault::UnknownApparatus { .. } => FaultKind::UnknownApparatus,
            Fault::UnboundRegister { .. } => FaultKind::UnboundRegister,
            Fault::DanglingReference { .. } => FaultKind::DanglingReference,
            Fault::StepLimitExceeded { .. } => FaultKind::StepLimitExceeded,
            Fault::TimeoutExceeded { .. } => FaultKind::TimeoutExceeded,
            Fault::Cancelled { .. } => FaultKind::Cancelled,
            Fault::ApparatusFailure { .. } => FaultKind::ApparatusFailure,
            Fault::MissingOutput { .. } => FaultKind::MissingOutput,
            Fault::Registry(_) => FaultKind::Registry,
            Fault::Blueprint(_) => FaultKind::Blueprint,
            Fault::Config(_) => FaultKind::Config,
        }
    }

    /// Name of the node the fault was raised at, if it is tied to one
    pub fn node(&self) -> Option<&str> {
        match self {
            Fault::UnknownApparatus { node, .. }
            | Fault::UnboundRegister { node, .. }
            | Fault::DanglingReference { node, .. }
            | Fault::StepLimitExceeded { node, .. }
            | Fault::ApparatusFailure { node, .. }
            | Fault::MissingOutput { node, .. } => Some(node),
            _ => None,
        }
    }

    /// True for faults raised before the interpreter touched any register
    ///
    /// `UnknownApparatus` counts as one: a run looks apparatus up in the same
    /// foundry it was validated against, so the per-node lookup cannot miss.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Fault::Structural(_)
                | Fault::UnknownApparatus { .. }
                | Fault::Registry(_)
                | Fault::Config(_)
        )
    }
}

/// Reasons an alignment is rejected before execution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralFault {
    #[error("Alignment has no ingress")]
    MissingIngress,

    #[error("Alignment has {count} ingress operations, expected exactly one")]
    DuplicateIngress { count: usize },

    #[error("Alignment has no egress")]
    MissingEgress,

    #[error("Operation at position {position} has an empty name")]
    EmptyName { position: usize },

    #[error("Operation name '{name}' is used more than once")]
    DuplicateName { name: String },

    #[error("Node '{from}' points at unknown node '{target}'")]
    UnresolvedReference { from: String, target: String },

    #[error("Ingress declares {count} file addresses, at most {max} are allowed")]
    TooManyFileAddresses { count: usize, max: usize },

    #[error("Node '{node}' needs a {expected} but '{apparatus}' is not one")]
    ApparatusKindMismatch {
        node: String,
        apparatus: String,
        expected: ApparatusKind,
    },

    #[error("Malformed alignment: {0}")]
    Malformed(String),
}

/// Errors raised while building or querying a foundry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Apparatus is missing a name")]
    MissingName,

    #[error("Apparatus '{apparatus}' is missing its {contract} type declaration")]
    MissingContract {
        apparatus: String,
        contract: &'static str,
    },

    #[error("Apparatus '{apparatus}' has no callable")]
    MissingCallable { apparatus: String },

    #[error("Apparatus '{apparatus}' declares an empty var name")]
    EmptyVar { apparatus: String },

    #[error("Apparatus '{0}' is registered more than once")]
    DuplicateName(String),

    #[error("Apparatus not found: {0}")]
    NotFound(String),
}

/// Errors raised while loading an [`OperateConfig`](crate::OperateConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable {var} has invalid value '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
