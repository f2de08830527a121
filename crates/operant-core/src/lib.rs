//! Operant Core - The alignment execution engine
//!
//! Operant runs *alignments*: small programs, drafted outside the engine, that
//! chain calls into a fixed registry of pluggable async callables. The engine
//! does not decide what to run. It validates the program it is given and then
//! interprets it as a register machine.
//!
//! # Architecture
//!
//! 1. **Foundry** (`foundry`): the immutable registry of processors and switchers
//! 2. **Alignment** (`model`): ingress, process, switch and egress nodes forming a graph
//! 3. **Env** (`env`): the per-run register file
//! 4. **Operator** (`interpreter`): walks the graph until an egress or a fault
//! 5. **Medium** (`medium`): optional per-step trace
//! 6. **Engine** (`blueprint`): drafts an alignment for an order, then runs it
//!
//! # Quick Start
//!
//! ```
//! use operant_core::foundry::{Foundry, Processor};
//! use operant_core::interpreter::Operator;
//! use operant_core::model::{record, Alignment, Egress, Ingress, Order, Process, Record, Value, VirtualType};
//!
//! let uppercase = Processor::builder()
//!     .name("uppercase")
//!     .input("text", VirtualType::text("text to transform"))
//!     .output("text", VirtualType::text("uppercased text"))
//!     .handler(|input: Record| async move {
//!         let text = input["text"].text().unwrap_or_default().to_uppercase();
//!         Ok(record([("text", text)]))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let foundry = Foundry::register(vec![uppercase], vec![]).unwrap();
//!
//! let alignment = Alignment::default()
//!     .then(Ingress::new("prompt", "shout"))
//!     .then(Process::new("shout", "uppercase", "done").input("text", "prompt").output("text", "loud"))
//!     .then(Egress::new("done").field("result", "loud"));
//!
//! let output = tokio_test::block_on(Operator::new(&foundry).operate(&alignment, Order::new("hi")))
//!     .unwrap();
//!
//! assert_eq!(output.get("result"), Some(&Value::from("HI")));
//! ```
//!
//! # Guarantees
//!
//! - Alignments are validated against the foundry before any register is written
//! - Every run ends in exactly one output record or one [`Fault`]
//! - Cycles are legal; the step ceiling bounds every run
//! - A fault never rolls back registers, the [`RunReport`] keeps them

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod blueprint;
pub mod config;
pub mod env;
pub mod error;
pub mod foundry;
pub mod interpreter;
pub mod medium;
pub mod model;

pub use blueprint::{Blueprint, Engine, StaticBlueprint};
pub use config::OperateConfig;
pub use env::Env;
pub use error::{ConfigError, Fault, FaultKind, RegistryError, Result, StructuralFault};
pub use foundry::{Apparatus, ApparatusKind, Foundry, Processor, Switcher};
pub use interpreter::{Operator, RunReport};
pub use medium::{JsonLinesMedium, Medium, NodeRef, Step, TracingMedium, Transcript};
pub use model::{Alignment, Operation, Order, OutputRecord};

/// Version of Operant Core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "operant-core");
    }
}
