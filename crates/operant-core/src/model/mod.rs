//! Alignment data model
//!
//! - [`value`]: runtime values, registers and advisory types
//! - [`operation`]: the four node kinds
//! - [`alignment`]: the program and its validation
//! - [`order`]: run input and output

pub mod alignment;
pub mod operation;
pub mod order;
pub mod value;

pub use alignment::Alignment;
pub use operation::{
    Bindings, Egress, Ingress, Operation, Process, Switch, INGRESS_LABEL, MAX_FILE_ADDRESSES,
};
pub use order::{Order, OutputRecord};
pub use value::{record, Address, Attachment, Param, Record, Value, Var, VirtualType};
