//! Operant Apparatus - a standard catalogue for the alignment engine
//!
//! Ready-made processors and switchers over text, plus a processor that
//! delegates to a chat model through a [`ChatClient`].
//!
//! | name | kind | inputs | outputs |
//! |---|---|---|---|
//! | `uppercase`, `lowercase`, `trim` | processor | `text` | `text` |
//! | `concat` | processor | `left`, `right`, `separator?` | `text` |
//! | `length` | processor | `text` | `length` |
//! | `is_empty` | switcher | `text` | false: `text` |
//! | `contains` | switcher | `text`, `needle` | `text` |
//! | `longer_than_<n>` | switcher | `text` | `text` |
//! | `prompt` | processor | `prompt`, `system?` | `text` |

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod chat;
pub mod switch;
pub mod text;

pub use chat::{prompt_processor, ChatClient, DEFAULT_SYSTEM_PROMPT};
pub use switch::{contains, is_empty, longer_than};
pub use text::{concat, length, lowercase, trim, uppercase};

use operant_core::error::RegistryError;
use operant_core::foundry::{Foundry, Processor, Switcher};
use std::sync::Arc;

/// Length threshold of the `longer_than_<n>` switcher in the standard foundry
pub const STANDARD_LENGTH_LIMIT: usize = 10;

pub fn standard_processors() -> Result<Vec<Processor>, RegistryError> {
    Ok(vec![uppercase()?, lowercase()?, trim()?, concat()?, length()?])
}

pub fn standard_switchers() -> Result<Vec<Switcher>, RegistryError> {
    Ok(vec![
        is_empty()?,
        contains()?,
        longer_than(
            format!("longer_than_{STANDARD_LENGTH_LIMIT}"),
            STANDARD_LENGTH_LIMIT,
        )?,
    ])
}

/// Foundry holding the whole text catalogue
pub fn standard_foundry() -> Result<Foundry, RegistryError> {
    Foundry::register(standard_processors()?, standard_switchers()?)
}

/// The standard foundry plus the `prompt` processor backed by `client`
pub fn chat_foundry(client: Arc<dyn ChatClient>) -> Result<Foundry, RegistryError> {
    let mut processors = standard_processors()?;
    processors.push(prompt_processor(client)?);
    Foundry::register(processors, standard_switchers()?)
}
