//! Text switchers
//!
//! Each switcher passes its `text` input through on the branch where it is
//! still meaningful, so an alignment can keep working with it downstream.

use crate::text::text_var;
use operant_core::error::RegistryError;
use operant_core::foundry::{Contract, Switcher};
use operant_core::model::{record, Record, VirtualType};

/// True when `text` is empty or whitespace only
pub fn is_empty() -> Result<Switcher, RegistryError> {
    Switcher::builder()
        .name("is_empty")
        .description("Check whether a text is blank")
        .input("text", VirtualType::text("text to check"))
        .output_when_true_contract(Contract::new())
        .output_when_false("text", VirtualType::text("the non-blank text"))
        .handler(|input: Record| async move {
            let text = text_var(&input, "text")?;
            if text.trim().is_empty() {
                Ok((true, Record::new()))
            } else {
                Ok((false, record([("text", text)])))
            }
        })
        .build()
}

/// True when `text` contains `needle`
pub fn contains() -> Result<Switcher, RegistryError> {
    Switcher::builder()
        .name("contains")
        .description("Check whether a text contains a substring")
        .input("text", VirtualType::text("text to search"))
        .input("needle", VirtualType::text("substring to look for"))
        .output_when_true("text", VirtualType::text("the matching text"))
        .output_when_false("text", VirtualType::text("the non-matching text"))
        .handler(|input: Record| async move {
            let text = text_var(&input, "text")?;
            let needle = text_var(&input, "needle")?;
            let found = text.contains(needle.as_str());
            Ok((found, record([("text", text)])))
        })
        .build()
}

/// Switcher named `name` that is true when `text` has more than `limit` characters
pub fn longer_than(name: impl Into<String>, limit: usize) -> Result<Switcher, RegistryError> {
    Switcher::builder()
        .name(name)
        .description(format!("Check whether a text is longer than {limit} characters"))
        .input("text", VirtualType::text("text to measure"))
        .output_when_true("text", VirtualType::text("the long text"))
        .output_when_false("text", VirtualType::text("the short text"))
        .handler(move |input: Record| async move {
            let text = text_var(&input, "text")?;
            let long = text.chars().count() > limit;
            Ok((long, record([("text", text)])))
        })
        .build()
}
