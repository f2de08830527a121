//! Text processors

use anyhow::Context;
use operant_core::error::RegistryError;
use operant_core::foundry::Processor;
use operant_core::model::{record, Param, Record, VirtualType};

/// Read a text var, failing when it is absent or not text
pub(crate) fn text_var(input: &Record, var: &str) -> anyhow::Result<String> {
    input
        .get(var)
        .and_then(Param::text)
        .map(str::to_string)
        .with_context(|| format!("expected text in '{var}'"))
}

/// Single `text` in, single `text` out
fn text_map(
    name: &str,
    description: &str,
    transform: fn(&str) -> String,
) -> Result<Processor, RegistryError> {
    Processor::builder()
        .name(name)
        .description(description)
        .input("text", VirtualType::text("text to transform"))
        .output("text", VirtualType::text("transformed text"))
        .handler(move |input: Record| async move {
            let text = text_var(&input, "text")?;
            Ok(record([("text", transform(&text))]))
        })
        .build()
}

pub fn uppercase() -> Result<Processor, RegistryError> {
    text_map("uppercase", "Convert text to upper case", str::to_uppercase)
}

pub fn lowercase() -> Result<Processor, RegistryError> {
    text_map("lowercase", "Convert text to lower case", str::to_lowercase)
}

pub fn trim() -> Result<Processor, RegistryError> {
    text_map("trim", "Strip leading and trailing whitespace", |s| {
        s.trim().to_string()
    })
}

/// Join `left` and `right`, with an optional `separator` between them
pub fn concat() -> Result<Processor, RegistryError> {
    Processor::builder()
        .name("concat")
        .description("Join two texts, optionally with a separator")
        .input("left", VirtualType::text("leading text"))
        .input("right", VirtualType::text("trailing text"))
        .input("separator", VirtualType::text("placed between the two").optional())
        .output("text", VirtualType::text("joined text"))
        .handler(|input: Record| async move {
            let left = text_var(&input, "left")?;
            let right = text_var(&input, "right")?;
            let separator = input.get("separator").and_then(Param::text).unwrap_or("");
            Ok(record([("text", format!("{left}{separator}{right}"))]))
        })
        .build()
}

/// Character count of `text`
pub fn length() -> Result<Processor, RegistryError> {
    Processor::builder()
        .name("length")
        .description("Count the characters of a text")
        .input("text", VirtualType::text("text to measure"))
        .output("length", VirtualType::integer("number of characters"))
        .handler(|input: Record| async move {
            let count = text_var(&input, "text")?.chars().count();
            Ok(record([("length", i64::try_from(count)?)]))
        })
        .build()
}
