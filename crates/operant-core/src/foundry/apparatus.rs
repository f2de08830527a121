//! Apparatus - named callables an alignment can invoke
//!
//! Two kinds exist: a [`Processor`] transforms a record into a record, a
//! [`Switcher`] evaluates a record into a verdict plus a record. Both carry
//! declared contracts (var → [`VirtualType`]) which are advisory except for
//! their `optional` flags.
//!
//! Callables are async trait objects. Any `Fn(Record) -> Future` closure can be
//! registered directly through the builders.

use crate::error::RegistryError;
use crate::model::{Record, Var, VirtualType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Declared var types of one side of an apparatus
pub type Contract = BTreeMap<Var, VirtualType>;

/// Processor callable
#[async_trait]
pub trait ProcessFn: Send + Sync {
    /// Transform `input` into the output record
    async fn process(&self, input: Record) -> anyhow::Result<Record>;
}

#[async_trait]
impl<F, Fut> ProcessFn for F
where
    F: Fn(Record) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Record>> + Send + 'static,
{
    async fn process(&self, input: Record) -> anyhow::Result<Record> {
        (self)(input).await
    }
}

/// Switcher callable: returns the verdict and the record for the taken branch
#[async_trait]
pub trait CheckFn: Send + Sync {
    /// Decide the branch for `input`
    async fn check(&self, input: Record) -> anyhow::Result<(bool, Record)>;
}

#[async_trait]
impl<F, Fut> CheckFn for F
where
    F: Fn(Record) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<(bool, Record)>> + Send + 'static,
{
    async fn check(&self, input: Record) -> anyhow::Result<(bool, Record)> {
        (self)(input).await
    }
}

/// Kind of an apparatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApparatusKind {
    /// Called by process nodes
    Processor,
    /// Called by switch nodes
    Switcher,
}

impl fmt::Display for ApparatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApparatusKind::Processor => write!(f, "processor"),
            ApparatusKind::Switcher => write!(f, "switcher"),
        }
    }
}

/// A data transform
#[derive(Clone)]
pub struct Processor {
    name: String,
    description: String,
    input: Contract,
    output: Contract,
    callable: Arc<dyn ProcessFn>,
}

impl Processor {
    /// Start building a processor
    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::default()
    }

    /// Registry name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable purpose, shown to planners
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared input vars
    pub fn input(&self) -> &Contract {
        &self.input
    }

    /// Declared output vars
    pub fn output(&self) -> &Contract {
        &self.output
    }

    /// Invoke the underlying callable
    pub async fn process(&self, input: Record) -> anyhow::Result<Record> {
        self.callable.process(input).await
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// A boolean-branching predicate
#[derive(Clone)]
pub struct Switcher {
    name: String,
    description: String,
    input: Contract,
    output_when_true: Contract,
    output_when_false: Contract,
    callable: Arc<dyn CheckFn>,
}

impl Switcher {
    /// Start building a switcher
    pub fn builder() -> SwitcherBuilder {
        SwitcherBuilder::default()
    }

    /// Registry name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable purpose, shown to planners
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared input vars
    pub fn input(&self) -> &Contract {
        &self.input
    }

    /// Vars produced when the verdict is true
    pub fn output_when_true(&self) -> &Contract {
        &self.output_when_true
    }

    /// Vars produced when the verdict is false
    pub fn output_when_false(&self) -> &Contract {
        &self.output_when_false
    }

    /// Output contract of the branch picked by `verdict`
    pub fn output_for(&self, verdict: bool) -> &Contract {
        if verdict {
            &self.output_when_true
        } else {
            &self.output_when_false
        }
    }

    /// Invoke the underlying predicate
    pub async fn check(&self, input: Record) -> anyhow::Result<(bool, Record)> {
        self.callable.check(input).await
    }
}

impl fmt::Debug for Switcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Switcher")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output_when_true", &self.output_when_true)
            .field("output_when_false", &self.output_when_false)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Processor`]
#[derive(Default)]
pub struct ProcessorBuilder {
    name: Option<String>,
    description: String,
    input: Option<Contract>,
    output: Option<Contract>,
    callable: Option<Arc<dyn ProcessFn>>,
}

impl ProcessorBuilder {
    /// Set the registry name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description shown to planners
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare an input var
    pub fn input(mut self, var: impl Into<Var>, vtype: VirtualType) -> Self {
        self.input
            .get_or_insert_with(Contract::new)
            .insert(var.into(), vtype);
        self
    }

    /// Declare the whole input contract at once (may be empty)
    pub fn input_contract(mut self, contract: Contract) -> Self {
        self.input = Some(contract);
        self
    }

    /// Declare an output var
    pub fn output(mut self, var: impl Into<Var>, vtype: VirtualType) -> Self {
        self.output
            .get_or_insert_with(Contract::new)
            .insert(var.into(), vtype);
        self
    }

    /// Declare the whole output contract at once (may be empty)
    pub fn output_contract(mut self, contract: Contract) -> Self {
        self.output = Some(contract);
        self
    }

    /// Use an async closure as the callable
    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Record>> + Send + 'static,
    {
        self.callable = Some(Arc::new(f));
        self
    }

    /// Use any [`ProcessFn`] implementation as the callable
    pub fn callable(mut self, callable: Arc<dyn ProcessFn>) -> Self {
        self.callable = Some(callable);
        self
    }

    /// Build the processor
    ///
    /// # Errors
    ///
    /// Returns `Err` if the name, either contract or the callable is missing,
    /// or if a contract declares an empty var name.
    pub fn build(self) -> Result<Processor, RegistryError> {
        let name = required_name(self.name)?;
        let input = required_contract(&name, self.input, "input")?;
        let output = required_contract(&name, self.output, "output")?;
        let callable = self
            .callable
            .ok_or_else(|| RegistryError::MissingCallable {
                apparatus: name.clone(),
            })?;

        Ok(Processor {
            name,
            description: self.description,
            input,
            output,
            callable,
        })
    }
}

impl fmt::Debug for ProcessorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorBuilder")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("callable", &self.callable.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Switcher`]
#[derive(Default)]
pub struct SwitcherBuilder {
    name: Option<String>,
    description: String,
    input: Option<Contract>,
    output_when_true: Option<Contract>,
    output_when_false: Option<Contract>,
    callable: Option<Arc<dyn CheckFn>>,
}

impl SwitcherBuilder {
    /// Set the registry name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description shown to planners
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare an input var
    pub fn input(mut self, var: impl Into<Var>, vtype: VirtualType) -> Self {
        self.input
            .get_or_insert_with(Contract::new)
            .insert(var.into(), vtype);
        self
    }

    /// Declare the whole input contract at once (may be empty)
    pub fn input_contract(mut self, contract: Contract) -> Self {
        self.input = Some(contract);
        self
    }

    /// Declare a var produced on the true branch
    pub fn output_when_true(mut self, var: impl Into<Var>, vtype: VirtualType) -> Self {
        self.output_when_true
            .get_or_insert_with(Contract::new)
            .insert(var.into(), vtype);
        self
    }

    /// Declare the whole true-branch contract at once
    pub fn output_when_true_contract(mut self, contract: Contract) -> Self {
        self.output_when_true = Some(contract);
        self
    }

    /// Declare a var produced on the false branch
    pub fn output_when_false(mut self, var: impl Into<Var>, vtype: VirtualType) -> Self {
        self.output_when_false
            .get_or_insert_with(Contract::new)
            .insert(var.into(), vtype);
        self
    }

    /// Declare the whole false-branch contract at once
    pub fn output_when_false_contract(mut self, contract: Contract) -> Self {
        self.output_when_false = Some(contract);
        self
    }

    /// Use an async closure as the predicate
    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<(bool, Record)>> + Send + 'static,
    {
        self.callable = Some(Arc::new(f));
        self
    }

    /// Use any [`CheckFn`] implementation as the callable
    pub fn callable(mut self, callable: Arc<dyn CheckFn>) -> Self {
        self.callable = Some(callable);
        self
    }

    /// Build the switcher
    ///
    /// # Errors
    ///
    /// Returns `Err` if the name, any contract or the callable is missing.
    pub fn build(self) -> Result<Switcher, RegistryError> {
        let name = required_name(self.name)?;
        let input = required_contract(&name, self.input, "input")?;
        let output_when_true = required_contract(&name, self.output_when_true, "true-branch output")?;
        let output_when_false =
            required_contract(&name, self.output_when_false, "false-branch output")?;
        let callable = self
            .callable
            .ok_or_else(|| RegistryError::MissingCallable {
                apparatus: name.clone(),
            })?;

        Ok(Switcher {
            name,
            description: self.description,
            input,
            output_when_true,
            output_when_false,
            callable,
        })
    }
}

impl fmt::Debug for SwitcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitcherBuilder")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output_when_true", &self.output_when_true)
            .field("output_when_false", &self.output_when_false)
            .field("callable", &self.callable.is_some())
            .finish_non_exhaustive()
    }
}

fn required_name(name: Option<String>) -> Result<String, RegistryError> {
    match name {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => Err(RegistryError::MissingName),
    }
}

fn required_contract(
    apparatus: &str,
    contract: Option<Contract>,
    side: &'static str,
) -> Result<Contract, RegistryError> {
    let contract = contract.ok_or_else(|| RegistryError::MissingContract {
        apparatus: apparatus.to_string(),
        contract: side,
    })?;

    if contract.keys().any(|var| var.trim().is_empty()) {
        return Err(RegistryError::EmptyVar {
            apparatus: apparatus.to_string(),
        });
    }

    Ok(contract)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record;

    struct Shout;

    #[async_trait]
    impl ProcessFn for Shout {
        async fn process(&self, input: Record) -> anyhow::Result<Record> {
            let text = input
                .get("text")
                .and_then(|p| p.text())
                .unwrap_or_default()
                .to_uppercase();
            Ok(record([("text", text)]))
        }
    }

    #[tokio::test]
    async fn test_processor_from_trait_object() {
        let processor = Processor::builder()
            .name("shout")
            .input("text", VirtualType::text("to shout"))
            .output("text", VirtualType::text("shouted"))
            .callable(Arc::new(Shout))
            .build()
            .unwrap();

        let out = processor.process(record([("text", "hey")])).await.unwrap();
        assert_eq!(out["text"].text(), Some("HEY"));
    }

    #[tokio::test]
    async fn test_switcher_from_closure() {
        let switcher = Switcher::builder()
            .name("non_empty")
            .input("text", VirtualType::text("checked"))
            .output_when_true("text", VirtualType::text("passed through"))
            .output_when_false_contract(Contract::new())
            .handler(|input: Record| async move {
                let pass = input.get("text").and_then(|p| p.text()).is_some_and(|t| !t.is_empty());
                Ok((pass, input))
            })
            .build()
            .unwrap();

        let (verdict, out) = switcher.check(record([("text", "x")])).await.unwrap();
        assert!(verdict);
        assert_eq!(out.len(), 1);
        assert!(switcher.output_for(false).is_empty());
    }

    #[test]
    fn test_builder_requires_every_part() {
        let missing_name = Processor::builder()
            .input_contract(Contract::new())
            .output_contract(Contract::new())
            .handler(|r| async move { Ok(r) })
            .build();
        assert_eq!(missing_name.unwrap_err(), RegistryError::MissingName);

        let missing_output = Processor::builder()
            .name("half")
            .input_contract(Contract::new())
            .handler(|r| async move { Ok(r) })
            .build();
        assert_eq!(
            missing_output.unwrap_err(),
            RegistryError::MissingContract {
                apparatus: "half".to_string(),
                contract: "output"
            }
        );

        let missing_callable = Switcher::builder()
            .name("mute")
            .input_contract(Contract::new())
            .output_when_true_contract(Contract::new())
            .output_when_false_contract(Contract::new())
            .build();
        assert_eq!(
            missing_callable.unwrap_err(),
            RegistryError::MissingCallable {
                apparatus: "mute".to_string()
            }
        );
    }

    #[test]
    fn test_empty_var_rejected() {
        let result = Processor::builder()
            .name("blank")
            .input(" ", VirtualType::text("nameless"))
            .output_contract(Contract::new())
            .handler(|r| async move { Ok(r) })
            .build();
        assert_eq!(
            result.unwrap_err(),
            RegistryError::EmptyVar {
                apparatus: "blank".to_string()
            }
        );
    }

    #[test]
    fn test_builder_debug_hides_callable() {
        let builder = Processor::builder()
            .name("half")
            .handler(|r| async move { Ok(r) });
        let rendered = format!("{builder:?}");
        assert!(rendered.contains("\"half\""));
        assert!(rendered.contains("callable: true"));

        let rendered = format!("{:?}", Switcher::builder().name("gate"));
        assert!(rendered.contains("callable: false"));
    }
}
