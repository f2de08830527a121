//! Blueprint seam and the [`Engine`] facade
//!
//! A blueprint turns an order into an alignment, typically by asking a
//! language model to plan against [`Foundry::manifest`]. The engine never
//! trusts what comes back: every drafted alignment is revalidated before it
//! runs.

use crate::config::OperateConfig;
use crate::error::{Fault, Result};
use crate::foundry::Foundry;
use crate::interpreter::{Operator, RunReport};
use crate::medium::Medium;
use crate::model::{Alignment, Order, OutputRecord};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Produces an alignment for an order
#[async_trait]
pub trait Blueprint: Send + Sync + fmt::Debug {
    /// Plan an alignment for `order` using the apparatus in `foundry`
    async fn draft(&self, foundry: &Foundry, order: &Order) -> anyhow::Result<Alignment>;
}

/// Always returns the same alignment
#[derive(Debug, Clone)]
pub struct StaticBlueprint {
    alignment: Alignment,
}

impl StaticBlueprint {
    /// Blueprint that ignores the order
    pub fn new(alignment: Alignment) -> Self {
        Self { alignment }
    }

    /// Replay an alignment saved as JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(Alignment::from_json(json)?))
    }
}

#[async_trait]
impl Blueprint for StaticBlueprint {
    async fn draft(&self, _foundry: &Foundry, _order: &Order) -> anyhow::Result<Alignment> {
        Ok(self.alignment.clone())
    }
}

/// Order in, output record out: draft, validate, operate
#[derive(Clone)]
pub struct Engine {
    foundry: Arc<Foundry>,
    blueprint: Arc<dyn Blueprint>,
    config: OperateConfig,
    medium: Option<Arc<dyn Medium>>,
}

impl Engine {
    /// Engine with default limits and no medium
    pub fn new(foundry: Arc<Foundry>, blueprint: Arc<dyn Blueprint>) -> Self {
        Self {
            foundry,
            blueprint,
            config: OperateConfig::default(),
            medium: None,
        }
    }

    /// Replace the run limits
    pub fn with_config(mut self, config: OperateConfig) -> Self {
        self.config = config;
        self
    }

    /// Record every step of every run into `medium`
    pub fn with_medium(mut self, medium: Arc<dyn Medium>) -> Self {
        self.medium = Some(medium);
        self
    }

    /// The shared foundry
    pub fn foundry(&self) -> &Arc<Foundry> {
        &self.foundry
    }

    /// Ask the blueprint for an alignment and validate it
    pub async fn draft(&self, order: &Order) -> Result<Alignment> {
        let alignment = self
            .blueprint
            .draft(&self.foundry, order)
            .await
            .map_err(Fault::Blueprint)?;

        alignment.validate(&self.foundry)?;

        tracing::debug!(
            operations = alignment.len(),
            apparatus = ?alignment.referenced_apparatus(),
            "Alignment drafted"
        );

        Ok(alignment)
    }

    /// Fulfil an order end to end
    pub async fn fulfil(&self, order: Order) -> Result<OutputRecord> {
        self.fulfil_with(order, CancellationToken::new()).await
    }

    /// Fulfil an order, stopping early if `cancel` fires
    pub async fn fulfil_with(
        &self,
        order: Order,
        cancel: CancellationToken,
    ) -> Result<OutputRecord> {
        self.fulfil_report(order, cancel).await?.into_outcome()
    }

    /// Fulfil an order and keep the run diagnostics
    ///
    /// # Errors
    ///
    /// Returns `Err` only when drafting fails; run faults live in the report.
    pub async fn fulfil_report(
        &self,
        order: Order,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let alignment = match self.draft(&order).await {
            Ok(alignment) => alignment,
            Err(fault) => {
                tracing::warn!(kind = ?fault.kind(), error = %fault, "Drafting failed");
                return Err(fault);
            }
        };

        let mut operator = Operator::new(&self.foundry)
            .with_config(self.config.clone())
            .with_cancellation(cancel);
        if let Some(medium) = &self.medium {
            operator = operator.with_medium(Arc::clone(medium));
        }

        Ok(operator.run(&alignment, order).await)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("foundry", &self.foundry.len())
            .field("blueprint", &self.blueprint)
            .field("config", &self.config)
            .field("medium", &self.medium.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;
    use crate::foundry::Processor;
    use crate::model::{record, Egress, Ingress, Process, Record, Value, VirtualType};

    fn foundry() -> Arc<Foundry> {
        let reverse = Processor::builder()
            .name("reverse")
            .input("text", VirtualType::text("text to reverse"))
            .output("text", VirtualType::text("reversed text"))
            .handler(|input: Record| async move {
                let text: String = input["text"].text().unwrap_or_default().chars().rev().collect();
                Ok(record([("text", text)]))
            })
            .build()
            .unwrap();
        Arc::new(Foundry::register(vec![reverse], vec![]).unwrap())
    }

    fn reversing() -> Alignment {
        Alignment::default()
            .then(Ingress::new("prompt", "flip"))
            .then(
                Process::new("flip", "reverse", "done")
                    .input("text", "prompt")
                    .output("text", "flipped"),
            )
            .then(Egress::new("done").field("result", "flipped"))
    }

    /// Plans a single step with whichever apparatus the foundry lists first
    #[derive(Debug)]
    struct FirstApparatus;

    #[async_trait]
    impl Blueprint for FirstApparatus {
        async fn draft(&self, foundry: &Foundry, _order: &Order) -> anyhow::Result<Alignment> {
            let name = foundry
                .names()
                .next()
                .ok_or_else(|| anyhow::anyhow!("empty foundry"))?;
            Ok(Alignment::default()
                .then(Ingress::new("prompt", "only"))
                .then(
                    Process::new("only", name, "done")
                        .input("text", "prompt")
                        .output("text", "out"),
                )
                .then(Egress::new("done").field("result", "out")))
        }
    }

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl Blueprint for Unreachable {
        async fn draft(&self, _foundry: &Foundry, _order: &Order) -> anyhow::Result<Alignment> {
            Err(anyhow::anyhow!("model provider unreachable"))
        }
    }

    #[tokio::test]
    async fn test_engine_fulfils_with_static_blueprint() {
        let engine = Engine::new(foundry(), Arc::new(StaticBlueprint::new(reversing())));
        let output = engine.fulfil(Order::new("abc")).await.unwrap();
        assert_eq!(output.get("result"), Some(&Value::from("cba")));
    }

    #[tokio::test]
    async fn test_engine_plans_from_foundry() {
        let engine = Engine::new(foundry(), Arc::new(FirstApparatus));
        let output = engine.fulfil(Order::new("stressed")).await.unwrap();
        assert_eq!(output.get("result"), Some(&Value::from("desserts")));
    }

    #[tokio::test]
    async fn test_blueprint_error_surfaces_as_fault() {
        let engine = Engine::new(foundry(), Arc::new(Unreachable));
        let fault = engine.fulfil(Order::new("abc")).await.unwrap_err();

        assert_eq!(fault.kind(), FaultKind::Blueprint);
        assert!(fault.to_string().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_drafted_alignment_is_revalidated() {
        let broken = Alignment::default()
            .then(Ingress::new("prompt", "flip"))
            .then(Process::new("flip", "rotate", "done"))
            .then(Egress::new("done"));
        let engine = Engine::new(foundry(), Arc::new(StaticBlueprint::new(broken)));

        let fault = engine.draft(&Order::new("abc")).await.unwrap_err();
        assert_eq!(fault.kind(), FaultKind::UnknownApparatus);
    }

    #[tokio::test]
    async fn test_static_blueprint_from_json() {
        let json = reversing().to_json_pretty().unwrap();
        let blueprint = StaticBlueprint::from_json(&json).unwrap();

        let engine = Engine::new(foundry(), Arc::new(blueprint))
            .with_config(OperateConfig::new().with_max_steps(3));
        let report = engine
            .fulfil_report(Order::new("xy"), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.steps, 3);
    }
}
