//! Interpreter - runs an alignment against a foundry
//!
//! A run is a small state machine. It starts at the ingress, visits one node
//! per step and ends either at an egress with an [`OutputRecord`] or with a
//! [`Fault`]. Runs are strictly sequential; any number of them may share one
//! [`Foundry`].
//!
//! Between two nodes the interpreter checks, in order: cancellation, the
//! wall-clock budget, the step ceiling. Apparatus calls are also raced against
//! cancellation and the budget so a hung callable cannot stall a run forever.
//!
//! A fault stops the run immediately. Registers written before the fault are
//! kept and returned in the [`RunReport`].

mod context;

pub use context::OperationContext;

use crate::config::OperateConfig;
use crate::env::Env;
use crate::error::{Fault, Result, StructuralFault};
use crate::foundry::Foundry;
use crate::medium::{Medium, NodeRef, Step};
use crate::model::{
    Alignment, Egress, Ingress, Operation, Order, OutputRecord, Param, Process, Record, Switch,
    VirtualType, INGRESS_LABEL,
};
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Where a node sends the run next
enum Transition {
    Next(usize),
    Done(OutputRecord),
}

/// What a node did, for the medium
struct Visit {
    inputs: Record,
    outputs: Record,
    branch: Option<bool>,
    transition: Transition,
}

/// Everything known about a finished run
#[derive(Debug)]
pub struct RunReport {
    /// Identifier shared by every step of this run
    pub run_id: Uuid,

    /// The output record, or the fault that ended the run
    pub outcome: Result<OutputRecord>,

    /// Registers as they stood when the run ended, fault or not
    pub env: Env,

    /// Nodes that completed, in order
    pub visited: Vec<NodeRef>,

    /// Node visits admitted by the step ceiling, never more than `max_steps`
    pub steps: u64,

    /// Wall-clock time from start to outcome
    pub elapsed: Duration,
}

impl RunReport {
    /// True when the run reached an egress
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Drop the diagnostics and keep the outcome
    pub fn into_outcome(self) -> Result<OutputRecord> {
        self.outcome
    }
}

/// Executes alignments against a borrowed foundry
pub struct Operator<'f> {
    foundry: &'f Foundry,
    config: OperateConfig,
    medium: Option<Arc<dyn Medium>>,
    cancel: CancellationToken,
}

impl<'f> Operator<'f> {
    /// Operator with default limits, no medium and its own cancellation token
    pub fn new(foundry: &'f Foundry) -> Self {
        Self {
            foundry,
            config: OperateConfig::default(),
            medium: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the run limits
    pub fn with_config(mut self, config: OperateConfig) -> Self {
        self.config = config;
        self
    }

    /// Record every step into `medium`
    pub fn with_medium(mut self, medium: Arc<dyn Medium>) -> Self {
        self.medium = Some(medium);
        self
    }

    /// Cancel runs of this operator through `token`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that cancels runs of this operator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Limits applied to every run
    pub fn config(&self) -> &OperateConfig {
        &self.config
    }

    /// Run `alignment` on `order` and return its output record or fault
    pub async fn operate(&self, alignment: &Alignment, order: Order) -> Result<OutputRecord> {
        self.run(alignment, order).await.into_outcome()
    }

    /// Run `alignment` on `order` and keep the diagnostics
    pub async fn run(&self, alignment: &Alignment, order: Order) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("operate", %run_id, nodes = alignment.len());

        async move {
            let mut ctx = OperationContext::new(run_id, self.foundry, alignment);

            let outcome = match self.preflight(alignment) {
                Ok(start) => self.drive(&mut ctx, start, &order).await,
                Err(fault) => Err(fault),
            };

            match &outcome {
                Ok(output) => tracing::info!(
                    steps = ctx.step_count,
                    fields = output.len(),
                    "Run succeeded"
                ),
                Err(fault) => tracing::warn!(
                    kind = ?fault.kind(),
                    node = fault.node().unwrap_or("-"),
                    steps = ctx.step_count,
                    error = %fault,
                    "Run faulted"
                ),
            }

            RunReport {
                run_id,
                outcome,
                elapsed: ctx.started.elapsed(),
                steps: ctx.step_count,
                visited: ctx.visited,
                env: ctx.env,
            }
        }
        .instrument(span)
        .await
    }

    /// Validation done before any register is touched
    fn preflight(&self, alignment: &Alignment) -> Result<usize> {
        self.config.validate()?;
        alignment.validate(self.foundry)?;

        alignment
            .ingress()
            .map(|(position, _)| position)
            .ok_or_else(|| StructuralFault::MissingIngress.into())
    }

    async fn drive(
        &self,
        ctx: &mut OperationContext<'_>,
        start: usize,
        order: &Order,
    ) -> Result<OutputRecord> {
        let mut cursor = start;

        loop {
            let op = ctx.operation(cursor);
            self.checkpoint(ctx, op)?;

            let node = NodeRef::of(op);
            let started_at = Utc::now();

            let visit = match op {
                Operation::Ingress(ingress) => self.ingress(ctx, ingress, order)?,
                Operation::Process(process) => self.process(ctx, process).await?,
                Operation::Switch(switch) => self.switch(ctx, switch).await?,
                Operation::Egress(egress) => self.egress(ctx, egress)?,
            };

            tracing::debug!(
                step = ctx.step_count,
                node = %node,
                branch = ?visit.branch,
                "Transition"
            );
            ctx.visited.push(node.clone());

            self.emit(Step {
                run_id: ctx.run_id,
                index: ctx.step_count,
                node,
                started_at,
                ended_at: Utc::now(),
                inputs: visit.inputs,
                outputs: visit.outputs,
                branch: visit.branch,
            });

            match visit.transition {
                Transition::Next(next) => cursor = next,
                Transition::Done(output) => return Ok(output),
            }
        }
    }

    /// Boundary checks run before every node visit
    ///
    /// The visit that would break the step ceiling is refused, not counted.
    fn checkpoint(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Fault::Cancelled {
                steps: ctx.step_count,
            });
        }

        if let Some(budget) = self.config.timeout() {
            if ctx.started.elapsed() > budget {
                return Err(timeout_fault(ctx.started, budget));
            }
        }

        if ctx.step_count >= self.config.max_steps {
            return Err(Fault::StepLimitExceeded {
                limit: self.config.max_steps,
                node: op.label().to_string(),
            });
        }
        ctx.step_count += 1;

        Ok(())
    }

    fn ingress(
        &self,
        ctx: &mut OperationContext<'_>,
        ingress: &Ingress,
        order: &Order,
    ) -> Result<Visit> {
        let mut bound = Record::new();

        let prompt = Param::new(order.text.clone(), VirtualType::text("order prompt"));
        bound.insert(ingress.prompt_addr.to_string(), prompt.clone());
        ctx.env.write(ingress.prompt_addr.clone(), prompt);

        if order.files.len() > ingress.file_addrs.len() {
            tracing::warn!(
                attached = order.files.len(),
                declared = ingress.file_addrs.len(),
                "Order carries more files than the ingress binds, extras ignored"
            );
        }

        for (address, file) in ingress.file_addrs.iter().zip(&order.files) {
            let param = Param::new(file.clone(), VirtualType::file("order attachment"));
            bound.insert(address.to_string(), param.clone());
            ctx.env.write(address.clone(), param);
        }

        let next = ctx.resolve(INGRESS_LABEL, &ingress.next)?;

        Ok(Visit {
            inputs: Record::new(),
            outputs: bound,
            branch: None,
            transition: Transition::Next(next),
        })
    }

    async fn process(&self, ctx: &mut OperationContext<'_>, process: &Process) -> Result<Visit> {
        let foundry = ctx.foundry;
        let processor = foundry
            .processor(&process.apparatus)
            .ok_or_else(|| Fault::UnknownApparatus {
                node: process.name.clone(),
                apparatus: process.apparatus.clone(),
            })?;

        let input = ctx.gather(&process.name, &process.inputs, processor.input())?;

        let output = self
            .guarded(ctx, processor.process(input.clone()))
            .await?
            .map_err(|source| Fault::ApparatusFailure {
                node: process.name.clone(),
                apparatus: process.apparatus.clone(),
                source,
            })?;

        ctx.scatter(&process.name, &process.outputs, &output, processor.output())?;
        let next = ctx.resolve(&process.name, &process.next)?;

        Ok(Visit {
            inputs: input,
            outputs: output,
            branch: None,
            transition: Transition::Next(next),
        })
    }

    async fn switch(&self, ctx: &mut OperationContext<'_>, switch: &Switch) -> Result<Visit> {
        let foundry = ctx.foundry;
        let switcher = foundry
            .switcher(&switch.apparatus)
            .ok_or_else(|| Fault::UnknownApparatus {
                node: switch.name.clone(),
                apparatus: switch.apparatus.clone(),
            })?;

        let input = ctx.gather(&switch.name, &switch.inputs, switcher.input())?;

        let (verdict, output) = self
            .guarded(ctx, switcher.check(input.clone()))
            .await?
            .map_err(|source| Fault::ApparatusFailure {
                node: switch.name.clone(),
                apparatus: switch.apparatus.clone(),
                source,
            })?;

        let (target, bindings) = switch.branch(verdict);
        ctx.scatter(&switch.name, bindings, &output, switcher.output_for(verdict))?;
        let next = ctx.resolve(&switch.name, target)?;

        Ok(Visit {
            inputs: input,
            outputs: output,
            branch: Some(verdict),
            transition: Transition::Next(next),
        })
    }

    fn egress(&self, ctx: &OperationContext<'_>, egress: &Egress) -> Result<Visit> {
        let mut read = Record::new();
        let mut output = OutputRecord::new();

        for (field, address) in &egress.result {
            let param = ctx.env.read(address).ok_or_else(|| Fault::UnboundRegister {
                node: egress.name.clone(),
                address: address.clone(),
            })?;
            output.insert(field.clone(), param.value.clone());
            read.insert(field.clone(), param.clone());
        }

        Ok(Visit {
            inputs: read,
            outputs: Record::new(),
            branch: None,
            transition: Transition::Done(output),
        })
    }

    /// Race an apparatus call against cancellation and the run budget
    async fn guarded<T>(
        &self,
        ctx: &OperationContext<'_>,
        call: impl Future<Output = T>,
    ) -> Result<T> {
        let budget = self.config.timeout();
        let deadline = budget.map(|budget| ctx.started + budget);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Fault::Cancelled { steps: ctx.step_count }),
            _ = reached(deadline) => Err(timeout_fault(ctx.started, budget.unwrap_or_default())),
            out = call => Ok(out),
        }
    }

    fn emit(&self, step: Step) {
        let Some(medium) = &self.medium else { return };

        if let Err(e) = medium.record(&step) {
            tracing::warn!(
                step = step.index,
                node = %step.node,
                error = %e,
                "Medium failed to record step"
            );
        }
    }
}

impl fmt::Debug for Operator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("foundry", &self.foundry.len())
            .field("config", &self.config)
            .field("medium", &self.medium.is_some())
            .finish()
    }
}

async fn reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn timeout_fault(started: Instant, budget: Duration) -> Fault {
    Fault::TimeoutExceeded {
        elapsed_ms: started.elapsed().as_millis() as u64,
        budget_ms: budget.as_millis() as u64,
    }
}
