//! In-process executor for the demo revenue model.
//!
//! Lets the demo simulation run end to end without a workflow service.
//! Answers either synchronously or as a background job that completes after a
//! fixed number of status checks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};
use sf_core::{ExecutionId, NodeId, coerce_number};
use sf_exec::{
    ExecError, ExecResult, ExecutionRequest, ExecutionService, ExecutionStatus, StatusResponse,
    TriggerResponse,
};
use sf_project::Simulation;
use tracing::debug;

use crate::error::{AppError, AppResult};

pub const REVENUE_NODE: &str = "calc-revenue";
pub const COSTS_NODE: &str = "calc-costs";
pub const PROFIT_NODE: &str = "calc-profit";

/// Outputs of the revenue model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevenueModel {
    pub revenue: f64,
    pub costs: f64,
    pub profit: f64,
    pub margin: f64,
    pub annual_revenue: f64,
    pub projected_revenue: f64,
}

impl RevenueModel {
    /// `growth_pct` and `cost_ratio_pct` are percentages.
    pub fn compute(price: f64, volume: f64, growth_pct: f64, cost_ratio_pct: f64) -> Self {
        let revenue = price * volume;
        let costs = revenue * cost_ratio_pct / 100.0;
        let profit = revenue - costs;
        let margin = if revenue == 0.0 {
            0.0
        } else {
            round2(profit / revenue * 100.0)
        };
        Self {
            revenue,
            costs,
            profit,
            margin,
            annual_revenue: revenue * 12.0,
            projected_revenue: revenue * (1.0 + growth_pct / 100.0),
        }
    }

    /// Raw per-node result, shaped like a workflow service answer.
    pub fn to_node_results(&self) -> Value {
        json!({
            REVENUE_NODE: {"outputData": {
                "revenue": self.revenue,
                "annualRevenue": self.annual_revenue,
                "projectedRevenue": self.projected_revenue,
            }},
            COSTS_NODE: {"outputData": {"costs": self.costs}},
            PROFIT_NODE: {"outputData": {"profit": self.profit, "margin": self.margin}},
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Input nodes feeding the model, resolved from a simulation's parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoBindings {
    pub price: NodeId,
    pub volume: NodeId,
    pub growth: NodeId,
    pub cost_ratio: NodeId,
}

impl DemoBindings {
    /// Resolve each model input by parameter variable name.
    pub fn from_simulation(simulation: &Simulation) -> AppResult<Self> {
        let node = |variable: &str| {
            simulation
                .parameters
                .iter()
                .find(|p| p.variable_name == variable)
                .map(|p| p.bound_node_id.clone())
                .ok_or_else(|| AppError::ParameterNotFound(variable.to_string()))
        };
        Ok(Self {
            price: node("price")?,
            volume: node("volume")?,
            growth: node("growth")?,
            cost_ratio: node("costRatio")?,
        })
    }

    fn evaluate(&self, request: &ExecutionRequest) -> ExecResult<RevenueModel> {
        let input = |node: &str| -> ExecResult<f64> {
            let value = request.inputs.get(node).ok_or_else(|| ExecError::Status {
                code: 400,
                body: format!("missing input for node '{}'", node),
            })?;
            coerce_number(node, value).map_err(|e| ExecError::Status {
                code: 400,
                body: e.to_string(),
            })
        };
        Ok(RevenueModel::compute(
            input(&self.price)?,
            input(&self.volume)?,
            input(&self.growth)?,
            input(&self.cost_ratio)?,
        ))
    }
}

#[derive(Debug)]
struct DemoJob {
    checks_left: u32,
    total_checks: u32,
    result: Value,
    cancelled: bool,
}

/// Deterministic [`ExecutionService`] computing [`RevenueModel`].
#[derive(Debug)]
pub struct DemoExecutionService {
    bindings: DemoBindings,
    background_checks: Option<u32>,
    jobs: Mutex<HashMap<ExecutionId, DemoJob>>,
    next_job: AtomicU64,
}

impl DemoExecutionService {
    pub fn new(bindings: DemoBindings) -> Self {
        Self {
            bindings,
            background_checks: None,
            jobs: Mutex::new(HashMap::new()),
            next_job: AtomicU64::new(1),
        }
    }

    pub fn for_simulation(simulation: &Simulation) -> AppResult<Self> {
        Ok(Self::new(DemoBindings::from_simulation(simulation)?))
    }

    /// Answer with background jobs (when allowed) that complete on the
    /// `checks`-th status request.
    pub fn in_background(mut self, checks: u32) -> Self {
        self.background_checks = Some(checks.max(1));
        self
    }
}

impl ExecutionService for DemoExecutionService {
    fn trigger(&self, request: &ExecutionRequest) -> ExecResult<TriggerResponse> {
        let result = self.bindings.evaluate(request)?.to_node_results();

        let Some(checks) = self.background_checks.filter(|_| request.background_allowed) else {
            return Ok(TriggerResponse::Immediate(result));
        };

        let execution_id = format!("demo-{}", self.next_job.fetch_add(1, Ordering::Relaxed));
        debug!(execution_id = execution_id.as_str(), checks, "queued demo job");
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.insert(
            execution_id.clone(),
            DemoJob {
                checks_left: checks,
                total_checks: checks,
                result,
                cancelled: false,
            },
        );
        Ok(TriggerResponse::Background { execution_id })
    }

    fn status(&self, execution_id: &str) -> ExecResult<StatusResponse> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let job = jobs.get_mut(execution_id).ok_or_else(|| ExecError::Status {
            code: 404,
            body: format!("execution '{}' not found", execution_id),
        })?;

        if job.cancelled {
            jobs.remove(execution_id);
            return Ok(StatusResponse::from_value(json!({
                "status": ExecutionStatus::Cancelled.as_str(),
            })));
        }

        job.checks_left = job.checks_left.saturating_sub(1);
        if job.checks_left > 0 {
            let done = job.total_checks - job.checks_left;
            return Ok(StatusResponse::from_value(json!({
                "status": ExecutionStatus::Running.as_str(),
                "progress": {
                    "totalNodes": job.total_checks,
                    "completedNodes": done,
                    "failedNodes": 0,
                    "percentage": done * 100 / job.total_checks,
                },
            })));
        }

        // Terminal answers are final; the job is forgotten.
        let result = std::mem::take(&mut job.result);
        jobs.remove(execution_id);
        Ok(StatusResponse::from_value(json!({
            "status": ExecutionStatus::Completed.as_str(),
            "nodeResults": result,
        })))
    }

    fn cancel(&self, execution_id: &str) -> ExecResult<()> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        match jobs.get_mut(execution_id) {
            Some(job) => {
                job.cancelled = true;
                Ok(())
            }
            None => Err(ExecError::Status {
                code: 404,
                body: format!("execution '{}' not found", execution_id),
            }),
        }
    }
}
