use tracing::{info, info_span};

use crate::config::{PipelineConfig, RunSettings};
use crate::error::Result;
use crate::result_table::ResultTable;
use crate::scale::ObservedScales;
use crate::step::{ComputationStep, StepContext, StepInputs, StepReport};
use crate::steps::standard_steps;

/// Tables a run reads from. None of them is modified by the run.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub forecast: ResultTable,
    pub history: ResultTable,
    pub reference: ResultTable,
    pub observed_scales: ObservedScales,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One live row per key.
    pub table: ResultTable,
    pub reports: Vec<StepReport>,
}

impl PipelineOutput {
    pub fn report(&self, step: &str) -> Option<&StepReport> {
        self.reports.iter().find(|report| report.step == step)
    }
}

pub struct Pipeline {
    steps: Vec<Box<dyn ComputationStep>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn ComputationStep>>) -> Self {
        Self { steps }
    }

    pub fn standard(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(standard_steps(config)?))
    }

    pub fn step_codes(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.code_identifier()).collect()
    }

    /// Runs the steps in order. Each step sees the results of every earlier
    /// step; its fragment is merged into a fresh snapshot for the next one.
    pub fn run(&self, settings: &RunSettings, inputs: &PipelineInputs) -> Result<PipelineOutput> {
        let mut snapshot = ResultTable::new();
        let mut reports = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let code = step.code_identifier();
            let span = info_span!(
                "step",
                step = code,
                version = step.version(),
                country = %settings.country
            );
            let _entered = span.enter();

            let step_inputs = StepInputs {
                forecast: &inputs.forecast,
                history: &inputs.history,
                reference: &inputs.reference,
                accumulated: &snapshot,
                observed_scales: &inputs.observed_scales,
            };
            let ctx = StepContext::new(code, settings, &inputs.observed_scales);
            let output = step.perform(ctx, &step_inputs)?;

            info!(
                published = output.report.published.len(),
                skipped = output.report.skipped.len(),
                rescaled = output.report.scale_corrections.rescaled.len(),
                "step finished"
            );

            snapshot = snapshot.merged(&output.table);
            reports.push(output.report);
        }

        let table = snapshot.deduplicated();
        info!(
            country = %settings.country,
            variables = table.len(),
            "pipeline finished"
        );

        Ok(PipelineOutput { table, reports })
    }
}
