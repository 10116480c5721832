mod capital_stock;
mod recalculate_uvgdh;
mod sum_and_splice;

use once_cell::sync::Lazy;

pub use capital_stock::CapitalStock;
pub use recalculate_uvgdh::RecalculateUvgdh;
pub use sum_and_splice::{Addend, SumAndSplice, SumAndSpliceRule};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::step::ComputationStep;

#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub code: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    /// Part of the sequence run when the configuration names no steps.
    pub include_by_default: bool,
}

static STEPS: Lazy<Vec<StepDescriptor>> = Lazy::new(|| {
    vec![
        StepDescriptor {
            code: SumAndSplice::CODE,
            version: SumAndSplice::VERSION,
            description: SumAndSplice::DESCRIPTION,
            include_by_default: true,
        },
        StepDescriptor {
            code: RecalculateUvgdh::CODE,
            version: RecalculateUvgdh::VERSION,
            description: RecalculateUvgdh::DESCRIPTION,
            include_by_default: true,
        },
        StepDescriptor {
            code: CapitalStock::CODE,
            version: CapitalStock::VERSION,
            description: CapitalStock::DESCRIPTION,
            include_by_default: true,
        },
    ]
});

pub fn all_step_descriptors() -> &'static [StepDescriptor] {
    STEPS.as_slice()
}

pub fn build_step(code: &str, config: &PipelineConfig) -> Result<Box<dyn ComputationStep>> {
    match code {
        SumAndSplice::CODE => Ok(Box::new(SumAndSplice::new(config.sum_and_splice.clone()))),
        RecalculateUvgdh::CODE => Ok(Box::new(RecalculateUvgdh)),
        CapitalStock::CODE => Ok(Box::new(CapitalStock)),
        other => Err(PipelineError::UnknownStep(other.to_string())),
    }
}

/// Steps named by the configuration, or the default sequence. The sum and
/// splice step is left out of the default sequence when no rules are
/// configured.
pub fn standard_steps(config: &PipelineConfig) -> Result<Vec<Box<dyn ComputationStep>>> {
    match &config.steps {
        Some(codes) => codes.iter().map(|code| build_step(code, config)).collect(),
        None => all_step_descriptors()
            .iter()
            .filter(|descriptor| descriptor.include_by_default)
            .filter(|descriptor| {
                descriptor.code != SumAndSplice::CODE || !config.sum_and_splice.is_empty()
            })
            .map(|descriptor| build_step(descriptor.code, config))
            .collect(),
    }
}
