pub mod config;
pub mod error;
pub mod ingestion;
pub mod lookup;
pub mod outputs;
pub mod pipeline;
pub mod recurrence;
pub mod result_table;
pub mod scale;
pub mod splicer;
pub mod step;
pub mod steps;
pub mod timeseries;

pub use config::{ConfigError, PipelineConfig, RunSettings};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineInputs, PipelineOutput};
pub use result_table::{Frequency, Lookup, LookupError, ResultTable, VariableRecord};
pub use scale::{ObservedScales, Scale, ScaleCorrectionLog};
pub use splicer::{butt_splice, ratio_splice, splice, SpliceDirection, SpliceMethod, SpliceOutcome};
pub use timeseries::{TimeSeries, Year, YearWindow};
