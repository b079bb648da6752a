
pub mod calibrate;
pub mod capture;
pub mod dataset;
pub mod simulate;
pub mod sync;
pub mod tracing_init;

pub use calibrate::{sine_calibration, CalibrationConfig, CalibrationModel, CalibrationScope, WeightSpan};
pub use dataset::{Dataset, DatasetConfig, IngestError};
