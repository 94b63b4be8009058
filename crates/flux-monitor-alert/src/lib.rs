pub mod composer;
pub mod evaluator;
pub mod monitor;
pub mod threshold;
pub mod window;

pub use composer::{Alert, AlertComposer, AlertMessage, AlertRecord};
pub use evaluator::{evaluate_window, Breach, Evaluation, ThresholdEvaluator};
pub use monitor::MetricsMonitor;
pub use threshold::{Comparison, Threshold, ThresholdType};
pub use window::{window_start, Sample, SampleWindow};
