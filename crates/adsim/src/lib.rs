#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/adsim/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod sweep;

// Re-export main types from sub-crates
pub use adsim_design as design;
pub use adsim_inference as inference;
pub use adsim_output as output;
pub use adsim_series as series;
pub use adsim_transforms as transforms;

pub use sweep::{SweepError, SweepRecord, SweepSummary, run_sweep, seeds_from, sweep_recovery};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
