#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/adsim/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod carryover;
pub mod error;
pub mod saturation;

pub use carryover::{
    CarryoverParams, DecayKind, WindowedValue, apply_at, carryover, delayed_decay,
    geometric_decay, weighted_lag_average,
};
pub use error::{Result, TransformError};
pub use saturation::{CurveKind, ShapeParams, b_hill, saturate};
