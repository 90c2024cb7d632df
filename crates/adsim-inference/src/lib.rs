#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/adsim/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod grid;
pub mod posterior;

pub use engine::{InferenceEngine, fit_with_timeout, validate_payload};
pub use error::{InferenceError, Result, UnavailableReason};
pub use grid::{GridConfig, GridSearchEngine};
pub use posterior::{ChannelEstimate, Posterior};
