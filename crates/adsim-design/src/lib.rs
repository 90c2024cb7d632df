#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/adsim/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod assembler;
pub mod config;
pub mod dataset;
pub mod error;
pub mod payload;
pub mod scenario;

pub use assembler::{AssemblyInput, ChannelInput, Design, assemble};
pub use config::{
    ChannelTransform, CompositionConfig, GenerationConfig, NoiseSpec, RunConfig, TransformConfig,
};
pub use dataset::{CleanDataset, DatasetRow, DesignRow};
pub use error::{DesignError, Result};
pub use payload::{ModelPayload, RawExposure};
pub use scenario::{Scenario, SimulationRun};
