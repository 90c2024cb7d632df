#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/adsim/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod dataset;
pub mod error;
pub mod export;
pub mod frame;
pub mod report;

pub use dataset::{
    control_column, dataset_header, dataset_to_csv_string, load_dataset_csv, read_dataset_csv,
    save_dataset_csv, write_dataset_csv,
};
pub use error::{ExportError, Result};
pub use export::{ExportFormat, Exporter};
pub use frame::ToDataFrame;
pub use report::{ChannelRecovery, RecoveryReport};
