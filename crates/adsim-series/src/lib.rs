#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/adsim/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod error;
pub mod generator;
pub mod normalize;
pub mod series;

pub use channel::Channel;
pub use error::{Result, SeriesError};
pub use generator::{
    ArmaSpec, ChannelSpec, check_stationary, channel_series, generate_channel_series,
    generate_price_series, price_series, rng_for_stream,
};
pub use normalize::{MinMax, normalize, normalize_with_bounds};
pub use series::{Calendar, Frequency, Observation, TimeSeries};
