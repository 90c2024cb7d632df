//! Parameter recovery from simulated runs.

use std::sync::Arc;
use std::time::Duration;

use adsim_design::{NoiseSpec, RunConfig, Scenario};
use adsim_inference::{
    GridConfig, GridSearchEngine, InferenceEngine, InferenceError, fit_with_timeout,
};
use adsim_series::Channel;
use adsim_transforms::DecayKind;
use approx::assert_relative_eq;

fn single_channel_config(channel: Channel) -> RunConfig {
    let mut config = RunConfig::default();
    config.generation.channels.retain(|c| c.channel == channel);
    config.transform.channels.retain(|t| t.channel == channel);
    config.composition.noise = NoiseSpec::None;
    config
}

#[test]
fn test_noiseless_geometric_channel_recovered() {
    let run = Scenario::run(&single_channel_config(Channel::Radio)).unwrap();
    let posterior = GridSearchEngine::default().fit(run.payload()).unwrap();

    let estimate = posterior.estimate(Channel::Radio).unwrap();
    assert_relative_eq!(estimate.rate, 0.5);
    assert_eq!(estimate.theta, Some(0.0));
    assert_relative_eq!(estimate.k, 0.4);
    assert_relative_eq!(estimate.b, 0.8, epsilon = 1e-6);
    assert!(estimate.slope_fixed);
    assert_relative_eq!(posterior.intercept(), 2.0, epsilon = 1e-6);
    assert_relative_eq!(posterior.control_coefficients()[0], -0.3, epsilon = 1e-6);
    assert!(posterior.rss() < 1e-12);
}

#[test]
fn test_noiseless_delayed_channel_recovered() {
    let run = Scenario::run(&single_channel_config(Channel::Tv)).unwrap();
    let posterior = GridSearchEngine::default().fit(run.payload()).unwrap();

    let estimate = posterior.estimate(Channel::Tv).unwrap();
    assert_relative_eq!(estimate.rate, 0.7);
    assert_eq!(estimate.theta, Some(2.0));
    assert_relative_eq!(estimate.k, 0.5);
    assert_relative_eq!(estimate.b, 1.5, epsilon = 1e-6);
}

#[test]
fn test_geometric_kernel_reports_no_theta() {
    let run = Scenario::run(&single_channel_config(Channel::Online)).unwrap();
    let engine = GridSearchEngine::new(GridConfig {
        kernel: DecayKind::Geometric,
        ..GridConfig::default()
    })
    .unwrap();
    let posterior = engine.fit(run.payload()).unwrap();
    let estimate = posterior.estimate(Channel::Online).unwrap();
    assert_eq!(estimate.theta, None);
    assert_relative_eq!(estimate.rate, 0.3);
    assert_relative_eq!(estimate.k, 0.6);
}

#[test]
fn test_three_channel_fit_is_deterministic_and_aligned() {
    let mut config = RunConfig::default().with_periods(80);
    config.composition.noise = NoiseSpec::None;
    let run = Scenario::run(&config).unwrap();
    let engine = GridSearchEngine::default();

    let first = engine.fit(run.payload()).unwrap();
    let second = engine.fit(run.payload()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.fitted().len(), run.payload().n());
    assert_eq!(first.channels().len(), 3);
    assert!(first.r_squared(run.payload()).unwrap() > 0.5);
}

#[test]
fn test_too_few_rows_is_invalid_payload() {
    let config = single_channel_config(Channel::Radio).with_periods(14);
    let run = Scenario::run(&config).unwrap();
    assert_eq!(run.payload().n(), 2);
    assert!(matches!(
        GridSearchEngine::default().fit(run.payload()),
        Err(InferenceError::InvalidPayload(_))
    ));
}

#[tokio::test]
async fn test_grid_search_through_timeout_boundary() {
    let run = Scenario::run(&single_channel_config(Channel::Radio).with_periods(40)).unwrap();
    let payload = Arc::new(run.payload().clone());
    let posterior = fit_with_timeout(
        Arc::new(GridSearchEngine::default()),
        Arc::clone(&payload),
        Duration::from_secs(60),
        None,
    )
    .await
    .unwrap();
    assert_eq!(posterior.engine(), GridSearchEngine::NAME);
    assert_eq!(posterior.fitted().len(), payload.n());
}
