use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub(crate) fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "cache_refresher_dispatch_total",
            Unit::Count,
            "Dispatched events by handler signature and outcome."
        );
        describe_counter!(
            "cache_refresher_invalidation_total",
            Unit::Count,
            "Invalidation calls issued to the distributed cache, by action."
        );
        describe_histogram!(
            "cache_refresher_dispatch_ms",
            Unit::Milliseconds,
            "Time spent running an invalidation routine in milliseconds."
        );
        describe_gauge!(
            "cache_refresher_bound_subscriptions",
            Unit::Count,
            "Producer subscriptions currently held by the refresher."
        );
    });
}
