// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry: structured `tracing` events and, with the `metrics` feature,
//! OpenTelemetry instruments.

use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use opentelemetry::KeyValue;
#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
use tracing::Level;

pub(crate) mod attributes;
#[cfg(feature = "metrics")]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Records cache operations.
///
/// Telemetry is disabled until enabled through [`with_logs`](Self::with_logs) or
/// [`with_metrics`](Self::with_metrics). Pass it to the cache builder via
/// [`CacheBuilder::telemetry`](crate::CacheBuilder::telemetry).
///
/// Every façade operation is recorded as a `(cache name, operation, activity)` triple,
/// for example `(pages, cache.get, cache.stale_claimed)`.
///
/// # Examples
///
/// ```
/// use cachegen::{Cache, CacheTelemetry};
/// use tick::Clock;
/// use cachegen_backend::testing::MockBackend;
///
/// let cache = Cache::builder(Clock::new_frozen())
///     .backend(MockBackend::new())
///     .telemetry(CacheTelemetry::new().with_logs())
///     .build();
/// ```
#[derive(Clone, Debug, Default)]
pub struct CacheTelemetry {
    inner: Arc<CacheTelemetryInner>,
}

#[derive(Debug, Default)]
struct CacheTelemetryInner {
    logging_enabled: bool,
    #[cfg(feature = "metrics")]
    event_counter: Option<Counter<u64>>,
    #[cfg(feature = "metrics")]
    operation_duration: Option<Histogram<f64>>,
}

impl CacheTelemetry {
    /// Creates a collector with logs and metrics disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables structured logging of cache operations through `tracing`.
    #[must_use]
    pub fn with_logs(self) -> Self {
        self.update(|inner| inner.logging_enabled = true)
    }

    /// Enables OpenTelemetry metrics from the given meter provider.
    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn with_metrics(self, provider: &dyn MeterProvider) -> Self {
        let meter = metrics::create_meter(provider);
        self.update(|inner| {
            inner.event_counter = Some(metrics::create_event_counter(&meter));
            inner.operation_duration = Some(metrics::create_operation_duration_histogram(&meter));
        })
    }

    /// Returns `true` when logs or metrics are enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "metrics")]
        if self.inner.event_counter.is_some() {
            return true;
        }
        self.inner.logging_enabled
    }

    fn update(self, f: impl FnOnce(&mut CacheTelemetryInner)) -> Self {
        let mut inner = CacheTelemetryInner {
            logging_enabled: self.inner.logging_enabled,
            #[cfg(feature = "metrics")]
            event_counter: self.inner.event_counter.clone(),
            #[cfg(feature = "metrics")]
            operation_duration: self.inner.operation_duration.clone(),
        };
        f(&mut inner);
        Self { inner: Arc::new(inner) }
    }

    #[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "duration only feeds metrics"))]
    pub(crate) fn record(&self, cache_name: &str, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        #[cfg(feature = "metrics")]
        {
            let attrs = [
                KeyValue::new(attributes::CACHE_NAME, cache_name.to_owned()),
                KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
                KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
            ];
            if let Some(counter) = &self.inner.event_counter {
                counter.add(1, &attrs);
            }
            if let (Some(d), Some(histogram)) = (duration, &self.inner.operation_duration) {
                histogram.record(d.as_secs_f64(), &attrs);
            }
        }

        if self.inner.logging_enabled {
            emit(cache_name, operation, activity);
        }
    }
}

fn emit(cache_name: &str, operation: CacheOperation, activity: CacheActivity) {
    let op = operation.as_str();
    let act = activity.as_str();

    // Tracing levels must be constant, so the level is selected by macro.
    // Field names must match constants in attributes.rs.
    macro_rules! emit_event {
        ($level:ident) => {
            tracing::$level!(
                cache.name = cache_name,
                cache.operation = op,
                cache.activity = act,
                "cache.event"
            )
        };
    }

    let level = activity.level();
    if level == Level::ERROR {
        emit_event!(error);
    } else if level == Level::INFO {
        emit_event!(info);
    } else {
        emit_event!(debug);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Get,
    Set,
    Delete,
    Flush,
    Cas,
    Counter,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Set => "cache.set",
            Self::Delete => "cache.delete",
            Self::Flush => "cache.flush",
            Self::Cas => "cache.cas",
            Self::Counter => "cache.counter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    StaleServed,
    StaleClaimed,
    Resynced,
    Inserted,
    Deleted,
    SoftDeleted,
    Flushed,
    Rejected,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::StaleServed => "cache.stale_served",
            Self::StaleClaimed => "cache.stale_claimed",
            Self::Resynced => "cache.resynced",
            Self::Inserted => "cache.inserted",
            Self::Deleted => "cache.deleted",
            Self::SoftDeleted => "cache.soft_deleted",
            Self::Flushed => "cache.flushed",
            Self::Rejected => "cache.rejected",
            Self::Error => "cache.error",
        }
    }

    pub fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::StaleServed | Self::Inserted | Self::Rejected => Level::DEBUG,
            Self::StaleClaimed | Self::Resynced | Self::Deleted | Self::SoftDeleted | Self::Flushed => Level::INFO,
            Self::Error => Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::testing::LogCapture;

    #[test]
    fn operation_names() {
        assert_eq!(CacheOperation::Get.as_str(), "cache.get");
        assert_eq!(CacheOperation::Set.as_str(), "cache.set");
        assert_eq!(CacheOperation::Delete.as_str(), "cache.delete");
        assert_eq!(CacheOperation::Flush.as_str(), "cache.flush");
        assert_eq!(CacheOperation::Cas.as_str(), "cache.cas");
        assert_eq!(CacheOperation::Counter.as_str(), "cache.counter");
    }

    #[test]
    fn activity_names() {
        assert_eq!(CacheActivity::StaleServed.as_str(), "cache.stale_served");
        assert_eq!(CacheActivity::StaleClaimed.as_str(), "cache.stale_claimed");
        assert_eq!(CacheActivity::SoftDeleted.as_str(), "cache.soft_deleted");
        assert_eq!(CacheActivity::Error.as_str(), "cache.error");
    }

    #[test]
    fn activity_levels() {
        assert_eq!(CacheActivity::Hit.level(), Level::DEBUG);
        assert_eq!(CacheActivity::StaleClaimed.level(), Level::INFO);
        assert_eq!(CacheActivity::Flushed.level(), Level::INFO);
        assert_eq!(CacheActivity::Error.level(), Level::ERROR);
    }

    #[test]
    fn logs_contain_all_fields_and_values() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::new()
            .with_logs()
            .record("pages", CacheOperation::Get, CacheActivity::StaleClaimed, None);

        capture.assert_contains(attributes::CACHE_NAME);
        capture.assert_contains(attributes::CACHE_OPERATION_NAME);
        capture.assert_contains(attributes::CACHE_ACTIVITY_NAME);
        capture.assert_contains(attributes::CACHE_EVENT_NAME);
        capture.assert_contains("pages");
        capture.assert_contains("cache.stale_claimed");
        capture.assert_contains("INFO");
    }

    #[test]
    fn errors_are_logged_at_error_level() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::new()
            .with_logs()
            .record("pages", CacheOperation::Set, CacheActivity::Error, None);

        capture.assert_contains("ERROR");
    }

    #[test]
    fn disabled_telemetry_emits_nothing() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let telemetry = CacheTelemetry::new();
        assert!(!telemetry.is_enabled());
        telemetry.record("pages", CacheOperation::Get, CacheActivity::Hit, Some(Duration::from_secs(1)));

        assert!(capture.output().is_empty());
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn metrics_carry_operation_attributes() {
        use crate::telemetry::testing::MetricTester;

        let tester = MetricTester::new();
        let telemetry = CacheTelemetry::new().with_metrics(tester.meter_provider());
        assert!(telemetry.is_enabled());

        telemetry.record("pages", CacheOperation::Flush, CacheActivity::Flushed, Some(Duration::from_millis(3)));

        tester.assert_attributes_contain(&[
            KeyValue::new(attributes::CACHE_NAME, "pages"),
            KeyValue::new(attributes::CACHE_OPERATION_NAME, "cache.flush"),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, "cache.flushed"),
        ]);
    }
}
