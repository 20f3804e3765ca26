use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// All Prometheus collectors of the reload service, shared behind an `Arc`.
pub struct Metrics {
    pub registry: Registry,
    /// Completed reloads, labeled by dataset group.
    pub reloads_total: IntCounterVec,
    /// Failed reloads, labeled by dataset group.
    pub reload_failures_total: IntCounterVec,
    /// Rows inserted into staged tables, labeled by entity table.
    pub rows_loaded_total: IntCounterVec,
    /// Solids dropped by the forbidden-zone cascade.
    pub solids_excluded_total: IntCounter,
    /// Solids retained fail-open after a geometry computation failure.
    pub exclusion_failures_total: IntCounter,
    /// Wall-clock duration of the most recent successful reload, seconds.
    pub last_reload_duration_seconds: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("basemap_service".into()), None)
            .expect("Failed to create custom metrics registry");

        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric;
                registry
                    .register(Box::new(collector.clone()))
                    .expect("Failed to register metric");
                collector
            }};
        }

        Self {
            reloads_total: reg!(IntCounterVec::new(
                Opts::new("reloads_total", "Completed reloads per dataset group"),
                &["group"]
            )
            .unwrap()),
            reload_failures_total: reg!(IntCounterVec::new(
                Opts::new("reload_failures_total", "Failed reloads per dataset group"),
                &["group"]
            )
            .unwrap()),
            rows_loaded_total: reg!(IntCounterVec::new(
                Opts::new("rows_loaded_total", "Rows inserted into staged tables"),
                &["table"]
            )
            .unwrap()),
            solids_excluded_total: reg!(IntCounter::new(
                "solids_excluded_total",
                "Building solids dropped by the forbidden-zone cascade"
            )
            .unwrap()),
            exclusion_failures_total: reg!(IntCounter::new(
                "exclusion_failures_total",
                "Solids retained fail-open after a geometry computation failure"
            )
            .unwrap()),
            last_reload_duration_seconds: reg!(Gauge::new(
                "last_reload_duration_seconds",
                "Duration of the most recent successful reload"
            )
            .unwrap()),
            registry,
        }
    }

    /// Prometheus text exposition of the registry.
    pub fn render(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("Failed to encode metrics");
        String::from_utf8(buffer).expect("Metrics buffer is not valid UTF-8")
    }

    /// Applies one reload report to the counters.
    pub fn observe_report(&self, report: &basemap::reload::ReloadReport, duration_s: f64) {
        self.reloads_total
            .with_label_values(&[report.dataset_group])
            .inc();
        for (table, rows) in &report.inserted {
            self.rows_loaded_total
                .with_label_values(&[*table])
                .inc_by(*rows);
        }
        self.solids_excluded_total.inc_by(report.excluded_solids);
        self.exclusion_failures_total
            .inc_by(report.exclusion_failures);
        self.last_reload_duration_seconds.set(duration_s);
    }
}
