//! Prometheus metrics collection.
//!
//! Tracks connection churn, command mix, and routing throughput. Metrics are
//! optional: when the registry is never initialized (metrics port 0), every
//! recording helper is a no-op.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Currently connected, authenticated clients.
pub static CONNECTED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();

/// Total successful logins.
pub static LOGINS: OnceLock<IntCounter> = OnceLock::new();

/// Login rejections by reason.
pub static LOGIN_REJECTIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Commands processed by kind.
pub static COMMANDS: OnceLock<IntCounterVec> = OnceLock::new();

/// Routing events published to the bus, by kind.
pub static EVENTS_PUBLISHED: OnceLock<IntCounterVec> = OnceLock::new();

/// Routing events received from the bus subscription.
pub static EVENTS_DISPATCHED: OnceLock<IntCounter> = OnceLock::new();

/// Per-target delivery failures during fan-out.
pub static DELIVERY_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Local recipients per room broadcast.
pub static MESSAGE_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        CONNECTED_CLIENTS,
        IntGauge::new("chat_connected_clients", "Currently connected clients")
    );
    register!(
        LOGINS,
        IntCounter::new("chat_logins_total", "Successful logins")
    );
    register!(
        LOGIN_REJECTIONS,
        IntCounterVec::new(
            Opts::new("chat_login_rejections_total", "Login rejections by reason"),
            &["reason"]
        )
    );
    register!(
        COMMANDS,
        IntCounterVec::new(
            Opts::new("chat_commands_total", "Commands processed by kind"),
            &["command"]
        )
    );
    register!(
        EVENTS_PUBLISHED,
        IntCounterVec::new(
            Opts::new("chat_events_published_total", "Routing events published"),
            &["kind"]
        )
    );
    register!(
        EVENTS_DISPATCHED,
        IntCounter::new(
            "chat_events_dispatched_total",
            "Routing events received from the bus"
        )
    );
    register!(
        DELIVERY_FAILURES,
        IntCounter::new(
            "chat_delivery_failures_total",
            "Per-target delivery failures during fan-out"
        )
    );
    register!(
        MESSAGE_FANOUT,
        Histogram::with_opts(
            HistogramOpts::new("chat_message_fanout", "Local recipients per room broadcast")
                .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0])
        )
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[inline]
pub fn client_connected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.inc();
    }
    if let Some(c) = LOGINS.get() {
        c.inc();
    }
}

#[inline]
pub fn client_disconnected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.dec();
    }
}

#[inline]
pub fn record_login_rejection(reason: &str) {
    if let Some(c) = LOGIN_REJECTIONS.get() {
        c.with_label_values(&[reason]).inc();
    }
}

#[inline]
pub fn record_command(command: &str) {
    if let Some(c) = COMMANDS.get() {
        c.with_label_values(&[command]).inc();
    }
}

#[inline]
pub fn record_event_published(kind: &str) {
    if let Some(c) = EVENTS_PUBLISHED.get() {
        c.with_label_values(&[kind]).inc();
    }
}

#[inline]
pub fn record_event_dispatched() {
    if let Some(c) = EVENTS_DISPATCHED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_delivery_failure() {
    if let Some(c) = DELIVERY_FAILURES.get() {
        c.inc();
    }
}

#[inline]
pub fn record_fanout(recipients: usize) {
    if let Some(h) = MESSAGE_FANOUT.get() {
        h.observe(recipients as f64);
    }
}
