use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_transitions_total: IntCounterVec,
    pub transition_rejections_total: IntCounterVec,
    pub active_trips: IntGauge,
    pub notifications_total: IntCounterVec,
    pub notifications_dropped_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Applied order status transitions"),
            &["from", "to"],
        )
        .expect("valid order_transitions_total metric");

        let transition_rejections_total = IntCounterVec::new(
            Opts::new(
                "transition_rejections_total",
                "Rejected order status changes by error code",
            ),
            &["code"],
        )
        .expect("valid transition_rejections_total metric");

        let active_trips = IntGauge::new("active_trips", "Trips currently in progress")
            .expect("valid active_trips metric");

        let notifications_total = IntCounterVec::new(
            Opts::new(
                "notifications_total",
                "Notification deliveries by channel and outcome",
            ),
            &["channel", "outcome"],
        )
        .expect("valid notifications_total metric");

        let notifications_dropped_total = IntCounter::new(
            "notifications_dropped_total",
            "Notifications dropped because the dispatch queue was unavailable",
        )
        .expect("valid notifications_dropped_total metric");

        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(transition_rejections_total.clone()))
            .expect("register transition_rejections_total");
        registry
            .register(Box::new(active_trips.clone()))
            .expect("register active_trips");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(notifications_dropped_total.clone()))
            .expect("register notifications_dropped_total");

        Self {
            registry,
            order_transitions_total,
            transition_rejections_total,
            active_trips,
            notifications_total,
            notifications_dropped_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
