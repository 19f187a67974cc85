use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("wpcheck_requests_total", "Total number of check requests").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("wpcheck_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref DETECTIONS: CounterVec = register_counter_vec!(
        "wpcheck_detections_total",
        "Completed detections by verdict",
        &["verdict"]
    )
    .unwrap();
    pub static ref FETCH_ERRORS: Counter =
        register_counter!("wpcheck_fetch_errors_total", "Target pages that could not be fetched").unwrap();
    pub static ref DETECTION_LATENCY: Histogram = register_histogram!(
        "wpcheck_detection_latency_seconds",
        "Detection latency in seconds"
    )
    .unwrap();
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!("wpcheck_tracked_clients", "Client IPs with a live rate limit window").unwrap();
}
