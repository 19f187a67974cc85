use crate::detector::Detector;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub detector: Detector,
    pub rate_limiter: RateLimiter,
}
