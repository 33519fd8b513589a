pub mod api;
pub mod arguments;
pub mod conversions;
pub mod explorer_api;
pub mod metrics;
pub mod monitor;
pub mod oneclick_api;
pub mod rate_limiter;
pub mod token_list;
pub mod tracing;

use std::time::Duration;

/// The standard http client used for every outbound request.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .timeout(timeout)
        .user_agent("zeroswap/0.1.0")
        .build()
        .unwrap()
}
