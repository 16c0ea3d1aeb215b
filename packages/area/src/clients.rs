pub mod discord;
pub mod github;
pub mod google;
pub mod outlook;
pub mod spotify;

use std::time::Duration;

/// Every outbound call is bounded; a stalled upstream must never wedge an
/// evaluator or worker
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()
}
