//! Connectivity precheck

use std::time::Duration;

/// Probe a URL to check network reachability.
///
/// Any HTTP response counts as connected; only transport-level failures
/// (DNS, connect, timeout) count as unreachable.
pub async fn check_connection(url: &str, timeout: Duration) -> bool {
    let Ok(client) = reqwest::Client::builder().timeout(timeout).build() else {
        return false;
    };

    match client.get(url).send().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, url, "connectivity check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_not_connected() {
        // Reserved TLD guarantees resolution failure
        let connected =
            check_connection("http://parley.invalid", Duration::from_millis(200)).await;
        assert!(!connected);
    }
}
