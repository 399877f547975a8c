use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

/// Probe connect timeout. The gate itself never retries.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sandbox unreachable at {url}: run the sandbox first")]
pub struct Unreachable {
    pub url: Url,
}

#[allow(async_fn_in_trait)]
pub trait ReadinessProbe {
    async fn is_reachable(&self, url: &Url) -> bool;
}

/// Reports an endpoint reachable when a TCP connection to its host and port succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl ReadinessProbe for TcpProbe {
    async fn is_reachable(&self, url: &Url) -> bool {
        let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
            return false;
        };
        let connect = TcpStream::connect((host, port));
        let connected = timeout(PROBE_TIMEOUT, connect).await;
        debug!(%url, ok = matches!(connected, Ok(Ok(_))), "readiness probe");
        matches!(connected, Ok(Ok(_)))
    }
}

/// Single probe, fail fast.
pub async fn ensure_reachable<P: ReadinessProbe>(probe: &P, url: &Url) -> Result<(), Unreachable> {
    if probe.is_reachable(url).await {
        Ok(())
    } else {
        Err(Unreachable { url: url.clone() })
    }
}
