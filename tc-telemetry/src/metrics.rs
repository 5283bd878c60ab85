use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::info;

/// Installs the Prometheus recorder and its scrape endpoint on `[::]:{port}/metrics`.
///
/// Nothing is installed when `port` is `None`; metric macros then become no-ops.
pub fn init_metrics(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else {
        info!("metrics exporter disabled");
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port))
        .install()?;

    info!(port, "metrics exporter listening");

    Ok(())
}
