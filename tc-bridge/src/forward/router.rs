use metrics::counter;
use tc_config::shared::ForwardingConfig;
use tracing::{debug, warn};

use crate::forward::sender::{Destination, RecordSender};
use crate::metrics::{RECORD_TYPE_LABEL, TC_FORWARD_FAILURES_TOTAL, TC_FORWARDS_TOTAL};
use crate::types::{TcRecord, TcType};

/// Result of a forwarding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The record type has no downstream consumer.
    NotRouted,
    Sent,
    /// Delivery failed, the cause has been logged.
    Failed,
}

/// Fixed mapping from record type to downstream destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingRoutes {
    host: String,
    schedule_port: Option<u16>,
    wpd_pass_port: Option<u16>,
    line_speed_port: Option<u16>,
}

impl ForwardingRoutes {
    pub fn from_config(config: &ForwardingConfig) -> Self {
        Self {
            host: config.host.clone(),
            schedule_port: config.schedule_port,
            wpd_pass_port: config.wpd_pass_port,
            line_speed_port: config.line_speed_port,
        }
    }

    /// Returns the destination of `record_type`, `None` if it is not forwarded.
    ///
    /// Cut records are never forwarded.
    pub fn destination(&self, record_type: TcType) -> Option<Destination> {
        let port = match record_type {
            TcType::Schedule => self.schedule_port,
            TcType::Cut => None,
            TcType::WpdPass => self.wpd_pass_port,
            TcType::LineSpeed => self.line_speed_port,
        }?;

        Some(Destination::new(self.host.clone(), port))
    }
}

impl Default for ForwardingRoutes {
    fn default() -> Self {
        Self::from_config(&ForwardingConfig::default())
    }
}

/// Forwards the raw payload of routed record types to their downstream consumer.
///
/// Failures are logged and counted but never returned, forwarding does not influence the
/// outcome of record processing and is not retried.
#[derive(Debug, Clone)]
pub struct ForwardingRouter<S> {
    routes: ForwardingRoutes,
    sender: S,
}

impl<S> ForwardingRouter<S>
where
    S: RecordSender,
{
    pub fn new(routes: ForwardingRoutes, sender: S) -> Self {
        Self { routes, sender }
    }

    pub fn routes(&self) -> &ForwardingRoutes {
        &self.routes
    }

    /// Sends `record`'s raw payload to the destination of its type, if any.
    pub async fn forward(&self, record: &TcRecord) -> ForwardOutcome {
        let record_type = record.record_type();
        let Some(destination) = self.routes.destination(record_type) else {
            debug!(record_type = %record_type, "record type is not forwarded");
            return ForwardOutcome::NotRouted;
        };

        match self
            .sender
            .send(&destination, record.raw_payload().as_bytes())
            .await
        {
            Ok(()) => {
                counter!(TC_FORWARDS_TOTAL, RECORD_TYPE_LABEL => record_type.as_str())
                    .increment(1);
                ForwardOutcome::Sent
            }
            Err(err) => {
                counter!(TC_FORWARD_FAILURES_TOTAL, RECORD_TYPE_LABEL => record_type.as_str())
                    .increment(1);
                warn!(
                    record_type = %record_type,
                    destination = %destination,
                    source = record.source_label(),
                    error = %err,
                    "forwarding failed"
                );
                ForwardOutcome::Failed
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.sender.is_healthy()
    }

    pub async fn close(&self) {
        self.sender.close().await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::parser::RecordParser;
    use crate::test_utils::sender::RecordingSender;

    fn record(raw: &str) -> TcRecord {
        RecordParser::default()
            .parse(raw, "test", Utc::now())
            .unwrap()
    }

    #[test]
    fn default_routes_skip_cut_records() {
        let routes = ForwardingRoutes::default();

        assert_eq!(
            routes.destination(TcType::Schedule),
            Some(Destination::new("127.0.0.1", 9308))
        );
        assert_eq!(routes.destination(TcType::Cut), None);
        assert_eq!(
            routes.destination(TcType::WpdPass),
            Some(Destination::new("127.0.0.1", 9309))
        );
        assert_eq!(
            routes.destination(TcType::LineSpeed),
            Some(Destination::new("127.0.0.1", 9310))
        );
    }

    #[test]
    fn cut_records_are_not_routed_with_custom_ports() {
        let config = ForwardingConfig {
            host: "10.0.0.5".to_string(),
            schedule_port: Some(7000),
            wpd_pass_port: Some(7002),
            line_speed_port: Some(7003),
            ..ForwardingConfig::default()
        };
        let routes = ForwardingRoutes::from_config(&config);

        assert_eq!(routes.destination(TcType::Cut), None);
        assert_eq!(
            routes.destination(TcType::WpdPass),
            Some(Destination::new("10.0.0.5", 7002))
        );
    }

    #[test]
    fn route_lookup_is_stable() {
        let routes = ForwardingRoutes::default();
        for record_type in TcType::ALL {
            assert_eq!(
                routes.destination(record_type),
                routes.destination(record_type)
            );
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn raw_payload_is_sent_to_the_type_port() {
        let sender = RecordingSender::new();
        let router = ForwardingRouter::new(ForwardingRoutes::default(), sender.clone());

        let raw = "4003,L1,0001,64,20240101,120000,,185";
        assert_eq!(router.forward(&record(raw)).await, ForwardOutcome::Sent);
        assert_eq!(
            router.forward(&record("4001,L1,2,0,d,t,,C-1,1,2")).await,
            ForwardOutcome::NotRouted
        );

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Destination::new("127.0.0.1", 9310));
        assert_eq!(sent[0].1, raw.as_bytes());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_sends_are_absorbed() {
        let sender = RecordingSender::new();
        sender.fail_sends(true).await;
        let router = ForwardingRouter::new(ForwardingRoutes::default(), sender.clone());

        let outcome = router.forward(&record("4000,L1,1,0,d,t,,C-1")).await;

        assert_eq!(outcome, ForwardOutcome::Failed);
        assert!(sender.sent().await.is_empty());
    }
}
