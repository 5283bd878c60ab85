//! Selective forwarding of raw payloads to downstream consumers.

pub mod router;
pub mod sender;
pub mod tcp;

pub use router::{ForwardOutcome, ForwardingRouter, ForwardingRoutes};
pub use sender::{Destination, RecordSender};
pub use tcp::TcpSender;
