mod pool;
mod record;
mod stats;

pub use pool::{ConnectionPoolState, PoolStatus};
pub use record::{COIL_NUMBER_FIELD, FieldKind, FieldSpec, FieldValue, TcRecord, TcType};
pub use stats::{PipelineStats, StatsSnapshot};
