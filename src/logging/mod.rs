//! Split logging for splitlog
//!
//! Routes events by severity into two bands, each written to hourly partitions with
//! a stable alias and bounded retention.

mod clock;
mod event;
mod format;
mod layer;
mod level;
mod pipeline;
mod retention;
mod rotating;
mod router;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{short_caller, FieldValue, LogEvent};
pub use format::{format_event, parse_line, ParseLineError, ParsedLine, TIMESTAMP_FORMAT};
pub use layer::{init_logging, LogFileInfo, LoggingGuard, PipelineLayer};
pub use level::{ParseSeverityError, Severity};
pub use pipeline::{LogConfig, LogPipeline, DEFAULT_FILTER};
pub use retention::{prune_expired, prune_expired_with, PruneReport};
pub use rotating::{
    BucketKey, RotatingFileSink, RotationPolicy, DEFAULT_BUCKET, DEFAULT_RETENTION,
    DEFAULT_SUFFIX_FORMAT,
};
pub use router::{Band, SeverityRouter};
