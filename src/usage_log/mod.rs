//! Cost/outcome accounting for every dispatched API call, plus synthetic records
//! for granted consent events.

mod events;
mod sinks;

pub use events::UsageRecord;
pub use sinks::{
    FallbackUsageSink, LogUsageSink, MemoryUsageSink, NonBlockingUsageSink, NullUsageSink, UsageSink,
};
