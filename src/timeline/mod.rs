pub mod builder;
pub mod format;

pub use builder::{build_timeline, GapEntry, SessionEntry, TimelineItem};
pub use format::{format_date, format_duration, format_time, gap_message};
