//! 相対時刻の解析と絶対時刻への変換

pub mod clock;
pub mod duration;
pub mod format;

pub use clock::{Clock, FixedClock, SystemClock};
pub use duration::{add_durations, parse_duration, RelativeDuration};
pub use format::{TimeStyle, TimestampFormatter};
