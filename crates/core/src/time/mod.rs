pub mod clock;
pub mod period;

pub use clock::{Clock, FixedClock, SystemClock};
pub use period::{DateRange, Granularity};
