//! Session logging and time sources

pub mod clock;
pub mod logger;

pub use clock::{Clock, SystemClock, ManualClock};
pub use logger::{InteractionLogger, EventPayload, LoggedEvent, SessionExport};
