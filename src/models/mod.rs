//! Models module for the staff composer
//!
//! Pitch mapping, the 8-slot staff, indicator catalog and data, and the
//! small value types (tempo, notices, config) shared by the controllers.

pub mod pitch;
pub mod staff;
pub mod indicator;
pub mod indicator_data;
pub mod config;
pub mod notice;
pub mod tempo;

// Re-export commonly used types
pub use pitch::{Mode, PitchInfo, LedgerLine, value_to_note};
pub use staff::{StaffModel, NoteEntry, StaffError, SwapOutcome, CAPACITY};
pub use indicator::{IndicatorId, IndicatorCatalog};
pub use indicator_data::{IndicatorData, DataError};
pub use config::ComposerConfig;
pub use notice::{Notice, NoticeKind};
pub use tempo::{Tempo, TempoRange};
