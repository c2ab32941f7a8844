//! Renderers module for the staff composer
//!
//! Projects the staff model into a declarative display list and diffs
//! successive lists so the view only redraws slots that changed.

pub mod staff;
pub mod diff;

// Re-export commonly used types
pub use staff::{
    StaffRenderer,
    StaffDisplayList,
    RenderSlot,
    SlotContent,
    RenderedNote,
    RenderedChord,
    StemDirection,
    Affordance,
};
pub use diff::changed_positions;
