//! Slot-level diff between two display lists
//!
//! The view keeps the last display list it applied. After a full rebuild
//! only the slots reported here need their DOM replaced.

use crate::renderers::staff::StaffDisplayList;

/// Positions whose rendering differs between `previous` and `next`.
///
/// With no previous list every slot is reported.
pub fn changed_positions(previous: Option<&StaffDisplayList>, next: &StaffDisplayList) -> Vec<u8> {
    let Some(previous) = previous else {
        return next.slots.iter().map(|s| s.position).collect();
    };
    next.slots
        .iter()
        .filter(|slot| previous.slot(slot.position) != Some(*slot))
        .map(|slot| slot.position)
        .collect()
}
