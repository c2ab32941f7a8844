//! Staff renderer
//!
//! Projects the staff model into a display list: one `RenderSlot` per
//! position `1..=CAPACITY`. The renderer holds no state of its own; it is
//! re-run from the model after every relevant mutation and the view layer
//! applies the result.

use crate::models::indicator::{IndicatorCatalog, IndicatorId};
use crate::models::indicator_data::IndicatorData;
use crate::models::pitch::{is_consonant, value_to_note, LedgerLine, Mode, PitchInfo};
use crate::models::staff::{NoteEntry, StaffModel, CAPACITY};
use serde::{Deserialize, Serialize};

/// Value on the 0-100 scale treated as the middle of the staff
pub const STAFF_MIDDLE_VALUE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemDirection {
    Up,
    Down,
}

/// Interaction hooks the view should attach to a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Affordance {
    Delete,
    Play,
    DragSource,
    DropTarget,
}

/// One note head on the staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedNote {
    pub indicator: IndicatorId,
    pub value: f64,
    pub pitch: PitchInfo,
    pub color: String,
    pub stem: StemDirection,
    /// Shares a staff line with a lower chord member; drawn translucent
    pub overlapping: bool,
    pub ledger_line: Option<LedgerLine>,
    /// Tooltip, e.g. "A4 (Value: 55)"
    pub title: String,
}

/// Two or more simultaneous notes from one entry, lowest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedChord {
    pub notes: Vec<RenderedNote>,
    pub stem: StemDirection,
    /// Every pair of members forms a consonant interval
    pub consonant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SlotContent {
    Placeholder,
    Rest,
    Note { note: RenderedNote },
    Chord { chord: RenderedChord },
}

/// Display description of one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSlot {
    pub position: u8,
    pub content: SlotContent,
    pub country_id: Option<String>,
    pub country_label: Option<String>,
    /// Group tooltip, e.g. "France - SDG 1, SDG 3"
    pub title: Option<String>,
    pub affordances: Vec<Affordance>,
}

impl RenderSlot {
    pub fn placeholder(position: u8) -> Self {
        Self {
            position,
            content: SlotContent::Placeholder,
            country_id: None,
            country_label: None,
            title: None,
            affordances: vec![Affordance::DragSource, Affordance::DropTarget],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.content, SlotContent::Placeholder)
    }

    /// Notes sounding in this slot, lowest first
    pub fn sounding_notes(&self) -> Vec<&RenderedNote> {
        match &self.content {
            SlotContent::Note { note } => vec![note],
            SlotContent::Chord { chord } => chord.notes.iter().collect(),
            SlotContent::Placeholder | SlotContent::Rest => Vec::new(),
        }
    }
}

/// The whole staff as the view should show it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffDisplayList {
    pub mode: Mode,
    pub year: u16,
    /// Exactly `CAPACITY` slots, in position order
    pub slots: Vec<RenderSlot>,
}

impl StaffDisplayList {
    pub fn slot(&self, position: u8) -> Option<&RenderSlot> {
        self.slots.iter().find(|s| s.position == position)
    }
}

/// Single-note stem: down above the middle of the staff
pub fn single_stem_direction(value: f64) -> StemDirection {
    if value > STAFF_MIDDLE_VALUE {
        StemDirection::Down
    } else {
        StemDirection::Up
    }
}

/// Shared chord stem: follow whichever outer note is farther from the
/// middle; ties go down.
pub fn chord_stem_direction(lowest: f64, highest: f64) -> StemDirection {
    let distance_from_low = (lowest - STAFF_MIDDLE_VALUE).abs();
    let distance_from_high = (highest - STAFF_MIDDLE_VALUE).abs();
    if distance_from_high >= distance_from_low {
        StemDirection::Down
    } else {
        StemDirection::Up
    }
}

/// Staff-line key used for overlap detection
fn overlap_key(value: f64) -> i64 {
    ((value / 10.0).floor() * 10.0) as i64
}

/// Inputs the renderer reads; borrowed for the duration of one render
pub struct StaffRenderer<'a> {
    pub data: &'a IndicatorData,
    pub catalog: &'a IndicatorCatalog,
    pub year: u16,
    pub mode: Mode,
}

impl<'a> StaffRenderer<'a> {
    pub fn new(data: &'a IndicatorData, year: u16, mode: Mode) -> Self {
        Self {
            data,
            catalog: IndicatorCatalog::global(),
            year,
            mode,
        }
    }

    /// Render every slot
    pub fn render(&self, staff: &StaffModel) -> StaffDisplayList {
        StaffDisplayList {
            mode: self.mode,
            year: self.year,
            slots: (1..=CAPACITY).map(|pos| self.render_slot(staff, pos)).collect(),
        }
    }

    /// Render one slot
    pub fn render_slot(&self, staff: &StaffModel, position: u8) -> RenderSlot {
        match staff.get(position) {
            Some(entry) => self.render_entry(entry),
            None => RenderSlot::placeholder(position),
        }
    }

    fn render_entry(&self, entry: &NoteEntry) -> RenderSlot {
        let resolved: Vec<(IndicatorId, f64)> = entry
            .indicator_ids
            .iter()
            .filter_map(|id| {
                self.data
                    .value(&entry.country_id, self.year, *id)
                    .map(|value| (*id, value))
            })
            .collect();

        let content = match resolved.len() {
            0 => SlotContent::Rest,
            1 => {
                let (id, value) = resolved[0];
                let stem = single_stem_direction(value);
                SlotContent::Note {
                    note: self.make_note(id, value, stem),
                }
            }
            _ => SlotContent::Chord {
                chord: self.make_chord(resolved),
            },
        };

        let mut affordances = vec![Affordance::Delete];
        if !matches!(content, SlotContent::Rest) {
            affordances.push(Affordance::Play);
        }
        affordances.extend([Affordance::DragSource, Affordance::DropTarget]);

        let indicator_list = entry
            .indicator_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        RenderSlot {
            position: entry.position,
            content,
            country_id: Some(entry.country_id.clone()),
            country_label: Some(entry.country_label.clone()),
            title: Some(format!("{} - {}", entry.country_label, indicator_list)),
            affordances,
        }
    }

    fn make_note(&self, indicator: IndicatorId, value: f64, stem: StemDirection) -> RenderedNote {
        let pitch = value_to_note(value, self.mode);
        RenderedNote {
            indicator,
            value,
            title: format!("{} (Value: {})", pitch.full_name, value),
            ledger_line: pitch.needs_ledger_line,
            color: self.catalog.color(indicator).to_string(),
            pitch,
            stem,
            overlapping: false,
        }
    }

    fn make_chord(&self, mut resolved: Vec<(IndicatorId, f64)>) -> RenderedChord {
        // Stable: equal values keep selection order
        resolved.sort_by(|a, b| a.1.total_cmp(&b.1));

        let lowest = resolved[0].1;
        let highest = resolved[resolved.len() - 1].1;
        let stem = chord_stem_direction(lowest, highest);

        let mut seen_keys: Vec<i64> = Vec::new();
        let notes: Vec<RenderedNote> = resolved
            .iter()
            .map(|(id, value)| {
                let mut note = self.make_note(*id, *value, stem);
                let key = overlap_key(*value);
                note.overlapping = seen_keys.contains(&key);
                seen_keys.push(key);
                note
            })
            .collect();

        let consonant = resolved.iter().enumerate().all(|(i, (_, a))| {
            resolved[i + 1..]
                .iter()
                .all(|(_, b)| is_consonant(*a, *b, self.mode))
        });

        RenderedChord {
            notes,
            stem,
            consonant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> IndicatorData {
        let mut data = IndicatorData::new();
        data.insert("AAA", 2020, "sdg1", 70.0);
        data.insert("AAA", 2020, "sdg3", 30.0);
        data.insert("AAA", 2020, "sdg7", 34.0);
        data.insert("BBB", 2020, "sdg1", 55.0);
        data
    }

    #[test]
    fn test_stem_rules() {
        assert_eq!(single_stem_direction(50.0), StemDirection::Up);
        assert_eq!(single_stem_direction(50.5), StemDirection::Down);
        // high note farther from middle
        assert_eq!(chord_stem_direction(40.0, 90.0), StemDirection::Down);
        // low note farther
        assert_eq!(chord_stem_direction(5.0, 60.0), StemDirection::Up);
        // tie goes down
        assert_eq!(chord_stem_direction(30.0, 70.0), StemDirection::Down);
    }

    #[test]
    fn test_empty_staff_is_all_placeholders() {
        let data = data();
        let display = StaffRenderer::new(&data, 2020, Mode::Major).render(&StaffModel::new());
        assert_eq!(display.slots.len(), 8);
        assert!(display.slots.iter().all(RenderSlot::is_placeholder));
        assert_eq!(
            display.slots.iter().map(|s| s.position).collect::<Vec<_>>(),
            (1..=8).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_chord_orders_ascending_and_flags_overlap() {
        let data = data();
        let mut staff = StaffModel::new();
        staff
            .insert("AAA", "Alpha", vec![IndicatorId(1), IndicatorId(3), IndicatorId(7)])
            .unwrap();
        let slot = StaffRenderer::new(&data, 2020, Mode::Major).render_slot(&staff, 1);

        let SlotContent::Chord { chord } = &slot.content else {
            panic!("expected chord, got {:?}", slot.content);
        };
        let values: Vec<f64> = chord.notes.iter().map(|n| n.value).collect();
        assert_eq!(values, vec![30.0, 34.0, 70.0]);
        // 30 and 34 share the 30 line
        assert!(!chord.notes[0].overlapping);
        assert!(chord.notes[1].overlapping);
        assert!(!chord.notes[2].overlapping);
        assert!(chord.notes.iter().all(|n| n.stem == chord.stem));
        assert_eq!(chord.stem, StemDirection::Down);
    }

    #[test]
    fn test_partial_resolution_renders_single_note() {
        let data = data();
        let mut staff = StaffModel::new();
        staff.insert("BBB", "Beta", vec![IndicatorId(1), IndicatorId(3)]).unwrap();
        let slot = StaffRenderer::new(&data, 2020, Mode::Minor).render_slot(&staff, 1);
        match &slot.content {
            SlotContent::Note { note } => {
                assert_eq!(note.indicator, IndicatorId(1));
                assert_eq!(note.pitch.full_name, "Ab4");
                assert_eq!(note.stem, StemDirection::Down);
                assert_eq!(note.title, "Ab4 (Value: 55)");
            }
            other => panic!("expected note, got {:?}", other),
        }
        assert!(slot.affordances.contains(&Affordance::Play));
    }

    #[test]
    fn test_missing_year_renders_rest() {
        let data = data();
        let mut staff = StaffModel::new();
        staff.insert("AAA", "Alpha", vec![IndicatorId(1)]).unwrap();
        let slot = StaffRenderer::new(&data, 2015, Mode::Major).render_slot(&staff, 1);
        assert_eq!(slot.content, SlotContent::Rest);
        assert!(slot.affordances.contains(&Affordance::Delete));
        assert!(!slot.affordances.contains(&Affordance::Play));
        assert_eq!(slot.title.as_deref(), Some("Alpha - SDG 1"));
    }
}
