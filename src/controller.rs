//! Staff controller
//!
//! The single owner of composer state: the staff model, mode, active year,
//! tempo, playback loop, selection, and session log. Every public entry
//! point mutates the model first and then re-projects the affected part of
//! the display, notifying observers with a `ComposerEvent`.
//!
//! Insert, remove and swap re-render only the touched slots; shuffle,
//! clear, mode and year changes rebuild all slots and report which ones
//! actually changed.

use crate::models::config::ComposerConfig;
use crate::models::indicator::IndicatorId;
use crate::models::indicator_data::{DataError, IndicatorData};
use crate::models::notice::Notice;
use crate::models::pitch::Mode;
use crate::models::staff::{NoteEntry, StaffError, StaffModel, SwapOutcome};
use crate::models::tempo::Tempo;
use crate::playback::audio::{sound_unit, AudioSink, ChordTone, PlaybackUnit, SynthesisError};
use crate::playback::controller::{PlaybackController, PlaybackEvent, StartRefusal};
use crate::renderers::diff::changed_positions;
use crate::renderers::staff::{RenderSlot, StaffDisplayList, StaffRenderer};
use crate::selection::{CountryClick, IndicatorToggle, InfoPanel, SelectionController};
use crate::session::clock::Clock;
use crate::session::logger::{EventPayload, InteractionLogger, SessionExport};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComposerError {
    #[error(transparent)]
    Staff(#[from] StaffError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

pub type Result<T> = std::result::Result<T, ComposerError>;

/// What the view has to redraw
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderPatch {
    /// Replace just these slots
    Slots { slots: Vec<RenderSlot> },
    /// Whole staff rebuilt; `changed` lists the slots that differ
    Full {
        display: StaffDisplayList,
        changed: Vec<u8>,
    },
}

/// Notification sent to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ComposerEvent {
    Render { patch: RenderPatch },
    #[serde(rename_all = "camelCase")]
    Highlight { position: u8, until_ms: f64 },
    ClearHighlight { position: u8 },
    Notice { notice: Notice },
    PlaybackState { playing: bool },
    Panel { panel: Option<InfoPanel> },
}

pub type SubscriptionId = u32;

type Observer = Box<dyn FnMut(&ComposerEvent)>;

/// Resolve the sounding tones of every occupied slot, in position order
pub fn build_playback_units(
    staff: &StaffModel,
    data: &IndicatorData,
    year: u16,
    mode: Mode,
    config: &ComposerConfig,
) -> Vec<PlaybackUnit> {
    let renderer = StaffRenderer::new(data, year, mode);
    staff
        .entries_in_order()
        .into_iter()
        .map(|entry| unit_from_slot(&renderer.render_slot(staff, entry.position), config))
        .collect()
}

fn unit_from_slot(slot: &RenderSlot, config: &ComposerConfig) -> PlaybackUnit {
    PlaybackUnit {
        position: slot.position,
        tones: slot
            .sounding_notes()
            .into_iter()
            .map(|note| ChordTone {
                pitch: note.pitch.clone(),
                timbre: config.timbre_for(note.indicator).to_string(),
            })
            .collect(),
    }
}

pub struct StaffController {
    config: ComposerConfig,
    staff: StaffModel,
    data: IndicatorData,
    mode: Mode,
    year: u16,
    tempo: Tempo,
    playback: PlaybackController,
    playback_started_ms: Option<f64>,
    selection: SelectionController,
    logger: InteractionLogger,
    display: StaffDisplayList,
    audio: Box<dyn AudioSink>,
    clock: Box<dyn Clock>,
    rng: ChaCha8Rng,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: SubscriptionId,
}

impl StaffController {
    pub fn new(config: ComposerConfig, audio: Box<dyn AudioSink>, clock: Box<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let data = IndicatorData::new();
        let staff = StaffModel::new();
        let mode = config.default_mode;
        let year = config.default_year;
        let display = StaffRenderer::new(&data, year, mode).render(&staff);
        let rng = match config.shuffle_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            tempo: Tempo::from_bpm(config.default_tempo, &config.tempo_range()),
            selection: SelectionController::new(
                config.max_indicators,
                config.selectable_indicators.clone(),
            ),
            config,
            staff,
            data,
            mode,
            year,
            playback: PlaybackController::new(),
            playback_started_ms: None,
            logger: InteractionLogger::new(),
            display,
            audio,
            clock,
            rng,
            observers: Vec::new(),
            next_subscription: 1,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn staff(&self) -> &StaffModel {
        &self.staff
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn logger(&self) -> &InteractionLogger {
        &self.logger
    }

    pub fn data(&self) -> &IndicatorData {
        &self.data
    }

    /// The display list as last projected
    pub fn display(&self) -> &StaffDisplayList {
        &self.display
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self, observer: Box<dyn FnMut(&ComposerEvent)>) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    fn emit(&mut self, event: ComposerEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    fn notify(&mut self, notice: Notice) {
        let notice = notice.with_duration(self.config.notice_duration_ms);
        self.emit(ComposerEvent::Notice { notice });
    }

    fn record(&mut self, event: &str, payload: EventPayload) {
        let now = self.clock.now_ms();
        self.logger.log(event, payload, now);
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    fn renderer(&self) -> StaffRenderer<'_> {
        StaffRenderer::new(&self.data, self.year, self.mode)
    }

    /// Re-project the given slots only
    fn render_slots(&mut self, positions: &[u8]) {
        let slots: Vec<RenderSlot> = positions
            .iter()
            .map(|pos| self.renderer().render_slot(&self.staff, *pos))
            .collect();
        for slot in &slots {
            if let Some(existing) = self.display.slots.iter_mut().find(|s| s.position == slot.position) {
                *existing = slot.clone();
            }
        }
        self.emit(ComposerEvent::Render {
            patch: RenderPatch::Slots { slots },
        });
    }

    /// Rebuild all slots and report which changed
    fn render_full(&mut self) {
        let display = self.renderer().render(&self.staff);
        let changed = changed_positions(Some(&self.display), &display);
        self.display = display.clone();
        self.emit(ComposerEvent::Render {
            patch: RenderPatch::Full { display, changed },
        });
    }

    /// Current display list (full projection from the model)
    pub fn render_staff(&self) -> StaffDisplayList {
        self.renderer().render(&self.staff)
    }

    fn refresh_panel(&mut self) {
        let panel = self.info_panel();
        self.emit(ComposerEvent::Panel { panel });
    }

    pub fn info_panel(&self) -> Option<InfoPanel> {
        self.selection.info_panel(&self.data, self.year, &self.staff)
    }

    // ------------------------------------------------------------------
    // Data and session
    // ------------------------------------------------------------------

    /// Replace the indicator data set and re-resolve every slot
    pub fn load_data(&mut self, data: IndicatorData) {
        self.data = data;
        self.render_full();
        self.refresh_panel();
    }

    pub fn load_data_json(&mut self, json: &str) -> Result<()> {
        let data = IndicatorData::from_json(json)?;
        self.load_data(data);
        Ok(())
    }

    pub fn start_session(&mut self, session_id: Option<String>) -> String {
        let now = self.clock.now_ms();
        self.logger.start_session(session_id, now)
    }

    pub fn end_session(&mut self) -> Option<SessionExport> {
        let now = self.clock.now_ms();
        self.logger.end_session(now)
    }

    pub fn export_csv(&self) -> String {
        self.logger.to_csv()
    }

    fn entry_payload(&self, entry: &NoteEntry) -> EventPayload {
        EventPayload {
            iso: Some(entry.country_id.clone()),
            country: Some(entry.country_label.clone()),
            position: Some(entry.position),
            sdgs: Some(entry.indicator_ids.iter().map(IndicatorId::number).collect()),
            values: Some(self.data.values(&entry.country_id, self.year, &entry.indicator_ids)),
            year: Some(self.year),
            note_count: Some(self.staff.len()),
            ..Default::default()
        }
    }

    // ------------------------------------------------------------------
    // Staff operations
    // ------------------------------------------------------------------

    /// Add a note at the lowest free slot
    pub fn insert_note(
        &mut self,
        country_id: &str,
        country_label: &str,
        indicator_ids: Vec<IndicatorId>,
    ) -> Result<u8> {
        let position = match self.staff.insert(country_id, country_label, indicator_ids) {
            Ok(position) => position,
            Err(StaffError::StaffFull) => {
                log::warn!("Insert of {} refused: staff is full", country_label);
                self.notify(Notice::blocking(StaffError::StaffFull.to_string()));
                return Err(StaffError::StaffFull.into());
            }
            Err(e) => return Err(e.into()),
        };

        self.render_slots(&[position]);
        if let Some(entry) = self.staff.get(position).cloned() {
            let payload = self.entry_payload(&entry);
            self.record("note_added", payload);
        }
        log::info!(
            "✅ Added {} at position {} ({}/{})",
            country_label,
            position,
            self.staff.len(),
            crate::models::staff::CAPACITY
        );
        self.notify(Notice::transient(format!(
            "Added {} to staff! ({} left)",
            country_label,
            self.staff.free_count()
        )));
        self.refresh_panel();
        Ok(position)
    }

    /// Remove the note at `position`; an empty slot is left alone
    pub fn remove_note(&mut self, position: u8) -> Result<Option<NoteEntry>> {
        let before = self.staff.len();
        let Some(entry) = self.staff.remove(position)? else {
            log::debug!("Remove at {}: slot already free", position);
            return Ok(None);
        };

        self.render_slots(&[position]);
        let mut payload = self.entry_payload(&entry);
        payload.note_count_before = Some(before);
        self.record("note_removed", payload);
        self.notify(Notice::transient(format!("Removed note from position {}", position)));
        self.refresh_panel();
        Ok(Some(entry))
    }

    /// Drag-and-drop: exchange the contents of two slots
    pub fn swap_positions(&mut self, from: u8, to: u8) -> Result<SwapOutcome> {
        let dragged = self.staff.get(from).cloned();
        let target = self.staff.get(to).cloned();
        let outcome = self.staff.swap(from, to)?;

        if matches!(outcome, SwapOutcome::Moved | SwapOutcome::Exchanged) {
            self.render_slots(&[from, to]);
            self.record(
                "notes_swapped",
                EventPayload {
                    from_position: Some(from),
                    to_position: Some(to),
                    dragged_country: dragged.as_ref().map(|e| e.country_label.clone()),
                    dragged_iso: dragged.as_ref().map(|e| e.country_id.clone()),
                    target_country: target.as_ref().map(|e| e.country_label.clone()),
                    target_iso: target.as_ref().map(|e| e.country_id.clone()),
                    note_count: Some(self.staff.len()),
                    ..Default::default()
                },
            );
        }
        Ok(outcome)
    }

    /// Random reorder, compacting notes to the front
    pub fn shuffle_staff(&mut self) {
        self.staff.shuffle(&mut self.rng);
        self.render_full();
        self.record(
            "staff_shuffled",
            EventPayload {
                note_count: Some(self.staff.len()),
                ..Default::default()
            },
        );
    }

    /// Remove every note and close the info panel
    pub fn clear_staff(&mut self) {
        let removed = self.staff.clear();
        self.selection.close_panel();
        self.render_full();
        self.record(
            "staff_cleared",
            EventPayload {
                note_count_before: Some(removed.len()),
                note_count: Some(0),
                ..Default::default()
            },
        );
        self.refresh_panel();
    }

    // ------------------------------------------------------------------
    // Mode, tempo, year
    // ------------------------------------------------------------------

    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        self.render_full();
        self.record(
            "mode_changed",
            EventPayload {
                mode: Some(mode.to_string()),
                note_count: Some(self.staff.len()),
                ..Default::default()
            },
        );
    }

    pub fn toggle_mode(&mut self) -> Mode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    /// Set tempo from a number; takes effect on the next start
    pub fn set_tempo(&mut self, bpm: f64) -> Tempo {
        self.apply_tempo(Tempo::from_bpm(bpm, &self.config.tempo_range()))
    }

    /// Set tempo from raw user input; unparseable input resets to default
    pub fn set_tempo_input(&mut self, input: &str) -> Tempo {
        self.apply_tempo(Tempo::parse(input, &self.config.tempo_range()))
    }

    fn apply_tempo(&mut self, tempo: Tempo) -> Tempo {
        if tempo != self.tempo {
            self.tempo = tempo;
            self.record(
                "tempo_changed",
                EventPayload {
                    tempo: Some(tempo.bpm()),
                    ..Default::default()
                },
            );
        }
        self.tempo
    }

    /// Change the active year (clamped); every slot re-resolves its values
    pub fn set_year(&mut self, year: u16) -> u16 {
        let year = self.config.clamp_year(year);
        if year != self.year {
            self.year = year;
            self.render_full();
            self.record(
                "year_changed",
                EventPayload {
                    year: Some(year),
                    ..Default::default()
                },
            );
            self.refresh_panel();
        }
        self.year
    }

    /// Year stepper; stops at the range edges
    pub fn step_year(&mut self, delta: i32) -> u16 {
        let target = (self.year as i32)
            .saturating_add(delta)
            .clamp(self.config.year_min as i32, self.config.year_max as i32);
        self.set_year(target as u16)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    fn current_units(&self) -> Vec<PlaybackUnit> {
        build_playback_units(&self.staff, &self.data, self.year, self.mode, &self.config)
    }

    /// Start looping. Returns false when refused (already playing or empty).
    pub fn start_playback(&mut self) -> bool {
        let now = self.clock.now_ms();
        let units = self.current_units();
        let count = units.len();
        match self.playback.start(units, self.tempo, now) {
            Ok(events) => {
                self.playback_started_ms = Some(now);
                self.emit(ComposerEvent::PlaybackState { playing: true });
                self.record(
                    "playback_started",
                    EventPayload {
                        tempo: Some(self.tempo.bpm()),
                        note_count: Some(count),
                        mode: Some(self.mode.to_string()),
                        ..Default::default()
                    },
                );
                self.dispatch_playback(events);
                true
            }
            Err(StartRefusal::AlreadyPlaying) => {
                log::warn!("Playback already running; stop it first");
                false
            }
            Err(StartRefusal::NothingToPlay) => {
                self.notify(Notice::transient("No notes to play!"));
                false
            }
        }
    }

    pub fn stop_playback(&mut self) {
        let events = self.playback.stop();
        self.dispatch_playback(events);
    }

    /// Play/stop button: returns whether playback is running afterwards
    pub fn toggle_playback(&mut self) -> bool {
        if self.is_playing() {
            self.stop_playback();
            false
        } else {
            self.start_playback()
        }
    }

    /// Advance the playback loop to the current time
    pub fn tick(&mut self) {
        if !self.playback.is_playing() {
            return;
        }
        let now = self.clock.now_ms();
        let (staff, data, year, mode, config) = (&self.staff, &self.data, self.year, self.mode, &self.config);
        let mut reload = || build_playback_units(staff, data, year, mode, config);
        let events = self.playback.poll(now, &mut reload);
        self.dispatch_playback(events);
    }

    fn dispatch_playback(&mut self, events: Vec<PlaybackEvent>) {
        for event in events {
            match event {
                PlaybackEvent::Play {
                    position,
                    tones,
                    duration_secs,
                    ..
                } => {
                    if let Err(e) = self.sound(&tones, duration_secs) {
                        log::warn!("Skipping beat at position {}: {}", position, e);
                    }
                }
                PlaybackEvent::Highlight { position, until_ms } => {
                    self.emit(ComposerEvent::Highlight { position, until_ms });
                }
                PlaybackEvent::ClearHighlight { position } => {
                    self.emit(ComposerEvent::ClearHighlight { position });
                }
                PlaybackEvent::LoopRestart { cycle } => {
                    log::debug!("Playback pass {}", cycle);
                }
                PlaybackEvent::Stopped => {
                    let now = self.clock.now_ms();
                    let duration = self.playback_started_ms.take().map(|start| now - start);
                    self.emit(ComposerEvent::PlaybackState { playing: false });
                    self.record(
                        "playback_stopped",
                        EventPayload {
                            duration,
                            ..Default::default()
                        },
                    );
                }
            }
        }
    }

    fn sound(&mut self, tones: &[ChordTone], duration_secs: f64) -> std::result::Result<(), SynthesisError> {
        if !self.config.sound_enabled {
            return Ok(());
        }
        sound_unit(&mut *self.audio, tones, duration_secs, self.config.note_volume)
    }

    /// Click-to-play on one slot. Free slots and rests are silent.
    pub fn play_slot(&mut self, position: u8) -> Result<()> {
        if !crate::models::staff::is_valid_position(position) {
            return Err(StaffError::InvalidSlot(position).into());
        }
        let Some(entry) = self.staff.get(position).cloned() else {
            return Ok(());
        };
        let unit = unit_from_slot(&self.renderer().render_slot(&self.staff, position), &self.config);
        if let Err(e) = self.sound(&unit.tones, self.config.preview_duration_secs) {
            log::warn!("Preview at position {} skipped: {}", position, e);
        }
        let payload = self.entry_payload(&entry);
        self.record("note_previewed", payload);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn toggle_indicator(&mut self, id: IndicatorId, checked: bool) -> IndicatorToggle {
        let result = self.selection.toggle_indicator(id, checked);
        match &result {
            IndicatorToggle::Selected | IndicatorToggle::Deselected => {
                let event = if matches!(result, IndicatorToggle::Selected) {
                    "sdg_selected"
                } else {
                    "sdg_deselected"
                };
                self.record(
                    event,
                    EventPayload {
                        sdg: Some(id.number()),
                        ..Default::default()
                    },
                );
                self.refresh_panel();
            }
            IndicatorToggle::Rejected(notice) => self.notify(notice.clone()),
            IndicatorToggle::Unchanged => {}
        }
        result
    }

    pub fn click_country(&mut self, country_id: &str, country_label: &str) -> CountryClick {
        let result = self.selection.click_country(country_id, country_label);
        match &result {
            CountryClick::Selected | CountryClick::Deselected => {
                let event = if matches!(result, CountryClick::Selected) {
                    "country_selected"
                } else {
                    "country_deselected"
                };
                self.record(
                    event,
                    EventPayload {
                        iso: Some(country_id.to_string()),
                        country: Some(country_label.to_string()),
                        year: Some(self.year),
                        ..Default::default()
                    },
                );
                self.refresh_panel();
            }
            CountryClick::Rejected(notice) => self.notify(notice.clone()),
        }
        result
    }

    pub fn close_panel(&mut self) {
        if self.selection.close_panel().is_some() {
            self.refresh_panel();
        }
    }

    pub fn open_composer(&mut self) {
        self.selection.set_composer_open(true);
        self.refresh_panel();
    }

    pub fn close_composer(&mut self) {
        self.selection.set_composer_open(false);
        self.refresh_panel();
    }

    /// "Add to Staff" from the info panel
    pub fn request_insert(&mut self) -> std::result::Result<u8, Notice> {
        let request = match self.selection.insert_request(&self.staff) {
            Ok(request) => request,
            Err(notice) => {
                self.notify(notice.clone());
                return Err(notice);
            }
        };
        self.insert_note(&request.country_id, &request.country_label, request.indicator_ids)
            .map_err(|e| Notice::blocking(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::audio::SilentAudio;
    use crate::session::clock::ManualClock;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn controller() -> StaffController {
        let config = ComposerConfig {
            shuffle_seed: Some(3),
            ..Default::default()
        };
        StaffController::new(config, Box::new(SilentAudio), Box::new(ManualClock::new(0.0))).unwrap()
    }

    #[test]
    fn test_insert_emits_single_slot_patch() {
        let mut ctl = controller();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        ctl.subscribe(Box::new(move |e: &ComposerEvent| sink.borrow_mut().push(e.clone())));

        ctl.insert_note("FRA", "France", vec![IndicatorId(1)]).unwrap();

        let events = events.borrow();
        let patch = events
            .iter()
            .find_map(|e| match e {
                ComposerEvent::Render { patch } => Some(patch.clone()),
                _ => None,
            })
            .unwrap();
        match patch {
            RenderPatch::Slots { slots } => {
                assert_eq!(slots.len(), 1);
                assert_eq!(slots[0].position, 1);
            }
            other => panic!("expected slot patch, got {:?}", other),
        }
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut ctl = controller();
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let id = ctl.subscribe(Box::new(move |_: &ComposerEvent| *sink.borrow_mut() += 1));
        ctl.shuffle_staff();
        let seen = *count.borrow();
        assert!(seen > 0);
        assert!(ctl.unsubscribe(id));
        ctl.shuffle_staff();
        assert_eq!(*count.borrow(), seen);
        assert!(!ctl.unsubscribe(id));
    }

    #[test]
    fn test_display_tracks_model() {
        let mut ctl = controller();
        ctl.insert_note("FRA", "France", vec![IndicatorId(1)]).unwrap();
        ctl.insert_note("DEU", "Germany", vec![IndicatorId(1)]).unwrap();
        ctl.swap_positions(1, 6).unwrap();
        assert_eq!(ctl.display(), &ctl.render_staff());
        ctl.remove_note(2).unwrap();
        assert_eq!(ctl.display(), &ctl.render_staff());
    }

    #[test]
    fn test_step_year_stops_at_edges() {
        let mut ctl = controller();
        assert_eq!(ctl.step_year(1), 2024);
        assert_eq!(ctl.step_year(-1), 2023);
        assert_eq!(ctl.set_year(1999), 2015);
        assert_eq!(ctl.step_year(-1), 2015);
    }

    #[test]
    fn test_step_year_extreme_deltas_clamp() {
        let mut ctl = controller();
        assert_eq!(ctl.step_year(i32::MAX), 2024);
        assert_eq!(ctl.step_year(i32::MIN), 2015);
        assert_eq!(ctl.step_year(i32::MAX), 2024);
    }

    #[test]
    fn test_tempo_input() {
        let mut ctl = controller();
        assert_eq!(ctl.tempo().bpm(), 86.0);
        assert_eq!(ctl.set_tempo(300.0).bpm(), 240.0);
        assert_eq!(ctl.set_tempo_input("").bpm(), 86.0);
    }
}
