// End-to-end composer flows: staff edits, render patches, looping playback,
// selection gating and the session CSV export

use composer_wasm::controller::{ComposerError, ComposerEvent, RenderPatch, StaffController};
use composer_wasm::models::config::ComposerConfig;
use composer_wasm::models::indicator::IndicatorId;
use composer_wasm::models::pitch::{Mode, PitchInfo};
use composer_wasm::models::staff::{StaffError, SwapOutcome};
use composer_wasm::playback::audio::{AudioSink, ChordTone, SynthesisError};
use composer_wasm::selection::{CountryClick, IndicatorToggle};
use composer_wasm::session::clock::ManualClock;
use composer_wasm::session::logger::CSV_HEADERS;
use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

// 2024-03-15T14:22:00Z
const T0: f64 = 1_710_512_520_000.0;

const DATA: &str = r#"{
    "FRA": { "2024": { "sdg1": 70, "sdg3": 30, "sdg7": 55 }, "2023": { "sdg1": 20 } },
    "KEN": { "2024": { "sdg1": 15, "sdg7": 85 } },
    "NOR": { "2024": { "sdg13": 40 } }
}"#;

#[derive(Debug, Clone, PartialEq)]
enum Sound {
    Note(String),
    Chord(Vec<String>),
}

#[derive(Clone, Default)]
struct RecordingAudio {
    played: Rc<RefCell<Vec<Sound>>>,
    fail: bool,
}

impl AudioSink for RecordingAudio {
    fn play_note(&mut self, pitch: &PitchInfo, _: f64, _: f64, _: &str) -> Result<(), SynthesisError> {
        if self.fail {
            return Err(SynthesisError::Unavailable("context suspended".into()));
        }
        self.played.borrow_mut().push(Sound::Note(pitch.full_name.clone()));
        Ok(())
    }

    fn play_chord(&mut self, tones: &[ChordTone], _: f64) -> Result<(), SynthesisError> {
        if self.fail {
            return Err(SynthesisError::Unavailable("context suspended".into()));
        }
        self.played.borrow_mut().push(Sound::Chord(
            tones.iter().map(|t| t.pitch.full_name.clone()).collect(),
        ));
        Ok(())
    }
}

struct Harness {
    ctl: StaffController,
    clock: ManualClock,
    audio: RecordingAudio,
    events: Rc<RefCell<Vec<ComposerEvent>>>,
}

fn harness_with(config: ComposerConfig, audio: RecordingAudio) -> Harness {
    let clock = ManualClock::new(T0);
    let mut ctl = StaffController::new(config, Box::new(audio.clone()), Box::new(clock.clone()))
        .expect("valid config");
    ctl.load_data_json(DATA).expect("fixture parses");

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    ctl.subscribe(Box::new(move |e: &ComposerEvent| sink.borrow_mut().push(e.clone())));

    Harness { ctl, clock, audio, events }
}

fn harness() -> Harness {
    let config = ComposerConfig {
        shuffle_seed: Some(42),
        ..Default::default()
    };
    harness_with(config, RecordingAudio::default())
}

impl Harness {
    fn take_events(&self) -> Vec<ComposerEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    fn played(&self) -> Vec<Sound> {
        self.audio.played.borrow().clone()
    }

    fn event_names(&self) -> Vec<String> {
        self.ctl.logger().events().iter().map(|e| e.event.clone()).collect()
    }
}

fn notices(events: &[ComposerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ComposerEvent::Notice { notice } => Some(notice.message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_insert_remove_and_swap_patch_only_touched_slots() {
    let mut h = harness();
    h.ctl.insert_note("FRA", "France", vec![IndicatorId(1), IndicatorId(3)]).unwrap();
    h.ctl.insert_note("KEN", "Kenya", vec![IndicatorId(1)]).unwrap();
    h.take_events();

    assert_eq!(h.ctl.swap_positions(1, 2).unwrap(), SwapOutcome::Exchanged);
    let events = h.take_events();
    let patched: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            ComposerEvent::Render { patch: RenderPatch::Slots { slots } } => {
                Some(slots.iter().map(|s| s.position).collect::<Vec<_>>())
            }
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(patched, vec![1, 2]);
    assert_eq!(h.ctl.staff().get(1).unwrap().country_id, "KEN");

    let removed = h.ctl.remove_note(1).unwrap().unwrap();
    assert_eq!(removed.country_id, "KEN");
    assert_eq!(notices(&h.take_events()), vec!["Removed note from position 1"]);
    assert!(h.ctl.display().slot(1).unwrap().is_placeholder());

    // already free: benign no-op, nothing emitted
    assert_eq!(h.ctl.remove_note(1).unwrap(), None);
    assert!(h.take_events().is_empty());
}

#[test]
fn test_ninth_insert_is_refused_with_blocking_notice() {
    let mut h = harness();
    for i in 0..8 {
        h.ctl.insert_note(&format!("C{}", i), "Somewhere", vec![IndicatorId(1)]).unwrap();
    }
    h.take_events();

    let err = h.ctl.insert_note("FRA", "France", vec![IndicatorId(1)]).unwrap_err();
    assert_eq!(err, ComposerError::Staff(StaffError::StaffFull));
    let events = h.take_events();
    let blocking: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            ComposerEvent::Notice { notice } => Some(notice.is_blocking()),
            _ => None,
        })
        .collect();
    assert_eq!(blocking, vec![true]);
    assert_eq!(h.ctl.staff().len(), 8);
}

#[test]
fn test_invalid_slot_is_rejected_without_mutation() {
    let mut h = harness();
    h.ctl.insert_note("FRA", "France", vec![IndicatorId(1)]).unwrap();
    let before = h.ctl.staff().clone();

    assert_eq!(
        h.ctl.remove_note(9).unwrap_err(),
        ComposerError::Staff(StaffError::InvalidSlot(9))
    );
    assert!(h.ctl.swap_positions(0, 1).is_err());
    assert!(h.ctl.play_slot(12).is_err());
    assert_eq!(h.ctl.staff(), &before);
}

#[test]
fn test_mode_and_year_rebuild_report_changed_slots() {
    let mut h = harness();
    h.ctl.insert_note("FRA", "France", vec![IndicatorId(1)]).unwrap();
    h.ctl.insert_note("NOR", "Norway", vec![IndicatorId(13)]).unwrap();
    h.take_events();

    // 70 -> B (degree 7, lowered); 40 -> F (degree 4, unchanged)
    h.ctl.set_mode(Mode::Minor);
    let changed = h.take_events().into_iter().find_map(|e| match e {
        ComposerEvent::Render { patch: RenderPatch::Full { changed, .. } } => Some(changed),
        _ => None,
    });
    assert_eq!(changed, Some(vec![1]));

    // NOR has no 2023 data: slot 2 becomes a rest; FRA moves from 70 to 20
    assert_eq!(h.ctl.set_year(2023), 2023);
    let changed = h.take_events().into_iter().find_map(|e| match e {
        ComposerEvent::Render { patch: RenderPatch::Full { changed, .. } } => Some(changed),
        _ => None,
    });
    assert_eq!(changed, Some(vec![1, 2]));
    assert_eq!(h.ctl.display(), &h.ctl.render_staff());

    // same mode again: nothing happens
    h.ctl.set_mode(Mode::Minor);
    assert!(h.take_events().is_empty());
}

#[test]
fn test_playback_loops_and_picks_up_edits_at_pass_boundary() {
    let mut h = harness();
    h.ctl.set_tempo(120.0);
    h.ctl.insert_note("FRA", "France", vec![IndicatorId(1), IndicatorId(3)]).unwrap();
    h.ctl.insert_note("KEN", "Kenya", vec![IndicatorId(1)]).unwrap();

    assert!(h.ctl.start_playback());
    assert!(!h.ctl.start_playback(), "second start is refused");
    assert_eq!(h.played(), vec![Sound::Chord(vec!["E4".into(), "B4".into()])]);

    // removal mid-pass: the snapshot still sounds slot 2 this pass
    h.clock.advance(100.0);
    h.ctl.remove_note(2).unwrap();
    h.clock.advance(400.0);
    h.ctl.tick();
    assert_eq!(h.played().len(), 2);
    assert_eq!(h.played()[1], Sound::Note("D4".into()));

    // next pass only has slot 1
    h.clock.set(T0 + 1400.0);
    h.ctl.tick();
    assert_eq!(h.played().len(), 3);
    assert!(h.ctl.is_playing());

    h.ctl.stop_playback();
    assert!(!h.ctl.is_playing());
    let last_state = h.take_events().into_iter().rev().find_map(|e| match e {
        ComposerEvent::PlaybackState { playing } => Some(playing),
        _ => None,
    });
    assert_eq!(last_state, Some(false));

    // ticking after stop does nothing
    h.clock.advance(5000.0);
    h.ctl.tick();
    assert_eq!(h.played().len(), 3);
}

#[test]
fn test_clearing_during_playback_stops_at_next_pass() {
    let mut h = harness();
    h.ctl.set_tempo(120.0);
    h.ctl.insert_note("FRA", "France", vec![IndicatorId(7)]).unwrap();
    assert!(h.ctl.start_playback());

    h.ctl.clear_staff();
    h.clock.advance(600.0);
    h.ctl.tick();
    assert!(!h.ctl.is_playing());
}

#[test]
fn test_start_with_empty_staff_shows_notice() {
    let mut h = harness();
    assert!(!h.ctl.start_playback());
    assert_eq!(notices(&h.take_events()), vec!["No notes to play!"]);
    assert!(!h.ctl.toggle_playback());
}

#[test]
fn test_rest_is_highlighted_but_silent() {
    let mut h = harness();
    h.ctl.set_tempo(60.0);
    h.ctl.insert_note("NOR", "Norway", vec![IndicatorId(1)]).unwrap();
    h.take_events();

    assert!(h.ctl.start_playback());
    assert!(h.played().is_empty());
    let highlighted = h.take_events().iter().any(|e| matches!(e, ComposerEvent::Highlight { position: 1, .. }));
    assert!(highlighted);
}

#[test]
fn test_audio_failure_is_skipped_not_fatal() {
    let audio = RecordingAudio {
        fail: true,
        ..Default::default()
    };
    let mut h = harness_with(ComposerConfig::default(), audio);
    h.ctl.insert_note("FRA", "France", vec![IndicatorId(1)]).unwrap();
    assert!(h.ctl.start_playback());
    assert!(h.ctl.play_slot(1).is_ok());
    assert!(h.ctl.is_playing());
}

#[test]
fn test_sound_disabled_makes_no_audio_calls() {
    let config = ComposerConfig {
        sound_enabled: false,
        ..Default::default()
    };
    let mut h = harness_with(config, RecordingAudio::default());
    h.ctl.insert_note("FRA", "France", vec![IndicatorId(1)]).unwrap();
    h.ctl.play_slot(1).unwrap();
    assert!(h.ctl.start_playback());
    assert!(h.played().is_empty());
}

#[test]
fn test_selection_gates_add_to_staff() {
    let mut h = harness();

    assert!(matches!(h.ctl.click_country("KEN", "Kenya"), CountryClick::Rejected(_)));
    assert_eq!(h.ctl.toggle_indicator(IndicatorId(1), true), IndicatorToggle::Selected);
    assert_eq!(h.ctl.toggle_indicator(IndicatorId(7), true), IndicatorToggle::Selected);
    assert_eq!(h.ctl.click_country("KEN", "Kenya"), CountryClick::Selected);

    // composer closed
    assert!(h.ctl.request_insert().is_err());
    h.ctl.open_composer();
    let panel = h.ctl.info_panel().unwrap();
    assert_eq!(panel.add_label, "+ Add to Staff (8 left)");
    assert_eq!(panel.rows[1].display, "85.0");

    assert_eq!(h.ctl.request_insert(), Ok(1));
    let entry = h.ctl.staff().get(1).unwrap();
    assert_eq!(entry.indicator_ids, vec![IndicatorId(1), IndicatorId(7)]);
    assert_eq!(h.ctl.info_panel().unwrap().add_label, "+ Add to Staff (7 left)");

    h.ctl.close_panel();
    assert!(h.ctl.info_panel().is_none());
}

#[test]
fn test_shuffle_is_reproducible_with_seed() {
    let mut a = harness();
    let mut b = harness();
    for h in [&mut a, &mut b] {
        for id in ["FRA", "KEN", "NOR"] {
            h.ctl.insert_note(id, id, vec![IndicatorId(1)]).unwrap();
        }
        h.ctl.shuffle_staff();
    }
    let order = |h: &Harness| -> Vec<String> {
        h.ctl.staff().entries_in_order().iter().map(|e| e.country_id.clone()).collect()
    };
    assert_eq!(order(&a), order(&b));
    assert_eq!(a.ctl.staff().occupied_positions(), vec![1, 2, 3]);
}

#[test]
fn test_session_log_and_csv_export() {
    let mut h = harness();
    let id = h.ctl.start_session(None);
    assert_eq!(id, "session_20240315_1422");

    h.clock.advance(1000.0);
    h.ctl.insert_note("FRA", "France", vec![IndicatorId(1), IndicatorId(3)]).unwrap();
    h.clock.advance(1000.0);
    h.ctl.set_tempo(100.0);
    h.ctl.set_year(2023);
    h.ctl.start_playback();
    h.clock.advance(2000.0);
    h.ctl.stop_playback();

    let export = h.ctl.end_session().unwrap();
    assert_eq!(
        h.event_names(),
        vec![
            "session_start",
            "note_added",
            "tempo_changed",
            "year_changed",
            "playback_started",
            "playback_stopped",
            "session_end",
        ]
    );
    assert_eq!(export.total_events, 7);
    assert_eq!(export.events[5].data.duration, Some(2000.0));
    assert_eq!(export.events[1].data.values, Some(vec![Some(70.0), Some(30.0)]));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    h.ctl.logger().write_csv(file.as_file_mut()).unwrap();
    let mut contents = String::new();
    file.reopen().unwrap().read_to_string(&mut contents).unwrap();

    let mut reader = csv::Reader::from_reader(contents.as_bytes());
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, CSV_HEADERS.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 7);
    assert_eq!(&rows[1][3], "note_added");
    assert_eq!(&rows[1][1], "1.00");
    assert_eq!(&rows[1][9], "1;3");
    assert_eq!(&rows[2][17], "100");
}

#[test]
fn test_session_records_every_interaction() {
    let mut h = harness();
    h.ctl.start_session(Some("s1".into()));

    h.ctl.insert_note("FRA", "France", vec![IndicatorId(1), IndicatorId(3)]).unwrap();
    h.ctl.insert_note("KEN", "Kenya", vec![IndicatorId(1)]).unwrap();
    assert_eq!(h.ctl.swap_positions(1, 5).unwrap(), SwapOutcome::Moved);
    assert_eq!(h.ctl.swap_positions(5, 2).unwrap(), SwapOutcome::Exchanged);
    h.ctl.play_slot(2).unwrap();
    h.ctl.remove_note(5).unwrap();
    h.ctl.shuffle_staff();
    h.ctl.set_mode(Mode::Minor);
    h.ctl.toggle_indicator(IndicatorId(7), true);
    h.ctl.click_country("KEN", "Kenya");
    h.ctl.clear_staff();

    assert_eq!(
        h.event_names(),
        vec![
            "session_start",
            "note_added",
            "note_added",
            "notes_swapped",
            "notes_swapped",
            "note_previewed",
            "note_removed",
            "staff_shuffled",
            "mode_changed",
            "sdg_selected",
            "country_selected",
            "staff_cleared",
        ]
    );

    let events = h.ctl.logger().events();

    // move into a free slot: no target
    let moved = &events[3].data;
    assert_eq!((moved.from_position, moved.to_position), (Some(1), Some(5)));
    assert_eq!(moved.dragged_iso.as_deref(), Some("FRA"));
    assert_eq!(moved.dragged_country.as_deref(), Some("France"));
    assert_eq!(moved.target_iso, None);
    assert_eq!(moved.target_country, None);

    let exchanged = &events[4].data;
    assert_eq!((exchanged.from_position, exchanged.to_position), (Some(5), Some(2)));
    assert_eq!(exchanged.dragged_iso.as_deref(), Some("FRA"));
    assert_eq!(exchanged.target_iso.as_deref(), Some("KEN"));
    assert_eq!(exchanged.target_country.as_deref(), Some("Kenya"));

    let previewed = &events[5].data;
    assert_eq!(previewed.iso.as_deref(), Some("FRA"));
    assert_eq!(previewed.position, Some(2));

    let removed = &events[6].data;
    assert_eq!(removed.iso.as_deref(), Some("KEN"));
    assert_eq!(removed.note_count_before, Some(2));

    assert_eq!(events[7].data.note_count, Some(1));
    assert_eq!(events[8].data.mode.as_deref(), Some("minor"));
    assert_eq!(events[9].data.sdg, Some(7));
    assert_eq!(events[10].data.iso.as_deref(), Some("KEN"));
    assert_eq!(events[10].data.country.as_deref(), Some("Kenya"));
    assert_eq!(events[11].data.note_count_before, Some(1));
    assert_eq!(events[11].data.note_count, Some(0));
}

#[test]
fn test_late_tick_sounds_one_beat_not_a_burst() {
    let mut h = harness();
    h.ctl.set_tempo(240.0);
    h.ctl.insert_note("FRA", "France", vec![IndicatorId(1)]).unwrap();
    assert!(h.ctl.start_playback());
    assert_eq!(h.played().len(), 1);

    // a background tab throttles the timer for a minute
    h.clock.advance(60_000.0);
    h.ctl.tick();
    assert_eq!(h.played().len(), 2);
    assert!(h.ctl.is_playing());

    h.clock.advance(250.0);
    h.ctl.tick();
    assert_eq!(h.played().len(), 3);
}
