//! Looping playback state machine
//!
//! `Idle --start--> Looping --stop--> Idle`. Time is supplied by the caller:
//! `start` plays beat 0 immediately and `poll` emits the events that have
//! come due since the last call, in time order. A poll that arrives more than
//! a beat late skips the missed beats and plays only the current one, so a
//! throttled timer never produces a burst. Beat `i` of a pass sounds at
//! `i * beat` after the pass started; a pass lasts `units * beat`, after which
//! the next pass begins with a freshly captured unit list.
//!
//! Between passes the unit list is a snapshot: edits to the staff during a
//! pass are not heard until the next pass.

use crate::models::tempo::Tempo;
use crate::playback::audio::{ChordTone, PlaybackUnit};
use serde::{Deserialize, Serialize};

/// Fraction of a beat the highlight stays on
pub const HIGHLIGHT_FRACTION: f64 = 0.9;

/// Fraction of a beat a note sounds
pub const NOTE_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Looping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// Sound a unit (empty tones for a rest)
    #[serde(rename_all = "camelCase")]
    Play {
        position: u8,
        beat_index: usize,
        cycle: u32,
        at_ms: f64,
        tones: Vec<ChordTone>,
        duration_secs: f64,
    },
    #[serde(rename_all = "camelCase")]
    Highlight { position: u8, until_ms: f64 },
    ClearHighlight { position: u8 },
    LoopRestart { cycle: u32 },
    Stopped,
}

/// Why `start` did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRefusal {
    AlreadyPlaying,
    NothingToPlay,
}

/// Offsets in ms from the pass start at which each of `count` beats sounds
pub fn beat_offsets(count: usize, tempo: Tempo) -> Vec<f64> {
    let beat = tempo.beat_duration_ms();
    (0..count).map(|i| i as f64 * beat).collect()
}

/// Length of one full pass
pub fn pass_duration_ms(count: usize, tempo: Tempo) -> f64 {
    count as f64 * tempo.beat_duration_ms()
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    state: PlaybackState,
    units: Vec<PlaybackUnit>,
    tempo: Tempo,
    cycle: u32,
    cycle_start_ms: f64,
    next_beat: usize,
    highlight: Option<(u8, f64)>,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackController {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            units: Vec::new(),
            tempo: Tempo::default(),
            cycle: 0,
            cycle_start_ms: 0.0,
            next_beat: 0,
            highlight: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Looping
    }

    /// Tempo of the running (or last) loop
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Units of the current pass, in position order
    pub fn units(&self) -> &[PlaybackUnit] {
        &self.units
    }

    pub fn highlighted(&self) -> Option<u8> {
        self.highlight.map(|(pos, _)| pos)
    }

    /// Begin looping over `units` (already in position order). Beat 0 is
    /// returned immediately. A second start while looping is refused.
    pub fn start(
        &mut self,
        units: Vec<PlaybackUnit>,
        tempo: Tempo,
        now_ms: f64,
    ) -> Result<Vec<PlaybackEvent>, StartRefusal> {
        if self.is_playing() {
            return Err(StartRefusal::AlreadyPlaying);
        }
        if units.is_empty() {
            return Err(StartRefusal::NothingToPlay);
        }

        log::info!(
            "▶️ Playback start: {} units at {} BPM (beat {} ms)",
            units.len(),
            tempo.bpm(),
            tempo.beat_duration_ms()
        );
        self.state = PlaybackState::Looping;
        self.units = units;
        self.tempo = tempo;
        self.cycle = 0;
        self.cycle_start_ms = now_ms;
        self.next_beat = 0;
        self.highlight = None;

        let mut unused_reload = Vec::<PlaybackUnit>::new;
        Ok(self.poll(now_ms, &mut unused_reload))
    }

    /// Cancel the loop. Safe to call when idle (returns no events).
    pub fn stop(&mut self) -> Vec<PlaybackEvent> {
        if !self.is_playing() {
            return Vec::new();
        }
        let mut events = Vec::new();
        if let Some((position, _)) = self.highlight.take() {
            events.push(PlaybackEvent::ClearHighlight { position });
        }
        events.push(PlaybackEvent::Stopped);

        self.state = PlaybackState::Idle;
        self.units.clear();
        self.next_beat = 0;
        log::info!("⏹️ Playback stopped");
        events
    }

    /// Emit the events due at or before `now_ms`, skipping beats missed by
    /// more than one beat length.
    ///
    /// `reload` is called at each pass boundary to capture the next pass;
    /// an empty result ends playback.
    pub fn poll(
        &mut self,
        now_ms: f64,
        reload: &mut dyn FnMut() -> Vec<PlaybackUnit>,
    ) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        let beat = self.tempo.beat_duration_ms();

        while self.is_playing() {
            let next_at = self.cycle_start_ms + self.next_beat as f64 * beat;

            if let Some((position, clear_at)) = self.highlight {
                if clear_at <= next_at && clear_at <= now_ms {
                    events.push(PlaybackEvent::ClearHighlight { position });
                    self.highlight = None;
                    continue;
                }
            }

            if next_at > now_ms {
                break;
            }

            // more than a beat behind (throttled timer): realign on the current beat
            let late = now_ms - next_at;
            if late > beat {
                let skipped = (late / beat).floor() as usize;
                let target = self.next_beat + skipped;
                if target < self.units.len() {
                    self.next_beat = target;
                } else {
                    let grid_ms = next_at + skipped as f64 * beat;
                    self.next_beat = self.units.len();
                    self.cycle_start_ms = grid_ms - self.units.len() as f64 * beat;
                }
                log::debug!("Playback {} ms late, skipped {} beats", late, skipped);
                continue;
            }

            if self.next_beat < self.units.len() {
                let unit = &self.units[self.next_beat];
                let until_ms = next_at + HIGHLIGHT_FRACTION * beat;
                events.push(PlaybackEvent::Highlight {
                    position: unit.position,
                    until_ms,
                });
                events.push(PlaybackEvent::Play {
                    position: unit.position,
                    beat_index: self.next_beat,
                    cycle: self.cycle,
                    at_ms: next_at,
                    tones: unit.tones.clone(),
                    duration_secs: NOTE_FRACTION * beat / 1000.0,
                });
                self.highlight = Some((unit.position, until_ms));
                self.next_beat += 1;
            } else {
                // pass boundary
                self.cycle_start_ms = next_at;
                self.cycle += 1;
                self.next_beat = 0;
                self.units = reload();
                if self.units.is_empty() {
                    log::info!("Playback ran out of notes, stopping");
                    events.extend(self.stop());
                    break;
                }
                events.push(PlaybackEvent::LoopRestart { cycle: self.cycle });
            }
        }
        events
    }
}
