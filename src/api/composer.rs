//! `Composer` class exported to JavaScript
//!
//! Wraps one `StaffController`. The page owns the instance; there is no
//! module-level state. Observers registered with `onEvent` receive every
//! `ComposerEvent` as a plain JS object, and audio is delegated to an
//! optional JS callback.
//!
//! Events are queued while the controller is borrowed and delivered once the
//! call that produced them has released it, so a listener may call back into
//! the composer. The audio callback runs inside the call and must not.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use serde::Serialize;

use crate::api::helpers::{deserialize, indicator_ids, serialize, validate_position, validation_error};
use crate::controller::{ComposerError, ComposerEvent, StaffController};
use crate::models::config::ComposerConfig;
use crate::models::indicator::{IndicatorCatalog, IndicatorId};
use crate::models::pitch::{Mode, PitchInfo};
use crate::playback::audio::{AudioSink, ChordTone, SynthesisError};
use crate::selection::{CountryClick, IndicatorToggle};
use crate::session::clock::SystemClock;
use crate::{wasm_error, wasm_info, wasm_log, wasm_warn};

/// Payload handed to the JS audio callback
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioRequest<'a> {
    kind: &'static str,
    tones: Vec<ChordTone>,
    duration_secs: f64,
    volume: Option<f64>,
    timbre: Option<&'a str>,
}

/// Forwards resolved pitches to a JS function
struct JsAudioSink {
    callback: Option<js_sys::Function>,
}

impl JsAudioSink {
    fn send(&self, request: &AudioRequest) -> Result<(), SynthesisError> {
        let Some(callback) = &self.callback else {
            return Err(SynthesisError::Unavailable("no audio callback registered".into()));
        };
        let payload = serde_wasm_bindgen::to_value(request)
            .map_err(|e| SynthesisError::Unavailable(e.to_string()))?;
        callback
            .call1(&JsValue::NULL, &payload)
            .map(|_| ())
            .map_err(|e| SynthesisError::Unavailable(format!("{:?}", e)))
    }
}

impl AudioSink for JsAudioSink {
    fn play_note(
        &mut self,
        pitch: &PitchInfo,
        duration_secs: f64,
        volume: f64,
        timbre: &str,
    ) -> Result<(), SynthesisError> {
        self.send(&AudioRequest {
            kind: "note",
            tones: vec![ChordTone {
                pitch: pitch.clone(),
                timbre: timbre.to_string(),
            }],
            duration_secs,
            volume: Some(volume),
            timbre: Some(timbre),
        })
    }

    fn play_chord(&mut self, tones: &[ChordTone], duration_secs: f64) -> Result<(), SynthesisError> {
        self.send(&AudioRequest {
            kind: "chord",
            tones: tones.to_vec(),
            duration_secs,
            volume: None,
            timbre: None,
        })
    }
}

fn composer_error(e: ComposerError) -> JsValue {
    validation_error(e.to_string())
}

#[wasm_bindgen]
pub struct Composer {
    inner: RefCell<StaffController>,
    pending: Rc<RefCell<VecDeque<ComposerEvent>>>,
    listeners: RefCell<Vec<(u32, js_sys::Function)>>,
    next_listener: Cell<u32>,
}

impl Composer {
    /// Run a controller operation, then deliver the events it queued
    fn with<R>(&self, op: impl FnOnce(&mut StaffController) -> R) -> R {
        let result = op(&mut self.inner.borrow_mut());
        self.flush();
        result
    }

    fn flush(&self) {
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            let value = match serde_wasm_bindgen::to_value(&event) {
                Ok(value) => value,
                Err(e) => {
                    wasm_error!("Event serialization error: {}", e);
                    continue;
                }
            };
            let listeners: Vec<js_sys::Function> =
                self.listeners.borrow().iter().map(|(_, f)| f.clone()).collect();
            for listener in listeners {
                if let Err(e) = listener.call1(&JsValue::NULL, &value) {
                    wasm_warn!("Observer threw: {:?}", e);
                }
            }
        }
    }
}

#[wasm_bindgen]
impl Composer {
    /// Create a composer.
    ///
    /// # Parameters
    /// - `config_js`: optional config object (camelCase keys); `undefined` for defaults
    /// - `audio`: optional function receiving `{ kind, tones, durationSecs, volume, timbre }`
    #[wasm_bindgen(constructor)]
    pub fn new(config_js: JsValue, audio: Option<js_sys::Function>) -> Result<Composer, JsValue> {
        let config: ComposerConfig = if config_js.is_undefined() || config_js.is_null() {
            ComposerConfig::default()
        } else {
            deserialize(config_js, "Config deserialization error")?
        };
        if audio.is_none() {
            wasm_warn!("Composer created without audio callback; playback will be silent");
        }

        let mut inner = StaffController::new(
            config,
            Box::new(JsAudioSink { callback: audio }),
            Box::new(SystemClock),
        )
        .map_err(composer_error)?;

        let pending = Rc::new(RefCell::new(VecDeque::new()));
        let queue = pending.clone();
        inner.subscribe(Box::new(move |event: &ComposerEvent| {
            queue.borrow_mut().push_back(event.clone());
        }));

        wasm_info!("Composer created");
        Ok(Composer {
            inner: RefCell::new(inner),
            pending,
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
        })
    }

    // ----- observers ------------------------------------------------------

    /// Register a listener; returns its subscription id.
    ///
    /// Listeners are called after the triggering method has finished with
    /// the composer, and may call any composer method.
    #[wasm_bindgen(js_name = onEvent)]
    pub fn on_event(&self, callback: js_sys::Function) -> u32 {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().push((id, callback));
        id
    }

    #[wasm_bindgen(js_name = offEvent)]
    pub fn off_event(&self, id: u32) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        let removed = listeners.len() != before;
        wasm_log!("offEvent {}: removed={}", id, removed);
        removed
    }

    // ----- staff ----------------------------------------------------------

    /// Add a note for a country; returns the slot it landed in
    #[wasm_bindgen(js_name = insertNote)]
    pub fn insert_note(
        &self,
        country_id: &str,
        country_label: &str,
        sdgs: Vec<u8>,
    ) -> Result<u8, JsValue> {
        wasm_info!("insertNote called: {} ({}) sdgs={:?}", country_label, country_id, sdgs);
        let ids = indicator_ids(&sdgs).map_err(validation_error)?;
        self.with(|c| c.insert_note(country_id, country_label, ids))
            .map_err(composer_error)
    }

    /// Returns true when a note was removed
    #[wasm_bindgen(js_name = removeNote)]
    pub fn remove_note(&self, position: u8) -> Result<bool, JsValue> {
        validate_position(position).map_err(validation_error)?;
        let removed = self.with(|c| c.remove_note(position)).map_err(composer_error)?;
        Ok(removed.is_some())
    }

    #[wasm_bindgen(js_name = swapPositions)]
    pub fn swap_positions(&self, from: u8, to: u8) -> Result<JsValue, JsValue> {
        let outcome = self.with(|c| c.swap_positions(from, to)).map_err(composer_error)?;
        serialize(&outcome, "Swap outcome serialization error")
    }

    #[wasm_bindgen(js_name = shuffleStaff)]
    pub fn shuffle_staff(&self) {
        self.with(|c| c.shuffle_staff());
    }

    #[wasm_bindgen(js_name = clearStaff)]
    pub fn clear_staff(&self) {
        self.with(|c| c.clear_staff());
    }

    /// Current staff entries in slot order
    #[wasm_bindgen(js_name = getStaff)]
    pub fn get_staff(&self) -> Result<JsValue, JsValue> {
        let inner = self.inner.borrow();
        serialize(&inner.staff().entries_in_order(), "Staff serialization error")
    }

    #[wasm_bindgen(js_name = renderStaff)]
    pub fn render_staff(&self) -> Result<JsValue, JsValue> {
        serialize(&self.inner.borrow().render_staff(), "Display list serialization error")
    }

    // ----- playback -------------------------------------------------------

    #[wasm_bindgen(js_name = startPlayback)]
    pub fn start_playback(&self) -> bool {
        self.with(|c| c.start_playback())
    }

    #[wasm_bindgen(js_name = stopPlayback)]
    pub fn stop_playback(&self) {
        self.with(|c| c.stop_playback());
    }

    #[wasm_bindgen(js_name = togglePlayback)]
    pub fn toggle_playback(&self) -> bool {
        self.with(|c| c.toggle_playback())
    }

    /// Drive the loop; call from `requestAnimationFrame` or a short interval
    pub fn tick(&self) {
        self.with(|c| c.tick());
    }

    #[wasm_bindgen(js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.inner.borrow().is_playing()
    }

    #[wasm_bindgen(js_name = playSlot)]
    pub fn play_slot(&self, position: u8) -> Result<(), JsValue> {
        self.with(|c| c.play_slot(position)).map_err(composer_error)
    }

    // ----- mode / tempo / year ---------------------------------------------

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&self, mode: &str) -> Result<(), JsValue> {
        let mode: Mode = mode.parse().map_err(validation_error)?;
        self.with(|c| c.set_mode(mode));
        Ok(())
    }

    #[wasm_bindgen(js_name = toggleMode)]
    pub fn toggle_mode(&self) -> String {
        self.with(|c| c.toggle_mode()).to_string()
    }

    #[wasm_bindgen(js_name = getMode)]
    pub fn get_mode(&self) -> String {
        self.inner.borrow().mode().to_string()
    }

    /// Returns the tempo actually applied
    #[wasm_bindgen(js_name = setTempo)]
    pub fn set_tempo(&self, bpm: f64) -> f64 {
        self.with(|c| c.set_tempo(bpm)).bpm()
    }

    /// Raw text from the tempo input box
    #[wasm_bindgen(js_name = setTempoInput)]
    pub fn set_tempo_input(&self, input: &str) -> f64 {
        self.with(|c| c.set_tempo_input(input)).bpm()
    }

    #[wasm_bindgen(js_name = setYear)]
    pub fn set_year(&self, year: u16) -> u16 {
        self.with(|c| c.set_year(year))
    }

    #[wasm_bindgen(js_name = stepYear)]
    pub fn step_year(&self, delta: i32) -> u16 {
        self.with(|c| c.step_year(delta))
    }

    // ----- selection ------------------------------------------------------

    /// Returns "selected", "deselected", "unchanged" or "rejected"
    #[wasm_bindgen(js_name = toggleIndicator)]
    pub fn toggle_indicator(&self, sdg: u8, checked: bool) -> String {
        match self.with(|c| c.toggle_indicator(IndicatorId(sdg), checked)) {
            IndicatorToggle::Selected => "selected",
            IndicatorToggle::Deselected => "deselected",
            IndicatorToggle::Unchanged => "unchanged",
            IndicatorToggle::Rejected(_) => "rejected",
        }
        .to_string()
    }

    /// Returns "selected", "deselected" or "rejected"
    #[wasm_bindgen(js_name = clickCountry)]
    pub fn click_country(&self, country_id: &str, country_label: &str) -> String {
        match self.with(|c| c.click_country(country_id, country_label)) {
            CountryClick::Selected => "selected",
            CountryClick::Deselected => "deselected",
            CountryClick::Rejected(_) => "rejected",
        }
        .to_string()
    }

    #[wasm_bindgen(js_name = closePanel)]
    pub fn close_panel(&self) {
        self.with(|c| c.close_panel());
    }

    #[wasm_bindgen(js_name = openComposer)]
    pub fn open_composer(&self) {
        self.with(|c| c.open_composer());
    }

    #[wasm_bindgen(js_name = closeComposer)]
    pub fn close_composer(&self) {
        self.with(|c| c.close_composer());
    }

    /// Info panel for the selected country, or `undefined`
    #[wasm_bindgen(js_name = infoPanel)]
    pub fn info_panel(&self) -> Result<JsValue, JsValue> {
        match self.inner.borrow().info_panel() {
            Some(panel) => serialize(&panel, "Info panel serialization error"),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// "Add to Staff" button
    #[wasm_bindgen(js_name = requestInsert)]
    pub fn request_insert(&self) -> Result<u8, JsValue> {
        self.with(|c| c.request_insert())
            .map_err(|notice| JsValue::from_str(&notice.message))
    }

    /// Indicator names and colors
    #[wasm_bindgen(js_name = getCatalog)]
    pub fn get_catalog(&self) -> Result<JsValue, JsValue> {
        serialize(&IndicatorCatalog::global().all(), "Catalog serialization error")
    }

    // ----- data and session -------------------------------------------------

    /// Load the indicator JSON; returns the number of countries
    #[wasm_bindgen(js_name = loadData)]
    pub fn load_data(&self, json: &str) -> Result<usize, JsValue> {
        self.with(|c| c.load_data_json(json)).map_err(composer_error)?;
        let count = self.inner.borrow().data().country_count();
        wasm_log!("Indicator data loaded: {} countries", count);
        Ok(count)
    }

    #[wasm_bindgen(js_name = startSession)]
    pub fn start_session(&self, session_id: Option<String>) -> String {
        self.with(|c| c.start_session(session_id))
    }

    /// Ends the session and returns its export, or `undefined` if none was active
    #[wasm_bindgen(js_name = endSession)]
    pub fn end_session(&self) -> Result<JsValue, JsValue> {
        match self.with(|c| c.end_session()) {
            Some(export) => serialize(&export, "Session export serialization error"),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    #[wasm_bindgen(js_name = exportCsv)]
    pub fn export_csv(&self) -> String {
        self.inner.borrow().export_csv()
    }

    #[wasm_bindgen(js_name = csvFileName)]
    pub fn csv_file_name(&self) -> String {
        self.inner.borrow().logger().csv_file_name()
    }
}
