//! Indicator/country selection and the floating info panel
//!
//! Tracks which indicators are checked (capped), which country is picked
//! on the map, and whether the composer is open. It never mutates the
//! staff itself: it only decides whether an insert request may go ahead.

use crate::models::indicator::{IndicatorCatalog, IndicatorId};
use crate::models::indicator_data::IndicatorData;
use crate::models::notice::Notice;
use crate::models::staff::{StaffModel, CAPACITY};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedCountry {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorToggle {
    Selected,
    Deselected,
    Unchanged,
    Rejected(Notice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryClick {
    Selected,
    /// Same country clicked again
    Deselected,
    Rejected(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AddButtonState {
    OpenComposerFirst,
    SelectIndicatorFirst,
    StaffFull,
    Ready { remaining: usize },
}

impl AddButtonState {
    pub fn label(&self) -> String {
        match self {
            AddButtonState::OpenComposerFirst => "Open Composer First".to_string(),
            AddButtonState::SelectIndicatorFirst => "Select SDG First".to_string(),
            AddButtonState::StaffFull => "Staff is Full".to_string(),
            AddButtonState::Ready { remaining } => format!("+ Add to Staff ({} left)", remaining),
        }
    }

    pub fn enabled(&self) -> bool {
        matches!(self, AddButtonState::Ready { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoRow {
    pub indicator: IndicatorId,
    /// "SDG 7"
    pub label: String,
    pub name: String,
    pub color: String,
    pub value: Option<f64>,
    /// One decimal, or "N/A"
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPanel {
    pub country_id: String,
    pub country_label: String,
    pub year: u16,
    pub rows: Vec<InfoRow>,
    pub add_button: AddButtonState,
    pub add_label: String,
}

/// A validated insert request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertRequest {
    pub country_id: String,
    pub country_label: String,
    pub indicator_ids: Vec<IndicatorId>,
}

#[derive(Debug, Clone)]
pub struct SelectionController {
    max_indicators: usize,
    selectable: Vec<IndicatorId>,
    selected: Vec<IndicatorId>,
    country: Option<SelectedCountry>,
    composer_open: bool,
}

impl SelectionController {
    pub fn new(max_indicators: usize, selectable: Vec<IndicatorId>) -> Self {
        Self {
            max_indicators,
            selectable,
            selected: Vec::new(),
            country: None,
            composer_open: false,
        }
    }

    /// Checked indicators, in the order they were checked
    pub fn selected_indicators(&self) -> &[IndicatorId] {
        &self.selected
    }

    pub fn selectable_indicators(&self) -> &[IndicatorId] {
        &self.selectable
    }

    pub fn max_indicators(&self) -> usize {
        self.max_indicators
    }

    pub fn country(&self) -> Option<&SelectedCountry> {
        self.country.as_ref()
    }

    pub fn is_composer_open(&self) -> bool {
        self.composer_open
    }

    pub fn set_composer_open(&mut self, open: bool) {
        self.composer_open = open;
    }

    /// Whether further indicators can be checked
    pub fn at_cap(&self) -> bool {
        self.selected.len() >= self.max_indicators
    }

    pub fn toggle_indicator(&mut self, id: IndicatorId, checked: bool) -> IndicatorToggle {
        if !self.selectable.contains(&id) {
            return IndicatorToggle::Rejected(Notice::transient(format!("{} is not available.", id)));
        }
        let already = self.selected.contains(&id);
        match (checked, already) {
            (true, true) | (false, false) => IndicatorToggle::Unchanged,
            (true, false) => {
                if self.at_cap() {
                    return IndicatorToggle::Rejected(Notice::transient(format!(
                        "You can select up to {} SDGs.",
                        self.max_indicators
                    )));
                }
                self.selected.push(id);
                IndicatorToggle::Selected
            }
            (false, true) => {
                self.selected.retain(|s| *s != id);
                IndicatorToggle::Deselected
            }
        }
    }

    /// Map click on a country
    pub fn click_country(&mut self, id: &str, label: &str) -> CountryClick {
        if self.selected.is_empty() {
            return CountryClick::Rejected(Notice::transient("Please select at least one SDG."));
        }
        if self.country.as_ref().map(|c| c.id.as_str()) == Some(id) {
            self.country = None;
            return CountryClick::Deselected;
        }
        let label = if label.trim().is_empty() { id } else { label };
        self.country = Some(SelectedCountry {
            id: id.to_string(),
            label: label.to_string(),
        });
        CountryClick::Selected
    }

    /// Close the panel, dropping the country selection
    pub fn close_panel(&mut self) -> Option<SelectedCountry> {
        self.country.take()
    }

    pub fn add_button_state(&self, staff: &StaffModel) -> AddButtonState {
        if !self.composer_open {
            AddButtonState::OpenComposerFirst
        } else if self.selected.is_empty() {
            AddButtonState::SelectIndicatorFirst
        } else if !staff.has_space() {
            AddButtonState::StaffFull
        } else {
            AddButtonState::Ready {
                remaining: staff.free_count(),
            }
        }
    }

    /// Panel content for the selected country, if any
    pub fn info_panel(&self, data: &IndicatorData, year: u16, staff: &StaffModel) -> Option<InfoPanel> {
        let country = self.country.as_ref()?;
        let catalog = IndicatorCatalog::global();
        let rows = self
            .selected
            .iter()
            .map(|id| {
                let value = data.value(&country.id, year, *id);
                InfoRow {
                    indicator: *id,
                    label: id.to_string(),
                    name: catalog.name(*id).to_string(),
                    color: catalog.color(*id).to_string(),
                    value,
                    display: value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "N/A".to_string()),
                }
            })
            .collect();
        let add_button = self.add_button_state(staff);
        Some(InfoPanel {
            country_id: country.id.clone(),
            country_label: country.label.clone(),
            year,
            rows,
            add_label: add_button.label(),
            add_button,
        })
    }

    /// Check the add-to-staff gate. The staff-full case is a blocking notice.
    pub fn insert_request(&self, staff: &StaffModel) -> Result<InsertRequest, Notice> {
        let Some(country) = self.country.as_ref() else {
            return Err(Notice::transient("Select a country first."));
        };
        match self.add_button_state(staff) {
            AddButtonState::Ready { .. } => Ok(InsertRequest {
                country_id: country.id.clone(),
                country_label: country.label.clone(),
                indicator_ids: self.selected.clone(),
            }),
            AddButtonState::StaffFull => Err(Notice::blocking(format!(
                "Staff is full! Maximum {} notes allowed.",
                CAPACITY
            ))),
            other => Err(Notice::transient(other.label())),
        }
    }
}
