//! Carry-forward of musical state across page cuts.
//!
//! A measure in the middle of a part inherits tempo, dynamics, key, time, staves,
//! clef and divisions from whatever came before it. Once that measure
//! starts a standalone fragment the inheritance has to be written out
//! explicitly. [`Snapshot::resolve`] scans a run of measures for the most
//! recent value of each, and [`Snapshot::apply`] materializes them at the
//! front of a measure that does not already declare them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::{Element, Measure};

/// How clefs are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClefMode {
    /// Only the most recent clef is kept, whatever staff it belongs to.
    Single,
    /// One clef per staff slot (`<clef number="N">`, default 1).
    #[default]
    PerStaff,
}

/// Resolved as-of state at a cut point. `None` / empty means never seen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Tempo in quarter notes per minute
    pub tempo: Option<f64>,
    /// Dynamics symbol tag, e.g. "p", "ff", "sfz"
    pub dynamic: Option<String>,
    pub key: Option<Element>,
    pub time: Option<Element>,
    /// Number of staves in the part, kept whole
    pub staves: Option<Element>,
    /// Divisions per quarter note
    pub divisions: Option<u32>,
    /// Clefs keyed by staff slot number
    pub clefs: BTreeMap<u32, Element>,
}

impl Snapshot {
    /// Resolve the most recent state over `measures`, scanning left to right.
    pub fn resolve(measures: &[Measure], mode: ClefMode) -> Self {
        let mut snapshot = Self::default();
        snapshot.update(measures, mode);
        snapshot
    }

    /// Continue resolution over further measures; later values override.
    pub fn update(&mut self, measures: &[Measure], mode: ClefMode) {
        for measure in measures {
            if let Some(tempo) = measure.tempo() {
                self.tempo = Some(tempo);
            }
            if let Some(dynamic) = measure.dynamic() {
                self.dynamic = Some(dynamic.to_string());
            }

            for attrs in measure.attribute_blocks() {
                if let Some(divisions) = attrs
                    .child("divisions")
                    .and_then(|d| d.text())
                    .and_then(|t| t.parse::<u32>().ok())
                    .filter(|d| *d > 0)
                {
                    self.divisions = Some(divisions);
                }
                if let Some(key) = attrs.child("key") {
                    self.key = Some(key.clone());
                }
                if let Some(time) = attrs.child("time") {
                    self.time = Some(time.clone());
                }
                if let Some(staves) = attrs.child("staves") {
                    self.staves = Some(staves.clone());
                }
                for clef in attrs.children_named("clef") {
                    if mode == ClefMode::Single {
                        self.clefs.clear();
                    }
                    self.clefs.insert(clef_slot(clef), clef.clone());
                }
            }

            trace!(
                measure = measure.number().unwrap_or("?"),
                tempo = ?self.tempo,
                dynamic = ?self.dynamic,
                divisions = ?self.divisions,
                "resolved carry-forward state"
            );
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tempo.is_none()
            && self.dynamic.is_none()
            && self.key.is_none()
            && self.time.is_none()
            && self.staves.is_none()
            && self.divisions.is_none()
            && self.clefs.is_empty()
    }

    /// Inject every known field the measure does not already declare.
    ///
    /// Divisions, key, time, staves and clefs go into the measure's leading
    /// attributes block in schema order (divisions first); tempo and
    /// dynamics become directions right after it, ahead of any note.
    /// Reapplying is a no-op.
    pub fn apply(&self, measure: &mut Measure, mode: ClefMode) {
        if let Some(divisions) = self.divisions {
            if !measure.declares("divisions") {
                measure.insert_attribute(Element::new("divisions").with_text(divisions.to_string()));
            }
        }
        if let Some(key) = &self.key {
            if !measure.declares("key") {
                measure.insert_attribute(key.clone());
            }
        }
        if let Some(time) = &self.time {
            if !measure.declares("time") {
                measure.insert_attribute(time.clone());
            }
        }
        if let Some(staves) = &self.staves {
            if !measure.declares("staves") {
                measure.insert_attribute(staves.clone());
            }
        }
        self.apply_clefs(measure, mode);

        // Dynamics first so the tempo direction ends up ahead of it.
        if let Some(dynamic) = &self.dynamic {
            if measure.dynamic().is_none() {
                let slot = measure.direction_slot();
                measure.insert(slot, dynamics_direction(dynamic));
            }
        }
        if let Some(tempo) = self.tempo {
            if measure.tempo().is_none() {
                let slot = measure.direction_slot();
                measure.insert(slot, tempo_direction(tempo));
            }
        }
    }

    fn apply_clefs(&self, measure: &mut Measure, mode: ClefMode) {
        let present: Vec<u32> = measure
            .leading_attributes()
            .into_iter()
            .flat_map(|a| a.children_named("clef"))
            .map(clef_slot)
            .collect();

        match mode {
            ClefMode::Single => {
                if present.is_empty() {
                    if let Some(clef) = self.clefs.values().last() {
                        measure.insert_attribute(clef.clone());
                    }
                }
            }
            ClefMode::PerStaff => {
                for (slot, clef) in &self.clefs {
                    if !present.contains(slot) {
                        measure.insert_attribute(clef.clone());
                    }
                }
            }
        }
    }
}

fn clef_slot(clef: &Element) -> u32 {
    clef.attribute("number")
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(1)
}

fn tempo_direction(tempo: f64) -> Element {
    Element::new("direction")
        .with_attribute("placement", "above")
        .with_child(
            Element::new("direction-type").with_child(
                Element::new("metronome")
                    .with_child(Element::new("beat-unit").with_text("quarter"))
                    .with_child(Element::new("per-minute").with_text(format_number(tempo))),
            ),
        )
        .with_child(Element::new("sound").with_attribute("tempo", format_number(tempo)))
}

fn dynamics_direction(tag: &str) -> Element {
    Element::new("direction")
        .with_attribute("placement", "below")
        .with_child(
            Element::new("direction-type")
                .with_child(Element::new("dynamics").with_child(Element::new(tag))),
        )
}

/// `120.0` → "120", `92.5` → "92.5"
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
