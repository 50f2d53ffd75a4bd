//! Read-only score geometry consumed by the layout core.
//!
//! The structures here describe a score *after* note spacing: every
//! chord, stem, beam and system already has a position. Curve layout
//! reads this arena and never mutates it; all results land on the
//! connector itself.
//!
//! Coordinate convention: chord-rest and column positions are relative
//! to their system, note and stem positions are relative to their
//! chord, and y grows downward.

use glam::DVec2;

use crate::geometry::{Rect, Shape};
use crate::style::Style;
use crate::types::Tick;

/// Tracks per staff; track = staff * VOICES + voice.
pub const VOICES: usize = 4;

/// Index of a chord-rest in [`Score::chordrests`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrId(pub usize);

/// The complete laid-out score geometry.
#[derive(Debug, Clone)]
pub struct Score {
    /// Staff-space size in page units.
    pub spatium: f64,
    /// Number of staff lines (5 for a standard staff).
    pub staff_lines: usize,
    pub style: Style,
    pub measures: Vec<Measure>,
    pub systems: Vec<System>,
    pub chordrests: Vec<ChordRest>,
}

impl Score {
    pub fn cr(&self, id: CrId) -> &ChordRest {
        &self.chordrests[id.0]
    }

    /// Index of the first system whose span covers `tick`.
    pub fn system_at(&self, tick: Tick) -> Option<usize> {
        self.systems
            .iter()
            .position(|s| !s.is_frame && s.tick <= tick && tick < s.end_tick)
    }

    pub fn measure_at(&self, tick: Tick) -> Option<&Measure> {
        self.measures
            .iter()
            .find(|m| m.tick <= tick && tick < m.end_tick)
    }

    /// Any chord-rest in a secondary voice of `staff` inside the tick
    /// range. Multi-voice passages force slurs outside the staff.
    pub fn has_voices(&self, staff: usize, from: Tick, to: Tick) -> bool {
        self.chordrests.iter().any(|cr| {
            cr.track / VOICES == staff
                && cr.track % VOICES != 0
                && from <= cr.tick
                && cr.tick < to
        })
    }

    /// First chord-rest on `track` at or after `tick`.
    pub fn chordrest_at(&self, tick: Tick, track: usize) -> Option<CrId> {
        self.chordrests
            .iter()
            .enumerate()
            .filter(|(_, cr)| cr.track == track && cr.tick >= tick)
            .min_by_key(|(_, cr)| cr.tick)
            .map(|(i, _)| CrId(i))
    }

    /// Page-space position of a chord-rest (system origin plus the
    /// chord-rest's system-relative position).
    pub fn cr_page_pos(&self, id: CrId) -> DVec2 {
        let cr = self.cr(id);
        self.systems[cr.system].pos + cr.pos
    }

    /// Earliest chord-rest of `track` on the given system.
    pub fn first_chordrest(&self, system: usize, track: usize) -> Option<CrId> {
        self.chordrests
            .iter()
            .enumerate()
            .filter(|(_, cr)| cr.system == system && cr.track == track)
            .min_by_key(|(_, cr)| cr.tick)
            .map(|(i, _)| CrId(i))
    }

    /// Latest chord-rest of `track` on the given system.
    pub fn last_chordrest(&self, system: usize, track: usize) -> Option<CrId> {
        self.chordrests
            .iter()
            .enumerate()
            .filter(|(_, cr)| cr.system == system && cr.track == track)
            .max_by_key(|(_, cr)| cr.tick)
            .map(|(i, _)| CrId(i))
    }
}

/// Summary of stem directions at a connector's two ends, recorded when
/// user grip offsets are saved. If the arrangement changes later (a
/// voicing edit flipped a stem), the saved offsets no longer fit the
/// curve and are discarded.
pub fn stem_arrangement(start: Option<&ChordRest>, end: Option<&ChordRest>) -> u8 {
    let bit = |cr: Option<&ChordRest>, mask: u8| {
        cr.and_then(|c| c.chord.as_ref())
            .and_then(|c| c.stem.as_ref())
            .is_some_and(|s| s.up)
            .then_some(mask)
            .unwrap_or(0)
    };
    bit(start, 0b01) | bit(end, 0b10)
}

#[derive(Debug, Clone, Copy)]
pub struct Measure {
    pub tick: Tick,
    pub end_tick: Tick,
}

impl Measure {
    pub fn ticks(&self) -> i64 {
        self.end_tick.delta(self.tick)
    }
}

/// One line of music on the page.
#[derive(Debug, Clone)]
pub struct System {
    pub tick: Tick,
    pub end_tick: Tick,
    /// Frames (title blocks, text) interleave with music systems but
    /// never host connector segments.
    pub is_frame: bool,
    /// Page-space origin of the system.
    pub pos: DVec2,
    pub width: f64,
    /// x of the leftmost note or rest, for continued-segment anchors.
    pub first_noterest_x: f64,
    /// x past the rightmost note or rest.
    pub last_noterest_x: f64,
    pub columns: Vec<Column>,
}

/// A vertical slice of a system holding the elements at one time
/// position (or a barline, clef, breath mark between them).
#[derive(Debug, Clone)]
pub struct Column {
    pub tick: Tick,
    pub kind: ColumnKind,
    /// Spacing-disabled columns take no width and are skipped entirely.
    pub enabled: bool,
    /// System-relative x of the column's left edge.
    pub x: f64,
    pub width: f64,
    /// Occupied area of the column's elements, system-relative.
    pub shape: Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    ChordRest,
    Barline,
    Other,
}

/// A chord or rest with its resolved geometry.
#[derive(Debug, Clone)]
pub struct ChordRest {
    pub tick: Tick,
    pub track: usize,
    /// Index of the hosting system in [`Score::systems`].
    pub system: usize,
    /// System-relative position.
    pub pos: DVec2,
    pub width: f64,
    /// Bounding box relative to `pos`.
    pub bbox: Rect,
    /// Stem/beam side for rests (which have no chord geometry) and the
    /// fallback when a chord has no stem.
    pub up: bool,
    pub is_grace: bool,
    /// Grace note placed after its parent chord.
    pub grace_after: bool,
    /// `None` for rests.
    pub chord: Option<ChordGeom>,
}

impl ChordRest {
    pub fn is_chord(&self) -> bool {
        self.chord.is_some()
    }

    /// Stem direction; falls back to the chord-rest's own flag.
    pub fn stem_up(&self) -> bool {
        self.chord.as_ref().and_then(|c| c.up()).unwrap_or(self.up)
    }

    pub fn voice(&self) -> usize {
        self.track % VOICES
    }

    pub fn staff(&self) -> usize {
        self.track / VOICES
    }
}

/// Geometry of a chord's notes and attachments.
#[derive(Debug, Clone)]
pub struct ChordGeom {
    /// Sorted by staff position, highest (smallest y) first. Never
    /// empty; a chord without notes is modeled as a rest.
    pub notes: Vec<Note>,
    pub stem: Option<Stem>,
    pub beam: Option<BeamInfo>,
    pub hook: Option<Hook>,
    pub articulations: Vec<Articulation>,
}

impl ChordGeom {
    /// Stem direction if this chord has a stem.
    pub fn up(&self) -> Option<bool> {
        self.stem.as_ref().map(|s| s.up)
    }

    /// Highest note (smallest y).
    pub fn up_note(&self) -> &Note {
        &self.notes[0]
    }

    /// Lowest note (largest y).
    pub fn down_note(&self) -> &Note {
        self.notes.last().unwrap_or(&self.notes[0])
    }

    /// The note the curve visually departs from: the outermost note on
    /// the curve's side.
    pub fn end_note(&self, curve_up: bool) -> &Note {
        if curve_up { self.up_note() } else { self.down_note() }
    }
}

/// A notehead, positioned relative to its chord.
#[derive(Debug, Clone)]
pub struct Note {
    pub pos: DVec2,
    pub head_width: f64,
    pub height: f64,
    /// Head drawn on the wrong side of the stem (seconds in a cluster).
    pub mirror: bool,
    /// Extra x applied to note-attached anchors, e.g. for dotted notes.
    pub x_shift: f64,
    /// Tie starting at this note, already laid out.
    pub tie_for: Option<PlacedTie>,
    /// Tie ending at this note, already laid out.
    pub tie_back: Option<PlacedTie>,
}

/// A stem, positioned relative to its chord.
#[derive(Debug, Clone, Copy)]
pub struct Stem {
    pub up: bool,
    /// Anchor of the stem at the notehead, chord-relative.
    pub pos: DVec2,
    /// Tip of the stem relative to `pos`; negative y for up stems.
    pub p2: DVec2,
    pub length: f64,
    pub line_width: f64,
}

impl Stem {
    /// Chord-relative position of the stem tip.
    pub fn tip(&self) -> DVec2 {
        self.pos + self.p2
    }
}

/// Beam membership of a chord.
#[derive(Debug, Clone, Copy)]
pub struct BeamInfo {
    /// This chord is the first of its beam group.
    pub first: bool,
    /// This chord is the last of its beam group.
    pub last: bool,
    /// The beam spans chords with opposing stem directions.
    pub cross: bool,
}

/// A flag/hook on an unbeamed short note, positioned relative to its
/// chord.
#[derive(Debug, Clone)]
pub struct Hook {
    pub pos: DVec2,
    pub width: f64,
    pub bbox: Rect,
}

/// An articulation mark above or below a chord, chord-relative.
#[derive(Debug, Clone)]
pub struct Articulation {
    pub up: bool,
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub is_tenuto: bool,
    /// Staccato-like marks that hug the notehead; curves tuck inside
    /// them instead of clearing them.
    pub layout_close_to_note: bool,
}

/// An already laid-out tie at a note, reduced to what slur endpoint
/// clearance needs.
#[derive(Debug, Clone, Copy)]
pub struct PlacedTie {
    pub up: bool,
    /// Placed between the staff lines rather than outside the staff.
    pub is_inside: bool,
    /// System-relative endpoint at this note's side.
    pub endpoint: DVec2,
}
