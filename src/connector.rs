//! The curved connector model: slurs and ties, their segments, grips
//! and persisted user adjustments.
//!
//! A connector owns one [`ConnectorSegment`] per system it crosses.
//! Layout recomputes segment geometry from the score; the only state
//! that survives a relayout is the per-grip user offsets.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::geometry::{BezierPath, Rect, Shape};
use crate::score::CrId;
use crate::style::TIE_CLEARANCE;
use crate::types::{Sp, Tick};

/// What a connector edit invalidates.
///
/// Callers decide how much to recompute from the returned value rather
/// than the edit triggering layout itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relayout {
    /// Nothing to redo.
    None,
    /// Re-lay-out this connector only.
    Connector,
    /// The edit can move other elements; re-lay-out the score range.
    Score,
}

/// Slur or tie. The two share segment geometry and differ in anchor
/// policy, captured by [`KindRules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    Slur,
    Tie,
}

/// Per-kind layout policy. A plain table; the layout code branches on
/// these fields rather than on the kind itself.
#[derive(Debug, Clone, Copy)]
pub struct KindRules {
    pub default_style: LineStyle,
    /// May attach to stem tips when both ends stem the same way.
    pub stem_anchoring: bool,
    /// Vertical clearance kept between an endpoint and a tie at the
    /// same note.
    pub tie_clearance: Sp,
}

impl ConnectorKind {
    pub fn rules(self) -> &'static KindRules {
        match self {
            ConnectorKind::Slur => &KindRules {
                default_style: LineStyle::Solid,
                stem_anchoring: true,
                tie_clearance: TIE_CLEARANCE,
            },
            // ties hang off noteheads directly and never chase stems,
            // but they keep the same clearance against neighboring ties
            ConnectorKind::Tie => &KindRules {
                default_style: LineStyle::Solid,
                stem_anchoring: false,
                tie_clearance: TIE_CLEARANCE,
            },
        }
    }
}

/// Curve direction preference. `Auto` resolves from musical context at
/// layout time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Direction {
    #[default]
    Auto = 0,
    Up = 1,
    Down = 2,
}

/// Stroke rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum LineStyle {
    #[default]
    Solid = 0,
    Dotted = 1,
    Dashed = 2,
    WideDashed = 3,
}

/// Role of a segment within its connector's span of systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentKind {
    /// Both endpoints on this system.
    #[default]
    Single,
    /// Starts here, continues to the next system.
    Begin,
    /// Passes through a whole system.
    Middle,
    /// Ends here after continuing from a previous system.
    End,
}

/// Editable control points of a segment, in drawing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grip {
    Start = 0,
    Bezier1 = 1,
    Shoulder = 2,
    Bezier2 = 3,
    End = 4,
    /// Whole-segment drag handle at the curve midpoint.
    Drag = 5,
}

pub const GRIPS: usize = 6;

/// A computed grip position plus the user's offset from it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GripPoint {
    /// Layout-computed position, page units.
    pub p: DVec2,
    /// User offset, page units. Zero unless edited.
    pub off: DVec2,
}

impl GripPoint {
    pub fn pos(&self) -> DVec2 {
        self.p + self.off
    }
}

/// Persisted form of a segment's user adjustments, spatium-relative so
/// they survive a staff-size change.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentOffsets {
    pub o1: [f64; 2],
    pub o2: [f64; 2],
    pub o3: [f64; 2],
    pub o4: [f64; 2],
    pub offset: [f64; 2],
}

/// One system's worth of a connector's curve.
#[derive(Debug, Clone, Default)]
pub struct ConnectorSegment {
    pub kind: SegmentKind,
    /// Index of the hosting system in the score's system list.
    pub system: usize,
    /// Grip points indexed by [`Grip`].
    pub ups: [GripPoint; GRIPS],
    /// Whole-segment user offset, page units.
    pub offset: DVec2,
    pub path: BezierPath,
    /// Coarse occupied area, for other elements' collision tests.
    pub shape: Shape,
    pub bbox: Rect,
    /// Extra shoulder height accumulated by collision avoidance,
    /// page units. Reset at the start of every layout.
    pub extra_height: f64,
}

impl ConnectorSegment {
    pub fn new(kind: SegmentKind, system: usize) -> ConnectorSegment {
        ConnectorSegment {
            kind,
            system,
            ..ConnectorSegment::default()
        }
    }

    /// The user moved any grip or the segment itself.
    pub fn is_edited(&self) -> bool {
        self.offset != DVec2::ZERO || self.ups.iter().any(|up| up.off != DVec2::ZERO)
    }

    pub fn grip(&self, grip: Grip) -> &GripPoint {
        &self.ups[grip as usize]
    }

    /// Final page-space position of a grip, segment offset included.
    pub fn grip_pos(&self, grip: Grip) -> DVec2 {
        self.ups[grip as usize].pos() + self.offset
    }

    /// Move a grip to a page-space target by adjusting its user offset.
    pub fn set_grip_pos(&mut self, grip: Grip, target: DVec2) {
        let up = &mut self.ups[grip as usize];
        up.off = target - self.offset - up.p;
    }

    /// Translate the whole segment.
    pub fn translate(&mut self, delta: DVec2) {
        self.offset += delta;
    }

    pub fn reset_offsets(&mut self) {
        self.offset = DVec2::ZERO;
        for up in &mut self.ups {
            up.off = DVec2::ZERO;
        }
    }

    /// Rescale user adjustments after the score's spatium changed, so
    /// edits keep their musical meaning at the new staff size.
    pub fn rescale_offsets(&mut self, old_spatium: f64, new_spatium: f64) {
        let f = new_spatium / old_spatium;
        self.offset *= f;
        for up in &mut self.ups {
            up.off *= f;
        }
    }

    /// Capture the user adjustments in spatium-relative units.
    pub fn save_offsets(&self, spatium: f64) -> SegmentOffsets {
        let o = |g: Grip| {
            let off = self.ups[g as usize].off / spatium;
            [off.x, off.y]
        };
        SegmentOffsets {
            o1: o(Grip::Start),
            o2: o(Grip::Bezier1),
            o3: o(Grip::Bezier2),
            o4: o(Grip::End),
            offset: [self.offset.x / spatium, self.offset.y / spatium],
        }
    }

    /// Restore previously saved adjustments.
    pub fn apply_offsets(&mut self, saved: &SegmentOffsets, spatium: f64) {
        let v = |a: [f64; 2]| DVec2::new(a[0], a[1]) * spatium;
        self.ups[Grip::Start as usize].off = v(saved.o1);
        self.ups[Grip::Bezier1 as usize].off = v(saved.o2);
        self.ups[Grip::Bezier2 as usize].off = v(saved.o3);
        self.ups[Grip::End as usize].off = v(saved.o4);
        self.offset = v(saved.offset);
    }
}

/// A slur or tie spanning one or more chord-rests.
#[derive(Debug, Clone)]
pub struct Connector {
    pub kind: ConnectorKind,
    /// Start time; [`Tick::NONE`] for an unattached (palette) connector.
    pub tick: Tick,
    /// End time.
    pub tick2: Tick,
    pub track: usize,
    pub track2: usize,
    pub start_cr: Option<CrId>,
    pub end_cr: Option<CrId>,
    pub direction: Direction,
    pub line_style: LineStyle,
    /// Resolved curve direction, valid after layout.
    pub up: bool,
    /// Collision avoidance runs only when set.
    pub autoplace: bool,
    /// Degenerate span detected during layout; no stroke is drawn.
    pub broken: bool,
    /// Stem directions recorded in the source of a copied connector;
    /// see [`crate::score::stem_arrangement`]. `None` for connectors
    /// created in place.
    pub source_stem_arrangement: Option<u8>,
    pub segments: Vec<ConnectorSegment>,
}

impl Connector {
    pub fn new(kind: ConnectorKind) -> Connector {
        Connector {
            kind,
            tick: Tick::NONE,
            tick2: Tick::NONE,
            track: 0,
            track2: 0,
            start_cr: None,
            end_cr: None,
            direction: Direction::Auto,
            line_style: kind.rules().default_style,
            up: true,
            autoplace: true,
            broken: false,
            source_stem_arrangement: None,
            segments: Vec::new(),
        }
    }

    /// Not attached to score time; laid out as a fixed preview curve.
    pub fn is_unattached(&self) -> bool {
        self.tick.is_unset()
    }

    pub fn is_edited(&self) -> bool {
        self.segments.iter().any(ConnectorSegment::is_edited)
    }

    /// Resize the segment list to `n` entries.
    ///
    /// When the count is unchanged the segments (and with them the
    /// user's grip offsets) are kept; a changed count means the system
    /// breaks moved, so stale offsets are dropped wholesale.
    pub fn fixup_segments(&mut self, n: usize) {
        if self.segments.len() == n {
            return;
        }
        self.segments = (0..n)
            .map(|_| ConnectorSegment::new(SegmentKind::Single, 0))
            .collect();
    }

    pub fn set_direction(&mut self, direction: Direction) -> Relayout {
        if self.direction == direction {
            return Relayout::None;
        }
        self.direction = direction;
        Relayout::Connector
    }

    pub fn set_line_style(&mut self, style: LineStyle) -> Relayout {
        if self.line_style == style {
            return Relayout::None;
        }
        self.line_style = style;
        Relayout::Connector
    }

    /// Rescale every segment's user adjustments after a staff-size
    /// change.
    pub fn spatium_changed(&mut self, old_spatium: f64, new_spatium: f64) {
        for seg in &mut self.segments {
            seg.rescale_offsets(old_spatium, new_spatium);
        }
    }

    /// Re-anchor the connector in time. Moves other elements' spacing,
    /// so the whole affected range needs layout.
    pub fn set_span(&mut self, tick: Tick, tick2: Tick) -> Relayout {
        if self.tick == tick && self.tick2 == tick2 {
            return Relayout::None;
        }
        self.tick = tick;
        self.tick2 = tick2;
        self.start_cr = None;
        self.end_cr = None;
        Relayout::Score
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use super::*;

    #[test]
    fn grip_offsets_compose_with_segment_offset() {
        let mut seg = ConnectorSegment::new(SegmentKind::Single, 0);
        seg.ups[Grip::Start as usize].p = dvec2(10.0, 5.0);
        seg.translate(dvec2(1.0, -1.0));
        assert_eq!(seg.grip_pos(Grip::Start), dvec2(11.0, 4.0));

        seg.set_grip_pos(Grip::Start, dvec2(12.0, 3.0));
        assert_eq!(seg.grip_pos(Grip::Start), dvec2(12.0, 3.0));
        assert_eq!(seg.ups[Grip::Start as usize].off, dvec2(1.0, -1.0));
        assert!(seg.is_edited());
    }

    #[test]
    fn fixup_keeps_segments_when_count_matches() {
        let mut c = Connector::new(ConnectorKind::Slur);
        c.fixup_segments(2);
        c.segments[0].ups[Grip::Shoulder as usize].off = dvec2(0.0, -2.0);
        c.fixup_segments(2);
        assert_eq!(
            c.segments[0].ups[Grip::Shoulder as usize].off,
            dvec2(0.0, -2.0)
        );
        c.fixup_segments(3);
        assert_eq!(c.segments.len(), 3);
        assert!(!c.is_edited());
    }

    #[test]
    fn offsets_survive_save_apply_and_rescale() {
        let mut seg = ConnectorSegment::new(SegmentKind::Single, 0);
        seg.ups[Grip::Bezier1 as usize].off = dvec2(0.0, -3.0);
        seg.offset = dvec2(1.5, 0.0);

        let saved = seg.save_offsets(3.0);
        assert_eq!(saved.offset, [0.5, 0.0]);

        let mut restored = ConnectorSegment::new(SegmentKind::Single, 0);
        restored.apply_offsets(&saved, 3.0);
        assert_eq!(restored.ups[Grip::Bezier1 as usize].off, dvec2(0.0, -3.0));
        assert_eq!(restored.offset, dvec2(1.5, 0.0));

        // doubling the spatium doubles the page-unit offsets
        restored.rescale_offsets(3.0, 6.0);
        assert_eq!(restored.ups[Grip::Bezier1 as usize].off, dvec2(0.0, -6.0));
        assert_eq!(restored.save_offsets(6.0), saved);
    }

    #[test]
    fn segment_offsets_serde_round_trip() {
        let saved = SegmentOffsets {
            o1: [0.1, -0.2],
            o3: [0.0, 1.25],
            ..SegmentOffsets::default()
        };
        let json = serde_json::to_string(&saved).unwrap();
        let back: SegmentOffsets = serde_json::from_str(&json).unwrap();
        assert_eq!(back, saved);
    }

    #[test]
    fn edits_report_relayout_scope() {
        let mut c = Connector::new(ConnectorKind::Tie);
        assert_eq!(c.set_direction(Direction::Auto), Relayout::None);
        assert_eq!(c.set_direction(Direction::Down), Relayout::Connector);
        assert_eq!(c.set_line_style(LineStyle::Dotted), Relayout::Connector);
        assert_eq!(
            c.set_span(Tick::new(0), Tick::new(480)),
            Relayout::Score
        );
        assert_eq!(c.set_span(Tick::new(0), Tick::new(480)), Relayout::None);
    }
}
