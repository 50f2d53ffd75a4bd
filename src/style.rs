//! Engraving style parameters and fixed layout constants.
//!
//! Everything is in staff spaces; the score's spatium converts to page
//! units at the point of use.

use crate::types::Sp;

/// Score-wide style values that influence curve layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    /// Stroke width at a solid curve's endpoints.
    pub slur_end_width: Sp,
    /// Stroke width at a solid curve's midpoint; the difference to
    /// `slur_end_width` gives the tapering thickness.
    pub slur_mid_width: Sp,
    /// Stroke width for dotted/dashed curve styles.
    pub slur_dotted_width: Sp,
    /// Beam thickness, needed when an anchor floats up to a beam.
    pub beam_width: Sp,
    /// Render rhythmic flags as straight strokes instead of curly hooks.
    pub straight_note_flags: bool,
    /// The engraving font draws unusually wide hooks, so the
    /// hook-avoidance cutout line uses a steeper slope.
    pub bulky_hook_font: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            slur_end_width: Sp::new(0.07),
            slur_mid_width: Sp::new(0.21),
            slur_dotted_width: Sp::new(0.1),
            beam_width: Sp::new(0.5),
            straight_note_flags: false,
            bulky_hook_font: false,
        }
    }
}

// Fixed layout constants, all in staff spaces.

/// Horizontal clearance between a stem and a stem-attached anchor.
pub(crate) const STEM_CLEARANCE_X: Sp = Sp::new(0.35);
/// Vertical inset pulling a stem-attached anchor off the stem tip.
pub(crate) const STEM_SIDE_INSET: Sp = Sp::new(0.5);
/// Clearance kept between a curve anchor and a beam.
pub(crate) const BEAM_CLEARANCE: Sp = Sp::new(0.5);
/// Horizontal clearance past a hook when the anchor must dodge it.
pub(crate) const HOOK_CLEARANCE_X: Sp = Sp::new(0.3);
/// Horizontal inset of a beam-attached anchor from the stem line.
pub(crate) const BEAM_ANCHOR_INSET: Sp = Sp::new(0.15);
/// How far down a straight flag an anchor attaches (fraction of width).
pub(crate) const STRAIGHT_STEM_X_OFFSET: f64 = 0.5;
/// Endpoints closer than this to a staff line get pushed away.
pub(crate) const STAFF_LINE_MARGIN: f64 = 0.15;
/// Default vertical offset of a note-attached anchor from the notehead.
pub(crate) const NOTE_ANCHOR_OFFSET_Y: Sp = Sp::new(0.9);
/// Minimum vertical clearance between a curve endpoint and a tie at the
/// same note.
pub(crate) const TIE_CLEARANCE: Sp = Sp::new(0.65);
/// Horizontal nudge separating a curve endpoint from a tie when vertical
/// clearance is already satisfied.
pub(crate) const TIE_CLEARANCE_X: Sp = Sp::new(0.35);
/// Vertical offset continuing the bow at a system-boundary anchor.
pub(crate) const CONTINUED_OFFSET_Y: Sp = Sp::new(0.4);
/// Maximum vertical jump between the anchors of two consecutive segments
/// of the same connector.
pub(crate) const CONTINUED_MAX_DIFF: Sp = Sp::new(2.5);
/// Extra gap demanded on top of shape separation during collision passes.
pub(crate) const COLLISION_MARGIN: Sp = Sp::new(0.5);
/// Cap on a single endpoint correction.
pub(crate) const MAX_ENDPOINT_ADJUST: Sp = Sp::new(3.0);
/// Cap on the accumulated extra shoulder height.
pub(crate) const MAX_HEIGHT_ADJUST: Sp = Sp::new(4.0);
/// Fraction of the span counting as the "near an endpoint" thirds.
pub(crate) const END_SECTION_PERCENT: f64 = 0.3;
/// Length of the stub drawn for a one-sided (broken) connector.
pub(crate) const STUB_LENGTH: Sp = Sp::new(5.0);
/// Span of the default preview segment for an unattached connector.
pub(crate) const PALETTE_SPAN: Sp = Sp::new(6.0);
/// Number of bezier samples in the coarse collision shape.
pub(crate) const SHAPE_SAMPLES: usize = 32;
/// Collision passes before the loop gives up.
pub(crate) const MAX_AVOID_PASSES: usize = 3;
