//! Collision avoidance: nudges a segment's endpoints and shoulder until
//! its shape clears the elements it crosses.

use glam::DVec2;

use crate::connector::{ConnectorSegment, Grip};
use crate::layout::SegCtx;
use crate::layout::bezier::compute_bezier;
use crate::score::ColumnKind;
use crate::style::{
    COLLISION_MARGIN, END_SECTION_PERCENT, MAX_AVOID_PASSES, MAX_ENDPOINT_ADJUST,
    MAX_HEIGHT_ADJUST,
};

/// Which of the three per-segment corrections have been spent.
///
/// Each correction is applied at most once per cycle; when all three
/// are used and collisions remain, the slots reset and another cycle
/// may re-apply them with the newly measured distances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct AdjustSlots {
    pub start: bool,
    pub height: bool,
    pub end: bool,
}

impl AdjustSlots {
    fn all_used(&self) -> bool {
        self.start && self.height && self.end
    }

    fn reset(&mut self) {
        *self = AdjustSlots::default();
    }
}

/// Iteratively move the segment away from colliding columns.
///
/// Collisions are binned by where they fall along the span: the outer
/// thirds move the nearer endpoint, the middle third raises the
/// shoulder. Only the worst bin is corrected per pass, then the curve
/// is recomputed and re-measured. The pass count is bounded, so a
/// crowded passage converges on a best effort rather than looping.
pub(crate) fn avoid_collisions(seg: &mut ConnectorSegment, ctx: &SegCtx<'_>) {
    let spatium = ctx.score.spatium;
    let system = &ctx.score.systems[ctx.system];
    let max_height_adjust = MAX_HEIGHT_ADJUST.units(spatium);
    let max_endpoint_adjust = MAX_ENDPOINT_ADJUST.units(spatium);
    let collision_margin = COLLISION_MARGIN.units(spatium);

    let pp1 = seg.ups[Grip::Start as usize].p;
    let pp2 = seg.ups[Grip::End as usize].p;
    let slur_width = pp2.x - pp1.x;
    if slur_width <= 0.0 {
        return;
    }

    let mut slots = AdjustSlots::default();
    let mut seg_relative_x = 0.0;
    for _ in 0..MAX_AVOID_PASSES {
        let mut intersection = false;
        let mut end1_dist: f64 = 0.0;
        let mut end2_dist: f64 = 0.0;
        let mut midpoint_dist: f64 = 0.0;
        if slots.all_used() {
            slots.reset();
        }
        for col in &system.columns {
            if !col.enabled {
                continue;
            }
            // endpoints were anchored against their own columns already;
            // re-measuring those would overcorrect against the chord's
            // own ledger lines and accidentals
            if col.kind == ColumnKind::ChordRest
                && (col.tick == ctx.start_tick || col.tick == ctx.end_tick)
            {
                continue;
            }
            // curves may cross barlines freely
            if col.kind == ColumnKind::Barline {
                continue;
            }
            let x1 = col.x;
            let x2 = x1 + col.width;
            if pp1.x > x2 {
                continue;
            }
            if pp2.x < x1 {
                break;
            }
            seg_relative_x = ((x1 + col.width / 2.0) - pp1.x) / slur_width;

            if col.shape.intersects(&seg.shape) {
                intersection = true;
                let dist = if ctx.up {
                    seg.shape.min_vertical_distance(&col.shape) + collision_margin
                } else {
                    col.shape.min_vertical_distance(&seg.shape) + collision_margin
                };
                if dist > 0.0 {
                    if seg_relative_x < END_SECTION_PERCENT {
                        end1_dist = end1_dist.max(dist).min(max_endpoint_adjust);
                    } else if seg_relative_x > 1.0 - END_SECTION_PERCENT {
                        end2_dist = end2_dist.max(dist).min(max_endpoint_adjust);
                    } else {
                        midpoint_dist = midpoint_dist.max(dist).min(max_height_adjust);
                    }
                }
            }
        }
        if !intersection {
            break;
        }
        let away = if ctx.up { -1.0 } else { 1.0 };
        let max_dist = end1_dist.max(end2_dist).max(midpoint_dist);
        // correct the worst bin; fall through to the next free slot when
        // this bin's own correction was already spent
        if max_dist == end1_dist {
            if !slots.start {
                seg.ups[Grip::Start as usize].p.y += end1_dist * away;
                slots.start = true;
            } else if !slots.height {
                seg.extra_height = 4.0 * end1_dist.min(max_height_adjust) / 3.0;
                slots.height = true;
            } else if !slots.end {
                seg.ups[Grip::End as usize].p.y += end1_dist * away;
                slots.end = true;
            }
        } else if max_dist == end2_dist {
            if !slots.end {
                seg.ups[Grip::End as usize].p.y += end2_dist * away;
                slots.end = true;
            } else if !slots.height {
                seg.extra_height = 4.0 * end2_dist.min(max_height_adjust) / 3.0;
                slots.height = true;
            } else if !slots.start {
                seg.ups[Grip::Start as usize].p.y += end2_dist * away;
                slots.start = true;
            }
        } else {
            seg.extra_height = 4.0 * midpoint_dist / 3.0;
            if !slots.height {
                slots.height = true;
            } else if seg_relative_x < 0.5 {
                if !slots.start {
                    seg.ups[Grip::Start as usize].p.y += midpoint_dist.min(max_height_adjust) * away;
                    slots.start = true;
                } else {
                    seg.ups[Grip::End as usize].p.y += midpoint_dist.min(max_height_adjust) * away;
                    slots.end = true;
                }
            } else if !slots.end {
                seg.ups[Grip::End as usize].p.y += midpoint_dist.min(max_height_adjust) * away;
                slots.end = true;
            } else {
                seg.ups[Grip::Start as usize].p.y += midpoint_dist.min(max_height_adjust) * away;
                slots.start = true;
            }
        }
        compute_bezier(seg, ctx, DVec2::ZERO);
    }
}
