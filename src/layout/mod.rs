//! Connector layout pipeline: anchor resolution, curve construction and
//! collision avoidance, segmented across systems.
//!
//! The entry point is [`layout`], which lays out every segment of one
//! connector against a fully positioned score. [`layout_system`] exists
//! for incremental callers that lay out one system at a time.

pub mod anchor;
pub mod avoid;
pub mod bezier;

use glam::{DVec2, dvec2};

use crate::connector::{Connector, ConnectorSegment, Direction, Grip, LineStyle, Relayout, SegmentKind};
use crate::errors::LayoutError;
use crate::log::debug;
use crate::score::{Score, stem_arrangement};
use crate::style::{CONTINUED_MAX_DIFF, CONTINUED_OFFSET_Y, PALETTE_SPAN, TIE_CLEARANCE_X};
use crate::types::Tick;

use self::anchor::{resolve_anchors, resolve_direction};
use self::avoid::avoid_collisions;
use self::bezier::compute_bezier;

/// Everything a single segment's curve passes need from its
/// surroundings.
pub(crate) struct SegCtx<'a> {
    pub score: &'a Score,
    /// Index of the hosting system.
    pub system: usize,
    pub up: bool,
    pub line_style: LineStyle,
    pub autoplace: bool,
    pub start_tick: Tick,
    pub end_tick: Tick,
}

/// Lay out every segment of a connector.
///
/// Unattached connectors get a fixed preview curve. Attached ones are
/// segmented over the systems their span covers; the segment count is
/// reconciled first so surviving user offsets stay applied.
pub fn layout(conn: &mut Connector, score: &Score) -> Result<(), LayoutError> {
    if conn.is_unattached() {
        layout_palette(conn, score);
        return Ok(());
    }
    conn.broken = false;

    if conn.start_cr.is_none() {
        conn.start_cr = score.chordrest_at(conn.tick, conn.track);
    }
    if conn.start_cr.is_none() {
        return Err(LayoutError::MissingAnchor {
            tick: conn.tick,
            track: conn.track,
        });
    }
    if conn.end_cr.is_none() && !conn.tick2.is_unset() {
        conn.end_cr = score.chordrest_at(conn.tick2, conn.track2);
    }

    let first = score
        .system_at(conn.tick)
        .ok_or(LayoutError::SystemNotFound { tick: conn.tick })?;
    let last = conn
        .end_cr
        .map_or(first, |id| score.cr(id).system)
        .max(first);

    let hosts: Vec<usize> = (first..=last)
        .filter(|&i| !score.systems[i].is_frame)
        .collect();
    conn.fixup_segments(hosts.len());
    for (seg_idx, &sys_idx) in hosts.iter().enumerate() {
        layout_system_segment(conn, score, sys_idx, seg_idx)?;
    }
    Ok(())
}

/// Lay out the one segment of `conn` hosted by `system_index`, creating
/// it if this is the first pass over that system. Returns the segment's
/// index.
pub fn layout_system(
    conn: &mut Connector,
    score: &Score,
    system_index: usize,
) -> Result<usize, LayoutError> {
    let first = score
        .system_at(conn.tick)
        .ok_or(LayoutError::SystemNotFound { tick: conn.tick })?;
    if system_index < first {
        return Err(LayoutError::SystemNotFound {
            tick: score.systems[system_index].tick,
        });
    }
    let seg_idx = (first..=system_index)
        .filter(|&i| !score.systems[i].is_frame)
        .count()
        .saturating_sub(1);
    while conn.segments.len() <= seg_idx {
        conn.segments
            .push(ConnectorSegment::new(SegmentKind::Single, system_index));
    }
    layout_system_segment(conn, score, system_index, seg_idx)?;
    Ok(seg_idx)
}

/// Apply a grip drag to one segment and report what must be recomputed.
///
/// Endpoint and inner-control drags accumulate into that grip's offset.
/// A shoulder drag is folded into both inner controls by the curve
/// builder; a drag-handle drag moves the whole segment.
pub fn drag_grip(
    conn: &mut Connector,
    score: &Score,
    seg_idx: usize,
    grip: Grip,
    delta: DVec2,
) -> Relayout {
    let up = conn.up;
    let line_style = conn.line_style;
    let autoplace = conn.autoplace;
    let (start_tick, end_tick) = (conn.tick, conn.tick2);
    let Some(seg) = conn.segments.get_mut(seg_idx) else {
        return Relayout::None;
    };
    let ctx = SegCtx {
        score,
        system: seg.system,
        up,
        line_style,
        autoplace,
        start_tick,
        end_tick,
    };
    match grip {
        Grip::Start | Grip::Bezier1 | Grip::Bezier2 | Grip::End => {
            seg.ups[grip as usize].off += delta;
            compute_bezier(seg, &ctx, DVec2::ZERO);
        }
        Grip::Shoulder => {
            seg.ups[Grip::Shoulder as usize].off = DVec2::ZERO;
            compute_bezier(seg, &ctx, delta);
        }
        Grip::Drag => {
            seg.offset += delta;
        }
    }
    Relayout::Connector
}

/// Build a standalone curve between two endpoints, for callers that
/// manage their own anchors (renderers, previews).
///
/// The endpoints are taken as given: no staff-line avoidance and no
/// collision passes run. Returns `None` when the endpoints coincide.
pub fn layout_segment(
    score: &Score,
    up: bool,
    line_style: LineStyle,
    p1: DVec2,
    p2: DVec2,
    extra_height: f64,
) -> Option<ConnectorSegment> {
    let mut seg = ConnectorSegment::new(SegmentKind::Single, 0);
    seg.ups[Grip::Start as usize].p = p1;
    seg.ups[Grip::End as usize].p = p2;
    seg.extra_height = extra_height;
    let ctx = SegCtx {
        score,
        system: 0,
        up,
        line_style,
        autoplace: false,
        start_tick: Tick::NONE,
        end_tick: Tick::NONE,
    };
    compute_bezier(&mut seg, &ctx, DVec2::ZERO).then_some(seg)
}

/// Fixed preview curve for a connector that is not attached to score
/// time.
fn layout_palette(conn: &mut Connector, score: &Score) {
    let spatium = score.spatium;
    conn.up = !matches!(conn.direction, Direction::Down);
    conn.fixup_segments(1);
    let up = conn.up;
    let line_style = conn.line_style;
    let (start_tick, end_tick) = (conn.tick, conn.tick2);
    let seg = &mut conn.segments[0];
    seg.kind = SegmentKind::Single;
    seg.system = 0;
    seg.extra_height = 0.0;
    seg.ups[Grip::Start as usize].p = DVec2::ZERO;
    seg.ups[Grip::End as usize].p = dvec2(PALETTE_SPAN.units(spatium), 0.0);
    let ctx = SegCtx {
        score,
        system: 0,
        up,
        line_style,
        autoplace: false,
        start_tick,
        end_tick,
    };
    compute_bezier(seg, &ctx, DVec2::ZERO);
}

fn layout_system_segment(
    conn: &mut Connector,
    score: &Score,
    sys_idx: usize,
    seg_idx: usize,
) -> Result<(), LayoutError> {
    let spatium = score.spatium;
    let system = &score.systems[sys_idx];
    let stick = system.tick;
    let etick = system.end_tick;
    let tie_clearance = conn.kind.rules().tie_clearance.units(spatium);
    let horizontal_tie_clearance = TIE_CLEARANCE_X.units(spatium);
    let continued_offset_y = CONTINUED_OFFSET_Y.units(spatium);
    let continued_max_diff = CONTINUED_MAX_DIFF.units(spatium);

    let kind = if conn.tick >= stick {
        // first segment of the layout run
        if conn.start_cr.is_none() {
            return Err(LayoutError::MissingAnchor {
                tick: conn.tick,
                track: conn.track,
            });
        }
        if conn.end_cr.is_none() {
            conn.end_cr = conn.start_cr;
            conn.tick2 = conn.tick;
        }
        if conn.direction == Direction::Auto {
            if let Some(arr) = conn.source_stem_arrangement {
                let current = stem_arrangement(
                    conn.start_cr.map(|id| score.cr(id)),
                    conn.end_cr.map(|id| score.cr(id)),
                );
                if arr != current {
                    // pasted from a score whose stems pointed the other
                    // way; the saved curve shape no longer applies
                    conn.segments[seg_idx].reset_offsets();
                }
            }
        }
        resolve_direction(conn, score);
        if conn.tick2 < etick {
            SegmentKind::Single
        } else {
            SegmentKind::Begin
        }
    } else if conn.tick < stick && conn.tick2 >= etick {
        SegmentKind::Middle
    } else {
        SegmentKind::End
    };

    let apos = resolve_anchors(conn, score)?;
    let mut p1 = apos.p1;
    let mut p2 = apos.p2;
    let dir = if conn.up { -1.0 } else { 1.0 };
    let mut constrain_left_anchor = false;

    // start anchor: on the start chord, or continued from a previous
    // system
    match kind {
        SegmentKind::Single | SegmentKind::Begin => {
            if let Some(id) = conn.start_cr {
                let scr = score.cr(id);
                if let Some(c) = &scr.chord {
                    if c.notes.len() == 1 {
                        let note = &c.notes[0];
                        let tie = note.tie_for.filter(|t| !t.is_inside && t.up == conn.up);
                        let mut adjusted_vertically = false;
                        if let Some(t) = tie {
                            if conn.up && t.up {
                                if t.endpoint.y - p1.y < tie_clearance {
                                    p1.y = t.endpoint.y - tie_clearance;
                                    adjusted_vertically = true;
                                }
                            } else if !conn.up && !t.up && p1.y - t.endpoint.y < tie_clearance {
                                p1.y = t.endpoint.y + tie_clearance;
                                adjusted_vertically = true;
                            }
                        }
                        if !adjusted_vertically
                            && note
                                .tie_back
                                .is_some_and(|t| !t.is_inside && t.up == conn.up)
                        {
                            // an incoming tie occupies the head's left
                            // side; start the curve a little later
                            p1.x += horizontal_tie_clearance;
                        }
                    }
                }
            }
        }
        SegmentKind::Middle | SegmentKind::End => {
            let first_cr = score.first_chordrest(sys_idx, conn.track);
            let mut y = p1.y;
            if first_cr.is_some() && first_cr == conn.end_cr {
                constrain_left_anchor = true;
            }
            if let Some(fid) = first_cr {
                let fcr = score.cr(fid);
                if let Some(chord) = &fcr.chord {
                    // only the stem length outside the note cluster counts
                    let stem_length = chord.stem.map_or(0.0, |s| {
                        s.length - (chord.down_note().pos.y - chord.up_note().pos.y)
                    });
                    if conn.up {
                        y = fcr.pos.y + chord.up_note().pos.y - chord.up_note().height / 2.0;
                        if fcr.up && chord.stem.is_some() && first_cr != conn.end_cr {
                            y -= stem_length;
                        }
                    } else {
                        y = fcr.pos.y + chord.down_note().pos.y + chord.down_note().height / 2.0;
                        if !fcr.up && chord.stem.is_some() && first_cr != conn.end_cr {
                            y += stem_length;
                        }
                    }
                    y += continued_offset_y * dir;
                }
            }
            p1 = dvec2(system.first_noterest_x, y);

            // clearance against a tie arriving at the system's first chord
            if let Some(fid) = first_cr {
                let fcr = score.cr(fid);
                if fcr.tick >= stick && fcr.tick <= etick {
                    let tie = fcr
                        .chord
                        .as_ref()
                        .and_then(|c| c.notes.first())
                        .and_then(|n| n.tie_back)
                        .filter(|t| !t.is_inside && t.up == conn.up);
                    if let Some(t) = tie {
                        if conn.up && t.up {
                            if t.endpoint.y - p1.y < tie_clearance {
                                p1.y = t.endpoint.y - tie_clearance;
                            }
                        } else if !conn.up && !t.up && p1.y - t.endpoint.y < tie_clearance {
                            p1.y = t.endpoint.y + tie_clearance;
                        }
                    }
                }
            }
        }
    }

    // end anchor: on the end chord, or continuing to the next system
    match kind {
        SegmentKind::Single | SegmentKind::End => {
            if let Some(id) = conn.end_cr {
                let ecr = score.cr(id);
                if let Some(c) = &ecr.chord {
                    if c.notes.len() == 1 {
                        let note = &c.notes[0];
                        let tie = note.tie_back.filter(|t| !t.is_inside && t.up == conn.up);
                        let mut adjusted_vertically = false;
                        if let Some(t) = tie {
                            if conn.up && t.up {
                                if t.endpoint.y - p2.y < tie_clearance {
                                    p2.y = t.endpoint.y - tie_clearance;
                                    adjusted_vertically = true;
                                }
                            } else if !conn.up && !t.up && p2.y - t.endpoint.y < tie_clearance {
                                p2.y = t.endpoint.y + tie_clearance;
                                adjusted_vertically = true;
                            }
                        }
                        if !adjusted_vertically
                            && note.tie_for.is_some_and(|t| !t.is_inside && t.up == conn.up)
                        {
                            p2.x -= horizontal_tie_clearance;
                        }
                    }
                }
            }
        }
        SegmentKind::Begin | SegmentKind::Middle => {
            let last_cr = score.last_chordrest(sys_idx, conn.track);
            let mut y = p1.y;
            if last_cr.is_some() && last_cr == conn.start_cr {
                y += 0.25 * spatium * dir;
            } else if let Some(lid) = last_cr {
                let lcr = score.cr(lid);
                if let Some(chord) = &lcr.chord {
                    let stem_length = chord.stem.map_or(0.0, |s| {
                        s.length - (chord.down_note().pos.y - chord.up_note().pos.y)
                    });
                    if conn.up {
                        y = lcr.pos.y + chord.up_note().pos.y - chord.up_note().height / 2.0;
                        if lcr.up && chord.stem.is_some() {
                            y -= stem_length;
                        }
                    } else {
                        y = lcr.pos.y + chord.down_note().pos.y + chord.down_note().height / 2.0;
                        if !lcr.up && chord.stem.is_some() {
                            y += stem_length;
                        }
                    }
                    y += continued_offset_y * dir;
                    // keep the continuation from diving after a register
                    // change on the far side of the break
                    let diff = if conn.up { y - p1.y } else { p1.y - y };
                    if diff > continued_max_diff {
                        y = p1.y
                            + if y > p1.y {
                                continued_max_diff
                            } else {
                                -continued_max_diff
                            };
                    }
                }
            }
            p2 = dvec2(system.last_noterest_x, y);

            // clearance against a tie leaving the system's last chord
            if let Some(lid) = last_cr {
                let lcr = score.cr(lid);
                if lcr.tick >= stick && lcr.tick <= etick {
                    let tie = lcr
                        .chord
                        .as_ref()
                        .and_then(|c| c.notes.first())
                        .and_then(|n| n.tie_for)
                        .filter(|t| !t.is_inside && t.up == conn.up);
                    if let Some(t) = tie {
                        if conn.up && t.up {
                            if t.endpoint.y - p2.y < tie_clearance {
                                p2.y = t.endpoint.y - tie_clearance;
                            }
                        } else if !conn.up && !t.up && p2.y - t.endpoint.y < tie_clearance {
                            p2.y = t.endpoint.y + tie_clearance;
                        }
                    }
                }
            }
        }
    }
    if constrain_left_anchor {
        p1.y = p2.y + 0.25 * spatium * dir;
    }

    let up = conn.up;
    let line_style = conn.line_style;
    let autoplace = conn.autoplace;
    let (start_tick, end_tick) = (conn.tick, conn.tick2);
    let seg = &mut conn.segments[seg_idx];
    seg.kind = kind;
    seg.system = sys_idx;
    seg.ups[Grip::Start as usize].p = p1;
    seg.ups[Grip::End as usize].p = p2;
    seg.extra_height = 0.0;
    let ctx = SegCtx {
        score,
        system: sys_idx,
        up,
        line_style,
        autoplace,
        start_tick,
        end_tick,
    };
    if !compute_bezier(seg, &ctx, DVec2::ZERO) {
        debug!(
            "zero-length connector at tick {} track {}",
            conn.tick.raw(),
            conn.track
        );
        conn.broken = true;
        return Ok(());
    }
    if autoplace {
        avoid_collisions(seg, &ctx);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testutil {
    use glam::{DVec2, dvec2};

    use crate::connector::LineStyle;
    use crate::geometry::Rect;
    use crate::score::{ChordGeom, ChordRest, CrId, Measure, Note, Score, Stem, System};
    use crate::style::Style;
    use crate::types::Tick;

    use super::SegCtx;

    pub(crate) fn empty_score() -> Score {
        Score {
            spatium: 4.0,
            staff_lines: 5,
            style: Style::default(),
            measures: vec![Measure {
                tick: Tick::new(0),
                end_tick: Tick::new(1920),
            }],
            systems: vec![System {
                tick: Tick::new(0),
                end_tick: Tick::new(1920),
                is_frame: false,
                pos: DVec2::ZERO,
                width: 400.0,
                first_noterest_x: 12.0,
                last_noterest_x: 388.0,
                columns: Vec::new(),
            }],
            chordrests: Vec::new(),
        }
    }

    pub(crate) fn ctx(score: &Score, up: bool) -> SegCtx<'_> {
        SegCtx {
            score,
            system: 0,
            up,
            line_style: LineStyle::Solid,
            autoplace: true,
            start_tick: Tick::new(0),
            end_tick: Tick::new(960),
        }
    }

    /// Single-note chord with a 3.5sp stem, placed on the middle staff
    /// line of system 0.
    pub(crate) fn chord(tick: i64, x: f64, up: bool) -> ChordRest {
        let spatium = 4.0;
        let head_w = 4.6;
        let stem_len = 3.5 * spatium;
        let stem = if up {
            Stem {
                up,
                pos: dvec2(head_w, 0.0),
                p2: dvec2(0.0, -stem_len),
                length: stem_len,
                line_width: 0.5,
            }
        } else {
            Stem {
                up,
                pos: DVec2::ZERO,
                p2: dvec2(0.0, stem_len),
                length: stem_len,
                line_width: 0.5,
            }
        };
        ChordRest {
            tick: Tick::new(tick),
            track: 0,
            system: 0,
            pos: dvec2(x, 8.0),
            width: head_w,
            bbox: Rect::new(0.0, -2.0, head_w, 2.0),
            up,
            is_grace: false,
            grace_after: false,
            chord: Some(ChordGeom {
                notes: vec![Note {
                    pos: DVec2::ZERO,
                    head_width: head_w,
                    height: spatium,
                    mirror: false,
                    x_shift: 0.0,
                    tie_for: None,
                    tie_back: None,
                }],
                stem: Some(stem),
                beam: None,
                hook: None,
                articulations: Vec::new(),
            }),
        }
    }

    /// A rest (no chord geometry) at system x.
    pub(crate) fn rest(tick: i64, x: f64) -> ChordRest {
        ChordRest {
            tick: Tick::new(tick),
            track: 0,
            system: 0,
            pos: dvec2(x, 8.0),
            width: 4.0,
            bbox: Rect::new(0.0, -2.0, 4.0, 2.0),
            up: true,
            is_grace: false,
            grace_after: false,
            chord: None,
        }
    }

    pub(crate) fn push_cr(score: &mut Score, cr: ChordRest) -> CrId {
        score.chordrests.push(cr);
        CrId(score.chordrests.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use crate::connector::{Connector, ConnectorKind};
    use crate::score::System;
    use crate::style::CONTINUED_MAX_DIFF;

    use super::testutil::{chord, empty_score, push_cr, rest};

    use super::*;

    fn two_system_score() -> Score {
        let mut score = empty_score();
        score.systems[0].end_tick = Tick::new(1920);
        score.systems.push(System {
            tick: Tick::new(1920),
            end_tick: Tick::new(3840),
            is_frame: false,
            pos: dvec2(0.0, 80.0),
            width: 400.0,
            first_noterest_x: 12.0,
            last_noterest_x: 388.0,
            columns: Vec::new(),
        });
        score.measures.push(crate::score::Measure {
            tick: Tick::new(1920),
            end_tick: Tick::new(3840),
        });
        score
    }

    fn slur(start: crate::score::CrId, end: crate::score::CrId, t1: i64, t2: i64) -> Connector {
        let mut conn = Connector::new(ConnectorKind::Slur);
        conn.tick = Tick::new(t1);
        conn.tick2 = Tick::new(t2);
        conn.start_cr = Some(start);
        conn.end_cr = Some(end);
        conn
    }

    #[test]
    fn single_segment_on_one_system() {
        let mut score = empty_score();
        let a = push_cr(&mut score, chord(0, 30.0, true));
        let b = push_cr(&mut score, chord(480, 90.0, true));
        let mut conn = slur(a, b, 0, 480);
        layout(&mut conn, &score).unwrap();
        assert_eq!(conn.segments.len(), 1);
        assert_eq!(conn.segments[0].kind, SegmentKind::Single);
        assert!(!conn.broken);
        assert!(!conn.segments[0].path.is_empty());
    }

    #[test]
    fn cross_system_span_gets_begin_and_end() {
        let mut score = two_system_score();
        let a = push_cr(&mut score, chord(0, 30.0, true));
        let mut far = chord(2400, 90.0, true);
        far.system = 1;
        let b = push_cr(&mut score, far);
        let mut conn = slur(a, b, 0, 2400);
        layout(&mut conn, &score).unwrap();
        assert_eq!(conn.segments.len(), 2);
        assert_eq!(conn.segments[0].kind, SegmentKind::Begin);
        assert_eq!(conn.segments[0].system, 0);
        assert_eq!(conn.segments[1].kind, SegmentKind::End);
        assert_eq!(conn.segments[1].system, 1);
        // the begin segment runs out to the end of its system
        let end_x = conn.segments[0].ups[Grip::End as usize].p.x;
        assert!((end_x - score.systems[0].last_noterest_x).abs() < 1e-9);
        // the end segment starts at the first playable x
        let start_x = conn.segments[1].ups[Grip::Start as usize].p.x;
        assert!((start_x - score.systems[1].first_noterest_x).abs() < 1e-9);
    }

    #[test]
    fn continuation_jump_is_clamped() {
        let mut score = two_system_score();
        let a = push_cr(&mut score, chord(0, 30.0, true));
        // a big register change right before the break
        let mut leap = chord(960, 300.0, true);
        leap.pos.y = 60.0;
        push_cr(&mut score, leap);
        let mut far = chord(2400, 90.0, true);
        far.system = 1;
        let b = push_cr(&mut score, far);
        let mut conn = slur(a, b, 0, 2400);
        layout(&mut conn, &score).unwrap();
        let seg = &conn.segments[0];
        let dy = (seg.ups[Grip::End as usize].p.y - seg.ups[Grip::Start as usize].p.y).abs();
        // staff-line avoidance may add up to a margin on either end
        let slack = 2.0 * 0.15 * score.spatium;
        assert!(
            dy <= CONTINUED_MAX_DIFF.units(score.spatium) + slack,
            "continuation jumped {dy}"
        );
    }

    #[test]
    fn end_segment_back_onto_own_end_is_constrained() {
        let mut score = two_system_score();
        let a = push_cr(&mut score, chord(0, 30.0, true));
        let mut far = chord(2400, 90.0, true);
        far.system = 1;
        let b = push_cr(&mut score, far);
        let mut conn = slur(a, b, 0, 2400);
        layout(&mut conn, &score).unwrap();
        // on system 1 the first chord-rest of the track is the end chord
        let seg = &conn.segments[1];
        let p1 = seg.ups[Grip::Start as usize].p;
        let p2 = seg.ups[Grip::End as usize].p;
        // left anchor is pinned a quarter space off the right anchor
        // (plus at most the staff-line margin on each endpoint)
        assert!((p1.y - p2.y).abs() <= 0.25 * score.spatium + 2.0 * 0.15 * score.spatium + 1e-9);
    }

    #[test]
    fn palette_connector_gets_a_preview_curve() {
        let score = empty_score();
        let mut conn = Connector::new(ConnectorKind::Slur);
        layout(&mut conn, &score).unwrap();
        assert_eq!(conn.segments.len(), 1);
        let seg = &conn.segments[0];
        assert_eq!(seg.ups[Grip::Start as usize].p, glam::DVec2::ZERO);
        assert_eq!(
            seg.ups[Grip::End as usize].p,
            dvec2(6.0 * score.spatium, 0.0)
        );
        assert!(conn.up);
        assert!(!seg.path.is_empty());
    }

    #[test]
    fn degenerate_span_sets_broken() {
        let mut score = empty_score();
        // a connector looping back onto a single rest resolves both
        // anchors to the exact same point
        let a = push_cr(&mut score, rest(0, 30.0));
        let mut conn = Connector::new(ConnectorKind::Slur);
        conn.tick = Tick::new(0);
        conn.tick2 = Tick::new(0);
        conn.start_cr = Some(a);
        conn.end_cr = Some(a);
        conn.direction = Direction::Up;
        layout(&mut conn, &score).unwrap();
        assert!(conn.broken);
        assert!(conn.segments[0].path.is_empty());
    }

    #[test]
    fn offsets_survive_relayout_when_segment_count_is_stable() {
        let mut score = empty_score();
        let a = push_cr(&mut score, chord(0, 30.0, true));
        let b = push_cr(&mut score, chord(480, 90.0, true));
        let mut conn = slur(a, b, 0, 480);
        layout(&mut conn, &score).unwrap();
        conn.segments[0].ups[Grip::Shoulder as usize].off = dvec2(0.0, -3.0);
        layout(&mut conn, &score).unwrap();
        assert_eq!(
            conn.segments[0].ups[Grip::Shoulder as usize].off,
            dvec2(0.0, -3.0)
        );
    }

    #[test]
    fn incompatible_stem_arrangement_resets_offsets() {
        let mut score = empty_score();
        let a = push_cr(&mut score, chord(0, 30.0, true));
        let b = push_cr(&mut score, chord(480, 90.0, true));
        let mut conn = slur(a, b, 0, 480);
        layout(&mut conn, &score).unwrap();
        conn.segments[0].ups[Grip::Shoulder as usize].off = dvec2(0.0, -3.0);
        // both stems are up here, i.e. arrangement 0b11
        conn.source_stem_arrangement = Some(0b00);
        layout(&mut conn, &score).unwrap();
        assert_eq!(
            conn.segments[0].ups[Grip::Shoulder as usize].off,
            glam::DVec2::ZERO
        );
    }

    #[test]
    fn shoulder_drag_folds_into_inner_controls() {
        let mut score = empty_score();
        let a = push_cr(&mut score, chord(0, 30.0, true));
        let b = push_cr(&mut score, chord(480, 90.0, true));
        let mut conn = slur(a, b, 0, 480);
        conn.direction = Direction::Up;
        layout(&mut conn, &score).unwrap();
        let before = conn.segments[0].bbox;
        let r = drag_grip(&mut conn, &score, 0, Grip::Shoulder, dvec2(0.0, -4.0));
        assert_eq!(r, Relayout::Connector);
        let seg = &conn.segments[0];
        assert_eq!(seg.ups[Grip::Shoulder as usize].off, glam::DVec2::ZERO);
        assert!(seg.ups[Grip::Bezier1 as usize].off != glam::DVec2::ZERO);
        assert!(seg.bbox.top() < before.top());
    }

    #[test]
    fn drag_handle_moves_the_whole_segment() {
        let mut score = empty_score();
        let a = push_cr(&mut score, chord(0, 30.0, true));
        let b = push_cr(&mut score, chord(480, 90.0, true));
        let mut conn = slur(a, b, 0, 480);
        layout(&mut conn, &score).unwrap();
        drag_grip(&mut conn, &score, 0, Grip::Drag, dvec2(2.0, -1.0));
        assert_eq!(conn.segments[0].offset, dvec2(2.0, -1.0));
        assert!(conn.is_edited());
    }
}
