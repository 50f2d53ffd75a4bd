//! Curve construction: turns two endpoint grips into the full bezier,
//! the stroke path and the collision shape of a segment.

use glam::{DAffine2, DVec2, dvec2};

use crate::connector::{ConnectorSegment, Grip, LineStyle};
use crate::geometry::{BezierPath, CubicBezier, Rect};
use crate::layout::SegCtx;
use crate::style::{SHAPE_SAMPLES, STAFF_LINE_MARGIN};

/// Compute the bezier control points, grip positions, stroke path and
/// collision shape of a segment from its endpoint grips.
///
/// `p6o` is a shoulder displacement in page units, non-zero only while
/// the shoulder grip is being dragged. Returns `false` when the
/// endpoints coincide and no curve exists.
pub(crate) fn compute_bezier(seg: &mut ConnectorSegment, ctx: &SegCtx<'_>, p6o: DVec2) -> bool {
    let spatium = ctx.score.spatium;
    if ctx.autoplace {
        adjust_endpoints(seg, ctx);
    }

    let pp1 = seg.ups[Grip::Start as usize].pos();
    let pp2 = seg.ups[Grip::End as usize].pos();
    let span = pp2 - pp1;
    if span == DVec2::ZERO {
        return false;
    }

    // work in a frame where the chord goes from the origin along +x
    let angle = span.y.atan2(span.x);
    let rot = DAffine2::from_angle(-angle);
    let p2 = rot.transform_vector2(span);
    let p6o = rot.transform_vector2(p6o);

    let small_h = 0.5;
    let d = p2.x / spatium;
    let (mut shoulder_h, shoulder_w) = if d <= 2.0 {
        (d * 0.5 * small_h * spatium, 0.6)
    } else {
        let dd = ((1.0 + (d - 2.0) * 0.5).log10() * 2.0).min(3.0);
        let h = (dd + small_h) * spatium + seg.extra_height;
        let w = if d > 18.0 {
            0.7
        } else if d > 10.0 {
            0.6
        } else {
            0.5
        };
        (h, w)
    };
    shoulder_h -= p6o.y;
    if !ctx.up {
        shoulder_h = -shoulder_h;
    }

    let c = p2.x;
    let c1 = (c - c * shoulder_w) * 0.5 + p6o.x;
    let c2 = c1 + c * shoulder_w + p6o.x;

    let p5 = dvec2(c * 0.5, 0.0);
    let p3 = dvec2(c1, -shoulder_h);
    let p4 = dvec2(c2, -shoulder_h);

    let style = &ctx.score.style;
    let mut w = (style.slur_mid_width - style.slur_end_width).units(spatium);
    if (c2 - c1) <= spatium {
        w *= 0.5;
    }
    let th = dvec2(0.0, w);

    // user offsets of the inner control grips, rotated into the local frame
    let p3o = p6o + rot.transform_vector2(seg.ups[Grip::Bezier1 as usize].off);
    let p4o = p6o + rot.transform_vector2(seg.ups[Grip::Bezier2 as usize].off);

    // a shoulder drag becomes a permanent offset of both inner grips
    if p6o != DVec2::ZERO {
        let p6i = rot.inverse().transform_vector2(p6o);
        seg.ups[Grip::Bezier1 as usize].off += p6i;
        seg.ups[Grip::Bezier2 as usize].off += p6i;
    }

    let pp3 = p3 + p3o;
    let pp4 = p4 + p4o;
    // shoulder grip at the midpoint of the inner control polygon
    let p6 = pp3 + (pp4 - pp3) * 0.5 - p6o;

    let mut path = BezierPath::new(DVec2::ZERO);
    path.cubic_to(pp3 - th, pp4 - th, p2);
    if ctx.line_style == LineStyle::Solid {
        path.cubic_to(pp4 + th, pp3 + th, DVec2::ZERO);
    }

    let to_world = DAffine2::from_translation(pp1) * DAffine2::from_angle(angle);
    seg.path = path.transformed(&to_world);
    seg.ups[Grip::Bezier1 as usize].p = to_world.transform_point2(p3);
    seg.ups[Grip::Bezier2 as usize].p = to_world.transform_point2(p4);
    seg.ups[Grip::End as usize].p =
        to_world.transform_point2(p2) - seg.ups[Grip::End as usize].off;
    seg.ups[Grip::Drag as usize].p = to_world.transform_point2(p5);
    seg.ups[Grip::Shoulder as usize].p = to_world.transform_point2(p6);

    seg.shape.clear();
    let min_h = (3.0 * w).abs();
    let curve = CubicBezier::new(
        pp1,
        seg.ups[Grip::Bezier1 as usize].pos(),
        seg.ups[Grip::Bezier2 as usize].pos(),
        seg.ups[Grip::End as usize].pos(),
    );
    let mut start = pp1;
    for i in 1..=SHAPE_SAMPLES {
        let point = curve.eval(i as f64 / SHAPE_SAMPLES as f64);
        let mut re = Rect::from_corners(start, point);
        if re.height() < min_h {
            re.expand_vertical((min_h - re.height()) * 0.5);
        }
        seg.shape.add(re);
        start = point;
    }
    seg.bbox = seg.path.bounding_rect();
    true
}

/// Nudge an endpoint off a staff line it sits too close to. Only
/// endpoints inside the staff (within the margin of the outer lines)
/// are touched.
pub(crate) fn adjust_endpoints(seg: &mut ConnectorSegment, ctx: &SegCtx<'_>) {
    let spatium = ctx.score.spatium;
    let lines = ctx.score.staff_lines as f64;
    for grip in [Grip::Start, Grip::End] {
        let ysp = seg.ups[grip as usize].p.y / spatium;
        if ysp > -STAFF_LINE_MARGIN && ysp < (lines - 1.0) + STAFF_LINE_MARGIN {
            seg.ups[grip as usize].p.y += staff_line_adjustment(ctx.up, ysp) * spatium;
        }
    }
}

/// Vertical correction (in staff spaces) moving an endpoint away from
/// the nearest staff line, in the curve's direction.
fn staff_line_adjustment(up: bool, ysp: f64) -> f64 {
    let offset = ysp - ysp.floor();
    if up {
        if offset < STAFF_LINE_MARGIN {
            // just below a line: pull up past it
            -(STAFF_LINE_MARGIN - offset)
        } else if offset > 1.0 - STAFF_LINE_MARGIN {
            // just above the next line: pull up short of it
            -(offset - (1.0 - STAFF_LINE_MARGIN))
        } else {
            0.0
        }
    } else if offset < STAFF_LINE_MARGIN {
        STAFF_LINE_MARGIN - offset
    } else if offset > 1.0 - STAFF_LINE_MARGIN {
        (1.0 - offset) + STAFF_LINE_MARGIN
    } else {
        0.0
    }
}
