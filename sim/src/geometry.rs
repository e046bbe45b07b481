//! Geometry primitives: headings, hit boxes, segment tests and fire control.
//!
//! Heading convention: degrees in `[0, 360)`, 0 points north (toward -y),
//! angles grow clockwise, so a heading of 90 points east (+x). A ship moving
//! at `speed` along heading `h` advances by `(sin h, -cos h) * speed`.

/// Euclidean distance between two points.
#[inline]
pub fn distance(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    (dx * dx + dy * dy).sqrt()
}

/// Wrap any angle into `[0, 360)`.
pub fn normalize_heading(deg: f32) -> f32 {
    let h = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

/// Unit vector for a heading.
#[inline]
pub fn heading_vector(heading: f32) -> (f32, f32) {
    let rad = heading.to_radians();
    (rad.sin(), -rad.cos())
}

/// Bearing from one point to another, in heading degrees.
pub fn bearing(from_x: f32, from_y: f32, to_x: f32, to_y: f32) -> f32 {
    let dx = to_x - from_x;
    let dy = to_y - from_y;
    normalize_heading(dx.atan2(-dy).to_degrees())
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
/// Positive means clockwise.
pub fn angle_delta(from: f32, to: f32) -> f32 {
    let cw = normalize_heading(to - from);
    if cw > 180.0 {
        cw - 360.0
    } else {
        cw
    }
}

/// Rotate `current` toward `target` by at most `max_step` degrees, taking the
/// shorter way round. The result is always normalized.
pub fn rotate_towards(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = angle_delta(current, target);
    if delta.abs() <= max_step {
        normalize_heading(target)
    } else if delta > 0.0 {
        normalize_heading(current + max_step)
    } else {
        normalize_heading(current - max_step)
    }
}

/// A firing arc relative to the hull: the clockwise sweep from `start` to
/// `end`. `start > end` wraps through the bow.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FiringArc {
    pub start: f32,
    pub end: f32,
}

impl FiringArc {
    pub const FULL: FiringArc = FiringArc {
        start: 0.0,
        end: 360.0,
    };

    pub const fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Whether a hull-relative angle lies inside the arc.
    pub fn contains(&self, relative: f32) -> bool {
        if self.end - self.start >= 360.0 {
            return true;
        }
        let rel = normalize_heading(relative);
        let start = normalize_heading(self.start);
        let end = normalize_heading(self.end);
        if start <= end {
            rel >= start && rel <= end
        } else {
            rel >= start || rel <= end
        }
    }
}

/// Whether an absolute bearing falls in either of two hull-relative arcs.
pub fn in_firing_arcs(arcs: &[FiringArc; 2], hull_heading: f32, absolute_bearing: f32) -> bool {
    let relative = normalize_heading(absolute_bearing - hull_heading);
    arcs.iter().any(|arc| arc.contains(relative))
}

/// An oriented rectangle: a hull footprint.
#[derive(Debug, Clone, Copy)]
pub struct RotatedRect {
    pub cx: f32,
    pub cy: f32,
    pub half_length: f32,
    pub half_width: f32,
    pub heading: f32,
}

impl RotatedRect {
    pub fn new(cx: f32, cy: f32, length: f32, width: f32, heading: f32) -> Self {
        Self {
            cx,
            cy,
            half_length: length / 2.0,
            half_width: width / 2.0,
            heading,
        }
    }

    /// Project a point into hull space: (along the keel, across the beam).
    fn local(&self, x: f32, y: f32) -> (f32, f32) {
        let (fx, fy) = heading_vector(self.heading);
        // Starboard axis is the bow axis rotated 90 degrees clockwise.
        let (sx, sy) = (-fy, fx);
        let dx = x - self.cx;
        let dy = y - self.cy;
        (dx * fx + dy * fy, dx * sx + dy * sy)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        let (along, across) = self.local(x, y);
        along.abs() <= self.half_length && across.abs() <= self.half_width
    }

    /// Corners in order bow-port, bow-starboard, stern-starboard, stern-port.
    pub fn corners(&self) -> [(f32, f32); 4] {
        let (fx, fy) = heading_vector(self.heading);
        let (sx, sy) = (-fy, fx);
        let corner = |a: f32, b: f32| {
            (
                self.cx + fx * a + sx * b,
                self.cy + fy * a + sy * b,
            )
        };
        [
            corner(self.half_length, -self.half_width),
            corner(self.half_length, self.half_width),
            corner(-self.half_length, self.half_width),
            corner(-self.half_length, -self.half_width),
        ]
    }

    /// Whether the segment `a -> b` touches the rectangle.
    pub fn intersects_segment(&self, a: (f32, f32), b: (f32, f32)) -> bool {
        if self.contains(a.0, a.1) || self.contains(b.0, b.1) {
            return true;
        }
        let c = self.corners();
        (0..4).any(|i| segments_intersect(a, b, c[i], c[(i + 1) % 4]))
    }
}

fn orientation(p: (f32, f32), q: (f32, f32), r: (f32, f32)) -> f32 {
    (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
}

fn on_segment(p: (f32, f32), q: (f32, f32), r: (f32, f32)) -> bool {
    r.0 >= p.0.min(q.0) && r.0 <= p.0.max(q.0) && r.1 >= p.1.min(q.1) && r.1 <= p.1.max(q.1)
}

/// Whether segments `p1-p2` and `q1-q2` intersect (touching counts).
pub fn segments_intersect(p1: (f32, f32), p2: (f32, f32), q1: (f32, f32), q2: (f32, f32)) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// Fire-control solution: where to aim so a projectile launched now from
/// `shooter` at `projectile_speed` meets a target moving at constant velocity.
///
/// Solves `|d + v t| = s t` for the smallest positive `t`. If the target
/// cannot be caught, aims at its current position.
pub fn lead_aim_point(
    shooter: (f32, f32),
    projectile_speed: f32,
    target: (f32, f32),
    target_velocity: (f32, f32),
) -> (f32, f32) {
    let (dx, dy) = (target.0 - shooter.0, target.1 - shooter.1);
    let (vx, vy) = target_velocity;

    let a = vx * vx + vy * vy - projectile_speed * projectile_speed;
    let b = 2.0 * (dx * vx + dy * vy);
    let c = dx * dx + dy * dy;

    let t = if a.abs() < 1e-6 {
        // Equal speeds: the quadratic degenerates to a line.
        if b.abs() < 1e-6 {
            None
        } else {
            Some(-c / b)
        }
    } else {
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            None
        } else {
            let root = disc.sqrt();
            let t1 = (-b - root) / (2.0 * a);
            let t2 = (-b + root) / (2.0 * a);
            match (t1 > 0.0, t2 > 0.0) {
                (true, true) => Some(t1.min(t2)),
                (true, false) => Some(t1),
                (false, true) => Some(t2),
                (false, false) => None,
            }
        }
    };

    match t {
        Some(t) if t > 0.0 && t.is_finite() => (target.0 + vx * t, target.1 + vy * t),
        _ => target,
    }
}
