use super::Vec2;

/// Point halfway along a polyline, measured by accumulated segment length.
pub fn line_midpoint(vertices: &[Vec2]) -> Option<Vec2> {
    if vertices.len() < 2 {
        return vertices.first().copied();
    }

    let mut total = 0.0;
    let mut segments: Vec<(Vec2, Vec2, f64)> = Vec::with_capacity(vertices.len() - 1);
    for pair in vertices.windows(2) {
        let a = pair[0];
        let b = pair[1];
        let len = (b - a).length();
        if !len.is_finite() || len <= 0.0 {
            continue;
        }
        total += len;
        segments.push((a, b, len));
    }
    if total <= 0.0 {
        return vertices.first().copied();
    }

    let mut acc = 0.0;
    let target = total * 0.5;
    for (a, b, len) in segments {
        if acc + len >= target {
            let t = (target - acc) / len;
            return Some(a.lerp(b, t));
        }
        acc += len;
    }

    vertices.last().copied()
}

/// Direction (radians, y axis pointing up) of the first segment whose bounding
/// box contains `point`.
pub fn segment_angle_at(vertices: &[Vec2], point: Vec2) -> Option<f64> {
    for pair in vertices.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let min_x = a.x.min(b.x);
        let max_x = a.x.max(b.x);
        let min_y = a.y.min(b.y);
        let max_y = a.y.max(b.y);
        if point.x >= min_x && point.x <= max_x && point.y >= min_y && point.y <= max_y {
            return Some((a.y - b.y).atan2(b.x - a.x));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_of_polyline() {
        let line = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)];
        assert_eq!(line_midpoint(&line), Some(Vec2::new(10.0, 0.0)));

        let line = [Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0)];
        assert_eq!(line_midpoint(&line), Some(Vec2::new(2.0, 0.0)));
    }

    #[test]
    fn degenerate_lines() {
        assert_eq!(line_midpoint(&[]), None);
        let p = Vec2::new(3.0, 3.0);
        assert_eq!(line_midpoint(&[p, p]), Some(p));
    }

    #[test]
    fn angle_of_containing_segment() {
        let line = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)];
        let angle = segment_angle_at(&line, Vec2::new(5.0, 0.0)).expect("angle");
        assert!(angle.abs() < 1e-12);

        let line = [Vec2::new(0.0, 0.0), Vec2::new(0.0, 10.0)];
        let angle = segment_angle_at(&line, Vec2::new(0.0, 5.0)).expect("angle");
        assert!((angle + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
