//! Interpolation of real-world coordinates and ground level along a sampled
//! flight path.

use crate::tables::PathTable;

/// Interpolate (x, y, ground level) at path-local position `pos`.
///
/// Positions are `fid - 1` of the path samples. Interior positions use the
/// bracketing pair found by direct indexing (the loader guarantees unit
/// fiducial spacing); positions outside the sampled range extend the slope
/// of the first or last sample pair. Both extrapolations agree with the
/// interior formula at the range boundaries.
pub fn interpolate(pos: f64, path: &PathTable) -> (f64, f64, f64) {
    let pts = &path.points;
    let n = pts.len();
    let first = path.first() as f64;
    let last = path.last() as f64;

    let (a, b, lr) = if pos < first {
        // Extend the first segment's slope backward; lr <= 0.
        (&pts[0], &pts[1], pos - first)
    } else if pos >= last {
        // Extend the last segment's slope forward, anchored on the last
        // sample: result = b + (b - a) * lr.
        let a = &pts[n - 2];
        let b = &pts[n - 1];
        let lr = pos - last;
        return (
            b.coord_x + (b.coord_x - a.coord_x) * lr,
            b.coord_y + (b.coord_y - a.coord_y) * lr,
            b.gl + (b.gl - a.gl) * lr,
        );
    } else {
        let i = (pos - first).floor() as usize;
        (&pts[i], &pts[i + 1], pos - first - i as f64)
    };

    (
        a.coord_x + (b.coord_x - a.coord_x) * lr,
        a.coord_y + (b.coord_y - a.coord_y) * lr,
        a.gl + (b.gl - a.gl) * lr,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::PathPoint;

    fn two_point_path() -> PathTable {
        PathTable {
            points: vec![
                PathPoint {
                    fid: 1,
                    pix_x: 0.0,
                    pix_y: 0.0,
                    coord_x: 10.0,
                    coord_y: 100.0,
                    gl: 5.0,
                },
                PathPoint {
                    fid: 2,
                    pix_x: 1.0,
                    pix_y: 0.0,
                    coord_x: 20.0,
                    coord_y: 200.0,
                    gl: 15.0,
                },
            ],
        }
    }

    fn three_point_path() -> PathTable {
        PathTable {
            points: vec![
                PathPoint {
                    fid: 1,
                    pix_x: 0.0,
                    pix_y: 0.0,
                    coord_x: 0.0,
                    coord_y: 0.0,
                    gl: 0.0,
                },
                PathPoint {
                    fid: 2,
                    pix_x: 1.0,
                    pix_y: 0.0,
                    coord_x: 10.0,
                    coord_y: 5.0,
                    gl: 2.0,
                },
                PathPoint {
                    fid: 3,
                    pix_x: 2.0,
                    pix_y: 0.0,
                    coord_x: 30.0,
                    coord_y: 15.0,
                    gl: 8.0,
                },
            ],
        }
    }

    #[test]
    fn interior_midpoint() {
        let (x, y, t) = interpolate(0.6, &two_point_path());
        assert_eq!((x, y, t), (16.0, 160.0, 11.0));
    }

    #[test]
    fn interior_identity_at_samples() {
        let path = three_point_path();
        let (x, y, t) = interpolate(1.0, &path);
        assert_eq!((x, y, t), (10.0, 5.0, 2.0));
        let (x, y, t) = interpolate(0.0, &path);
        assert_eq!((x, y, t), (0.0, 0.0, 0.0));
    }

    #[test]
    fn left_extrapolation_continuous_at_first() {
        let (x, y, t) = interpolate(0.0, &two_point_path());
        assert_eq!((x, y, t), (10.0, 100.0, 5.0));
    }

    #[test]
    fn left_extrapolation_extends_slope() {
        let (x, y, t) = interpolate(-1.0, &two_point_path());
        assert_eq!((x, y, t), (0.0, 0.0, -5.0));
    }

    #[test]
    fn right_extrapolation() {
        let (x, y, t) = interpolate(3.0, &two_point_path());
        assert_eq!((x, y, t), (40.0, 400.0, 35.0));
    }

    #[test]
    fn right_extrapolation_continuous_at_last() {
        let path = three_point_path();
        // pos == last takes the extrapolation branch with lr == 0; it must
        // equal the last sample exactly.
        let (x, y, t) = interpolate(2.0, &path);
        assert_eq!((x, y, t), (30.0, 15.0, 8.0));
    }

    #[test]
    fn bracket_uses_correct_segment() {
        let path = three_point_path();
        let (x, y, t) = interpolate(1.5, &path);
        assert_eq!((x, y, t), (20.0, 10.0, 5.0));
    }
}
