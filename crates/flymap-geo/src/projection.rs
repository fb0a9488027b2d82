//! Equirectangular projection from WGS84 coordinates to viewport pixels.

use flymap_core::{GeoPoint, PixelPoint, Viewport};

/// Projects a point onto a viewport with a linear-fractional mapping.
///
/// The y fraction is inverted because the pixel axis grows downward while
/// latitude grows northward. Performs no validation and no clipping: the
/// caller guarantees the point is in range (a [`GeoPoint`] always is), and
/// out-of-viewport output is the caller's problem. Pure and deterministic, so
/// server-side and client-side renders of the same point agree bit-for-bit
/// up to floating point.
pub fn project(point: GeoPoint, viewport: &Viewport) -> PixelPoint {
    let x_percent = (point.lng() + 180.0) / 360.0;
    let y_percent = 1.0 - (point.lat() + 90.0) / 180.0;

    PixelPoint {
        x: x_percent * viewport.width() + viewport.min_x,
        y: y_percent * viewport.height() + viewport.min_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp(max_x: f64, max_y: f64) -> Viewport {
        Viewport {
            min_x: 0.0,
            min_y: 0.0,
            max_x,
            max_y,
        }
    }

    #[test]
    fn test_center_of_map() {
        let p = project(GeoPoint::new(0.0, 0.0).unwrap(), &vp(800.0, 400.0));
        assert_eq!(p.x, 400.0);
        assert_eq!(p.y, 200.0);
    }

    #[test]
    fn test_san_francisco_fixture() {
        let p = project(
            GeoPoint::new(37.7749, -122.4194).unwrap(),
            &vp(800.0, 400.0),
        );
        assert!((p.x - 127.96).abs() < 0.1, "x was {}", p.x);
        assert!((p.y - 116.06).abs() < 0.1, "y was {}", p.y);
    }

    #[test]
    fn test_output_stays_inside_viewport() {
        let viewport = Viewport::default();
        for lat in (-90..=90).step_by(15) {
            for lng in (-180..=180).step_by(30) {
                let p = project(
                    GeoPoint::new(lat as f64, lng as f64).unwrap(),
                    &viewport,
                );
                assert!(p.x >= viewport.min_x && p.x <= viewport.max_x);
                assert!(p.y >= viewport.min_y && p.y <= viewport.max_y);
            }
        }
    }

    #[test]
    fn test_offset_viewport() {
        let viewport = Viewport {
            min_x: 100.0,
            min_y: 50.0,
            max_x: 900.0,
            max_y: 450.0,
        };
        let p = project(GeoPoint::new(0.0, 0.0).unwrap(), &viewport);
        assert_eq!(p.x, 500.0);
        assert_eq!(p.y, 250.0);
    }

    #[test]
    fn test_poles_and_antimeridian() {
        let viewport = vp(800.0, 400.0);
        let north = project(GeoPoint::new(90.0, 0.0).unwrap(), &viewport);
        assert_eq!(north.y, 0.0);
        let south = project(GeoPoint::new(-90.0, 0.0).unwrap(), &viewport);
        assert_eq!(south.y, 400.0);
        let west = project(GeoPoint::new(0.0, -180.0).unwrap(), &viewport);
        assert_eq!(west.x, 0.0);
        let east = project(GeoPoint::new(0.0, 180.0).unwrap(), &viewport);
        assert_eq!(east.x, 800.0);
    }
}
