//! Viewport state for the map canvas.

/// Rough metres per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;
const MIN_HALF_EXTENT: f64 = 0.01;
const MAX_HALF_EXTENT: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub center: (f64, f64),
    pub accuracy_meters: f64,
    /// Half the visible latitude span, in degrees.
    pub half_extent: f64,
    pub has_fix: bool,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: (0.0, 0.0),
            accuracy_meters: 0.0,
            half_extent: 90.0,
            has_fix: false,
        }
    }
}

impl MapView {
    /// Re-centres on a fix and zooms so the accuracy ring stays in view.
    pub fn set_view(&mut self, lat: f64, lon: f64, accuracy_meters: f64) {
        self.center = (lat, lon);
        self.accuracy_meters = accuracy_meters;
        self.half_extent = (accuracy_degrees(accuracy_meters) * 3.0).clamp(MIN_HALF_EXTENT, MAX_HALF_EXTENT);
        self.has_fix = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn accuracy_degrees(&self) -> f64 {
        accuracy_degrees(self.accuracy_meters)
    }

    /// Longitude bounds. The canvas is roughly twice as wide as tall in cells.
    pub fn x_bounds(&self) -> [f64; 2] {
        if !self.has_fix {
            return [-180.0, 180.0];
        }
        let half = self.half_extent * 2.0;
        [self.center.1 - half, self.center.1 + half]
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        if !self.has_fix {
            return [-90.0, 90.0];
        }
        [self.center.0 - self.half_extent, self.center.0 + self.half_extent]
    }
}

fn accuracy_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_accuracy_zooms_to_city() {
        let mut view = MapView::default();
        view.set_view(48.8, 2.3, 5000.0);
        let [south, north] = view.y_bounds();
        assert!(south < 48.8 && north > 48.8);
        assert!((north - south) < 1.0);
    }

    #[test]
    fn tiny_accuracy_is_clamped() {
        let mut view = MapView::default();
        view.set_view(0.0, 0.0, 1.0);
        assert_eq!(view.half_extent, MIN_HALF_EXTENT);
        view.reset();
        assert_eq!(view.x_bounds(), [-180.0, 180.0]);
    }
}
