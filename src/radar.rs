//! Placement of peers on the radar.

use serde::{Deserialize, Serialize};

/// Position as percentages of a square viewport, origin top-left.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
}

/// Projects `(distance, angle)` around the viewport centre.
///
/// `scale` divides the display distance: 2.0 puts a distance of 100 on the
/// viewport edge, larger values pull markers inward.
pub fn polar_placement(distance: f64, angle_degrees: f64, scale: f64) -> Placement {
    let radius = distance / scale;
    let radians = angle_degrees.to_radians();
    Placement {
        x: 50.0 + radius * radians.cos(),
        y: 50.0 + radius * radians.sin(),
    }
}
