//! Camera director: preset flights, orbit swing, wheel zoom and drag rotation.
//!
//! Flights and the orbit swing are independent. A flight moves the orbit
//! target, zoom and look-at point along a quartic in-out curve; the orbit
//! update runs every frame, easing the orbit angle toward its target and
//! smoothing the camera position toward the resulting polar placement.

mod director;
mod drag;
mod section;

pub use director::{CameraDirector, CameraState};
pub use drag::DragState;
pub use section::preset_for_section;
