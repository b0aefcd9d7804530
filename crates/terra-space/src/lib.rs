//! Star field morphing and shooting stars.
//!
//! The star field keeps every star's origin and target on the GPU and morphs
//! between them with a single `transition` uniform. Targets trace the
//! outlines of on-screen rectangles, unprojected through a virtual camera
//! parked at the pose the real camera settles into.

mod buffer;
mod field;
mod outline;
mod shooting;
mod transition;

pub use buffer::StarBuffer;
pub use field::{StarField, virtual_camera};
pub use outline::{OutlineParams, project_screen_rect_to_world_outline};
pub use shooting::{ShootingStarHandle, ShootingStarPool, ShootingStars, ShowerState};
pub use transition::{MorphTransition, card_opacity};
