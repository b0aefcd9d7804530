//! The Terra planet view: a textured Earth with clouds, atmosphere and moon
//! in front of a starfield that reshapes itself around feature cards as the
//! page scrolls.
//!
//! [`TerraEarth`] is the orchestrator. It talks to its embedding through the
//! [`Host`] trait; [`window`] provides a native winit host.

pub mod error;
pub mod host;
pub mod lifecycle;
pub mod orchestrator;
pub mod page;
pub mod platform;
pub mod scheduler;
pub mod sections;
pub mod showcase;
pub mod window;

pub use error::InitError;
pub use host::{ErrorPanel, Host, HostEvent, LoaderGuard, LoadingIndicator};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use orchestrator::{FrameOutcome, InitOptions, TerraEarth};
pub use page::VirtualPage;
pub use platform::{PlatformDirs, PlatformError};
pub use scheduler::{FrameScheduler, FrameToken, QueuedFrames};
pub use sections::{BodyMotion, SectionChange, SectionEntry};
pub use window::{RunError, ViewerOptions};
