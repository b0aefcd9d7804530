//! The embedding surface: container lookup, notifications, the loading
//! indicator, the error panel and frame callbacks.

use terra_config::HostEnvironment;
use terra_render::ContainerInfo;

use crate::scheduler::FrameScheduler;

/// Owner token used when requesting the shared loading indicator.
pub const LOADER_OWNER: &str = "three-earth";
/// Element hidden directly when no loading indicator service exists.
pub const LOADER_FALLBACK_ID: &str = "threeEarthLoader";
pub const CONTAINER_ID: &str = "threeEarthContainer";
/// Custom event that starts the showcase mode.
pub const SHOWCASE_EVENT: &str = "three-earth:showcase";

pub const UNSUPPORTED_TEXT: &str =
    "Interaktive 3D-Ansicht wird von Ihrem Gerät nicht unterstützt. Hier eine Vorschau.";

/// Notifications emitted to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The renderer is sized and attached to the container.
    Attached { container_id: String },
    /// Initialization finished; the loop is about to start.
    Ready { container_id: String },
    /// The first frame after ready has been presented.
    FirstFrame { container_id: String },
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Attached { .. } => "three-attached",
            Self::Ready { .. } => "three-ready",
            Self::FirstFrame { .. } => "three-first-frame",
        }
    }

    pub fn container_id(&self) -> &str {
        match self {
            Self::Attached { container_id }
            | Self::Ready { container_id }
            | Self::FirstFrame { container_id } => container_id,
        }
    }
}

/// A loading indicator shared by several owners.
pub trait LoadingIndicator {
    fn request_show(&mut self, owner: &str);
    fn release(&mut self, owner: &str);
}

/// Content of the inline error element.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPanel {
    pub message: String,
    pub retry_label: String,
    /// Underlying error, for logs and tooltips.
    pub detail: String,
}

impl ErrorPanel {
    pub fn for_error(error: &dyn std::error::Error) -> Self {
        Self {
            message: "CSS-Modus".to_string(),
            retry_label: "Neu versuchen".to_string(),
            detail: error.to_string(),
        }
    }
}

/// Everything the orchestrator needs from its embedding.
pub trait Host {
    /// Look up a container element and measure it.
    fn container(&self, id: &str) -> Option<ContainerInfo>;

    /// Whether the container intersects the viewport grown by `margin_px`.
    fn container_visible(&self, id: &str, margin_px: f32) -> bool;

    fn environment(&self) -> HostEnvironment;

    /// Whether a GPU context can be created at all.
    fn supports_rendering(&self) -> bool;

    /// Remove static fallback content from the container.
    fn clear_fallback(&mut self, container_id: &str);

    /// Show the static "not supported" preview instead of the scene.
    fn show_unsupported(&mut self, container_id: &str);

    fn emit(&mut self, event: HostEvent);

    fn loading_indicator(&mut self) -> Option<&mut dyn LoadingIndicator>;

    /// Hide an element by id. Returns `false` if there is no such element.
    fn hide_element(&mut self, id: &str) -> bool;

    fn show_error(&mut self, container_id: &str, panel: &ErrorPanel);

    /// Open `link` in the current view.
    fn navigate(&mut self, link: &str);

    fn frames(&mut self) -> &mut dyn FrameScheduler;
}

/// Tracks this system's claim on the loading indicator so it is released
/// exactly once.
#[derive(Debug, Default)]
pub struct LoaderGuard {
    shown: bool,
    released: bool,
}

impl LoaderGuard {
    pub fn show(host: &mut dyn Host) -> Self {
        if let Some(indicator) = host.loading_indicator() {
            indicator.request_show(LOADER_OWNER);
        }
        Self {
            shown: true,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the claim. Without an indicator service the fallback element
    /// is hidden directly. Later calls do nothing.
    pub fn release(&mut self, host: &mut dyn Host) -> bool {
        if !self.shown || self.released {
            return false;
        }
        self.released = true;
        match host.loading_indicator() {
            Some(indicator) => indicator.release(LOADER_OWNER),
            None => {
                if !host.hide_element(LOADER_FALLBACK_ID) {
                    tracing::debug!("No loader element #{LOADER_FALLBACK_ID} to hide");
                }
            }
        }
        true
    }
}
