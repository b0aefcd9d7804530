use terra_assets::AssetError;
use terra_render::RenderError;

/// Reasons initialization stops.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// Another initialization is running or the system is already up.
    #[error("the planet view is already initializing or running")]
    AlreadyActive,

    #[error("container #{0} not found")]
    ContainerMissing(String),

    /// The host cannot render and no override forces an attempt.
    #[error("rendering is not supported on this device")]
    Unsupported,

    /// No drawing surface or GPU context.
    #[error("rendering context unavailable: {0}")]
    Context(#[source] RenderError),

    /// The planet's textures failed or timed out.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// A scene component could not be built.
    #[error("scene construction failed: {0}")]
    Scene(#[from] RenderError),

    /// The lifecycle was disposed while initialization was in flight.
    #[error("initialization was cancelled")]
    Cancelled,
}

impl InitError {
    /// Whether the failure is shown to the user with a retry action.
    pub fn shows_error_panel(&self) -> bool {
        matches!(self, Self::Context(_) | Self::Asset(_) | Self::Scene(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Asset(e) if e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classification() {
        let timeout = InitError::from(AssetError::Timeout(Duration::from_secs(10)));
        assert!(timeout.is_timeout());
        assert!(timeout.shows_error_panel());
        assert!(!InitError::Cancelled.shows_error_panel());
        assert!(!InitError::ContainerMissing("x".into()).shows_error_panel());
        assert!(!InitError::AlreadyActive.is_timeout());
    }
}
