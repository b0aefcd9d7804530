//! Native window host: runs the planet view in a winit window.
//!
//! The window stands in for the page. Its client area is the container, the
//! mouse wheel scrolls a [`VirtualPage`] whose sections drive the camera, and
//! a few keys trigger the page events a site would send.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use terra_assets::FileTextureSource;
use terra_config::{EarthConfig, HostEnvironment, WindowConfig};
use terra_render::{ContainerInfo, WgpuBackend};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, ModifiersState, NamedKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::host::{
    CONTAINER_ID, ErrorPanel, Host, HostEvent, LoadingIndicator, SHOWCASE_EVENT, UNSUPPORTED_TEXT,
};
use crate::lifecycle::Lifecycle;
use crate::orchestrator::{FrameOutcome, InitOptions, TerraEarth};
use crate::page::VirtualPage;
use crate::scheduler::{FrameScheduler, QueuedFrames};

/// Logical pixels per wheel line.
const LINE_HEIGHT: f32 = 40.0;
/// Pointer travel below which a press and release count as a click.
const CLICK_SLOP: f32 = 4.0;
/// Wake-up interval while timers are pending and no frame is requested.
const TIMER_TICK: Duration = Duration::from_millis(50);
const MOBILE_MARKER: &str = "Mobile";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Viewer choices taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct ViewerOptions {
    /// Directory texture paths are resolved against.
    pub asset_base: PathBuf,
    pub mobile: bool,
    pub low_end: bool,
    /// Base URL for relative card links.
    pub site_url: Option<String>,
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Scroll to the section with this index.
    JumpToSection(usize),
    MeteorShower,
    Showcase,
    Retry,
    Quit,
}

pub fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Character(c) => match c.as_str() {
            "1" => Some(KeyAction::JumpToSection(0)),
            "2" => Some(KeyAction::JumpToSection(1)),
            "3" => Some(KeyAction::JumpToSection(2)),
            "4" => Some(KeyAction::JumpToSection(3)),
            "m" | "M" => Some(KeyAction::MeteorShower),
            "s" | "S" => Some(KeyAction::Showcase),
            "r" | "R" => Some(KeyAction::Retry),
            _ => None,
        },
        _ => None,
    }
}

/// Page-style scroll distance for a wheel event: positive scrolls down.
pub fn scroll_delta(delta: MouseScrollDelta, scale_factor: f64) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * LINE_HEIGHT,
        MouseScrollDelta::PixelDelta(p) => (-p.y / scale_factor) as f32,
    }
}

/// Normalized device coordinates of a logical point in a `width`x`height`
/// area, with +y up.
pub fn to_ndc(point: Vec2, width: f32, height: f32) -> Vec2 {
    let width = width.max(1.0);
    let height = height.max(1.0);
    Vec2::new(point.x / width * 2.0 - 1.0, 1.0 - point.y / height * 2.0)
}

/// Absolute URL for a card link. Relative links need a site URL.
pub fn resolve_link(site_url: Option<&str>, link: &str) -> Option<String> {
    if link.starts_with("http://") || link.starts_with("https://") {
        return Some(link.to_string());
    }
    let base = site_url?;
    Some(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        link.trim_start_matches('/')
    ))
}

type LinkOpener = Box<dyn FnMut(&str) -> std::io::Result<()>>;

pub fn window_attributes_from_config(config: &WindowConfig) -> WindowAttributes {
    Window::default_attributes()
        .with_title(config.title.clone())
        .with_inner_size(LogicalSize::new(
            f64::from(config.width),
            f64::from(config.height),
        ))
}

/// The window's side of the [`Host`] contract.
pub struct WindowHost {
    window: Option<Arc<Window>>,
    title: String,
    environment: HostEnvironment,
    frames: QueuedFrames,
    minimized: bool,
    hidden: Vec<String>,
    error: Option<ErrorPanel>,
    site_url: Option<String>,
    open_link: LinkOpener,
}

impl WindowHost {
    pub fn new(config: &EarthConfig, mobile: bool) -> Self {
        let mut user_agent = format!(
            "terra/{} ({})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        );
        if mobile {
            user_agent.push(' ');
            user_agent.push_str(MOBILE_MARKER);
        }
        Self {
            window: None,
            title: config.window.title.clone(),
            environment: HostEnvironment {
                user_agent,
                viewport_width: config.window.width as f32,
                viewport_height: config.window.height as f32,
                device_pixel_ratio: 1.0,
                hardware_concurrency: Some(num_cpus::get()),
                force_three: config.debug.force_three,
            },
            frames: QueuedFrames::new(),
            minimized: false,
            hidden: Vec::new(),
            error: None,
            site_url: None,
            open_link: Box::new(|url| open::that(url)),
        }
    }

    pub fn with_site_url(mut self, site_url: Option<String>) -> Self {
        self.site_url = site_url;
        self
    }

    /// Replace the system browser as the target of card clicks.
    pub fn with_link_opener(
        mut self,
        opener: impl FnMut(&str) -> std::io::Result<()> + 'static,
    ) -> Self {
        self.open_link = Box::new(opener);
        self
    }

    fn attach(&mut self, window: Arc<Window>) {
        self.sync_size(window.inner_size(), window.scale_factor());
        self.window = Some(window);
    }

    fn sync_size(&mut self, physical: PhysicalSize<u32>, scale_factor: f64) {
        let logical: LogicalSize<f32> = physical.to_logical(scale_factor);
        self.minimized = physical.width == 0 || physical.height == 0;
        self.environment.viewport_width = logical.width;
        self.environment.viewport_height = logical.height;
        self.environment.device_pixel_ratio = scale_factor as f32;
    }

    fn logical_size(&self) -> (f32, f32) {
        (
            self.environment.viewport_width,
            self.environment.viewport_height,
        )
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    /// Ids hidden through [`Host::hide_element`], oldest first.
    pub fn hidden_elements(&self) -> &[String] {
        &self.hidden
    }

    pub fn error_panel(&self) -> Option<&ErrorPanel> {
        self.error.as_ref()
    }
}

impl Host for WindowHost {
    fn container(&self, id: &str) -> Option<ContainerInfo> {
        if id != CONTAINER_ID || self.window.is_none() {
            return None;
        }
        let (width, height) = self.logical_size();
        Some(ContainerInfo::new(
            id,
            width,
            height,
            self.environment.device_pixel_ratio,
        ))
    }

    fn container_visible(&self, id: &str, _margin_px: f32) -> bool {
        id == CONTAINER_ID && self.window.is_some() && !self.minimized
    }

    fn environment(&self) -> HostEnvironment {
        self.environment.clone()
    }

    fn supports_rendering(&self) -> bool {
        self.window.is_some()
    }

    fn clear_fallback(&mut self, container_id: &str) {
        debug!("Cleared fallback content of #{container_id}");
    }

    fn show_unsupported(&mut self, container_id: &str) {
        warn!("#{container_id}: {UNSUPPORTED_TEXT}");
        if let Some(window) = &self.window {
            window.set_title(&format!("{} (Vorschau)", self.title));
        }
    }

    fn emit(&mut self, event: HostEvent) {
        info!("{} on #{}", event.name(), event.container_id());
    }

    fn loading_indicator(&mut self) -> Option<&mut dyn LoadingIndicator> {
        None
    }

    fn hide_element(&mut self, id: &str) -> bool {
        debug!("Hiding #{id}");
        self.hidden.push(id.to_string());
        true
    }

    fn show_error(&mut self, container_id: &str, panel: &ErrorPanel) {
        error!(
            "#{container_id}: {} ({}), press R to {}",
            panel.message, panel.detail, panel.retry_label
        );
        if let Some(window) = &self.window {
            window.set_title(&format!("{} ({})", self.title, panel.message));
        }
        self.error = Some(panel.clone());
    }

    fn navigate(&mut self, link: &str) {
        let Some(url) = resolve_link(self.site_url.as_deref(), link) else {
            warn!("Card link {link} is relative and no --site-url was given");
            return;
        };
        info!("Opening {url}");
        if let Err(e) = (self.open_link)(&url) {
            warn!("Could not open {url}: {e}");
        }
    }

    fn frames(&mut self) -> &mut dyn FrameScheduler {
        &mut self.frames
    }
}

/// Application state for the native viewer.
pub struct TerraApp {
    config: EarthConfig,
    options: ViewerOptions,
    host: WindowHost,
    runtime: tokio::runtime::Runtime,
    lifecycle: Lifecycle,
    earth: Option<TerraEarth<WgpuBackend>>,
    page: VirtualPage,
    started: Instant,
    cursor: Option<Vec2>,
    press: Option<Vec2>,
    modifiers: ModifiersState,
}

impl TerraApp {
    /// # Errors
    ///
    /// Returns [`RunError::Runtime`] if the async runtime cannot be built.
    pub fn new(config: EarthConfig, options: ViewerOptions) -> Result<Self, RunError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        Ok(Self {
            host: WindowHost::new(&config, options.mobile)
                .with_site_url(options.site_url.clone()),
            page: VirtualPage::new(config.window.height as f32),
            config,
            options,
            runtime,
            lifecycle: Lifecycle::new(),
            earth: None,
            started: Instant::now(),
            cursor: None,
            press: None,
            modifiers: ModifiersState::default(),
        })
    }

    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn start(&mut self) {
        let Some(window) = self.host.window.clone() else {
            return;
        };
        if self.lifecycle.is_initializing() || self.earth.is_some() {
            return;
        }
        self.host.error = None;
        let source = FileTextureSource::new(self.options.asset_base.clone());
        let options = InitOptions {
            force_low_end: self.options.low_end,
            ..InitOptions::default()
        };
        let started = self.started;
        let result = self.runtime.block_on(TerraEarth::init(
            &mut self.host,
            &self.lifecycle,
            self.config.clone(),
            &options,
            &source,
            |container: &ContainerInfo| {
                WgpuBackend::new(
                    Arc::clone(&window),
                    container.size(),
                    container.device_pixel_ratio,
                )
            },
            move || started.elapsed().as_secs_f64(),
        ));
        match result {
            Ok(mut earth) => {
                let now = self.now();
                earth.refresh_visibility(&mut self.host);
                earth.handle_sections(&self.page.entries(), now);
                self.earth = Some(earth);
            }
            Err(e) => warn!("Planet view unavailable: {e}"),
        }
    }

    fn shutdown(&mut self) {
        if let Some(earth) = self.earth.take() {
            earth.dispose(&mut self.host);
        }
    }

    fn scroll(&mut self, delta: f32) {
        if !self.page.scroll_by(delta) {
            return;
        }
        let now = self.now();
        if let Some(earth) = &mut self.earth {
            earth.handle_sections(&self.page.entries(), now);
            earth.handle_scroll(now);
        }
    }

    fn jump_to(&mut self, index: usize) {
        self.page.jump_to(index);
        let now = self.now();
        if let Some(earth) = &mut self.earth {
            earth.handle_sections(&self.page.entries(), now);
            earth.handle_scroll(now);
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, action: KeyAction) {
        let now = self.now();
        match action {
            KeyAction::JumpToSection(index) => self.jump_to(index),
            KeyAction::MeteorShower => {
                if let Some(earth) = &mut self.earth
                    && !earth.trigger_meteor_shower()
                {
                    debug!("Meteor shower unavailable");
                }
            }
            KeyAction::Showcase => {
                if let Some(earth) = &mut self.earth {
                    earth.handle_custom_event(SHOWCASE_EVENT, None, now);
                }
            }
            KeyAction::Retry => {
                if self.earth.is_none() {
                    info!("Retrying initialization");
                    self.start();
                }
            }
            KeyAction::Quit => {
                self.shutdown();
                event_loop.exit();
            }
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let Some(scale_factor) = self.host.window.as_ref().map(|w| w.scale_factor()) else {
            return;
        };
        self.host.sync_size(size, scale_factor);
        let minimized = self.host.minimized;
        let (width, height) = self.host.logical_size();
        let now = self.now();
        let Some(earth) = &mut self.earth else {
            return;
        };
        earth.set_document_hidden(&mut self.host, minimized);
        if minimized {
            return;
        }
        earth.handle_resize(width, height);
        self.page.resize(height);
        earth.handle_sections(&self.page.entries(), now);
    }

    fn cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        let Some(scale_factor) = self.host.window.as_ref().map(|w| w.scale_factor()) else {
            return;
        };
        let logical = position.to_logical::<f32>(scale_factor);
        let point = Vec2::new(logical.x, logical.y);
        self.cursor = Some(point);
        let (width, height) = self.host.logical_size();
        if let Some(earth) = &mut self.earth {
            earth.pointer_moved(to_ndc(point, width, height));
            if self.press.is_some() {
                earth.drag_move(point.x);
            }
        }
    }

    fn mouse_button(&mut self, state: ElementState) {
        let Some(cursor) = self.cursor else {
            return;
        };
        let now = self.now();
        let (width, height) = self.host.logical_size();
        let Some(earth) = &mut self.earth else {
            return;
        };
        match state {
            ElementState::Pressed => {
                self.press = Some(cursor);
                earth.drag_start(cursor.x);
            }
            ElementState::Released => {
                let Some(press) = self.press.take() else {
                    return;
                };
                earth.drag_end(now);
                if press.distance(cursor) < CLICK_SLOP {
                    earth.click(&mut self.host, to_ndc(cursor, width, height));
                }
            }
        }
    }
}

impl ApplicationHandler for TerraApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.host.window.is_some() {
            return;
        }
        let attrs = window_attributes_from_config(&self.config.window);
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };
        self.host.attach(window);
        let (width, height) = self.host.logical_size();
        self.page.resize(height);
        info!("Window ready: {width}x{height}");
        self.start();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::Occluded(occluded) => {
                if let Some(earth) = &mut self.earth {
                    earth.set_document_hidden(&mut self.host, occluded);
                }
            }
            WindowEvent::RedrawRequested => {
                let now = self.now();
                let Some(token) = self.host.frames.pop() else {
                    return;
                };
                if let Some(earth) = &mut self.earth
                    && earth.frame(&mut self.host, token, now) == FrameOutcome::Failed
                {
                    debug!("Frame failed at {now:.3}s");
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => self.modifiers = modifiers.state(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && !event.repeat
                    && let Some(action) = key_action(&event.logical_key)
                {
                    self.handle_key(event_loop, action);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scale_factor = self.host.environment.device_pixel_ratio;
                let dy = scroll_delta(delta, f64::from(scale_factor));
                if self.modifiers.control_key() {
                    if let Some(earth) = &mut self.earth {
                        earth.wheel(dy);
                    }
                } else {
                    self.scroll(dy);
                }
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor_moved(position),
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                let now = self.now();
                if let Some(earth) = &mut self.earth {
                    earth.pointer_left();
                    if self.press.take().is_some() {
                        earth.drag_end(now);
                    }
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.mouse_button(state),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = self.now();
        let timers_pending = match &mut self.earth {
            Some(earth) => {
                earth.advance_timers(now);
                earth.is_showcase_active()
            }
            None => false,
        };
        if !self.host.frames.is_idle() {
            self.host.request_redraw();
            event_loop.set_control_flow(ControlFlow::Wait);
        } else if timers_pending {
            event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + TIMER_TICK));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

/// Open the viewer window and run until it is closed.
///
/// # Errors
///
/// Returns [`RunError`] if the runtime or the event loop cannot start.
pub fn run(config: EarthConfig, options: ViewerOptions) -> Result<(), RunError> {
    let event_loop = EventLoop::new()?;
    let mut app = TerraApp::new(config, options)?;
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_key_actions() {
        assert_eq!(
            key_action(&Key::Character("2".into())),
            Some(KeyAction::JumpToSection(1))
        );
        assert_eq!(
            key_action(&Key::Character("M".into())),
            Some(KeyAction::MeteorShower)
        );
        assert_eq!(
            key_action(&Key::Named(NamedKey::Escape)),
            Some(KeyAction::Quit)
        );
        assert_eq!(key_action(&Key::Character("x".into())), None);
    }

    #[test]
    fn test_wheel_lines_scroll_down() {
        let dy = scroll_delta(MouseScrollDelta::LineDelta(0.0, -1.0), 1.0);
        assert_eq!(dy, LINE_HEIGHT);
        let dy = scroll_delta(
            MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 120.0)),
            2.0,
        );
        assert_eq!(dy, -60.0);
    }

    #[test]
    fn test_ndc_corners() {
        assert_eq!(to_ndc(Vec2::ZERO, 800.0, 600.0), Vec2::new(-1.0, 1.0));
        assert_eq!(to_ndc(Vec2::new(400.0, 300.0), 800.0, 600.0), Vec2::ZERO);
        assert_eq!(to_ndc(Vec2::new(800.0, 600.0), 800.0, 600.0), Vec2::new(1.0, -1.0));
    }

    #[test]
    fn test_host_without_window() {
        let host = WindowHost::new(&EarthConfig::default(), false);
        assert!(host.container(CONTAINER_ID).is_none());
        assert!(!host.supports_rendering());
        assert!(!host.container_visible(CONTAINER_ID, 0.0));
    }

    #[test]
    fn test_host_environment() {
        let config = EarthConfig::default();
        let host = WindowHost::new(&config, true);
        let env = host.environment();
        assert!(env.user_agent.ends_with(MOBILE_MARKER));
        assert_eq!(env.viewport_width, config.window.width as f32);
        assert!(env.hardware_concurrency.is_some_and(|n| n > 0));

        let desktop = WindowHost::new(&config, false).environment();
        assert!(!desktop.user_agent.contains(MOBILE_MARKER));
    }

    #[test]
    fn test_host_records_hidden_elements_and_errors() {
        let mut host = WindowHost::new(&EarthConfig::default(), false);
        assert!(host.loading_indicator().is_none());
        assert!(host.hide_element("threeEarthLoader"));
        assert_eq!(host.hidden_elements(), ["threeEarthLoader".to_string()]);

        let panel = ErrorPanel::for_error(&std::io::Error::other("lost"));
        host.show_error(CONTAINER_ID, &panel);
        assert_eq!(host.error_panel().map(|p| p.detail.as_str()), Some("lost"));
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(
            resolve_link(Some("https://example.org/"), "/about/").as_deref(),
            Some("https://example.org/about/")
        );
        assert_eq!(
            resolve_link(None, "https://example.org/blog/").as_deref(),
            Some("https://example.org/blog/")
        );
        assert_eq!(resolve_link(None, "/videos/"), None);
    }

    #[test]
    fn test_navigate_opens_resolved_link() {
        let opened = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&opened);
        let mut host = WindowHost::new(&EarthConfig::default(), false)
            .with_site_url(Some("https://example.org".to_string()))
            .with_link_opener(move |url| {
                sink.borrow_mut().push(url.to_string());
                Ok(())
            });
        host.navigate("/projekte/");
        assert_eq!(*opened.borrow(), ["https://example.org/projekte/".to_string()]);

        let sink = Rc::clone(&opened);
        let mut bare = WindowHost::new(&EarthConfig::default(), false).with_link_opener(move |url| {
            sink.borrow_mut().push(url.to_string());
            Ok(())
        });
        bare.navigate("/blog/");
        assert_eq!(opened.borrow().len(), 1, "relative link without a site URL");
    }

    #[test]
    fn test_host_frames_queue() {
        let mut host = WindowHost::new(&EarthConfig::default(), false);
        let token = host.frames().schedule();
        assert_eq!(host.frames.pop(), Some(token));
        assert!(host.frames.is_idle());
    }
}
