//! Folio: a scrolling portfolio page with a persistent adaptive 3D scene.
//!
//! winit drives the loop through `ApplicationHandler`; everything per frame
//! happens in `RedrawRequested`:
//!
//!   1. poll config hot reload, the character loader and the memory monitor
//!   2. measure `dt`, apply keys and scroll, update section / animation events
//!   3. feed the quality controller and resolve this frame's `RenderConfig`
//!   4. let the scene composer tick and draw the mounted section
//!   5. composite the egui overlay and present
//!
//! The capability tier is probed once before the window opens and never
//! again. A lost GPU context suspends drawing until R rebuilds it.

mod assets;
mod scenes;
mod scroll;

use std::path::PathBuf;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use assets::CharacterLoader;
use folio_core::composer::{FrameInput, FrameOutcome, SceneComposer};
use folio_core::config::{load_config, load_config_or_default, AppConfig, DEFAULT_CONFIG_PATH};
use folio_core::input::{InputState, Key};
use folio_core::memory::MemoryMonitor;
use folio_core::probe::Capabilities;
use folio_core::quality::QualityController;
use folio_core::section::SectionKey;
use folio_core::settings::{resolve, RenderConfig};
use folio_core::time::FrameClock;
use folio_core::visibility::{Rect, VisibilityHub};
use folio_core::watcher::FileWatcher;
use folio_devtools::{DebugOverlay, OverlayStats};
use folio_platform::SysinfoMemorySource;
use folio_render::{WgpuCapabilitySource, WgpuSurface};
use scenes::PortfolioScenes;
use scroll::ScrollTracker;

/// Pixels scrolled per wheel line and per arrow key press.
const LINE_SCROLL_PX: f32 = 60.0;

struct AppState {
    window: Arc<Window>,
    config_path: PathBuf,
    config: AppConfig,
    config_watcher: FileWatcher,
    capabilities: Capabilities,
    clock: FrameClock,
    quality: QualityController,
    render_config: RenderConfig,
    memory: MemoryMonitor,
    memory_source: SysinfoMemorySource,
    hub: VisibilityHub,
    composer: SceneComposer<WgpuSurface, PortfolioScenes>,
    loader: CharacterLoader,
    scroll: ScrollTracker,
    input: InputState,
    debug_overlay: DebugOverlay,
    overlay_generation: u32,
    last_outcome: FrameOutcome,
    last_request: Option<&'static str>,
    context_losses: u32,
    title_shows_loss: bool,
    minimized: bool,
    occluded: bool,
}

impl AppState {
    fn new(
        window: Arc<Window>,
        config_path: PathBuf,
        config: AppConfig,
        capabilities: Capabilities,
    ) -> Result<Self, String> {
        let size = window.inner_size();
        let (width, height) = (size.width as f32, size.height as f32);

        let mut quality = QualityController::new(config.quality);
        quality.start();
        let render_config = resolve(capabilities.tier, quality.current_quality());

        let surface = WgpuSurface::new(window.clone(), render_config.msaa_samples)?;
        let gpu = surface
            .gpu()
            .ok_or_else(|| "GPU context missing right after creation".to_string())?;
        let debug_overlay = DebugOverlay::new(&gpu.device, gpu.surface_format, &window);

        let mut scroll = ScrollTracker::new(width, height, config.animation.scroll_idle_secs);
        scroll.jump_to(config.initial_section);
        let hub = VisibilityHub::new(config.visibility, scroll.viewport());

        let loader = CharacterLoader::spawn(config.character_path.clone());
        let scenes = PortfolioScenes::new(loader.shared(), config.animation.crossfade_us());
        let mut composer = SceneComposer::new(
            surface,
            scenes,
            hub.clone(),
            scroll.viewport(),
            config.initial_section,
        );
        for &section in SectionKey::ALL {
            composer.set_section_rect(section, scroll.section_rect(section));
        }

        let mut input = InputState::new();
        input.set_window_size(width, height);

        Ok(Self {
            config_watcher: FileWatcher::new(config_path.clone()),
            config_path,
            render_config,
            memory: MemoryMonitor::new(config.memory_interval_secs),
            memory_source: SysinfoMemorySource::new(),
            capabilities,
            clock: FrameClock::new(),
            quality,
            hub,
            composer,
            loader,
            scroll,
            input,
            debug_overlay,
            overlay_generation: 0,
            last_outcome: FrameOutcome::Hidden,
            last_request: None,
            context_losses: 0,
            title_shows_loss: false,
            minimized: size.width == 0 || size.height == 0,
            occluded: false,
            config,
            window,
        })
    }

    fn reload_config(&mut self, reason: &str) {
        match load_config(&self.config_path) {
            Ok(config) => {
                self.quality.set_settings(config.quality);
                self.hub.set_options(config.visibility);
                self.scroll.set_idle_secs(config.animation.scroll_idle_secs);
                self.memory.set_interval(config.memory_interval_secs);
                self.composer
                    .factory_mut()
                    .set_crossfade_us(config.animation.crossfade_us());
                log::info!("Config reloaded ({reason}) from {}", self.config_path.display());
                self.config = config;
            }
            Err(e) => {
                log::error!("Config reload failed ({reason}), keeping previous settings: {e}");
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.minimized = width == 0 || height == 0;
        if self.minimized {
            return;
        }
        self.composer.surface_mut().resize(width, height);
        self.scroll.resize(width as f32, height as f32);
        self.input.set_window_size(width as f32, height as f32);
        for &section in SectionKey::ALL {
            self.composer
                .set_section_rect(section, self.scroll.section_rect(section));
        }
        log::info!("Resized to {}x{}", width, height);
    }

    /// Point the hub and the surface container at the current scroll position.
    /// A minimised or occluded window has no viewport at all.
    fn sync_viewport(&mut self) {
        let viewport = self.scroll.viewport();
        let observed = if self.minimized || self.occluded {
            Rect::EMPTY
        } else {
            viewport
        };
        self.hub.set_viewport(observed);
        self.composer.set_surface_rect(viewport);
    }

    fn request_animation(&mut self, name: &'static str) {
        self.composer.request_animation(name);
        self.last_request = Some(name);
    }

    fn handle_keys(&mut self, event_loop: &ActiveEventLoop) -> bool {
        if self.input.is_just_pressed(Key::Escape) {
            log::info!("Escape pressed, exiting.");
            event_loop.exit();
            return false;
        }
        if self.input.is_just_pressed(Key::F3) {
            self.debug_overlay.toggle();
        }
        if self.input.is_just_pressed(Key::R) {
            self.retry();
        }

        let page = self.scroll.viewport().height;
        if let Some(digit) = self.input.just_pressed_digit() {
            if (1..=SectionKey::ALL.len() as u8).contains(&digit) {
                self.scroll
                    .scroll_to(SectionKey::from_index(digit as usize - 1));
            }
        }
        if self.input.is_just_pressed(Key::PageDown) {
            self.scroll.scroll_by(page);
        }
        if self.input.is_just_pressed(Key::PageUp) {
            self.scroll.scroll_by(-page);
        }
        if self.input.is_just_pressed(Key::Home) {
            self.scroll.scroll_to(SectionKey::Hero);
        }
        if self.input.is_just_pressed(Key::End) {
            self.scroll.scroll_to(SectionKey::Contact);
        }
        if self.input.is_just_pressed(Key::Down) {
            self.scroll.scroll_by(LINE_SCROLL_PX);
        }
        if self.input.is_just_pressed(Key::Up) {
            self.scroll.scroll_by(-LINE_SCROLL_PX);
        }
        true
    }

    fn retry(&mut self) {
        if !self.composer.has_recoverable_error() {
            return;
        }
        match self.composer.retry() {
            Ok(()) => self.sync_overlay_device(),
            Err(e) => log::error!("Retry failed, still suspended: {e}"),
        }
    }

    /// The overlay's GPU objects belong to a device; rebuild them after a restore.
    fn sync_overlay_device(&mut self) {
        let surface = self.composer.surface();
        if surface.generation() == self.overlay_generation {
            return;
        }
        if let Some(gpu) = surface.gpu() {
            self.debug_overlay
                .recreate(&gpu.device, gpu.surface_format, &self.window);
            self.overlay_generation = surface.generation();
        }
    }

    fn update_title(&mut self) {
        let lost = self.composer.has_recoverable_error();
        if lost == self.title_shows_loss {
            return;
        }
        self.title_shows_loss = lost;
        if lost {
            self.context_losses += 1;
            self.window
                .set_title(&folio_platform::lost_title(&self.config.window.title));
        } else {
            self.window.set_title(&self.config.window.title);
        }
    }

    fn update_quality(&mut self, frame_dt: Option<f64>) {
        let active = self.composer.is_surface_visible() && !self.composer.has_recoverable_error();
        if active != self.quality.is_running() {
            if active {
                self.quality.start();
            } else {
                self.quality.stop();
            }
            // Time spent inactive is not a frame time.
            self.clock.reset();
        } else if let Some(dt) = frame_dt {
            if let Some(change) = self.quality.sample(dt) {
                log::info!(
                    "Quality {:.2} -> {:.2} at {:.1} fps",
                    change.from,
                    change.to,
                    change.fps
                );
            }
        }
        self.render_config = resolve(self.capabilities.tier, self.quality.current_quality());
    }

    fn overlay_stats(&self) -> OverlayStats {
        let instances = match self.last_outcome {
            FrameOutcome::Drawn { instances } => instances,
            _ => 0,
        };
        OverlayStats {
            fps: self.quality.current_fps(),
            quality: self.quality.current_quality(),
            quality_running: self.quality.is_running(),
            tier_label: self.capabilities.tier.label().to_string(),
            renderer: self
                .capabilities
                .signals
                .renderer
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            config: self.render_config,
            section: Some(self.composer.active_section()),
            mounted_scene: self.composer.mounted_scene_name().map(str::to_string),
            surface_visible: self.composer.is_surface_visible(),
            scene_visible: self.composer.is_scene_visible(),
            instances,
            last_request: self.last_request.map(str::to_string),
            context_losses: self.context_losses,
            msaa_samples: self.composer.surface().sample_count(),
            scroll_offset: self.scroll.offset(),
            character_loading: self.loader.is_pending(),
            memory: self.memory.latest(),
            peak_process_bytes: self.memory.peak_process_bytes(),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self.config_watcher.should_reload() {
            self.reload_config("file watcher");
        }
        self.loader.poll();

        let frame_dt = self.clock.begin_frame();
        let dt = frame_dt.unwrap_or(0.0);
        self.memory.tick(dt, &mut self.memory_source);

        if !self.handle_keys(event_loop) {
            return;
        }

        self.scroll.scroll_by(self.input.take_scroll());
        let events = self.scroll.update(dt);
        if let Some(section) = events.section_changed {
            log::debug!("Section -> {section}");
            self.composer.set_active_section(section);
        }
        if let Some(animation) = events.animation {
            self.request_animation(animation.request_name());
        }
        self.composer
            .factory_mut()
            .set_scroll_progress(self.scroll.progress());
        self.sync_viewport();

        if let Some(reason) = self.composer.surface().lost_reason() {
            self.composer.notify_context_lost(&reason);
        }

        self.update_quality(frame_dt);

        self.last_outcome = self.composer.frame(FrameInput {
            dt,
            config: self.render_config,
            pointer: self.input.pointer_normalized(),
        });
        self.update_title();

        if matches!(self.last_outcome, FrameOutcome::Drawn { .. }) {
            self.present_with_overlay();
        }

        self.input.end_frame();
    }

    fn present_with_overlay(&mut self) {
        self.sync_overlay_device();
        let stats = self.overlay_stats();
        let (primitives, textures_delta, actions) =
            self.debug_overlay.prepare(&self.window, &stats);

        let (width, height) = self.composer.surface().size();
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        let overlay = &mut self.debug_overlay;
        self.composer
            .surface_mut()
            .finish_frame(|gpu, encoder, view| {
                overlay.upload(
                    &gpu.device,
                    &gpu.queue,
                    encoder,
                    &primitives,
                    &textures_delta,
                    &screen_descriptor,
                );
                let mut egui_pass = encoder
                    .begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("egui Render Pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        ..Default::default()
                    })
                    .forget_lifetime();
                overlay.paint(&mut egui_pass, &primitives, &screen_descriptor);
            });
        self.debug_overlay.cleanup(&textures_delta);

        if actions.next_section {
            let next = SectionKey::from_index(self.scroll.active_section().index() + 1);
            self.scroll.scroll_to(next);
        }
        if actions.simulate_loss {
            self.composer
                .notify_context_lost("simulated from the debug overlay");
        }
    }
}

struct App {
    config_path: PathBuf,
    config: AppConfig,
    capabilities: Capabilities,
    state: Option<AppState>,
}

impl App {
    fn new(config_path: PathBuf, config: AppConfig, capabilities: Capabilities) -> Self {
        Self {
            config_path,
            config,
            capabilities,
            state: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let created = folio_platform::create_window(event_loop, &self.config.window).and_then(|window| {
            AppState::new(
                window,
                self.config_path.clone(),
                self.config.clone(),
                self.capabilities.clone(),
            )
        });
        match created {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                log::error!("Startup failed: {e}");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let state = match self.state.as_mut() {
            Some(s) => s,
            None => return,
        };

        let egui_consumed = state
            .debug_overlay
            .handle_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting.");
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                state.resize(physical_size.width, physical_size.height);
            }

            WindowEvent::Occluded(occluded) => {
                state.occluded = occluded;
                log::debug!("Window occluded: {occluded}");
            }

            WindowEvent::KeyboardInput { event, .. } if !egui_consumed => {
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    if let Some(key) = map_key(key_code) {
                        match event.state {
                            ElementState::Pressed => state.input.key_down(key),
                            ElementState::Released => state.input.key_up(key),
                        }
                    }
                }
            }

            WindowEvent::MouseWheel { delta, .. } if !egui_consumed => {
                state.input.add_scroll(wheel_pixels(delta));
            }

            WindowEvent::CursorMoved { position, .. } => {
                state
                    .input
                    .pointer_moved(position.x as f32, position.y as f32);
            }

            WindowEvent::CursorLeft { .. } => state.input.pointer_left(),

            WindowEvent::RedrawRequested => state.redraw(event_loop),

            _ => {}
        }
    }
}

/// Wheel delta in page pixels; positive scrolls down.
fn wheel_pixels(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, lines) => -lines * LINE_SCROLL_PX,
        MouseScrollDelta::PixelDelta(position) => -position.y as f32,
    }
}

fn map_key(key_code: KeyCode) -> Option<Key> {
    match key_code {
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::ArrowUp => Some(Key::Up),
        KeyCode::ArrowDown => Some(Key::Down),
        KeyCode::PageUp => Some(Key::PageUp),
        KeyCode::PageDown | KeyCode::Space => Some(Key::PageDown),
        KeyCode::Home => Some(Key::Home),
        KeyCode::End => Some(Key::End),
        KeyCode::F3 => Some(Key::F3),
        KeyCode::KeyR => Some(Key::R),
        KeyCode::Digit1 => Some(Key::Digit(1)),
        KeyCode::Digit2 => Some(Key::Digit(2)),
        KeyCode::Digit3 => Some(Key::Digit(3)),
        KeyCode::Digit4 => Some(Key::Digit(4)),
        KeyCode::Digit5 => Some(Key::Digit(5)),
        _ => None,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Folio starting...");

    let config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let config = match load_config_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    let capabilities = Capabilities::detect(&WgpuCapabilitySource);

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config_path, config, capabilities);
    event_loop.run_app(&mut app).expect("Event loop error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn wheel_up_scrolls_towards_top() {
        assert_eq!(wheel_pixels(MouseScrollDelta::LineDelta(0.0, 1.0)), -LINE_SCROLL_PX);
        assert_eq!(
            wheel_pixels(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -30.0))),
            30.0
        );
    }

    #[test]
    fn digit_keys_map_to_sections() {
        assert_eq!(map_key(KeyCode::Digit3), Some(Key::Digit(3)));
        assert_eq!(map_key(KeyCode::Digit9), None);
        assert_eq!(map_key(KeyCode::Space), Some(Key::PageDown));
    }
}
