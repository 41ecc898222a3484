//! egui debug overlay composited over the 3D scene.
//!
//! `egui_wgpu::Renderer::render()` wants a `RenderPass<'static>` while the
//! encoder is borrowed by `begin_render_pass`, so one frame runs in four
//! phases:
//!
//!   1. `prepare()` runs the UI and tessellates
//!   2. `upload()` pushes textures and buffers (mutably borrows the encoder)
//!   3. `paint()` draws into a pass made with `forget_lifetime()`
//!   4. `cleanup()` frees textures egui dropped
//!
//! Window events always reach egui; the panel itself only shows while
//! toggled on with F3. Nothing is painted while rendering is suspended, so
//! recovery from a lost context is bound to a key rather than a button.

use folio_core::memory::MemoryReport;
use folio_core::section::SectionKey;
use folio_core::settings::RenderConfig;
use winit::window::Window;

#[derive(Debug, Clone, Default)]
pub struct OverlayStats {
    pub fps: f64,
    pub quality: f32,
    pub quality_running: bool,
    /// Detected performance tier label (e.g. "medium")
    pub tier_label: String,
    pub renderer: String,
    pub config: RenderConfig,
    pub section: Option<SectionKey>,
    pub mounted_scene: Option<String>,
    pub surface_visible: bool,
    pub scene_visible: bool,
    pub instances: usize,
    /// Last abstract animation name sent to the scene
    pub last_request: Option<String>,
    pub context_losses: u32,
    /// 0 while the rendering context is torn down
    pub msaa_samples: u32,
    pub scroll_offset: f32,
    pub character_loading: bool,
    pub memory: Option<MemoryReport>,
    pub peak_process_bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayActions {
    /// User clicked "Simulate loss" to exercise the restore path
    pub simulate_loss: bool,
    /// User clicked "Next section"
    pub next_section: bool,
}

pub struct DebugOverlay {
    pub egui_ctx: egui::Context,
    pub egui_winit_state: egui_winit::State,
    pub egui_renderer: egui_wgpu::Renderer,
    pub visible: bool,
}

fn new_renderer(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> egui_wgpu::Renderer {
    egui_wgpu::Renderer::new(device, surface_format, None, 1, false)
}

impl DebugOverlay {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, window: &Window) -> Self {
        let egui_ctx = egui::Context::default();
        let egui_winit_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            window,
            None,
            None,
            None,
        );

        Self {
            egui_ctx,
            egui_winit_state,
            egui_renderer: new_renderer(device, surface_format),
            visible: false,
        }
    }

    /// Rebuild GPU state against a restored device. A fresh egui context
    /// re-sends the font atlas on its next frame.
    pub fn recreate(&mut self, device: &wgpu::Device, surface_format: wgpu::TextureFormat, window: &Window) {
        let visible = self.visible;
        *self = Self::new(device, surface_format, window);
        self.visible = visible;
        log::info!("Debug overlay renderer recreated");
    }

    pub fn handle_window_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.egui_winit_state.on_window_event(window, event).consumed
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        log::info!("Debug overlay: {}", if self.visible { "ON" } else { "OFF" });
    }

    pub fn prepare(
        &mut self,
        window: &Window,
        stats: &OverlayStats,
    ) -> (Vec<egui::ClippedPrimitive>, egui::TexturesDelta, OverlayActions) {
        let mut actions = OverlayActions::default();
        let raw_input = self.egui_winit_state.take_egui_input(window);
        let visible = self.visible;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if !visible {
                return;
            }
            egui::Window::new("Debug")
                .default_pos([10.0, 10.0])
                .show(ctx, |ui| {
                    ui.label(format!("FPS: {:.1}", stats.fps));
                    ui.label(format!(
                        "Quality: {:.2}{}",
                        stats.quality,
                        if stats.quality_running { "" } else { " (paused)" }
                    ));
                    ui.label(format!("Tier: {}", stats.tier_label));
                    ui.label(format!("Adapter: {}", stats.renderer));

                    ui.separator();
                    let config = &stats.config;
                    ui.label(format!("Particles: {}", config.particle_count));
                    ui.label(format!(
                        "Shadows: {}",
                        if config.enable_shadows {
                            format!("{} px", config.shadow_resolution)
                        } else {
                            "off".to_string()
                        }
                    ));
                    ui.label(format!("Animation speed: {:.2}", config.animation_speed));
                    ui.label(format!("Draw distance: {:.0}", config.draw_distance));
                    ui.label(format!("MSAA: {}x", stats.msaa_samples));

                    ui.separator();
                    ui.horizontal(|ui| {
                        let section = stats.section.map(|s| s.label()).unwrap_or("-");
                        ui.label(format!("Section: {section}"));
                        if ui.button("Next").clicked() {
                            actions.next_section = true;
                        }
                    });
                    ui.label(format!("Scroll: {:.0} px", stats.scroll_offset));
                    ui.label(format!(
                        "Scene: {}{}",
                        stats.mounted_scene.as_deref().unwrap_or("none"),
                        if stats.character_loading { " (character loading)" } else { "" }
                    ));
                    ui.label(format!(
                        "Visible: surface {} / scene {}",
                        yes_no(stats.surface_visible),
                        yes_no(stats.scene_visible)
                    ));
                    ui.label(format!("Instances: {}", stats.instances));
                    if let Some(name) = &stats.last_request {
                        ui.label(format!("Animation request: {name}"));
                    }

                    ui.separator();
                    ui.label(memory_label(stats.memory.as_ref(), stats.peak_process_bytes));

                    ui.separator();
                    ui.horizontal(|ui| {
                        ui.label(format!("Context losses: {}", stats.context_losses));
                        if ui.button("Simulate loss").clicked() {
                            actions.simulate_loss = true;
                        }
                    });
                });
        });

        self.egui_winit_state
            .handle_platform_output(window, full_output.platform_output);

        let primitives = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        (primitives, full_output.textures_delta, actions)
    }

    /// Upload textures and update buffers. Call before creating the egui render pass.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        primitives: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        for (id, image_delta) in &textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }
        self.egui_renderer
            .update_buffers(device, queue, encoder, primitives, screen_descriptor);
    }

    pub fn paint(
        &self,
        render_pass: &mut wgpu::RenderPass<'static>,
        primitives: &[egui::ClippedPrimitive],
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        self.egui_renderer
            .render(render_pass, primitives, screen_descriptor);
    }

    pub fn cleanup(&mut self, textures_delta: &egui::TexturesDelta) {
        for id in &textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn memory_label(memory: Option<&MemoryReport>, peak_process_bytes: u64) -> String {
    let Some(report) = memory else {
        return "Memory: n/a".to_string();
    };
    let process = match report.process_mib() {
        Some(mib) => format!("{mib} MiB (peak {} MiB)", peak_process_bytes / (1024 * 1024)),
        None => "n/a".to_string(),
    };
    format!(
        "Memory: process {process}, system {}/{} MiB",
        report.used_mib(),
        report.total_mib()
    )
}
