//! The session's one rendering surface, as seen by the scene composer.
//!
//! `draw` records the scene into the acquired swapchain image but does not
//! present it; the app then calls `finish_frame` so the debug overlay can be
//! painted on top before submission. A lost device is reported as
//! `SurfaceError::ContextLost`, and `restore` rebuilds every GPU object
//! against the same window, so the surface handle never changes.
//!
//! Antialiased tiers draw into a multisampled colour target that resolves
//! into the swapchain image; the overlay then paints onto the resolved image.

use std::sync::Arc;

use folio_core::composer::{FrameDraw, RenderSurface, SurfaceError, SurfaceHandle};
use folio_core::section::SectionKey;
use winit::window::Window;

use crate::camera::PerspectiveCamera;
use crate::gpu_context::{create_depth_view, create_msaa_view, FrameError, GpuContext};
use crate::pipeline::SceneRenderer;

struct Backend {
    gpu: GpuContext,
    renderer: SceneRenderer,
    depth_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
}

impl Backend {
    fn new(window: Arc<Window>, requested_samples: u32) -> Result<Self, String> {
        let gpu = GpuContext::new(window)?;
        let samples = gpu.sample_count(requested_samples);
        if samples != requested_samples {
            log::warn!(
                "{}x MSAA not supported for {:?}, using {}x",
                requested_samples,
                gpu.surface_format,
                samples
            );
        }
        let renderer = SceneRenderer::new(&gpu.device, gpu.surface_format, samples);
        let (depth_view, msaa_view) = render_targets(&gpu, samples);
        Ok(Self {
            gpu,
            renderer,
            depth_view,
            msaa_view,
        })
    }

    fn rebuild_targets(&mut self) {
        let (depth_view, msaa_view) = render_targets(&self.gpu, self.renderer.sample_count());
        self.depth_view = depth_view;
        self.msaa_view = msaa_view;
    }
}

fn render_targets(gpu: &GpuContext, samples: u32) -> (wgpu::TextureView, Option<wgpu::TextureView>) {
    let (width, height) = (gpu.config.width, gpu.config.height);
    (
        create_depth_view(&gpu.device, width, height, samples),
        create_msaa_view(&gpu.device, gpu.surface_format, width, height, samples),
    )
}

struct InFlightFrame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

pub struct WgpuSurface {
    window: Arc<Window>,
    handle: SurfaceHandle,
    backend: Option<Backend>,
    camera: PerspectiveCamera,
    in_flight: Option<InFlightFrame>,
    generation: u32,
    requested_samples: u32,
}

impl WgpuSurface {
    /// `msaa_samples` comes from the tier's `RenderConfig` and is kept for restores.
    pub fn new(window: Arc<Window>, msaa_samples: u32) -> Result<Self, String> {
        let size = window.inner_size();
        let backend = Backend::new(window.clone(), msaa_samples)?;
        Ok(Self {
            handle: SurfaceHandle(u64::from(window.id())),
            window,
            backend: Some(backend),
            camera: PerspectiveCamera::new(size.width, size.height),
            in_flight: None,
            generation: 0,
            requested_samples: msaa_samples,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// `None` while the context is torn down.
    pub fn gpu(&self) -> Option<&GpuContext> {
        self.backend.as_ref().map(|b| &b.gpu)
    }

    /// Bumped on every successful restore. GPU objects owned elsewhere
    /// (the overlay renderer) must be rebuilt when it changes.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn size(&self) -> (u32, u32) {
        self.camera.viewport
    }

    /// Sample count actually in use; 0 while the context is torn down.
    pub fn sample_count(&self) -> u32 {
        self.backend
            .as_ref()
            .map_or(0, |b| b.renderer.sample_count())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.camera.viewport = (width, height);
        if let Some(backend) = self.backend.as_mut() {
            backend.gpu.resize(width, height);
            backend.rebuild_targets();
        }
    }

    /// Polled every frame so a loss is noticed even when nothing draws.
    pub fn lost_reason(&self) -> Option<String> {
        match &self.backend {
            Some(backend) => backend.gpu.lost_reason(),
            None => Some("rendering context released".to_string()),
        }
    }

    /// Composite anything extra onto the recorded frame, then submit and present.
    /// Does nothing if `draw` did not record a frame.
    pub fn finish_frame(
        &mut self,
        overlay: impl FnOnce(&GpuContext, &mut wgpu::CommandEncoder, &wgpu::TextureView),
    ) {
        let Some(mut frame) = self.in_flight.take() else {
            return;
        };
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        overlay(&backend.gpu, &mut frame.encoder, &frame.view);
        backend
            .gpu
            .queue
            .submit(std::iter::once(frame.encoder.finish()));
        self.window.pre_present_notify();
        frame.output.present();
    }
}

fn clear_color(section: SectionKey) -> wgpu::Color {
    let tint = section.index() as f64 * 0.006;
    wgpu::Color {
        r: 0.02 + tint,
        g: 0.03,
        b: 0.05 + tint,
        a: 1.0,
    }
}

impl RenderSurface for WgpuSurface {
    fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    fn draw(&mut self, frame: &FrameDraw<'_>) -> Result<(), SurfaceError> {
        // A frame recorded but never finished is dropped unpresented.
        self.in_flight = None;
        let Some(backend) = self.backend.as_mut() else {
            return Err(SurfaceError::ContextLost(
                "rendering context released".to_string(),
            ));
        };
        let (output, view) = backend.gpu.begin_frame().map_err(|e| match e {
            FrameError::Lost(reason) => SurfaceError::ContextLost(reason),
            FrameError::Retry(reason) => SurfaceError::Other(reason),
        })?;

        self.camera.far = frame.config.draw_distance;
        backend.renderer.prepare(
            &backend.gpu.device,
            &backend.gpu.queue,
            &self.camera,
            frame.lighting,
            frame.draws,
            frame.config,
        );

        let mut encoder = backend
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        backend.renderer.render_shadows(&mut encoder, frame.config);
        let (target, resolve_target) = match &backend.msaa_view {
            Some(msaa_view) => (msaa_view, Some(&view)),
            None => (&view, None),
        };
        backend.renderer.render_main(
            &mut encoder,
            target,
            resolve_target,
            &backend.depth_view,
            clear_color(frame.section),
        );

        self.in_flight = Some(InFlightFrame {
            output,
            view,
            encoder,
        });
        Ok(())
    }

    fn restore(&mut self) -> Result<(), String> {
        self.in_flight = None;
        // The old surface must be gone before the window gets a new one.
        self.backend = None;
        let backend = Backend::new(self.window.clone(), self.requested_samples)?;
        let size = self.window.inner_size();
        self.camera.viewport = (size.width, size.height);
        self.backend = Some(backend);
        self.generation += 1;
        log::info!(
            "Rendering context restored (generation {}) on surface {:?}",
            self.generation,
            self.handle
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_colour_stays_dark_for_every_section() {
        for &section in SectionKey::ALL {
            let c = clear_color(section);
            assert!(c.r < 0.1 && c.g < 0.1 && c.b < 0.1);
            assert_eq!(c.a, 1.0);
        }
    }
}
