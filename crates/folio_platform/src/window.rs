use std::sync::Arc;

use folio_core::config::WindowConfig;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

/// Smallest size the page layout still makes sense at.
pub const MIN_WINDOW_SIZE: (u32, u32) = (480, 320);

pub fn create_window(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Arc<Window>, String> {
    let attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height))
        .with_min_inner_size(winit::dpi::LogicalSize::new(
            MIN_WINDOW_SIZE.0,
            MIN_WINDOW_SIZE.1,
        ));

    let window = event_loop
        .create_window(attrs)
        .map_err(|e| format!("Failed to create window '{}': {e}", config.title))?;
    log::info!(
        "Window '{}' created at {}x{} (scale factor {:.2})",
        config.title,
        config.width,
        config.height,
        window.scale_factor()
    );
    Ok(Arc::new(window))
}

/// Title shown while rendering is suspended after a context loss.
pub fn lost_title(base: &str) -> String {
    format!("{base} (rendering lost, press R to retry)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_title_keeps_base_title() {
        let title = lost_title("Folio");
        assert!(title.starts_with("Folio"));
        assert!(title.contains("press R"));
    }
}
