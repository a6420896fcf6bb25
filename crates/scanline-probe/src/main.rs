//! Drives `scanline-hw` with a small animated scene.
//!
//! ```text
//! scanline-probe [--headless] [--null] [--scale N] [--frames N]
//! ```
//!
//! Windowed mode presents the display area every frame. Headless mode renders
//! offscreen, reads the display area back and prints a checksum plus statistics.

mod scene;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use scanline_hw::logging::{LoggingConfig, init_logging};
use scanline_hw::{BackendKind, HwRenderer, RendererSettings, SurfaceDesc};

#[derive(Debug, Clone)]
struct Options {
    headless: bool,
    settings: RendererSettings,
    frames: u32,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            headless: false,
            settings: RendererSettings::default(),
            frames: 60,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => options.headless = true,
                "--null" => options.settings.backend = BackendKind::Null,
                "--debug" => options.settings.debug_device = true,
                "--true-color" => options.settings.true_color = true,
                "--scale" => {
                    let value = args.next().context("--scale needs a value")?;
                    options.settings.resolution_scale =
                        value.parse().with_context(|| format!("invalid scale {value:?}"))?;
                }
                "--frames" => {
                    let value = args.next().context("--frames needs a value")?;
                    options.frames = value.parse().with_context(|| format!("invalid frame count {value:?}"))?;
                }
                other => bail!("unknown argument {other:?}"),
            }
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let options = Options::parse(std::env::args().skip(1))?;

    if options.headless {
        run_headless(&options)
    } else {
        run_windowed(options)
    }
}

// ── headless ─────────────────────────────────────────────────────────────

fn run_headless(options: &Options) -> Result<()> {
    let mut renderer = HwRenderer::with_surface(SurfaceDesc::headless(), options.settings);
    info!("headless run on {} backend", renderer.backend().kind());

    scene::upload(&mut renderer)?;
    for frame in 0..options.frames {
        scene::draw(&mut renderer, frame)?;
        renderer.end_frame(None)?;
    }

    let pixels = renderer.read(0, 0, scene::DISPLAY_WIDTH, scene::DISPLAY_HEIGHT)?;
    let stats = renderer.last_frame_stats();
    println!("frames:                {}", options.frames);
    println!("display checksum:      {:016x}", scene::checksum(&pixels));
    println!("batches:               {}", stats.num_batches);
    println!("read-texture updates:  {}", stats.num_vram_read_texture_updates);
    println!("uniform updates:       {}", stats.num_uniform_buffer_updates);
    Ok(())
}

// ── windowed ─────────────────────────────────────────────────────────────

fn run_windowed(options: Options) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ProbeApp { options, window: None, renderer: None, frame: 0 };
    event_loop
        .run_app(&mut app)
        .context("winit event loop terminated with error")?;
    Ok(())
}

struct ProbeApp {
    options: Options,
    window: Option<Arc<Window>>,
    renderer: Option<HwRenderer>,
    frame: u32,
}

impl ProbeApp {
    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("scanline probe")
            .with_inner_size(LogicalSize::new(
                f64::from(scene::DISPLAY_WIDTH * 2),
                f64::from(scene::DISPLAY_HEIGHT * 2),
            ));
        let window = Arc::new(event_loop.create_window(attrs).context("failed to create window")?);

        let mut renderer = HwRenderer::with_surface(SurfaceDesc::from(window.clone()), self.options.settings);
        scene::upload(&mut renderer)?;

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else { return Ok(()) };
        scene::draw(renderer, self.frame)?;
        renderer.end_frame(Some(&scene::display_area()))?;
        self.frame = self.frame.wrapping_add(1);

        if self.frame % 60 == 0 {
            let stats = renderer.last_frame_stats();
            log::debug!(
                "frame {}: {} batches, {} read-texture updates",
                self.frame,
                stats.num_batches,
                stats.num_vram_read_texture_updates
            );
        }
        Ok(())
    }
}

impl ApplicationHandler for ProbeApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            error!("failed to start: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize_surface(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    error!("frame failed: {e:#}");
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options> {
        Options::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags() {
        let options = parse(&["--headless", "--null", "--scale", "3", "--frames", "2"]).unwrap();
        assert!(options.headless);
        assert_eq!(options.settings.backend, BackendKind::Null);
        assert_eq!(options.settings.resolution_scale, 3);
        assert_eq!(options.frames, 2);
    }

    #[test]
    fn rejects_unknown_and_incomplete_arguments() {
        assert!(parse(&["--fast"]).is_err());
        assert!(parse(&["--scale"]).is_err());
        assert!(parse(&["--frames", "many"]).is_err());
    }

    #[test]
    fn headless_null_scene_runs() {
        scanline_hw::logging::init_test_logging();
        let settings = RendererSettings { backend: BackendKind::Null, ..Default::default() };
        let mut renderer = HwRenderer::with_surface(SurfaceDesc::headless(), settings);
        scene::upload(&mut renderer).unwrap();
        scene::draw(&mut renderer, 0).unwrap();
        renderer.end_frame(None).unwrap();

        assert!(renderer.last_frame_stats().num_batches >= 3);
        // The texture sits outside the display area and survives the fill.
        let texel = renderer.read(320, 0, 1, 1).unwrap();
        assert_eq!(texel, vec![0x7FFF]);
    }
}
