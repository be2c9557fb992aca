mod atlas;
mod config;
mod error;
mod geometry;
mod glyph;
mod render;
mod renderer;
mod shader;
mod text;
mod texture;

use std::process::ExitCode;

use config::Config;
use error::FrameError;
use log::{ debug, error, warn };
use render::State;
use renderer::GlyphAtlasRenderer;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ ActiveEventLoop, ControlFlow, EventLoop };
use winit::window::{ Window, WindowId };

const SAMPLE_TEXT: &str = "Hello, World!\nASCII glyph atlas";

struct StateApplication {
    config: Config,
    text: String,
    state: Option<State>,
    renderer: Option<GlyphAtlasRenderer>,
    failed: bool,
}

impl StateApplication {
    pub fn new(config: Config, text: String) -> Self {
        Self {
            config,
            text,
            state: None,
            renderer: None,
            failed: false,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = event_loop.create_window(Window::default_attributes().with_title("glyphquad"))?;
        let state = State::new(window)?;
        let renderer = GlyphAtlasRenderer::new(
            state.device(),
            state.queue(),
            state.format(),
            self.config.clone()
        )?;

        // reject unsupported characters before the first frame
        let width = renderer.text_width(&self.text)?;
        let height = renderer.text_height(&self.text)?;
        debug!("text measures {} x {} glyph units", width, height);

        state.window().request_redraw();
        self.renderer = Some(renderer);
        self.state = Some(state);
        Ok(())
    }
}

impl ApplicationHandler for StateApplication {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            error!("{:#}", err);
            self.failed = true;
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent
    ) {
        let (Some(state), Some(renderer)) = (self.state.as_mut(), self.renderer.as_mut()) else {
            return;
        };
        if state.window().id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                state.resize(physical_size);
                state.window().request_redraw();
            }
            WindowEvent::RedrawRequested => {
                match state.render(renderer, &self.text) {
                    Ok(_) => {}
                    Err(FrameError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                        state.reconfigure();
                        state.window().request_redraw();
                    }
                    Err(FrameError::Surface(wgpu::SurfaceError::Timeout)) => {
                        warn!("surface timed out, skipping frame");
                    }
                    Err(err) => {
                        error!("{}", err);
                        self.failed = true;
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }
}

/// Text to display: the command line arguments, with `\n` as a line break.
fn text_from_args() -> String {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        SAMPLE_TEXT.to_string()
    } else {
        args.join(" ").replace("\\n", "\n")
    }
}

fn run() -> anyhow::Result<bool> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = StateApplication::new(Config::from_env(), text_from_args());
    event_loop.run_app(&mut app)?;

    // drop GPU resources before the surface's window goes away
    app.renderer = None;
    app.state = None;
    Ok(!app.failed)
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
