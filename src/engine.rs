use std::time::Instant;
use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::WindowBuilder,
};

use crate::config::AppConfig;
use crate::controls::{self, Command};
use crate::core::renderer::VulkanRenderer;
use crate::frame::{FrameContext, FrameLoop, RenderBackend};

/// Window, renderer and scene wired to the winit event loop
pub struct Engine {
    event_loop: EventLoop<()>,
    renderer: VulkanRenderer,
    context: FrameContext,
    title: String,
}

/// Frame rate bookkeeping for the window title
struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    /// Returns the average rate once at least half a second has passed
    fn frame(&mut self) -> Option<f32> {
        self.frames += 1;
        let elapsed = self.since.elapsed().as_secs_f32();
        if elapsed < 0.5 {
            return None;
        }
        let fps = self.frames as f32 / elapsed;
        self.frames = 0;
        self.since = Instant::now();
        Some(fps)
    }
}

impl Engine {
    /// Open the window and bring up the renderer. Fails when no graphics
    /// context can be created.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new()?;
        let window = WindowBuilder::new()
            .with_title(&config.window.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.window.width, config.window.height))
            .build(&event_loop)?;

        let renderer = VulkanRenderer::new(window, &config.render, &config.sphere)?;
        let context = FrameContext::new(config, renderer.viewport())?;

        Ok(Self {
            event_loop,
            renderer,
            context,
            title: config.window.title.clone(),
        })
    }

    pub fn run(self) -> anyhow::Result<()> {
        let Engine {
            event_loop,
            mut renderer,
            mut context,
            title,
        } = self;

        let mut frame_loop = FrameLoop::new();
        let start = Instant::now();
        let mut fps = FpsCounter { frames: 0, since: start };

        renderer
            .window()
            .set_title(&controls::window_title(&title, context.cameras.selection(), 0.0));

        event_loop.run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => {
                    tracing::info!("Window closed");
                    target.exit();
                }
                Event::WindowEvent {
                    event:
                        WindowEvent::KeyboardInput {
                            event:
                                KeyEvent {
                                    physical_key: PhysicalKey::Code(key_code),
                                    state: ElementState::Pressed,
                                    repeat: false,
                                    ..
                                },
                            ..
                        },
                    ..
                } => match controls::command_for_key(key_code) {
                    Some(Command::SelectCamera(selection)) => context.select_camera(selection),
                    Some(Command::Exit) => target.exit(),
                    None => {}
                },
                Event::WindowEvent {
                    event: WindowEvent::Resized(size),
                    ..
                } => {
                    tracing::debug!("Resized to {}x{}", size.width, size.height);
                    renderer.handle_resize();
                }
                Event::AboutToWait => {
                    renderer.window().request_redraw();
                }
                Event::WindowEvent {
                    event: WindowEvent::RedrawRequested,
                    ..
                } => {
                    let now = start.elapsed().as_secs_f64();
                    if let Err(e) = frame_loop.tick(&mut context, &mut renderer, now) {
                        tracing::error!("Frame {} failed: {:#}", frame_loop.frame_index(), e);
                        target.exit();
                        return;
                    }

                    if let Some(rate) = fps.frame() {
                        let selection = context.cameras.selection();
                        renderer
                            .window()
                            .set_title(&controls::window_title(&title, selection, rate));
                    }
                }
                _ => {}
            }
        })?;

        tracing::info!("Event loop finished");
        Ok(())
    }
}
