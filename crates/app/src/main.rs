//! meshview: a textured model inside a skybox, seen through a first-person camera.
//!
//! `G` toggles mouse look, `F` toggles fullscreen, `WASD` moves the camera
//! and the left and right mouse buttons grow and shrink the model.
//!
//! # Running from a fresh checkout
//!
//! The SPIR-V shaders and the scene assets are not checked in:
//!
//! 1. `shaders/compile.sh` compiles the GLSL sources into `shaders/spirv`
//!    (needs `glslc` from the Vulkan SDK).
//! 2. Put two textures and two OBJ meshes at the `[assets]` paths of
//!    `meshview.toml`: `assets/textures/brick.png`, `assets/textures/sky.jpg`,
//!    `assets/meshes/suzanne.obj` and `assets/meshes/sphere.obj`. Set
//!    `use_builtin_cube = true` to draw the built-in cube instead of the model.
//! 3. Run `cargo run --release` from the workspace root, or point
//!    `MESHVIEW_CONFIG` at another TOML file.
//!
//! A missing file stops startup with the path that could not be found.

mod app_window;

use anyhow::{Context, Result};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use meshview_core::AppConfig;
use meshview_platform::{InputState, MouseButton, Window};

use crate::app_window::AppWindow;

struct App {
    config: AppConfig,
    scene: Option<AppWindow>,
}

impl App {
    fn open(&self, event_loop: &ActiveEventLoop) -> Result<AppWindow> {
        let window = &self.config.window;
        let window = Window::new(event_loop, window.width, window.height, &window.title)
            .context("opening the main window")?;
        AppWindow::new(window, &self.config).context("setting up the scene")
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.scene.is_some() {
            return;
        }
        match self.open(event_loop) {
            Ok(scene) => {
                info!("Entering main loop");
                self.scene = Some(scene);
            }
            Err(e) => {
                error!("{:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };

        let outcome = match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => scene.on_resize(size.width, size.height),
            WindowEvent::RedrawRequested => scene.render(),
            WindowEvent::Focused(true) => {
                scene.on_focus();
                Ok(())
            }
            WindowEvent::Focused(false) => {
                scene.on_kill_focus();
                Ok(())
            }
            other => {
                record_input(scene.input_mut().state_mut(), &other);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            error!("Frame failed: {:?}", e);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(scene) = &self.scene {
            scene.window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut scene) = self.scene.take() {
            scene.on_destroy();
        }
        info!("Shutdown complete");
    }
}

/// Copies keyboard, cursor and button events into `state`.
fn record_input(state: &mut InputState, event: &WindowEvent) {
    match event {
        WindowEvent::KeyboardInput { event, .. } => {
            let PhysicalKey::Code(key) = event.physical_key else {
                return;
            };
            if event.state.is_pressed() {
                state.on_key_pressed(key);
            } else {
                state.on_key_released(key);
            }
        }
        WindowEvent::CursorMoved { position, .. } => {
            state.on_mouse_moved(position.x as f32, position.y as f32);
        }
        WindowEvent::MouseInput { state: action, button, .. } => {
            let Some(button) = MouseButton::from_winit(*button) else {
                return;
            };
            match action {
                ElementState::Pressed => state.on_mouse_pressed(button),
                ElementState::Released => state.on_mouse_released(button),
            }
        }
        _ => {}
    }
}

fn main() -> Result<()> {
    meshview_core::init_logging();

    let config_path = AppConfig::config_path();
    let config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!("meshview starting with {}", config_path.display());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut App {
        config,
        scene: None,
    })?;
    Ok(())
}
