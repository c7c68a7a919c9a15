//! Per-frame viewer logic: a textured model inside a skybox.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec4;
use tracing::{error, info, warn};

use meshview_core::{AppConfig, FrameTimer};
use meshview_platform::{InputSystem, SharedListener, Window};
use meshview_renderer::{
    ConstantBuffer, DeviceContext, GraphicsEngine, Material, Mesh, RasterizerState,
    ResourceBinding,
};
use meshview_resources::SceneConstants;
use meshview_rhi::texture::Texture;
use meshview_scene::{Camera, CameraController, RotatingLight, Transform, WindowRequest};

const MESH_VERTEX_SHADER: &str = "mesh.vert.spv";
const MESH_PIXEL_SHADER: &str = "mesh.frag.spv";
const SKYBOX_PIXEL_SHADER: &str = "skybox.frag.spv";

/// Everything needed to draw one mesh.
struct SceneObject {
    mesh: Arc<Mesh>,
    constants: ConstantBuffer<SceneConstants>,
    binding: ResourceBinding,
    material: Material,
    _texture: Arc<Texture>,
}

pub struct AppWindow {
    // GPU objects first: they must go before the engine that owns the device
    model: SceneObject,
    sky: SceneObject,
    engine: GraphicsEngine,
    window: Window,

    input: InputSystem,
    controller: Rc<RefCell<CameraController>>,
    listener: SharedListener,

    camera: Camera,
    light: RotatingLight,
    timer: FrameTimer,
    delta_time: f32,
    clear_color: [f32; 4],
    sky_scale: f32,
}

impl AppWindow {
    /// Loads every asset and starts in play mode with the cursor hidden.
    ///
    /// # Errors
    ///
    /// Returns an error if the graphics engine cannot start or any asset or
    /// shader fails to load.
    pub fn new(window: Window, config: &AppConfig) -> Result<Self> {
        if let Some((width, height)) = window.screen_size() {
            info!("Monitor resolution {}x{}", width, height);
        }
        let mut engine = GraphicsEngine::new(&window, &config.render)
            .context("Failed to initialize graphics engine")?;

        let assets = &config.assets;
        let model_texture = engine
            .texture_manager()
            .create_texture_from_file(&assets.model_texture)
            .with_context(|| format!("Failed to load {:?}", assets.model_texture))?;
        let sky_texture = engine
            .texture_manager()
            .create_texture_from_file(&assets.sky_texture)
            .with_context(|| format!("Failed to load {:?}", assets.sky_texture))?;

        let model_mesh = if assets.use_builtin_cube {
            engine.mesh_manager().create_cube()?
        } else {
            engine
                .mesh_manager()
                .create_mesh_from_file(&assets.model_mesh)
                .with_context(|| format!("Failed to load {:?}", assets.model_mesh))?
        };
        let sky_mesh = engine
            .mesh_manager()
            .create_mesh_from_file(&assets.sky_mesh)
            .with_context(|| format!("Failed to load {:?}", assets.sky_mesh))?;

        let render_system = engine.render_system_mut();
        let vs = render_system
            .create_vertex_shader(&assets.shader_dir.join(MESH_VERTEX_SHADER))
            .context("Failed to load vertex shader")?;
        let ps = render_system
            .create_pixel_shader(&assets.shader_dir.join(MESH_PIXEL_SHADER))
            .context("Failed to load pixel shader")?;
        let sky_ps = render_system
            .create_pixel_shader(&assets.shader_dir.join(SKYBOX_PIXEL_SHADER))
            .context("Failed to load skybox pixel shader")?;

        let initial = SceneConstants::default();

        let model_constants = render_system.create_constant_buffer(&initial)?;
        let model = SceneObject {
            mesh: model_mesh,
            binding: render_system.create_resource_binding(&model_constants, &model_texture)?,
            constants: model_constants,
            material: render_system.create_material(&vs, &ps, RasterizerState::CullBack)?,
            _texture: model_texture,
        };

        let sky_constants = render_system.create_constant_buffer(&initial)?;
        let sky = SceneObject {
            mesh: sky_mesh,
            binding: render_system.create_resource_binding(&sky_constants, &sky_texture)?,
            constants: sky_constants,
            material: render_system.create_material(&vs, &sky_ps, RasterizerState::CullFront)?,
            _texture: sky_texture,
        };

        let controller = Rc::new(RefCell::new(CameraController::new(&config.camera)));
        let listener: SharedListener = controller.clone();
        let mut input = InputSystem::new();
        input.add_listener(listener.clone());
        controller.borrow_mut().set_playing(true);

        let mut camera = Camera::new(&config.camera);
        let (width, height) = window.client_size();
        camera.set_aspect(width, height);

        info!("Scene ready");

        Ok(Self {
            model,
            sky,
            engine,
            window,
            input,
            controller,
            listener,
            camera,
            light: RotatingLight::new(config.light.rotation_speed),
            timer: FrameTimer::new(),
            delta_time: 0.0,
            clear_color: config.render.clear_color,
            sky_scale: config.skybox.scale,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Raw input state, for feeding window events.
    pub fn input_mut(&mut self) -> &mut InputSystem {
        &mut self.input
    }

    pub fn on_focus(&mut self) {
        self.input.add_listener(self.listener.clone());
    }

    pub fn on_kill_focus(&mut self) {
        self.input.release_all();
        self.input.remove_listener(&self.listener);
    }

    /// Resizes the swap chain and draws straight away.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering the frame fails.
    pub fn on_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.window.resize(width, height);
        self.engine.render_system_mut().resize(width, height);
        self.render()
    }

    /// Leaves fullscreen so the desktop is restored on exit.
    pub fn on_destroy(&mut self) {
        self.window.set_fullscreen(false);
    }

    /// Runs one frame: input, constants, draws, present.
    ///
    /// # Errors
    ///
    /// Returns an error if recording or presentation fails.
    pub fn render(&mut self) -> Result<()> {
        let (width, height) = self.window.client_size();
        {
            let mut controller = self.controller.borrow_mut();
            controller.set_viewport_size(width, height);
            controller.set_delta_time(self.delta_time);
        }
        self.input.update();
        self.apply_window_requests();

        let Some(ctx) = self
            .engine
            .render_system_mut()
            .begin_frame(self.clear_color)?
        else {
            self.delta_time = self.timer.delta_secs();
            return Ok(());
        };

        let extent = self.engine.render_system().extent();
        ctx.set_viewport_size(extent.width, extent.height);

        let recorded = self.update(&ctx);
        draw_mesh(&ctx, &self.model);
        draw_mesh(&ctx, &self.sky);

        let render_system = self.engine.render_system_mut();
        finish_frame(recorded, || Ok(render_system.present(ctx)?))?;

        self.delta_time = self.timer.delta_secs();
        Ok(())
    }

    fn update(&mut self, ctx: &DeviceContext) -> Result<()> {
        self.update_camera();
        self.update_model(ctx)?;
        self.update_skybox(ctx)?;
        Ok(())
    }

    fn update_camera(&mut self) {
        let controller = self.controller.borrow();
        let (rot_x, rot_y) = controller.rotation();
        let (forward, rightward) = controller.movement();
        self.camera.update(rot_x, rot_y, forward, rightward);

        let (width, height) = self.window.client_size();
        self.camera.set_aspect(width, height);
    }

    fn update_model(&mut self, ctx: &DeviceContext) -> Result<()> {
        let light_direction = self.light.direction();
        self.light.advance(self.delta_time);

        let scale = self.controller.borrow().model_scale();
        let constants = model_constants(&self.camera, light_direction, scale);
        self.model.constants.update(ctx, &constants)?;
        Ok(())
    }

    fn update_skybox(&mut self, ctx: &DeviceContext) -> Result<()> {
        let constants = skybox_constants(&self.camera, self.sky_scale);
        self.sky.constants.update(ctx, &constants)?;
        Ok(())
    }

    fn apply_window_requests(&mut self) {
        let requests = self.controller.borrow_mut().drain_requests();
        for request in requests {
            match request {
                WindowRequest::ShowCursor(visible) => self.window.show_cursor(visible),
                WindowRequest::SetFullscreen(fullscreen) => self.window.set_fullscreen(fullscreen),
                WindowRequest::CenterCursor { x, y } => {
                    if let Err(e) = self.window.set_cursor_position(x, y) {
                        warn!("{}", e);
                    }
                }
            }
        }
    }
}

impl Drop for AppWindow {
    fn drop(&mut self) {
        // Scene objects may still be in use by frames in flight
        if let Err(e) = self.engine.render_system().wait_idle() {
            error!("Failed to wait for device idle: {:?}", e);
        }
    }
}

fn draw_mesh(ctx: &DeviceContext, object: &SceneObject) {
    ctx.set_material(&object.material);
    ctx.set_resource_binding(&object.binding);
    ctx.set_vertex_buffer(object.mesh.vertex_buffer());
    ctx.set_index_buffer(object.mesh.index_buffer());
    ctx.draw_indexed_triangle_list(object.mesh.index_buffer().index_count(), 0, 0);
}

/// Presents even when recording failed, so the acquired image and the frame
/// slot's fence go back to the swap chain. The recording error wins.
fn finish_frame(recorded: Result<()>, present: impl FnOnce() -> Result<()>) -> Result<()> {
    let presented = present();
    recorded.and(presented)
}

/// Model constants: scaled at the origin and lit by `light_direction`.
fn model_constants(camera: &Camera, light_direction: Vec4, scale: f32) -> SceneConstants {
    SceneConstants::new(
        Transform::new().with_uniform_scale(scale).matrix(),
        camera.view_matrix(),
        camera.projection_matrix(),
        light_direction,
        camera.position(),
    )
}

/// Skybox constants: scaled up and centred on the camera so it never gets closer.
fn skybox_constants(camera: &Camera, scale: f32) -> SceneConstants {
    let world = Transform::new()
        .with_uniform_scale(scale)
        .with_position(camera.position())
        .matrix();
    SceneConstants::new(
        world,
        camera.view_matrix(),
        camera.projection_matrix(),
        Vec4::ZERO,
        camera.position(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use meshview_core::CameraConfig;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_model_constants_scale_world() {
        let camera = Camera::new(&CameraConfig::default());
        let light = Vec4::new(0.0, 0.0, 1.0, 0.0);
        let constants = model_constants(&camera, light, 2.0);

        assert!(
            constants
                .world
                .abs_diff_eq(Mat4::from_scale(Vec3::splat(2.0)), EPSILON)
        );
        assert_eq!(constants.light_direction, light);
        assert_eq!(constants.view, camera.view_matrix());
        assert_eq!(constants.proj, camera.projection_matrix());
        assert_eq!(constants.camera_position, Vec4::new(0.0, 0.0, -1.0, 1.0));
    }

    #[test]
    fn test_failed_recording_still_presents() {
        let mut presented = false;
        let result = finish_frame(Err(anyhow::anyhow!("constant upload failed")), || {
            presented = true;
            Ok(())
        });
        assert!(presented);
        assert_eq!(result.unwrap_err().to_string(), "constant upload failed");
    }

    #[test]
    fn test_present_error_reported_after_clean_recording() {
        let result = finish_frame(Ok(()), || Err(anyhow::anyhow!("device lost")));
        assert_eq!(result.unwrap_err().to_string(), "device lost");
        assert!(finish_frame(Ok(()), || Ok(())).is_ok());
    }

    #[test]
    fn test_skybox_follows_camera() {
        let mut camera = Camera::new(&CameraConfig::default());
        camera.update(0.0, 0.0, 1.0, 1.0);
        let constants = skybox_constants(&camera, 100.0);

        let origin = constants.world.transform_point3(Vec3::ZERO);
        assert!((origin - camera.position()).length() < EPSILON);

        let edge = constants.world.transform_point3(Vec3::X);
        assert!(((edge - origin).length() - 100.0).abs() < EPSILON);
        assert_eq!(constants.light_direction, Vec4::ZERO);
    }
}
