//! Input-driven camera and model state.
//!
//! [`CameraController`] receives events from the input system and turns them
//! into camera angles, move factors and the model scale. Anything that has to
//! touch the window (cursor visibility, cursor warp, fullscreen) is queued as a
//! [`WindowRequest`] for the host to apply.

use meshview_core::CameraConfig;
use meshview_platform::{InputListener, KeyCode, MousePosition};
use tracing::debug;

/// Model scale while the left button is held.
pub const SCALE_SHRUNK: f32 = 0.5;
/// Model scale while the right button is held.
pub const SCALE_GROWN: f32 = 2.0;

/// A window side effect requested by the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowRequest {
    ShowCursor(bool),
    SetFullscreen(bool),
    /// Warp the cursor to this client-area position.
    CenterCursor { x: f32, y: f32 },
}

#[derive(Debug)]
pub struct CameraController {
    rot_x: f32,
    rot_y: f32,
    forward: f32,
    rightward: f32,
    model_scale: f32,
    playing: bool,
    fullscreen: bool,
    viewport: (u32, u32),
    delta_time: f32,
    mouse_sensitivity: f32,
    requests: Vec<WindowRequest>,
}

impl CameraController {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            rot_x: 0.0,
            rot_y: 0.0,
            forward: 0.0,
            rightward: 0.0,
            model_scale: 1.0,
            playing: false,
            fullscreen: false,
            viewport: (0, 0),
            delta_time: 0.0,
            mouse_sensitivity: config.mouse_sensitivity,
            requests: Vec::new(),
        }
    }

    /// Enter or leave play mode. The cursor is hidden while playing.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        self.requests.push(WindowRequest::ShowCursor(!playing));
    }

    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    pub fn set_delta_time(&mut self, dt: f32) {
        self.delta_time = dt;
    }

    /// Takes every request queued since the last call, oldest first.
    pub fn drain_requests(&mut self) -> Vec<WindowRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn rotation(&self) -> (f32, f32) {
        (self.rot_x, self.rot_y)
    }

    /// `(forward, rightward)`, each in `-1..=1`.
    pub fn movement(&self) -> (f32, f32) {
        (self.forward, self.rightward)
    }

    pub fn model_scale(&self) -> f32 {
        self.model_scale
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn center(&self) -> (f32, f32) {
        (self.viewport.0 as f32 / 2.0, self.viewport.1 as f32 / 2.0)
    }
}

impl InputListener for CameraController {
    fn on_key_down(&mut self, key: KeyCode) {
        match key {
            KeyCode::KeyW => self.forward = 1.0,
            KeyCode::KeyS => self.forward = -1.0,
            KeyCode::KeyA => self.rightward = -1.0,
            KeyCode::KeyD => self.rightward = 1.0,
            _ => {}
        }
    }

    fn on_key_up(&mut self, key: KeyCode) {
        self.forward = 0.0;
        self.rightward = 0.0;

        match key {
            KeyCode::KeyG => {
                let playing = !self.playing;
                debug!("Play mode {}", if playing { "on" } else { "off" });
                self.set_playing(playing);
            }
            KeyCode::KeyF => {
                self.fullscreen = !self.fullscreen;
                self.requests
                    .push(WindowRequest::SetFullscreen(self.fullscreen));
            }
            _ => {}
        }
    }

    fn on_mouse_move(&mut self, position: MousePosition) {
        if !self.playing {
            return;
        }

        let (cx, cy) = self.center();
        let step = self.delta_time * self.mouse_sensitivity;
        self.rot_x += (position.y - cy) * step;
        self.rot_y += (position.x - cx) * step;

        self.requests
            .push(WindowRequest::CenterCursor { x: cx, y: cy });
    }

    fn on_left_mouse_down(&mut self, _position: MousePosition) {
        self.model_scale = SCALE_SHRUNK;
    }

    fn on_left_mouse_up(&mut self, _position: MousePosition) {
        self.model_scale = 1.0;
    }

    fn on_right_mouse_down(&mut self, _position: MousePosition) {
        self.model_scale = SCALE_GROWN;
    }

    fn on_right_mouse_up(&mut self, _position: MousePosition) {
        self.model_scale = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn controller() -> CameraController {
        let mut c = CameraController::new(&CameraConfig::default());
        c.set_viewport_size(800, 600);
        c
    }

    #[test]
    fn test_wasd_sets_movement() {
        let mut c = controller();
        c.on_key_down(KeyCode::KeyW);
        assert_eq!(c.movement(), (1.0, 0.0));
        c.on_key_down(KeyCode::KeyD);
        assert_eq!(c.movement(), (1.0, 1.0));
        c.on_key_down(KeyCode::KeyS);
        c.on_key_down(KeyCode::KeyA);
        assert_eq!(c.movement(), (-1.0, -1.0));
    }

    #[test]
    fn test_any_key_up_stops_movement() {
        let mut c = controller();
        c.on_key_down(KeyCode::KeyW);
        c.on_key_down(KeyCode::KeyA);
        c.on_key_up(KeyCode::Space);
        assert_eq!(c.movement(), (0.0, 0.0));
        assert!(c.drain_requests().is_empty());
    }

    #[test]
    fn test_g_toggles_play_and_cursor() {
        let mut c = controller();
        c.set_playing(true);
        assert_eq!(c.drain_requests(), vec![WindowRequest::ShowCursor(false)]);

        c.on_key_up(KeyCode::KeyG);
        assert!(!c.is_playing());
        assert_eq!(c.drain_requests(), vec![WindowRequest::ShowCursor(true)]);

        c.on_key_up(KeyCode::KeyG);
        assert!(c.is_playing());
        assert_eq!(c.drain_requests(), vec![WindowRequest::ShowCursor(false)]);
    }

    #[test]
    fn test_f_toggles_fullscreen() {
        let mut c = controller();
        c.on_key_up(KeyCode::KeyF);
        assert!(c.is_fullscreen());
        c.on_key_up(KeyCode::KeyF);
        assert!(!c.is_fullscreen());
        assert_eq!(
            c.drain_requests(),
            vec![
                WindowRequest::SetFullscreen(true),
                WindowRequest::SetFullscreen(false)
            ]
        );
    }

    #[test]
    fn test_mouse_move_rotates_while_playing() {
        let mut c = controller();
        c.set_playing(true);
        c.drain_requests();
        c.set_delta_time(0.5);

        c.on_mouse_move(MousePosition::new(500.0, 280.0));

        let (rot_x, rot_y) = c.rotation();
        // (280 - 300) * 0.5 * 0.1 and (500 - 400) * 0.5 * 0.1
        assert!((rot_x - -1.0).abs() < EPSILON);
        assert!((rot_y - 5.0).abs() < EPSILON);
        assert_eq!(
            c.drain_requests(),
            vec![WindowRequest::CenterCursor { x: 400.0, y: 300.0 }]
        );
    }

    #[test]
    fn test_mouse_move_ignored_when_not_playing() {
        let mut c = controller();
        c.set_delta_time(1.0);
        c.on_mouse_move(MousePosition::new(0.0, 0.0));
        assert_eq!(c.rotation(), (0.0, 0.0));
        assert!(c.drain_requests().is_empty());
    }

    #[test]
    fn test_mouse_move_with_zero_delta_does_not_rotate() {
        let mut c = controller();
        c.set_playing(true);
        c.on_mouse_move(MousePosition::new(10.0, 10.0));
        assert_eq!(c.rotation(), (0.0, 0.0));
    }

    #[test]
    fn test_mouse_buttons_scale_model() {
        let mut c = controller();
        let p = MousePosition::default();
        assert_eq!(c.model_scale(), 1.0);
        c.on_left_mouse_down(p);
        assert_eq!(c.model_scale(), SCALE_SHRUNK);
        c.on_left_mouse_up(p);
        assert_eq!(c.model_scale(), 1.0);
        c.on_right_mouse_down(p);
        assert_eq!(c.model_scale(), SCALE_GROWN);
        c.on_right_mouse_up(p);
        assert_eq!(c.model_scale(), 1.0);
    }

    #[test]
    fn test_focus_loss_stops_movement_through_input_system() {
        use std::cell::RefCell;
        use std::rc::Rc;

        use meshview_platform::{InputSystem, SharedListener};

        let controller = Rc::new(RefCell::new(controller()));
        let listener: SharedListener = controller.clone();
        let mut input = InputSystem::new();
        input.add_listener(listener.clone());

        input.state_mut().on_key_pressed(KeyCode::KeyW);
        input.update();
        assert_eq!(controller.borrow().movement(), (1.0, 0.0));

        input.release_all();
        input.remove_listener(&listener);
        assert_eq!(controller.borrow().movement(), (0.0, 0.0));

        input.add_listener(listener);
        input.update();
        assert_eq!(controller.borrow().movement(), (0.0, 0.0));
    }
}
