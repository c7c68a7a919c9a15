//! Listener dispatch on top of [`InputState`].

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::input::{InputState, KeyCode, MouseButton, MousePosition};

/// Receives input notifications from an [`InputSystem`].
///
/// All methods default to doing nothing, so listeners only implement what they use.
pub trait InputListener {
    /// Called on every update while `key` is held.
    fn on_key_down(&mut self, _key: KeyCode) {}
    /// Called once when `key` is released.
    fn on_key_up(&mut self, _key: KeyCode) {}
    /// Called when the cursor position changed since the previous update.
    fn on_mouse_move(&mut self, _position: MousePosition) {}
    fn on_left_mouse_down(&mut self, _position: MousePosition) {}
    fn on_left_mouse_up(&mut self, _position: MousePosition) {}
    fn on_right_mouse_down(&mut self, _position: MousePosition) {}
    fn on_right_mouse_up(&mut self, _position: MousePosition) {}
}

/// Listener handle shared between the input system and its owner.
pub type SharedListener = Rc<RefCell<dyn InputListener>>;

/// Collects window input and dispatches it to registered listeners once per frame.
///
/// Listeners are identified by allocation, so registering the same handle twice
/// keeps a single entry.
#[derive(Default)]
pub struct InputSystem {
    state: InputState,
    listeners: Vec<SharedListener>,
    last_mouse_position: Option<MousePosition>,
}

impl InputSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw state, for feeding window events.
    pub fn state_mut(&mut self) -> &mut InputState {
        &mut self.state
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn add_listener(&mut self, listener: SharedListener) {
        if self.listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            return;
        }
        self.listeners.push(listener);
        debug!("Input listener added ({} registered)", self.listeners.len());
    }

    pub fn remove_listener(&mut self, listener: &SharedListener) {
        let before = self.listeners.len();
        self.listeners.retain(|l| !Rc::ptr_eq(l, listener));
        if self.listeners.len() != before {
            debug!("Input listener removed ({} registered)", self.listeners.len());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Dispatch the input gathered since the previous update, then start a new frame.
    pub fn update(&mut self) {
        // Registration changes made by listeners apply from the next update.
        let listeners = self.listeners.clone();

        if let Some(current) = self.state.mouse_position() {
            if let Some(previous) = self.last_mouse_position
                && previous != current
            {
                dispatch(&listeners, |l| l.on_mouse_move(current));
            }
            self.last_mouse_position = Some(current);
        }
        let position = self.last_mouse_position.unwrap_or_default();

        for key in self.state.pressed_keys() {
            dispatch(&listeners, |l| l.on_key_down(key));
        }
        for key in self.state.just_released_keys() {
            dispatch(&listeners, |l| l.on_key_up(key));
        }

        if self.state.is_mouse_just_pressed(MouseButton::Left) {
            dispatch(&listeners, |l| l.on_left_mouse_down(position));
        }
        if self.state.is_mouse_just_pressed(MouseButton::Right) {
            dispatch(&listeners, |l| l.on_right_mouse_down(position));
        }
        if self.state.is_mouse_just_released(MouseButton::Left) {
            dispatch(&listeners, |l| l.on_left_mouse_up(position));
        }
        if self.state.is_mouse_just_released(MouseButton::Right) {
            dispatch(&listeners, |l| l.on_right_mouse_up(position));
        }

        self.state.begin_frame();
    }

    /// Releases every held key and button and delivers the resulting key-up
    /// and button-up events right away. Call on focus loss, while the
    /// listeners that saw the presses are still registered.
    pub fn release_all(&mut self) {
        self.state.release_all();
        self.update();
    }
}

fn dispatch(listeners: &[SharedListener], mut event: impl FnMut(&mut dyn InputListener)) {
    for listener in listeners {
        match listener.try_borrow_mut() {
            Ok(mut listener) => event(&mut *listener),
            Err(_) => warn!("Input listener busy, event dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl InputListener for Recorder {
        fn on_key_down(&mut self, key: KeyCode) {
            self.events.push(format!("down {key:?}"));
        }
        fn on_key_up(&mut self, key: KeyCode) {
            self.events.push(format!("up {key:?}"));
        }
        fn on_mouse_move(&mut self, position: MousePosition) {
            self.events.push(format!("move {} {}", position.x, position.y));
        }
        fn on_left_mouse_down(&mut self, _position: MousePosition) {
            self.events.push("left down".to_string());
        }
        fn on_left_mouse_up(&mut self, _position: MousePosition) {
            self.events.push("left up".to_string());
        }
        fn on_right_mouse_down(&mut self, _position: MousePosition) {
            self.events.push("right down".to_string());
        }
        fn on_right_mouse_up(&mut self, _position: MousePosition) {
            self.events.push("right up".to_string());
        }
    }

    fn recorder() -> (Rc<RefCell<Recorder>>, SharedListener) {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let shared: SharedListener = recorder.clone();
        (recorder, shared)
    }

    #[test]
    fn test_add_listener_is_idempotent() {
        let (_rec, shared) = recorder();
        let mut input = InputSystem::new();
        input.add_listener(shared.clone());
        input.add_listener(shared.clone());
        assert_eq!(input.listener_count(), 1);
        input.remove_listener(&shared);
        assert_eq!(input.listener_count(), 0);
    }

    #[test]
    fn test_key_down_repeats_while_held() {
        let (rec, shared) = recorder();
        let mut input = InputSystem::new();
        input.add_listener(shared);

        input.state_mut().on_key_pressed(KeyCode::KeyW);
        input.update();
        input.update();
        assert_eq!(rec.borrow().events, vec!["down KeyW", "down KeyW"]);

        input.state_mut().on_key_released(KeyCode::KeyW);
        input.update();
        assert_eq!(rec.borrow().events.last().unwrap(), "up KeyW");
        assert_eq!(rec.borrow().events.len(), 3);
    }

    #[test]
    fn test_first_mouse_position_only_primes() {
        let (rec, shared) = recorder();
        let mut input = InputSystem::new();
        input.add_listener(shared);

        input.state_mut().on_mouse_moved(100.0, 50.0);
        input.update();
        assert!(rec.borrow().events.is_empty());

        input.update();
        assert!(rec.borrow().events.is_empty());

        input.state_mut().on_mouse_moved(110.0, 50.0);
        input.update();
        assert_eq!(rec.borrow().events, vec!["move 110 50"]);
    }

    #[test]
    fn test_mouse_button_edges() {
        let (rec, shared) = recorder();
        let mut input = InputSystem::new();
        input.add_listener(shared);

        input.state_mut().on_mouse_pressed(MouseButton::Left);
        input.update();
        input.update();
        input.state_mut().on_mouse_released(MouseButton::Left);
        input.state_mut().on_mouse_pressed(MouseButton::Right);
        input.update();

        assert_eq!(
            rec.borrow().events,
            vec!["left down", "right down", "left up"]
        );
    }

    #[test]
    fn test_release_all_delivers_releases() {
        let (rec, shared) = recorder();
        let mut input = InputSystem::new();
        input.add_listener(shared);

        input.state_mut().on_key_pressed(KeyCode::KeyW);
        input.state_mut().on_mouse_pressed(MouseButton::Right);
        input.update();
        input.release_all();

        assert_eq!(
            rec.borrow().events,
            vec!["down KeyW", "right down", "up KeyW", "right up"]
        );
        assert_eq!(input.state().pressed_keys().count(), 0);
        assert!(!input.state().is_key_just_released(KeyCode::KeyW));
    }

    #[test]
    fn test_removed_listener_not_notified() {
        let (rec, shared) = recorder();
        let mut input = InputSystem::new();
        input.add_listener(shared.clone());
        input.remove_listener(&shared);

        input.state_mut().on_key_pressed(KeyCode::KeyS);
        input.update();
        assert!(rec.borrow().events.is_empty());
    }

    #[test]
    fn test_multiple_listeners() {
        let (a, shared_a) = recorder();
        let (b, shared_b) = recorder();
        let mut input = InputSystem::new();
        input.add_listener(shared_a);
        input.add_listener(shared_b);

        input.state_mut().on_key_pressed(KeyCode::KeyD);
        input.state_mut().on_key_released(KeyCode::KeyD);
        input.update();

        assert_eq!(a.borrow().events, vec!["up KeyD"]);
        assert_eq!(b.borrow().events, vec!["up KeyD"]);
    }

    #[test]
    fn test_busy_listener_is_skipped() {
        let (rec, shared) = recorder();
        let mut input = InputSystem::new();
        input.add_listener(shared);

        input.state_mut().on_key_pressed(KeyCode::KeyA);
        let guard = rec.borrow_mut();
        input.update();
        drop(guard);
        assert!(rec.borrow().events.is_empty());
    }
}
