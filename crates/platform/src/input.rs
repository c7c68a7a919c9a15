//! Keyboard and mouse state recorded from window events.

use std::collections::HashSet;
use std::hash::Hash;

pub use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// `None` for the side and extra buttons.
    pub fn from_winit(button: winit::event::MouseButton) -> Option<Self> {
        use winit::event::MouseButton as Winit;
        Some(match button {
            Winit::Left => Self::Left,
            Winit::Right => Self::Right,
            Winit::Middle => Self::Middle,
            _ => return None,
        })
    }
}

/// Cursor position in client-area physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MousePosition {
    pub x: f32,
    pub y: f32,
}

impl MousePosition {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Held set for one kind of input plus the transitions since the last frame.
#[derive(Debug)]
struct Tracked<T> {
    held: HashSet<T>,
    went_down: HashSet<T>,
    went_up: HashSet<T>,
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self {
            held: HashSet::new(),
            went_down: HashSet::new(),
            went_up: HashSet::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> Tracked<T> {
    /// Auto-repeat of an already held input is not a transition.
    fn press(&mut self, item: T) {
        if self.held.insert(item) {
            self.went_down.insert(item);
        }
    }

    /// A release of something never pressed is ignored.
    fn release(&mut self, item: T) {
        if self.held.remove(&item) {
            self.went_up.insert(item);
        }
    }

    fn release_all(&mut self) {
        self.went_up.extend(self.held.drain());
    }

    fn clear_transitions(&mut self) {
        self.went_down.clear();
        self.went_up.clear();
    }
}

/// Input as seen by the window.
///
/// The `just_*` queries cover everything since the last
/// [`begin_frame`](Self::begin_frame).
#[derive(Debug, Default)]
pub struct InputState {
    keys: Tracked<KeyCode>,
    buttons: Tracked<MouseButton>,
    // None until the cursor first enters the window.
    cursor: Option<MousePosition>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.keys.clear_transitions();
        self.buttons.clear_transitions();
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        self.keys.press(key);
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.keys.release(key);
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        self.buttons.press(button);
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.buttons.release(button);
    }

    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        self.cursor = Some(MousePosition::new(x, y));
    }

    /// Treats every held key and button as released. Used on focus loss,
    /// after which the real release events go to another window.
    pub fn release_all(&mut self) {
        self.keys.release_all();
        self.buttons.release_all();
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys.held.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.keys.went_down.contains(&key)
    }

    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.keys.went_up.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.buttons.held.contains(&button)
    }

    pub fn is_mouse_just_pressed(&self, button: MouseButton) -> bool {
        self.buttons.went_down.contains(&button)
    }

    pub fn is_mouse_just_released(&self, button: MouseButton) -> bool {
        self.buttons.went_up.contains(&button)
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.keys.held.iter().copied()
    }

    pub fn just_released_keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.keys.went_up.iter().copied()
    }

    #[inline]
    pub fn mouse_position(&self) -> Option<MousePosition> {
        self.cursor
    }
}
