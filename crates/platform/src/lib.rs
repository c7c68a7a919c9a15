//! Platform layer for meshview.
//!
//! - Window host via winit (cursor, fullscreen, client size)
//! - Vulkan surface creation from raw window handles
//! - Input state tracking and listener dispatch

mod input;
mod input_system;
mod window;

pub use input::{InputState, KeyCode, MouseButton, MousePosition};
pub use input_system::{InputListener, InputSystem, SharedListener};
pub use window::{Surface, Window};
