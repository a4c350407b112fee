//! Input state tracking for the viewer window.
//!
//! Raw window events are folded into per-frame state: instantaneous
//! events (key just pressed), continuous state (button held) and motion
//! deltas. The application reads the accumulated state once per frame and
//! then calls [`Input::begin_frame`] to clear the per-frame parts, so a
//! burst of events between two redraws acts like a single larger one.

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Default)]
pub struct Input {
    keys_held: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    buttons_held: HashSet<MouseButton>,
    cursor_position: Option<Vec2>,
    cursor_delta: Vec2,
    scroll_delta: f32,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// True only on the frame the key went down; key repeat is ignored.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    pub fn button_held(&self, button: MouseButton) -> bool {
        self.buttons_held.contains(&button)
    }

    /// Cursor movement accumulated since the last `begin_frame`, in pixels.
    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor_delta
    }

    /// Scroll accumulated since the last `begin_frame`, in lines.
    pub fn scroll_delta(&self) -> f32 {
        self.scroll_delta
    }

    /// Clear the per-frame state. Held keys and buttons persist.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.cursor_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
    }

    fn cursor_moved(&mut self, position: Vec2) {
        if let Some(last) = self.cursor_position {
            self.cursor_delta += position - last;
        }
        self.cursor_position = Some(position);
    }

    /// Fold one window event into the tracked state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            if !self.keys_held.contains(&key) {
                                self.keys_pressed.insert(key);
                            }
                            self.keys_held.insert(key);
                        }
                        ElementState::Released => {
                            self.keys_held.remove(&key);
                        }
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.buttons_held.insert(*button);
                }
                ElementState::Released => {
                    self.buttons_held.remove(button);
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor_position = None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll_delta += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_deltas_accumulate_within_a_frame() {
        let mut input = Input::new();
        input.cursor_moved(Vec2::new(10.0, 10.0));
        input.cursor_moved(Vec2::new(15.0, 12.0));
        input.cursor_moved(Vec2::new(18.0, 11.0));
        assert_eq!(input.cursor_delta(), Vec2::new(8.0, 1.0));

        input.begin_frame();
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
        // The reference position survives the frame boundary.
        input.cursor_moved(Vec2::new(20.0, 11.0));
        assert_eq!(input.cursor_delta(), Vec2::new(2.0, 0.0));
    }

    #[test]
    fn first_cursor_event_produces_no_delta() {
        let mut input = Input::new();
        input.cursor_moved(Vec2::new(500.0, 300.0));
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
    }
}
