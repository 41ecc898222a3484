//! Keyboard, pointer and scroll state for the page.
//!
//! - **Keys** are edge-triggered: `is_just_pressed` is true only on the frame
//!   the press happened and is cleared by `end_frame()`.
//! - **Pointer** is kept in window pixels and exposed normalised to `[0, 1]`
//!   on each axis, which is what sub-scenes consume.
//! - **Scroll** deltas accumulate between frames and are drained once.

use std::collections::HashSet;

use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    F3,
    R,
    Digit(u8),
}

pub struct InputState {
    held: HashSet<Key>,
    just_pressed: HashSet<Key>,
    pointer_px: Option<Vec2>,
    window_size: Vec2,
    scroll_delta: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            just_pressed: HashSet::new(),
            pointer_px: None,
            window_size: Vec2::ONE,
            scroll_delta: 0.0,
        }
    }

    pub fn key_down(&mut self, key: Key) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        self.held.remove(&key);
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn is_just_pressed(&self, key: Key) -> bool {
        self.just_pressed.contains(&key)
    }

    /// First digit key pressed this frame.
    pub fn just_pressed_digit(&self) -> Option<u8> {
        self.just_pressed
            .iter()
            .filter_map(|k| match k {
                Key::Digit(d) => Some(*d),
                _ => None,
            })
            .min()
    }

    pub fn set_window_size(&mut self, width: f32, height: f32) {
        self.window_size = Vec2::new(width.max(1.0), height.max(1.0));
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer_px = Some(Vec2::new(x, y));
    }

    pub fn pointer_left(&mut self) {
        self.pointer_px = None;
    }

    /// Pointer position normalised to the window, clamped to `[0, 1]`.
    pub fn pointer_normalized(&self) -> Option<Vec2> {
        self.pointer_px
            .map(|p| (p / self.window_size).clamp(Vec2::ZERO, Vec2::ONE))
    }

    /// Positive scrolls down the page.
    pub fn add_scroll(&mut self, pixels: f32) {
        if pixels.is_finite() {
            self.scroll_delta += pixels;
        }
    }

    pub fn take_scroll(&mut self) -> f32 {
        std::mem::take(&mut self.scroll_delta)
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_down_sets_held_and_just_pressed() {
        let mut input = InputState::new();
        input.key_down(Key::F3);
        assert!(input.is_held(Key::F3));
        assert!(input.is_just_pressed(Key::F3));
    }

    #[test]
    fn key_repeat_does_not_repress() {
        let mut input = InputState::new();
        input.key_down(Key::R);
        input.end_frame();
        input.key_down(Key::R);
        assert!(!input.is_just_pressed(Key::R));
        input.key_up(Key::R);
        input.key_down(Key::R);
        assert!(input.is_just_pressed(Key::R));
    }

    #[test]
    fn end_frame_clears_edges_but_keeps_held() {
        let mut input = InputState::new();
        input.key_down(Key::Down);
        input.end_frame();
        assert!(!input.is_just_pressed(Key::Down));
        assert!(input.is_held(Key::Down));
    }

    #[test]
    fn lowest_digit_wins() {
        let mut input = InputState::new();
        input.key_down(Key::Digit(4));
        input.key_down(Key::Digit(2));
        assert_eq!(input.just_pressed_digit(), Some(2));
        input.end_frame();
        assert_eq!(input.just_pressed_digit(), None);
    }

    #[test]
    fn pointer_is_normalised_and_clamped() {
        let mut input = InputState::new();
        assert_eq!(input.pointer_normalized(), None);
        input.set_window_size(800.0, 600.0);
        input.pointer_moved(400.0, 150.0);
        assert_eq!(input.pointer_normalized(), Some(Vec2::new(0.5, 0.25)));
        input.pointer_moved(-10.0, 900.0);
        assert_eq!(input.pointer_normalized(), Some(Vec2::new(0.0, 1.0)));
        input.pointer_left();
        assert_eq!(input.pointer_normalized(), None);
    }

    #[test]
    fn scroll_accumulates_until_taken() {
        let mut input = InputState::new();
        input.add_scroll(30.0);
        input.add_scroll(-10.0);
        input.add_scroll(f32::NAN);
        assert_eq!(input.take_scroll(), 20.0);
        assert_eq!(input.take_scroll(), 0.0);
    }
}
