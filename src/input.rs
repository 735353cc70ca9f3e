//! Input polling and the per-frame input snapshot handed to imgui.
//!
//! `InputState` accumulates the `winit` window events between two frames. At the
//! start of a frame the driver takes an `InputSnapshot` from it, which is then
//! written into `imgui::Io` as a series of input events (only the transitions with
//! respect to the previous snapshot are sent).

use std::collections::BTreeSet;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Amount of pixels a precise (touchpad) scroll has to move to count as one wheel line.
const PIXELS_PER_WHEEL_LINE: f32 = 20.0;

/// Number of pointer buttons tracked, in imgui order: left, right, middle, back, forward.
pub const BUTTON_COUNT: usize = 5;

/// The keys the GUI reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Tab,
    LeftArrow,
    RightArrow,
    UpArrow,
    DownArrow,
    PageUp,
    PageDown,
    Home,
    End,
    Delete,
    Backspace,
    Enter,
    Escape,
    A,
    C,
    V,
    X,
    Y,
    Z,
    F4,
}

impl Key {
    /// Maps a physical key code to a GUI key, `None` for keys the GUI doesn't use.
    pub fn from_key_code(code: KeyCode) -> Option<Key> {
        let key = match code {
            KeyCode::Tab => Key::Tab,
            KeyCode::ArrowLeft => Key::LeftArrow,
            KeyCode::ArrowRight => Key::RightArrow,
            KeyCode::ArrowUp => Key::UpArrow,
            KeyCode::ArrowDown => Key::DownArrow,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::Delete => Key::Delete,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Enter | KeyCode::NumpadEnter => Key::Enter,
            KeyCode::Escape => Key::Escape,
            KeyCode::KeyA => Key::A,
            KeyCode::KeyC => Key::C,
            KeyCode::KeyV => Key::V,
            KeyCode::KeyX => Key::X,
            KeyCode::KeyY => Key::Y,
            KeyCode::KeyZ => Key::Z,
            KeyCode::F4 => Key::F4,
            _ => return None,
        };
        Some(key)
    }

    fn to_imgui(self) -> imgui::Key {
        match self {
            Key::Tab => imgui::Key::Tab,
            Key::LeftArrow => imgui::Key::LeftArrow,
            Key::RightArrow => imgui::Key::RightArrow,
            Key::UpArrow => imgui::Key::UpArrow,
            Key::DownArrow => imgui::Key::DownArrow,
            Key::PageUp => imgui::Key::PageUp,
            Key::PageDown => imgui::Key::PageDown,
            Key::Home => imgui::Key::Home,
            Key::End => imgui::Key::End,
            Key::Delete => imgui::Key::Delete,
            Key::Backspace => imgui::Key::Backspace,
            Key::Enter => imgui::Key::Enter,
            Key::Escape => imgui::Key::Escape,
            Key::A => imgui::Key::A,
            Key::C => imgui::Key::C,
            Key::V => imgui::Key::V,
            Key::X => imgui::Key::X,
            Key::Y => imgui::Key::Y,
            Key::Z => imgui::Key::Z,
            Key::F4 => imgui::Key::F4,
        }
    }
}

/// State of the modifier keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub logo: bool,
}

/// Where the pointer is, in logical window coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pointer {
    Inside([f32; 2]),
    /// The pointer is not over the window's client area. Widgets treat this as "no hover".
    Outside,
}

impl Pointer {
    /// The position imgui uses to mean "no mouse".
    pub const OUTSIDE_POSITION: [f32; 2] = [-f32::MAX, -f32::MAX];

    /// The position as written to `imgui::Io`.
    pub fn position(&self) -> [f32; 2] {
        match *self {
            Pointer::Inside(pos) => pos,
            Pointer::Outside => Pointer::OUTSIDE_POSITION,
        }
    }
}

impl Default for Pointer {
    fn default() -> Self {
        Pointer::Outside
    }
}

/// Turns the accumulated wheel position into per-frame deltas.
#[derive(Clone, Copy, Debug, Default)]
pub struct WheelTracker {
    absolute: f32,
    reported: Option<f32>,
}

impl WheelTracker {
    /// Moves the absolute wheel position by `lines`.
    pub fn scroll(&mut self, lines: f32) {
        self.absolute += lines;
    }

    pub fn absolute(&self) -> f32 {
        self.absolute
    }

    /// The difference between the current absolute position and the one at the
    /// previous call. The first call reports `0.0`.
    pub fn take_delta(&mut self) -> f32 {
        let delta = match self.reported {
            Some(previous) => self.absolute - previous,
            None => 0.0,
        };
        self.reported = Some(self.absolute);
        delta
    }
}

/// The input state of one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSnapshot {
    pub pointer: Pointer,
    pub buttons: [bool; BUTTON_COUNT],
    pub wheel_delta: f32,
    pub keys_down: BTreeSet<Key>,
    pub modifiers: Modifiers,
    /// Characters typed since the previous snapshot, in order.
    pub typed: Vec<char>,
}

impl InputSnapshot {
    #[inline]
    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    /// Whether the platform close hotkey (Alt+F4) is held.
    pub fn exit_hotkey_pressed(&self) -> bool {
        self.modifiers.alt && self.is_key_down(Key::F4)
    }

    /// Writes this snapshot into `io`, sending only what changed since `previous`.
    pub fn apply_to_io(&self, previous: &InputSnapshot, io: &mut imgui::Io) {
        if self.pointer != previous.pointer {
            io.add_mouse_pos_event(self.pointer.position());
        }

        const IMGUI_BUTTONS: [imgui::MouseButton; BUTTON_COUNT] = [
            imgui::MouseButton::Left,
            imgui::MouseButton::Right,
            imgui::MouseButton::Middle,
            imgui::MouseButton::Extra1,
            imgui::MouseButton::Extra2,
        ];
        for (i, button) in IMGUI_BUTTONS.iter().enumerate() {
            if self.buttons[i] != previous.buttons[i] {
                io.add_mouse_button_event(*button, self.buttons[i]);
            }
        }

        if self.wheel_delta != 0.0 {
            io.add_mouse_wheel_event([0.0, self.wheel_delta]);
        }

        let (mods, prev_mods) = (self.modifiers, previous.modifiers);
        if mods.ctrl != prev_mods.ctrl {
            io.add_key_event(imgui::Key::ModCtrl, mods.ctrl);
        }
        if mods.shift != prev_mods.shift {
            io.add_key_event(imgui::Key::ModShift, mods.shift);
        }
        if mods.alt != prev_mods.alt {
            io.add_key_event(imgui::Key::ModAlt, mods.alt);
        }
        if mods.logo != prev_mods.logo {
            io.add_key_event(imgui::Key::ModSuper, mods.logo);
        }

        for key in previous.keys_down.difference(&self.keys_down) {
            io.add_key_event(key.to_imgui(), false);
        }
        for key in self.keys_down.difference(&previous.keys_down) {
            io.add_key_event(key.to_imgui(), true);
        }

        for &c in &self.typed {
            io.add_input_character(c);
        }
    }
}

/// Collects window events until the next snapshot is taken.
#[derive(Debug)]
pub struct InputState {
    cursor: Option<[f32; 2]>,
    client_size: [f32; 2],
    scale_factor: f64,
    buttons: [bool; BUTTON_COUNT],
    wheel: WheelTracker,
    keys_down: BTreeSet<Key>,
    modifiers: Modifiers,
    typed: Vec<char>,
}

impl InputState {
    /// `client_size` is in logical pixels.
    pub fn new(client_size: [f32; 2], scale_factor: f64) -> Self {
        InputState {
            cursor: None,
            client_size,
            scale_factor,
            buttons: [false; BUTTON_COUNT],
            wheel: WheelTracker::default(),
            keys_down: BTreeSet::new(),
            modifiers: Modifiers::default(),
            typed: Vec::new(),
        }
    }

    pub fn set_client_size(&mut self, client_size: [f32; 2]) {
        self.client_size = client_size;
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    /// Records the cursor at `position`, in logical pixels relative to the client area.
    pub fn cursor_moved(&mut self, position: [f32; 2]) {
        self.cursor = Some(position);
    }

    pub fn cursor_left(&mut self) {
        self.cursor = None;
    }

    pub fn set_button(&mut self, index: usize, down: bool) {
        if let Some(button) = self.buttons.get_mut(index) {
            *button = down;
        }
    }

    pub fn scroll(&mut self, lines: f32) {
        self.wheel.scroll(lines);
    }

    pub fn set_key(&mut self, key: Key, down: bool) {
        if down {
            self.keys_down.insert(key);
        } else {
            self.keys_down.remove(&key);
        }
    }

    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    pub fn type_character(&mut self, c: char) {
        if !c.is_control() {
            self.typed.push(c);
        }
    }

    /// Releases everything that is held, used when the window loses focus.
    pub fn release_all(&mut self) {
        self.buttons = [false; BUTTON_COUNT];
        self.keys_down.clear();
        self.modifiers = Modifiers::default();
    }

    fn pointer(&self) -> Pointer {
        match self.cursor {
            Some([x, y])
                if x >= 0.0 && y >= 0.0 && x < self.client_size[0] && y < self.client_size[1] =>
            {
                Pointer::Inside([x, y])
            }
            _ => Pointer::Outside,
        }
    }

    /// Takes the snapshot for the next frame. Consumes the typed characters and the
    /// wheel movement.
    pub fn snapshot(&mut self) -> InputSnapshot {
        InputSnapshot {
            pointer: self.pointer(),
            buttons: self.buttons,
            wheel_delta: self.wheel.take_delta(),
            keys_down: self.keys_down.clone(),
            modifiers: self.modifiers,
            typed: std::mem::take(&mut self.typed),
        }
    }

    /// Updates the state from a window event.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f32>(self.scale_factor);
                self.cursor_moved([logical.x, logical.y]);
            }
            WindowEvent::CursorLeft { .. } => self.cursor_left(),
            WindowEvent::MouseInput { state, button, .. } => {
                let index = match button {
                    MouseButton::Left => 0,
                    MouseButton::Right => 1,
                    MouseButton::Middle => 2,
                    MouseButton::Back => 3,
                    MouseButton::Forward => 4,
                    MouseButton::Other(_) => return,
                };
                self.set_button(index, *state == ElementState::Pressed);
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(_, lines) => self.scroll(*lines),
                MouseScrollDelta::PixelDelta(pos) => {
                    let logical = pos.to_logical::<f32>(self.scale_factor);
                    self.scroll(logical.y / PIXELS_PER_WHEEL_LINE);
                }
            },
            WindowEvent::ModifiersChanged(modifiers) => {
                let state = modifiers.state();
                self.set_modifiers(Modifiers {
                    ctrl: state.control_key(),
                    shift: state.shift_key(),
                    alt: state.alt_key(),
                    logo: state.super_key(),
                });
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state == ElementState::Pressed;
                if let PhysicalKey::Code(code) = event.physical_key {
                    if let Some(key) = Key::from_key_code(code) {
                        self.set_key(key, pressed);
                    }
                }
                if pressed {
                    if let Some(text) = &event.text {
                        for c in text.chars() {
                            self.type_character(c);
                        }
                    }
                }
            }
            WindowEvent::Focused(false) => self.release_all(),
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> InputState {
        InputState::new([960.0, 540.0], 1.0)
    }

    #[test]
    fn pointer_is_outside_until_the_cursor_moves_in() {
        let mut input = state();
        assert_eq!(input.snapshot().pointer, Pointer::Outside);

        input.cursor_moved([10.0, 20.0]);
        assert_eq!(input.snapshot().pointer, Pointer::Inside([10.0, 20.0]));
    }

    #[test]
    fn pointer_outside_client_bounds_uses_sentinel() {
        let mut input = state();
        for pos in [[-1.0, 10.0], [10.0, -0.5], [960.0, 10.0], [10.0, 540.0], [2000.0, 2000.0]] {
            input.cursor_moved(pos);
            let snapshot = input.snapshot();
            assert_eq!(snapshot.pointer, Pointer::Outside, "{:?}", pos);
            assert_eq!(snapshot.pointer.position(), Pointer::OUTSIDE_POSITION);
        }

        input.cursor_moved([959.0, 539.0]);
        assert_eq!(input.snapshot().pointer, Pointer::Inside([959.0, 539.0]));

        input.cursor_left();
        assert_eq!(input.snapshot().pointer, Pointer::Outside);
    }

    #[test]
    fn resize_changes_the_bounds() {
        let mut input = state();
        input.cursor_moved([1000.0, 100.0]);
        assert_eq!(input.snapshot().pointer, Pointer::Outside);

        input.set_client_size([1280.0, 720.0]);
        assert_eq!(input.snapshot().pointer, Pointer::Inside([1000.0, 100.0]));
    }

    #[test]
    fn wheel_delta_is_relative_to_previous_frame() {
        let mut input = state();
        input.scroll(3.0);
        // the first frame never reports movement
        assert_eq!(input.snapshot().wheel_delta, 0.0);

        input.scroll(1.5);
        input.scroll(-0.5);
        assert_eq!(input.snapshot().wheel_delta, 1.0);
        assert_eq!(input.snapshot().wheel_delta, 0.0);

        input.scroll(-2.0);
        assert_eq!(input.snapshot().wheel_delta, -2.0);
    }

    #[test]
    fn wheel_tracker_matches_absolute_differences() {
        let mut wheel = WheelTracker::default();
        let mut previous = None;
        for step in [0.0, 1.0, 4.0, -2.5, 0.0] {
            wheel.scroll(step);
            let absolute = wheel.absolute();
            let delta = wheel.take_delta();
            match previous {
                Some(prev) => assert_eq!(delta, absolute - prev),
                None => assert_eq!(delta, 0.0),
            }
            previous = Some(absolute);
        }
    }

    #[test]
    fn typed_characters_are_drained_and_filtered() {
        let mut input = state();
        input.type_character('4');
        input.type_character('\u{8}');
        input.type_character('2');

        assert_eq!(input.snapshot().typed, vec!['4', '2']);
        assert!(input.snapshot().typed.is_empty());
    }

    #[test]
    fn keys_and_exit_hotkey() {
        let mut input = state();
        input.set_key(Key::F4, true);
        assert!(!input.snapshot().exit_hotkey_pressed());

        input.set_modifiers(Modifiers {
            alt: true,
            ..Modifiers::default()
        });
        let snapshot = input.snapshot();
        assert!(snapshot.is_key_down(Key::F4));
        assert!(snapshot.exit_hotkey_pressed());

        input.set_key(Key::F4, false);
        assert!(!input.snapshot().exit_hotkey_pressed());
    }

    #[test]
    fn buttons_and_focus_loss() {
        let mut input = state();
        input.set_button(0, true);
        input.set_button(2, true);
        input.set_button(9, true);
        input.set_key(Key::A, true);
        assert_eq!(input.snapshot().buttons, [true, false, true, false, false]);

        input.release_all();
        let snapshot = input.snapshot();
        assert_eq!(snapshot.buttons, [false; BUTTON_COUNT]);
        assert!(snapshot.keys_down.is_empty());
    }

    #[test]
    fn key_code_table() {
        assert_eq!(Key::from_key_code(KeyCode::ArrowLeft), Some(Key::LeftArrow));
        assert_eq!(Key::from_key_code(KeyCode::NumpadEnter), Some(Key::Enter));
        assert_eq!(Key::from_key_code(KeyCode::KeyZ), Some(Key::Z));
        assert_eq!(Key::from_key_code(KeyCode::KeyQ), None);
    }

    /// Applies `snapshot` and runs one imgui frame. Returns the mouse position, the
    /// wheel and the left button as imgui sees them.
    fn imgui_frame(
        imgui: &mut imgui::Context,
        snapshot: &InputSnapshot,
        previous: &InputSnapshot,
    ) -> ([f32; 2], f32, bool) {
        snapshot.apply_to_io(previous, imgui.io_mut());
        imgui.new_frame();
        // the wheel is cleared again when the frame ends
        let io = imgui.io();
        let seen = (io.mouse_pos, io.mouse_wheel, io.mouse_down[0]);
        imgui.render();
        seen
    }

    #[test]
    fn snapshots_drive_imgui_io() {
        crate::utils::with_imgui(|imgui| {
            let outside = InputSnapshot::default();
            let inside = InputSnapshot {
                pointer: Pointer::Inside([10.0, 20.0]),
                ..InputSnapshot::default()
            };
            let scrolled = InputSnapshot {
                wheel_delta: 2.0,
                ..inside.clone()
            };
            let pressed = InputSnapshot {
                buttons: [true, false, false, false, false],
                ..inside.clone()
            };

            let (pos, wheel, _) = imgui_frame(imgui, &outside, &outside);
            assert_eq!(pos, Pointer::OUTSIDE_POSITION);
            assert_eq!(wheel, 0.0);

            let (pos, _, _) = imgui_frame(imgui, &inside, &outside);
            assert_eq!(pos, [10.0, 20.0]);

            let (pos, wheel, _) = imgui_frame(imgui, &scrolled, &inside);
            assert_eq!(pos, [10.0, 20.0]);
            assert_eq!(wheel, 2.0);

            // a still wheel is not forwarded
            let (_, wheel, _) = imgui_frame(imgui, &inside, &scrolled);
            assert_eq!(wheel, 0.0);

            let (_, _, down) = imgui_frame(imgui, &pressed, &inside);
            assert!(down);
            let (_, _, down) = imgui_frame(imgui, &pressed, &pressed);
            assert!(down);
            let (_, _, down) = imgui_frame(imgui, &inside, &pressed);
            assert!(!down);

            let (pos, _, _) = imgui_frame(imgui, &outside, &inside);
            assert_eq!(pos, Pointer::OUTSIDE_POSITION);
        });
    }
}
