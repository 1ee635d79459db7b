use std::time::Duration;

use anyhow::Result;

use crate::controls::Control;
use crate::types::RgbFrame;

/// Where rendered frames go and where key events come from.
pub trait DisplaySurface {
    /// Shows `frame` in the window called `name`, creating it on first use.
    fn show(&mut self, name: &str, frame: &RgbFrame) -> Result<()>;
    /// Waits at most `timeout` for one bound key. A closed window reads as
    /// `Control::Quit`.
    fn poll_key(&mut self, timeout: Duration) -> Option<Control>;
}

#[cfg(feature = "window")]
pub use window::{Screen, WindowDisplay, WindowOutput};

#[cfg(feature = "window")]
mod window {
    use std::thread;
    use std::time::Duration;

    use anyhow::Result;
    use minifb::{Key, KeyRepeat};
    use tracing::debug;

    use super::DisplaySurface;
    use crate::controls::Control;
    use crate::types::RgbFrame;

    /// One native window. `present` is the only call that pumps window
    /// events, so key state is read once per presented frame.
    pub trait Screen: Sized {
        fn open(title: &str, width: usize, height: usize) -> Result<Self>;
        fn present(&mut self, frame: &RgbFrame) -> Result<()>;
        fn is_open(&self) -> bool;
        /// Keys that went down during the last `present`.
        fn keys_pressed(&self) -> Vec<Key>;
    }

    pub struct WindowOutput {
        window: minifb::Window,
        buffer: Vec<u32>,
        width: usize,
        height: usize,
    }

    impl Screen for WindowOutput {
        fn open(title: &str, width: usize, height: usize) -> Result<Self> {
            let mut window = minifb::Window::new(
                title,
                width,
                height,
                minifb::WindowOptions {
                    resize: true,
                    ..minifb::WindowOptions::default()
                },
            )
            .map_err(|e| anyhow::anyhow!("Failed to create window: {}", e))?;

            // Pacing comes from the key poll.
            window.limit_update_rate(None);

            Ok(Self {
                window,
                buffer: vec![0; width * height],
                width,
                height,
            })
        }

        fn present(&mut self, frame: &RgbFrame) -> Result<()> {
            self.width = frame.width() as usize;
            self.height = frame.height() as usize;
            self.buffer.resize(self.width * self.height, 0);

            for (dst, p) in self.buffer.iter_mut().zip(frame.pixels()) {
                *dst = ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32;
            }

            self.window
                .update_with_buffer(&self.buffer, self.width, self.height)
                .map_err(|e| anyhow::anyhow!("Window update failed: {}", e))
        }

        fn is_open(&self) -> bool {
            self.window.is_open()
        }

        fn keys_pressed(&self) -> Vec<Key> {
            self.window.get_keys_pressed(KeyRepeat::No)
        }
    }

    /// One window per name, in creation order. Windows open lazily on the
    /// first `show`.
    pub struct WindowDisplay<S: Screen = WindowOutput> {
        windows: Vec<(String, S)>,
    }

    impl WindowDisplay {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl<S: Screen> Default for WindowDisplay<S> {
        fn default() -> Self {
            Self { windows: Vec::new() }
        }
    }

    impl<S: Screen> DisplaySurface for WindowDisplay<S> {
        fn show(&mut self, name: &str, frame: &RgbFrame) -> Result<()> {
            let index = match self.windows.iter().position(|(n, _)| n == name) {
                Some(i) => i,
                None => {
                    debug!(name, width = frame.width(), height = frame.height(), "opening window");
                    let screen = S::open(name, frame.width() as usize, frame.height() as usize)?;
                    self.windows.push((name.to_string(), screen));
                    self.windows.len() - 1
                }
            };
            self.windows[index].1.present(frame)
        }

        fn poll_key(&mut self, timeout: Duration) -> Option<Control> {
            if self.windows.iter().any(|(_, s)| !s.is_open()) {
                return Some(Control::Quit);
            }
            let control = self
                .windows
                .iter()
                .flat_map(|(_, s)| s.keys_pressed())
                .find_map(control_for);
            thread::sleep(timeout);
            control
        }
    }

    fn control_for(key: Key) -> Option<Control> {
        match key {
            Key::Q | Key::Escape => Some(Control::Quit),
            Key::S => Some(Control::Save),
            Key::Equal | Key::NumPadPlus => Some(Control::MoreSensitive),
            Key::Minus | Key::NumPadMinus => Some(Control::LessSensitive),
            Key::LeftBracket => Some(Control::Thinner),
            Key::RightBracket => Some(Control::Thicker),
            Key::Comma => Some(Control::SmallerBackground),
            Key::Period => Some(Control::LargerBackground),
            _ => None,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn keys_map_like_characters() {
            let pairs = [
                (Key::Q, 'q'),
                (Key::S, 's'),
                (Key::Equal, '='),
                (Key::Minus, '-'),
                (Key::LeftBracket, '['),
                (Key::RightBracket, ']'),
                (Key::Comma, ','),
                (Key::Period, '.'),
            ];
            for (key, c) in pairs {
                assert_eq!(control_for(key), Control::from_char(c));
            }
            assert_eq!(control_for(Key::Escape), Some(Control::Quit));
            assert_eq!(control_for(Key::A), None);
        }

        /// Keys typed since the last present become visible on the next one.
        struct FakeScreen {
            open: bool,
            typed: Vec<Key>,
            pressed: Vec<Key>,
            presents: usize,
        }

        impl Screen for FakeScreen {
            fn open(_title: &str, _width: usize, _height: usize) -> Result<Self> {
                Ok(Self {
                    open: true,
                    typed: Vec::new(),
                    pressed: Vec::new(),
                    presents: 0,
                })
            }

            fn present(&mut self, _frame: &RgbFrame) -> Result<()> {
                self.presents += 1;
                self.pressed = std::mem::take(&mut self.typed);
                Ok(())
            }

            fn is_open(&self) -> bool {
                self.open
            }

            fn keys_pressed(&self) -> Vec<Key> {
                self.pressed.clone()
            }
        }

        fn frame() -> RgbFrame {
            RgbFrame::new(4, 3)
        }

        #[test]
        fn key_typed_between_frames_is_delivered_once() {
            let mut display = WindowDisplay::<FakeScreen>::default();
            display.show("overlay", &frame()).unwrap();
            display.windows[0].1.typed.push(Key::S);

            display.show("overlay", &frame()).unwrap();
            assert_eq!(display.poll_key(Duration::ZERO), Some(Control::Save));
            assert_eq!(display.windows[0].1.presents, 2);

            display.show("overlay", &frame()).unwrap();
            assert_eq!(display.poll_key(Duration::ZERO), None);
        }

        #[test]
        fn first_bound_key_across_windows_wins() {
            let mut display = WindowDisplay::<FakeScreen>::default();
            display.show("overlay", &frame()).unwrap();
            display.show("edges", &frame()).unwrap();
            display.windows[0].1.typed.extend([Key::A, Key::RightBracket]);
            display.windows[1].1.typed.push(Key::S);

            display.show("overlay", &frame()).unwrap();
            display.show("edges", &frame()).unwrap();
            assert_eq!(display.poll_key(Duration::ZERO), Some(Control::Thicker));
        }

        #[test]
        fn closed_window_reads_as_quit() {
            let mut display = WindowDisplay::<FakeScreen>::default();
            display.show("overlay", &frame()).unwrap();
            display.windows[0].1.open = false;
            assert_eq!(display.poll_key(Duration::ZERO), Some(Control::Quit));
        }
    }
}
