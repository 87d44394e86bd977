// Global key observation backed by rdev
//
// rdev only offers a blocking `listen` that never returns, so one background
// thread feeds a shared pressed-key set and the bound callbacks. `release`
// detaches the callbacks; the OS hook itself lives until process exit.
use super::error::{PlatformError, PlatformResult};
use super::types::{HotkeyCallback, HotkeyListener};
use rdev::{EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct ListenerState {
    pressed: Vec<Key>,
    bindings: Vec<(Key, HotkeyCallback)>,
}

pub struct RdevHotkeys {
    state: Arc<Mutex<ListenerState>>,
    started: AtomicBool,
}

impl RdevHotkeys {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ListenerState::default())),
            started: AtomicBool::new(false),
        }
    }

    fn ensure_listener(&self) -> PlatformResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let state = Arc::clone(&self.state);
        std::thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    let Ok(mut guard) = state.lock() else {
                        return;
                    };
                    match event.event_type {
                        EventType::KeyPress(key) => {
                            // Key repeat re-sends KeyPress; only fire on the first one
                            if !guard.pressed.contains(&key) {
                                guard.pressed.push(key);
                                for (bound, callback) in &guard.bindings {
                                    if *bound == key {
                                        callback();
                                    }
                                }
                            }
                        }
                        EventType::KeyRelease(key) => {
                            guard.pressed.retain(|k| *k != key);
                        }
                        _ => {}
                    }
                });
                if let Err(e) = result {
                    log::error!("❌ Global key listener stopped: {:?}", e);
                }
            })
            .map_err(|e| PlatformError::ListenerFailed {
                description: e.to_string(),
            })?;
        Ok(())
    }
}

impl Default for RdevHotkeys {
    fn default() -> Self {
        Self::new()
    }
}

impl HotkeyListener for RdevHotkeys {
    fn bind(&mut self, key: &str, callback: HotkeyCallback) -> PlatformResult<()> {
        let parsed = parse_key(key)?;
        self.ensure_listener()?;
        if let Ok(mut guard) = self.state.lock() {
            guard.bindings.push((parsed, callback));
        }
        log::debug!("⌨️ Hotkey '{}' bound", key);
        Ok(())
    }

    fn is_pressed(&self, key: &str) -> bool {
        let Ok(parsed) = parse_key(key) else {
            return false;
        };
        self.state
            .lock()
            .map(|guard| guard.pressed.contains(&parsed))
            .unwrap_or(false)
    }

    fn release(&mut self) {
        if let Ok(mut guard) = self.state.lock() {
            guard.bindings.clear();
        }
        log::debug!("⌨️ Hotkey bindings released");
    }
}

/// Map a key name such as `q`, `esc` or `f8` to an rdev key.
pub fn parse_key(name: &str) -> PlatformResult<Key> {
    let lower = name.trim().to_lowercase();
    let key = match lower.as_str() {
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "pause" => Key::Pause,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        single if single.chars().count() == 1 => {
            let c = single.chars().next().unwrap_or_default();
            letter_or_digit(c).ok_or_else(|| PlatformError::UnknownKey {
                key: name.to_string(),
            })?
        }
        _ => {
            return Err(PlatformError::UnknownKey {
                key: name.to_string(),
            });
        }
    };
    Ok(key)
}

fn letter_or_digit(c: char) -> Option<Key> {
    const LETTERS: [Key; 26] = [
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
        Key::KeyG,
        Key::KeyH,
        Key::KeyI,
        Key::KeyJ,
        Key::KeyK,
        Key::KeyL,
        Key::KeyM,
        Key::KeyN,
        Key::KeyO,
        Key::KeyP,
        Key::KeyQ,
        Key::KeyR,
        Key::KeyS,
        Key::KeyT,
        Key::KeyU,
        Key::KeyV,
        Key::KeyW,
        Key::KeyX,
        Key::KeyY,
        Key::KeyZ,
    ];
    const DIGITS: [Key; 10] = [
        Key::Num0,
        Key::Num1,
        Key::Num2,
        Key::Num3,
        Key::Num4,
        Key::Num5,
        Key::Num6,
        Key::Num7,
        Key::Num8,
        Key::Num9,
    ];
    match c {
        'a'..='z' => Some(LETTERS[(c as u8 - b'a') as usize]),
        '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
        _ => None,
    }
}
