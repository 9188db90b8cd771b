//! # 回退通道：rdev 被动按键监听
//!
//! ## 设计思路
//!
//! 特权注册失败时，通过进程级的被动监听观察所有按键，
//! 再由分发器按组合匹配。监听器全进程只有一个。
//!
//! ## 实现思路
//!
//! - `rdev::listen` 会阻塞所在线程且无法从外部结束，因此监听线程只启动一次，
//!   `stop()` 只关闭转发开关，再次 `start()` 时重新打开。
//! - 修饰键状态与“已按住的主键”在回调内自行跟踪：
//!   同一主键未松开时再次按下视为重复。
//! - 启动后等待一小段时间，若监听在此期间返回错误（如缺少辅助功能权限），
//!   视为启动失败。

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use rdev::{Event, EventType, Key};

use crate::hotkey::dispatcher::flags;
use crate::hotkey::{combo::key_code_for, BackendError, KeyEventMonitor, KeyEventSender, RawKeyEvent};

const STARTUP_GRACE: Duration = Duration::from_millis(200);

/// 左右修饰键分别记位，任意一侧按住即视为该修饰键生效。
fn modifier_side(key: Key) -> Option<u8> {
    match key {
        Key::MetaLeft => Some(1 << 0),
        Key::MetaRight => Some(1 << 1),
        Key::ControlLeft => Some(1 << 2),
        Key::ControlRight => Some(1 << 3),
        Key::Alt => Some(1 << 4),
        Key::AltGr => Some(1 << 5),
        Key::ShiftLeft => Some(1 << 6),
        Key::ShiftRight => Some(1 << 7),
        _ => None,
    }
}

/// rdev 按键 → macOS 虚拟键码。
fn mac_key_code(key: Key) -> Option<u16> {
    let name = match key {
        Key::KeyA => "a",
        Key::KeyB => "b",
        Key::KeyC => "c",
        Key::KeyD => "d",
        Key::KeyE => "e",
        Key::KeyF => "f",
        Key::KeyG => "g",
        Key::KeyH => "h",
        Key::KeyI => "i",
        Key::KeyJ => "j",
        Key::KeyK => "k",
        Key::KeyL => "l",
        Key::KeyM => "m",
        Key::KeyN => "n",
        Key::KeyO => "o",
        Key::KeyP => "p",
        Key::KeyQ => "q",
        Key::KeyR => "r",
        Key::KeyS => "s",
        Key::KeyT => "t",
        Key::KeyU => "u",
        Key::KeyV => "v",
        Key::KeyW => "w",
        Key::KeyX => "x",
        Key::KeyY => "y",
        Key::KeyZ => "z",
        Key::Num0 => "0",
        Key::Num1 => "1",
        Key::Num2 => "2",
        Key::Num3 => "3",
        Key::Num4 => "4",
        Key::Num5 => "5",
        Key::Num6 => "6",
        Key::Num7 => "7",
        Key::Num8 => "8",
        Key::Num9 => "9",
        Key::Equal => "=",
        Key::Minus => "-",
        Key::RightBracket => "]",
        Key::LeftBracket => "[",
        Key::Quote => "'",
        Key::SemiColon => ";",
        Key::BackSlash => "\\",
        Key::Comma => ",",
        Key::Slash => "/",
        Key::Dot => ".",
        Key::BackQuote => "`",
        Key::Return => "enter",
        Key::Tab => "tab",
        Key::Space => "space",
        Key::Backspace => "delete",
        Key::Escape => "escape",
        Key::F1 => "f1",
        Key::F2 => "f2",
        Key::F3 => "f3",
        Key::F4 => "f4",
        Key::F5 => "f5",
        Key::F6 => "f6",
        Key::F7 => "f7",
        Key::F8 => "f8",
        Key::F9 => "f9",
        Key::F10 => "f10",
        Key::F11 => "f11",
        Key::F12 => "f12",
        // 小键盘数字使用独立键码
        Key::Kp0 => return Some(0x52),
        Key::Kp1 => return Some(0x53),
        Key::Kp2 => return Some(0x54),
        Key::Kp3 => return Some(0x55),
        Key::Kp4 => return Some(0x56),
        Key::Kp5 => return Some(0x57),
        Key::Kp6 => return Some(0x58),
        Key::Kp7 => return Some(0x59),
        Key::Kp8 => return Some(0x5B),
        Key::Kp9 => return Some(0x5C),
        _ => return None,
    };
    key_code_for(name)
}

/// 回调内的按键状态。
///
/// 系统只对最后按下的普通键自动重复，所以只记一个按住的键；
/// 按下别的键或修饰键变化时清空，漏掉的松开事件不会让该键一直被当作重复。
#[derive(Debug, Default)]
struct KeyTracker {
    sides: u8,
    caps_lock: bool,
    held: Option<u16>,
}

impl KeyTracker {
    fn flags(&self) -> u32 {
        let mut bits = 0;
        if self.sides & 0b0000_0011 != 0 {
            bits |= flags::CMD;
        }
        if self.sides & 0b0000_1100 != 0 {
            bits |= flags::CTRL;
        }
        if self.sides & 0b0011_0000 != 0 {
            bits |= flags::ALT;
        }
        if self.sides & 0b1100_0000 != 0 {
            bits |= flags::SHIFT;
        }
        if self.caps_lock {
            bits |= flags::CAPS_LOCK;
        }
        bits
    }

    fn on_event(&mut self, event_type: &EventType) -> Option<RawKeyEvent> {
        match *event_type {
            EventType::KeyPress(Key::CapsLock) => {
                self.caps_lock = !self.caps_lock;
                None
            }
            EventType::KeyPress(key) => {
                if let Some(side) = modifier_side(key) {
                    self.sides |= side;
                    self.held = None;
                    return None;
                }
                let code = mac_key_code(key)?;
                let is_repeat = self.held.replace(code) == Some(code);
                Some(RawKeyEvent::monitor(code, self.flags(), is_repeat))
            }
            EventType::KeyRelease(key) => {
                if let Some(side) = modifier_side(key) {
                    self.sides &= !side;
                    self.held = None;
                } else if mac_key_code(key).is_some_and(|code| self.held == Some(code)) {
                    self.held = None;
                }
                None
            }
            _ => None,
        }
    }
}

pub struct RdevKeyMonitor {
    events: KeyEventSender,
    active: Arc<AtomicBool>,
    listening: Arc<AtomicBool>,
}

impl RdevKeyMonitor {
    pub fn new(events: KeyEventSender) -> Self {
        Self {
            events,
            active: Arc::new(AtomicBool::new(false)),
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    fn spawn_listener(&self) -> Result<(), BackendError> {
        let events = self.events.clone();
        let active = Arc::clone(&self.active);
        let listening = Arc::clone(&self.listening);
        let (startup_tx, startup_rx) = mpsc::channel::<String>();

        thread::Builder::new()
            .name("hotkey-monitor".to_string())
            .spawn(move || {
                let tracker = RefCell::new(KeyTracker::default());
                let callback = move |event: Event| {
                    let Some(raw) = tracker.borrow_mut().on_event(&event.event_type) else {
                        return;
                    };
                    if active.load(Ordering::SeqCst) && events.send(raw).is_err() {
                        log::debug!("快捷键事件通道已关闭");
                    }
                };

                if let Err(err) = rdev::listen(callback) {
                    let message = format!("{:?}", err);
                    log::error!("❌ 被动按键监听退出: {}", message);
                    listening.store(false, Ordering::SeqCst);
                    let _ = startup_tx.send(message);
                }
            })
            .map_err(|err| BackendError::new(format!("启动监听线程失败: {}", err)))?;

        match startup_rx.recv_timeout(STARTUP_GRACE) {
            Ok(message) => Err(BackendError::new(message)),
            Err(_) => Ok(()),
        }
    }
}

impl KeyEventMonitor for RdevKeyMonitor {
    fn start(&self) -> Result<(), BackendError> {
        if !self.listening.swap(true, Ordering::SeqCst) {
            if let Err(err) = self.spawn_listener() {
                self.listening.store(false, Ordering::SeqCst);
                return Err(err);
            }
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
