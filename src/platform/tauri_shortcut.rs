//! # 特权通道：Tauri 全局快捷键插件
//!
//! 通过 `tauri-plugin-global-shortcut` 向系统注册全局快捷键，
//! 应用失焦时依然触发。回调只把按下事件翻译为 [`RawKeyEvent`]
//! 送入分发通道，不在系统回调里做任何判定。

use tauri::{AppHandle, Manager, Runtime};
use tauri_plugin_global_shortcut::{
    Code, GlobalShortcut, GlobalShortcutExt, Modifiers as ShortcutModifiers, Shortcut,
    ShortcutState,
};

use crate::hotkey::{
    BackendError, HotkeyId, KeyCombo, KeyEventSender, Modifiers, PrivilegedHotkeyBackend,
    RawKeyEvent,
};

/// 规范键名 → 物理按键代码。
fn code_for_key(name: &str) -> Option<Code> {
    let code = match name {
        "a" => Code::KeyA,
        "b" => Code::KeyB,
        "c" => Code::KeyC,
        "d" => Code::KeyD,
        "e" => Code::KeyE,
        "f" => Code::KeyF,
        "g" => Code::KeyG,
        "h" => Code::KeyH,
        "i" => Code::KeyI,
        "j" => Code::KeyJ,
        "k" => Code::KeyK,
        "l" => Code::KeyL,
        "m" => Code::KeyM,
        "n" => Code::KeyN,
        "o" => Code::KeyO,
        "p" => Code::KeyP,
        "q" => Code::KeyQ,
        "r" => Code::KeyR,
        "s" => Code::KeyS,
        "t" => Code::KeyT,
        "u" => Code::KeyU,
        "v" => Code::KeyV,
        "w" => Code::KeyW,
        "x" => Code::KeyX,
        "y" => Code::KeyY,
        "z" => Code::KeyZ,
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,
        "=" => Code::Equal,
        "-" => Code::Minus,
        "]" => Code::BracketRight,
        "[" => Code::BracketLeft,
        "'" => Code::Quote,
        ";" => Code::Semicolon,
        "\\" => Code::Backslash,
        "," => Code::Comma,
        "/" => Code::Slash,
        "." => Code::Period,
        "`" => Code::Backquote,
        "enter" => Code::Enter,
        "tab" => Code::Tab,
        "space" => Code::Space,
        "delete" => Code::Backspace,
        "escape" => Code::Escape,
        "f1" => Code::F1,
        "f2" => Code::F2,
        "f3" => Code::F3,
        "f4" => Code::F4,
        "f5" => Code::F5,
        "f6" => Code::F6,
        "f7" => Code::F7,
        "f8" => Code::F8,
        "f9" => Code::F9,
        "f10" => Code::F10,
        "f11" => Code::F11,
        "f12" => Code::F12,
        _ => return None,
    };
    Some(code)
}

fn shortcut_modifiers(modifiers: Modifiers) -> ShortcutModifiers {
    let mut mapped = ShortcutModifiers::empty();
    if modifiers.contains(Modifiers::CMD) {
        mapped |= ShortcutModifiers::SUPER;
    }
    if modifiers.contains(Modifiers::CTRL) {
        mapped |= ShortcutModifiers::CONTROL;
    }
    if modifiers.contains(Modifiers::ALT) {
        mapped |= ShortcutModifiers::ALT;
    }
    if modifiers.contains(Modifiers::SHIFT) {
        mapped |= ShortcutModifiers::SHIFT;
    }
    mapped
}

/// `KeyCombo` → 插件快捷键；键码无法表达时返回错误，注册器据此回退。
fn to_shortcut(combo: &KeyCombo) -> Result<Shortcut, BackendError> {
    let code = combo
        .key_name()
        .and_then(code_for_key)
        .ok_or_else(|| BackendError::new(format!("{} 无法映射为全局快捷键", combo)))?;

    let modifiers = if combo.modifiers.is_empty() {
        None
    } else {
        Some(shortcut_modifiers(combo.modifiers))
    };
    Ok(Shortcut::new(modifiers, code))
}

pub struct TauriShortcutBackend<R: Runtime> {
    app: AppHandle<R>,
    events: KeyEventSender,
}

impl<R: Runtime> TauriShortcutBackend<R> {
    pub fn new(app: AppHandle<R>, events: KeyEventSender) -> Self {
        Self { app, events }
    }
}

impl<R: Runtime> PrivilegedHotkeyBackend for TauriShortcutBackend<R> {
    fn is_available(&self) -> bool {
        self.app.try_state::<GlobalShortcut<R>>().is_some()
    }

    fn register(&self, id: HotkeyId, combo: &KeyCombo) -> Result<(), BackendError> {
        let shortcut = to_shortcut(combo)?;
        let events = self.events.clone();
        let combo = *combo;

        self.app
            .global_shortcut()
            .on_shortcut(shortcut, move |_app, _shortcut, event| {
                if event.state == ShortcutState::Pressed
                    && events.send(RawKeyEvent::privileged(id, &combo)).is_err()
                {
                    log::debug!("快捷键事件通道已关闭，丢弃 {}", combo);
                }
            })
            .map_err(|err| BackendError::new(err.to_string()))
    }

    fn unregister(&self, _id: HotkeyId, combo: &KeyCombo) -> Result<(), BackendError> {
        let shortcut = to_shortcut(combo)?;
        self.app
            .global_shortcut()
            .unregister(shortcut)
            .map_err(|err| BackendError::new(err.to_string()))
    }

    /// 插件为每个快捷键单独挂回调，这里只确认插件状态已就绪。
    fn install_event_handler(&self) -> Result<(), BackendError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(BackendError::new("全局快捷键插件未初始化"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::combo::known_key_names;

    #[test]
    fn every_parsable_key_maps_to_a_code() {
        for name in known_key_names() {
            assert!(code_for_key(name).is_some(), "missing code for {name}");
        }
    }

    #[test]
    fn cmd_maps_to_super() {
        let combo = KeyCombo::parse("cmd+shift+v").unwrap();
        let shortcut = to_shortcut(&combo).unwrap();
        assert_eq!(
            shortcut,
            Shortcut::new(
                Some(ShortcutModifiers::SUPER | ShortcutModifiers::SHIFT),
                Code::KeyV
            )
        );
    }

    #[test]
    fn unmapped_key_code_is_rejected() {
        let combo = KeyCombo::new(0x7F, Modifiers::CMD);
        assert!(to_shortcut(&combo).is_err());
    }
}
