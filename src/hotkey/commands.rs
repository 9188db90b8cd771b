//! # Tauri 命令层
//!
//! 命令层仅做 IPC 参数接收与结果返回，不承载业务逻辑，
//! 所有处理交由托管状态 [`HotkeyService`]。

use tauri::State;

use crate::error::AppError;

use super::registry::RegistrationSummary;
use super::service::{CurrentAppInfo, HotkeyService, HotkeyStats};

#[tauri::command]
pub fn is_hotkey_supported(state: State<'_, HotkeyService>) -> bool {
    state.is_hotkey_supported()
}

/// 注册（或替换）一个动作的全局快捷键。
#[tauri::command]
pub fn register_hotkey(
    state: State<'_, HotkeyService>,
    action: String,
    key: String,
    ignore_repeat: Option<bool>,
) -> Result<bool, AppError> {
    state.register_hotkey(&action, &key, ignore_repeat)
}

#[tauri::command]
pub fn unregister_hotkey(state: State<'_, HotkeyService>, action: String) -> Result<bool, AppError> {
    state.unregister_hotkey(&action)
}

#[tauri::command]
pub fn is_system_hotkey(state: State<'_, HotkeyService>, key: String) -> Result<bool, AppError> {
    state.is_system_hotkey(&key)
}

#[tauri::command]
pub fn set_developer_mode(state: State<'_, HotkeyService>, enabled: bool) -> bool {
    state.set_developer_mode(enabled)
}

#[tauri::command]
pub fn get_hotkey_stats(state: State<'_, HotkeyService>) -> HotkeyStats {
    state.hotkey_stats()
}

#[tauri::command]
pub fn get_current_app(state: State<'_, HotkeyService>) -> CurrentAppInfo {
    state.current_app()
}

#[tauri::command]
pub fn list_hotkeys(state: State<'_, HotkeyService>) -> Vec<RegistrationSummary> {
    state.list_hotkeys()
}
