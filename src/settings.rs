//! 应用设置读取。
//!
//! 快捷键子系统不拥有设置文件，只在启动时读取应用写入的
//! `settings.json`（位于应用数据目录），从中取出 `hotkey*` 配置项。

use std::fs;
use std::path::Path;

use crate::error::AppError;

/// 读取设置文件；文件不存在时返回 `Ok(None)`。
pub fn read_settings_file(path: &Path) -> Result<Option<serde_json::Value>, AppError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let parsed = serde_json::from_str::<serde_json::Value>(&content)
        .map_err(|e| AppError::Storage(format!("解析设置文件失败: {}", e)))?;

    Ok(Some(parsed))
}

/// 读取应用数据目录下的 `settings.json`。
#[cfg(feature = "desktop")]
pub fn load_settings<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
) -> Result<Option<serde_json::Value>, AppError> {
    use tauri::Manager;

    let app_data_dir = app
        .path()
        .app_data_dir()
        .map_err(|e| AppError::Storage(format!("获取应用数据目录失败: {}", e)))?;

    read_settings_file(&app_data_dir.join("settings.json"))
}
