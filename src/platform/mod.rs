//! # 平台后端
//!
//! | 模块 | 平台能力 |
//! |------|----------|
//! | `tauri_shortcut` | 特权通道：`tauri-plugin-global-shortcut`（feature `desktop`） |
//! | `rdev_monitor` | 回退通道：`rdev` 被动按键监听（feature `desktop`） |
//! | `macos` | `NSWorkspace` 前台应用探针 |
//! | [`null`] | 其他平台的空探针 |

use std::sync::Arc;

use crate::hotkey::ForegroundAppProbe;

#[cfg(target_os = "macos")]
pub mod macos;
pub mod null;

#[cfg(feature = "desktop")]
pub mod rdev_monitor;
#[cfg(feature = "desktop")]
pub mod tauri_shortcut;

/// 当前平台的前台应用探针。
pub fn default_foreground_probe() -> Arc<dyn ForegroundAppProbe> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(macos::WorkspaceProbe)
    }

    #[cfg(not(target_os = "macos"))]
    {
        Arc::new(null::NullForegroundProbe)
    }
}
