//! # ClipFlow 原生快捷键层：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  前端 (剪贴板管理器 UI)                   │
//! │   invoke("plugin:clip-flow-hotkeys|register_hotkey")     │
//! │   listen("hotkey-pressed")                               │
//! └───────┬──────────────────────────────────────▲───────────┘
//!         ↕ Tauri IPC (Result<T, AppError>)      │ 主线程事件
//! ┌───────┼──────────────────────────────────────┼───────────┐
//! │       ↕            后端 (Rust)               │           │
//! │                                                          │
//! │  plugin ─── commands ─── HotkeyService                   │
//! │                            │                             │
//! │     ┌──────────────────────┼───────────────────────┐     │
//! │     │ combo   oracle   registry   registrar        │     │
//! │     │ foreground   policy   dispatcher             │     │
//! │     └──────────────────────┬───────────────────────┘     │
//! │                            ↕                             │
//! │  platform ── 全局快捷键插件 · rdev 监听 · NSWorkspace     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，所有命令的返回类型 |
//! | [`hotkey`] | 快捷键解析、保留判定、注册表、双通道注册、事件分发 |
//! | [`platform`] | 特权 / 回退通道与前台应用探针的平台实现 |
//! | [`settings`] | 读取应用 `settings.json` 中的快捷键配置 |
//! | `plugin` | Tauri 插件装配（feature `desktop`） |

pub mod error;
pub mod hotkey;
pub mod platform;
pub mod settings;

#[cfg(feature = "desktop")]
pub mod plugin;
