//! # 快捷键配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `HotkeyConfig`：防抖窗口、前台应用轮询间隔、
//! 系统快捷键缓存有效期等。默认值与原生插件线上行为一致。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用配置。
//! - `apply_settings` 从应用设置 JSON 读取可选覆盖项，数值统一钳制到安全区间，
//!   避免前端写入极端值导致漏触发或轮询风暴。

use std::time::Duration;

pub const DEBOUNCE_DEFAULT_MS: u64 = 100;
pub const DEBOUNCE_MIN_MS: u64 = 20;
pub const DEBOUNCE_MAX_MS: u64 = 1_000;

pub const APP_CHECK_DEFAULT_MS: u64 = 1_000;
pub const APP_CHECK_MIN_MS: u64 = 100;
pub const APP_CHECK_MAX_MS: u64 = 10_000;

pub const SYSTEM_CACHE_TTL_SECS: u64 = 10;

/// 快捷键子系统配置。
#[derive(Debug, Clone, PartialEq)]
pub struct HotkeyConfig {
    /// 同一动作两次触发之间的最小间隔。
    pub debounce_interval: Duration,
    /// 前台应用快照的最小刷新间隔。
    pub app_check_interval: Duration,
    /// 系统快捷键缓存的有效期，过期后在下一次查询前同步重建。
    pub system_cache_ttl: Duration,
    /// `register_hotkey` 未显式传入时是否忽略按键重复。
    pub default_ignore_repeat: bool,
    /// 启动时的开发者模式初始值。
    pub developer_mode: bool,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            debounce_interval: Duration::from_millis(DEBOUNCE_DEFAULT_MS),
            app_check_interval: Duration::from_millis(APP_CHECK_DEFAULT_MS),
            system_cache_ttl: Duration::from_secs(SYSTEM_CACHE_TTL_SECS),
            default_ignore_repeat: true,
            developer_mode: false,
        }
    }
}

fn normalize_debounce_ms(value_ms: u64) -> u64 {
    value_ms.clamp(DEBOUNCE_MIN_MS, DEBOUNCE_MAX_MS)
}

fn normalize_app_check_ms(value_ms: u64) -> u64 {
    value_ms.clamp(APP_CHECK_MIN_MS, APP_CHECK_MAX_MS)
}

impl HotkeyConfig {
    /// 从应用设置覆盖配置项。
    ///
    /// 识别的键：`hotkeyDebounceMs`、`hotkeyAppCheckIntervalMs`、
    /// `hotkeyDeveloperMode`。缺失或类型不符的键保持原值。
    pub fn apply_settings(&mut self, settings: &serde_json::Value) {
        if let Some(ms) = settings.get("hotkeyDebounceMs").and_then(|v| v.as_u64()) {
            let normalized = normalize_debounce_ms(ms);
            self.debounce_interval = Duration::from_millis(normalized);
            log::debug!("⌨️ 快捷键防抖间隔已更新: {}ms", normalized);
        }

        if let Some(ms) = settings
            .get("hotkeyAppCheckIntervalMs")
            .and_then(|v| v.as_u64())
        {
            let normalized = normalize_app_check_ms(ms);
            self.app_check_interval = Duration::from_millis(normalized);
            log::debug!("⌨️ 前台应用检查间隔已更新: {}ms", normalized);
        }

        if let Some(enabled) = settings.get("hotkeyDeveloperMode").and_then(|v| v.as_bool()) {
            self.developer_mode = enabled;
        }
    }

    pub fn from_settings(settings: &serde_json::Value) -> Self {
        let mut config = Self::default();
        config.apply_settings(settings);
        config
    }
}
