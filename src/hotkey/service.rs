//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! `HotkeyService` 在启动时构建一次，由插件注册为 Tauri 托管状态，
//! 替代散落的全局单例。平台能力（特权注册、被动监听、前台应用探针、
//! 保留清单、时钟）全部通过 [`HotkeyDeps`] 注入，测试可以不依赖任何系统钩子。
//!
//! ## 实现思路
//!
//! 对外暴露与前端约定的入站命令：
//! - `is_hotkey_supported` / `register_hotkey` / `unregister_hotkey`
//! - `is_system_hotkey` / `set_developer_mode` / `hotkey_stats`
//! - `current_app` / `list_hotkeys`（诊断用）
//!
//! 平台回调把 [`RawKeyEvent`] 送入单消费者通道，`hotkey-dispatch` 线程
//! 逐个分发；命中的动作写入 tokio 无界通道，由插件转发到主线程。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::error::AppError;

use super::clock::{Clock, SystemClock};
use super::combo::KeyCombo;
use super::config::HotkeyConfig;
use super::dispatcher::{DispatchOutcome, EventDispatcher, HotkeyPressed, RawKeyEvent};
use super::foreground::{
    is_design_app, is_development_app, ForegroundAppProbe, ForegroundAppTracker,
};
use super::oracle::{CuratedShortcuts, ReservedShortcutSource, SystemShortcutOracle};
use super::policy::SuppressionPolicy;
use super::registrar::{DualPathRegistrar, KeyEventMonitor, PrivilegedHotkeyBackend};
use super::registry::{HotkeyRegistry, RegistrationSummary};

/// 应用内置的全部快捷键动作。
pub const SUPPORTED_ACTIONS: &[&str] = &[
    "toggleWindow",
    "quickPaste",
    "showHistory",
    "clearHistory",
    "search",
    "performOCR",
    "toggleMonitoring",
];

pub type KeyEventSender = mpsc::Sender<RawKeyEvent>;
pub type KeyEventReceiver = mpsc::Receiver<RawKeyEvent>;

/// 平台回调 → 分发线程的事件通道。
pub fn key_event_channel() -> (KeyEventSender, KeyEventReceiver) {
    mpsc::channel()
}

/// 注入的平台能力。
pub struct HotkeyDeps {
    pub privileged: Arc<dyn PrivilegedHotkeyBackend>,
    pub monitor: Arc<dyn KeyEventMonitor>,
    pub probe: Arc<dyn ForegroundAppProbe>,
    pub reserved: Arc<dyn ReservedShortcutSource>,
    pub clock: Arc<dyn Clock>,
}

impl HotkeyDeps {
    /// 使用内置保留清单与系统时钟。
    pub fn new(
        privileged: Arc<dyn PrivilegedHotkeyBackend>,
        monitor: Arc<dyn KeyEventMonitor>,
        probe: Arc<dyn ForegroundAppProbe>,
    ) -> Self {
        Self {
            privileged,
            monitor,
            probe,
            reserved: Arc::new(CuratedShortcuts),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_reserved_source(mut self, reserved: Arc<dyn ReservedShortcutSource>) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// `get_hotkey_stats` 返回值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotkeyStats {
    pub registered_count: usize,
    pub system_shortcut_count: usize,
    pub developer_mode: bool,
    pub current_foreground_app: String,
    pub debounce_interval_ms: u64,
    pub app_check_interval_ms: u64,
    pub privileged_count: usize,
    pub fallback_count: usize,
    pub supported_actions: Vec<String>,
}

/// `get_current_app` 返回值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentAppInfo {
    pub bundle_id: String,
    pub app_name: String,
    /// `development` / `design` / `system` / `general`，无前台应用时为 `unknown`
    pub app_type: String,
    pub developer_mode: bool,
    pub is_development_app: bool,
    pub is_design_app: bool,
}

fn require_non_empty(name: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidArgument(format!("{} 不能为空", name)));
    }
    Ok(())
}

pub struct HotkeyService {
    config: HotkeyConfig,
    oracle: Arc<SystemShortcutOracle>,
    tracker: Arc<ForegroundAppTracker>,
    registrar: Arc<DualPathRegistrar>,
    registry: Arc<HotkeyRegistry>,
    dispatcher: Arc<EventDispatcher>,
    pump_started: AtomicBool,
}

impl HotkeyService {
    /// 构建服务，同时返回快捷键通知的接收端。
    pub fn new(config: HotkeyConfig, deps: HotkeyDeps) -> (Self, UnboundedReceiver<HotkeyPressed>) {
        let HotkeyDeps {
            privileged,
            monitor,
            probe,
            reserved,
            clock,
        } = deps;

        let oracle = Arc::new(SystemShortcutOracle::new(
            Arc::clone(&clock),
            reserved,
            config.system_cache_ttl,
        ));
        let tracker = Arc::new(ForegroundAppTracker::new(
            probe,
            Arc::clone(&clock),
            config.app_check_interval,
            config.developer_mode,
        ));
        let registrar = Arc::new(DualPathRegistrar::new(privileged, monitor));
        let registry = Arc::new(HotkeyRegistry::new(
            Arc::clone(&oracle),
            Arc::clone(&registrar),
            Arc::clone(&clock),
        ));

        let (sender, receiver) = unbounded_channel();
        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&tracker),
            SuppressionPolicy::default(),
            clock,
            config.debounce_interval,
            sender,
        ));

        log::info!(
            "⌨️ 快捷键服务已初始化（防抖 {:?}，前台检查 {:?}）",
            config.debounce_interval,
            config.app_check_interval
        );

        let service = Self {
            config,
            oracle,
            tracker,
            registrar,
            registry,
            dispatcher,
            pump_started: AtomicBool::new(false),
        };
        (service, receiver)
    }

    pub fn config(&self) -> &HotkeyConfig {
        &self.config
    }

    pub fn is_hotkey_supported(&self) -> bool {
        self.registrar.is_supported()
    }

    /// 注册（或替换）快捷键。`ignore_repeat` 缺省取配置值。
    pub fn register_hotkey(
        &self,
        action: &str,
        key: &str,
        ignore_repeat: Option<bool>,
    ) -> Result<bool, AppError> {
        require_non_empty("action", action)?;
        require_non_empty("key", key)?;

        let combo = KeyCombo::parse(key)?;
        let ignore_repeat = ignore_repeat.unwrap_or(self.config.default_ignore_repeat);
        self.registry.register(action, combo, ignore_repeat)?;
        Ok(true)
    }

    pub fn unregister_hotkey(&self, action: &str) -> Result<bool, AppError> {
        require_non_empty("action", action)?;
        Ok(self.registry.unregister(action))
    }

    /// 判断组合是否为系统保留快捷键；无法解析时返回 `INVALID_KEY_COMBO`。
    pub fn is_system_hotkey(&self, key: &str) -> Result<bool, AppError> {
        require_non_empty("key", key)?;
        let combo = KeyCombo::parse(key)?;
        Ok(self.oracle.is_reserved(&combo))
    }

    pub fn set_developer_mode(&self, enabled: bool) -> bool {
        self.tracker.set_developer_mode(enabled);
        true
    }

    pub fn hotkey_stats(&self) -> HotkeyStats {
        let (privileged_count, fallback_count) = self.registry.mechanism_counts();
        HotkeyStats {
            registered_count: self.registry.len(),
            system_shortcut_count: self.oracle.entry_count(),
            developer_mode: self.tracker.developer_mode(),
            current_foreground_app: self.tracker.current().bundle_identifier,
            debounce_interval_ms: self.config.debounce_interval.as_millis() as u64,
            app_check_interval_ms: self.config.app_check_interval.as_millis() as u64,
            privileged_count,
            fallback_count,
            supported_actions: SUPPORTED_ACTIONS.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn current_app(&self) -> CurrentAppInfo {
        let state = self.tracker.current();
        let app_type = if state.is_known() {
            state.classification.as_str()
        } else {
            "unknown"
        };

        CurrentAppInfo {
            is_development_app: is_development_app(&state.bundle_identifier),
            is_design_app: is_design_app(&state.bundle_identifier),
            app_type: app_type.to_string(),
            developer_mode: state.developer_mode_enabled,
            bundle_id: state.bundle_identifier,
            app_name: state.app_name,
        }
    }

    pub fn list_hotkeys(&self) -> Vec<RegistrationSummary> {
        self.registry.list()
    }

    /// 同步分发一个事件（分发线程与测试共用）。
    pub fn dispatch(&self, event: RawKeyEvent) -> DispatchOutcome {
        self.dispatcher.dispatch(event)
    }

    /// 启动 `hotkey-dispatch` 线程。所有发送端关闭后线程自然退出。
    pub fn spawn_event_pump(&self, events: KeyEventReceiver) -> Result<(), AppError> {
        if self.pump_started.swap(true, Ordering::SeqCst) {
            log::warn!("⚠️ 快捷键分发线程已在运行，忽略重复启动");
            return Ok(());
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let spawned = thread::Builder::new()
            .name("hotkey-dispatch".to_string())
            .spawn(move || {
                for event in events {
                    dispatcher.dispatch(event);
                }
                log::debug!("⌨️ 快捷键事件通道已关闭，分发线程退出");
            });

        if let Err(err) = spawned {
            self.pump_started.store(false, Ordering::SeqCst);
            return Err(AppError::PlatformFault(format!("启动快捷键分发线程失败: {}", err)));
        }
        Ok(())
    }

    /// 子系统拆除：释放全部快捷键并停止被动监听。
    pub fn shutdown(&self) {
        self.registry.clear();
        log::info!("⌨️ 快捷键服务已关闭");
    }
}
