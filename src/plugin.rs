//! # Tauri 插件装配
//!
//! 宿主应用只需 `.plugin(clip_flow_native::plugin::init())`：
//!
//! 1. 确保全局快捷键插件已加载（特权通道依赖它）
//! 2. 读取 `settings.json` 中的快捷键配置
//! 3. 构建 [`HotkeyService`] 并注册为托管状态
//! 4. 启动分发线程，把命中的动作转发到主线程发出 `hotkey-pressed` 事件
//! 5. 应用退出时释放全部快捷键

use std::sync::Arc;

use tauri::plugin::{Builder, TauriPlugin};
use tauri::{AppHandle, Emitter, Manager, RunEvent, Runtime};
use tauri_plugin_global_shortcut::GlobalShortcut;

use crate::hotkey::{self, key_event_channel, HotkeyConfig, HotkeyDeps, HotkeyService};
use crate::platform::rdev_monitor::RdevKeyMonitor;
use crate::platform::tauri_shortcut::TauriShortcutBackend;
use crate::{platform, settings};

pub const PLUGIN_NAME: &str = "clip-flow-hotkeys";

/// 前端监听的快捷键事件名，载荷为 `{ "action": "<name>" }`。
pub const HOTKEY_PRESSED_EVENT: &str = "hotkey-pressed";

fn load_config<R: Runtime>(app: &AppHandle<R>) -> HotkeyConfig {
    match settings::load_settings(app) {
        Ok(Some(settings)) => HotkeyConfig::from_settings(&settings),
        Ok(None) => HotkeyConfig::default(),
        Err(err) => {
            log::warn!("⚠️ 读取快捷键设置失败，使用默认配置: {}", err);
            HotkeyConfig::default()
        }
    }
}

fn setup<R: Runtime>(app: &AppHandle<R>) -> Result<(), Box<dyn std::error::Error>> {
    if app.try_state::<GlobalShortcut<R>>().is_none() {
        app.plugin(tauri_plugin_global_shortcut::Builder::new().build())?;
    }

    let config = load_config(app);
    let (events_tx, events_rx) = key_event_channel();
    let deps = HotkeyDeps::new(
        Arc::new(TauriShortcutBackend::new(app.clone(), events_tx.clone())),
        Arc::new(RdevKeyMonitor::new(events_tx)),
        platform::default_foreground_probe(),
    );

    let (service, mut notifications) = HotkeyService::new(config, deps);
    service.spawn_event_pump(events_rx)?;
    app.manage(service);

    let handle = app.clone();
    tauri::async_runtime::spawn(async move {
        while let Some(pressed) = notifications.recv().await {
            let emitter = handle.clone();
            let delivered = handle.run_on_main_thread(move || {
                if let Err(err) = emitter.emit(HOTKEY_PRESSED_EVENT, &pressed) {
                    log::warn!("⚠️ 发送快捷键事件失败 {}: {}", pressed.action, err);
                }
            });
            if let Err(err) = delivered {
                log::warn!("⚠️ 无法切换到主线程发送快捷键事件: {}", err);
            }
        }
    });

    log::info!("⌨️ 快捷键插件初始化完成");
    Ok(())
}

pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new(PLUGIN_NAME)
        .invoke_handler(tauri::generate_handler![
            hotkey::commands::is_hotkey_supported,
            hotkey::commands::register_hotkey,
            hotkey::commands::unregister_hotkey,
            hotkey::commands::is_system_hotkey,
            hotkey::commands::set_developer_mode,
            hotkey::commands::get_hotkey_stats,
            hotkey::commands::get_current_app,
            hotkey::commands::list_hotkeys,
        ])
        .setup(|app, _api| setup(app))
        .on_event(|app, event| {
            if let RunEvent::Exit = event {
                if let Some(service) = app.try_state::<HotkeyService>() {
                    service.shutdown();
                }
            }
        })
        .build()
}
