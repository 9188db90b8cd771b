//! # 双通道注册器
//!
//! ## 设计思路
//!
//! 优先使用特权的系统级全局快捷键机制（应用失焦时依然触发）；
//! 特权注册因任何原因失败（资源耗尽、键码无法表达、系统拒绝）时，
//! 自动回退到进程级的被动按键监听。两条通道产出的都是 `Mechanism`，
//! 交给注册表保存为同一种登记记录。
//!
//! ## 实现思路
//!
//! - 特权注册使用进程内单调递增的 32 位 ID（从 1 开始）。
//! - 特权事件处理器在第一次特权注册成功时安装，且只安装一次。
//! - 被动监听全进程只有一个实例：首次需要时启动，注册表清空时停止。
//! - 特权失败只记录日志，不上报；只有被动监听也无法启动时才返回
//!   `PlatformFault`。

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use super::combo::KeyCombo;
use super::registry::RegisterError;

/// 特权快捷键的系统级标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HotkeyId(pub u32);

impl fmt::Display for HotkeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 特权注册成功后持有的句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivilegedHandle {
    pub id: HotkeyId,
}

/// 快捷键实际使用的投递机制。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Privileged(PrivilegedHandle),
    Fallback,
}

impl Mechanism {
    pub fn kind(&self) -> MechanismKind {
        match self {
            Self::Privileged(_) => MechanismKind::Privileged,
            Self::Fallback => MechanismKind::Fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MechanismKind {
    Privileged,
    Fallback,
}

/// 平台后端错误（特权注册失败、监听器无法安装等）。
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// 特权全局快捷键机制。
pub trait PrivilegedHotkeyBackend: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    /// 将 `id` 绑定到物理键码与修饰键；必须快速返回。
    fn register(&self, id: HotkeyId, combo: &KeyCombo) -> Result<(), BackendError>;

    fn unregister(&self, id: HotkeyId, combo: &KeyCombo) -> Result<(), BackendError>;

    /// 安装特权事件回调。注册器保证只调用一次。
    fn install_event_handler(&self) -> Result<(), BackendError>;
}

/// 进程级被动按键监听。
pub trait KeyEventMonitor: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&self) -> Result<(), BackendError>;

    fn stop(&self);
}

fn lock_flag<'a>(flag: &'a Mutex<bool>, name: &str) -> MutexGuard<'a, bool> {
    match flag.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("{}锁中毒，继续使用恢复数据", name);
            poisoned.into_inner()
        }
    }
}

/// 双通道注册器。
pub struct DualPathRegistrar {
    privileged: Arc<dyn PrivilegedHotkeyBackend>,
    monitor: Arc<dyn KeyEventMonitor>,
    next_id: AtomicU32,
    handler_installed: Mutex<bool>,
    monitor_running: Mutex<bool>,
}

impl DualPathRegistrar {
    pub fn new(
        privileged: Arc<dyn PrivilegedHotkeyBackend>,
        monitor: Arc<dyn KeyEventMonitor>,
    ) -> Self {
        Self {
            privileged,
            monitor,
            next_id: AtomicU32::new(1),
            handler_installed: Mutex::new(false),
            monitor_running: Mutex::new(false),
        }
    }

    /// 为 `combo` 获取一个投递机制：先特权，失败后回退被动监听。
    pub fn acquire(&self, combo: &KeyCombo, action: &str) -> Result<Mechanism, RegisterError> {
        match self.try_privileged(combo) {
            Ok(handle) => {
                log::info!("⌨️ 已注册特权快捷键 {} → {} ({})", combo, action, handle.id);
                return Ok(Mechanism::Privileged(handle));
            }
            Err(err) => {
                log::warn!(
                    "⚠️ 特权快捷键注册失败 {} → {}: {}，回退到被动监听",
                    combo,
                    action,
                    err
                );
            }
        }

        self.ensure_monitor_running()?;
        log::info!("⌨️ 已注册监听快捷键 {} → {}", combo, action);
        Ok(Mechanism::Fallback)
    }

    fn try_privileged(&self, combo: &KeyCombo) -> Result<PrivilegedHandle, BackendError> {
        if !self.privileged.is_available() {
            return Err(BackendError::new("特权快捷键机制不可用"));
        }

        let id = HotkeyId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.privileged.register(id, combo)?;

        if let Err(err) = self.ensure_handler_installed() {
            if let Err(rollback) = self.privileged.unregister(id, combo) {
                log::warn!("⚠️ 回滚特权快捷键 {} 失败: {}", id, rollback);
            }
            return Err(err);
        }

        Ok(PrivilegedHandle { id })
    }

    fn ensure_handler_installed(&self) -> Result<(), BackendError> {
        let mut installed = lock_flag(&self.handler_installed, "特权事件处理器状态");
        if *installed {
            return Ok(());
        }
        self.privileged.install_event_handler()?;
        *installed = true;
        log::info!("⌨️ 特权快捷键事件处理器已安装");
        Ok(())
    }

    fn ensure_monitor_running(&self) -> Result<(), RegisterError> {
        let mut running = lock_flag(&self.monitor_running, "被动监听状态");
        if *running {
            return Ok(());
        }

        if !self.monitor.is_available() {
            log::error!("❌ 被动按键监听不可用，快捷键无法投递");
            return Err(RegisterError::PlatformFault(
                "被动按键监听不可用".to_string(),
            ));
        }

        self.monitor.start().map_err(|err| {
            log::error!("❌ 被动按键监听启动失败: {}", err);
            RegisterError::PlatformFault(err.to_string())
        })?;

        *running = true;
        log::info!("👂 被动按键监听已启动");
        Ok(())
    }

    /// 释放机制占用的系统资源。被动监听本身不在这里停止。
    pub fn release(&self, mechanism: &Mechanism, combo: &KeyCombo) {
        if let Mechanism::Privileged(handle) = mechanism {
            match self.privileged.unregister(handle.id, combo) {
                Ok(()) => log::debug!("⌨️ 已释放特权快捷键 {} ({})", combo, handle.id),
                Err(err) => log::warn!("⚠️ 释放特权快捷键 {} 失败: {}", handle.id, err),
            }
        }
    }

    /// 停止被动监听（由注册表在清空时调用）。
    ///
    /// 特权事件处理器不在这里卸载，它随进程退出一并清理。
    pub fn stop_monitor(&self) {
        let mut running = lock_flag(&self.monitor_running, "被动监听状态");
        if *running {
            self.monitor.stop();
            *running = false;
            log::info!("👂 已停止被动按键监听 - 没有已注册的快捷键");
        }
    }

    pub fn monitor_running(&self) -> bool {
        *lock_flag(&self.monitor_running, "被动监听状态")
    }

    pub fn is_supported(&self) -> bool {
        self.privileged.is_available() || self.monitor.is_available()
    }
}
