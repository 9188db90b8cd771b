//! # 全局快捷键子系统
//!
//! ```text
//! 字符串 ──combo──▶ KeyCombo ──registry──▶ oracle（保留组合拒绝）
//!                                   │
//!                                   └──registrar──▶ 特权注册 / 被动监听
//!
//! 平台回调 ──RawKeyEvent──▶ dispatcher ──▶ foreground + policy（抑制）
//!                                 │
//!                                 └──▶ registry 快照匹配 + 防抖 ──▶ HotkeyPressed
//! ```
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`combo`] | 快捷键字符串解析与规范渲染 |
//! | [`oracle`] | 系统保留快捷键判定（带有效期缓存） |
//! | [`foreground`] | 前台应用跟踪与分类、开发者模式 |
//! | [`policy`] | 应用感知抑制名单 |
//! | [`registry`] | 动作 → 登记记录，写时复制快照 |
//! | [`registrar`] | 特权优先、被动监听回退的双通道注册 |
//! | [`dispatcher`] | 原始事件 → 动作通知 |
//! | [`service`] | 对外命令与分发线程 |

pub mod clock;
pub mod combo;
pub mod config;
pub mod dispatcher;
pub mod foreground;
pub mod oracle;
pub mod policy;
pub mod registrar;
pub mod registry;
pub mod service;

#[cfg(feature = "desktop")]
pub mod commands;

/// 平台与探针的假实现，单元测试和 `tests/` 共用（feature `test-support`）。
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use combo::{KeyCombo, Modifiers, ParseError};
pub use config::HotkeyConfig;
pub use dispatcher::{
    DispatchOutcome, EventOrigin, HotkeyPressed, RawKeyEvent, SuppressReason,
};
pub use foreground::{AppCategory, AppIdentity, ForegroundAppProbe, ForegroundAppState, ProbeError};
pub use oracle::{CuratedShortcuts, ReservedShortcutSource, ShortcutSourceError};
pub use policy::{SuppressionPolicy, SuppressionVerdict};
pub use registrar::{
    BackendError, HotkeyId, KeyEventMonitor, Mechanism, MechanismKind, PrivilegedHotkeyBackend,
};
pub use registry::{RegisterError, RegistrationSummary};
pub use service::{
    key_event_channel, CurrentAppInfo, HotkeyDeps, HotkeyService, HotkeyStats, KeyEventReceiver,
    KeyEventSender, SUPPORTED_ACTIONS,
};
