//! # 前台应用感知模块
//!
//! ## 设计思路
//!
//! 快捷键事件热路径需要知道“当前哪个应用持有键盘焦点”，以决定是否让路给
//! 开发工具 / 设计工具自身的快捷键。查询系统前台应用有成本，
//! 因此快照按固定最小间隔刷新，间隔内直接复用。
//!
//! ## 实现思路
//!
//! - `ForegroundAppProbe` 抽象平台查询（macOS 为 `NSWorkspace`，其他平台为空实现）。
//! - `ForegroundAppTracker::current()` 只在快照过期时调用探针。
//! - 分类是应用标识对两份整理名单的纯函数；`com.apple.` 命名空间归为系统应用。
//! - 开发者模式为原子开关，切换后立即反映在 `current()` 结果中。
//! - 探针失败时降级为“未知应用”（`General`），宁可少一次抑制也不丢快捷键。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::clock::Clock;

/// 前台应用查询失败。
#[derive(Debug, thiserror::Error)]
#[error("前台应用查询失败: {0}")]
pub struct ProbeError(pub String);

/// 前台应用身份。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    /// Bundle ID（macOS）或等价的进程标识
    pub id: String,
    /// 本地化显示名称（若平台可提供）
    pub name: Option<String>,
}

/// 平台前台应用探针。
pub trait ForegroundAppProbe: Send + Sync {
    /// 返回当前持有键盘焦点的应用；无前台应用时返回 `Ok(None)`。
    fn frontmost(&self) -> Result<Option<AppIdentity>, ProbeError>;
}

/// 应用类别，驱动快捷键冲突策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppCategory {
    Development,
    Design,
    System,
    General,
}

impl AppCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Design => "design",
            Self::System => "system",
            Self::General => "general",
        }
    }
}

const DEVELOPMENT_APPS: &[&str] = &[
    "com.apple.dt.Xcode",
    "com.microsoft.VSCode",
    "com.microsoft.vscode",
    "com.visualstudio.code.oss",
    "com.jetbrains.intellij",
    "com.jetbrains.intellij.ce",
    "com.jetbrains.AppCode",
    "com.jetbrains.CLion",
    "com.jetbrains.DataGrip",
    "com.jetbrains.PyCharm",
    "com.jetbrains.Rider",
    "com.jetbrains.RubyMine",
    "com.jetbrains.WebStorm",
    "com.google.AndroidStudio",
    "com.sublimetext.3",
    "com.sublimetext.4",
    "org.vim.MacVim",
    "com.googlecode.iterm2",
    "com.apple.Terminal",
    "com.github.wez.wezterm",
    "io.alacritty",
    "com.oracle.java.jdk",
    "org.eclipse.eclipse",
    "com.noodlesoft.Panini",
];

const DESIGN_APPS: &[&str] = &[
    "com.adobe.Photoshop",
    "com.adobe.Illustrator",
    "com.adobe.AfterEffects",
    "com.adobe.PremierePro",
    "com.adobe.Indesign",
    "com.adobe.xd",
    "com.sketch.sketch",
    "com.bohemiancoding.sketch3",
    "com.figma.Desktop",
    "com.figma.agent",
    "com.seriflabs.affinitydesigner",
    "com.seriflabs.affinityphoto",
    "com.protopie.studio",
    "com.invisionlabs.Invision",
    "com.axure.axure rp",
];

const SYSTEM_NAMESPACE: &str = "com.apple.";

pub fn is_development_app(bundle_id: &str) -> bool {
    DEVELOPMENT_APPS.contains(&bundle_id)
}

pub fn is_design_app(bundle_id: &str) -> bool {
    DESIGN_APPS.contains(&bundle_id)
}

/// 应用分类。名单优先于系统命名空间（Xcode、Terminal 属于开发工具）。
pub fn classify(bundle_id: &str) -> AppCategory {
    if is_development_app(bundle_id) {
        AppCategory::Development
    } else if is_design_app(bundle_id) {
        AppCategory::Design
    } else if bundle_id.starts_with(SYSTEM_NAMESPACE) {
        AppCategory::System
    } else {
        AppCategory::General
    }
}

/// 前台应用快照。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForegroundAppState {
    /// 空字符串表示未知
    pub bundle_identifier: String,
    pub app_name: String,
    pub classification: AppCategory,
    #[serde(skip)]
    pub captured_at: Instant,
    pub developer_mode_enabled: bool,
}

impl ForegroundAppState {
    fn capture(identity: Option<AppIdentity>, captured_at: Instant) -> Self {
        let (bundle_identifier, app_name) = match identity {
            Some(AppIdentity { id, name }) => {
                let name = name.unwrap_or_else(|| id.clone());
                (id, name)
            }
            None => (String::new(), String::new()),
        };

        Self {
            classification: classify(&bundle_identifier),
            bundle_identifier,
            app_name,
            captured_at,
            developer_mode_enabled: false,
        }
    }

    pub fn is_known(&self) -> bool {
        !self.bundle_identifier.is_empty()
    }
}

/// 前台应用跟踪器（按最小间隔刷新的记忆化快照）。
pub struct ForegroundAppTracker {
    probe: Arc<dyn ForegroundAppProbe>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    developer_mode: AtomicBool,
    snapshot: Mutex<Option<ForegroundAppState>>,
}

impl ForegroundAppTracker {
    pub fn new(
        probe: Arc<dyn ForegroundAppProbe>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        developer_mode: bool,
    ) -> Self {
        Self {
            probe,
            clock,
            interval,
            developer_mode: AtomicBool::new(developer_mode),
            snapshot: Mutex::new(None),
        }
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, Option<ForegroundAppState>> {
        match self.snapshot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("前台应用快照锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    /// 当前前台应用；距上次刷新不足最小间隔时直接返回记忆快照。
    pub fn current(&self) -> ForegroundAppState {
        let now = self.clock.now();
        let mut snapshot = self.lock_snapshot();

        let stale = snapshot
            .as_ref()
            .is_none_or(|s| now.saturating_duration_since(s.captured_at) > self.interval);

        if stale {
            let identity = match self.probe.frontmost() {
                Ok(identity) => identity,
                Err(err) => {
                    log::debug!("⚠️ {}，按未知应用处理", err);
                    None
                }
            };
            *snapshot = Some(ForegroundAppState::capture(identity, now));
        }

        let mut state = match snapshot.as_ref() {
            Some(state) => state.clone(),
            None => ForegroundAppState::capture(None, now),
        };
        state.developer_mode_enabled = self.developer_mode();
        state
    }

    pub fn set_developer_mode(&self, enabled: bool) {
        self.developer_mode.store(enabled, Ordering::SeqCst);
        log::info!("🛠️ 开发者模式已{}", if enabled { "开启" } else { "关闭" });
    }

    pub fn developer_mode(&self) -> bool {
        self.developer_mode.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::clock::ManualClock;
    use crate::hotkey::test_support::FakeProbe;

    fn tracker(probe: Arc<FakeProbe>, clock: Arc<ManualClock>) -> ForegroundAppTracker {
        ForegroundAppTracker::new(probe, clock, Duration::from_secs(1), false)
    }

    #[test]
    fn classify_uses_allow_lists_before_system_namespace() {
        assert_eq!(classify("com.apple.dt.Xcode"), AppCategory::Development);
        assert_eq!(classify("com.apple.Terminal"), AppCategory::Development);
        assert_eq!(classify("com.figma.Desktop"), AppCategory::Design);
        assert_eq!(classify("com.apple.finder"), AppCategory::System);
        assert_eq!(classify("com.tinyspeck.slackmacgap"), AppCategory::General);
        assert_eq!(classify(""), AppCategory::General);
    }

    #[test]
    fn current_is_memoized_within_interval() {
        let clock = Arc::new(ManualClock::new());
        let probe = Arc::new(FakeProbe::new(Some("com.microsoft.VSCode")));
        let tracker = tracker(Arc::clone(&probe), Arc::clone(&clock));

        assert_eq!(tracker.current().classification, AppCategory::Development);
        probe.set_app(Some("com.figma.Desktop"));
        clock.advance_ms(500);
        assert_eq!(tracker.current().bundle_identifier, "com.microsoft.VSCode");
        assert_eq!(probe.calls(), 1);

        clock.advance_ms(600);
        let state = tracker.current();
        assert_eq!(state.bundle_identifier, "com.figma.Desktop");
        assert_eq!(state.classification, AppCategory::Design);
        assert_eq!(probe.calls(), 2);
    }

    #[test]
    fn developer_mode_applies_without_refresh() {
        let clock = Arc::new(ManualClock::new());
        let probe = Arc::new(FakeProbe::new(Some("com.apple.dt.Xcode")));
        let tracker = tracker(Arc::clone(&probe), clock);

        assert!(!tracker.current().developer_mode_enabled);
        tracker.set_developer_mode(true);
        assert!(tracker.current().developer_mode_enabled);
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn probe_failure_degrades_to_unknown_general_app() {
        let clock = Arc::new(ManualClock::new());
        let probe = Arc::new(FakeProbe::failing());
        let tracker = tracker(probe, clock);

        let state = tracker.current();
        assert!(!state.is_known());
        assert_eq!(state.classification, AppCategory::General);
    }
}
