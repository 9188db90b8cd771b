//! # 快捷键事件分发
//!
//! 平台回调只负责把按键翻译成 [`RawKeyEvent`]；本模块按固定顺序处理：
//!
//! 1. 规范化：只保留 Cmd / Ctrl / Alt / Shift 四个修饰位
//! 2. 应用感知抑制
//! 3. 逐条过滤重复按键
//! 4. 组合匹配（特权事件按句柄 ID 匹配，监听事件按组合匹配）
//! 5. 防抖
//! 6. 发出 [`HotkeyPressed`]
//!
//! 每个事件最多触发一个动作。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use super::clock::Clock;
use super::combo::{KeyCombo, Modifiers};
use super::foreground::ForegroundAppTracker;
use super::policy::SuppressionPolicy;
use super::registrar::HotkeyId;
use super::registry::{HotkeyRegistration, HotkeyRegistry};

/// 原始事件标志位：低 4 位与 [`Modifiers`] 对齐，其余位在规范化时丢弃。
pub mod flags {
    pub const CMD: u32 = 1;
    pub const CTRL: u32 = 1 << 1;
    pub const ALT: u32 = 1 << 2;
    pub const SHIFT: u32 = 1 << 3;
    pub const CAPS_LOCK: u32 = 1 << 8;
    pub const FUNCTION: u32 = 1 << 9;
    pub const NUMERIC_PAD: u32 = 1 << 10;
}

/// 事件来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    Privileged(HotkeyId),
    Monitor,
}

/// 平台回调产生的原始按键事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key_code: u16,
    pub flags: u32,
    pub is_repeat: bool,
    pub origin: EventOrigin,
}

impl RawKeyEvent {
    pub fn monitor(key_code: u16, flags: u32, is_repeat: bool) -> Self {
        Self {
            key_code,
            flags,
            is_repeat,
            origin: EventOrigin::Monitor,
        }
    }

    /// 特权机制触发的事件；系统不报告重复。
    pub fn privileged(id: HotkeyId, combo: &KeyCombo) -> Self {
        Self {
            key_code: combo.key_code,
            flags: u32::from(combo.modifiers.bits()),
            is_repeat: false,
            origin: EventOrigin::Privileged(id),
        }
    }

    pub fn combo(&self) -> KeyCombo {
        KeyCombo::new(self.key_code, Modifiers::from_bits_truncate(self.flags))
    }

    fn matches(&self, registration: &HotkeyRegistration, combo: &KeyCombo) -> bool {
        match self.origin {
            EventOrigin::Privileged(id) => registration.privileged_id() == Some(id),
            EventOrigin::Monitor => registration.combo == *combo,
        }
    }
}

/// 向应用层发出的快捷键通知。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotkeyPressed {
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    AppConflict,
    NoMatch,
    Debounced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Emitted(String),
    Suppressed(SuppressReason),
}

pub struct EventDispatcher {
    registry: Arc<HotkeyRegistry>,
    tracker: Arc<ForegroundAppTracker>,
    policy: SuppressionPolicy,
    clock: Arc<dyn Clock>,
    debounce: Duration,
    sender: UnboundedSender<HotkeyPressed>,
}

impl EventDispatcher {
    pub fn new(
        registry: Arc<HotkeyRegistry>,
        tracker: Arc<ForegroundAppTracker>,
        policy: SuppressionPolicy,
        clock: Arc<dyn Clock>,
        debounce: Duration,
        sender: UnboundedSender<HotkeyPressed>,
    ) -> Self {
        Self {
            registry,
            tracker,
            policy,
            clock,
            debounce,
            sender,
        }
    }

    pub fn dispatch(&self, event: RawKeyEvent) -> DispatchOutcome {
        let combo = event.combo();

        let app = self.tracker.current();
        let verdict = self.policy.evaluate_state(&combo, &app);
        if !verdict.is_allowed() {
            log::debug!(
                "⏭️ 跳过 {}：与前台应用 {} 冲突 ({:?})",
                combo,
                app.bundle_identifier,
                verdict
            );
            return DispatchOutcome::Suppressed(SuppressReason::AppConflict);
        }

        let snapshot = self.registry.snapshot();
        let now = self.clock.now();
        let mut debounced = false;

        for registration in snapshot.values() {
            if registration.ignore_repeat && event.is_repeat {
                continue;
            }
            if !event.matches(registration, &combo) {
                continue;
            }
            if registration.within_debounce(now, self.debounce)
                || !self
                    .registry
                    .mark_triggered(&registration.action, registration, now, self.debounce)
            {
                debounced = true;
                continue;
            }

            let action = registration.action.clone();
            log::info!("⌨️ 快捷键触发: {} ({})，前台应用: {}", action, combo, app.app_name);
            if self
                .sender
                .send(HotkeyPressed {
                    action: action.clone(),
                })
                .is_err()
            {
                log::debug!("快捷键通知接收端已关闭，丢弃 {}", action);
            }
            return DispatchOutcome::Emitted(action);
        }

        if debounced {
            log::debug!("⏱️ {} 在防抖窗口内，忽略", combo);
            DispatchOutcome::Suppressed(SuppressReason::Debounced)
        } else {
            DispatchOutcome::Suppressed(SuppressReason::NoMatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::clock::ManualClock;
    use crate::hotkey::oracle::SystemShortcutOracle;
    use crate::hotkey::registrar::DualPathRegistrar;
    use crate::hotkey::test_support::{
        FakeMonitor, FakePrivilegedBackend, FakeProbe, NoReservedShortcuts,
    };
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Fixture {
        clock: Arc<ManualClock>,
        probe: Arc<FakeProbe>,
        tracker: Arc<ForegroundAppTracker>,
        registry: Arc<HotkeyRegistry>,
        dispatcher: EventDispatcher,
        rx: UnboundedReceiver<HotkeyPressed>,
    }

    fn fixture(backend: FakePrivilegedBackend) -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let probe = Arc::new(FakeProbe::new(Some("com.tinyspeck.slackmacgap")));
        let tracker = Arc::new(ForegroundAppTracker::new(
            probe.clone(),
            clock.clone(),
            Duration::from_secs(1),
            false,
        ));
        let oracle = Arc::new(SystemShortcutOracle::new(
            clock.clone(),
            Arc::new(NoReservedShortcuts),
            Duration::from_secs(10),
        ));
        let registrar = Arc::new(DualPathRegistrar::new(
            Arc::new(backend),
            Arc::new(FakeMonitor::default()),
        ));
        let registry = Arc::new(HotkeyRegistry::new(oracle, registrar, clock.clone()));
        let (tx, rx) = unbounded_channel();
        let dispatcher = EventDispatcher::new(
            registry.clone(),
            tracker.clone(),
            SuppressionPolicy::default(),
            clock.clone(),
            Duration::from_millis(100),
            tx,
        );
        Fixture { clock, probe, tracker, registry, dispatcher, rx }
    }

    fn monitor_event(combo: &str, extra_flags: u32, is_repeat: bool) -> RawKeyEvent {
        let combo = KeyCombo::parse(combo).unwrap();
        RawKeyEvent::monitor(
            combo.key_code,
            u32::from(combo.modifiers.bits()) | extra_flags,
            is_repeat,
        )
    }

    fn register(f: &Fixture, action: &str, combo: &str, ignore_repeat: bool) {
        f.registry
            .register(action, KeyCombo::parse(combo).unwrap(), ignore_repeat)
            .unwrap();
        // 越过注册时刻的防抖窗口
        f.clock.advance_ms(1_000);
    }

    #[test]
    fn normalization_drops_lock_and_keypad_flags() {
        let event = monitor_event(
            "cmd+shift+v",
            flags::CAPS_LOCK | flags::FUNCTION | flags::NUMERIC_PAD,
            false,
        );
        assert_eq!(event.combo(), KeyCombo::parse("cmd+shift+v").unwrap());
    }

    #[test]
    fn debounce_window_swallows_duplicates() {
        let mut f = fixture(FakePrivilegedBackend::refusing_all());
        register(&f, "toggleWindow", "cmd+shift+v", true);
        let event = monitor_event("cmd+shift+v", 0, false);

        assert_eq!(f.dispatcher.dispatch(event), DispatchOutcome::Emitted("toggleWindow".into()));
        f.clock.advance_ms(10);
        assert_eq!(
            f.dispatcher.dispatch(event),
            DispatchOutcome::Suppressed(SuppressReason::Debounced)
        );
        f.clock.advance_ms(40);
        assert_eq!(
            f.dispatcher.dispatch(event),
            DispatchOutcome::Suppressed(SuppressReason::Debounced)
        );
        f.clock.advance_ms(100);
        assert_eq!(f.dispatcher.dispatch(event), DispatchOutcome::Emitted("toggleWindow".into()));

        assert_eq!(f.rx.try_recv().unwrap().action, "toggleWindow");
        assert_eq!(f.rx.try_recv().unwrap().action, "toggleWindow");
        assert!(f.rx.try_recv().is_err());
    }

    #[test]
    fn repeats_are_filtered_per_registration() {
        let f = fixture(FakePrivilegedBackend::refusing_all());
        register(&f, "toggleWindow", "cmd+shift+v", true);
        register(&f, "search", "cmd+shift+s", false);

        assert_eq!(
            f.dispatcher.dispatch(monitor_event("cmd+shift+v", 0, true)),
            DispatchOutcome::Suppressed(SuppressReason::NoMatch)
        );
        assert_eq!(
            f.dispatcher.dispatch(monitor_event("cmd+shift+s", 0, true)),
            DispatchOutcome::Emitted("search".into())
        );
    }

    #[test]
    fn privileged_events_match_by_handle_id() {
        let f = fixture(FakePrivilegedBackend::default());
        register(&f, "toggleWindow", "cmd+shift+v", true);
        let combo = KeyCombo::parse("cmd+shift+v").unwrap();

        assert_eq!(
            f.dispatcher.dispatch(RawKeyEvent::privileged(HotkeyId(7), &combo)),
            DispatchOutcome::Suppressed(SuppressReason::NoMatch)
        );
        assert_eq!(
            f.dispatcher.dispatch(RawKeyEvent::privileged(HotkeyId(1), &combo)),
            DispatchOutcome::Emitted("toggleWindow".into())
        );
    }

    #[test]
    fn deny_list_suppresses_in_development_app() {
        let f = fixture(FakePrivilegedBackend::refusing_all());
        register(&f, "search", "cmd+shift+o", true);
        register(&f, "toggleWindow", "cmd+shift+v", true);
        f.probe.set_app(Some("com.microsoft.VSCode"));
        f.clock.advance_ms(1_500);

        assert_eq!(
            f.dispatcher.dispatch(monitor_event("cmd+shift+o", 0, false)),
            DispatchOutcome::Suppressed(SuppressReason::AppConflict)
        );
        assert_eq!(
            f.dispatcher.dispatch(monitor_event("cmd+shift+v", 0, false)),
            DispatchOutcome::Emitted("toggleWindow".into())
        );

        f.tracker.set_developer_mode(true);
        f.clock.advance_ms(200);
        assert_eq!(
            f.dispatcher.dispatch(monitor_event("cmd+shift+v", 0, false)),
            DispatchOutcome::Suppressed(SuppressReason::AppConflict)
        );
    }

    #[test]
    fn unregistered_action_no_longer_fires() {
        let f = fixture(FakePrivilegedBackend::refusing_all());
        register(&f, "toggleWindow", "cmd+shift+v", true);
        f.registry.unregister("toggleWindow");

        assert_eq!(
            f.dispatcher.dispatch(monitor_event("cmd+shift+v", 0, false)),
            DispatchOutcome::Suppressed(SuppressReason::NoMatch)
        );
    }

    #[test]
    fn closed_receiver_does_not_abort_dispatch() {
        let f = fixture(FakePrivilegedBackend::refusing_all());
        register(&f, "toggleWindow", "cmd+shift+v", true);
        let Fixture { dispatcher, rx, .. } = f;
        drop(rx);

        assert_eq!(
            dispatcher.dispatch(monitor_event("cmd+shift+v", 0, false)),
            DispatchOutcome::Emitted("toggleWindow".into())
        );
    }
}
