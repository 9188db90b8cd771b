//! # 快捷键注册表
//!
//! ## 设计思路
//!
//! 动作名 → 登记记录的映射，是系统中唯一的可变共享状态。
//! 注册、注销由一把写者锁串行化（期间会调用平台接口，可能较慢）；
//! 事件分发只读取不可变快照，防抖时间戳更新只占用映射本身的写锁，
//! 不会等待进行中的注册。
//!
//! ## 实现思路
//!
//! - 快照为 `Arc<BTreeMap<..>>`，写入时 `Arc::make_mut` 写时复制，
//!   已分发出去的快照不受影响；`BTreeMap` 让遍历顺序确定。
//! - 记录本身不可变，更新 = 构造新记录并整体替换条目。
//! - 防抖时间戳使用比较并交换：只有条目仍是分发器匹配到的那一份、
//!   且仍在防抖窗口之外时才替换，并发注销 / 重注册的事件自然落空。
//! - 注册前先查询系统快捷键判定器，保留组合直接拒绝、不改动任何状态。
//! - 重注册时新组合获取失败，会重新获取旧组合，失败的调用不丢失原有绑定。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::clock::Clock;
use super::combo::{KeyCombo, ParseError};
use super::oracle::SystemShortcutOracle;
use super::registrar::{DualPathRegistrar, HotkeyId, Mechanism, MechanismKind};

/// 注册失败原因。
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0} 是系统保留快捷键")]
    ReservedCombo(String),

    #[error("平台错误: {0}")]
    PlatformFault(String),
}

/// 一条快捷键登记记录（不可变）。
#[derive(Debug, Clone)]
pub struct HotkeyRegistration {
    pub action: String,
    pub combo: KeyCombo,
    pub ignore_repeat: bool,
    pub last_trigger: Instant,
    pub mechanism: Mechanism,
}

impl HotkeyRegistration {
    fn triggered_at(&self, now: Instant) -> Self {
        Self {
            last_trigger: now,
            ..self.clone()
        }
    }

    pub fn privileged_id(&self) -> Option<HotkeyId> {
        match self.mechanism {
            Mechanism::Privileged(handle) => Some(handle.id),
            Mechanism::Fallback => None,
        }
    }

    pub fn within_debounce(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_trigger) < window
    }
}

/// `list_hotkeys` 返回的摘要。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationSummary {
    pub action: String,
    pub combo: KeyCombo,
    pub mechanism: MechanismKind,
    pub ignore_repeat: bool,
}

type Entries = BTreeMap<String, Arc<HotkeyRegistration>>;

/// 分发器读取的一致快照。
pub type RegistrySnapshot = Arc<Entries>;

pub struct HotkeyRegistry {
    oracle: Arc<SystemShortcutOracle>,
    registrar: Arc<DualPathRegistrar>,
    clock: Arc<dyn Clock>,
    writer: Mutex<()>,
    entries: RwLock<RegistrySnapshot>,
}

impl HotkeyRegistry {
    pub fn new(
        oracle: Arc<SystemShortcutOracle>,
        registrar: Arc<DualPathRegistrar>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            oracle,
            registrar,
            clock,
            writer: Mutex::new(()),
            entries: RwLock::new(Arc::new(BTreeMap::new())),
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("注册表写者锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, RegistrySnapshot> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("注册表读锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, RegistrySnapshot> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("注册表写锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    /// 写时复制地修改映射。
    fn modify<R>(&self, f: impl FnOnce(&mut Entries) -> R) -> R {
        let mut guard = self.write_entries();
        f(Arc::make_mut(&mut *guard))
    }

    /// 注册（或替换）`action` 的快捷键。
    pub fn register(
        &self,
        action: &str,
        combo: KeyCombo,
        ignore_repeat: bool,
    ) -> Result<MechanismKind, RegisterError> {
        if self.oracle.is_reserved(&combo) {
            log::warn!("🚫 拒绝注册系统保留快捷键 {} → {}", combo, action);
            return Err(RegisterError::ReservedCombo(combo.to_string()));
        }

        let _writer = self.lock_writer();

        // 先释放旧登记，同一动作不会同时持有两个机制
        let prior = self.modify(|entries| entries.remove(action));
        if let Some(prior) = &prior {
            log::debug!("⌨️ 替换 {} 的旧快捷键 {}", action, prior.combo);
            self.registrar.release(&prior.mechanism, &prior.combo);
        }

        let mechanism = match self.registrar.acquire(&combo, action) {
            Ok(mechanism) => mechanism,
            Err(err) => {
                if let Some(prior) = prior {
                    self.restore(prior);
                }
                if self.read_entries().is_empty() {
                    self.registrar.stop_monitor();
                }
                return Err(err);
            }
        };

        let record = Arc::new(HotkeyRegistration {
            action: action.to_string(),
            combo,
            ignore_repeat,
            last_trigger: self.clock.now(),
            mechanism,
        });
        self.modify(|entries| entries.insert(action.to_string(), record));

        Ok(mechanism.kind())
    }

    /// 重新获取旧组合并放回注册表。调用方需持有写者锁。
    fn restore(&self, prior: Arc<HotkeyRegistration>) {
        match self.registrar.acquire(&prior.combo, &prior.action) {
            Ok(mechanism) => {
                log::warn!("⚠️ 新快捷键注册失败，已恢复 {} 的旧快捷键 {}", prior.action, prior.combo);
                let record = Arc::new(HotkeyRegistration {
                    mechanism,
                    ..(*prior).clone()
                });
                self.modify(|entries| entries.insert(prior.action.clone(), record));
            }
            Err(err) => {
                log::error!("❌ 无法恢复 {} 的旧快捷键 {}: {}", prior.action, prior.combo, err);
            }
        }
    }

    /// 注销 `action`。未注册也视为成功。
    pub fn unregister(&self, action: &str) -> bool {
        let _writer = self.lock_writer();

        match self.modify(|entries| entries.remove(action)) {
            Some(prior) => {
                self.registrar.release(&prior.mechanism, &prior.combo);
                log::info!("⌨️ 已注销快捷键 {} ({})", action, prior.combo);
            }
            None => log::debug!("⌨️ {} 没有已注册的快捷键", action),
        }

        if self.read_entries().is_empty() {
            self.registrar.stop_monitor();
        }
        true
    }

    /// 比较并交换地更新触发时间戳。
    ///
    /// 仅当条目仍是 `seen` 且距上次触发已超出 `window` 时成功。
    /// 只占用映射写锁，不与进行中的注册争用写者锁。
    pub fn mark_triggered(
        &self,
        action: &str,
        seen: &Arc<HotkeyRegistration>,
        now: Instant,
        window: Duration,
    ) -> bool {
        let mut guard = self.write_entries();
        let eligible = guard
            .get(action)
            .is_some_and(|current| Arc::ptr_eq(current, seen) && !current.within_debounce(now, window));
        if !eligible {
            return false;
        }

        Arc::make_mut(&mut *guard).insert(action.to_string(), Arc::new(seen.triggered_at(now)));
        true
    }

    /// 释放所有登记并停止被动监听（子系统拆除）。
    pub fn clear(&self) {
        let _writer = self.lock_writer();

        let drained = self.modify(std::mem::take);
        for registration in drained.values() {
            self.registrar.release(&registration.mechanism, &registration.combo);
        }
        self.registrar.stop_monitor();

        if !drained.is_empty() {
            log::info!("🧹 已清理 {} 个快捷键", drained.len());
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        Arc::clone(&self.read_entries())
    }

    pub fn get(&self, action: &str) -> Option<Arc<HotkeyRegistration>> {
        self.read_entries().get(action).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// (特权数, 回退数)
    pub fn mechanism_counts(&self) -> (usize, usize) {
        self.read_entries()
            .values()
            .fold((0, 0), |(privileged, fallback), r| match r.mechanism {
                Mechanism::Privileged(_) => (privileged + 1, fallback),
                Mechanism::Fallback => (privileged, fallback + 1),
            })
    }

    /// 按动作名排序的摘要列表。
    pub fn list(&self) -> Vec<RegistrationSummary> {
        self.read_entries()
            .values()
            .map(|r| RegistrationSummary {
                action: r.action.clone(),
                combo: r.combo,
                mechanism: r.mechanism.kind(),
                ignore_repeat: r.ignore_repeat,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::clock::ManualClock;
    use crate::hotkey::oracle::CuratedShortcuts;
    use crate::hotkey::registrar::{BackendError, PrivilegedHotkeyBackend};
    use crate::hotkey::test_support::{FakeMonitor, FakePrivilegedBackend};
    use std::sync::mpsc;
    use std::thread;

    struct Fixture {
        clock: Arc<ManualClock>,
        backend: Arc<FakePrivilegedBackend>,
        monitor: Arc<FakeMonitor>,
        registry: HotkeyRegistry,
    }

    fn fixture_with(backend: FakePrivilegedBackend, monitor: FakeMonitor) -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let backend = Arc::new(backend);
        let monitor = Arc::new(monitor);
        let oracle = Arc::new(SystemShortcutOracle::new(
            clock.clone(),
            Arc::new(CuratedShortcuts),
            Duration::from_secs(10),
        ));
        let registrar = Arc::new(DualPathRegistrar::new(backend.clone(), monitor.clone()));
        let registry = HotkeyRegistry::new(oracle, registrar, clock.clone());
        Fixture { clock, backend, monitor, registry }
    }

    fn fixture() -> Fixture {
        fixture_with(FakePrivilegedBackend::default(), FakeMonitor::default())
    }

    fn combo(s: &str) -> KeyCombo {
        KeyCombo::parse(s).unwrap()
    }

    #[test]
    fn reserved_combo_is_rejected_without_mutation() {
        let f = fixture();
        f.registry.register("toggleWindow", combo("cmd+shift+v"), true).unwrap();

        let err = f.registry.register("toggleWindow", combo("cmd+q"), true).unwrap_err();
        assert!(matches!(err, RegisterError::ReservedCombo(ref c) if c == "cmd+q"));

        let current = f.registry.get("toggleWindow").unwrap();
        assert_eq!(current.combo, combo("cmd+shift+v"));
        assert_eq!(f.backend.live_combos(), vec![combo("cmd+shift+v")]);
    }

    #[test]
    fn re_register_replaces_and_releases_old_handle() {
        let f = fixture();
        f.registry.register("toggleWindow", combo("cmd+shift+v"), true).unwrap();
        f.registry.register("toggleWindow", combo("cmd+alt+v"), true).unwrap();

        assert_eq!(f.registry.len(), 1);
        assert_eq!(f.backend.live_combos(), vec![combo("cmd+alt+v")]);
        assert_eq!(f.registry.get("toggleWindow").unwrap().privileged_id(), Some(HotkeyId(2)));
    }

    #[test]
    fn unregister_is_idempotent_and_stops_monitor_when_empty() {
        let f = fixture_with(FakePrivilegedBackend::refusing_all(), FakeMonitor::default());
        f.registry.register("toggleWindow", combo("cmd+shift+v"), true).unwrap();
        f.registry.register("showHistory", combo("cmd+shift+h"), true).unwrap();
        assert!(f.monitor.is_running());
        assert_eq!(f.registry.mechanism_counts(), (0, 2));

        assert!(f.registry.unregister("toggleWindow"));
        assert!(f.monitor.is_running());
        assert!(f.registry.unregister("showHistory"));
        assert!(!f.monitor.is_running());
        assert!(f.registry.unregister("showHistory"));
        assert_eq!(f.monitor.stops(), 1);
    }

    #[test]
    fn failed_registration_leaves_registry_empty() {
        let f = fixture_with(FakePrivilegedBackend::refusing_all(), FakeMonitor::failing());
        let err = f.registry.register("toggleWindow", combo("cmd+shift+v"), true).unwrap_err();
        assert!(matches!(err, RegisterError::PlatformFault(_)));
        assert!(f.registry.is_empty());
    }

    #[test]
    fn failed_re_register_keeps_previous_binding() {
        let f = fixture_with(FakePrivilegedBackend::default(), FakeMonitor::failing());
        f.registry.register("showHistory", combo("cmd+alt+v"), true).unwrap();
        f.registry.register("toggleWindow", combo("cmd+shift+v"), false).unwrap();
        f.clock.advance_ms(500);
        let before = f.registry.get("toggleWindow").unwrap();

        // cmd+alt+v 已被占用，被动监听又无法启动
        let err = f.registry.register("toggleWindow", combo("cmd+alt+v"), true).unwrap_err();
        assert!(matches!(err, RegisterError::PlatformFault(_)));

        let after = f.registry.get("toggleWindow").unwrap();
        assert_eq!(after.combo, combo("cmd+shift+v"));
        assert!(!after.ignore_repeat);
        assert_eq!(after.last_trigger, before.last_trigger);
        assert_eq!(after.mechanism.kind(), MechanismKind::Privileged);

        let mut live: Vec<String> = f.backend.live_combos().iter().map(|c| c.to_string()).collect();
        live.sort();
        assert_eq!(live, vec!["cmd+alt+v", "cmd+shift+v"]);
    }

    /// 注册 `slow` 组合时阻塞，直到测试放行。
    struct SlowBackend {
        slow: KeyCombo,
        entered: Mutex<mpsc::Sender<()>>,
        proceed: Mutex<mpsc::Receiver<()>>,
    }

    impl PrivilegedHotkeyBackend for SlowBackend {
        fn register(&self, _id: HotkeyId, combo: &KeyCombo) -> Result<(), BackendError> {
            if *combo == self.slow {
                self.entered.lock().unwrap().send(()).unwrap();
                self.proceed.lock().unwrap().recv().unwrap();
            }
            Ok(())
        }

        fn unregister(&self, _id: HotkeyId, _combo: &KeyCombo) -> Result<(), BackendError> {
            Ok(())
        }

        fn install_event_handler(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[test]
    fn debounce_update_does_not_wait_for_pending_registration() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (proceed_tx, proceed_rx) = mpsc::channel();
        let backend = Arc::new(SlowBackend {
            slow: combo("cmd+shift+h"),
            entered: Mutex::new(entered_tx),
            proceed: Mutex::new(proceed_rx),
        });
        let clock = Arc::new(ManualClock::new());
        let oracle = Arc::new(SystemShortcutOracle::new(
            clock.clone(),
            Arc::new(CuratedShortcuts),
            Duration::from_secs(10),
        ));
        let registrar = Arc::new(DualPathRegistrar::new(backend, Arc::new(FakeMonitor::default())));
        let registry = HotkeyRegistry::new(oracle, registrar, clock.clone());

        registry.register("toggleWindow", combo("cmd+shift+v"), true).unwrap();
        clock.advance_ms(1_000);
        let seen = registry.get("toggleWindow").unwrap();
        let now = clock.now();

        thread::scope(|scope| {
            let pending = scope.spawn(|| registry.register("showHistory", combo("cmd+shift+h"), true));
            entered_rx.recv().unwrap();

            let (done_tx, done_rx) = mpsc::channel();
            let registry = &registry;
            let seen = &seen;
            scope.spawn(move || {
                let marked = registry.mark_triggered("toggleWindow", seen, now, Duration::from_millis(100));
                let _ = done_tx.send(marked);
            });

            let marked = done_rx.recv_timeout(Duration::from_secs(2));
            proceed_tx.send(()).unwrap();
            assert_eq!(marked, Ok(true));
            assert!(pending.join().unwrap().is_ok());
        });

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("toggleWindow").unwrap().last_trigger, now);
    }

    #[test]
    fn mark_triggered_is_compare_and_swap() {
        let f = fixture();
        let window = Duration::from_millis(100);
        f.registry.register("toggleWindow", combo("cmd+shift+v"), true).unwrap();
        let seen = f.registry.get("toggleWindow").unwrap();

        // 刚注册即在防抖窗口内
        assert!(!f.registry.mark_triggered("toggleWindow", &seen, f.clock.now(), window));

        f.clock.advance_ms(150);
        assert!(f.registry.mark_triggered("toggleWindow", &seen, f.clock.now(), window));
        // 旧快照已失效
        assert!(!f.registry.mark_triggered("toggleWindow", &seen, f.clock.now(), window));
        assert_eq!(f.registry.get("toggleWindow").unwrap().last_trigger, f.clock.now());
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let f = fixture();
        f.registry.register("toggleWindow", combo("cmd+shift+v"), true).unwrap();
        let snapshot = f.registry.snapshot();

        f.registry.unregister("toggleWindow");
        assert!(snapshot.contains_key("toggleWindow"));
        assert!(f.registry.snapshot().is_empty());
    }

    #[test]
    fn list_is_sorted_and_clear_releases_everything() {
        let f = fixture();
        f.registry.register("toggleWindow", combo("cmd+shift+v"), true).unwrap();
        f.registry.register("clearHistory", combo("cmd+shift+x"), false).unwrap();

        let actions: Vec<_> = f.registry.list().into_iter().map(|s| s.action).collect();
        assert_eq!(actions, vec!["clearHistory", "toggleWindow"]);

        f.registry.clear();
        assert!(f.registry.is_empty());
        assert!(f.backend.live_combos().is_empty());
    }
}
