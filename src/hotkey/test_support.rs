//! 测试共用的假实现：前台应用探针、特权后端、被动监听与空保留清单。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::combo::KeyCombo;
use super::foreground::{AppIdentity, ForegroundAppProbe, ProbeError};
use super::oracle::{ReservedShortcutSource, ShortcutSourceError};
use super::registrar::{BackendError, HotkeyId, KeyEventMonitor, PrivilegedHotkeyBackend};

pub struct FakeProbe {
    app: Mutex<Option<String>>,
    calls: AtomicUsize,
    fail: bool,
}

impl FakeProbe {
    pub fn new(app: Option<&str>) -> Self {
        Self {
            app: Mutex::new(app.map(str::to_string)),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new(None) }
    }

    pub fn set_app(&self, app: Option<&str>) {
        *self.app.lock().unwrap() = app.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ForegroundAppProbe for FakeProbe {
    fn frontmost(&self) -> Result<Option<AppIdentity>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProbeError("no window server".to_string()));
        }
        Ok(self.app.lock().unwrap().clone().map(|id| AppIdentity { id, name: None }))
    }
}

#[derive(Default)]
pub struct FakePrivilegedBackend {
    live: Mutex<HashMap<HotkeyId, KeyCombo>>,
    refuse_all: AtomicBool,
    installs: AtomicUsize,
}

impl FakePrivilegedBackend {
    pub fn refusing_all() -> Self {
        let backend = Self::default();
        backend.refuse_all.store(true, Ordering::SeqCst);
        backend
    }

    pub fn live_combos(&self) -> Vec<KeyCombo> {
        self.live.lock().unwrap().values().copied().collect()
    }

    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

impl PrivilegedHotkeyBackend for FakePrivilegedBackend {
    fn register(&self, id: HotkeyId, combo: &KeyCombo) -> Result<(), BackendError> {
        if self.refuse_all.load(Ordering::SeqCst) {
            return Err(BackendError::new("eventHotKeyExistsErr"));
        }
        let mut live = self.live.lock().unwrap();
        if live.values().any(|c| c == combo) {
            return Err(BackendError::new("already registered"));
        }
        live.insert(id, *combo);
        Ok(())
    }

    fn unregister(&self, id: HotkeyId, _combo: &KeyCombo) -> Result<(), BackendError> {
        self.live.lock().unwrap().remove(&id);
        Ok(())
    }

    fn install_event_handler(&self) -> Result<(), BackendError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMonitor {
    running: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail: AtomicBool,
}

impl FakeMonitor {
    pub fn failing() -> Self {
        let monitor = Self::default();
        monitor.fail.store(true, Ordering::SeqCst);
        monitor
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl KeyEventMonitor for FakeMonitor {
    fn start(&self) -> Result<(), BackendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::new("accessibility permission denied"));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// 空的保留清单：让测试可以注册任意组合。
pub struct NoReservedShortcuts;

impl ReservedShortcutSource for NoReservedShortcuts {
    fn load(&self) -> Result<Vec<String>, ShortcutSourceError> {
        Ok(Vec::new())
    }
}
