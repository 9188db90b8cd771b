//! 集成测试的服务装配，平台替身来自 `hotkey::test_support`。

#![allow(dead_code)]

use std::sync::Arc;

use clip_flow_native::hotkey::test_support::{
    FakeMonitor, FakePrivilegedBackend, FakeProbe, NoReservedShortcuts,
};
use clip_flow_native::hotkey::{
    HotkeyConfig, HotkeyDeps, HotkeyPressed, HotkeyService, ManualClock, ReservedShortcutSource,
};
use tokio::sync::mpsc::UnboundedReceiver;

pub struct Harness {
    pub service: HotkeyService,
    pub notifications: UnboundedReceiver<HotkeyPressed>,
    pub clock: Arc<ManualClock>,
    pub probe: Arc<FakeProbe>,
    pub backend: Arc<FakePrivilegedBackend>,
    pub monitor: Arc<FakeMonitor>,
}

pub struct HarnessBuilder {
    backend: FakePrivilegedBackend,
    app: Option<&'static str>,
    reserved: Option<Arc<dyn ReservedShortcutSource>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self { backend: FakePrivilegedBackend::default(), app: None, reserved: None }
    }

    pub fn privileged_refused(mut self) -> Self {
        self.backend = FakePrivilegedBackend::refusing_all();
        self
    }

    pub fn frontmost(mut self, bundle_id: &'static str) -> Self {
        self.app = Some(bundle_id);
        self
    }

    pub fn without_reserved_shortcuts(mut self) -> Self {
        self.reserved = Some(Arc::new(NoReservedShortcuts));
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let probe = Arc::new(FakeProbe::new(self.app));
        let backend = Arc::new(self.backend);
        let monitor = Arc::new(FakeMonitor::default());

        let mut deps = HotkeyDeps::new(backend.clone(), monitor.clone(), probe.clone())
            .with_clock(clock.clone());
        if let Some(reserved) = self.reserved {
            deps = deps.with_reserved_source(reserved);
        }

        let (service, notifications) = HotkeyService::new(HotkeyConfig::default(), deps);
        Harness { service, notifications, clock, probe, backend, monitor }
    }
}
