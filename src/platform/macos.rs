//! macOS 前台应用探针（`NSWorkspace.frontmostApplication`）。

use std::ffi::CStr;
use std::os::raw::c_char;

use cocoa::base::{id, nil};
use cocoa::foundation::NSAutoreleasePool;
use objc::{class, msg_send, sel, sel_impl};

use crate::hotkey::{AppIdentity, ForegroundAppProbe, ProbeError};

#[derive(Debug, Default, Clone, Copy)]
pub struct WorkspaceProbe;

/// NSString → String；`nil` 或空指针返回 `None`。
unsafe fn ns_string(value: id) -> Option<String> {
    if value == nil {
        return None;
    }
    let ptr: *const c_char = unsafe { msg_send![value, UTF8String] };
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

impl ForegroundAppProbe for WorkspaceProbe {
    fn frontmost(&self) -> Result<Option<AppIdentity>, ProbeError> {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);

            let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
            let result = if workspace == nil {
                Err(ProbeError("NSWorkspace 不可用".to_string()))
            } else {
                let app: id = msg_send![workspace, frontmostApplication];
                if app == nil {
                    Ok(None)
                } else {
                    let bundle_id: id = msg_send![app, bundleIdentifier];
                    let name: id = msg_send![app, localizedName];
                    Ok(ns_string(bundle_id).map(|id| AppIdentity {
                        id,
                        name: ns_string(name),
                    }))
                }
            };

            pool.drain();
            result
        }
    }
}
