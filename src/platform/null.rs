//! 无前台应用信息的平台：始终报告“未知应用”，抑制策略按普通应用处理。

use crate::hotkey::{AppIdentity, ForegroundAppProbe, ProbeError};

#[derive(Debug, Default, Clone, Copy)]
pub struct NullForegroundProbe;

impl ForegroundAppProbe for NullForegroundProbe {
    fn frontmost(&self) -> Result<Option<AppIdentity>, ProbeError> {
        Ok(None)
    }
}
