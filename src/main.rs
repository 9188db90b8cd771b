//! # 快捷键诊断工具
//!
//! ```text
//! clip-flow-native cmd+shift+v "Ctrl + Option + F7" cmd+q
//! ```
//!
//! 逐个解析参数，打印规范形式、是否为系统保留快捷键，
//! 以及在各类前台应用中的抑制判定；最后打印当前前台应用。

use std::sync::Arc;
use std::time::Duration;

use clip_flow_native::hotkey::{
    AppCategory, CuratedShortcuts, HotkeyConfig, KeyCombo, SuppressionPolicy, SystemClock,
    foreground::{ForegroundAppTracker, is_design_app, is_development_app},
    oracle::SystemShortcutOracle,
};
use clip_flow_native::platform;

const CATEGORIES: [AppCategory; 4] = [
    AppCategory::General,
    AppCategory::System,
    AppCategory::Development,
    AppCategory::Design,
];

fn describe(raw: &str, oracle: &SystemShortcutOracle, policy: &SuppressionPolicy) {
    let combo = match KeyCombo::parse(raw) {
        Ok(combo) => combo,
        Err(err) => {
            println!("{:<28} ❌ {}", raw, err);
            return;
        }
    };

    let reserved = if oracle.is_reserved(&combo) { "系统保留" } else { "可注册" };
    println!("{:<28} → {:<20} {}", raw, combo.to_string(), reserved);

    for category in CATEGORIES {
        let normal = policy.evaluate(&combo, category, false);
        let developer = policy.evaluate(&combo, category, true);
        println!(
            "    {:<12} 普通: {:<24} 开发者模式: {:?}",
            category.as_str(),
            format!("{:?}", normal),
            developer
        );
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = HotkeyConfig::default();
    let clock = Arc::new(SystemClock);
    let oracle = SystemShortcutOracle::new(
        clock.clone(),
        Arc::new(CuratedShortcuts),
        config.system_cache_ttl,
    );
    let policy = SuppressionPolicy::default();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        println!("用法: clip-flow-native <快捷键>...   例如 cmd+shift+v");
    }
    for raw in &args {
        describe(raw, &oracle, &policy);
    }
    println!("系统保留快捷键共 {} 个", oracle.entry_count());

    let tracker = ForegroundAppTracker::new(
        platform::default_foreground_probe(),
        clock,
        Duration::ZERO,
        config.developer_mode,
    );
    let app = tracker.current();
    if app.is_known() {
        println!(
            "前台应用: {} ({}) 类别: {} 开发工具: {} 设计工具: {}",
            app.app_name,
            app.bundle_identifier,
            app.classification.as_str(),
            is_development_app(&app.bundle_identifier),
            is_design_app(&app.bundle_identifier)
        );
    } else {
        println!("前台应用: 未知");
    }
}
