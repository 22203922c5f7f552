use domscope::config::{DebugConfig, Module, ModulePlan, Settings};

#[test]
fn test_debug_config_parses_injected_payload() {
    let config = DebugConfig::from_json(
        r##"{"ignoreEvents":["mousemove","scroll"],"watchElements":[".cart","#total"],"waitOnMutation":true,"emptyAppleWallet":false}"##,
    );
    assert!(config.is_ignored("mousemove"));
    assert!(config.is_ignored("scroll"));
    assert!(!config.is_ignored("click"));
    assert_eq!(config.watch_elements, vec![".cart", "#total"]);
    assert!(config.wait_on_mutation);
    assert!(!config.empty_apple_wallet);
}

#[test]
fn test_missing_fields_default_to_empty() {
    let config = DebugConfig::from_json(r#"{"watchElements":["main"]}"#);
    assert!(config.ignore_events.is_empty());
    assert_eq!(config.watch_elements, vec!["main"]);
    assert!(!config.wait_on_mutation);
    assert!(!config.empty_apple_wallet);
}

#[test]
fn test_malformed_payload_degrades_to_defaults() {
    assert_eq!(DebugConfig::from_json("{not json"), DebugConfig::default());
    // Wrong field types are as bad as broken syntax
    assert_eq!(
        DebugConfig::from_json(r#"{"ignoreEvents":"click"}"#),
        DebugConfig::default()
    );
    assert_eq!(DebugConfig::from_source(None), DebugConfig::default());
}

#[test]
fn test_ignore_match_is_case_sensitive() {
    let config = DebugConfig::from_json(r#"{"ignoreEvents":["keyup"]}"#);
    assert!(config.is_ignored("keyup"));
    assert!(!config.is_ignored("KeyUp"));
    assert!(!config.is_ignored("keyup.ns"));
}

#[test]
fn test_settings_defaults_match_settings_page() {
    let settings: Settings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings, Settings::default());
    assert!(!settings.enable_debugging);
    assert_eq!(
        settings.js_event_debugger_ignored,
        "mousemove, message, keypress, keyup, keydown"
    );
    assert!(settings.dom_watcher_selectors.is_empty());

    let config = settings.debug_config();
    let ignored: Vec<&str> = config.ignore_events.iter().map(String::as_str).collect();
    assert_eq!(ignored, vec!["keydown", "keypress", "keyup", "message", "mousemove"]);
    assert!(config.watch_elements.is_empty());
}

#[test]
fn test_settings_lists_are_trimmed_and_compacted() {
    let settings: Settings = serde_json::from_str(
        r#"{"domWatcherSelectors":" .cart , ,#total,  ","jsEventDebuggerIgnored":"scroll,,  wheel ","domWatcherPause":true,"mockEmptyApplePayWallet":true}"#,
    )
    .unwrap();
    let config = settings.debug_config();
    assert_eq!(config.watch_elements, vec![".cart", "#total"]);
    assert_eq!(config.ignore_events.len(), 2);
    assert!(config.is_ignored("wheel"));
    assert!(config.wait_on_mutation);
    assert!(config.empty_apple_wallet);
}

#[test]
fn test_plan_is_empty_when_debugging_disabled() {
    let settings: Settings = serde_json::from_str(
        r#"{"enableDebugging":false,"jsEventDebugger":true,"domWatcher":true,"mockApplePaySession":true}"#,
    )
    .unwrap();
    assert!(settings.plan().is_empty());
}

#[test]
fn test_plan_batches_follow_toggles() {
    let settings: Settings = serde_json::from_str(
        r#"{"enableDebugging":true,"jsEventDebugger":true,"domWatcher":true,"mockApplePaySession":true,"globalDOMSearch":true}"#,
    )
    .unwrap();
    assert!(settings.global_dom_search);
    let plan = settings.plan();
    assert_eq!(
        plan.early,
        vec![Module::NativeEvents, Module::DomWatcher, Module::PaymentMock]
    );
    assert_eq!(plan.after_library, vec![Module::LegacyEvents]);

    let watcher_only: Settings =
        serde_json::from_str(r#"{"enableDebugging":true,"domWatcher":true}"#).unwrap();
    assert_eq!(
        watcher_only.plan(),
        ModulePlan {
            early: vec![Module::DomWatcher],
            after_library: vec![],
        }
    );
}
