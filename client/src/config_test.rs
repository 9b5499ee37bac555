use super::*;

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__SKETCHSYNC_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_invalid_returns_default() {
    unsafe { std::env::set_var("__SKETCHSYNC_TEST_INVALID__", "soon") };
    let val: u64 = env_parse("__SKETCHSYNC_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__SKETCHSYNC_TEST_INVALID__") };
}

#[test]
fn from_env_reads_overrides_and_keeps_defaults() {
    unsafe {
        std::env::set_var("SKETCHSYNC_AUTOSAVE_DEBOUNCE_MS", "250");
        std::env::set_var("SKETCHSYNC_API_URL", "  http://api.test  ");
        std::env::set_var("SKETCHSYNC_CANVAS_WIDTH", "0");
        std::env::remove_var("SKETCHSYNC_RELAY_URL");
    }
    let config = ClientConfig::from_env();
    unsafe {
        std::env::remove_var("SKETCHSYNC_AUTOSAVE_DEBOUNCE_MS");
        std::env::remove_var("SKETCHSYNC_API_URL");
        std::env::remove_var("SKETCHSYNC_CANVAS_WIDTH");
    }

    assert_eq!(config.autosave_debounce, Duration::from_millis(250));
    assert_eq!(config.api_url, "http://api.test");
    assert_eq!(config.relay_url, DEFAULT_RELAY_URL);
    assert_eq!(config.canvas_width, 1);
}

#[test]
fn default_debounce_is_one_second() {
    assert_eq!(ClientConfig::default().autosave_debounce, Duration::from_secs(1));
}
