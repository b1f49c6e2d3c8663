#![allow(clippy::float_cmp)]

use super::*;

#[test]
fn env_parse_missing_returns_default() {
    let val: f64 = env_parse("__DESK_TEST_NONEXISTENT_KEY__", 42.0);
    assert_eq!(val, 42.0);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__DESK_TEST_EP_VALID__", "640") };
    let val: f64 = env_parse("__DESK_TEST_EP_VALID__", 0.0);
    assert_eq!(val, 640.0);
    unsafe { std::env::remove_var("__DESK_TEST_EP_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__DESK_TEST_EP_INVALID__", "wide") };
    let val: f64 = env_parse("__DESK_TEST_EP_INVALID__", 7.0);
    assert_eq!(val, 7.0);
    unsafe { std::env::remove_var("__DESK_TEST_EP_INVALID__") };
}

#[test]
fn env_parse_paths() {
    unsafe { std::env::set_var("__DESK_TEST_EP_PATH__", "/tmp/desk") };
    let val: PathBuf = env_parse("__DESK_TEST_EP_PATH__", PathBuf::from("."));
    assert_eq!(val, PathBuf::from("/tmp/desk"));
    unsafe { std::env::remove_var("__DESK_TEST_EP_PATH__") };
}

#[test]
fn defaults_are_sane() {
    let config = DeskConfig::default();
    assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    assert!(config.canvas_width > 100.0);
    assert!(config.canvas_height > 100.0);
}
