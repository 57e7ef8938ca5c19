use cdk_watch::Settings;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_env_overrides_settings_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    fs::write(
        &config_path,
        r#"
[watch]
debounce_ms = 120

[tools]
esbuild = "./node_modules/esbuild"
tsc = "node_modules/.bin/tsc"
"#,
    )
    .unwrap();

    unsafe {
        // Double underscore separates nested levels
        env::set_var("CDKW_WATCH__DEBOUNCE_MS", "400");
        env::set_var("CDKW_TOOLS__ESBUILD", "/opt/esbuild");
        env::set_var("CDKW_AWS__PROFILE", "sandbox");
    }

    let settings = Settings::load_from(&config_path);

    unsafe {
        env::remove_var("CDKW_WATCH__DEBOUNCE_MS");
        env::remove_var("CDKW_TOOLS__ESBUILD");
        env::remove_var("CDKW_AWS__PROFILE");
    }

    let settings = settings.unwrap();
    assert_eq!(settings.watch.debounce_ms, 400);
    assert_eq!(settings.tools.esbuild, "/opt/esbuild");
    assert_eq!(settings.aws.profile.as_deref(), Some("sandbox"));

    // Values only present in the file survive
    assert_eq!(settings.tools.tsc, "node_modules/.bin/tsc");
    assert!(!settings.watch.skip_initial);

    // Without the overrides the file wins again
    let settings = Settings::load_from(&config_path).unwrap();
    assert_eq!(settings.watch.debounce_ms, 120);
    assert_eq!(settings.tools.esbuild, "./node_modules/esbuild");
    assert!(settings.aws.profile.is_none());
}
