use super::validation::validate_config;
use super::*;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

fn write_config(dir: &std::path::Path, content: &str) -> PathBuf {
    let path = dir.join(CONFIG_FILE_NAME);
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_config_load_default_creation() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("shadefilter").join(CONFIG_FILE_NAME);

    let original = std::env::var("XDG_CONFIG_HOME").ok();
    unsafe {
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
    }

    let result = Config::load();

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    assert!(result.is_ok(), "load failed: {:?}", result.err());
    assert!(config_path.exists());
}

#[test]
fn test_defaults_for_empty_file() {
    let temp_dir = tempdir().unwrap();
    let path = write_config(temp_dir.path(), "");

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.sink(), SinkKind::Hyprsunset);
    assert_eq!(config.color(), DEFAULT_COLOR);
    assert_eq!(config.intensity(), DEFAULT_INTENSITY);
    assert_eq!(config.dim(), DEFAULT_DIM);
    assert_eq!(config.fade_duration_ms(), DEFAULT_FADE_DURATION_MS);
    assert!(!config.lower_brightness());
    assert!(!config.secure_suspend());
    assert_eq!(config.backlight_device(), None);
}

#[test]
fn test_full_config_parses() {
    let temp_dir = tempdir().unwrap();
    let path = write_config(
        temp_dir.path(),
        r#"
sink = "log"
color = 2700
intensity = 80
dim = 10
lower_brightness = true
backlight = "intel_backlight"
secure_suspend = true
monitor_interval_ms = 250
excluded_apps = ["org.keepassxc.KeePassXC"]

[[profiles]]
name = "Night"
color = 2000
intensity = 90
dim = 60
"#,
    );

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.sink(), SinkKind::Log);
    assert_eq!(config.color(), 2700);
    assert_eq!(config.backlight_device(), Some("intel_backlight"));
    assert_eq!(config.monitor_interval_ms(), 250);
    assert_eq!(config.excluded_apps(), ["org.keepassxc.KeePassXC".to_string()]);
    assert_eq!(config.profiles.len(), 1);
    assert_eq!(config.profiles[0].name, "Night");
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("nope.toml");
    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_unknown_sink_rejected() {
    let temp_dir = tempdir().unwrap();
    let path = write_config(temp_dir.path(), "sink = \"wayland\"\n");
    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_color_range() {
    let mut config = Config {
        color: Some(MINIMUM_COLOR),
        ..Default::default()
    };
    assert!(validate_config(&config).is_ok());

    config.color = Some(MAXIMUM_COLOR);
    assert!(validate_config(&config).is_ok());

    config.color = Some(MINIMUM_COLOR - 1);
    assert!(validate_config(&config).is_err());

    config.color = Some(MAXIMUM_COLOR + 1);
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_level_ranges() {
    let config = Config {
        intensity: Some(101),
        ..Default::default()
    };
    let err = validate_config(&config).unwrap_err().to_string();
    assert!(err.contains("intensity"));

    let config = Config {
        dim: Some(100),
        intensity: Some(0),
        ..Default::default()
    };
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_monitor_interval_and_fade_limits() {
    let config = Config {
        monitor_interval_ms: Some(MINIMUM_MONITOR_INTERVAL_MS - 1),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());

    let config = Config {
        fade_duration_ms: Some(MAXIMUM_FADE_DURATION_MS + 1),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());

    let config = Config {
        fade_duration_ms: Some(0),
        ..Default::default()
    };
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_backlight_must_be_a_name() {
    let config = Config {
        backlight: Some("/sys/class/backlight/x".to_string()),
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_profile_validation() {
    let night = Profile {
        name: "Night".to_string(),
        color: 2000,
        intensity: 90,
        dim: 60,
    };

    let config = Config {
        profiles: vec![night.clone(), night.clone()],
        ..Default::default()
    };
    let err = validate_config(&config).unwrap_err().to_string();
    assert!(err.contains("Duplicate"));

    let config = Config {
        profiles: vec![Profile {
            color: 500,
            ..night.clone()
        }],
        ..Default::default()
    };
    assert!(validate_config(&config).is_err());

    let config = Config {
        profiles: vec![Profile {
            name: "Custom".to_string(),
            ..night.clone()
        }],
        ..Default::default()
    };
    assert!(validate_config(&config).unwrap_err().to_string().contains("reserved"));

    let config = Config {
        profiles: vec![night],
        ..Default::default()
    };
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_changed_events() {
    let old = Config::default();

    assert!(old.changed_events(&old.clone()).is_empty());

    let newer = Config {
        color: Some(2000),
        dim: Some(DEFAULT_DIM),
        secure_suspend: Some(true),
        monitor_interval_ms: Some(300),
        ..Default::default()
    };
    assert_eq!(
        old.changed_events(&newer),
        vec![
            ReactiveEvent::ColorChanged,
            ReactiveEvent::SecureSuspendChanged
        ]
    );
}
