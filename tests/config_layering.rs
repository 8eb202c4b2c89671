use std::io::Write;

use cache_refresher::config::{self, CliArgs, LoadError, LogFormat};
use clap::Parser;
use serial_test::serial;
use tracing::level_filters::LevelFilter;

const LEVEL_VAR: &str = "CACHE_REFRESHER__LOGGING__LEVEL";
const UNBIND_VAR: &str = "CACHE_REFRESHER__REFRESHER__SUPPORT_UNBINDING";

struct EnvGuard(&'static [&'static str]);

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in self.0 {
            // SAFETY: tests touching the environment are serialised.
            unsafe { std::env::remove_var(key) };
        }
    }
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
#[serial]
fn environment_overrides_file() {
    let _guard = EnvGuard(&[LEVEL_VAR]);
    let file = config_file("[logging]\nlevel = \"warn\"\njson = true\n");
    // SAFETY: serialised test.
    unsafe { std::env::set_var(LEVEL_VAR, "trace") };

    let args = CliArgs::parse_from([
        "cache-refresher",
        "--config-file",
        file.path().to_str().expect("utf-8 path"),
    ]);
    let settings = config::load(&args).expect("settings load");

    assert_eq!(settings.logging.level, LevelFilter::TRACE);
    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
#[serial]
fn cli_overrides_environment() {
    let _guard = EnvGuard(&[UNBIND_VAR]);
    // SAFETY: serialised test.
    unsafe { std::env::set_var(UNBIND_VAR, "true") };

    let args = CliArgs::parse_from(["cache-refresher", "routes", "--support-unbinding", "false"]);
    let settings = config::load(&args).expect("settings load");

    assert!(!settings.refresher.support_unbinding);
}

#[test]
#[serial]
fn invalid_level_in_file_is_reported() {
    let file = config_file("[logging]\nlevel = \"chatty\"\n");
    let args = CliArgs::parse_from([
        "cache-refresher",
        "--config-file",
        file.path().to_str().expect("utf-8 path"),
    ]);

    let err = config::load(&args).expect_err("invalid level");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
#[serial]
fn missing_explicit_file_fails() {
    let args = CliArgs::parse_from([
        "cache-refresher",
        "--config-file",
        "/nonexistent/cache-refresher.toml",
    ]);

    assert!(matches!(config::load(&args), Err(LoadError::Build(_))));
}
