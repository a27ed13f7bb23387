use congregation_portal::{
    AppConfig,
    config::{DEFAULT_SESSION_TTL_HOURS, Env, MAX_SESSION_TTL_HOURS},
};
use serial_test::serial;
use std::{env, panic};

const VARS: [&str; 6] = [
    "APP_ENV",
    "DATABASE_URL",
    "SESSION_SECRET",
    "SESSION_TTL_HOURS",
    "INVITE_ONLY",
    "BIND_ADDR",
];

/// Runs `test` against a clean slate of the portal's variables and restores them afterward.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> =
        VARS.iter().map(|&var| (var, env::var(var).ok())).collect();

    unsafe {
        for var in VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original) in originals {
        unsafe {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

#[test]
#[serial]
fn local_defaults_apply() {
    let config = run_with_env(&[("DATABASE_URL", "postgres://u:p@localhost/portal")], AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.db_url, "postgres://u:p@localhost/portal");
    assert_eq!(config.session_ttl_hours, DEFAULT_SESSION_TTL_HOURS);
    assert!(!config.invite_only);
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert!(!config.session_secret.is_empty());
}

#[test]
#[serial]
fn invite_only_requires_literal_true() {
    let on = run_with_env(
        &[("DATABASE_URL", "postgres://db"), ("INVITE_ONLY", "TRUE")],
        AppConfig::load,
    );
    assert!(on.invite_only);

    let off = run_with_env(
        &[("DATABASE_URL", "postgres://db"), ("INVITE_ONLY", "yes")],
        AppConfig::load,
    );
    assert!(!off.invite_only);
}

#[test]
#[serial]
fn production_requires_session_secret() {
    let result = run_with_env(
        &[("APP_ENV", "production"), ("DATABASE_URL", "postgres://db")],
        || panic::catch_unwind(AppConfig::load),
    );

    assert!(result.is_err(), "production without SESSION_SECRET must fail fast");
}

#[test]
#[serial]
fn production_loads_with_all_secrets() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://db"),
            ("SESSION_SECRET", "prod-secret"),
            ("SESSION_TTL_HOURS", "12"),
            ("BIND_ADDR", "127.0.0.1:8080"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.session_secret, "prod-secret");
    assert_eq!(config.session_ttl_hours, 12);
    assert_eq!(config.bind_addr, "127.0.0.1:8080");
}

#[test]
#[serial]
fn missing_database_url_fails_fast() {
    let result = run_with_env(&[], || panic::catch_unwind(AppConfig::load));
    assert!(result.is_err());
}

#[test]
#[serial]
fn malformed_ttl_fails_fast() {
    let result = run_with_env(
        &[("DATABASE_URL", "postgres://db"), ("SESSION_TTL_HOURS", "forever")],
        || panic::catch_unwind(AppConfig::load),
    );
    assert!(result.is_err());
}

#[test]
#[serial]
fn out_of_range_ttl_fails_fast() {
    for ttl in ["0", "-5", "9000000000000"] {
        let result = run_with_env(
            &[("DATABASE_URL", "postgres://db"), ("SESSION_TTL_HOURS", ttl)],
            || panic::catch_unwind(AppConfig::load),
        );
        assert!(result.is_err(), "SESSION_TTL_HOURS={ttl} must be rejected");
    }
}

#[test]
#[serial]
fn longest_ttl_is_accepted() {
    let config = run_with_env(
        &[("DATABASE_URL", "postgres://db"), ("SESSION_TTL_HOURS", "8760")],
        AppConfig::load,
    );
    assert_eq!(config.session_ttl_hours, MAX_SESSION_TTL_HOURS);
}
