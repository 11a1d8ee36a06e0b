// tests/ingest_config.rs
use feedsmith::config::AppConfig;
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("feedsmith.toml");
    fs::write(
        &p_toml,
        r#"
[server]
port = 9001
refresh_period = 10

[storage]
database = "/var/lib/feedsmith/feeds.sqlite"

[[sources]]
name = "mistral-ai"
title = "Mistral AI"
url = "https://mistral.ai/en/news"
description = "Mistral AI news"
feed_url = "https://mistral.ai/rss.xml"
interval_seconds = 43200
"#,
    )
    .unwrap();
    let cfg = AppConfig::load_from(&p_toml).unwrap();
    assert_eq!(cfg.server.port, 9001);
    assert_eq!(cfg.default_interval(), Duration::from_secs(600));
    assert_eq!(
        cfg.storage.database,
        PathBuf::from("/var/lib/feedsmith/feeds.sqlite")
    );
    assert_eq!(cfg.sources[0].name, "mistral-ai");
    assert_eq!(cfg.sources[0].interval(), Some(Duration::from_secs(43200)));

    let p_json = dir.path().join("feedsmith.json");
    fs::write(&p_json, r#"{"server": {"metrics_port": 9100}}"#).unwrap();
    let cj = AppConfig::load_from(&p_json).unwrap();
    assert_eq!(cj.server.port, 8082);
    assert_eq!(cj.server.metrics_port, Some(9100));
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var("FEEDSMITH_CONFIG");
    env::remove_var("FEEDSMITH_PORT");
    env::remove_var("FEEDSMITH_DATABASE");

    // 1) Nothing at all → defaults
    let c = AppConfig::load_default().unwrap();
    assert_eq!(c.server.port, 8082);
    assert_eq!(c.default_interval(), Duration::from_secs(300));

    // 2) Fallback TOML in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("feedsmith.toml"), "[server]\nport = 9002\n").unwrap();
    assert_eq!(AppConfig::load_default().unwrap().server.port, 9002);

    // 3) ENV path wins over ./config/
    let p_env = tmp.path().join("custom.json");
    fs::write(&p_env, r#"{"server": {"port": 9003}}"#).unwrap();
    env::set_var("FEEDSMITH_CONFIG", p_env.display().to_string());
    assert_eq!(AppConfig::load_default().unwrap().server.port, 9003);

    // 4) Port/database overrides apply on top
    env::set_var("FEEDSMITH_PORT", "9004");
    env::set_var("FEEDSMITH_DATABASE", "other.sqlite");
    let c = AppConfig::load_default().unwrap();
    assert_eq!(c.server.port, 9004);
    assert_eq!(c.storage.database, PathBuf::from("other.sqlite"));

    // 5) Bad override or missing env path is an error
    env::set_var("FEEDSMITH_PORT", "not-a-port");
    assert!(AppConfig::load_default().is_err());
    env::remove_var("FEEDSMITH_PORT");
    env::set_var("FEEDSMITH_CONFIG", tmp.path().join("missing.toml"));
    assert!(AppConfig::load_default().is_err());

    env::remove_var("FEEDSMITH_CONFIG");
    env::remove_var("FEEDSMITH_DATABASE");
    env::set_current_dir(&old).unwrap();
}

#[test]
fn huge_refresh_period_saturates() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("feedsmith.json");
    fs::write(&p, format!(r#"{{"server": {{"refresh_period": {}}}}}"#, u64::MAX)).unwrap();
    let cfg = AppConfig::load_from(&p).unwrap();
    assert_eq!(cfg.default_interval(), Duration::from_secs(u64::MAX));
}

#[test]
fn configured_sources_build_a_registry() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("feedsmith.toml");
    fs::write(
        &p,
        r#"
[[sources]]
name = "kubevirt"
title = "KubeVirt"
url = "https://kubevirt.io"
description = "KubeVirt blog"
feed_url = "https://kubevirt.io/feed.xml"
interval_seconds = 600
"#,
    )
    .unwrap();
    let cfg = AppConfig::load_from(&p).unwrap();
    let registry = feedsmith::ingest::providers::registry_from_config(&cfg.sources)
        .expect("http client builds");
    let source = registry.get("kubevirt").expect("registered");
    assert_eq!(
        source.interval_or(Duration::from_secs(300)),
        Duration::from_secs(600)
    );
}
