use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use tempfile::tempdir;
use treemerge::config::Config;
use treemerge::duplicates::CompareMode;
use treemerge::scanner::TreeSide;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config.io_threads, 4);
    assert_eq!(config.mode, CompareMode::NameOnly);
    assert_eq!(config.prefer, TreeSide::A);
    assert_eq!(config.result_dir, "dedup_result");
}

#[test]
fn test_config_load_from_env() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("TREEMERGE_IO_THREADS", "16");
        jail.set_env("TREEMERGE_MODE", "content");
        jail.set_env("TREEMERGE_PREFER", "b");

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("TREEMERGE_").split("__"))
            .extract()?;

        assert_eq!(config.io_threads, 16);
        assert_eq!(config.mode, CompareMode::ContentHash);
        assert_eq!(config.prefer, TreeSide::B);
        Ok(())
    });
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
io_threads = 8
include_subtrees = false
mode = "content_hash"
keep_both = true
ignore_patterns = ["*.tmp", ".git/"]
result_dir = "merged"
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .extract()
        .unwrap();

    assert_eq!(config.io_threads, 8);
    assert!(!config.include_subtrees);
    assert_eq!(config.mode, CompareMode::ContentHash);
    assert!(config.keep_both);
    assert_eq!(config.ignore_patterns, vec!["*.tmp", ".git/"]);
    assert_eq!(config.result_dir, "merged");
    // Untouched keys keep their defaults
    assert!(config.preserve_timestamps);
}

#[test]
fn test_config_load_explicit_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("tm.toml", "prefer = \"b\"\noverwrite = false\n")?;

        let config = Config::load(Some(std::path::Path::new("tm.toml")))
            .map_err(|e| e.to_string())?;

        assert_eq!(config.prefer, TreeSide::B);
        assert!(!config.overwrite);
        Ok(())
    });
}

#[test]
fn test_config_invalid_value_is_error() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "mode = \"fuzzy\"\n").unwrap();

    let result: Result<Config, _> = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .extract();
    assert!(result.is_err());
}

#[test]
fn test_config_save_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let config = Config {
        io_threads: 2,
        prefer: TreeSide::B,
        ..Config::default()
    };
    config.save(&config_path).unwrap();

    let saved = fs::read_to_string(&config_path).unwrap();
    assert!(saved.contains("io_threads = 2"));
    assert!(saved.contains("prefer = \"b\""));
}
