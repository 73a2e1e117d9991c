//! End-to-end CLI tests for duct-search.
//!
//! These tests exercise the full CLI binary with isolated test environments.
//! Each test creates its own temporary site, cache directory and config.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Environment Helper
// =============================================================================

/// Isolated test environment with a rendered site, a content manifest and a
/// config pointing the builder output and client cache into the temp dir.
struct TestEnv {
    _temp_dir: TempDir,
    root: PathBuf,
    config_path: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();

        let config_path = root.join("config.toml");
        let config_content = format!(
            "[builder]\noutput = \"{output}\"\n\n[client]\nindex_url = \"{output}\"\ncache_dir = \"{cache}\"\n",
            output = root.join("search-index.json").display(),
            cache = root.join("cache").display(),
        );
        fs::write(&config_path, config_content).expect("Failed to write config");

        Self {
            _temp_dir: temp_dir,
            root,
            config_path,
        }
    }

    /// Environment with two rendered pages and one markdown content item.
    fn with_site() -> Self {
        let env = Self::new();
        let dist = env.dist();

        fs::create_dir_all(dist.join("plain")).expect("Failed to create site dirs");
        fs::create_dir_all(dist.join("admin")).expect("Failed to create site dirs");
        fs::write(
            dist.join("index.html"),
            "<html><head><title>Intro</title></head><body><nav>Menu</nav>\
             <article>Getting started with widgets</article></body></html>",
        )
        .expect("Failed to write page");
        fs::write(
            dist.join("plain/index.html"),
            "<html><body><p>Plain page about gadgets</p></body></html>",
        )
        .expect("Failed to write page");
        fs::write(
            dist.join("admin/users.html"),
            "<html><head><title>Users</title></head><body>Secret widgets</body></html>",
        )
        .expect("Failed to write page");

        let manifest = r#"[
    {
        "url": "/blog/deep-dive",
        "meta": {"title": "Deep Dive", "tags": ["advanced"], "draft": false},
        "html": "<p>Inside the widgets internals</p>"
    }
]"#;
        fs::write(env.manifest(), manifest).expect("Failed to write manifest");

        env
    }

    fn dist(&self) -> PathBuf {
        self.root.join("dist")
    }

    fn manifest(&self) -> PathBuf {
        self.root.join("content.json")
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("search-index.json")
    }

    /// Get a Command configured for this test environment.
    fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("duct-search");
        cmd.env("DUCT_SEARCH_CONFIG", &self.config_path);
        cmd.env_remove("DUCT_SEARCH_LOG");
        cmd
    }

    fn build(&self) {
        self.command()
            .arg("build")
            .arg("--pages")
            .arg(self.dist())
            .arg("--content")
            .arg(self.manifest())
            .args(["--exclude", "/admin/*"])
            .assert()
            .success();
    }
}

// =============================================================================
// 1. Help / No Command Tests
// =============================================================================

#[test]
fn tc_1_1_no_subcommand_shows_help() {
    let env = TestEnv::new();

    env.command()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("remote"));
}

#[test]
fn tc_1_2_version_flag() {
    let env = TestEnv::new();

    env.command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("duct-search"));
}

#[test]
fn tc_1_3_invalid_config_is_reported() {
    let env = TestEnv::new();
    fs::write(&env.config_path, "[client]\nindexUrl = \"/x\"\n").expect("write config");

    env.command()
        .args(["search", "widgets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}

// =============================================================================
// 2. Build Command Tests
// =============================================================================

#[test]
fn tc_2_1_build_writes_index() {
    let env = TestEnv::with_site();

    env.command()
        .arg("build")
        .arg("--pages")
        .arg(env.dist())
        .arg("--content")
        .arg(env.manifest())
        .args(["--exclude", "/admin/*"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 3 entries"))
        .stdout(predicate::str::contains("1 excluded"));

    let index = fs::read_to_string(env.index_path()).expect("index written");
    assert!(index.contains("\"/blog/deep-dive\""));
    assert!(index.contains("\"Plain\""));
    assert!(!index.contains("/admin/users"));
}

#[test]
fn tc_2_2_build_output_flag() {
    let env = TestEnv::with_site();
    let output = env.root.join("out/custom.json");

    env.command()
        .arg("build")
        .arg("--pages")
        .arg(env.dist())
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 3 entries"));

    assert!(output.exists());
    assert!(!env.index_path().exists());
}

#[test]
fn tc_2_3_build_without_sources_fails() {
    let env = TestEnv::new();

    env.command()
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to index"));
}

#[test]
fn tc_2_4_build_invalid_manifest_fails() {
    let env = TestEnv::with_site();
    fs::write(env.manifest(), "not json").expect("write manifest");

    env.command()
        .arg("build")
        .arg("--content")
        .arg(env.manifest())
        .assert()
        .failure()
        .stderr(predicate::str::contains("content manifest"));
}

// =============================================================================
// 3. Search Command Tests
// =============================================================================

#[test]
fn tc_3_1_search_ranks_article_page_first() {
    let env = TestEnv::with_site();
    env.build();

    let output = env
        .command()
        .args(["search", "widgets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 result(s) found"))
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).expect("utf8");
    let intro = stdout.find("Intro (/)").expect("intro listed");
    let deep = stdout.find("Deep Dive (/blog/deep-dive)").expect("deep dive listed");
    assert!(intro < deep);
}

#[test]
fn tc_3_2_search_tag_match() {
    let env = TestEnv::with_site();
    env.build();

    env.command()
        .args(["search", "advanced"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deep Dive"))
        .stdout(predicate::str::contains("1 result(s) found"));
}

#[test]
fn tc_3_3_search_no_matches() {
    let env = TestEnv::with_site();
    env.build();

    env.command()
        .args(["search", "xyznonexistent123"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No matches found for 'xyznonexistent123'",
        ));
}

#[test]
fn tc_3_4_search_with_limit() {
    let env = TestEnv::with_site();
    env.build();

    env.command()
        .args(["search", "widgets", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 result(s) found"));
}

#[test]
fn tc_3_5_search_uses_cache_after_index_removed() {
    let env = TestEnv::with_site();
    env.build();

    env.command().args(["search", "gadgets"]).assert().success();
    fs::remove_file(env.index_path()).expect("remove index");

    env.command()
        .args(["search", "gadgets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Plain"));
}

#[test]
fn tc_3_6_search_missing_index_is_empty() {
    let env = TestEnv::new();

    env.command()
        .args(["search", "widgets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches found for 'widgets'"));
}

#[test]
fn tc_3_7_search_empty_query() {
    let env = TestEnv::with_site();
    env.build();

    env.command()
        .args(["search", "   "])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches found"));
}

// =============================================================================
// 4. Remote Command Tests
// =============================================================================

#[test]
fn tc_4_1_remote_stats_without_worker_url_fails() {
    let env = TestEnv::new();

    env.command()
        .args(["remote", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No worker URL"));
}

#[test]
fn tc_4_2_remote_search_requires_worker_url() {
    let env = TestEnv::new();

    env.command()
        .args(["remote", "search", "widgets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("workerUrl is required"));
}
