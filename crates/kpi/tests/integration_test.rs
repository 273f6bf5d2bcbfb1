use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn kpi_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kpi"));
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(repo: &Path, args: &[&str], date: &str) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .env("GIT_AUTHOR_DATE", date)
        .env("GIT_COMMITTER_DATE", date)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn commit(repo: &Path, file: &str, lines: usize, date: &str) {
    let body: String = (0..lines).map(|i| format!("line {i}\n")).collect();
    fs::write(repo.join(file), body).unwrap();
    git(repo, &["add", "."], date);
    git(repo, &["commit", "-q", "-m", file], date);
}

/// Create `<root>/projects/svc-a` with tags 1.0.0 (Oct 2025) and 1.1.0
/// (Nov 2025), two commits between them and one unreleased commit.
fn sample_repo(root: &Path) {
    let repo = root.join("projects").join("svc-a");
    fs::create_dir_all(&repo).unwrap();
    let first = "2025-10-05T10:00:00+00:00";
    git(&repo, &["init", "-q"], first);
    git(&repo, &["config", "user.email", "dev@example.com"], first);
    git(&repo, &["config", "user.name", "Dev"], first);
    git(&repo, &["config", "commit.gpgsign", "false"], first);

    commit(&repo, "main.rs", 10, first);
    git(&repo, &["tag", "1.0.0"], first);
    git(&repo, &["tag", "not-a-version"], first);

    commit(&repo, "lib.rs", 20, "2025-10-20T10:00:00+00:00");
    commit(&repo, "Cargo.lock", 500, "2025-11-01T10:00:00+00:00");
    commit(&repo, "util.rs", 5, "2025-11-10T10:00:00+00:00");
    git(&repo, &["tag", "1.1.0"], "2025-11-10T10:00:00+00:00");

    commit(&repo, "next.rs", 3, "2025-11-15T10:00:00+00:00");
}

fn write_config(root: &Path, projects: &[&str]) {
    let projects_dir = root.join("projects").display().to_string().replace('\\', "/");
    let included = projects
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let services: String = projects
        .iter()
        .map(|p| {
            format!(
                "[services.{p}]\ncategory = \"Core Infrastructure\"\ntags = [\"API\"]\ndescription = \"{p}\"\n\n"
            )
        })
        .collect();
    let config = format!(
        r#"[project]
projects_directory = "{projects_dir}"
included_projects = [{included}]
file_exclusions = ["*.lock"]

[categories]
priority = ["Core Infrastructure"]

[tags.descriptions]
API = "API development"

[[layers]]
name = "presentation_layer"
tags = ["API"]

{services}"#
    );
    fs::write(root.join("kpi.toml"), config).unwrap();
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_init_creates_config() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let output = kpi_cmd(dir.path())
        .arg("init")
        .output()
        .expect("failed to run kpi init");

    assert!(output.status.success(), "init should succeed: {}", stderr(&output));
    let content = fs::read_to_string(dir.path().join("kpi.toml")).unwrap();
    assert!(content.contains("[project]"));
    assert!(content.contains("[[layers]]"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    fs::write(dir.path().join("kpi.toml"), "# existing\n").unwrap();

    let output = kpi_cmd(dir.path()).arg("init").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("already exists"));
    assert_eq!(
        fs::read_to_string(dir.path().join("kpi.toml")).unwrap(),
        "# existing\n"
    );

    let output = kpi_cmd(dir.path()).args(["init", "--force"]).output().unwrap();
    assert!(output.status.success());
    assert!(fs::read_to_string(dir.path().join("kpi.toml"))
        .unwrap()
        .contains("[project]"));
}

#[test]
fn test_default_config_validates() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    kpi_cmd(dir.path()).arg("init").output().unwrap();

    let output = kpi_cmd(dir.path()).arg("validate").output().unwrap();
    assert!(output.status.success(), "validate failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Configuration is valid"));
    assert!(out.contains("api-gateway-service"));
}

#[test]
fn test_validate_reports_missing_metadata() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    fs::write(
        dir.path().join("kpi.toml"),
        "[project]\nincluded_projects = [\"orphan\"]\n",
    )
    .unwrap();

    let output = kpi_cmd(dir.path()).arg("validate").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(
        stderr(&output).contains("missing [services] metadata for: orphan"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn test_local_config_takes_precedence() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    kpi_cmd(dir.path()).arg("init").output().unwrap();
    fs::write(dir.path().join("kpi.local.toml"), "not = [valid").unwrap();

    let output = kpi_cmd(dir.path()).arg("validate").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("kpi.local.toml"));
}

#[test]
fn test_report_without_projects_exits_one() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_config(dir.path(), &["ghost"]);

    let output = kpi_cmd(dir.path())
        .args(["report", "--no-fetch"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("no analyzable projects"));
}

#[test]
fn test_text_report_on_git_repository() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    sample_repo(dir.path());
    write_config(dir.path(), &["svc-a", "ghost"]);

    let output = kpi_cmd(dir.path())
        .args(["report", "--no-fetch"])
        .output()
        .unwrap();
    let out = stdout(&output);
    assert!(output.status.success(), "stdout={out}, stderr={}", stderr(&output));
    assert!(out.contains("KPI Report - All Time"), "{out}");
    assert!(out.contains("1.1.0        2025-11-10 (latest)"), "{out}");
    assert!(out.contains("1.0.0        2025-10-05 → 3 commits (+25 / -0 lines)"), "{out}");
    assert!(!out.contains("not-a-version"));
    assert!(out.contains("Executive Summary"));
}

#[test]
fn test_json_report_on_git_repository() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    sample_repo(dir.path());
    write_config(dir.path(), &["svc-a"]);

    let output = kpi_cmd(dir.path())
        .args(["report", "--no-fetch", "--format", "json", "--compact"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr={}", stderr(&output));

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let project = &value["projects"][0];
    assert_eq!(project["name"], "svc-a");
    assert_eq!(project["release_count"], 2);
    assert_eq!(project["total_commits"], 3);
    assert_eq!(project["total_lines_added"], 25);
    assert_eq!(project["releases"][0]["commit_dates"].as_array().unwrap().len(), 1);
    assert_eq!(value["executive_summary"]["has_summary"], true);
}

#[test]
fn test_period_filter_excludes_inactive_project() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    sample_repo(dir.path());
    write_config(dir.path(), &["svc-a"]);

    let output = kpi_cmd(dir.path())
        .args(["report", "--no-fetch", "--format", "json", "--period", "2025-11"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr={}", stderr(&output));

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["period_display"], "November 2025");
    assert_eq!(value["projects"].as_array().unwrap().len(), 0);
    assert_eq!(value["excluded_projects"][0], "svc-a");
    assert_eq!(value["executive_summary"]["period_summary"], "maintenance");
}

#[test]
fn test_html_report_written_to_output_dir() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    sample_repo(dir.path());
    write_config(dir.path(), &["svc-a"]);
    let out_dir = dir.path().join("out");

    let output = kpi_cmd(dir.path())
        .args(["report", "--no-fetch", "--format", "html", "--period", "2025"])
        .arg("--output")
        .arg(&out_dir)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr={}", stderr(&output));

    let path = out_dir.join("kpi-report-2025.html");
    assert!(stdout(&output).contains("kpi-report-2025.html"));
    let html = fs::read_to_string(path).unwrap();
    assert!(html.contains("<svg"));
    assert!(html.contains("svc-a"));
}
