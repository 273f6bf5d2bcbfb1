use std::cmp::Ordering;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use crate::config::Config;
use crate::period::Period;
use crate::types::{Release, ReleaseMetrics, ServiceRecord};

/// A tag and the commit time of the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

/// One `git diff --numstat` entry. Counts are `None` for binary files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub added: Option<u64>,
    pub removed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    Network,
    Auth,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    NoRemote,
    UpToDate,
    NewTags(usize),
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn message(&self) -> String {
        match self {
            FetchOutcome::NoRemote => "no remote configured, using local tags".to_string(),
            FetchOutcome::UpToDate => "already up to date".to_string(),
            FetchOutcome::NewTags(1) => "fetched 1 new tag".to_string(),
            FetchOutcome::NewTags(n) => format!("fetched {n} new tags"),
            FetchOutcome::Failed(FetchFailure::Network) => {
                "fetch failed (network), using local tags".to_string()
            }
            FetchOutcome::Failed(FetchFailure::Auth) => {
                "fetch failed (auth required), using local tags".to_string()
            }
            FetchOutcome::Failed(FetchFailure::Other) => {
                "fetch failed, using local tags".to_string()
            }
        }
    }
}

/// Read access to a project's release history.
pub trait RepositorySource {
    fn is_repository(&self, path: &Path) -> bool;

    /// Update tags from the remote. Never fails; problems are reported in the outcome.
    fn fetch(&self, path: &Path) -> FetchOutcome;

    /// Semantic-version tags, newest first.
    fn tags(&self, path: &Path) -> Result<Vec<Tag>>;

    /// Commit times reachable from `to` but not from `from`.
    fn commit_dates(&self, path: &Path, from: &str, to: &str) -> Result<Vec<DateTime<Utc>>>;

    fn numstat(&self, path: &Path, from: &str, to: &str) -> Result<Vec<FileChange>>;
}

/// [`RepositorySource`] backed by the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    fn run(&self, path: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(path)
            .output()
            .with_context(|| format!("failed to run git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed in {}: {}",
                args.join(" "),
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl RepositorySource for GitCli {
    fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn fetch(&self, path: &Path) -> FetchOutcome {
        let remotes = match self.run(path, &["remote"]) {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!(error = %e, "could not list remotes");
                return FetchOutcome::Failed(FetchFailure::Other);
            }
        };
        let Some(remote) = pick_remote(&remotes) else {
            return FetchOutcome::NoRemote;
        };

        let output = Command::new("git")
            .args(["fetch", "--tags", "--prune", remote])
            .current_dir(path)
            .output();
        match output {
            Ok(o) if o.status.success() => {
                // git reports fetched refs on stderr
                match count_new_tags(&String::from_utf8_lossy(&o.stderr)) {
                    0 => FetchOutcome::UpToDate,
                    n => FetchOutcome::NewTags(n),
                }
            }
            Ok(o) => {
                let stderr = String::from_utf8_lossy(&o.stderr);
                tracing::debug!(stderr = %stderr.trim(), "git fetch failed");
                FetchOutcome::Failed(classify_fetch_error(&stderr))
            }
            Err(e) => {
                tracing::debug!(error = %e, "could not run git fetch");
                FetchOutcome::Failed(FetchFailure::Other)
            }
        }
    }

    fn tags(&self, path: &Path) -> Result<Vec<Tag>> {
        let out = self.run(
            path,
            &[
                "for-each-ref",
                "refs/tags",
                "--format=%(refname:strip=2)%09%(committerdate:unix)%09%(*committerdate:unix)",
            ],
        )?;
        Ok(parse_tag_listing(&out))
    }

    fn commit_dates(&self, path: &Path, from: &str, to: &str) -> Result<Vec<DateTime<Utc>>> {
        let range = format!("{from}..{to}");
        let out = self.run(path, &["log", "--format=%ct", &range])?;
        Ok(parse_commit_dates(&out))
    }

    fn numstat(&self, path: &Path, from: &str, to: &str) -> Result<Vec<FileChange>> {
        let out = self.run(path, &["diff", "--numstat", from, to])?;
        Ok(parse_numstat(&out))
    }
}

fn pick_remote(listing: &str) -> Option<&str> {
    let remotes: Vec<&str> = listing.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    remotes
        .iter()
        .find(|r| **r == "origin")
        .or_else(|| remotes.first())
        .copied()
}

fn count_new_tags(fetch_stderr: &str) -> usize {
    fetch_stderr.lines().filter(|l| l.contains("[new tag]")).count()
}

fn classify_fetch_error(stderr: &str) -> FetchFailure {
    let lower = stderr.to_lowercase();
    if lower.contains("authentication") || lower.contains("permission denied") {
        FetchFailure::Auth
    } else if lower.contains("could not resolve host")
        || lower.contains("connection")
        || lower.contains("timed out")
        || lower.contains("timeout")
    {
        FetchFailure::Network
    } else {
        FetchFailure::Other
    }
}

fn semver_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([A-Za-z0-9]+))?$").expect("valid semver pattern")
    })
}

/// `1.2.3` or `1.2.3-rc1`. A `v` prefix is not accepted.
pub fn is_semantic_version(name: &str) -> bool {
    semver_regex().is_match(name)
}

/// Orders versions numerically; a release sorts above its prereleases.
fn compare_versions(a: &str, b: &str) -> Ordering {
    let key = |name: &str| {
        semver_regex().captures(name).map(|c| {
            let num = |i: usize| c.get(i).and_then(|m| m.as_str().parse::<u64>().ok()).unwrap_or(0);
            let pre = c.get(4).map(|m| m.as_str().to_string());
            (num(1), num(2), num(3), pre.is_none(), pre)
        })
    };
    key(a).cmp(&key(b))
}

/// Parse `name<TAB>commit time<TAB>peeled commit time` lines, keeping
/// semantic versions, newest first.
pub fn parse_tag_listing(listing: &str) -> Vec<Tag> {
    let mut tags: Vec<Tag> = listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next()?.trim();
            let direct = fields.next().unwrap_or("").trim();
            let peeled = fields.next().unwrap_or("").trim();
            if !is_semantic_version(name) {
                tracing::debug!(tag = name, "skipping non-semver tag");
                return None;
            }
            // Annotated tags carry the commit time on the peeled object.
            let raw = if peeled.is_empty() { direct } else { peeled };
            match parse_unix(raw) {
                Some(timestamp) => Some(Tag {
                    name: name.to_string(),
                    timestamp,
                }),
                None => {
                    tracing::warn!(tag = name, value = raw, "could not parse tag date");
                    None
                }
            }
        })
        .collect();

    tags.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| compare_versions(&b.name, &a.name))
    });
    tags
}

fn parse_unix(raw: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = raw.parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

pub fn parse_commit_dates(log: &str) -> Vec<DateTime<Utc>> {
    log.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(parse_unix)
        .collect()
}

pub fn parse_numstat(diff: &str) -> Vec<FileChange> {
    diff.lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let added = parts.next()?;
            let removed = parts.next()?;
            let path = parts.next()?;
            Some(FileChange {
                path: path.to_string(),
                added: added.parse().ok(),
                removed: removed.parse().ok(),
            })
        })
        .collect()
}

/// Glob patterns excluding generated or vendored files from line counts.
#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    set: GlobSet,
}

impl ExclusionMatcher {
    /// Invalid patterns are logged and ignored.
    pub fn new(patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => tracing::warn!(pattern = %pattern, error = %e, "invalid exclusion pattern"),
            }
        }
        let set = builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not build exclusion set, excluding nothing");
            GlobSet::empty()
        });
        Self { set }
    }

    /// Matches against the full path and against the bare file name.
    pub fn is_excluded(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        self.set.is_match(path) || self.set.is_match(file_name)
    }

    /// Sum added/removed lines, skipping excluded and binary entries.
    pub fn line_totals(&self, changes: &[FileChange]) -> (u64, u64) {
        changes
            .iter()
            .filter(|c| !self.is_excluded(&c.path))
            .fold((0, 0), |(added, removed), c| {
                (added + c.added.unwrap_or(0), removed + c.removed.unwrap_or(0))
            })
    }
}

/// Walks the configured projects and turns their tags into service records.
pub struct Collector<S> {
    source: S,
    exclusions: ExclusionMatcher,
    period: Period,
    fetch: bool,
}

impl Collector<GitCli> {
    pub fn git(config: &Config, period: Period, fetch: bool) -> Self {
        Self::new(
            GitCli,
            ExclusionMatcher::new(&config.project.file_exclusions),
            period,
            fetch,
        )
    }
}

impl<S: RepositorySource> Collector<S> {
    pub fn new(source: S, exclusions: ExclusionMatcher, period: Period, fetch: bool) -> Self {
        Self {
            source,
            exclusions,
            period,
            fetch,
        }
    }

    /// Collect every included project. Projects that cannot be read are
    /// skipped with a warning.
    pub fn collect(&self, config: &Config) -> Vec<ServiceRecord> {
        let total = config.project.included_projects.len();
        let mut records = Vec::with_capacity(total);

        for (i, name) in config.project.included_projects.iter().enumerate() {
            let path = config.project.projects_directory.join(name);
            tracing::info!(project = %name, "[{}/{}] processing", i + 1, total);

            if !path.exists() {
                tracing::warn!(project = %name, path = %path.display(), "project directory not found, skipping");
                continue;
            }
            if !self.source.is_repository(&path) {
                tracing::warn!(project = %name, path = %path.display(), "not a git repository, skipping");
                continue;
            }
            if self.fetch {
                let outcome = self.source.fetch(&path);
                match outcome {
                    FetchOutcome::Failed(_) => tracing::warn!(project = %name, "{}", outcome.message()),
                    _ => tracing::info!(project = %name, "{}", outcome.message()),
                }
            }

            match self.collect_project(name, &path) {
                Ok(Some(record)) => {
                    tracing::info!(
                        project = %name,
                        releases = record.release_count,
                        commits = record.total_commits,
                        lines_added = record.total_lines_added,
                        "collected"
                    );
                    records.push(record);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(project = %name, "error processing project: {e:#}"),
            }
        }

        records
    }

    /// Build one project's record. `Ok(None)` when it has no semantic tags.
    pub fn collect_project(&self, name: &str, path: &Path) -> Result<Option<ServiceRecord>> {
        let tags = self
            .source
            .tags(path)
            .with_context(|| format!("failed to read tags for {name}"))?;
        if tags.is_empty() {
            tracing::warn!(project = %name, "no semantic version tags, skipping");
            return Ok(None);
        }

        let mut releases = Vec::new();
        for (i, tag) in tags.iter().enumerate() {
            let date = tag.timestamp.date_naive();
            if !self.period.contains(date) {
                continue;
            }

            if i == 0 {
                let unreleased = self
                    .source
                    .commit_dates(path, &tag.name, "HEAD")
                    .unwrap_or_else(|e| {
                        tracing::warn!(project = %name, tag = %tag.name, "could not count unreleased commits: {e:#}");
                        Vec::new()
                    });
                releases.push(Release {
                    version: tag.name.clone(),
                    date,
                    metrics: None,
                    commit_dates: unreleased,
                });
                continue;
            }

            let newer = &tags[i - 1].name;
            let commit_dates = self
                .source
                .commit_dates(path, &tag.name, newer)
                .unwrap_or_else(|e| {
                    tracing::warn!(project = %name, "could not count commits {}..{newer}: {e:#}", tag.name);
                    Vec::new()
                });
            let (lines_added, lines_removed) = match self.source.numstat(path, &tag.name, newer) {
                Ok(changes) => self.exclusions.line_totals(&changes),
                Err(e) => {
                    tracing::warn!(project = %name, "could not calculate line changes {}..{newer}: {e:#}", tag.name);
                    (0, 0)
                }
            };

            releases.push(Release {
                version: tag.name.clone(),
                date,
                metrics: Some(ReleaseMetrics {
                    commits: commit_dates.len() as u64,
                    lines_added,
                    lines_removed,
                }),
                commit_dates,
            });
        }

        let (commits, added, removed) = releases
            .iter()
            .filter_map(|r| r.metrics)
            .fold((0, 0, 0), |(c, a, r), m| {
                (c + m.commits, a + m.lines_added, r + m.lines_removed)
            });

        Ok(Some(
            ServiceRecord::new(name, commits, added, removed, releases.len() as u64)
                .with_releases(releases),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    /// In-memory repository keyed by `from..to` ranges.
    #[derive(Default)]
    struct FakeSource {
        tags: Vec<Tag>,
        commits: HashMap<String, Vec<DateTime<Utc>>>,
        diffs: HashMap<String, Vec<FileChange>>,
        fetch: Option<FetchOutcome>,
    }

    impl FakeSource {
        fn tag(mut self, name: &str, at: DateTime<Utc>) -> Self {
            self.tags.push(Tag {
                name: name.to_string(),
                timestamp: at,
            });
            self
        }

        fn range(mut self, from: &str, to: &str, dates: Vec<DateTime<Utc>>, changes: Vec<FileChange>) -> Self {
            self.commits.insert(format!("{from}..{to}"), dates);
            self.diffs.insert(format!("{from}..{to}"), changes);
            self
        }
    }

    impl RepositorySource for FakeSource {
        fn is_repository(&self, _path: &Path) -> bool {
            true
        }

        fn fetch(&self, _path: &Path) -> FetchOutcome {
            self.fetch.unwrap_or(FetchOutcome::NoRemote)
        }

        fn tags(&self, _path: &Path) -> Result<Vec<Tag>> {
            Ok(self.tags.clone())
        }

        fn commit_dates(&self, _path: &Path, from: &str, to: &str) -> Result<Vec<DateTime<Utc>>> {
            match self.commits.get(&format!("{from}..{to}")) {
                Some(dates) => Ok(dates.clone()),
                None => bail!("unknown range {from}..{to}"),
            }
        }

        fn numstat(&self, _path: &Path, from: &str, to: &str) -> Result<Vec<FileChange>> {
            Ok(self.diffs.get(&format!("{from}..{to}")).cloned().unwrap_or_default())
        }
    }

    fn change(path: &str, added: u64, removed: u64) -> FileChange {
        FileChange {
            path: path.to_string(),
            added: Some(added),
            removed: Some(removed),
        }
    }

    fn sample_source() -> FakeSource {
        FakeSource::default()
            .tag("1.2.0", ts(2025, 11, 20))
            .tag("1.1.0", ts(2025, 11, 5))
            .tag("1.0.0", ts(2025, 10, 1))
            .range("1.2.0", "HEAD", vec![ts(2025, 11, 25)], vec![])
            .range(
                "1.1.0",
                "1.2.0",
                vec![ts(2025, 11, 10), ts(2025, 11, 18)],
                vec![change("src/lib.rs", 120, 20), change("Cargo.lock", 500, 400)],
            )
            .range(
                "1.0.0",
                "1.1.0",
                vec![ts(2025, 10, 15)],
                vec![change("src/main.rs", 30, 5)],
            )
    }

    fn collector(source: FakeSource, period: Period) -> Collector<FakeSource> {
        Collector::new(source, ExclusionMatcher::new(&["*.lock".to_string()]), period, false)
    }

    #[test]
    fn test_semantic_version_filter() {
        assert!(is_semantic_version("1.2.3"));
        assert!(is_semantic_version("10.20.30"));
        assert!(is_semantic_version("1.2.3-rc1"));
        assert!(!is_semantic_version("v1.2.3"));
        assert!(!is_semantic_version("1.2"));
        assert!(!is_semantic_version("1.2.3-rc.1"));
        assert!(!is_semantic_version("production"));
    }

    #[test]
    fn test_parse_tag_listing_sorts_newest_first() {
        let listing = "1.0.0\t1700000000\t\n\
                       v2.0.0\t1800000000\t\n\
                       1.1.0\t1600000000\t1750000000\n\
                       staging\t1900000000\t\n";
        let tags = parse_tag_listing(listing);
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        // 1.1.0 is annotated; its peeled commit date wins.
        assert_eq!(names, vec!["1.1.0", "1.0.0"]);
        assert_eq!(tags[0].timestamp.timestamp(), 1750000000);
    }

    #[test]
    fn test_same_commit_tags_order_by_version() {
        let listing = "1.0.0-rc1\t1700000000\t\n1.0.0\t1700000000\t\n0.9.0\t1700000000\t\n";
        let names: Vec<String> = parse_tag_listing(listing).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["1.0.0", "1.0.0-rc1", "0.9.0"]);
    }

    #[test]
    fn test_parse_numstat_handles_binary_entries() {
        let diff = "10\t2\tsrc/lib.rs\n-\t-\tassets/logo.png\n3\t0\tpath with\ttab.txt\n";
        let changes = parse_numstat(diff);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[1].added, None);
        assert_eq!(changes[2].path, "path with\ttab.txt");
    }

    #[test]
    fn test_exclusions_match_path_and_file_name() {
        let matcher = ExclusionMatcher::new(&[
            "*.lock".to_string(),
            "package-lock.json".to_string(),
            "node_modules/*".to_string(),
            "*.min.js".to_string(),
        ]);
        assert!(matcher.is_excluded("Cargo.lock"));
        assert!(matcher.is_excluded("web/package-lock.json"));
        assert!(matcher.is_excluded("node_modules/react/index.js"));
        assert!(matcher.is_excluded("static/js/app.min.js"));
        assert!(!matcher.is_excluded("src/main.rs"));
    }

    #[test]
    fn test_invalid_exclusion_pattern_is_ignored() {
        let matcher = ExclusionMatcher::new(&["[".to_string(), "*.lock".to_string()]);
        assert!(matcher.is_excluded("yarn.lock"));
        assert!(!matcher.is_excluded("src/lib.rs"));
    }

    #[test]
    fn test_line_totals_skip_excluded_and_binary() {
        let matcher = ExclusionMatcher::new(&["*.lock".to_string()]);
        let changes = vec![
            change("src/lib.rs", 10, 4),
            change("Cargo.lock", 900, 800),
            FileChange {
                path: "logo.png".to_string(),
                added: None,
                removed: None,
            },
        ];
        assert_eq!(matcher.line_totals(&changes), (10, 4));
    }

    #[test]
    fn test_collect_project_all_time() {
        let record = collector(sample_source(), Period::All)
            .collect_project("svc", Path::new("/repo"))
            .unwrap()
            .unwrap();

        assert_eq!(record.release_count, 3);
        assert_eq!(record.total_commits, 3);
        assert_eq!(record.total_lines_added, 150);
        assert_eq!(record.total_lines_removed, 25);
        assert_eq!(record.net_change, 125);

        let latest = &record.releases[0];
        assert!(latest.is_latest());
        assert_eq!(latest.commit_dates.len(), 1, "unreleased commits after newest tag");
        assert_eq!(
            record.releases[1].metrics,
            Some(ReleaseMetrics {
                commits: 2,
                lines_added: 120,
                lines_removed: 20
            })
        );
        assert_eq!(record.releases[2].date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
    }

    #[test]
    fn test_collect_project_filters_by_period() {
        let record = collector(sample_source(), "2025-10".parse().unwrap())
            .collect_project("svc", Path::new("/repo"))
            .unwrap()
            .unwrap();
        assert_eq!(record.release_count, 1);
        assert_eq!(record.releases[0].version, "1.0.0");
        assert_eq!(record.total_commits, 1);
        assert_eq!(record.total_lines_added, 30);
    }

    #[test]
    fn test_collect_project_without_tags() {
        let result = collector(FakeSource::default(), Period::All)
            .collect_project("svc", Path::new("/repo"))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_git_errors_degrade_to_zero() {
        // No ranges registered: every commit lookup fails.
        let source = FakeSource::default()
            .tag("2.0.0", ts(2025, 5, 1))
            .tag("1.0.0", ts(2025, 4, 1));
        let record = collector(source, Period::All)
            .collect_project("svc", Path::new("/repo"))
            .unwrap()
            .unwrap();
        assert_eq!(record.release_count, 2);
        assert_eq!(record.total_commits, 0);
        assert!(record.releases[0].commit_dates.is_empty());
    }

    #[test]
    fn test_collect_skips_missing_projects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("svc")).unwrap();

        let mut config = Config::default();
        config.project.projects_directory = PathBuf::from(dir.path());
        config.project.included_projects = vec!["svc".to_string(), "ghost".to_string()];

        let records = collector(sample_source(), Period::All).collect(&config);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "svc");
    }

    #[test]
    fn test_fetch_helpers() {
        assert_eq!(pick_remote("upstream\norigin\n"), Some("origin"));
        assert_eq!(pick_remote("upstream\n"), Some("upstream"));
        assert_eq!(pick_remote(""), None);

        let stderr = "From github.com:acme/svc\n * [new tag]         1.2.0      -> 1.2.0\n * [new tag]         1.3.0      -> 1.3.0\n";
        assert_eq!(count_new_tags(stderr), 2);

        assert_eq!(
            classify_fetch_error("fatal: Could not resolve host: github.com"),
            FetchFailure::Network
        );
        assert_eq!(
            classify_fetch_error("git@github.com: Permission denied (publickey)."),
            FetchFailure::Auth
        );
        assert_eq!(classify_fetch_error("fatal: bad object"), FetchFailure::Other);
        assert_eq!(FetchOutcome::NewTags(1).message(), "fetched 1 new tag");
    }
}
