//! Registered-repository metadata and the shared read surface used by
//! every protocol that sits on top of this core (CLI today; REST/MCP
//! are out of scope but would share this same code path).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::git::is_git_repo_url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenRepository {
    /// Alias without the `-global` suffix.
    pub alias: String,
    pub repo_name: String,
    /// `None` for a local/writer-backed repository with no remote URL.
    pub repo_url: Option<String>,
    pub last_refresh: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub enable_temporal: bool,
    #[serde(default)]
    pub enable_scip: bool,
}

impl GoldenRepository {
    /// A repository is scheduler-eligible iff its URL is a remote git
    /// URL; local/writer-backed repositories only refresh via explicit
    /// triggers from their writer services.
    pub fn is_scheduler_eligible(&self) -> bool {
        self.repo_url
            .as_deref()
            .map(is_git_repo_url)
            .unwrap_or(false)
    }
}

/// Protocol-normalized view of a repository, matching the field names
/// the upstream CLI/REST/MCP surfaces expect (`alias`, `url`, not the
/// internal `repo_url`/`alias_name`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSummary {
    pub alias: String,
    pub repo_name: String,
    pub url: Option<String>,
    pub last_refresh: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&GoldenRepository> for RepoSummary {
    fn from(repo: &GoldenRepository) -> Self {
        RepoSummary {
            alias: repo.alias.clone(),
            repo_name: repo.repo_name.clone(),
            url: repo.repo_url.clone(),
            last_refresh: repo.last_refresh,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStatus {
    pub alias: String,
    pub repo_name: String,
    pub url: Option<String>,
    pub last_refresh: Option<chrono::DateTime<chrono::Utc>>,
    pub enable_temporal: bool,
}

#[derive(Debug)]
pub enum RegistryError {
    Io(io::Error),
    Parse(serde_json::Error),
    NotFound(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Io(e) => write!(f, "registry I/O error: {}", e),
            RegistryError::Parse(e) => write!(f, "registry parse error: {}", e),
            RegistryError::NotFound(alias) => write!(
                f,
                "global repo '{}' not found. Run the list command to see available repos.",
                alias
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<io::Error> for RegistryError {
    fn from(e: io::Error) -> Self {
        RegistryError::Io(e)
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Parse(e)
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// One JSON record per alias under `.registry/`, written via
/// temp-file / fsync / rename-over — the same atomic-commit pattern
/// `alias::AliasFile` uses — so two aliases refreshing concurrently
/// never contend for, or clobber, the same file, and a crash mid-write
/// never leaves a truncated record behind.
pub struct Registry {
    dir: PathBuf,
}

impl Registry {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Registry {
            dir: root.as_ref().join(".registry"),
        }
    }

    fn record_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{}.json", alias))
    }

    fn temp_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", alias))
    }

    fn write_atomic(&self, repo: &GoldenRepository) -> RegistryResult<()> {
        fs::create_dir_all(&self.dir)?;

        let contents = serde_json::to_string_pretty(repo)?;
        let temp_path = self.temp_path(&repo.alias);

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;

        fs::rename(&temp_path, self.record_path(&repo.alias))?;

        if let Ok(dir) = fs::File::open(&self.dir) {
            let _ = dir.sync_all();
        }
        Ok(())
    }

    fn load_all(&self) -> RegistryResult<Vec<GoldenRepository>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut repos = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            repos.push(serde_json::from_str(&contents)?);
        }
        Ok(repos)
    }

    pub fn register(&self, repo: GoldenRepository) -> RegistryResult<()> {
        self.write_atomic(&repo)
    }

    pub fn get(&self, alias: &str) -> RegistryResult<Option<GoldenRepository>> {
        let path = self.record_path(alias);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn list_repos(&self) -> RegistryResult<Vec<RepoSummary>> {
        Ok(self.load_all()?.iter().map(RepoSummary::from).collect())
    }

    pub fn list_scheduler_eligible(&self) -> RegistryResult<Vec<GoldenRepository>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(GoldenRepository::is_scheduler_eligible)
            .collect())
    }

    pub fn get_status(&self, alias: &str) -> RegistryResult<RepoStatus> {
        let repo = self
            .get(alias)?
            .ok_or_else(|| RegistryError::NotFound(alias.to_string()))?;
        Ok(RepoStatus {
            alias: repo.alias,
            repo_name: repo.repo_name,
            url: repo.repo_url,
            last_refresh: repo.last_refresh,
            enable_temporal: repo.enable_temporal,
        })
    }

    pub fn set_last_refresh(&self, alias: &str, when: chrono::DateTime<chrono::Utc>) -> RegistryResult<()> {
        let mut repo = self
            .get(alias)?
            .ok_or_else(|| RegistryError::NotFound(alias.to_string()))?;
        repo.last_refresh = Some(when);
        self.write_atomic(&repo)
    }

    pub fn set_feature_flags(&self, alias: &str, enable_temporal: bool, enable_scip: bool) -> RegistryResult<()> {
        let mut repo = self
            .get(alias)?
            .ok_or_else(|| RegistryError::NotFound(alias.to_string()))?;
        repo.enable_temporal = enable_temporal;
        repo.enable_scip = enable_scip;
        self.write_atomic(&repo)
    }
}
