use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "mozdep.toml";
/// Overrides the tree location from the config file.
pub const REPO_ENV: &str = "MOZDEP_REPO";

const DEFAULT_CHUNK_SIZE: usize = 50;

/// Settings read from `mozdep.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// mozilla-central / mozilla-unified checkout.
    pub repo: Option<PathBuf>,
    /// Detectors to run when none are named on the command line.
    pub detectors: Vec<String>,
    /// Paths per `mach file-info` call.
    pub chunk_size: usize,
    /// `mach` to use instead of the one at the tree root.
    pub mach: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: None,
            detectors: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            mach: None,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read `path`, or `./mozdep.toml` if it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let local = PathBuf::from(CONFIG_FILE);
                if !local.is_file() {
                    return Ok(Self::default());
                }
                local
            }
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("invalid TOML in {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Pick the source tree: `flag`, then `env`, then the config file, then
    /// the first well-known checkout location holding a `mach` script.
    ///
    /// Explicit choices only need to be directories.
    pub fn resolve_repo(
        &self,
        flag: Option<&Path>,
        env: Option<OsString>,
        home: Option<&Path>,
    ) -> Option<PathBuf> {
        let explicit = flag
            .map(Path::to_path_buf)
            .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
            .or_else(|| self.repo.clone());
        if let Some(dir) = explicit {
            return dir.is_dir().then(|| dir.canonicalize().unwrap_or(dir));
        }
        repo_guesses(home)
            .into_iter()
            .find(|guess| guess.join("mach").is_file())
            .map(|guess| guess.canonicalize().unwrap_or(guess))
    }
}

/// Where checkouts usually live, most likely first.
pub fn repo_guesses(home: Option<&Path>) -> Vec<PathBuf> {
    let mut guesses = Vec::new();
    for tree in ["mozilla-unified", "mozilla-central"] {
        if let Some(home) = home {
            guesses.push(home.join(tree));
            guesses.push(home.join("dev").join(tree));
            guesses.push(home.join("src").join(tree));
        }
        guesses.push(Path::new("..").join(tree));
        guesses.push(Path::new("../..").join(tree));
    }
    guesses
}

/// Resolved settings handed to every detector.
#[derive(Debug, Clone)]
pub struct DetectorContext {
    pub tree: PathBuf,
    pub config: Config,
}

impl DetectorContext {
    pub fn new(tree: PathBuf, config: Config) -> Self {
        Self { tree, config }
    }

    pub fn mach(&self) -> PathBuf {
        self.config
            .mach
            .clone()
            .unwrap_or_else(|| self.tree.join("mach"))
    }
}
