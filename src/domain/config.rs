use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The name of the configuration file in a project root.
pub const CONFIG_FILE: &str = "spectrace.toml";

/// Configuration for requirement extraction and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Specification files or directories, relative to the project root.
    ///
    /// Directories are searched recursively for `.md`, `.markdown` and `.txt`
    /// files.
    specifications: Vec<PathBuf>,

    /// Where requirement snapshots are written, relative to the project root.
    pub snapshot_dir: Option<PathBuf>,

    /// Whether implemented requirements also need a test to pass.
    ///
    /// When `false`, `MISSING_TEST` requirements do not fail the report.
    pub require_tests: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            specifications: default_specifications(),
            snapshot_dir: None,
            require_tests: true,
        }
    }
}

impl Config {
    /// Creates a configuration listing the given specification paths.
    #[must_use]
    pub fn new(specifications: Vec<PathBuf>) -> Self {
        Self {
            specifications,
            ..Self::default()
        }
    }

    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Loads `spectrace.toml` from `root`, falling back to the default
    /// configuration if it is missing or invalid.
    #[must_use]
    pub fn load_or_default(root: &Path) -> Self {
        Self::load(&root.join(CONFIG_FILE)).unwrap_or_else(|e| {
            tracing::debug!("Failed to load config: {e}");
            Self::default()
        })
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// The configured specification paths.
    #[must_use]
    pub fn specifications(&self) -> &[PathBuf] {
        &self.specifications
    }

    /// Adds a specification path.
    ///
    /// Returns `true` if the path was added, `false` if it was already listed.
    pub fn add_specification(&mut self, path: PathBuf) -> bool {
        if self.specifications.contains(&path) {
            false
        } else {
            self.specifications.push(path);
            true
        }
    }
}

fn default_specifications() -> Vec<PathBuf> {
    vec![PathBuf::from("specs")]
}

const fn default_require_tests() -> bool {
    true
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_specifications")]
        specifications: Vec<PathBuf>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot_dir: Option<PathBuf>,

        #[serde(default = "default_require_tests")]
        require_tests: bool,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                specifications,
                snapshot_dir,
                require_tests,
            } => Self {
                specifications,
                snapshot_dir,
                require_tests,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            specifications: config.specifications,
            snapshot_dir: config.snapshot_dir,
            require_tests: config.require_tests,
        }
    }
}
