//! Repository domain model

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Marker files used to guess a repository's primary language, checked in order
const LANGUAGE_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "rust"),
    ("go.mod", "go"),
    ("package.json", "javascript"),
    ("pyproject.toml", "python"),
    ("setup.py", "python"),
    ("requirements.txt", "python"),
    ("pom.xml", "java"),
    ("build.gradle", "java"),
];

/// A codebase under evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Display name
    pub name: String,

    /// Location on disk
    pub path: PathBuf,

    /// Remote URL, if known
    #[serde(default)]
    pub url: Option<String>,

    /// Checked-out branch, if known
    #[serde(default)]
    pub branch: Option<String>,

    /// Detected primary language tag (e.g. "rust")
    #[serde(default)]
    pub language: Option<String>,
}

impl Repository {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            url: None,
            branch: None,
            language: None,
        }
    }

    /// Build a repository from a path, naming it after the directory and
    /// detecting its language from marker files
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            name,
            path: path.to_path_buf(),
            url: None,
            branch: None,
            language: detect_language(path),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

/// Guess the primary language of the repository rooted at `path`
pub fn detect_language(path: &Path) -> Option<String> {
    LANGUAGE_MARKERS
        .iter()
        .find(|(marker, _)| path.join(marker).is_file())
        .map(|(_, language)| language.to_string())
}
