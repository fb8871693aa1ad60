//! Image-to-item association by file naming convention

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// File extensions treated as images
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// How an image file name encodes its item code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// `ART123.jpg`
    Exact,
    /// `ART123_2.jpg`
    Prefix,
    /// `ART123-2.jpg`
    #[default]
    SuffixDash,
}

impl MatchMode {
    fn separator(&self) -> Option<char> {
        match self {
            MatchMode::Exact => None,
            MatchMode::Prefix => Some('_'),
            MatchMode::SuffixDash => Some('-'),
        }
    }

    /// Split a file stem into item code and ordinal.
    ///
    /// A missing or non-numeric ordinal means the whole stem is the item code
    /// with ordinal 1.
    pub fn split_stem<'a>(&self, stem: &'a str) -> (&'a str, u32) {
        let Some(separator) = self.separator() else {
            return (stem, 1);
        };
        match stem.rsplit_once(separator) {
            Some((code, suffix))
                if !code.is_empty()
                    && !suffix.is_empty()
                    && suffix.chars().all(|c| c.is_ascii_digit()) =>
            {
                (code, suffix.parse().unwrap_or(1))
            }
            _ => (stem, 1),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchMode::Exact => "exact",
            MatchMode::Prefix => "prefix",
            MatchMode::SuffixDash => "suffix-dash",
        };
        f.write_str(name)
    }
}

/// What happens to the attachments an item already has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImageMode {
    /// Upload next to the existing attachments
    #[default]
    Add,
    /// Remove existing attachments, then upload
    Replace,
    /// Only remove existing attachments
    Delete,
}

impl fmt::Display for ImageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageMode::Add => "add",
            ImageMode::Replace => "replace",
            ImageMode::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAssociation {
    pub item_code: String,
    pub ordinal: u32,
    pub file_path: PathBuf,
    pub is_primary: bool,
}

/// Why a file was not associated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmatchedReason {
    NotAnImage,
    NoFileName,
    UnknownItem(String),
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedReason::NotAnImage => f.write_str("not an image file"),
            UnmatchedReason::NoFileName => f.write_str("no usable file name"),
            UnmatchedReason::UnknownItem(code) => write!(f, "no item '{}'", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedImage {
    pub file_path: PathBuf,
    pub reason: UnmatchedReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationReport {
    /// Grouped by item code (ascending), ordinal order within a code
    pub associations: Vec<ImageAssociation>,
    pub unmatched: Vec<UnmatchedImage>,
}

impl AssociationReport {
    /// Associations grouped by item code
    pub fn by_item(&self) -> BTreeMap<&str, Vec<&ImageAssociation>> {
        let mut groups: BTreeMap<&str, Vec<&ImageAssociation>> = BTreeMap::new();
        for association in &self.associations {
            groups
                .entry(association.item_code.as_str())
                .or_default()
                .push(association);
        }
        groups
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageAssociationEngine {
    known_codes: Option<HashSet<String>>,
}

impl ImageAssociationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only associate files whose item code is in `codes`; others are
    /// reported as unmatched
    pub fn with_known_codes(mut self, codes: impl IntoIterator<Item = String>) -> Self {
        self.known_codes = Some(codes.into_iter().collect());
        self
    }

    pub fn associate(&self, files: &[PathBuf], mode: MatchMode) -> AssociationReport {
        let mut report = AssociationReport::default();
        let mut groups: BTreeMap<String, Vec<(u32, String, PathBuf)>> = BTreeMap::new();

        for path in files {
            if !is_image(path) {
                report.unmatched.push(UnmatchedImage {
                    file_path: path.clone(),
                    reason: UnmatchedReason::NotAnImage,
                });
                continue;
            }
            let (Some(stem), Some(file_name)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.file_name().and_then(|s| s.to_str()),
            ) else {
                report.unmatched.push(UnmatchedImage {
                    file_path: path.clone(),
                    reason: UnmatchedReason::NoFileName,
                });
                continue;
            };

            let (code, ordinal) = mode.split_stem(stem.trim());
            if code.is_empty() {
                report.unmatched.push(UnmatchedImage {
                    file_path: path.clone(),
                    reason: UnmatchedReason::NoFileName,
                });
                continue;
            }
            if self
                .known_codes
                .as_ref()
                .is_some_and(|known| !known.contains(code))
            {
                report.unmatched.push(UnmatchedImage {
                    file_path: path.clone(),
                    reason: UnmatchedReason::UnknownItem(code.to_string()),
                });
                continue;
            }

            groups
                .entry(code.to_string())
                .or_default()
                .push((ordinal, file_name.to_string(), path.clone()));
        }

        for (code, mut files) in groups {
            files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            // Ordinal 1 is the main image; without one the first file is
            let primary = files.iter().position(|f| f.0 == 1).unwrap_or(0);
            for (index, (ordinal, _, file_path)) in files.into_iter().enumerate() {
                report.associations.push(ImageAssociation {
                    item_code: code.clone(),
                    ordinal,
                    file_path,
                    is_primary: index == primary,
                });
            }
        }

        for unmatched in &report.unmatched {
            warn!(
                "Image {} not associated: {}",
                unmatched.file_path.display(),
                unmatched.reason
            );
        }
        debug!(
            "Associated {} images ({} unmatched) in {} mode",
            report.associations.len(),
            report.unmatched.len(),
            mode
        );
        report
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// List the files of a directory (not recursive), sorted by name
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read image directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
