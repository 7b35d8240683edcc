//! The main section of a jar manifest (`META-INF/MANIFEST.MF`).

use thiserror::Error;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Attribute naming the class to resolve at boot.
pub const BOOT_CLASS: &str = "Boot-Class";

/// Space-separated entries of the jar to add as archives of their own.
pub const CLASS_PATH: &str = "Compact-Class-Path";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("line {0}: continuation without a preceding attribute")]
    DanglingContinuation(usize),
    #[error("line {0}: expected `Name: value`")]
    InvalidLine(usize),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    attributes: Vec<(String, String)>,
}

impl Manifest {
    /// Parses the main section. Parsing stops at the first blank line, which
    /// starts the per-entry sections.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut attributes: Vec<(String, String)> = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if line.is_empty() {
                break;
            }
            if let Some(rest) = line.strip_prefix(' ') {
                let (_, value) = attributes
                    .last_mut()
                    .ok_or(ManifestError::DanglingContinuation(line_no))?;
                value.push_str(rest);
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(ManifestError::InvalidLine(line_no))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ManifestError::InvalidLine(line_no));
            }
            let value = value.strip_prefix(' ').unwrap_or(value);
            attributes.push((name.to_owned(), value.to_owned()));
        }

        Ok(Self { attributes })
    }

    /// Attribute names compare case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn boot_class(&self) -> Option<&str> {
        self.get(BOOT_CLASS).map(str::trim).filter(|value| !value.is_empty())
    }

    pub fn class_path(&self) -> Vec<&str> {
        self.get(CLASS_PATH)
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }
}
