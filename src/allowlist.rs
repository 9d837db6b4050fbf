use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

/// Pre-approved base mints, loaded once at startup
///
/// One mint per line; blank lines and `#` comments are skipped. In
/// allow-list mode the buyer only enters pools whose base mint appears here
/// and bypasses predicate filtering entirely.
#[derive(Debug, Default)]
pub struct AllowList {
    entries: HashSet<String>,
}

impl AllowList {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read allow list at {}", path.display()))?;

        let entries: HashSet<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        tracing::info!("Loaded {} mints from {}", entries.len(), path.display());

        Ok(Self { entries })
    }

    /// An empty list; every lookup misses
    pub fn empty() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_entries(entries: &[&str]) -> Self {
        Self {
            entries: entries.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn contains(&self, mint: &str) -> bool {
        self.entries.contains(mint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
