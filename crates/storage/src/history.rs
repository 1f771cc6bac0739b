use std::{collections::HashSet, sync::Arc};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::KeyValueStore;

pub const PROMPT_HISTORY_KEY: &str = "promptHistory";
pub const MAX_HISTORY_ENTRIES: usize = 10;

/// Most-recent-first list of distinct prompts, persisted as a JSON array.
pub struct PromptHistory {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<String>,
}

impl PromptHistory {
    /// Reads the persisted list once. A corrupt value is logged and replaced
    /// by an empty history on the next write; repeated prompts keep their
    /// first (most recent) position.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let raw = store
            .get(PROMPT_HISTORY_KEY)
            .await
            .context("failed to read prompt history")?;

        let stored = match raw {
            None => Vec::new(),
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|error| {
                warn!(%error, "failed to parse stored prompt history; starting empty");
                Vec::new()
            }),
        };

        Ok(Self {
            store,
            entries: normalized(stored),
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves `prompt` to the front and rewrites the stored list. Blank
    /// prompts are ignored.
    pub async fn record(&mut self, prompt: &str) -> Result<()> {
        if prompt.trim().is_empty() {
            return Ok(());
        }

        self.entries = with_recent(&self.entries, prompt);
        self.persist().await?;
        debug!(entries = self.entries.len(), "prompt history updated");
        Ok(())
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.store
            .remove(PROMPT_HISTORY_KEY)
            .await
            .context("failed to clear prompt history")
    }

    async fn persist(&self) -> Result<()> {
        let encoded = serde_json::to_string(&self.entries)?;
        self.store
            .set(PROMPT_HISTORY_KEY, &encoded)
            .await
            .context("failed to write prompt history")
    }
}

fn normalized(stored: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    stored
        .into_iter()
        .filter(|prompt| !prompt.trim().is_empty() && seen.insert(prompt.clone()))
        .take(MAX_HISTORY_ENTRIES)
        .collect()
}

fn with_recent(entries: &[String], prompt: &str) -> Vec<String> {
    std::iter::once(prompt.to_string())
        .chain(entries.iter().filter(|item| item.as_str() != prompt).cloned())
        .take(MAX_HISTORY_ENTRIES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_moves_to_front_without_repeating() {
        let entries = vec!["b".to_string(), "a".to_string(), "c".to_string()];
        assert_eq!(with_recent(&entries, "a"), ["a", "b", "c"]);
    }

    #[test]
    fn stored_duplicates_keep_first_occurrence() {
        let stored: Vec<String> = ["a", "b", "a", "", "c", "b"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(normalized(stored), ["a", "b", "c"]);
    }

    #[test]
    fn keeps_only_the_ten_most_recent() {
        let entries: Vec<String> = (0..MAX_HISTORY_ENTRIES).map(|i| format!("p{i}")).collect();
        let updated = with_recent(&entries, "newest");
        assert_eq!(updated.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(updated[0], "newest");
        assert!(!updated.contains(&"p9".to_string()));
    }
}
