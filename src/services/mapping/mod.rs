use crate::error::{RecError, RecResult};
use crate::utils::is_external_id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bidirectional table between external opaque identifiers and the dense
/// zero-based indices the embedding model operates on.
///
/// Invariant: `item_mapping` and `reverse_item_mapping` are exact inverses
/// after every mutation. User indices carry no uniqueness guarantee once
/// manual edits have happened (see `add_users_bulk`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdMappings {
    pub user_mapping: HashMap<String, usize>,
    pub item_mapping: HashMap<String, usize>,
    pub reverse_item_mapping: HashMap<usize, String>,
}

/// Outcome of a single-identifier insertion.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added { index: usize },
    /// Soft failure: the identifier was already mapped; nothing changed.
    AlreadyExists { index: usize },
}

/// Outcome of a bulk insertion, including the wrap-around collisions the
/// modulo assignment can produce (two distinct identifiers sharing one
/// internal index). Preserved behavior, surfaced as an operator signal.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    pub added: Vec<(String, usize)>,
    pub skipped: Vec<String>,
    pub collisions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingInfo {
    pub total_users: usize,
    pub total_items: usize,
    pub max_user_index: Option<usize>,
    pub external_users: usize,
    pub sample_external_users: Vec<(String, usize)>,
}

impl IdMappings {
    /// Build a fresh mapping from harvested identifier sets: sort, then
    /// enumerate, so indices are contiguous and zero-based.
    pub fn from_identifiers(mut users: Vec<String>, mut items: Vec<String>) -> Self {
        users.sort();
        users.dedup();
        items.sort();
        items.dedup();

        let user_mapping = users
            .into_iter()
            .enumerate()
            .map(|(idx, id)| (id, idx))
            .collect();

        let mut item_mapping = HashMap::new();
        let mut reverse_item_mapping = HashMap::new();
        for (idx, id) in items.into_iter().enumerate() {
            item_mapping.insert(id.clone(), idx);
            reverse_item_mapping.insert(idx, id);
        }

        Self {
            user_mapping,
            item_mapping,
            reverse_item_mapping,
        }
    }

    pub fn resolve_user(&self, external_id: &str) -> Option<usize> {
        self.user_mapping.get(external_id).copied()
    }

    pub fn resolve_item(&self, external_id: &str) -> Option<usize> {
        self.item_mapping.get(external_id).copied()
    }

    pub fn resolve_item_reverse(&self, index: usize) -> Option<&str> {
        self.reverse_item_mapping.get(&index).map(String::as_str)
    }

    pub fn add_user(&mut self, external_id: &str, index: usize) -> AddOutcome {
        if let Some(&existing) = self.user_mapping.get(external_id) {
            warn!(
                "user {} already exists -> index {}, leaving mapping unchanged",
                external_id, existing
            );
            return AddOutcome::AlreadyExists { index: existing };
        }

        // Requested indices above the current maximum are clamped down to
        // it rather than rejected; callers cannot rely on the requested
        // index being honored.
        let mut index = index;
        if let Some(max_index) = self.user_mapping.values().max().copied() {
            if index > max_index {
                warn!(
                    "requested index {} exceeds max user index {}, clamping",
                    index, max_index
                );
                index = max_index;
            }
        }

        self.user_mapping.insert(external_id.to_string(), index);
        info!("added user {} -> index {}", external_id, index);
        AddOutcome::Added { index }
    }

    /// Assign each new identifier `(start_index + position) % user_count`,
    /// where `position` is the identifier's position in the input list
    /// (skipped identifiers still advance it) and `user_count` is
    /// re-evaluated per insertion, so the denominator grows as users land.
    /// The wrap-around keeps every assigned index inside the embedding
    /// table at the cost of allowing distinct identifiers to share an
    /// index; collisions are counted.
    pub fn add_users_bulk(&mut self, external_ids: &[String], start_index: usize) -> BulkReport {
        let mut report = BulkReport::default();

        for (position, external_id) in external_ids.iter().enumerate() {
            if self.user_mapping.contains_key(external_id) {
                warn!("skipped (exists): {}", external_id);
                report.skipped.push(external_id.clone());
                continue;
            }

            let user_count = self.user_mapping.len();
            let index = if user_count == 0 {
                position
            } else {
                (start_index + position) % user_count
            };

            if self.user_mapping.values().any(|&idx| idx == index) {
                report.collisions += 1;
                warn!(
                    "index {} already in use; {} will share it",
                    index, external_id
                );
            }

            self.user_mapping.insert(external_id.clone(), index);
            info!("added user {} -> index {}", external_id, index);
            report.added.push((external_id.clone(), index));
        }

        if report.collisions > 0 {
            warn!(
                "bulk add finished with {} index collision(s)",
                report.collisions
            );
        }
        report
    }

    pub fn add_item(&mut self, external_id: &str, index: usize) -> AddOutcome {
        if let Some(&existing) = self.item_mapping.get(external_id) {
            warn!(
                "item {} already exists -> index {}, leaving mapping unchanged",
                external_id, existing
            );
            return AddOutcome::AlreadyExists { index: existing };
        }
        self.item_mapping.insert(external_id.to_string(), index);
        self.reverse_item_mapping
            .insert(index, external_id.to_string());
        AddOutcome::Added { index }
    }

    pub fn info(&self) -> MappingInfo {
        let mut external: Vec<(String, usize)> = self
            .user_mapping
            .iter()
            .filter(|(id, _)| is_external_id(id))
            .map(|(id, &idx)| (id.clone(), idx))
            .collect();
        external.sort();

        MappingInfo {
            total_users: self.user_mapping.len(),
            total_items: self.item_mapping.len(),
            max_user_index: self.user_mapping.values().max().copied(),
            external_users: external.len(),
            sample_external_users: external.into_iter().take(10).collect(),
        }
    }

    pub fn list_external_users(&self) -> Vec<(String, usize)> {
        let mut external: Vec<(String, usize)> = self
            .user_mapping
            .iter()
            .filter(|(id, _)| is_external_id(id))
            .map(|(id, &idx)| (id.clone(), idx))
            .collect();
        external.sort();
        external
    }

    /// Inverse-consistency check used by tests and the maintenance tool.
    pub fn is_inverse_consistent(&self) -> bool {
        self.item_mapping.len() == self.reverse_item_mapping.len()
            && self
                .item_mapping
                .iter()
                .all(|(id, idx)| self.reverse_item_mapping.get(idx).map(String::as_str) == Some(id))
    }
}

/// Durable wrapper around [`IdMappings`]: every save first copies the prior
/// blob to a `.bak` sibling, so the last good generation is always
/// recoverable even though the write itself is not atomic.
#[derive(Debug)]
pub struct MappingStore {
    path: PathBuf,
    pub mappings: IdMappings,
}

impl MappingStore {
    pub fn load(path: impl AsRef<Path>) -> RecResult<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| RecError::storage(path.display().to_string(), e))?;
        let mappings: IdMappings = serde_json::from_str(&raw)?;
        info!(
            "loaded mappings from {}: {} users, {} items",
            path.display(),
            mappings.user_mapping.len(),
            mappings.item_mapping.len()
        );
        Ok(Self { path, mappings })
    }

    pub fn create(path: impl AsRef<Path>, mappings: IdMappings) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mappings,
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    pub fn save(&self) -> RecResult<()> {
        if self.path.exists() {
            std::fs::copy(&self.path, self.backup_path())
                .map_err(|e| RecError::storage(self.backup_path().display().to_string(), e))?;
        }

        let raw = serde_json::to_string(&self.mappings)?;
        std::fs::write(&self.path, raw)
            .map_err(|e| RecError::storage(self.path.display().to_string(), e))?;
        info!("saved mappings to {}", self.path.display());
        Ok(())
    }
}
