// Student-facing list of verified instructors, kept current by full re-fetch

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{Availability, Instructor, InstructorId};
use crate::store::{InstructorStore, StoreError};
use crate::sync::{self, Subscription};

/// Splits a remark into the non-blank lines a student sees.
pub fn remark_lines(remarks: &str) -> Vec<String> {
    remarks
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub id: InstructorId,
    pub name: String,
    pub availability: Availability,
    pub availability_label: &'static str,
    pub remarks: Vec<String>,
    pub profile_image_url: Option<String>,
}

impl From<&Instructor> for DirectoryEntry {
    fn from(instructor: &Instructor) -> Self {
        Self {
            id: instructor.id.clone(),
            name: instructor.name.clone(),
            availability: instructor.availability,
            availability_label: instructor.availability.label(),
            remarks: remark_lines(&instructor.remarks),
            profile_image_url: instructor.profile_image_url.clone(),
        }
    }
}

pub struct Directory {
    store: Arc<dyn InstructorStore>,
    entries: RwLock<Vec<DirectoryEntry>>,
}

impl Directory {
    pub fn new(store: Arc<dyn InstructorStore>) -> Self {
        Self {
            store,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the whole list with the store's verified instructors. On failure
    /// the previous list stays in place.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let fresh: Vec<DirectoryEntry> = self
            .store
            .list_verified()
            .await?
            .iter()
            .filter(|instructor| instructor.verified)
            .map(DirectoryEntry::from)
            .collect();
        let count = fresh.len();
        *self.entries.write().await = fresh;
        debug!(count = count, "Directory refreshed");
        Ok(count)
    }

    pub async fn entries(&self) -> Vec<DirectoryEntry> {
        self.entries.read().await.clone()
    }

    /// Re-fetches on every instructors change until `subscription` closes.
    pub async fn follow(self: Arc<Self>, subscription: Subscription) -> usize {
        sync::follow(subscription, || {
            let directory = self.clone();
            async move { directory.refresh().await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_remark_lines_skips_blank_lines() {
        assert_eq!(
            remark_lines("Room 204\n\n   \n  Back at 3pm "),
            vec!["Room 204".to_string(), "Back at 3pm".to_string()]
        );
        assert!(remark_lines("").is_empty());
    }

    #[tokio::test]
    async fn test_refresh_lists_only_verified() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_instructor(Instructor::new("i1", "Prof. Santos").verified())
            .await
            .unwrap();
        store.upsert_instructor(Instructor::new("i2", "Pending Person")).await.unwrap();

        let directory = Directory::new(store.clone());
        assert_eq!(directory.refresh().await.unwrap(), 1);
        let entries = directory.entries().await;
        assert_eq!(entries[0].name, "Prof. Santos");
        assert_eq!(entries[0].availability_label, "Inside Office");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_list() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_instructor(Instructor::new("i1", "Prof. Santos").verified())
            .await
            .unwrap();
        let directory = Directory::new(store.clone());
        directory.refresh().await.unwrap();

        store.fail_next_lists(1);
        assert!(directory.refresh().await.is_err());
        assert_eq!(directory.entries().await.len(), 1);
    }
}
