//! Side-by-side comparison selection.

use moka::future::Cache;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Maximum number of agents compared at once.
pub const MAX_COMPARED: usize = 3;

/// Ordered, duplicate-free selection of at most [`MAX_COMPARED`] agent ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonList {
    agents: Vec<String>,
}

impl ComparisonList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the `a,b,c` route segment. Blanks and duplicates are ignored
    /// and ids past capacity are dropped.
    pub fn from_path(ids: &str) -> Self {
        let mut list = Self::new();
        for id in ids.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            list.add(id);
        }
        list
    }

    /// Adds `id`; returns `false` (and changes nothing) when it is already
    /// selected or the list is full.
    pub fn add(&mut self, id: &str) -> bool {
        if self.agents.len() >= MAX_COMPARED || self.contains(id) {
            return false;
        }
        self.agents.push(id.to_string());
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.agents.len();
        self.agents.retain(|a| a != id);
        self.agents.len() != before
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.iter().any(|a| a == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.agents.len() >= MAX_COMPARED
    }

    /// Route segment for the comparison page, e.g. `a,b`.
    pub fn to_path(&self) -> String {
        self.agents.join(",")
    }
}

/// Per-user comparison selections, owned by the application state.
///
/// Selections are dropped after a day without access.
#[derive(Clone)]
pub struct ComparisonStore {
    selections: Cache<Uuid, ComparisonList>,
}

impl Default for ComparisonStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(86_400))
    }
}

impl ComparisonStore {
    pub fn new(idle: Duration) -> Self {
        let selections = Cache::builder()
            .time_to_idle(idle)
            .max_capacity(100_000)
            .build();
        Self { selections }
    }

    pub async fn get(&self, user: Uuid) -> ComparisonList {
        self.selections.get(&user).await.unwrap_or_default()
    }

    /// Adds an agent to the user's selection; returns the selection and
    /// whether it changed. The read-modify-write runs under the cache's
    /// per-key lock.
    pub async fn add(&self, user: Uuid, agent_id: &str) -> (ComparisonList, bool) {
        let mut added = false;
        let entry = self
            .selections
            .entry(user)
            .and_upsert_with(|current| {
                let mut list = current.map(|e| e.into_value()).unwrap_or_default();
                added = list.add(agent_id);
                std::future::ready(list)
            })
            .await;
        (entry.into_value(), added)
    }

    pub async fn remove(&self, user: Uuid, agent_id: &str) -> ComparisonList {
        self.selections
            .entry(user)
            .and_upsert_with(|current| {
                let mut list = current.map(|e| e.into_value()).unwrap_or_default();
                list.remove(agent_id);
                std::future::ready(list)
            })
            .await
            .into_value()
    }

    pub async fn clear(&self, user: Uuid) {
        self.selections.invalidate(&user).await;
    }
}
