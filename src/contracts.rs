use serde_json::Value;

use crate::models::{AnalysisResult, StoredContract};

/// In-memory list of contracts the user saved this session.
///
/// Order is insertion order and indices are what the front end shows.
/// Nothing is deduplicated: saving the same analysis twice keeps both.
#[derive(Debug, Clone, Default)]
pub struct ContractShelf {
    contracts: Vec<StoredContract>,
    next_id: u64,
}

impl ContractShelf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves `result` under `name` and returns its index.
    pub fn save(&mut self, result: AnalysisResult, name: impl Into<String>) -> usize {
        let contract = StoredContract::new(result, name);
        tracing::info!("Saved contract '{}'", contract.saved_name);
        self.push(contract);
        self.contracts.len() - 1
    }

    fn push(&mut self, mut contract: StoredContract) {
        self.next_id += 1;
        contract.id = self.next_id;
        self.contracts.push(contract);
    }

    pub fn remove(&mut self, index: usize) -> Option<StoredContract> {
        if index < self.contracts.len() {
            Some(self.contracts.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&StoredContract> {
        self.contracts.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredContract> {
        self.contracts.iter()
    }

    pub fn as_slice(&self) -> &[StoredContract] {
        &self.contracts
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Clones the contracts at `indices`, in the order given. Unknown indices
    /// are returned as the error.
    pub fn select(&self, indices: &[usize]) -> Result<Vec<StoredContract>, usize> {
        indices
            .iter()
            .map(|&i| self.contracts.get(i).cloned().ok_or(i))
            .collect()
    }

    /// Appends leases fetched from `/my_leases`. Returns how many were added.
    pub fn import_remote(&mut self, leases: Vec<AnalysisResult>) -> usize {
        let added = leases.len();
        for lease in leases {
            let name = remote_name(&lease, self.contracts.len() + 1);
            self.push(StoredContract::new(lease, name));
        }
        tracing::info!("Imported {} leases from history", added);
        added
    }
}

/// `file_name`, then `lease_id`, then "Lease N".
fn remote_name(lease: &AnalysisResult, position: usize) -> String {
    let named = ["file_name", "filename"]
        .iter()
        .find_map(|key| lease.get(key).and_then(Value::as_str))
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string);

    named
        .or_else(|| match lease.get("lease_id") {
            Some(Value::String(id)) if !id.is_empty() => Some(format!("Lease {}", id)),
            Some(Value::Number(id)) => Some(format!("Lease {}", id)),
            _ => None,
        })
        .unwrap_or_else(|| format!("Lease {}", position))
}
