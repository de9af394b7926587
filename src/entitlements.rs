use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// One row of the entitlement table: a billing product and the characters it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub product_id: String,
    pub product_name: String,
    pub chars: u64,
}

/// Read-only mapping from product id to character entitlement.
///
/// Built once at startup and shared by reference; it must be kept in sync with
/// the Stripe product catalog by hand.
#[derive(Debug, Clone)]
pub struct EntitlementTable {
    entries: Vec<Entitlement>,
}

impl EntitlementTable {
    pub fn new(entries: Vec<Entitlement>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.product_id.as_str()) {
                bail!("duplicate product id in entitlement table: {}", entry.product_id);
            }
        }
        Ok(Self { entries })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read entitlements from {}", path.display()))?;
        let entries: Vec<Entitlement> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid entitlements file {}", path.display()))?;
        Self::new(entries)
    }

    /// Characters granted by `product_id`, 0 for products not in the table.
    pub fn chars_for(&self, product_id: &str) -> u64 {
        self.entries
            .iter()
            .find(|e| e.product_id == product_id)
            .map_or(0, |e| e.chars)
    }

    pub fn entries(&self) -> &[Entitlement] {
        &self.entries
    }
}

impl Default for EntitlementTable {
    fn default() -> Self {
        let entries = [
            ("prod_ORVVQvf4NNIrHM", "TTS-500k", 500_000),
            ("prod_ORVTaqllmu66Sh", "TTS-250k", 250_000),
            ("prod_ORVRHvcGGnacnS", "TTS-100k", 100_000),
            ("prod_ORHkZD7RnyjpJt", "TTS-50k", 50_000),
            ("prod_L5FdspKcIm93KY", "Premium Subscription", 50_000),
            ("prod_MSKBmbdLqGnUgQ", "Premium Plan - Autumn 2022", 50_000),
        ]
        .into_iter()
        .map(|(id, name, chars)| Entitlement {
            product_id: id.to_string(),
            product_name: name.to_string(),
            chars,
        })
        .collect();

        Self { entries }
    }
}
