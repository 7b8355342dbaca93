//! Read-only bot profile store.
//!
//! Profiles are loaded once at startup from a JSON array on disk. A missing
//! or unreadable file leaves the store empty: the server still starts, and
//! every bot lookup answers 404.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use coach::bot::BotProfile;

#[derive(Debug, Clone, Default)]
pub struct BotProfiles {
    by_id: HashMap<String, BotProfile>,
}

impl BotProfiles {
    pub fn from_profiles(profiles: Vec<BotProfile>) -> Self {
        Self {
            by_id: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Load the store, logging instead of failing.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match load_profiles(path) {
            Ok(profiles) => {
                tracing::info!("Loaded {} bot profiles from {}", profiles.len(), path.display());
                Self::from_profiles(profiles)
            }
            Err(e) => {
                tracing::warn!("Failed to load bot profiles from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&BotProfile> {
        self.by_id.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Parse a JSON array of profiles.
pub fn load_profiles<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<BotProfile>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
