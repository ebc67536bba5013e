use serde::{Deserialize, Serialize};

/// Whitelist/blacklist partition of the scene universe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneLists {
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

impl SceneLists {
    #[must_use]
    pub fn is_whitelisted(&self, scene: &str) -> bool {
        self.whitelist.iter().any(|s| s == scene)
    }

    /// True when the lists are disjoint and together equal `universe`.
    #[must_use]
    pub fn partitions(&self, universe: &[String]) -> bool {
        let disjoint = !self.whitelist.iter().any(|s| self.blacklist.contains(s));
        let covered = self.whitelist.len() + self.blacklist.len() == universe.len()
            && universe
                .iter()
                .all(|s| self.whitelist.contains(s) || self.blacklist.contains(s));
        disjoint && covered
    }
}
