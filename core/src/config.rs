use serde::{Deserialize, Serialize};

use crate::generator::HintFallbacks;

/// Engine configuration loaded from the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DojoConfig {
    /// SOP rule categories scenarios are drawn from.
    pub topics: Vec<String>,
    #[serde(default)]
    pub hint_fallbacks: HintFallbacks,
    /// SOP rulebook text, read from `sop_rulebook.md`.
    #[serde(skip)]
    pub rulebook: String,
}

impl DojoConfig {
    /// Load from the data/ directory.
    /// In tests, use DojoConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/topics.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let mut config: DojoConfig = serde_json::from_str(&content)?;
        if config.topics.is_empty() {
            anyhow::bail!("{path} lists no topics");
        }

        let rulebook_path = format!("{data_dir}/sop_rulebook.md");
        config.rulebook = std::fs::read_to_string(&rulebook_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {rulebook_path}: {e}"))?;
        if config.rulebook.trim().is_empty() {
            anyhow::bail!("{rulebook_path} is empty");
        }
        Ok(config)
    }

    pub fn default_test() -> Self {
        Self {
            topics: vec![
                "Drunk Captain (Bloodshot eyes, slurring)".into(),
                "Double Payment (Cash + Online)".into(),
                "Toll Charges (Captain Collected Extra)".into(),
                "Rapido Local - Item Damaged (<2000 Rs)".into(),
            ],
            hint_fallbacks: HintFallbacks::default(),
            rulebook: "KEY SOP RULES:\n\
                       1. Drunk or violent captain: P0 escalation, permanent suspension.\n\
                       2. Double payment: refund the online amount to source or wallet.\n\
                       3. Damaged item under 2000 Rs: approve refund, debit captain."
                .into(),
        }
    }
}
