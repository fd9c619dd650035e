use serde::{Deserialize, Serialize};

/// Redaction categories, in the order scrub passes are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Emails,
    Ips,
    Phones,
    Names,
    Companies,
}

impl PiiCategory {
    pub const ORDER: [PiiCategory; 5] = [
        PiiCategory::Emails,
        PiiCategory::Ips,
        PiiCategory::Phones,
        PiiCategory::Names,
        PiiCategory::Companies,
    ];

    pub fn placeholder(self) -> &'static str {
        match self {
            PiiCategory::Emails => "[REDACTED_EMAIL]",
            PiiCategory::Ips => "[REDACTED_IP]",
            PiiCategory::Phones => "[REDACTED_PHONE]",
            PiiCategory::Names => "[REDACTED_NAME]",
            PiiCategory::Companies => "[REDACTED_COMPANY]",
        }
    }
}

/// Which redaction categories are switched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiSettings {
    #[serde(default = "enabled")]
    pub emails: bool,
    #[serde(default = "enabled")]
    pub ips: bool,
    #[serde(default = "enabled")]
    pub phones: bool,
    #[serde(default = "enabled")]
    pub names: bool,
    #[serde(default = "enabled")]
    pub companies: bool,
}

fn enabled() -> bool {
    true
}

impl Default for PiiSettings {
    fn default() -> Self {
        Self::all(true)
    }
}

impl PiiSettings {
    pub fn all(on: bool) -> Self {
        Self {
            emails: on,
            ips: on,
            phones: on,
            names: on,
            companies: on,
        }
    }

    pub fn is_enabled(&self, category: PiiCategory) -> bool {
        match category {
            PiiCategory::Emails => self.emails,
            PiiCategory::Ips => self.ips,
            PiiCategory::Phones => self.phones,
            PiiCategory::Names => self.names,
            PiiCategory::Companies => self.companies,
        }
    }

    pub fn all_disabled(&self) -> bool {
        PiiCategory::ORDER.iter().all(|c| !self.is_enabled(*c))
    }

    /// Enabled categories in application order
    pub fn enabled(&self) -> impl Iterator<Item = PiiCategory> + '_ {
        PiiCategory::ORDER
            .into_iter()
            .filter(move |c| self.is_enabled(*c))
    }
}
