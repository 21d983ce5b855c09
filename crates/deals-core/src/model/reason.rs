//! Closed sets of loss and win reason codes.
//!
//! Moving into a terminal stage requires a reason drawn from the set that
//! matches the stage's role. Codes are compared after trimming and
//! lowercasing, and stored in that normalized form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::stage::SystemRole;

pub const DEFAULT_LOSS_REASONS: &[&str] = &[
    "price",
    "competitor",
    "timing",
    "no_budget",
    "no_response",
    "lost_contact",
    "other",
];

pub const DEFAULT_WIN_REASONS: &[&str] = &[
    "price",
    "relationship",
    "product_fit",
    "referral",
    "timing",
    "other",
];

/// Why a reason was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonRejection {
    Missing,
    NotInSet(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCatalog {
    pub loss: BTreeSet<String>,
    pub win: BTreeSet<String>,
}

impl Default for ReasonCatalog {
    fn default() -> Self {
        Self::from_codes(DEFAULT_LOSS_REASONS, DEFAULT_WIN_REASONS)
    }
}

impl ReasonCatalog {
    #[must_use]
    pub fn from_codes<L, W>(loss: &[L], win: &[W]) -> Self
    where
        L: AsRef<str>,
        W: AsRef<str>,
    {
        Self {
            loss: code_set(loss.iter().map(|code| code.as_ref())),
            win: code_set(win.iter().map(|code| code.as_ref())),
        }
    }

    /// Codes accepted for a stage role; normal stages take none.
    #[must_use]
    pub fn codes_for(&self, role: SystemRole) -> Option<&BTreeSet<String>> {
        match role {
            SystemRole::Normal => None,
            SystemRole::Won => Some(&self.win),
            SystemRole::Lost => Some(&self.loss),
        }
    }

    /// Check `reason` against the set for `role` and return its normalized form.
    ///
    /// # Errors
    ///
    /// [`ReasonRejection::Missing`] when absent or blank,
    /// [`ReasonRejection::NotInSet`] when the code is not in the set.
    pub fn validate(&self, role: SystemRole, reason: Option<&str>) -> Result<String, ReasonRejection> {
        let code = reason.map(normalize_code).unwrap_or_default();
        if code.is_empty() {
            return Err(ReasonRejection::Missing);
        }
        match self.codes_for(role) {
            Some(codes) if codes.contains(&code) => Ok(code),
            _ => Err(ReasonRejection::NotInSet(code)),
        }
    }
}

fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn code_set<'a>(codes: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    codes
        .map(normalize_code)
        .filter(|code| !code.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_populated() {
        let reasons = ReasonCatalog::default();
        assert!(reasons.loss.contains("price"));
        assert!(reasons.win.contains("referral"));
        assert!(!reasons.win.contains("no_budget"));
    }

    #[test]
    fn validate_normalizes_case_and_whitespace() {
        let reasons = ReasonCatalog::default();
        assert_eq!(
            reasons.validate(SystemRole::Lost, Some("  Price ")),
            Ok("price".to_string())
        );
    }

    #[test]
    fn missing_and_blank_reasons_are_rejected() {
        let reasons = ReasonCatalog::default();
        assert_eq!(reasons.validate(SystemRole::Won, None), Err(ReasonRejection::Missing));
        assert_eq!(reasons.validate(SystemRole::Won, Some("   ")), Err(ReasonRejection::Missing));
    }

    #[test]
    fn codes_are_checked_per_role() {
        let reasons = ReasonCatalog::default();
        assert_eq!(
            reasons.validate(SystemRole::Won, Some("no_budget")),
            Err(ReasonRejection::NotInSet("no_budget".into()))
        );
        assert!(reasons.validate(SystemRole::Lost, Some("no_budget")).is_ok());
        assert!(reasons.validate(SystemRole::Normal, Some("price")).is_err());
    }

    #[test]
    fn custom_codes_replace_defaults() {
        let reasons = ReasonCatalog::from_codes(&["Ghosted", ""], &["signed"]);
        assert_eq!(reasons.loss.len(), 1);
        assert!(reasons.loss.contains("ghosted"));
        assert!(reasons.validate(SystemRole::Lost, Some("price")).is_err());
    }
}
