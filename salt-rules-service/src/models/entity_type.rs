//! Canonical entity coding for SALT rule matching.
//!
//! Investor records carry one of ~20 display variants; rules are keyed by
//! one of 8 canonical codings. A static table maps variant to coding.

use serde::{Deserialize, Serialize};

/// The 8 canonical SALT entity codings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCode {
    Corporation,
    Partnership,
    Individual,
    Trust,
    SCorporation,
    ExemptOrg,
    Ira,
    Estate,
}

/// Display variant → canonical coding. Matching is trimmed and
/// case-insensitive; the first variant listed per coding is its canonical
/// display form.
const ENTITY_VARIANTS: &[(&str, EntityCode)] = &[
    ("Corporation", EntityCode::Corporation),
    ("C Corporation", EntityCode::Corporation),
    ("C-Corp", EntityCode::Corporation),
    ("LLC - C Corp", EntityCode::Corporation),
    ("Partnership", EntityCode::Partnership),
    ("General Partnership", EntityCode::Partnership),
    ("Limited Partnership", EntityCode::Partnership),
    ("LLC - Partnership", EntityCode::Partnership),
    ("LLP", EntityCode::Partnership),
    ("Individual", EntityCode::Individual),
    ("Joint Individual", EntityCode::Individual),
    ("Sole Proprietor", EntityCode::Individual),
    ("Trust", EntityCode::Trust),
    ("Grantor Trust", EntityCode::Trust),
    ("Charitable Trust", EntityCode::Trust),
    ("S Corporation", EntityCode::SCorporation),
    ("S-Corp", EntityCode::SCorporation),
    ("LLC - S Corp", EntityCode::SCorporation),
    ("Exempt Org", EntityCode::ExemptOrg),
    ("Exempt Organization", EntityCode::ExemptOrg),
    ("501(c)(3)", EntityCode::ExemptOrg),
    ("IRA", EntityCode::Ira),
    ("Roth IRA", EntityCode::Ira),
    ("Estate", EntityCode::Estate),
];

impl EntityCode {
    /// Canonical display label used on stored rules.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCode::Corporation => "Corporation",
            EntityCode::Partnership => "Partnership",
            EntityCode::Individual => "Individual",
            EntityCode::Trust => "Trust",
            EntityCode::SCorporation => "S Corporation",
            EntityCode::ExemptOrg => "Exempt Org",
            EntityCode::Ira => "IRA",
            EntityCode::Estate => "Estate",
        }
    }

    /// Forward lookup: any known display variant to its coding.
    pub fn from_variant(s: &str) -> Option<Self> {
        let needle = s.trim();
        ENTITY_VARIANTS
            .iter()
            .find(|(variant, _)| variant.eq_ignore_ascii_case(needle))
            .map(|(_, code)| *code)
    }

    /// Reverse lookup: all display variants mapping to this coding.
    pub fn variants(&self) -> Vec<&'static str> {
        ENTITY_VARIANTS
            .iter()
            .filter(|(_, code)| code == self)
            .map(|(variant, _)| *variant)
            .collect()
    }
}

impl std::fmt::Display for EntityCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
