//! Hero table normalization and content digests
//!
//! Output must be byte-stable: the digest of a normalized table is what the
//! change detector and the store's same-day guard compare.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::warn;

use crate::domain::HeroRate;
use crate::error::Result;

/// A canonicalized, sorted hero table and its digest
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub hero_rates: Vec<HeroRate>,
    pub digest: String,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.hero_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hero_rates.is_empty()
    }
}

/// Canonical hero identifier.
///
/// Lowercase, whitespace runs become a single hyphen, anything outside
/// `[a-z0-9-]` is dropped, hyphen runs collapse, and edge hyphens are trimmed.
/// `"Soldier: 76"` becomes `soldier-76`, `"  Junker   Queen "` becomes
/// `junker-queen`.
pub fn canonical_hero_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_hyphen = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        let mapped = if c.is_whitespace() || c == '-' {
            '-'
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            continue;
        };

        if mapped == '-' {
            pending_hyphen = true;
            continue;
        }
        if pending_hyphen && !out.is_empty() {
            out.push('-');
        }
        pending_hyphen = false;
        out.push(mapped);
    }

    out
}

/// Deterministic digest of an already sorted table.
///
/// SHA-256 over the JSON encoding of the rows; field order is fixed by the
/// struct definition and `null` rates serialize distinctly from `0`.
pub fn digest(sorted: &[HeroRate]) -> Result<String> {
    let encoded = serde_json::to_vec(sorted)?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

/// Canonicalize ids, stable-sort by id, and compute the digest.
///
/// Rows whose id canonicalizes to nothing are dropped, and only the first row
/// of a duplicated canonical id is kept.
pub fn normalize(raw: Vec<HeroRate>) -> Result<NormalizedTable> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut hero_rates = Vec::with_capacity(raw.len());

    for row in raw {
        let hero_id = canonical_hero_id(&row.hero_id);
        if hero_id.is_empty() {
            warn!("Dropping hero row with unusable id {:?}", row.hero_id);
            continue;
        }
        if !seen.insert(hero_id.clone()) {
            warn!("Dropping duplicate hero row for {}", hero_id);
            continue;
        }
        hero_rates.push(HeroRate {
            hero_id,
            pick_rate: row.pick_rate,
            win_rate: row.win_rate,
        });
    }

    hero_rates.sort_by(|a, b| a.hero_id.cmp(&b.hero_id));
    let digest = digest(&hero_rates)?;

    Ok(NormalizedTable { hero_rates, digest })
}
