use std::fmt;

use crate::index::RateIndex;
use crate::model::RateArchetype;

/// How an archetype was selected for a target rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    Approximate { target: f64, used: f64 },
}

impl MatchKind {
    /// Provenance note written onto every generated row.
    pub fn note(&self) -> String {
        match self {
            Self::Exact => "Exact Rate Match".to_string(),
            Self::Approximate { target, used } => {
                format!("Approximate Match: Target {target} -> Used {used}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoleMatch<'a> {
    pub archetype: &'a RateArchetype,
    pub kind: MatchKind,
}

/// Why no archetype could be chosen. The caller skips the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMiss {
    /// Target rate is zero (absent or unparseable).
    ZeroRate,
    /// The index holds no archetypes.
    EmptyPool,
}

impl fmt::Display for MatchMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroRate => write!(f, "no rate available"),
            Self::EmptyPool => write!(f, "no archetypes to match against"),
        }
    }
}

/// Find the archetype for `target`: exact key, else the nearest key.
///
/// Ties on distance go to the lower rate (first minimum in ascending order).
pub fn match_rate(target: f64, index: &RateIndex) -> Result<RoleMatch<'_>, MatchMiss> {
    if !(target > 0.0) {
        return Err(MatchMiss::ZeroRate);
    }
    if index.is_empty() {
        return Err(MatchMiss::EmptyPool);
    }

    if let Some(archetype) = index.get(target) {
        return Ok(RoleMatch {
            archetype,
            kind: MatchKind::Exact,
        });
    }

    let mut best: Option<(f64, &RateArchetype)> = None;
    for archetype in index.iter() {
        let distance = (archetype.rate - target).abs();
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, archetype)),
        }
    }

    let (_, archetype) = best.ok_or(MatchMiss::EmptyPool)?;
    Ok(RoleMatch {
        archetype,
        kind: MatchKind::Approximate {
            target,
            used: archetype.rate,
        },
    })
}
