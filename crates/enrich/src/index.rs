use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::debug;
use ordered_float::OrderedFloat;

use crate::config::DuplicatePolicy;
use crate::model::{RateArchetype, SourceRow};
use crate::money::parse_currency;

/// Reference rate -> archetype row. Keys iterate in ascending order.
#[derive(Debug, Clone, Default)]
pub struct RateIndex {
    archetypes: BTreeMap<OrderedFloat<f64>, RateArchetype>,
}

impl RateIndex {
    /// Index `rows` by the parsed value of `column`.
    ///
    /// Rows whose reference rate does not parse to a positive number are
    /// ignored. Rows colliding on the same rate are resolved by `policy`.
    pub fn build<'a, I>(rows: I, column: &str, policy: DuplicatePolicy) -> Self
    where
        I: IntoIterator<Item = &'a SourceRow>,
    {
        let mut archetypes = BTreeMap::new();
        let mut skipped = 0usize;
        let mut collisions = 0usize;

        for row in rows {
            let rate = row.get(column).map(parse_currency).unwrap_or(0.0);
            if rate <= 0.0 {
                skipped += 1;
                continue;
            }

            let archetype = RateArchetype {
                rate,
                row: row.clone(),
            };
            match archetypes.entry(OrderedFloat(rate)) {
                Entry::Vacant(slot) => {
                    slot.insert(archetype);
                }
                Entry::Occupied(mut slot) => {
                    collisions += 1;
                    if policy == DuplicatePolicy::LastWins {
                        slot.insert(archetype);
                    }
                }
            }
        }

        debug!(
            "indexed {} archetypes on '{column}' ({skipped} rows without a rate, {collisions} duplicate rates)",
            archetypes.len()
        );

        Self { archetypes }
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn get(&self, rate: f64) -> Option<&RateArchetype> {
        self.archetypes.get(&OrderedFloat(rate))
    }

    /// Distinct indexed rates, ascending.
    pub fn rates(&self) -> impl Iterator<Item = f64> + '_ {
        self.archetypes.keys().map(|k| k.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RateArchetype> {
        self.archetypes.values()
    }
}
