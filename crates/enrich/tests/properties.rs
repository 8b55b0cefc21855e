// Property-based tests for parsing, matching and banding.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use ratecard_enrich::classify::band_for;
use ratecard_enrich::config::DuplicatePolicy;
use ratecard_enrich::index::RateIndex;
use ratecard_enrich::matcher::{match_rate, MatchKind};
use ratecard_enrich::model::{Band, Notes, SourceRow};
use ratecard_enrich::money::parse_currency;
use ratecard_enrich::RateCardConfig;

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn index_of(rates: &[u32]) -> RateIndex {
    let rows: Vec<SourceRow> = rates
        .iter()
        .map(|r| SourceRow::from_pairs([("GBP", r.to_string())]))
        .collect();
    RateIndex::build(&rows, "GBP", DuplicatePolicy::FirstWins)
}

proptest! {
    #![proptest_config(config_256())]

    /// Arbitrary text never panics and never goes negative.
    #[test]
    fn parse_never_negative(s in ".{0,24}") {
        let v = parse_currency(&s);
        prop_assert!(v >= 0.0);
        prop_assert!(v.is_finite());
    }

    /// Formatting an amount with symbols and grouping parses back to it.
    #[test]
    fn parse_strips_decoration(whole in 0u32..10_000_000, cents in 0u32..100, sym in prop::sample::select(vec!["", "£", "$", "€"])) {
        let grouped = whole
            .to_string()
            .as_bytes()
            .rchunks(3)
            .rev()
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join(",");
        let text = format!(" {sym}{grouped}.{cents:02} ");
        let expected: f64 = format!("{whole}.{cents:02}").parse().unwrap();
        prop_assert_eq!(parse_currency(&text), expected);
    }

    /// The chosen archetype is never farther than any other indexed rate.
    #[test]
    fn nearest_is_minimal(rates in prop::collection::vec(1u32..5000, 1..20), target in 1u32..6000) {
        let index = index_of(&rates);
        let target = target as f64;
        let m = match_rate(target, &index).unwrap();
        let chosen = (m.archetype.rate - target).abs();
        for r in index.rates() {
            prop_assert!(chosen <= (r - target).abs());
        }
        match m.kind {
            MatchKind::Exact => prop_assert_eq!(m.archetype.rate, target),
            MatchKind::Approximate { used, .. } => prop_assert_eq!(used, m.archetype.rate),
        }
    }

    /// Every positive rate inside the table's span lands in exactly one band.
    #[test]
    fn bands_partition_their_span(rate in 0.01f64..9999.0) {
        let bands = RateCardConfig::default().bands;
        let hits = bands.iter().filter(|t| t.contains(rate)).count();
        prop_assert_eq!(hits, 1);
        prop_assert_ne!(band_for(rate, &bands), Band::Unknown);
    }

    /// Re-parsing rendered notes is a fixed point.
    #[test]
    fn notes_render_parse_fixed_point(parts in prop::collection::vec("[A-Za-z0-9:. ]{0,12}", 0..6)) {
        let notes = Notes::parse(&parts.join(" | "));
        let again = Notes::parse(&notes.to_string());
        prop_assert_eq!(notes, again);
    }
}
