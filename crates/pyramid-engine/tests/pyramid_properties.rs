//! Property tests over randomly composed example sets.

use proptest::prelude::*;

use pyramid_core::config::PipelineConfig;
use pyramid_core::example::Example;
use pyramid_engine::{BuildOptions, PyramidEngine};
use test_fixtures::{HashEmbedder, ScriptedMerger};

const TEXT_POOL: &[&str] = &[
    "ib = IB()\nib.connect('127.0.0.1', 7497, clientId=1)",
    "ib = IB()\nib.connect('127.0.0.1',   7497, clientId=1)",
    "contract = Stock('AMD', 'SMART', 'USD')",
    "order = MarketOrder('BUY', 100)",
    "trade = ib.placeOrder(contract, order)",
    "positions = ib.positions()",
    "bars = ib.reqHistoricalData(contract, '', '30 D', '1 hour', 'TRADES', True)",
    "ib.disconnect()",
];

const OP_POOL: &[&str] = &["connect", "orders", "positions", "history"];
const TAG_POOL: &[&str] = &["connection", "orders", "market-data"];

fn example_set() -> impl Strategy<Value = Vec<Example>> {
    prop::collection::vec(
        (0..TEXT_POOL.len(), 0..OP_POOL.len(), prop::bits::u8::between(0, 3)),
        1..24,
    )
    .prop_map(|picks| {
        picks
            .into_iter()
            .enumerate()
            .map(|(i, (text, op, tag_bits))| {
                let tags = TAG_POOL
                    .iter()
                    .enumerate()
                    .filter(|(bit, _)| tag_bits & (1 << bit) != 0)
                    .map(|(_, t)| t.to_string())
                    .collect();
                test_fixtures::example(
                    &format!("ex_{i:03}"),
                    TEXT_POOL[text],
                    OP_POOL[op],
                    (i as u32) * 10 + 1,
                )
                .with_tags(tags)
            })
            .collect()
    })
}

fn build(examples: &[Example]) -> pyramid_engine::BuildOutput {
    PyramidEngine::new(
        Box::new(HashEmbedder::default()),
        Box::new(ScriptedMerger::default()),
        PipelineConfig::default(),
    )
    .build(examples, BuildOptions::default())
    .expect("build must succeed on valid input")
}

proptest! {
    /// Every input id lands in exactly one Layer-3 entry.
    #[test]
    fn membership_partitions_the_input(examples in example_set()) {
        let output = build(&examples);
        let mut seen: Vec<&str> = output
            .pyramid
            .content
            .iter()
            .flat_map(|e| e.member_ids.iter().map(String::as_str))
            .collect();
        seen.sort_unstable();
        let mut expected: Vec<&str> = examples.iter().map(|e| e.id.as_str()).collect();
        expected.sort_unstable();
        prop_assert_eq!(seen, expected);
    }

    /// Rebuilding the same input yields the same pyramid, byte for byte.
    #[test]
    fn builds_are_deterministic(examples in example_set()) {
        let first = build(&examples);
        let second = build(&examples);
        let a = serde_json::to_string(&first.pyramid).unwrap();
        let b = serde_json::to_string(&second.pyramid).unwrap();
        prop_assert_eq!(a, b);
    }

    /// An operation is never represented by more entries than mentions.
    #[test]
    fn dedup_never_inflates(examples in example_set()) {
        let output = build(&examples);
        for apex in &output.pyramid.apex {
            prop_assert!(apex.example_count <= apex.mention_count);
            prop_assert!(apex.max_depth <= 3);
        }
        prop_assert!(output.stats.entry_count <= output.stats.original_count);
    }

    /// Appending an exact duplicate never adds a Layer-3 entry. It may
    /// remove one: the extra pair of identical members raises the cluster
    /// average, which can promote a standalone cluster onto a merge path.
    #[test]
    fn exact_duplicates_are_idempotent(examples in example_set(), pick in 0..24usize) {
        let source = &examples[pick % examples.len()];
        let mut extended = examples.clone();
        extended.push(
            test_fixtures::example(
                "ex_dup",
                &source.raw_text,
                &source.operation_tag,
                9001,
            )
            .with_tags(source.tags.clone()),
        );

        let base = build(&examples);
        let grown = build(&extended);
        prop_assert!(grown.stats.entry_count <= base.stats.entry_count);
    }

    /// Per-tag pointer occurrences always sum to the raw tagged-example count.
    #[test]
    fn tag_occurrences_reconcile(examples in example_set()) {
        let output = build(&examples);
        for (short, pointers) in &output.pyramid.tag_index.entries {
            let full = output
                .pyramid
                .tag_index
                .dictionary
                .get(short)
                .cloned()
                .unwrap_or_else(|| short.clone());
            let counted: usize = pointers.iter().map(|p| p.occurrence_count).sum();
            let raw = examples
                .iter()
                .filter(|e| e.tags.iter().any(|t| t.eq_ignore_ascii_case(&full)))
                .count();
            prop_assert_eq!(counted, raw);
        }
    }
}
