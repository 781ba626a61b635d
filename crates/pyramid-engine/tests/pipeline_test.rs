//! End-to-end builds through the public engine surface.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use pyramid_core::config::PipelineConfig;
use pyramid_core::errors::PyramidResult;
use pyramid_core::example::Example;
use pyramid_core::models::{
    Cluster, Conflict, ConflictKind, MergeOutcome, MergePath, ReviewKind, Tier,
};
use pyramid_core::traits::IMergeProvider;
use pyramid_engine::{BuildOptions, BuildOutput, PyramidEngine};
use test_fixtures::{example, tagged_example, FailingMerger, HashEmbedder, ScriptedMerger};

fn build(
    examples: &[Example],
    merger: Box<dyn IMergeProvider>,
    config: PipelineConfig,
    options: BuildOptions,
) -> PyramidResult<BuildOutput> {
    PyramidEngine::new(Box::new(HashEmbedder::default()), merger, config).build(examples, options)
}

/// Five unit vectors fanned over 40 degrees from `base_deg`: pairwise
/// similarity 0.77..0.99 within the fan, mean roughly 0.93.
fn fan(prefix: &str, operation: &str, base_deg: f64, line_base: u32) -> Vec<Example> {
    (0..5u32)
        .map(|i| {
            let angle = (base_deg + (i as f64) * 10.0).to_radians();
            example(
                &format!("{prefix}_{i}"),
                &format!("{operation} variant number {i}"),
                operation,
                line_base + i * 10,
            )
            .with_embedding(vec![angle.cos() as f32, angle.sin() as f32])
        })
        .collect()
}

fn fanned_examples(operation: &str) -> Vec<Example> {
    fan("fan", operation, 0.0, 1)
}

#[test]
fn whitespace_variants_fold_into_one_canonical_entry() {
    let examples = vec![
        tagged_example("w1", "conn = connect(host, port)", "connect", &["connection"], 1),
        tagged_example("w2", "conn = connect(host,  port)", "connect", &["connection"], 10),
        tagged_example("w3", "conn =\n  connect(host, port)", "connect", &["connection"], 20),
    ];
    let merger = ScriptedMerger::default();
    let output = build(
        &examples,
        Box::new(merger),
        PipelineConfig::default(),
        BuildOptions::default(),
    )
    .unwrap();

    assert_eq!(output.pyramid.content.len(), 1);
    let entry = &output.pyramid.content[0];
    assert_eq!(entry.id, "merged_w1");
    assert_eq!(entry.tier, Tier::Canonical);
    assert_eq!(entry.occurrence_count, 3);
    assert_eq!(entry.provenance.path, MergePath::Mechanical);
    assert!(entry.provenance.lossless);

    let apex = output.pyramid.apex_for("connect").unwrap();
    assert_eq!(apex.mention_count, 3);
    assert_eq!(apex.example_count, 1);

    assert_eq!(output.stats.merge_calls_used, 0);
    assert!((output.stats.dedup_ratio - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn large_similar_cluster_is_delegated_and_lands_on_variant() {
    let examples = fanned_examples("orders");
    let merger = Arc::new(ScriptedMerger::default());
    let output = PyramidEngine::new(
        Box::new(HashEmbedder::default()),
        Box::new(ArcMerger(merger.clone())),
        PipelineConfig::default(),
    )
    .build(&examples, BuildOptions::default())
    .unwrap();

    assert_eq!(merger.calls(), 1);
    assert_eq!(output.pyramid.content.len(), 1);
    let entry = &output.pyramid.content[0];
    assert_eq!(entry.tier, Tier::Variant); // mean similarity sits below 0.95
    assert_eq!(entry.provenance.path, MergePath::Delegated);
    assert_eq!(entry.member_ids.len(), 5);
    assert_eq!(output.stats.merge_calls_used, 1);
}

#[test]
fn moderately_similar_large_cluster_merges_to_an_edge_entry() {
    // Five members spread over 68 degrees: every unit chains to the cluster
    // (adjacent similarity ~0.96) but the pairwise mean is ~0.80. Size forces
    // delegation; the moderate mean keeps the merged entry on the edge tier.
    let examples: Vec<Example> = (0..5u32)
        .map(|i| {
            let angle = ((i as f64) * 17.0).to_radians();
            example(
                &format!("mid_{i}"),
                &format!("orders spread variant {i}"),
                "orders",
                i * 10 + 1,
            )
            .with_embedding(vec![angle.cos() as f32, angle.sin() as f32])
        })
        .collect();
    let merger = Arc::new(ScriptedMerger::default());
    let output = PyramidEngine::new(
        Box::new(HashEmbedder::default()),
        Box::new(ArcMerger(merger.clone())),
        PipelineConfig::default(),
    )
    .build(&examples, BuildOptions::default())
    .unwrap();

    assert_eq!(merger.calls(), 1);
    assert_eq!(output.pyramid.content.len(), 1);
    let entry = &output.pyramid.content[0];
    assert_eq!(entry.provenance.path, MergePath::Delegated);
    assert_eq!(entry.member_ids.len(), 5);
    let avg = entry.similarity.value();
    assert!((0.75..0.85).contains(&avg), "unexpected mean {avg}");
    assert_eq!(entry.tier, Tier::Edge);
}

#[test]
fn known_conflict_with_no_budget_degrades_to_edge() {
    let shared = vec![1.0_f32, 0.0];
    let examples = vec![
        example("p1", "use port 7497 for paper trading", "connect", 1)
            .with_embedding(shared.clone()),
        example("p2", "use port 4001 for paper trading", "connect", 10)
            .with_embedding(shared),
    ];
    let options = BuildOptions {
        known_conflicts: vec![Conflict {
            description: "paper trading port disagreement".to_string(),
            example_ids: vec!["p1".to_string(), "p2".to_string()],
            kind: ConflictKind::ContradictoryOutcome,
        }],
        ..Default::default()
    };
    let config = PipelineConfig {
        merge_budget: Some(0),
        ..Default::default()
    };
    let output = build(&examples, Box::new(ScriptedMerger::default()), config, options).unwrap();

    // Both bodies survive as separate edge entries; nothing was merged.
    assert_eq!(output.pyramid.content.len(), 2);
    assert!(output.pyramid.content.iter().all(|e| e.tier == Tier::Edge));
    assert!(output
        .report
        .items_of(ReviewKind::BudgetExhausted)
        .next()
        .is_some());
    assert!(output
        .report
        .items_of(ReviewKind::UnresolvedConflict)
        .next()
        .is_some());
    assert_eq!(output.stats.merge_calls_used, 0);
}

#[test]
fn non_preservable_content_stays_flagged_and_lossy() {
    // The caller marks two near-identical examples as not losslessly
    // mergeable. The merge still runs (delegation is forced by the conflict)
    // but the collaborator does not resolve it, so the entry stays on edge
    // with the loss recorded.
    let shared = vec![1.0_f32, 0.0];
    let examples = vec![
        example("n1", "ib.reqMktData(contract)", "ticker", 1).with_embedding(shared.clone()),
        example("n2", "ib.reqMktData(contract, snapshot=True)", "ticker", 10)
            .with_embedding(shared),
    ];
    let options = BuildOptions {
        known_conflicts: vec![Conflict {
            description: "snapshot form drops the streaming behavior".to_string(),
            example_ids: vec!["n1".to_string(), "n2".to_string()],
            kind: ConflictKind::NonPreservable,
        }],
        ..Default::default()
    };
    let output = build(
        &examples,
        Box::new(ScriptedMerger::new(false)),
        PipelineConfig::default(),
        options,
    )
    .unwrap();

    assert_eq!(output.pyramid.content.len(), 1);
    let entry = &output.pyramid.content[0];
    assert_eq!(entry.tier, Tier::Edge);
    assert_eq!(entry.provenance.path, MergePath::Delegated);
    assert!(!entry.provenance.lossless);
    assert!(entry
        .notes
        .as_deref()
        .is_some_and(|n| n.contains("snapshot form drops the streaming behavior")));
    assert!(output
        .report
        .items_of(ReviewKind::UnresolvedConflict)
        .next()
        .is_some());
}

#[test]
fn isolated_example_survives_as_edge_singleton() {
    let examples = vec![
        example("iso", "reqPositions()", "positions", 1).with_embedding(vec![0.0, 1.0]),
        example("a", "connect alpha", "connect", 10).with_embedding(vec![1.0, 0.0]),
        example("b", "connect alpha", "connect", 20).with_embedding(vec![1.0, 0.0]),
    ];
    let output = build(
        &examples,
        Box::new(ScriptedMerger::default()),
        PipelineConfig::default(),
        BuildOptions::default(),
    )
    .unwrap();

    let iso = output
        .pyramid
        .content
        .iter()
        .find(|e| e.member_ids == vec!["iso".to_string()])
        .unwrap();
    assert_eq!(iso.tier, Tier::Edge);
    assert_eq!(iso.occurrence_count, 1);

    let apex = output.pyramid.apex_for("positions").unwrap();
    assert_eq!(apex.mention_count, 1);
    assert_eq!(apex.example_count, 1);
    assert!(output
        .report
        .items_of(ReviewKind::ZeroDedup)
        .any(|i| i.example_ids == vec!["iso".to_string()]));
}

#[test]
fn cross_operation_merge_keeps_absorbed_mentions_accounted() {
    // Exact duplicates tagged with different operations fold into one entry
    // under the earlier example's operation; the other operation keeps its
    // mention through a pointer-less apex entry and the build still validates.
    let examples = vec![
        example("a", "ib.disconnect()", "connect", 1),
        example("b", "ib.disconnect()", "shutdown", 10),
    ];
    let output = build(
        &examples,
        Box::new(ScriptedMerger::default()),
        PipelineConfig::default(),
        BuildOptions::default(),
    )
    .unwrap();

    assert_eq!(output.pyramid.content.len(), 1);
    assert_eq!(output.pyramid.content[0].operation, "connect");
    assert_eq!(output.pyramid.content[0].occurrence_count, 2);

    let connect = output.pyramid.apex_for("connect").unwrap();
    assert_eq!(connect.mention_count, 1);
    assert_eq!(connect.example_count, 1);
    assert_eq!(connect.pointer, Some(0));

    let shutdown = output.pyramid.apex_for("shutdown").unwrap();
    assert_eq!(shutdown.mention_count, 1);
    assert_eq!(shutdown.example_count, 0);
    assert_eq!(shutdown.pointer, None);
    assert_eq!(shutdown.max_depth, 0);
}

#[test]
fn merge_failure_degrades_the_cluster_and_reports_it() {
    let examples = fanned_examples("orders");
    let output = build(
        &examples,
        Box::new(FailingMerger::default()),
        PipelineConfig::default(),
        BuildOptions::default(),
    )
    .unwrap();

    // Unmerged: one entry per distinct body, all edge tier.
    assert_eq!(output.pyramid.content.len(), 5);
    assert!(output.pyramid.content.iter().all(|e| e.tier == Tier::Edge));
    assert!(output
        .report
        .items_of(ReviewKind::MergeFailed)
        .next()
        .is_some());
}

#[test]
fn budget_caps_external_calls_across_clusters() {
    // Two independent 5-member clusters, both requiring delegation, budget 1.
    // The second fan sits 90 degrees away so the clusters stay disjoint.
    let mut examples = fanned_examples("orders");
    examples.extend(fan("pos", "positions", 90.0, 1001));
    let merger = Arc::new(ScriptedMerger::default());
    let config = PipelineConfig {
        merge_budget: Some(1),
        ..Default::default()
    };
    let output = PyramidEngine::new(
        Box::new(HashEmbedder::default()),
        Box::new(ArcMerger(merger.clone())),
        config,
    )
    .build(&examples, BuildOptions::default())
    .unwrap();

    assert_eq!(merger.calls(), 1);
    assert_eq!(output.stats.merge_calls_used, 1);
    assert_eq!(output.stats.merge_budget, Some(1));
    let exhausted: Vec<_> = output.report.items_of(ReviewKind::BudgetExhausted).collect();
    assert_eq!(exhausted.len(), 1);
}

#[test]
fn resolved_outcomes_replay_without_external_calls() {
    let examples = fanned_examples("orders");

    // First run: no budget, the cluster is pushed to review.
    let config = PipelineConfig {
        merge_budget: Some(0),
        ..Default::default()
    };
    let first = build(
        &examples,
        Box::new(ScriptedMerger::default()),
        config.clone(),
        BuildOptions::default(),
    )
    .unwrap();
    let pending = first
        .report
        .items_of(ReviewKind::BudgetExhausted)
        .next()
        .unwrap();
    let cluster_id = pending.cluster_id.clone().unwrap();

    // Second run: the reviewer supplies the merged body out of band.
    let merger = Arc::new(ScriptedMerger::default());
    let options = BuildOptions {
        resolved: [(
            cluster_id,
            MergeOutcome {
                canonical_text: "reviewed canonical body".to_string(),
                notes: "resolved in review".to_string(),
                conflicts_resolved: true,
            },
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    };
    let second = PyramidEngine::new(
        Box::new(HashEmbedder::default()),
        Box::new(ArcMerger(merger.clone())),
        config,
    )
    .build(&examples, options)
    .unwrap();

    assert_eq!(merger.calls(), 0);
    assert_eq!(second.pyramid.content.len(), 1);
    let entry = &second.pyramid.content[0];
    assert_eq!(entry.canonical_text, "reviewed canonical body");
    assert_eq!(entry.provenance.path, MergePath::Resolved);
}

#[test]
fn deferred_clusters_are_held_and_reported() {
    let examples = fanned_examples("orders");
    let config = PipelineConfig::default();

    // Discover the cluster id with a dry run, then defer it.
    let dry = build(
        &examples,
        Box::new(ScriptedMerger::default()),
        config.clone(),
        BuildOptions::default(),
    )
    .unwrap();
    let cluster_id = dry.pyramid.content[0].provenance.cluster_id.clone();

    let merger = Arc::new(ScriptedMerger::default());
    let options = BuildOptions {
        deferred: [cluster_id.clone()].into_iter().collect(),
        ..Default::default()
    };
    let output = PyramidEngine::new(
        Box::new(HashEmbedder::default()),
        Box::new(ArcMerger(merger.clone())),
        config,
    )
    .build(&examples, options)
    .unwrap();

    assert_eq!(merger.calls(), 0);
    assert!(output
        .report
        .items_of(ReviewKind::Deferred)
        .any(|i| i.cluster_id.as_deref() == Some(cluster_id.as_str())));
    // Held clusters keep every distinct body visible.
    assert_eq!(output.pyramid.content.len(), 5);
}

#[test]
fn concurrent_build_is_rejected_not_queued() {
    struct GateMerger {
        started: mpsc::SyncSender<()>,
        release: std::sync::Mutex<mpsc::Receiver<()>>,
    }
    impl IMergeProvider for GateMerger {
        fn merge(&self, _cluster: &Cluster, members: &[&Example]) -> PyramidResult<MergeOutcome> {
            self.started.send(()).ok();
            if let Ok(release) = self.release.lock() {
                release.recv().ok();
            }
            Ok(MergeOutcome {
                canonical_text: members[0].raw_text.clone(),
                notes: String::new(),
                conflicts_resolved: false,
            })
        }
        fn name(&self) -> &str {
            "gate"
        }
    }

    let (started_tx, started_rx) = mpsc::sync_channel(1);
    let (release_tx, release_rx) = mpsc::channel();
    let engine = Arc::new(PyramidEngine::new(
        Box::new(HashEmbedder::default()),
        Box::new(GateMerger {
            started: started_tx,
            release: std::sync::Mutex::new(release_rx),
        }),
        PipelineConfig::default(),
    ));

    let examples = fanned_examples("orders");
    let background = {
        let engine = engine.clone();
        let examples = examples.clone();
        thread::spawn(move || engine.build(&examples, BuildOptions::default()))
    };

    // Wait until the first build is provably inside phase 2.
    started_rx.recv().unwrap();
    let err = engine
        .build(&examples, BuildOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        pyramid_core::errors::PyramidError::BuildInProgress
    ));

    release_tx.send(()).unwrap();
    assert!(background.join().unwrap().is_ok());

    // The guard releases once the first build finishes. With the sender gone
    // the gate opens immediately, so this build runs straight through.
    drop(release_tx);
    assert!(engine.build(&examples, BuildOptions::default()).is_ok());
}

#[test]
fn pyramid_serializes_to_stable_json() {
    let examples = vec![
        tagged_example("w1", "conn = connect(host, port)", "connect", &["connection"], 1),
        tagged_example("w2", "conn = connect(host, port)", "connect", &["connection"], 10),
    ];
    let output = build(
        &examples,
        Box::new(ScriptedMerger::default()),
        PipelineConfig::default(),
        BuildOptions::default(),
    )
    .unwrap();

    let json = serde_json::to_string(&output.pyramid).unwrap();
    assert!(json.contains("\"a1\"")); // tier codes, not enum names
    let back: pyramid_core::models::PyramidIndex = serde_json::from_str(&json).unwrap();
    assert_eq!(back.content.len(), output.pyramid.content.len());
    assert_eq!(back.tag_index.version, "2.0");
}

/// Adapter so tests can keep a handle on a merger the engine owns.
struct ArcMerger(Arc<ScriptedMerger>);
impl IMergeProvider for ArcMerger {
    fn merge(&self, cluster: &Cluster, members: &[&Example]) -> PyramidResult<MergeOutcome> {
        self.0.merge(cluster, members)
    }
    fn name(&self) -> &str {
        self.0.name()
    }
}
