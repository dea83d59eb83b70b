//! Property tests over randomly constructed graphs.

use peirce::context::{contexts, nested_contexts};
use peirce::context::{context_of, depth, polarity, vertex_in_scope};
use peirce::core::{ContextId, ElementId, RelationalGraphWithCuts, VertexId};
use peirce::fingerprint::graph_fingerprint;
use peirce::operations::{is_well_formed, GraphBuilder};
use peirce::pattern::Fragment;
use peirce::subgraph::identify_subgraph;
use peirce::transform::{apply_transformation, validate_transformation, Rule, RuleParams, TransformationEngine};
use peirce::validator::{get_available_transformations, validate_graph_structure};
use peirce::EngineConfig;
use proptest::prelude::*;

const RELATIONS: [&str; 3] = ["P", "Q", "R"];

/// A construction step: kind, context choice, payload choice.
type Op = (u8, usize, usize);

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec((0u8..3, any::<usize>(), any::<usize>()), 0..14)
}

/// Replays construction steps through the checked builder. Every step picks
/// an existing context and, for edges, arguments visible from it, so the
/// result is always well-formed.
fn build(ops: &[Op]) -> RelationalGraphWithCuts {
    let mut builder = GraphBuilder::new();
    for &(kind, a, b) in ops {
        let all = contexts(builder.graph());
        let ctx = all[a % all.len()];
        match kind {
            0 => {
                builder.cut(ctx).unwrap();
            }
            1 if b % 2 == 0 => {
                builder.variable(ctx).unwrap();
            }
            1 => {
                builder.constant(ctx, "c").unwrap();
            }
            _ => {
                let visible: Vec<VertexId> = builder
                    .graph()
                    .vertices()
                    .map(|v| v.id)
                    .filter(|&v| vertex_in_scope(builder.graph(), v, ctx).unwrap())
                    .collect();
                if visible.is_empty() {
                    continue;
                }
                let args = [visible[b % visible.len()], visible[(b / 7) % visible.len()]];
                let arity = 1 + b % 2;
                builder.edge(ctx, RELATIONS[b % RELATIONS.len()], &args[..arity]).unwrap();
            }
        }
    }
    builder.build()
}

fn context_depth(graph: &RelationalGraphWithCuts, element: ElementId) -> usize {
    depth(graph, context_of(graph, element).unwrap()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn constructed_graphs_are_well_formed(ops in arb_ops()) {
        let graph = build(&ops);
        let report = validate_graph_structure(&graph);
        prop_assert!(report.is_valid, "violations: {:?}", report.errors);
    }

    /// Every offered transformation applies and preserves every invariant.
    #[test]
    fn offered_transformations_preserve_invariants(ops in arb_ops()) {
        let graph = build(&ops);
        let engine = TransformationEngine::new(EngineConfig::default().with_output_checks(true));
        let before = graph.clone();
        for element in graph.elements() {
            for offer in get_available_transformations(&graph, &[element]).unwrap() {
                let outcome = engine.apply(&graph, offer.rule, offer.selection.as_ref(), &offer.params);
                prop_assert!(outcome.is_ok(), "{} failed: {:?}", offer.description, outcome);
                let outcome = outcome.unwrap();
                prop_assert!(is_well_formed(&outcome.graph), "{} broke the graph", offer.description);
            }
        }
        prop_assert_eq!(graph, before);
    }

    /// Erasure is legal exactly where insertion is not.
    #[test]
    fn erasure_and_insertion_split_by_polarity(ops in arb_ops()) {
        let graph = build(&ops);
        let mut payload = Fragment::new();
        payload.vertex(ContextId::Sheet, None, true).unwrap();
        for ctx in contexts(&graph) {
            let added = apply_transformation(
                &graph,
                Rule::IsolatedVertexAddition,
                None,
                &RuleParams::new().with_target(ctx),
            )
            .unwrap();
            let selection = identify_subgraph(&added.graph, added.introduced.iter().copied()).unwrap();
            let erasable =
                validate_transformation(&added.graph, Rule::Erasure, Some(&selection), &RuleParams::new()).is_ok();
            let insertable = validate_transformation(
                &graph,
                Rule::Insertion,
                None,
                &RuleParams::new().with_target(ctx).with_fragment(payload.clone()),
            )
            .is_ok();
            let positive = polarity(&graph, ctx).unwrap().is_positive();
            prop_assert_eq!(erasable, positive);
            prop_assert_eq!(insertable, !positive);
        }
    }

    /// Wrapping any element in a double cut and removing it restores the graph.
    #[test]
    fn double_cut_round_trip(ops in arb_ops()) {
        let graph = build(&ops);
        let engine = TransformationEngine::new(EngineConfig::default().with_double_cut_lifting(true));
        for element in graph.elements() {
            let selection = identify_subgraph(&graph, [element]).unwrap();
            let Ok(wrapped) = engine.apply(&graph, Rule::DoubleCutInsertion, Some(&selection), &RuleParams::new())
            else {
                continue;
            };
            let outer = wrapped
                .introduced
                .iter()
                .filter_map(ElementId::as_cut)
                .find(|&c| wrapped.graph.area(selection.home()).contains(&ElementId::Cut(c)))
                .unwrap();
            let restored = engine
                .apply(&wrapped.graph, Rule::DoubleCutRemoval, None, &RuleParams::new().with_cut(outer))
                .unwrap();
            prop_assert_eq!(&restored.graph, &graph);
        }
    }

    /// Iterated copies never land shallower than their source.
    #[test]
    fn iteration_never_moves_outward(ops in arb_ops()) {
        let graph = build(&ops);
        for edge in graph.edges() {
            let selection = identify_subgraph(&graph, [ElementId::Edge(edge)]).unwrap();
            let source_depth = context_depth(&graph, ElementId::Edge(edge));
            for target in nested_contexts(&graph, selection.home()).unwrap() {
                let params = RuleParams::new().with_target(target);
                let outcome = apply_transformation(&graph, Rule::Iteration, Some(&selection), &params).unwrap();
                for &element in &outcome.introduced {
                    prop_assert!(context_depth(&outcome.graph, element) >= source_depth);
                }
            }
        }
    }

    /// Fingerprints agree with graph equality across a JSON round trip.
    #[test]
    fn fingerprint_survives_serialization(ops in arb_ops()) {
        let graph = build(&ops);
        let back: RelationalGraphWithCuts = serde_json::from_str(&serde_json::to_string(&graph).unwrap()).unwrap();
        prop_assert_eq!(graph_fingerprint(&back), graph_fingerprint(&graph));
        prop_assert_eq!(back, graph);
    }
}
