#[macro_use]
extern crate proptest;

use proptest::prelude::{Strategy, any, prop};

mod common;
use common::*;

use std::sync::Arc;

use flowloom::handlers::Collaborators;
use flowloom::model::{Edge, Node, NodeType, WorkflowGraph};
use flowloom::registry::HandlerRegistry;
use flowloom::runtime::EngineConfig;
use flowloom::validator::validate_graph;

// Generators shared by the structural-validation properties.

/// Generate node name stems: a letter followed by 0..12 of [A-Za-z0-9_].
/// The trigger id `start` is reserved by the chain builder.
fn name_strategy() -> impl Strategy<Value = String> {
    let base = prop::string::string_regex("[a-z][a-z0-9_]{0,12}").unwrap();
    base.prop_filter("exclude the reserved entry id", |s| s != "start")
}

fn registry() -> HandlerRegistry {
    let config = EngineConfig::default();
    let mut registry =
        HandlerRegistry::builtin(&Collaborators::in_memory(&config)).expect("builtin registry");
    registry
        .register(Arc::new(EchoHandler))
        .expect("register echo");
    registry
}

/// `start` trigger followed by one echo node per name, wired as a chain.
fn chain(names: &[String]) -> WorkflowGraph {
    let mut nodes = vec![Node::new("start", NodeType::WebhookTrigger)];
    let mut edges = Vec::new();
    let mut previous = "start".to_string();
    for (index, name) in names.iter().enumerate() {
        let id = format!("n{index}_{name}");
        nodes.push(Node::new(&id, NodeType::Custom("echo".into())));
        edges.push(Edge::new(format!("e{index}"), previous.clone(), id.clone()));
        previous = id;
    }
    WorkflowGraph::new(nodes, edges)
}

proptest! {
    #[test]
    fn prop_linear_chains_validate_clean(
        mut names in prop::collection::vec(name_strategy(), 0..8),
    ) {
        names.sort();
        names.dedup();

        let graph = chain(&names);
        let errors = validate_graph(&graph, &registry());
        prop_assert!(errors.is_empty(), "unexpected errors: {errors:#?}");
    }

    #[test]
    fn prop_back_edges_always_close_a_cycle(
        mut names in prop::collection::vec(name_strategy(), 2..8),
        target_seed in any::<usize>(),
    ) {
        names.sort();
        names.dedup();
        prop_assume!(names.len() >= 2);

        let mut graph = chain(&names);
        let clean = validate_graph(&graph, &registry());
        prop_assert!(!clean.iter().any(|e| e.contains("cycle detected")));

        // Any edge from the chain's tail back into the chain closes a cycle.
        let tail = graph.nodes.last().unwrap().id.clone();
        let target_index = 1 + target_seed % names.len();
        let target = graph.nodes[target_index].id.clone();
        graph.edges.push(Edge::new("back", tail, target));

        let errors = validate_graph(&graph, &registry());
        prop_assert!(
            errors.iter().any(|e| e.contains("cycle detected")),
            "no cycle reported: {errors:#?}"
        );
    }

    #[test]
    fn prop_duplicated_triples_are_reported_once(
        mut names in prop::collection::vec(name_strategy(), 1..8),
        pick_seed in any::<usize>(),
    ) {
        names.sort();
        names.dedup();

        let mut graph = chain(&names);
        let copied = graph.edges[pick_seed % graph.edges.len()].clone();
        graph.edges.push(Edge::new("dup", copied.source, copied.target));

        let errors = validate_graph(&graph, &registry());
        let reported = errors
            .iter()
            .filter(|e| e.contains("duplicate edge"))
            .count();
        prop_assert_eq!(reported, 1, "errors: {:#?}", errors);
    }

    #[test]
    fn prop_validation_is_deterministic(
        mut names in prop::collection::vec(name_strategy(), 1..8),
        extra in prop::collection::vec((any::<usize>(), any::<usize>()), 0..6),
        drop_trigger in any::<bool>(),
    ) {
        names.sort();
        names.dedup();

        // Start from a chain, then wire arbitrary extra edges; the result may
        // contain cycles, duplicates, and orphaned triggers.
        let mut graph = chain(&names);
        if drop_trigger {
            graph.nodes.remove(0);
        }
        let count = graph.nodes.len();
        for (index, (from_seed, to_seed)) in extra.iter().enumerate() {
            let from = graph.nodes[from_seed % count].id.clone();
            let to = graph.nodes[to_seed % count].id.clone();
            graph.edges.push(Edge::new(format!("x{index}"), from, to));
        }

        let registry = registry();
        let first = validate_graph(&graph, &registry);
        let second = validate_graph(&graph, &registry);
        prop_assert_eq!(first, second);
    }
}
