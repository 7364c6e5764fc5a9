//! Property-based tests for bundle resolution.
//!
//! Random graphs are generated as adjacency lists; acyclic ones only let a
//! bundle depend on bundles with a lower index.

#[cfg(test)]
mod proptest_tests {
    use crate::error::Error;
    use crate::resolver::{dependency_order, BundleGraph};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn name(i: usize) -> String {
        format!("b{}", i)
    }

    /// Up to 12 bundles; bundle `i` may depend on any `j < i`.
    fn acyclic_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1usize..12).prop_flat_map(|n| {
            (0..n)
                .map(|i| {
                    if i == 0 {
                        Just(Vec::new()).boxed()
                    } else {
                        prop::collection::btree_set(0..i, 0..=i.min(4))
                            .prop_map(|s| s.into_iter().collect::<Vec<_>>())
                            .boxed()
                    }
                })
                .collect::<Vec<_>>()
        })
    }

    fn build(adjacency: &[Vec<usize>]) -> BundleGraph {
        let mut graph = BundleGraph::new();
        for (i, parents) in adjacency.iter().enumerate() {
            graph.insert(name(i), parents.iter().map(|p| name(*p)).collect());
        }
        graph
    }

    proptest! {
        /// Property: each reachable bundle appears exactly once and parents
        /// precede their children
        #[test]
        fn order_is_topological(adjacency in acyclic_graph()) {
            let graph = build(&adjacency);
            let root = adjacency.len() - 1;
            let order = dependency_order(&graph, &name(root)).unwrap();

            let unique: HashSet<&String> = order.iter().collect();
            prop_assert_eq!(unique.len(), order.len());
            prop_assert_eq!(order.last(), Some(&name(root)));

            for (index, bundle) in order.iter().enumerate() {
                let i: usize = bundle[1..].parse().unwrap();
                for parent in &adjacency[i] {
                    let parent_index = order.iter().position(|b| *b == name(*parent));
                    prop_assert!(parent_index.is_some());
                    prop_assert!(parent_index.unwrap() < index);
                }
            }
        }

        /// Property: resolving the same graph twice gives the same order
        #[test]
        fn order_is_deterministic(adjacency in acyclic_graph()) {
            let graph = build(&adjacency);
            let root = name(adjacency.len() - 1);
            prop_assert_eq!(
                dependency_order(&graph, &root).unwrap(),
                dependency_order(&graph, &root).unwrap()
            );
        }

        /// Property: closing a loop back to the root always fails, naming a
        /// bundle on the cycle
        #[test]
        fn back_edge_to_root_is_a_cycle(adjacency in acyclic_graph()) {
            prop_assume!(adjacency.len() > 1);
            let mut adjacency = adjacency;
            let root = adjacency.len() - 1;
            // Make b0 depend on the root and the root depend on b0.
            adjacency[0].push(root);
            if !adjacency[root].contains(&0) {
                adjacency[root].push(0);
            }
            let graph = build(&adjacency);

            let first = dependency_order(&graph, &name(root)).unwrap_err();
            let second = dependency_order(&graph, &name(root)).unwrap_err();
            match (first, second) {
                (
                    Error::ResolutionCycle { bundle: a, cycle: ca },
                    Error::ResolutionCycle { bundle: b, cycle: cb },
                ) => {
                    prop_assert_eq!(&a, &b);
                    prop_assert_eq!(&ca, &cb);
                    prop_assert!(ca.starts_with(a.as_str()) && ca.ends_with(a.as_str()));
                    prop_assert!(ca.contains(&name(root)) && ca.contains(&name(0)));
                }
                (other, _) => prop_assert!(false, "expected a cycle, got {}", other),
            }
        }
    }
}
