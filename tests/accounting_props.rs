use std::collections::HashMap;
use std::mem::size_of;
use std::sync::{Arc, Mutex};

use memsize::{reflect_struct, scan, Sizes};
use proptest::prelude::*;

struct Vertex {
    label: String,
    tags: HashMap<u32, String>,
    links: Mutex<Vec<Arc<Vertex>>>,
}

reflect_struct!(Vertex { label, tags, links });

struct Graph {
    vertices: Vec<Arc<Vertex>>,
    pinned: Option<Arc<Vertex>>,
}

reflect_struct!(Graph { vertices, pinned });

/// Vertices with random labels and tags, linked by `edges` (cycles included).
fn build(labels: &[String], tag_counts: &[u32], edges: &[(usize, usize)]) -> Vec<Arc<Vertex>> {
    let vertices: Vec<Arc<Vertex>> = labels
        .iter()
        .zip(tag_counts)
        .map(|(label, &tags)| {
            Arc::new(Vertex {
                label: label.clone(),
                tags: (0..tags).map(|t| (t, format!("{label}/{t}"))).collect(),
                links: Mutex::new(Vec::new()),
            })
        })
        .collect();
    for &(from, to) in edges {
        let target = Arc::clone(&vertices[to % vertices.len()]);
        vertices[from % vertices.len()]
            .links
            .lock()
            .expect("links lock")
            .push(target);
    }
    vertices
}

fn unlink(vertices: &[Arc<Vertex>]) {
    for vertex in vertices {
        vertex.links.lock().expect("links lock").clear();
    }
}

fn breakdown_sum(sizes: &Sizes) -> usize {
    sizes.by_type.values().map(|size| size.total).sum()
}

proptest! {
    #[test]
    fn random_graphs_account_consistently(
        labels in proptest::collection::vec("[a-z]{0,24}", 1..12),
        tag_counts in proptest::collection::vec(0u32..4, 12),
        edges in proptest::collection::vec((0usize..12, 0usize..12), 0..40),
        pinned in 0usize..12,
    ) {
        let vertices = build(&labels, &tag_counts, &edges);
        let graph = Graph {
            pinned: Some(Arc::clone(&vertices[pinned % vertices.len()])),
            vertices: vertices.clone(),
        };

        let first = scan(&graph, &["graph"]);
        prop_assert_eq!(breakdown_sum(&first), first.total);

        let counted = first.get::<Vertex>().expect("vertices attributed");
        prop_assert_eq!(counted.count, vertices.len(), "each vertex counted once");
        prop_assert!(counted.total >= vertices.len() * size_of::<Vertex>());

        let second = scan(&graph, &["graph"]);
        prop_assert_eq!(&first, &second);

        let reversed = Graph {
            pinned: graph.pinned.clone(),
            vertices: vertices.iter().rev().cloned().collect(),
        };
        let third = scan(&reversed, &["reversed"]);
        prop_assert_eq!(third.total, first.total);
        prop_assert_eq!(third.get::<Vertex>(), first.get::<Vertex>());

        unlink(&vertices);
    }
}
