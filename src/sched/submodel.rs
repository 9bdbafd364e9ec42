//! Topologically ordered evaluation lists.

/// One entry of the evaluation list: a component and one of its evaluation
/// groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalNode {
    pub comp: usize,
    pub group: usize,
}

/// Ordered collection of `(component, group)` pairs produced by the
/// dependency solver.
///
/// `nodes` is a full topological order; `layers` partitions it for the
/// parallel step disciplines such that all dependencies of a layer lie in
/// earlier layers and no component appears twice within one layer.
#[derive(Debug, Clone, Default)]
pub struct SubModel {
    nodes: Vec<EvalNode>,
    layers: Vec<Vec<usize>>,
    components: Vec<usize>,
}

impl SubModel {
    pub fn new(nodes: Vec<EvalNode>, depths: Vec<usize>) -> Self {
        debug_assert_eq!(nodes.len(), depths.len());

        let num_layers = depths.iter().map(|d| d + 1).max().unwrap_or(0);
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); num_layers];
        for (idx, &depth) in depths.iter().enumerate() {
            buckets[depth].push(idx);
        }

        // Split any layer in which a component appears more than once; the
        // multi-thread discipline steps a layer's components concurrently.
        let mut layers = Vec::with_capacity(num_layers);
        for bucket in buckets {
            let mut current: Vec<usize> = Vec::new();
            let mut overflow: Vec<usize> = bucket;
            while !overflow.is_empty() {
                let pending = std::mem::take(&mut overflow);
                for idx in pending {
                    let comp = nodes[idx].comp;
                    if current.iter().any(|&i| nodes[i].comp == comp) {
                        overflow.push(idx);
                    } else {
                        current.push(idx);
                    }
                }
                layers.push(std::mem::take(&mut current));
            }
        }

        let mut components = Vec::new();
        for node in &nodes {
            if !components.contains(&node.comp) {
                components.push(node.comp);
            }
        }

        Self {
            nodes,
            layers,
            components,
        }
    }

    /// The full evaluation list in topological order.
    pub fn nodes(&self) -> &[EvalNode] {
        &self.nodes
    }

    /// Layer partition; entries index into [`SubModel::nodes`].
    pub fn layers(&self) -> &[Vec<usize>] {
        &self.layers
    }

    /// Unique component ids in first-appearance order.
    pub fn components(&self) -> &[usize] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
