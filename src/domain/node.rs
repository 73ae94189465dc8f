// Node domain model - Ordered aggregate-voltage checkpoints
use super::error::ConfigurationError;
use serde::Serialize;

/// One checkpoint of a run: the aggregate voltage the pack must reach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Node {
    pub index: usize,
    pub target: f64,
}

impl Node {
    /// Acceptance predicate. Reaching the target exactly counts as reached.
    pub fn is_reached_by(&self, aggregate_voltage: f64) -> bool {
        aggregate_voltage >= self.target
    }
}

/// Non-empty node sequence with ascending targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeList {
    nodes: Vec<Node>,
}

impl NodeList {
    pub fn new(targets: &[f64]) -> Result<Self, ConfigurationError> {
        if targets.is_empty() {
            return Err(ConfigurationError::EmptyNodeList);
        }
        if let Some(bad) = targets.iter().find(|t| !t.is_finite()) {
            return Err(ConfigurationError::InvalidNodeTarget(*bad));
        }

        let mut sorted = targets.to_vec();
        sorted.sort_by(f64::total_cmp);

        let nodes = sorted
            .into_iter()
            .enumerate()
            .map(|(index, target)| Node { index, target })
            .collect();

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn targets(&self) -> Vec<f64> {
        self.nodes.iter().map(|n| n.target).collect()
    }
}
