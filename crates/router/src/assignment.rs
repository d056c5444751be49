//! Partition assignment input from the control plane (§6 "Partition
//! assignment inputs"): which shards this node leads and which it follows.

use serde::{Deserialize, Serialize};

/// One node's leader/follower shard lists within a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAssignment {
    pub node_id: String,
    pub leader_shards: Vec<u32>,
    pub follower_shards: Vec<u32>,
    pub is_edge: bool,
}

/// A replica group: one leader node plus its followers for a set of shards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub group_name: String,
    pub nodes: Vec<NodeAssignment>,
}

/// Cluster-wide shard assignment, as published by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub cluster_name: String,
    pub shard_number: u32,
    pub groups: Vec<GroupAssignment>,
}

impl ClusterAssignment {
    /// This node's assignment, if it appears in any group.
    pub fn node(&self, node_id: &str) -> Option<&NodeAssignment> {
        self.groups.iter().flat_map(|g| g.nodes.iter()).find(|n| n.node_id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_node_across_groups() {
        let assignment = ClusterAssignment {
            cluster_name: "c".into(),
            shard_number: 4,
            groups: vec![
                GroupAssignment {
                    group_name: "g0".into(),
                    nodes: vec![NodeAssignment { node_id: "n0".into(), leader_shards: vec![0, 1], follower_shards: vec![], is_edge: false }],
                },
                GroupAssignment {
                    group_name: "g1".into(),
                    nodes: vec![NodeAssignment { node_id: "n1".into(), leader_shards: vec![], follower_shards: vec![0, 1], is_edge: false }],
                },
            ],
        };

        assert_eq!(assignment.node("n1").unwrap().follower_shards, vec![0, 1]);
        assert!(assignment.node("missing").is_none());
    }
}
