use std::collections::HashMap;

use sha2::{Digest as ShaDigest, Sha512};

use super::{message::Hashable, order::Order, peers::GeneralId};
use crate::{common::crypto::Digest, error::ProtocolError};

/*
    Each lieutenant keeps the messages it has heard as a tree. The root is the
    value received from the commander. A node with path [1, 3, 5] is the value
    general 5 said that general 3 said that the commander said. Once the last
    round is over the tree is folded bottom-up: a leaf reports its own value,
    an inner node reports the majority of its children.

    The tree is stored as an arena. Every node is reachable by its path, so a
    relayed message finds its parent with a map lookup instead of a walk.
*/

pub type NodeIndex = usize;

pub const ROOT: NodeIndex = 0;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MessageNode {
    pub decision: Order,
    pub path: Vec<GeneralId>,
    pub children: Vec<NodeIndex>,
    pub output: Option<Order>,
}

impl MessageNode {
    pub fn new(decision: Order) -> Self {
        MessageNode {
            decision,
            path: Vec::new(),
            children: Vec::new(),
            output: None,
        }
    }

    /// Copy of this message forwarded by `id`. The copy is a fresh leaf: the
    /// forwarder's subtree stays with the forwarder.
    pub fn append_to_path(&self, id: GeneralId) -> Self {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(&self.path);
        path.push(id);

        MessageNode {
            decision: self.decision,
            path,
            children: Vec::new(),
            output: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The general this instance was last relayed by.
    pub fn sender(&self) -> Option<GeneralId> {
        self.path.last().copied()
    }

    pub fn contains(&self, id: GeneralId) -> bool {
        self.path.contains(&id)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl Hashable for MessageNode {
    fn hash(&self) -> Digest {
        let mut hasher = Sha512::new();
        hasher.update((self.path.len() as u32).to_be_bytes());
        for id in &self.path {
            hasher.update(id.to_be_bytes());
        }
        hasher.update(self.decision.as_ref());
        let result = hasher.finalize();
        let mut digest = [0u8; 64];
        digest.copy_from_slice(&result[..]);
        digest
    }
}

#[derive(Clone, Debug)]
pub struct MessageTree {
    nodes: Vec<MessageNode>,
    index: HashMap<Vec<GeneralId>, NodeIndex>,
}

impl MessageTree {
    pub fn new(mut root: MessageNode) -> Self {
        root.children.clear();
        root.output = None;

        let mut index = HashMap::new();
        index.insert(root.path.clone(), ROOT);

        MessageTree {
            nodes: vec![root],
            index,
        }
    }

    pub fn root(&self) -> &MessageNode {
        &self.nodes[ROOT]
    }

    pub fn find(&self, path: &[GeneralId]) -> Option<&MessageNode> {
        self.index.get(path).map(|&idx| &self.nodes[idx])
    }

    pub fn children(&self, idx: NodeIndex) -> impl Iterator<Item = &MessageNode> {
        self.nodes
            .get(idx)
            .into_iter()
            .flat_map(move |node| node.children.iter().map(move |&child| &self.nodes[child]))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageNode> {
        self.nodes.iter()
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(MessageNode::depth).max().unwrap_or(0)
    }

    /// Deepest node whose path is a proper prefix of `path`, or the root.
    pub fn locate_parent(&self, path: &[GeneralId]) -> NodeIndex {
        (1..path.len())
            .rev()
            .find_map(|len| self.index.get(&path[..len]).copied())
            .unwrap_or(ROOT)
    }

    pub fn insert(&mut self, mut node: MessageNode) -> Result<NodeIndex, ProtocolError> {
        if self.index.contains_key(&node.path) {
            return Err(ProtocolError::DuplicatePath(node.path));
        }
        if has_repeat(&node.path) {
            return Err(ProtocolError::CyclicPath(node.path));
        }

        node.children.clear();
        node.output = None;

        let parent = self.locate_parent(&node.path);
        let idx = self.nodes.len();
        self.index.insert(node.path.clone(), idx);
        self.nodes.push(node);
        self.nodes[parent].children.push(idx);
        Ok(idx)
    }

    /// Nodes whose path has exactly `depth` hops, in ascending path order.
    pub fn nodes_at_depth(&self, depth: usize) -> Vec<&MessageNode> {
        let mut nodes: Vec<&MessageNode> = self
            .nodes
            .iter()
            .filter(|node| node.depth() == depth)
            .collect();
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        nodes
    }

    /// Folds the tree bottom-up and returns the root's output.
    ///
    /// A child is always stored after its parent, so walking the arena
    /// backwards visits every child before its parent.
    pub fn resolve(&mut self) -> Order {
        for idx in (0..self.nodes.len()).rev() {
            let node = &self.nodes[idx];
            let output = if node.is_leaf() {
                node.decision
            } else {
                Order::majority(
                    node.children
                        .iter()
                        .filter_map(|&child| self.nodes[child].output),
                )
            };
            self.nodes[idx].output = Some(output);
        }

        let root = &self.nodes[ROOT];
        root.output.unwrap_or(root.decision)
    }
}

impl Hashable for MessageTree {
    fn hash(&self) -> Digest {
        let mut nodes: Vec<&MessageNode> = self.nodes.iter().collect();
        nodes.sort_by(|a, b| a.path.cmp(&b.path));

        let mut hasher = Sha512::new();
        for node in nodes {
            hasher.update(node.hash());
            hasher.update((node.children.len() as u32).to_be_bytes());
        }
        let result = hasher.finalize();
        let mut digest = [0u8; 64];
        digest.copy_from_slice(&result[..]);
        digest
    }
}

fn has_repeat(path: &[GeneralId]) -> bool {
    path.iter()
        .enumerate()
        .any(|(i, id)| path[..i].contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(ids: &[u32]) -> Vec<GeneralId> {
        ids.iter().map(|&id| GeneralId(id)).collect()
    }

    fn leaf(decision: Order, ids: &[u32]) -> MessageNode {
        MessageNode {
            decision,
            path: path(ids),
            children: Vec::new(),
            output: None,
        }
    }

    #[test]
    fn test_append_to_path_is_a_leaf() {
        let mut node = leaf(Order::Attack, &[1]);
        node.children.push(7);
        node.output = Some(Order::Retreat);

        let relayed = node.append_to_path(GeneralId(3));

        assert_eq!(relayed.decision, Order::Attack);
        assert_eq!(relayed.path, path(&[1, 3]));
        assert!(relayed.is_leaf());
        assert_eq!(relayed.output, None);
        assert_eq!(relayed.sender(), Some(GeneralId(3)));
        // original untouched
        assert_eq!(node.path, path(&[1]));
    }

    #[test]
    fn test_locate_parent() {
        let mut tree = MessageTree::new(leaf(Order::Attack, &[1]));
        let a = tree.insert(leaf(Order::Attack, &[1, 2])).unwrap();
        let b = tree.insert(leaf(Order::Attack, &[1, 3])).unwrap();
        let c = tree.insert(leaf(Order::Attack, &[1, 2, 3])).unwrap();

        assert_eq!(tree.locate_parent(&path(&[1, 4])), ROOT);
        assert_eq!(tree.locate_parent(&path(&[1, 2, 4])), a);
        assert_eq!(tree.locate_parent(&path(&[1, 3, 2])), b);
        assert_eq!(tree.locate_parent(&path(&[1, 2, 3, 4])), c);
        // no matching prefix attaches to the root
        assert_eq!(tree.locate_parent(&path(&[9, 8])), ROOT);
        assert_eq!(tree.root().children, vec![a, b]);
        let under_a: Vec<_> = tree.children(a).map(|node| node.path.clone()).collect();
        assert_eq!(under_a, vec![path(&[1, 2, 3])]);
    }

    #[test]
    fn test_insert_rejects_duplicate_and_cyclic_paths() {
        let mut tree = MessageTree::new(leaf(Order::Attack, &[1]));
        tree.insert(leaf(Order::Attack, &[1, 2])).unwrap();

        assert_eq!(
            tree.insert(leaf(Order::Retreat, &[1, 2])),
            Err(ProtocolError::DuplicatePath(path(&[1, 2])))
        );
        assert_eq!(
            tree.insert(leaf(Order::Retreat, &[1, 2, 1])),
            Err(ProtocolError::CyclicPath(path(&[1, 2, 1])))
        );
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_nodes_at_depth_sorted_by_path() {
        let mut tree = MessageTree::new(leaf(Order::Attack, &[1]));
        tree.insert(leaf(Order::Attack, &[1, 4])).unwrap();
        tree.insert(leaf(Order::Attack, &[1, 2])).unwrap();
        tree.insert(leaf(Order::Attack, &[1, 3])).unwrap();
        tree.insert(leaf(Order::Attack, &[1, 4, 2])).unwrap();

        let paths: Vec<_> = tree
            .nodes_at_depth(2)
            .into_iter()
            .map(|node| node.path.clone())
            .collect();

        assert_eq!(paths, vec![path(&[1, 2]), path(&[1, 3]), path(&[1, 4])]);
        assert_eq!(tree.nodes_at_depth(1).len(), 1);
        assert_eq!(tree.max_depth(), 3);
    }

    #[test]
    fn test_resolve_leaf_root() {
        let mut tree = MessageTree::new(leaf(Order::Attack, &[1]));

        assert_eq!(tree.resolve(), Order::Attack);
        assert_eq!(tree.root().output, Some(Order::Attack));
    }

    #[test]
    fn test_resolve_majority_over_subtrees() {
        // Root says attack, but two of its three children resolve to retreat.
        let mut tree = MessageTree::new(leaf(Order::Attack, &[1]));
        tree.insert(leaf(Order::Attack, &[1, 2])).unwrap();
        tree.insert(leaf(Order::Attack, &[1, 3])).unwrap();
        tree.insert(leaf(Order::Retreat, &[1, 4])).unwrap();
        tree.insert(leaf(Order::Retreat, &[1, 3, 2])).unwrap();
        tree.insert(leaf(Order::Retreat, &[1, 3, 4])).unwrap();

        assert_eq!(tree.resolve(), Order::Retreat);
        assert_eq!(tree.find(&path(&[1, 3])).unwrap().output, Some(Order::Retreat));
        assert_eq!(tree.find(&path(&[1, 2])).unwrap().output, Some(Order::Attack));
    }

    #[test]
    fn test_resolve_tie_goes_to_retreat() {
        let mut tree = MessageTree::new(leaf(Order::Attack, &[1]));
        tree.insert(leaf(Order::Attack, &[1, 2])).unwrap();
        tree.insert(leaf(Order::Retreat, &[1, 3])).unwrap();

        assert_eq!(tree.resolve(), Order::Retreat);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let mut tree = MessageTree::new(leaf(Order::Retreat, &[1]));
        tree.insert(leaf(Order::Attack, &[1, 2])).unwrap();
        tree.insert(leaf(Order::Attack, &[1, 3])).unwrap();
        tree.insert(leaf(Order::Retreat, &[1, 2, 3])).unwrap();

        let mut copy = tree.clone();
        let first = tree.resolve();
        let second = tree.resolve();

        assert_eq!(first, second);
        assert_eq!(copy.resolve(), first);
    }

    #[test]
    fn test_digest_ignores_arrival_order() {
        let mut first = MessageTree::new(leaf(Order::Attack, &[1]));
        first.insert(leaf(Order::Attack, &[1, 2])).unwrap();
        first.insert(leaf(Order::Retreat, &[1, 3])).unwrap();

        let mut second = MessageTree::new(leaf(Order::Attack, &[1]));
        second.insert(leaf(Order::Retreat, &[1, 3])).unwrap();
        second.insert(leaf(Order::Attack, &[1, 2])).unwrap();

        assert_eq!(first.hash(), second.hash());

        second.insert(leaf(Order::Attack, &[1, 3, 2])).unwrap();
        assert_ne!(first.hash(), second.hash());
    }
}
