#![forbid(unsafe_code)]

use crate::{NodeFactory, NodeMeta, SchemaDescriptor, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Branch,
    Leaf,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Branch => "branch",
            Role::Leaf => "leaf",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "branch" => Some(Role::Branch),
            "leaf" => Some(Role::Leaf),
            _ => None,
        }
    }
}

/// Bridge between a concrete node type and the generic store.
///
/// Implementors expose their identity tuple and their payload fields as a
/// positional row in the order of the role's [`SchemaDescriptor`].
pub trait NodeCodec {
    /// Discriminator used to pick a constructor when materializing rows.
    fn kind(&self) -> &str;

    fn metadata(&self) -> NodeMeta;

    fn set_metadata(&mut self, meta: NodeMeta);

    fn values(&self) -> Vec<Value>;

    /// Large text kept outside the relational row when the content cache is on.
    fn extract_payload(&self) -> Option<String> {
        None
    }

    fn inject_payload(&mut self, _payload: String) {}
}

/// Everything a concrete tree supplies to the storage engine.
pub trait TreeSchema {
    type Branch: NodeCodec;
    type Leaf: NodeCodec;

    /// Store identifier; names the table and the cache directory.
    fn name(&self) -> &str;

    fn branch_schema(&self) -> &SchemaDescriptor;

    fn leaf_schema(&self) -> &SchemaDescriptor;

    fn branch_factory(&self) -> &NodeFactory<Self::Branch>;

    fn leaf_factory(&self) -> &NodeFactory<Self::Leaf>;

    fn schema_for(&self, role: Role) -> &SchemaDescriptor {
        match role {
            Role::Branch => self.branch_schema(),
            Role::Leaf => self.leaf_schema(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TreeNode<B, L> {
    Branch(B),
    Leaf(L),
}

impl<B: NodeCodec, L: NodeCodec> TreeNode<B, L> {
    pub fn role(&self) -> Role {
        match self {
            TreeNode::Branch(_) => Role::Branch,
            TreeNode::Leaf(_) => Role::Leaf,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            TreeNode::Branch(node) => node.kind(),
            TreeNode::Leaf(node) => node.kind(),
        }
    }

    pub fn metadata(&self) -> NodeMeta {
        match self {
            TreeNode::Branch(node) => node.metadata(),
            TreeNode::Leaf(node) => node.metadata(),
        }
    }

    pub fn set_metadata(&mut self, meta: NodeMeta) {
        match self {
            TreeNode::Branch(node) => node.set_metadata(meta),
            TreeNode::Leaf(node) => node.set_metadata(meta),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.metadata().id
    }

    pub fn values(&self) -> Vec<Value> {
        match self {
            TreeNode::Branch(node) => node.values(),
            TreeNode::Leaf(node) => node.values(),
        }
    }

    pub fn as_branch(&self) -> Option<&B> {
        match self {
            TreeNode::Branch(node) => Some(node),
            TreeNode::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&L> {
        match self {
            TreeNode::Branch(_) => None,
            TreeNode::Leaf(node) => Some(node),
        }
    }
}
