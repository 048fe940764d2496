//! # Expression Tree
//!
//! The operator tree the engine evaluates. A node is either a resolved
//! matrix leaf or an unresolved operation over child nodes. The engine walks
//! the tree with [`ComputationNode::find_resolvable`], computes the node it
//! gets back and replaces it with a leaf through [`ComputationNode::resolve`],
//! until the root itself is a leaf.
//!
//! Nodes are owned values: resolution goes through `&mut`, so a tree can only
//! be resolved by the single owner currently holding it.

use std::fmt;
use std::str::FromStr;

use crate::errors::ComputeError;
use crate::types::MatrixData;

/// Operators that can appear in an unresolved node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Multiply,
    Negate,
    Transpose,
}

impl Operator {
    /// Number of operands the engine expects after associative nesting.
    pub fn arity(self) -> usize {
        match self {
            Operator::Add | Operator::Multiply => 2,
            Operator::Negate | Operator::Transpose => 1,
        }
    }

    /// Whether n-ary uses of the operator may be folded into binary nodes.
    pub fn is_associative(self) -> bool {
        matches!(self, Operator::Add | Operator::Multiply)
    }

    /// Symbol used in the textual input format.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Multiply => "*",
            Operator::Negate => "-",
            Operator::Transpose => "T",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Add => "ADD",
            Operator::Multiply => "MULTIPLY",
            Operator::Negate => "NEGATE",
            Operator::Transpose => "TRANSPOSE",
        };
        f.write_str(name)
    }
}

impl FromStr for Operator {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Operator::Add),
            "*" => Ok(Operator::Multiply),
            "-" => Ok(Operator::Negate),
            "T" => Ok(Operator::Transpose),
            other => Err(ComputeError::InvalidInput(format!(
                "unknown operator '{}'",
                other
            ))),
        }
    }
}

/// Tag of a node, leaf or operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputationNodeType {
    Matrix,
    Add,
    Multiply,
    Negate,
    Transpose,
}

impl From<Operator> for ComputationNodeType {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Add => ComputationNodeType::Add,
            Operator::Multiply => ComputationNodeType::Multiply,
            Operator::Negate => ComputationNodeType::Negate,
            Operator::Transpose => ComputationNodeType::Transpose,
        }
    }
}

/// A node of the expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputationNode {
    /// Resolved leaf holding row-major data.
    Matrix(MatrixData),
    /// Unresolved operator over its ordered children.
    Operation {
        op: Operator,
        children: Vec<ComputationNode>,
    },
}

impl ComputationNode {
    /// Creates a resolved leaf.
    pub fn matrix(data: MatrixData) -> Self {
        ComputationNode::Matrix(data)
    }

    /// Creates an unresolved operator node.
    pub fn operation(op: Operator, children: Vec<ComputationNode>) -> Self {
        ComputationNode::Operation { op, children }
    }

    /// Tag of this node.
    pub fn node_type(&self) -> ComputationNodeType {
        match self {
            ComputationNode::Matrix(_) => ComputationNodeType::Matrix,
            ComputationNode::Operation { op, .. } => (*op).into(),
        }
    }

    /// Operator of an unresolved node, `None` for a leaf.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            ComputationNode::Matrix(_) => None,
            ComputationNode::Operation { op, .. } => Some(*op),
        }
    }

    /// Ordered children; empty for a leaf.
    pub fn children(&self) -> &[ComputationNode] {
        match self {
            ComputationNode::Matrix(_) => &[],
            ComputationNode::Operation { children, .. } => children,
        }
    }

    /// Row-major data of a leaf, `None` for an unresolved node.
    pub fn get_matrix(&self) -> Option<&MatrixData> {
        match self {
            ComputationNode::Matrix(data) => Some(data),
            ComputationNode::Operation { .. } => None,
        }
    }

    /// Consumes a leaf and returns its data.
    pub fn into_matrix(self) -> Option<MatrixData> {
        match self {
            ComputationNode::Matrix(data) => Some(data),
            ComputationNode::Operation { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ComputationNode::Matrix(_))
    }

    /// Replaces this node with a resolved leaf holding `data`.
    pub fn resolve(&mut self, data: MatrixData) {
        *self = ComputationNode::Matrix(data);
    }

    /// Finds the leftmost, deepest node whose children are all matrix leaves.
    ///
    /// # Returns
    /// `None` when no such node exists, which for a finite tree means the
    /// root is already a leaf.
    pub fn find_resolvable(&mut self) -> Option<&mut ComputationNode> {
        let path = self.resolvable_path()?;
        let mut node = self;
        for index in path {
            node = match node {
                ComputationNode::Operation { children, .. } => children.get_mut(index)?,
                ComputationNode::Matrix(_) => return None,
            };
        }
        Some(node)
    }

    /// Child indices leading from this node to the next resolvable node.
    fn resolvable_path(&self) -> Option<Vec<usize>> {
        let children = match self {
            ComputationNode::Matrix(_) => return None,
            ComputationNode::Operation { children, .. } => children,
        };

        for (index, child) in children.iter().enumerate() {
            if let Some(mut path) = child.resolvable_path() {
                path.insert(0, index);
                return Some(path);
            }
        }

        if children.iter().all(ComputationNode::is_resolved) {
            Some(Vec::new())
        } else {
            None
        }
    }

    /// Rewrites n-ary associative operators into left-nested binary nodes,
    /// so `a + b + c` becomes `(a + b) + c`. Applied to the whole subtree.
    pub fn associative_nesting(&mut self) {
        let ComputationNode::Operation { op, children } = self else {
            return;
        };

        for child in children.iter_mut() {
            child.associative_nesting();
        }

        if !op.is_associative() || children.len() <= 2 {
            return;
        }

        let op = *op;
        let mut operands = std::mem::take(children).into_iter();
        // len > 2, so both exist
        let (Some(first), Some(second)) = (operands.next(), operands.next()) else {
            return;
        };
        let mut nested = ComputationNode::operation(op, vec![first, second]);
        for next in operands {
            nested = ComputationNode::operation(op, vec![nested, next]);
        }
        *self = nested;
    }

    /// Number of unresolved nodes in the subtree.
    pub fn pending_operations(&self) -> usize {
        match self {
            ComputationNode::Matrix(_) => 0,
            ComputationNode::Operation { children, .. } => {
                1 + children.iter().map(ComputationNode::pending_operations).sum::<usize>()
            }
        }
    }
}
