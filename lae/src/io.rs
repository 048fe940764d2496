//! JSON documents for expression trees and computation outcomes.
//!
//! A node is either a matrix, written as an array of rows, or an operation:
//!
//! ```json
//! {"operator": "+", "operands": [[[1, 2]], {"operator": "-", "operands": [[[3, 4]]]}]}
//! ```
//!
//! Operators are `+` (add), `*` (multiply), `-` (negate) and `T` (transpose).
//! An outcome is written as `{"result": [[...]]}` or `{"error": "..."}`. A
//! result with NaN or infinite entries is written as an error.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use lae_api::errors::{ComputeError, ComputeResult, EngineError, EngineResult};
use lae_api::{ComputationNode, MatrixData, Operator};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeDocument {
    Matrix(MatrixData),
    Operation {
        operator: String,
        operands: Vec<NodeDocument>,
    },
}

impl NodeDocument {
    fn into_node(self) -> ComputeResult<ComputationNode> {
        match self {
            NodeDocument::Matrix(data) => Ok(ComputationNode::matrix(data)),
            NodeDocument::Operation { operator, operands } => {
                let op: Operator = operator.parse()?;
                let children = operands
                    .into_iter()
                    .map(NodeDocument::into_node)
                    .collect::<ComputeResult<Vec<_>>>()?;
                Ok(ComputationNode::operation(op, children))
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Outcome<'a> {
    Result(&'a MatrixData),
    Error(String),
}

/// Parses an expression tree from JSON text.
///
/// # Errors
/// `InvalidInput` if the text is not a valid tree, names an unknown
/// operator, or the root is `null`.
pub fn parse_tree(text: &str) -> ComputeResult<ComputationNode> {
    let root: Option<NodeDocument> = serde_json::from_str(text)
        .map_err(|e| ComputeError::InvalidInput(format!("malformed expression tree: {}", e)))?;
    let root = root.ok_or_else(|| ComputeError::InvalidInput("expression tree root is missing".to_string()))?;
    root.into_node()
}

/// Reads and parses the expression tree stored at `path`.
pub fn read_tree(path: &Path) -> EngineResult<ComputationNode> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read input file {}", path.display()))?;
    Ok(parse_tree(&text)?)
}

/// Renders the outcome of a run as a JSON document.
///
/// JSON has no NaN or infinity, so a result holding one is reported as an
/// error rather than written with `null` entries.
pub fn render_outcome(outcome: &EngineResult<ComputationNode>) -> String {
    let document = match outcome {
        Ok(node) => match node.get_matrix() {
            Some(data) if data.iter().flatten().all(|x| x.is_finite()) => Outcome::Result(data),
            Some(_) => Outcome::Error("result contains non-finite values".to_string()),
            None => Outcome::Error("computation did not produce a matrix".to_string()),
        },
        Err(e) => Outcome::Error(e.to_string()),
    };
    serde_json::to_string_pretty(&document).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Writes the outcome of a run to `path`, replacing any previous content.
pub fn write_outcome(path: &Path, outcome: &EngineResult<ComputationNode>) -> anyhow::Result<()> {
    fs::write(path, render_outcome(outcome))
        .with_context(|| format!("failed to write output file {}", path.display()))
}

/// Convenience for errors raised before the engine runs.
pub fn error_outcome(error: impl Into<EngineError>) -> EngineResult<ComputationNode> {
    Err(error.into())
}
