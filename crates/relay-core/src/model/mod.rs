//! Decision-tree scoring models.
//!
//! A [`TreeModel`] is parsed from a PMML `TreeModel` document and scored by
//! walking from the root node into the first child whose predicate holds,
//! until a leaf is reached or no child matches. The reached node's `score`
//! is the result.
//!
//! ```text
//! <Node id="root">            <- root, predicate must hold
//!     <True/>
//!     <Node id="low" score="1">   <- first matching child wins
//!         <SimplePredicate field="f1" operator="lessThan" value="2"/>
//!     </Node>
//!     <Node id="high" score="2">
//!         <True/>
//!     </Node>
//! </Node>
//! ```

mod pmml;
mod predicate;

use thiserror::Error;

use crate::value::Features;

pub use pmml::PmmlParser;
pub use predicate::{BooleanOperator, Predicate, SetOperator, SimpleOperator};

/// Errors from parsing or scoring a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The document is not a valid tree model.
    #[error("invalid model document: {0}")]
    Invalid(String),

    /// A predicate referenced a feature that was not supplied.
    #[error("missing feature '{0}'")]
    MissingFeature(String),

    /// A numeric comparison met a value that is not a number.
    #[error("feature '{field}' compared numerically with non-numeric value '{value}'")]
    NotNumeric { field: String, value: String },

    /// Traversal stopped at a node that carries no usable score.
    #[error("node {0} has no numeric score")]
    NoScore(String),

    /// The root predicate does not hold for the given features.
    #[error("root predicate does not match, no prediction")]
    NoPrediction,
}

/// Turns fetched bytes into a model.
pub trait ModelParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<TreeModel, ModelError>;
}

/// A node of a decision tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: Option<String>,
    pub score: Option<String>,
    pub predicate: Predicate,
    pub children: Vec<Node>,
}

impl Node {
    fn label(&self) -> String {
        self.id.clone().unwrap_or_else(|| "<unnamed>".to_string())
    }
}

/// A parsed decision tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeModel {
    root: Node,
}

impl TreeModel {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Score `features` against the tree.
    pub fn score(&self, features: &Features) -> Result<f64, ModelError> {
        if !self.root.predicate.evaluate(features)? {
            return Err(ModelError::NoPrediction);
        }

        let mut current = &self.root;
        'descend: loop {
            for child in &current.children {
                if child.predicate.evaluate(features)? {
                    current = child;
                    continue 'descend;
                }
            }
            break;
        }

        current
            .score
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| ModelError::NoScore(current.label()))
    }
}
