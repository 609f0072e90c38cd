//! Boolean conditions over a context, used to toggle template steps.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;

use crate::context::Context;
use crate::placeholder::PlaceholderPipeline;

/// A condition evaluated against the placeholder engine.
///
/// In configuration a filter is either a placeholder name, or a map with a
/// single `not`, `any` or `and` key holding one filter or a list of them:
///
/// ```json
/// { "and": ["permission:chat.color", { "not": "argument:flex:muted" }] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "FilterSpec")]
pub enum FilterNode {
    /// Accepts when `%name%` resolves to something non-empty.
    Raw(String),
    Any(Vec<FilterNode>),
    And(Vec<FilterNode>),
    /// Accepts when none of the children accept.
    Not(Vec<FilterNode>),
    #[default]
    None,
}

impl FilterNode {
    pub fn raw(placeholder: impl Into<String>) -> Self {
        FilterNode::Raw(placeholder.into())
    }

    /// Evaluate the filter. Children are evaluated in order and evaluation
    /// stops as soon as the outcome is known.
    pub fn accepts<'a>(
        &'a self,
        engine: &'a PlaceholderPipeline,
        ctx: &'a Context,
    ) -> BoxFuture<'a, bool> {
        async move {
            match self {
                FilterNode::Raw(placeholder) => {
                    let literal = format!("%{}%", placeholder);
                    let resolved = engine.interpolate(&ctx.nested(), &literal).await;
                    !resolved.is_empty() && resolved != literal
                }
                FilterNode::Any(children) => {
                    for child in children {
                        if child.accepts(engine, ctx).await {
                            return true;
                        }
                    }
                    false
                }
                FilterNode::And(children) => {
                    for child in children {
                        if !child.accepts(engine, ctx).await {
                            return false;
                        }
                    }
                    true
                }
                FilterNode::Not(children) => {
                    for child in children {
                        if child.accepts(engine, ctx).await {
                            return false;
                        }
                    }
                    true
                }
                FilterNode::None => true,
            }
        }
        .boxed()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FilterSpec {
    Placeholder(String),
    Operator(HashMap<String, Operands>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Operands {
    Many(Vec<FilterNode>),
    One(Box<FilterNode>),
}

impl From<Operands> for Vec<FilterNode> {
    fn from(operands: Operands) -> Self {
        match operands {
            Operands::Many(filters) => filters,
            Operands::One(filter) => vec![*filter],
        }
    }
}

impl TryFrom<FilterSpec> for FilterNode {
    type Error = String;

    fn try_from(spec: FilterSpec) -> Result<Self, Self::Error> {
        match spec {
            FilterSpec::Placeholder(placeholder) => Ok(FilterNode::Raw(placeholder)),
            FilterSpec::Operator(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "Expected a single key in filter map, found {}",
                        map.len()
                    ));
                }
                let Some((operator, operands)) = map.into_iter().next() else {
                    return Err("Empty filter map".to_string());
                };
                let children = Vec::from(operands);
                match operator.as_str() {
                    "not" => Ok(FilterNode::Not(children)),
                    "any" => Ok(FilterNode::Any(children)),
                    "and" => Ok(FilterNode::And(children)),
                    other => Err(format!("Unknown filter operator {}", other)),
                }
            }
        }
    }
}
