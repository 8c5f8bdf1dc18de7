//! Flattening of `<sequence>` blocks.
//!
//! A sequence binds one variable to each value of its comma-separated list in
//! turn and repeats its nested `<url>` and `<sequence>` children for every
//! value. Expansion is count-then-fill: the number of flat entries is worked
//! out first, then exactly that many are produced in document order (list
//! major, nested entry minor).

use crate::config::{schema, ConfigNode};
use crate::error::{FloodError, Result};
use crate::utils;

/// One flattened `<url>` with the sequence bindings in force for it,
/// outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedUrl<'a> {
    pub node: &'a ConfigNode,
    pub bindings: Vec<(String, String)>,
}

/// Number of flat entries `list` expands to.
pub fn count_entries(list: &ConfigNode) -> Result<usize> {
    let mut total = 0;
    for child in list.children() {
        if child.is(schema::URLLIST_URL) {
            total += 1;
        } else if child.is(schema::URLLIST_SEQUENCE) {
            let (_, values) = sequence_header(child)?;
            total += values.len() * count_entries(child)?;
        }
    }
    Ok(total)
}

/// Flatten the `<url>`s and `<sequence>`s under `list`.
pub fn expand(list: &ConfigNode) -> Result<Vec<ExpandedUrl<'_>>> {
    let count = count_entries(list)?;
    let mut out = Vec::with_capacity(count);
    fill(list, &mut Vec::new(), &mut out)?;
    debug_assert_eq!(out.len(), count);
    Ok(out)
}

fn fill<'a>(
    list: &'a ConfigNode,
    bindings: &mut Vec<(String, String)>,
    out: &mut Vec<ExpandedUrl<'a>>,
) -> Result<()> {
    for child in list.children() {
        if child.is(schema::URLLIST_URL) {
            out.push(ExpandedUrl {
                node: child,
                bindings: bindings.clone(),
            });
        } else if child.is(schema::URLLIST_SEQUENCE) {
            let (name, values) = sequence_header(child)?;
            for value in values {
                bindings.push((name.to_string(), value));
                fill(child, bindings, out)?;
                bindings.pop();
            }
        }
    }
    Ok(())
}

fn sequence_header(node: &ConfigNode) -> Result<(&str, Vec<String>)> {
    let name = node
        .attribute(schema::URLLIST_SEQUENCE_NAME)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            FloodError::Config(format!(
                "<{}> needs a '{}' attribute",
                schema::URLLIST_SEQUENCE,
                schema::URLLIST_SEQUENCE_NAME
            ))
        })?;

    let values = node
        .attribute(schema::URLLIST_SEQUENCE_LIST)
        .map(utils::split_list)
        .unwrap_or_default();
    if values.is_empty() {
        return Err(FloodError::Config(format!(
            "sequence '{}' doesn't have any items",
            name
        )));
    }
    Ok((name, values))
}
