//! # Parameter Store and Template Expansion
//!
//! Templates reference parameters as `${name}`. A reference to `${=name}`
//! generates a fresh random non-negative integer, binds it to `name` and
//! substitutes it, so that a later `${name}` (for example in a response
//! capture pattern) sees the same value.
//!
//! Expansion never rescans its own output: a value containing `${...}` is
//! inserted literally, which keeps expansion idempotent once every variable
//! is bound.
//!
//! Unresolved references are left in place, so a template may be expanded at
//! profile start with only the sequence variables known and again per
//! request once the rest are.

use crate::error::{FloodError, Result};
use crate::utils;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// How `${...}` references are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandMode {
    /// Look names up; `${=name}` is left literal.
    Expand,
    /// Look names up, generate `${=name}` values and draw substitution-file
    /// variables. Used when building each request.
    ExpandSet,
    /// Look names up and leave everything else for later. Used at profile
    /// start while sequences are being expanded.
    PassThrough,
}

/// Variables bound during a profile run.
#[derive(Debug)]
pub struct ParamStore {
    values: HashMap<String, String>,
    substitutions: HashMap<String, Vec<String>>,
    rng: StdRng,
}

impl ParamStore {
    pub fn new(rng: StdRng) -> Self {
        Self {
            values: HashMap::new(),
            substitutions: HashMap::new(),
            rng,
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Random source shared with delay jitter.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Make `variable` draw from `lines` whenever a request is built.
    pub fn add_substitution(&mut self, variable: impl Into<String>, lines: Vec<String>) {
        self.substitutions.insert(variable.into(), lines);
    }

    /// Load a substitution file: one value per non-empty line, with escapes
    /// resolved by [`utils::unescape`].
    pub fn load_substitution_file(&mut self, variable: &str, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path).map_err(|e| {
            FloodError::Config(format!(
                "cannot read substitution file '{}' for '{}': {}",
                path.display(),
                variable,
                e
            ))
        })?;

        let lines: Vec<String> = content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(utils::unescape)
            .collect();

        if lines.is_empty() {
            return Err(FloodError::Config(format!(
                "substitution file '{}' for '{}' has no entries",
                path.display(),
                variable
            )));
        }

        debug!(
            "Loaded {} substitution values for '{}' from {}",
            lines.len(),
            variable,
            path.display()
        );
        let count = lines.len();
        self.add_substitution(variable, lines);
        Ok(count)
    }

    /// Expand every `${...}` reference in `template`.
    pub fn expand(&mut self, template: &str, mode: ExpandMode) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                break;
            };

            if end == 0 {
                // `${}` is not a reference
                out.push_str(&rest[..start + 3]);
                rest = &after[1..];
                continue;
            }

            let name = &after[..end];
            out.push_str(&rest[..start]);
            match self.resolve(name, mode) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }

    fn resolve(&mut self, name: &str, mode: ExpandMode) -> Option<String> {
        if let Some(variable) = name.strip_prefix('=') {
            if mode != ExpandMode::ExpandSet {
                return None;
            }
            let value = self.rng.gen_range(0..=i32::MAX).to_string();
            self.values.insert(variable.to_string(), value.clone());
            return Some(value);
        }

        if mode == ExpandMode::ExpandSet {
            if let Some(lines) = self.substitutions.get(name).filter(|l| !l.is_empty()) {
                let pick = lines[self.rng.gen_range(0..lines.len())].clone();
                self.values.insert(name.to_string(), pick.clone());
                return Some(pick);
            }
        }

        self.values.get(name).cloned()
    }
}
