//! Palette filters: named color substitution tables
//!
//! A filter maps palette indices to other palette indices. Filters are
//! declared in `prendr.toml` under `[filters.<name>]` and referenced by
//! name from `filter` commands in a sprite library.

use std::collections::HashMap;

use crate::error::RenderError;
use crate::palette::{encode_index, parse_group};

/// A named palette substitution table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filter {
    pub name: String,
    substitutions: HashMap<usize, usize>,
}

impl Filter {
    pub fn new(name: impl Into<String>, substitutions: HashMap<usize, usize>) -> Self {
        Self { name: name.into(), substitutions }
    }

    /// The replacement for `index`, if this filter changes it.
    pub fn substitute(&self, index: usize) -> Option<usize> {
        self.substitutions.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.substitutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substitutions.is_empty()
    }

    /// Apply the filter to a digit stream of `width`-wide groups over a
    /// palette of `palette_len` colors.
    ///
    /// Groups without a substitution are copied through unchanged. A
    /// replacement outside the palette fails with `PaletteIndexOutOfRange`.
    pub fn apply(&self, digits: &str, width: usize, palette_len: usize) -> Result<String, RenderError> {
        let mut output = String::with_capacity(digits.len());
        let mut offset = 0;
        while offset + width <= digits.len() {
            let group = &digits[offset..offset + width];
            match self.substitute(parse_group(group, offset)?) {
                Some(replacement) if replacement >= palette_len => {
                    return Err(RenderError::PaletteIndexOutOfRange { index: replacement, len: palette_len });
                }
                Some(replacement) => output.push_str(&encode_index(replacement, width)),
                None => output.push_str(group),
            }
            offset += width;
        }
        Ok(output)
    }
}

/// Registry of filters by name.
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Filter>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self { filters: HashMap::new() }
    }

    /// Register a filter. A filter with the same name is replaced.
    pub fn register(&mut self, filter: Filter) {
        self.filters.insert(filter.name.clone(), filter);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Get a filter by name, failing with `UnknownFilter`.
    pub fn get(&self, name: &str) -> Result<&Filter, RenderError> {
        self.filters.get(name).ok_or_else(|| RenderError::UnknownFilter(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
