//! Display translation map
//!
//! Maps display tokens (names callers use) to the literal names stored in the
//! tree, and back. Substitution is per path segment, so it is order
//! independent. Entries are validated on insertion so that the mapping stays a
//! bijection and applying it twice changes nothing: a stored name may not
//! also be the display token of another entry, and vice versa.

use crate::error::TreeError;
use crate::tree::validate_name;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationMap {
    to_stored: HashMap<String, String>,
    to_display: HashMap<String, String>,
}

impl TranslationMap {
    /// Identity map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(display, stored)` pairs
    pub fn from_pairs<I, D, S>(pairs: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = (D, S)>,
        D: Into<String>,
        S: Into<String>,
    {
        let mut map = Self::new();
        for (display, stored) in pairs {
            map.insert(display, stored)?;
        }
        Ok(map)
    }

    pub fn insert(
        &mut self,
        display: impl Into<String>,
        stored: impl Into<String>,
    ) -> Result<(), TreeError> {
        let display = display.into();
        let stored = stored.into();
        validate_name(&display)?;
        validate_name(&stored)?;

        if let Some(existing) = self.to_stored.get(&display) {
            if *existing == stored {
                return Ok(());
            }
            return Err(TreeError::InvalidTranslation(format!(
                "'{}' already maps to '{}'",
                display, existing
            )));
        }
        if let Some(existing) = self.to_display.get(&stored) {
            return Err(TreeError::InvalidTranslation(format!(
                "'{}' is already the stored name of '{}'",
                stored, existing
            )));
        }
        if display != stored {
            if self.to_display.contains_key(&display) {
                return Err(TreeError::InvalidTranslation(format!(
                    "'{}' is a stored name of another entry",
                    display
                )));
            }
            if self.to_stored.contains_key(&stored) {
                return Err(TreeError::InvalidTranslation(format!(
                    "'{}' is a display token of another entry",
                    stored
                )));
            }
        }

        self.to_display.insert(stored.clone(), display.clone());
        self.to_stored.insert(display, stored);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.to_stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_stored.is_empty()
    }

    /// Stored name for a display name; unmapped names pass through
    pub fn to_stored<'s>(&'s self, display: &'s str) -> &'s str {
        self.to_stored.get(display).map_or(display, String::as_str)
    }

    /// Display name for a stored name; unmapped names pass through
    pub fn to_display<'s>(&'s self, stored: &'s str) -> &'s str {
        self.to_display.get(stored).map_or(stored, String::as_str)
    }

    /// Like [`to_stored`](Self::to_stored), but rejects a display name that
    /// is the stored target of another token, since accepting it would make
    /// two display names reach the same stored node.
    pub fn to_stored_checked<'s>(&'s self, display: &'s str) -> Result<&'s str, TreeError> {
        match self.to_display.get(display) {
            Some(token) if token != display => Err(TreeError::InvalidTranslation(format!(
                "'{}' is reserved; use '{}'",
                display, token
            ))),
            _ => Ok(self.to_stored(display)),
        }
    }

    /// Translate every segment of a display path into a stored path
    pub fn stored_path(&self, path: &str) -> Result<String, TreeError> {
        self.map_path(path, |segment| self.to_stored_checked(segment))
    }

    /// Translate every segment of a stored path into a display path
    pub fn display_path(&self, path: &str) -> String {
        self.map_path(path, |segment| Ok(self.to_display(segment)))
            .unwrap_or_else(|_| path.to_string())
    }

    fn map_path<'s, F>(&'s self, path: &'s str, mut f: F) -> Result<String, TreeError>
    where
        F: FnMut(&'s str) -> Result<&'s str, TreeError>,
    {
        if !path.starts_with('/') {
            return Err(TreeError::InvalidName(format!(
                "path must be absolute: '{}'",
                path
            )));
        }
        let mut out = String::with_capacity(path.len());
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            out.push('/');
            out.push_str(f(segment)?);
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}
