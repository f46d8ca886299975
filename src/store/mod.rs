//! Named SQL fragments composed into larger queries as CTEs.
//!
//! ```rust
//! use sql_session::store::{FragmentStore, IdentifierQuoting};
//!
//! let mut store = FragmentStore::new();
//! store.store("a", "SELECT * FROM t", &[]).unwrap();
//! store.store("b", "SELECT * FROM a", &["a"]).unwrap();
//! let sql = store.render("SELECT * FROM b", &["b"], IdentifierQuoting::Plain).unwrap();
//! assert_eq!(
//!     sql,
//!     "WITH a AS (SELECT * FROM t), b AS (SELECT * FROM a)SELECT * FROM b"
//! );
//! ```

mod graph;

use indexmap::IndexMap;

use crate::error::SqlSessionError;
use crate::sql_text::{referenced_tables, strip_trailing_semicolons};
use crate::suggest::suggest;

use graph::{Missing, closure, dependents_of};

/// A stored, named SQL snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub key: String,
    pub text: String,
    /// Keys this fragment reads from, de-duplicated, in the order they were given or found.
    pub depends_on: Vec<String>,
}

/// How CTE names are written when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierQuoting {
    #[default]
    Plain,
    Backtick,
}

impl IdentifierQuoting {
    fn quote(self, name: &str) -> String {
        match self {
            IdentifierQuoting::Plain => name.to_string(),
            IdentifierQuoting::Backtick => format!("`{name}`"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Refuse when another fragment depends on the key.
    #[default]
    Strict,
    /// Delete only the key; dependents keep their now-dangling reference.
    Force,
    /// Delete the key and every fragment that transitively depends on it.
    ForceAll,
}

/// Session-wide store of named fragments and their dependency graph.
#[derive(Debug, Clone, Default)]
pub struct FragmentStore {
    fragments: IndexMap<String, Fragment>,
}

impl FragmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `text` under `key`, replacing any previous fragment with that key.
    ///
    /// When `explicit_deps` is empty the dependencies are inferred from the table names
    /// `text` reads from, matched against stored keys. Text that cannot be tokenized simply
    /// has no inferred dependencies.
    ///
    /// # Errors
    /// - `Usage` when `key` contains a hyphen, appears in `explicit_deps`, or an explicit
    ///   dependency already depends on `key`.
    /// - `KeyNotFound` when an explicit dependency is not stored.
    pub fn store(
        &mut self,
        key: &str,
        text: &str,
        explicit_deps: &[&str],
    ) -> Result<(), SqlSessionError> {
        if key.contains('-') {
            return Err(SqlSessionError::usage(format!(
                "Using hyphens (-) in fragment keys isn't allowed ({key:?}). \
                 Please use underscores (_) instead"
            )));
        }
        if explicit_deps.contains(&key) {
            return Err(SqlSessionError::usage(format!(
                "Fragment key ({key:?}) cannot appear in its own dependencies"
            )));
        }

        let depends_on = if explicit_deps.is_empty() {
            self.infer_dependencies(key, text)
        } else {
            let mut deps: Vec<String> = Vec::with_capacity(explicit_deps.len());
            for dep in explicit_deps {
                self.get(dep)?;
                if self.depends_on(dep, key) {
                    return Err(SqlSessionError::usage(format!(
                        "Fragment {key:?} cannot depend on {dep:?}: {dep:?} already depends on {key:?}"
                    )));
                }
                if !deps.iter().any(|d| d == dep) {
                    deps.push((*dep).to_string());
                }
            }
            deps
        };

        tracing::debug!(key, ?depends_on, "storing fragment");
        self.fragments.insert(
            key.to_string(),
            Fragment {
                key: key.to_string(),
                text: text.to_string(),
                depends_on,
            },
        );
        Ok(())
    }

    fn infer_dependencies(&self, key: &str, text: &str) -> Vec<String> {
        let Ok(tables) = referenced_tables(text) else {
            tracing::debug!(key, "could not parse fragment text; no inferred dependencies");
            return Vec::new();
        };
        tables
            .into_iter()
            .filter(|table| table != key)
            .filter(|table| self.fragments.contains_key(table))
            .filter(|table| !self.depends_on(table, key))
            .collect()
    }

    /// Whether `key`'s closure contains `target`.
    fn depends_on(&self, key: &str, target: &str) -> bool {
        closure(&self.fragments, [key], Missing::Skip)
            .is_ok_and(|deps| deps.iter().any(|d| d == target))
    }

    /// Render `query` prefixed with a `WITH` clause holding the closure of `with_keys`.
    ///
    /// Each fragment appears after all of its dependencies. With no keys the query comes
    /// back verbatim.
    ///
    /// # Errors
    /// Returns `KeyNotFound` when a key, or a dependency of one, is not stored.
    pub fn render(
        &self,
        query: &str,
        with_keys: &[&str],
        quoting: IdentifierQuoting,
    ) -> Result<String, SqlSessionError> {
        let ordered = closure(&self.fragments, with_keys.iter().copied(), Missing::Fail)
            .map_err(|missing| self.not_found(&missing))?;
        if ordered.is_empty() {
            return Ok(query.to_string());
        }

        let ctes: Vec<String> = ordered
            .iter()
            .filter_map(|key| self.fragments.get(key))
            .map(|fragment| {
                format!(
                    "{} AS ({})",
                    quoting.quote(&fragment.key),
                    strip_trailing_semicolons(&fragment.text)
                )
            })
            .collect();
        Ok(format!("WITH {}{query}", ctes.join(", ")))
    }

    /// Render `query` with the stored fragments it reads from, found the same way
    /// dependencies are inferred.
    ///
    /// # Errors
    /// Returns `KeyNotFound` when a dependency of a referenced fragment was deleted.
    pub fn render_with_inferred(
        &self,
        query: &str,
        quoting: IdentifierQuoting,
    ) -> Result<String, SqlSessionError> {
        let keys: Vec<String> = referenced_tables(query)
            .unwrap_or_default()
            .into_iter()
            .filter(|table| self.fragments.contains_key(table))
            .collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.render(query, &refs, quoting)
    }

    /// Delete `key` and return the remaining keys in store order.
    ///
    /// # Errors
    /// - `KeyNotFound` when `key` is not stored.
    /// - `Usage` naming the dependents when `mode` is `Strict` and any exist.
    pub fn delete(&mut self, key: &str, mode: DeleteMode) -> Result<Vec<String>, SqlSessionError> {
        self.get(key)?;
        let dependents = self.dependents(key);

        match mode {
            DeleteMode::Strict if !dependents.is_empty() => {
                return Err(SqlSessionError::usage(format!(
                    "The following fragments depend on {key:?}: {}. \
                     Delete them first, or delete with force",
                    dependents.join(", ")
                )));
            }
            DeleteMode::Strict | DeleteMode::Force => {
                self.fragments.shift_remove(key);
            }
            DeleteMode::ForceAll => {
                self.fragments.shift_remove(key);
                for dependent in &dependents {
                    self.fragments.shift_remove(dependent);
                }
            }
        }
        tracing::debug!(key, ?mode, ?dependents, "deleted fragment");
        Ok(self.keys())
    }

    /// Keys whose dependency closure contains `key`.
    #[must_use]
    pub fn dependents(&self, key: &str) -> Vec<String> {
        dependents_of(&self.fragments, key)
    }

    /// Transitive dependencies of `key`, dependencies first, without `key` itself.
    ///
    /// # Errors
    /// Returns `KeyNotFound` when `key` or one of its dependencies is not stored.
    pub fn dependencies(&self, key: &str) -> Result<Vec<String>, SqlSessionError> {
        let mut ordered = closure(&self.fragments, [key], Missing::Fail)
            .map_err(|missing| self.not_found(&missing))?;
        ordered.pop();
        Ok(ordered)
    }

    /// # Errors
    /// Returns `KeyNotFound` with the closest stored keys.
    pub fn get(&self, key: &str) -> Result<&Fragment, SqlSessionError> {
        self.fragments.get(key).ok_or_else(|| self.not_found(key))
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.fragments.contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.fragments.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn not_found(&self, key: &str) -> SqlSessionError {
        SqlSessionError::KeyNotFound {
            key: key.to_string(),
            suggestions: suggest(key, self.fragments.keys().map(String::as_str)),
        }
    }

    /// Stored keys closest to `word`, for error messages outside the store.
    #[must_use]
    pub fn suggest_keys(&self, word: &str) -> Vec<String> {
        suggest(word, self.fragments.keys().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inferred_dependencies_follow_from_and_join() {
        let mut store = FragmentStore::new();
        store.store("people", "SELECT * FROM raw_people", &[]).unwrap();
        store
            .store("adults", "SELECT p.* FROM people p JOIN ages USING (id)", &[])
            .unwrap();
        assert_eq!(store.get("adults").unwrap().depends_on, vec!["people"]);
    }

    #[test]
    fn unparseable_text_has_no_dependencies() {
        let mut store = FragmentStore::new();
        store.store("a", "SELECT 1", &[]).unwrap();
        store.store("b", "SELECT * FROM a WHERE x = 'open", &[]).unwrap();
        assert!(store.get("b").unwrap().depends_on.is_empty());
    }

    #[test]
    fn invalid_keys_are_usage_errors() {
        let mut store = FragmentStore::new();
        assert!(matches!(
            store.store("my-key", "SELECT 1", &[]),
            Err(SqlSessionError::Usage { .. })
        ));
        assert!(matches!(
            store.store("a", "SELECT 1", &["a"]),
            Err(SqlSessionError::Usage { .. })
        ));
        assert!(matches!(
            store.store("b", "SELECT 1", &["nope"]),
            Err(SqlSessionError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn restore_cannot_close_a_cycle() {
        let mut store = FragmentStore::new();
        store.store("a", "SELECT * FROM t", &[]).unwrap();
        store.store("b", "SELECT * FROM a", &[]).unwrap();
        assert!(store.store("a", "SELECT * FROM b", &["b"]).is_err());
        // inference silently drops the back edge
        store.store("a", "SELECT * FROM b", &[]).unwrap();
        assert!(store.get("a").unwrap().depends_on.is_empty());
    }

    #[test]
    fn bodies_lose_trailing_semicolons_and_names_can_be_backticked() {
        let mut store = FragmentStore::new();
        store.store("a", "SELECT * FROM t;  \n", &[]).unwrap();
        let sql = store
            .render("SELECT * FROM a", &["a"], IdentifierQuoting::Backtick)
            .unwrap();
        assert_eq!(sql, "WITH `a` AS (SELECT * FROM t)SELECT * FROM a");
    }

    #[test]
    fn missing_keys_suggest_close_matches() {
        let mut store = FragmentStore::new();
        store.store("orders", "SELECT 1", &[]).unwrap();
        match store.render("SELECT 1", &["ordrs"], IdentifierQuoting::Plain) {
            Err(SqlSessionError::KeyNotFound { key, suggestions }) => {
                assert_eq!(key, "ordrs");
                assert_eq!(suggestions, vec!["orders"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn inferred_render_picks_up_referenced_fragments() {
        let mut store = FragmentStore::new();
        store.store("a", "SELECT * FROM t", &[]).unwrap();
        store.store("b", "SELECT * FROM a", &[]).unwrap();
        assert_eq!(
            store
                .render_with_inferred("SELECT * FROM b", IdentifierQuoting::Plain)
                .unwrap(),
            "WITH a AS (SELECT * FROM t), b AS (SELECT * FROM a)SELECT * FROM b"
        );
        assert_eq!(store.dependencies("b").unwrap(), vec!["a"]);
    }
}
