//! Options accepted by record and collection operations.

use crate::Attributes;
use serde::{Deserialize, Serialize};

/// Why a mutation happened.
///
/// The pager tags the mutations it performs on its own collections so the
/// reciprocal notifications can be told apart from user mutations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Cause {
    /// A caller asked for it.
    #[default]
    Direct,
    /// The page window moved from one page to another.
    Navigation { from: usize, to: usize },
    /// A record was pushed out of a full page.
    Eviction,
    /// A record was pulled in to fill a page after a removal.
    Refill,
}

/// Options of [`Record::set`](crate::Record::set) and
/// [`Collection::set`](crate::Collection::set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetOptions {
    /// Insert entries that are not in the collection yet
    pub add: bool,
    /// Remove records that are not among the entries
    pub remove: bool,
    /// Merge attributes of entries that are already present
    pub merge: bool,
    /// Re-sort after insertion when a comparator is set
    pub sort: bool,
    /// Suppress notifications
    pub silent: bool,
    /// Run the parse hooks on raw input
    pub parse: bool,
    /// Validate before applying
    pub validate: bool,
    /// Delete the given attributes instead of assigning them
    pub unset: bool,
    /// Insertion position; negative values count from the end
    pub at: Option<isize>,
    pub cause: Cause,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            add: true,
            remove: true,
            merge: true,
            sort: true,
            silent: false,
            parse: false,
            validate: false,
            unset: false,
            at: None,
            cause: Cause::Direct,
        }
    }
}

impl SetOptions {
    /// Defaults for a plain `add`: nothing merged, nothing removed.
    pub fn add() -> Self {
        Self {
            merge: false,
            remove: false,
            ..Self::default()
        }
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn parse(mut self, parse: bool) -> Self {
        self.parse = parse;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    pub fn remove(mut self, remove: bool) -> Self {
        self.remove = remove;
        self
    }

    pub fn with_add(mut self, add: bool) -> Self {
        self.add = add;
        self
    }

    pub fn sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn unset(mut self, unset: bool) -> Self {
        self.unset = unset;
        self
    }

    pub fn at(mut self, at: isize) -> Self {
        self.at = Some(at);
        self
    }

    pub fn cause(mut self, cause: Cause) -> Self {
        self.cause = cause;
        self
    }
}

/// Options of [`Record::save`](crate::Record::save) and
/// [`Collection::create`](crate::Collection::create).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveOptions {
    /// Apply the attributes only once the server accepted them
    pub wait: bool,
    /// Send only the given attributes
    pub patch: bool,
    pub validate: bool,
    pub parse: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            wait: false,
            patch: false,
            validate: true,
            parse: true,
        }
    }
}

impl SaveOptions {
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    pub fn patch(mut self, patch: bool) -> Self {
        self.patch = patch;
        self
    }

    pub(crate) fn set_options(&self) -> SetOptions {
        SetOptions::default()
            .validate(self.validate)
            .parse(self.parse)
    }
}

/// Options of [`Record::destroy`](crate::Record::destroy).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DestroyOptions {
    /// Notify only once the server confirmed the deletion
    pub wait: bool,
}

/// Options of [`Collection::fetch`](crate::Collection::fetch).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// How the response is reconciled
    pub set: SetOptions,
    /// Replace the contents instead of reconciling
    pub reset: bool,
    /// Fetch from this url instead of the collection's
    pub url: Option<String>,
    /// Extra query values; these win over every other query source
    pub query: Attributes,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            set: SetOptions::default().parse(true),
            reset: false,
            url: None,
            query: Attributes::new(),
        }
    }
}

impl FetchOptions {
    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.set.silent = silent;
        self
    }
}
