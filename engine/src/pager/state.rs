//! Pagination state and its invariant.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Where pages come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every page is fetched from the server.
    #[default]
    Server,
    /// Everything is fetched once and paged locally.
    Client,
    /// Pages are fetched by link and accumulated locally.
    Infinite,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Server => write!(f, "server"),
            Mode::Client => write!(f, "client"),
            Mode::Infinite => write!(f, "infinite"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "server" => Ok(Mode::Server),
            "client" => Ok(Mode::Client),
            "infinite" => Ok(Mode::Infinite),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Ascending,
    Descending,
    /// No client side sorting; no order is sent to the server.
    None,
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ascending" => Ok(Order::Ascending),
            "descending" => Ok(Order::Descending),
            "none" => Ok(Order::None),
            other => Err(Error::InvalidOrder(other.to_string())),
        }
    }
}

/// A navigation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    First,
    Previous,
    Next,
    Last,
    Number(usize),
}

impl From<usize> for Page {
    fn from(page: usize) -> Self {
        Page::Number(page)
    }
}

impl FromStr for Page {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first" => Ok(Page::First),
            "prev" | "previous" => Ok(Page::Previous),
            "next" => Ok(Page::Next),
            "last" => Ok(Page::Last),
            other => other
                .parse()
                .map(Page::Number)
                .map_err(|_| Error::NotFiniteInteger("index".to_string())),
        }
    }
}

/// Pagination state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagerState {
    /// 0 or 1
    pub first_page: usize,
    pub current_page: usize,
    pub page_size: usize,
    /// Unknown until counted locally or reported by the server
    pub total_records: Option<usize>,
    pub total_pages: Option<usize>,
    pub last_page: Option<usize>,
    pub sort_key: Option<String>,
    pub order: Order,
}

impl Default for PagerState {
    fn default() -> Self {
        Self {
            first_page: 1,
            current_page: 1,
            page_size: 25,
            total_records: None,
            total_pages: None,
            last_page: None,
            sort_key: None,
            order: Order::Ascending,
        }
    }
}

impl PagerState {
    /// Check the invariant and fill in the derived fields.
    ///
    /// Once the total is known, `total_pages` and `last_page` are recomputed
    /// and the current page must lie within `first_page..=last_page` (or, in
    /// infinite mode, have a link). Before that only the page size, the first
    /// page and `current_page >= first_page` are checked.
    pub fn validated(
        mut self,
        mode: Mode,
        links: &BTreeMap<usize, String>,
    ) -> Result<PagerState> {
        if self.page_size < 1 {
            return Err(Error::InvalidPageSize);
        }
        if self.first_page > 1 {
            return Err(Error::InvalidFirstPage(self.first_page));
        }
        let out_of_range = Error::PageOutOfRange {
            page: self.current_page,
            first_page: self.first_page,
            bound: if self.first_page == 0 { "<" } else { "<=" },
        };
        if self.current_page < self.first_page || self.checked_page_end().is_none() {
            return Err(out_of_range);
        }

        let Some(total_records) = self.total_records else {
            return Ok(self);
        };

        let total_pages = total_records.div_ceil(self.page_size);
        self.total_pages = Some(total_pages);
        self.last_page = Some(if self.first_page == 0 {
            total_pages.saturating_sub(1)
        } else {
            total_pages.max(self.first_page)
        });

        if mode == Mode::Infinite {
            if !links.contains_key(&self.current_page) {
                return Err(Error::MissingLink(self.current_page));
            }
        } else if total_pages > 0 {
            let beyond = if self.first_page == 0 {
                self.current_page >= total_pages
            } else {
                self.current_page > total_pages
            };
            if beyond {
                return Err(out_of_range);
            }
        }

        Ok(self)
    }

    /// End of the current window, `None` when it is not addressable.
    fn checked_page_end(&self) -> Option<usize> {
        self.current_page
            .saturating_sub(self.first_page)
            .checked_mul(self.page_size)?
            .checked_add(self.page_size)
    }

    /// Index of the first record of the current page.
    pub fn page_start(&self) -> usize {
        self.current_page
            .saturating_sub(self.first_page)
            .saturating_mul(self.page_size)
    }

    pub fn page_end(&self) -> usize {
        self.page_start().saturating_add(self.page_size)
    }

    /// Positions of the current page in the full record list.
    pub fn window(&self) -> Range<usize> {
        self.page_start()..self.page_end()
    }
}
