//! Pager configuration and the mapping between pager state and the wire.

use super::state::{Mode, Order, PagerState};
use super::SortValue;
use crate::comparator::Comparator;
use crate::{Attributes, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Names the server uses for the two sort directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directions {
    pub ascending: String,
    pub descending: String,
}

impl Default for Directions {
    fn default() -> Self {
        Self {
            ascending: "asc".to_string(),
            descending: "desc".to_string(),
        }
    }
}

impl Directions {
    pub fn name(&self, order: Order) -> Option<&str> {
        match order {
            Order::Ascending => Some(&self.ascending),
            Order::Descending => Some(&self.descending),
            Order::None => None,
        }
    }

    pub fn order_of(&self, name: &str) -> Option<Order> {
        if name == self.ascending {
            Some(Order::Ascending)
        } else if name == self.descending {
            Some(Order::Descending)
        } else {
            None
        }
    }
}

/// Query parameter name of each state field. `None` keeps a field off the
/// wire in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParams {
    pub current_page: Option<String>,
    pub page_size: Option<String>,
    pub total_pages: Option<String>,
    pub total_records: Option<String>,
    pub sort_key: Option<String>,
    pub order: Option<String>,
    pub directions: Directions,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            current_page: Some("page".to_string()),
            page_size: Some("per_page".to_string()),
            total_pages: Some("total_pages".to_string()),
            total_records: Some("total_entries".to_string()),
            sort_key: Some("sort_by".to_string()),
            order: Some("order".to_string()),
            directions: Directions::default(),
        }
    }
}

impl QueryParams {
    /// Query values derived from `state`.
    ///
    /// Client mode only sends the sort; the other modes send every mapped
    /// field that is known. The order is translated through `directions` and
    /// only sent along with a sort key.
    pub fn state_query(&self, state: &PagerState, mode: Mode) -> Attributes {
        let mut query = Attributes::new();
        let mut put = |name: &Option<String>, value: Option<Value>| {
            if let (Some(name), Some(value)) = (name, value) {
                query.insert(name.clone(), value);
            }
        };

        if mode != Mode::Client {
            put(&self.current_page, Some(state.current_page.into()));
            put(&self.page_size, Some(state.page_size.into()));
            put(&self.total_pages, state.total_pages.map(Value::from));
            put(&self.total_records, state.total_records.map(Value::from));
        }
        if let Some(sort_key) = &state.sort_key {
            put(&self.sort_key, Some(sort_key.as_str().into()));
            put(
                &self.order,
                self.directions.name(state.order).map(Value::from),
            );
        }
        query
    }

    /// Read a `[serverState, records]` response into a copy of `state`.
    ///
    /// Returns `None` when the body is a bare list.
    pub fn parse_state(&self, body: &Value, state: &PagerState) -> Result<Option<PagerState>> {
        let Some((Value::Object(server), _)) = split_tuple(body) else {
            return Ok(None);
        };

        let mut next = state.clone();
        if let Some(page) = read_count(server, &self.current_page, "currentPage")? {
            next.current_page = page;
        }
        if let Some(size) = read_count(server, &self.page_size, "pageSize")? {
            next.page_size = size;
        }
        if let Some(pages) = read_count(server, &self.total_pages, "totalPages")? {
            next.total_pages = Some(pages);
        }
        if let Some(total) = read_count(server, &self.total_records, "totalRecords")? {
            next.total_records = Some(total);
        }
        if let Some(Value::String(key)) = lookup(server, &self.sort_key) {
            next.sort_key = Some(key.clone());
        }
        match lookup(server, &self.order) {
            None | Some(Value::Null) => {}
            Some(Value::String(name)) => {
                next.order = self
                    .directions
                    .order_of(name)
                    .ok_or_else(|| Error::MalformedState(format!("unknown order `{name}`")))?;
            }
            Some(other) => {
                return Err(Error::MalformedState(format!("order `{other}`")));
            }
        }
        Ok(Some(next))
    }
}

fn split_tuple(body: &Value) -> Option<(&Value, &Value)> {
    match body {
        Value::Array(items) if items.len() == 2 && items[0].is_object() && items[1].is_array() => {
            Some((&items[0], &items[1]))
        }
        _ => None,
    }
}

/// The record list of a response, with any server state envelope removed.
pub fn parse_records(body: Value) -> Value {
    if split_tuple(&body).is_none() {
        return body;
    }
    match body {
        Value::Array(mut items) => items.pop().unwrap_or(Value::Null),
        other => other,
    }
}

fn lookup<'a>(server: &'a Attributes, name: &Option<String>) -> Option<&'a Value> {
    name.as_deref().and_then(|name| server.get(name))
}

fn read_count(server: &Attributes, name: &Option<String>, field: &str) -> Result<Option<usize>> {
    match lookup(server, name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| Error::NotFiniteInteger(field.to_string())),
    }
}

/// Initial pager state as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateOptions {
    pub first_page: usize,
    /// Defaults to `first_page`
    pub current_page: Option<usize>,
    pub page_size: usize,
    pub total_records: Option<usize>,
    pub sort_key: Option<String>,
    pub order: Order,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            first_page: 1,
            current_page: None,
            page_size: 25,
            total_records: None,
            sort_key: None,
            order: Order::Ascending,
        }
    }
}

impl From<StateOptions> for PagerState {
    fn from(options: StateOptions) -> Self {
        PagerState {
            first_page: options.first_page,
            current_page: options.current_page.unwrap_or(options.first_page),
            page_size: options.page_size,
            total_records: options.total_records,
            total_pages: None,
            last_page: None,
            sort_key: options.sort_key,
            order: options.order,
        }
    }
}

/// Options of [`Store::pager`](crate::Store::pager).
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PagerOptions {
    pub mode: Mode,
    pub state: StateOptions,
    pub query_params: QueryParams,
    /// Keep the comparator on the full collection rather than on the page
    pub full: bool,
    #[serde(skip)]
    pub comparator: Option<Comparator>,
    /// Sort value used for the initial `sort_key`; the attribute itself by default
    #[serde(skip)]
    pub sort_value: Option<SortValue>,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Server,
            state: StateOptions::default(),
            query_params: QueryParams::default(),
            full: true,
            comparator: None,
            sort_value: None,
        }
    }
}

impl fmt::Debug for PagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagerOptions")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("query_params", &self.query_params)
            .field("full", &self.full)
            .field("comparator", &self.comparator)
            .field("sort_value", &self.sort_value.is_some())
            .finish()
    }
}

impl PagerOptions {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.state.page_size = page_size;
        self
    }

    pub fn first_page(mut self, first_page: usize) -> Self {
        self.state.first_page = first_page;
        self
    }

    pub fn current_page(mut self, current_page: usize) -> Self {
        self.state.current_page = Some(current_page);
        self
    }

    pub fn comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = Some(comparator);
        self
    }
}
