//! Paginated views.
//!
//! A [`Pager`] owns two collections:
//!
//! - the *page*, holding the records of the current page, and
//! - outside server mode, the *full* collection holding every record known
//!   locally.
//!
//! Navigation moves a window over the full collection (client mode, and
//! infinite mode once a page is resident) or fetches the page from the
//! server. Mutations on either collection are mirrored onto the other by the
//! synchronizer in `sync`, so both stay consistent with the
//! [`PagerState`] whichever side a caller touches.
//!
//! # Example
//!
//! ```ignore
//! let options = PagerOptions::default().mode(Mode::Client).page_size(2);
//! let pager = store.pager(records, options)?;
//! pager.get_page(Page::Number(3), PageOptions::default()).await?;
//! assert_eq!(pager.state().current_page, 3);
//! ```

mod links;
mod query;
mod state;
mod sync;

pub use links::{parse_links, Links};
pub use query::{parse_records, Directions, PagerOptions, QueryParams, StateOptions};
pub use state::{Mode, Order, Page, PagerState};

use crate::collection::Entry;
use crate::comparator::{compare_values, Comparator};
use crate::event::{EventKind, Source, SubscriptionId};
use crate::options::{Cause, FetchOptions, SetOptions};
use crate::transport::{self, Response};
use crate::{Collection, Error, Record, Result, Store};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Value a record is sorted by for a sort key.
pub type SortValue = Rc<dyn Fn(&Record, &str) -> Value>;

/// Which side performs the sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortSide {
    Client,
    Server,
}

/// Options of [`Pager::set_sorting`].
#[derive(Clone)]
pub struct SortOptions {
    /// Defaults to the client in client mode, the server otherwise
    pub side: Option<SortSide>,
    /// Sort the full collection rather than the page
    pub full: bool,
    pub sort_value: Option<SortValue>,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            side: None,
            full: true,
            sort_value: None,
        }
    }
}

impl fmt::Debug for SortOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortOptions")
            .field("side", &self.side)
            .field("full", &self.full)
            .field("sort_value", &self.sort_value.is_some())
            .finish()
    }
}

/// Options of the navigation methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOptions {
    /// Fetch even when the page is available locally
    pub fetch: bool,
    pub silent: bool,
}

/// Options of [`Pager::set_page_size`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeOptions {
    /// Go to the first page instead of the page holding the current first record
    pub first: bool,
    pub fetch: bool,
    pub silent: bool,
}

/// Options of [`Pager::switch_mode`].
#[derive(Debug, Clone)]
pub struct SwitchOptions {
    pub fetch: bool,
    /// Go back to the state the pager was created with
    pub reset_state: bool,
    /// Initial contents of the full collection when one is created
    pub records: Vec<Entry>,
    pub silent: bool,
}

impl Default for SwitchOptions {
    fn default() -> Self {
        Self {
            fetch: true,
            reset_state: true,
            records: Vec::new(),
            silent: false,
        }
    }
}

pub(crate) struct PagerInner {
    store: Store,
    page: Collection,
    full: RefCell<Option<Collection>>,
    state: RefCell<PagerState>,
    initial: RefCell<PagerState>,
    mode: Cell<Mode>,
    query_params: QueryParams,
    /// Page number to url, infinite mode only
    links: RefCell<BTreeMap<usize, String>>,
    /// Synchronizer subscriptions
    wiring: RefCell<Vec<(Collection, SubscriptionId)>>,
    busy: Cell<bool>,
    /// Comparator of the full collection while in server mode
    stashed_comparator: RefCell<Option<Comparator>>,
}

impl Drop for PagerInner {
    fn drop(&mut self) {
        for (collection, id) in self.wiring.get_mut().drain(..) {
            collection.events().unsubscribe(id);
        }
    }
}

/// A paginated view. Clones refer to the same pager.
#[derive(Clone)]
pub struct Pager(Rc<PagerInner>);

impl fmt::Debug for Pager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pager")
            .field("mode", &self.0.mode.get())
            .field("state", &self.0.state.try_borrow().ok())
            .field("page", &self.0.page)
            .finish()
    }
}

enum Navigation {
    Local(Vec<Record>),
    Remote { url: Option<String>, cause: Cause },
}

fn to_entries(records: Vec<Record>) -> Vec<Entry> {
    records.into_iter().map(Entry::from).collect()
}

fn sort_comparator(key: String, order: Order, sort_value: Option<SortValue>) -> Option<Comparator> {
    match (order, sort_value) {
        (Order::None, _) => None,
        (Order::Ascending, None) => Some(Comparator::attribute(key)),
        (order, sort_value) => {
            let value: SortValue = sort_value.unwrap_or_else(|| {
                Rc::new(|record: &Record, key: &str| record.get(key).unwrap_or(Value::Null))
            });
            Some(Comparator::compare(move |a, b| {
                let (a, b) = (value(a, &key), value(b, &key));
                match order {
                    Order::Descending => compare_values(&b, &a),
                    _ => compare_values(&a, &b),
                }
            }))
        }
    }
}

impl Pager {
    pub(crate) fn new(store: &Store, entries: Vec<Entry>, options: PagerOptions) -> Result<Pager> {
        let PagerOptions {
            mode,
            state,
            query_params,
            full,
            comparator,
            sort_value,
        } = options;

        let mut state = PagerState::from(state);
        if mode != Mode::Server && state.total_records.is_none() && !entries.is_empty() {
            state.total_records = Some(entries.len());
        }

        let pager = Pager(Rc::new(PagerInner {
            store: store.clone(),
            page: store.collection(),
            full: RefCell::new(None),
            state: RefCell::new(state.clone()),
            initial: RefCell::new(state.clone()),
            mode: Cell::new(Mode::Server),
            query_params,
            links: RefCell::new(BTreeMap::new()),
            wiring: RefCell::new(Vec::new()),
            busy: Cell::new(false),
            stashed_comparator: RefCell::new(None),
        }));

        pager.apply_mode(mode, state.clone(), entries.clone())?;

        if let (Some(key), None) = (state.sort_key.clone(), &comparator) {
            pager.set_sorting(
                Some(key),
                Some(state.order),
                SortOptions {
                    side: None,
                    full,
                    sort_value,
                },
            );
        }

        let quiet = SetOptions::default().silent(true);
        match pager.full() {
            Some(full_collection) => {
                if let Some(comparator) = comparator {
                    if full {
                        full_collection.set_comparator(Some(comparator));
                    } else {
                        pager.0.page.set_comparator(Some(comparator));
                    }
                }
                if full && full_collection.comparator().is_some() {
                    full_collection.sort(&quiet)?;
                }
                let window = pager.state().window();
                pager
                    .0
                    .page
                    .reset(to_entries(full_collection.slice(window)), &quiet);
            }
            None => {
                pager.0.page.set_comparator(comparator);
                pager.0.page.reset(entries, &quiet);
            }
        }

        *pager.0.initial.borrow_mut() = pager.state();
        tracing::debug!(%mode, page_size = state.page_size, "created pager");
        Ok(pager)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn store(&self) -> &Store {
        &self.0.store
    }

    /// The collection holding the current page.
    pub fn page(&self) -> &Collection {
        &self.0.page
    }

    /// The collection holding every local record; `None` in server mode.
    pub fn full(&self) -> Option<Collection> {
        self.0.full.borrow().clone()
    }

    pub fn state(&self) -> PagerState {
        self.0.state.borrow().clone()
    }

    pub fn mode(&self) -> Mode {
        self.0.mode.get()
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.0.query_params
    }

    /// Known page links, infinite mode only.
    pub fn links(&self) -> BTreeMap<usize, String> {
        self.0.links.borrow().clone()
    }

    /// Records of the current page.
    pub fn records(&self) -> Vec<Record> {
        self.0.page.records()
    }

    pub fn has_previous_page(&self) -> bool {
        let state = self.state();
        if self.mode() == Mode::Infinite {
            let links = self.0.links.borrow();
            state
                .current_page
                .checked_sub(1)
                .is_some_and(|page| links.contains_key(&page))
        } else {
            state.current_page > state.first_page
        }
    }

    pub fn has_next_page(&self) -> bool {
        let state = self.state();
        if self.mode() == Mode::Infinite {
            let links = self.0.links.borrow();
            state
                .current_page
                .checked_add(1)
                .is_some_and(|page| links.contains_key(&page))
        } else {
            state
                .last_page
                .is_some_and(|last| state.current_page < last)
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    fn validate(&self, state: PagerState) -> Result<PagerState> {
        let links = self.0.links.borrow();
        state.validated(self.mode(), &links)
    }

    /// Commit `state` if it is valid; otherwise keep the current state.
    fn commit_quietly(&self, state: PagerState) {
        match self.validate(state) {
            Ok(state) => *self.0.state.borrow_mut() = state,
            Err(err) => tracing::warn!(error = %err, "keeping last valid pager state"),
        }
    }

    fn emit_state(&self, options: &SetOptions) {
        self.0
            .page
            .emit(EventKind::StateChanged(self.state()), options);
    }

    /// One link per page of `state`, all pointing at the page collection's url.
    fn page_links(&self, state: &PagerState) -> BTreeMap<usize, String> {
        let mut links = BTreeMap::new();
        let Ok(url) = self.0.page.url() else {
            return links;
        };
        let total_pages = state
            .total_records
            .unwrap_or(0)
            .div_ceil(state.page_size.max(1));
        let last_page = if state.first_page == 0 {
            total_pages.saturating_sub(1)
        } else {
            total_pages.max(state.first_page)
        };
        for page in state.first_page..=last_page {
            links.insert(page, url.clone());
        }
        links
    }

    fn absorb_links(&self, links: &Links, state: &PagerState) {
        let mut map = self.0.links.borrow_mut();
        if let Some(url) = &links.first {
            map.insert(state.first_page, url.clone());
        }
        if let (Some(url), Some(page)) = (&links.prev, state.current_page.checked_sub(1)) {
            map.insert(page, url.clone());
        }
        if let Some(url) = &links.next {
            map.insert(state.current_page + 1, url.clone());
        }
        if let (Some(url), Some(page)) = (&links.last, state.last_page) {
            map.insert(page, url.clone());
        }
    }

    /// Enter `mode` with `state`, creating or dropping the full collection.
    fn apply_mode(&self, mode: Mode, state: PagerState, records: Vec<Entry>) -> Result<()> {
        let links = if mode == Mode::Infinite {
            self.page_links(&state)
        } else {
            BTreeMap::new()
        };
        let state = state.validated(mode, &links)?;

        let previous = self.0.mode.replace(mode);
        *self.0.state.borrow_mut() = state;
        *self.0.links.borrow_mut() = links;

        match (mode, self.full()) {
            (Mode::Server, Some(full)) => {
                self.unwire();
                *self.0.stashed_comparator.borrow_mut() = full.comparator();
                *self.0.full.borrow_mut() = None;
            }
            (Mode::Client | Mode::Infinite, None) => {
                let full = self.0.store.collection();
                let comparator = self.0.stashed_comparator.borrow_mut().take();
                full.set_comparator(comparator);
                full.reset(records, &SetOptions::default().silent(true));
                *self.0.full.borrow_mut() = Some(full.clone());
                self.wire(&full);
            }
            _ => {}
        }

        tracing::debug!(from = %previous, to = %mode, "pager mode set");
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    fn resolve(&self, target: Page, state: &PagerState) -> Result<usize> {
        match target {
            Page::First => Ok(state.first_page),
            Page::Previous => state
                .current_page
                .checked_sub(1)
                .ok_or(Error::NoPreviousPage(state.current_page)),
            Page::Next => state
                .current_page
                .checked_add(1)
                .ok_or(Error::PageOutOfRange {
                    page: state.current_page,
                    first_page: state.first_page,
                    bound: if state.first_page == 0 { "<" } else { "<=" },
                }),
            Page::Last => state.last_page.ok_or(Error::UnknownLastPage),
            Page::Number(page) => Ok(page),
        }
    }

    fn navigate(&self, target: Page, options: PageOptions) -> Result<Navigation> {
        let state = self.state();
        let page = self.resolve(target, &state)?;
        let next = self.validate(PagerState {
            current_page: page,
            ..state.clone()
        })?;
        let window = next.window();
        *self.0.state.borrow_mut() = next;

        let cause = Cause::Navigation {
            from: state.current_page,
            to: page,
        };
        tracing::debug!(from = state.current_page, to = page, "navigating");
        let set_options = SetOptions::default().silent(options.silent).cause(cause);
        if !options.silent {
            self.emit_state(&set_options);
        }

        let mode = self.mode();
        let resident = self
            .full()
            .map(|full| full.slice(window))
            .unwrap_or_default();
        let local = mode == Mode::Client || (mode == Mode::Infinite && !resident.is_empty());
        if local && !options.fetch {
            let records = self.0.page.reset(to_entries(resident), &set_options);
            return Ok(Navigation::Local(records));
        }

        let url = if mode == Mode::Infinite {
            self.0.links.borrow().get(&page).cloned()
        } else {
            None
        };
        Ok(Navigation::Remote { url, cause })
    }

    /// Go to `target`, fetching the page when it is not available locally.
    pub async fn get_page(
        &self,
        target: impl Into<Page>,
        options: PageOptions,
    ) -> Result<Vec<Record>> {
        match self.navigate(target.into(), options)? {
            Navigation::Local(records) => Ok(records),
            Navigation::Remote { url, cause } => {
                let mut fetch = FetchOptions::default().silent(options.silent);
                fetch.url = url;
                self.fetch_with(fetch, cause).await
            }
        }
    }

    pub async fn get_first_page(&self, options: PageOptions) -> Result<Vec<Record>> {
        self.get_page(Page::First, options).await
    }

    pub async fn get_previous_page(&self, options: PageOptions) -> Result<Vec<Record>> {
        self.get_page(Page::Previous, options).await
    }

    pub async fn get_next_page(&self, options: PageOptions) -> Result<Vec<Record>> {
        self.get_page(Page::Next, options).await
    }

    pub async fn get_last_page(&self, options: PageOptions) -> Result<Vec<Record>> {
        self.get_page(Page::Last, options).await
    }

    /// Go to the page holding the record at `offset`.
    pub async fn get_page_by_offset(
        &self,
        offset: usize,
        options: PageOptions,
    ) -> Result<Vec<Record>> {
        let state = self.state();
        let mut page = state.first_page + offset / state.page_size.max(1);
        if let Some(last) = state.last_page {
            page = page.min(last);
        }
        self.get_page(page, options).await
    }

    /// Change the page size, staying on the page that holds the first record
    /// of the current page.
    pub async fn set_page_size(
        &self,
        page_size: usize,
        options: ResizeOptions,
    ) -> Result<Vec<Record>> {
        let state = self.state();
        let first_record = state.page_start();
        let current_page = match state.total_records {
            Some(total) if total > 0 && page_size > 0 && !options.first => {
                state.first_page + first_record / page_size
            }
            _ => state.first_page,
        };
        let next = self.validate(PagerState {
            page_size,
            current_page,
            ..state
        })?;
        *self.0.state.borrow_mut() = next;
        tracing::debug!(page_size, current_page, "resized pages");

        self.get_page(
            current_page,
            PageOptions {
                fetch: options.fetch,
                silent: options.silent,
            },
        )
        .await
    }

    /// Change where pages come from.
    pub async fn switch_mode(&self, mode: Mode, options: SwitchOptions) -> Result<Vec<Record>> {
        let state = if options.reset_state {
            self.0.initial.borrow().clone()
        } else {
            self.state()
        };
        self.apply_mode(mode, state, options.records)?;
        if !options.silent {
            self.emit_state(&SetOptions::default());
        }

        if options.fetch {
            self.fetch(&FetchOptions::default().silent(options.silent))
                .await
        } else {
            Ok(self.records())
        }
    }

    /// Set the sort key and order.
    ///
    /// Client side sorting installs a comparator on the full collection (or
    /// the page); server side sorting only changes the query. Nothing is
    /// re-sorted until the collection is sorted or refetched.
    pub fn set_sorting(
        &self,
        sort_key: Option<String>,
        order: Option<Order>,
        options: SortOptions,
    ) {
        let order = {
            let mut state = self.0.state.borrow_mut();
            state.sort_key = sort_key.clone();
            if let Some(order) = order {
                state.order = order;
            }
            state.order
        };

        let mode = self.mode();
        let side = options.side.unwrap_or(if mode == Mode::Client {
            SortSide::Client
        } else {
            SortSide::Server
        });
        let comparator = sort_key
            .clone()
            .and_then(|key| sort_comparator(key, order, options.sort_value));

        let mut clear_page = comparator.is_none();
        let mut clear_full = comparator.is_none();
        match side {
            SortSide::Client if options.full => {
                self.set_full_comparator(comparator);
                clear_page = true;
            }
            SortSide::Client => {
                self.0.page.set_comparator(comparator);
                clear_full = true;
            }
            SortSide::Server if !options.full => self.0.page.set_comparator(comparator),
            SortSide::Server => {}
        }
        if clear_page {
            self.0.page.set_comparator(None);
        }
        if clear_full {
            self.set_full_comparator(None);
        }
        tracing::debug!(?sort_key, ?order, ?side, "sorting set");
    }

    fn set_full_comparator(&self, comparator: Option<Comparator>) {
        match self.full() {
            Some(full) => full.set_comparator(comparator),
            None => *self.0.stashed_comparator.borrow_mut() = comparator,
        }
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Fetch the current page (client mode: everything) with the query
    /// derived from the state.
    pub async fn fetch(&self, options: &FetchOptions) -> Result<Vec<Record>> {
        self.fetch_with(options.clone(), Cause::Direct).await
    }

    async fn fetch_with(&self, options: FetchOptions, cause: Cause) -> Result<Vec<Record>> {
        let mode = self.mode();
        let state = self.state();
        let url = match options.url.clone() {
            Some(url) => Some(url),
            None if mode == Mode::Infinite => {
                self.0.links.borrow().get(&state.current_page).cloned()
            }
            None => None,
        };
        let derived = self.0.query_params.state_query(&state, mode);
        let request = self.0.page.read_request(url, derived, &options.query)?;

        let source = Source::Collection(self.0.page.clone());
        let response = transport::dispatch(&source, &self.0.store, request, &options.set).await?;
        let records = self.absorb(&response, &options, cause)?;
        self.0
            .page
            .emit(EventKind::Sync(response.body), &options.set);
        Ok(records)
    }

    /// Apply a fetch response: links, server state, then records.
    fn absorb(
        &self,
        response: &Response,
        options: &FetchOptions,
        cause: Cause,
    ) -> Result<Vec<Record>> {
        let mode = self.mode();
        let before = self.state();

        if mode == Mode::Infinite {
            if let Some(header) = response.header("link") {
                self.absorb_links(&parse_links(header), &before);
            }
        }
        if let Some(next) = self.0.query_params.parse_state(&response.body, &before)? {
            let next = self.validate(next)?;
            *self.0.state.borrow_mut() = next;
        }

        let raw = parse_records(response.body.clone());
        let entries = self.0.page.parse_entries(raw, options.set.parse);
        let set_options = options.set.clone().cause(cause);
        let quiet = set_options.clone().silent(true);

        let records = match (mode, self.full()) {
            (Mode::Client, Some(full)) => {
                let records = self.0.page.set(entries, &quiet);
                full.reset(to_entries(self.0.page.records()), &set_options);
                if set_options.silent {
                    self.refresh_from_full(&full, &set_options);
                }
                records
            }
            (Mode::Infinite, Some(full)) => {
                let previous = self.0.page.records();
                let records = self.0.page.set(entries, &quiet);
                let at = full.len() as isize;
                full.add(to_entries(records.clone()), &set_options.clone().at(at));
                if set_options.silent {
                    let mut state = self.state();
                    state.total_records = Some(full.len());
                    self.commit_quietly(state);
                } else {
                    let shown = Cause::Navigation {
                        from: before.current_page,
                        to: self.state().current_page,
                    };
                    self.0
                        .page
                        .emit(EventKind::Reset { previous }, &set_options.clone().cause(shown));
                }
                records
            }
            _ if options.reset => self.0.page.reset(entries, &set_options),
            _ => self.0.page.set(entries, &set_options),
        };

        tracing::debug!(%mode, count = records.len(), "fetched page");
        Ok(records)
    }
}
