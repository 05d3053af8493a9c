//! Bidirectional synchronization of the page and full collections.
//!
//! The synchronizer listens to `Add`, `Remove`, `Reset` and `Sort` on both
//! collections and mirrors each mutation onto the other side:
//!
//! - an add inside the window is mirrored, and a page grown past its size
//!   evicts its last record (deferred, tagged [`Cause::Eviction`]);
//! - a remove updates the total and refills the page from the record after
//!   the window (deferred or inline, tagged [`Cause::Refill`]);
//! - a page reset is spliced back into the full collection, a full reset
//!   re-windows the page, and so does a full sort.
//!
//! While it mirrors, the `busy` flag makes it ignore the notifications its
//! own mutations cause.

use super::{to_entries, Mode, Pager};
use crate::event::{Event, EventKind};
use crate::options::{Cause, SetOptions};
use crate::{Collection, Record, Topic};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Page,
    Full,
}

impl Pager {
    pub(super) fn wire(&self, full: &Collection) {
        let mut wiring = self.0.wiring.borrow_mut();
        let sides = [
            (Origin::Page, self.0.page.clone()),
            (Origin::Full, full.clone()),
        ];
        for (origin, collection) in sides {
            let pager = Rc::downgrade(&self.0);
            let id = collection.events().subscribe_to(
                [Topic::Add, Topic::Remove, Topic::Reset, Topic::Sort],
                move |event| {
                    if let Some(inner) = pager.upgrade() {
                        Pager(inner).synchronize(origin, event);
                    }
                },
            );
            wiring.push((collection, id));
        }
    }

    pub(super) fn unwire(&self) {
        let wiring = std::mem::take(&mut *self.0.wiring.borrow_mut());
        for (collection, id) in wiring {
            collection.events().unsubscribe(id);
        }
    }

    fn synchronize(&self, origin: Origin, event: &Event) {
        if self.0.busy.get() {
            return;
        }
        let Some(full) = self.full() else {
            return;
        };

        self.0.busy.set(true);
        let changed = match &event.kind {
            EventKind::Add { record, .. } => self.mirror_add(origin, record, &full, event),
            EventKind::Remove { record, index, .. } => {
                self.mirror_remove(origin, record, *index, &full, event)
            }
            EventKind::Reset { previous } => self.mirror_reset(origin, previous, &full, event),
            EventKind::Sort if origin == Origin::Full => {
                let window = self.state().window();
                self.0.page.reset(
                    to_entries(full.slice(window)),
                    &SetOptions::default().silent(event.options.silent),
                );
                false
            }
            _ => false,
        };
        self.0.busy.set(false);

        if changed && !event.options.silent {
            self.emit_state(&event.options);
        }
    }

    fn mirror_add(
        &self,
        origin: Origin,
        record: &Record,
        full: &Collection,
        event: &Event,
    ) -> bool {
        let page = &self.0.page;
        let mut state = self.state();
        let page_start = state.page_start();

        // (collection to mirror into, position there, position in the page)
        let (target, at, page_index) = match origin {
            Origin::Page => {
                let Some(page_index) = page.index_of(record) else {
                    return false;
                };
                let at = event
                    .options
                    .at
                    .map_or(page_start + page_index, |at| page_start + at.unsigned_abs());
                (Some(full), at, Some(page_index))
            }
            Origin::Full => {
                let Some(full_index) = full.index_of(record) else {
                    return false;
                };
                if state.window().contains(&full_index) {
                    let page_index = full_index - page_start;
                    (Some(page), page_index, Some(page_index))
                } else {
                    (None, 0, None)
                }
            }
        };
        tracing::trace!(?origin, handle = %record.handle(), at, "mirroring add");

        if event.options.cause != Cause::Refill {
            state.total_records = Some(state.total_records.unwrap_or(0) + 1);
            self.commit_quietly(state);
        }
        if let Some(target) = target {
            target.add_one(
                record,
                &SetOptions::add()
                    .at(at as isize)
                    .silent(event.options.silent)
                    .cause(event.options.cause),
            );
        }

        if let Some(page_index) = page_index {
            let page_size = self.state().page_size;
            let evicted = if page_index >= page_size {
                Some(record.clone())
            } else if page.len() > page_size {
                page.at(page_size as isize)
            } else {
                None
            };
            if let Some(evicted) = evicted {
                let channel = match origin {
                    Origin::Page => page.clone(),
                    Origin::Full => full.clone(),
                };
                let page = page.clone();
                let silent = event.options.silent;
                channel.events().defer(move || {
                    page.remove_one(
                        &evicted,
                        &SetOptions::default().silent(silent).cause(Cause::Eviction),
                    );
                });
            }
        }
        true
    }

    fn mirror_remove(
        &self,
        origin: Origin,
        record: &Record,
        index: usize,
        full: &Collection,
        event: &Event,
    ) -> bool {
        if event.options.cause == Cause::Eviction {
            return false;
        }
        let page = &self.0.page;
        let silent = event.options.silent;
        let mut state = self.state();
        let window = state.window();
        tracing::trace!(?origin, handle = %record.handle(), index, "mirroring remove");

        state.total_records = state.total_records.map(|total| total.saturating_sub(1));
        if let Some(total) = state.total_records {
            let total_pages = total.div_ceil(state.page_size);
            let last_page = if state.first_page == 0 {
                total_pages.saturating_sub(1)
            } else {
                total_pages.max(state.first_page)
            };
            state.current_page = state.current_page.min(last_page);
        }
        self.commit_quietly(state);

        let refilled = match origin {
            Origin::Page => {
                let next = full.at(window.end as isize);
                full.remove_one(record, &SetOptions::default().silent(silent));
                match next {
                    Some(next) => {
                        let page_handle = page.clone();
                        page.events().defer(move || {
                            page_handle.push(
                                &next,
                                &SetOptions::add().silent(silent).cause(Cause::Refill),
                            );
                        });
                        true
                    }
                    None => false,
                }
            }
            Origin::Full => {
                let mut refilled = false;
                if window.contains(&index) {
                    page.remove_one(record, &SetOptions::default().silent(silent));
                    if let Some(next) = full.at(window.end as isize - 1) {
                        page.push(&next, &SetOptions::add().silent(silent).cause(Cause::Refill));
                        refilled = true;
                    }
                }
                refilled
            }
        };

        let has_records = self.state().total_records.is_some_and(|total| total > 0);
        if !refilled && page.is_empty() && has_records {
            let window = self.state().window();
            page.reset(
                to_entries(full.slice(window)),
                &SetOptions::default().silent(silent),
            );
        }
        true
    }

    fn mirror_reset(
        &self,
        origin: Origin,
        previous: &[Record],
        full: &Collection,
        event: &Event,
    ) -> bool {
        match origin {
            Origin::Page => {
                if matches!(event.options.cause, Cause::Navigation { .. }) {
                    return false;
                }
                let page_start = self.state().page_start();
                let len = full.len();
                let mut records = full.slice(0..page_start);
                records.extend(self.0.page.records());
                records.extend(full.slice((page_start + previous.len()).min(len)..len));
                tracing::trace!(count = records.len(), "splicing page into full collection");

                full.reset(
                    to_entries(records),
                    &SetOptions::default().silent(event.options.silent),
                );
                let mut state = self.state();
                state.total_records = Some(full.len());
                self.commit_quietly(state);
            }
            Origin::Full => self.refresh_from_full(full, &event.options),
        }
        true
    }

    /// Recount after the full collection was replaced and show the window.
    /// Client mode goes back to the first page.
    pub(super) fn refresh_from_full(&self, full: &Collection, options: &SetOptions) {
        let mut state = self.state();
        state.total_records = Some(full.len());
        if self.mode() == Mode::Client {
            state.current_page = state.first_page;
        }
        self.commit_quietly(state);

        let window = self.state().window();
        tracing::trace!(?window, "re-windowing page");
        self.0.page.reset(
            to_entries(full.slice(window)),
            &SetOptions::default().silent(options.silent),
        );
    }
}
