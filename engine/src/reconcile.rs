//! Reconciliation of a collection against incoming snapshots.
//!
//! This is the core of the store. Given a list of entries (records or raw
//! attribute maps), [`Collection::set`] brings the collection in line with
//! it while keeping every surviving record the same object and emitting only
//! the notifications the change actually warrants.
//!
//! # Algorithm
//!
//! 1. Look every entry up by identity, then handle
//! 2. Merge attributes into the records found, materialize the rest
//! 3. Remove every record that was neither found nor added
//! 4. Take the incoming order on a full replace, splice otherwise
//! 5. Re-sort when the comparator's key may have moved
//! 6. Notify: `Add` per insertion, one `Sort`, one `Update`

use crate::collection::{Collection, Entry};
use crate::event::{Changes, Event, EventKind};
use crate::options::SetOptions;
use crate::record::Record;
use crate::{Key, ValidationError};
use serde_json::Value;
use std::collections::HashSet;

/// Resolve an insertion index against a sequence of `len` records.
/// Negative values count from the end; out-of-range values are clamped.
pub(crate) fn clamp_at(at: isize, len: usize) -> usize {
    if at < 0 {
        let from_end = at.unsigned_abs() - 1;
        len.saturating_sub(from_end)
    } else {
        at.unsigned_abs().min(len)
    }
}

impl Collection {
    /// Reconcile this collection with `entries`.
    ///
    /// Returns the records standing for the entries, in input order, with
    /// rejected entries left out.
    pub fn set(&self, entries: Vec<Entry>, options: &SetOptions) -> Vec<Record> {
        let store = self.store().clone();
        let at = options.at.map(|at| clamp_at(at, self.len()));
        let comparator = self.comparator();
        let sortable = comparator.is_some() && at.is_none() && options.sort;
        let sort_attribute = comparator
            .as_ref()
            .and_then(|c| c.sort_attribute().map(str::to_string));

        let mut result = Vec::with_capacity(entries.len());
        let mut kept = Vec::new();
        let mut seen = HashSet::new();
        let mut to_add = Vec::new();
        let mut to_merge = Vec::new();
        let mut sort = false;

        for entry in entries {
            let existing = {
                let state = self.0.state.borrow();
                match &entry {
                    Entry::Record(record) => state.index.lookup(Key::Record(record)),
                    Entry::Attributes(attrs) => state.index.lookup(Key::Attributes(attrs)),
                }
            };

            if let Some(existing) = existing {
                let same = matches!(&entry, Entry::Record(record) if *record == existing);
                if options.merge && !same {
                    let attrs = match entry {
                        Entry::Record(record) => record.attributes(),
                        Entry::Attributes(attrs) => attrs,
                    };
                    let attrs = if options.parse {
                        store.schema().parse(Value::Object(attrs))
                    } else {
                        attrs
                    };

                    let old_identity = existing.identity();
                    if let Err(err) = existing.set(attrs, options) {
                        tracing::debug!(
                            handle = %existing.handle(),
                            error = %err,
                            "merge rejected"
                        );
                    }
                    self.0.state.borrow_mut().index.reindex(
                        &existing,
                        old_identity.as_ref(),
                        existing.identity().as_ref(),
                    );

                    to_merge.push(existing.clone());
                    if sortable && !sort {
                        sort = existing.has_changed(sort_attribute.as_deref());
                    }
                }
                if seen.insert(existing.handle()) {
                    kept.push(existing.clone());
                }
                result.push(existing);
            } else if options.add {
                let record = match self.prepare(entry, options) {
                    Ok(record) => record,
                    Err(_) => continue,
                };
                self.attach(&record);
                seen.insert(record.handle());
                kept.push(record.clone());
                to_add.push(record.clone());
                result.push(record);
            } else if let Entry::Record(record) = entry {
                result.push(record);
            }
        }

        let mut removed = Vec::new();
        if options.remove {
            let stale: Vec<Record> = self
                .records()
                .into_iter()
                .filter(|record| !seen.contains(&record.handle()))
                .collect();
            if !stale.is_empty() {
                removed = self.remove_records(&stale, options);
            }
        }

        let mut order_changed = false;
        let replace = !sortable && options.add && options.remove && at.is_none();
        if !kept.is_empty() && replace {
            let mut state = self.0.state.borrow_mut();
            order_changed = state.items.len() != kept.len()
                || state.items.iter().zip(&kept).any(|(a, b)| a != b);
            state.items = kept;
        } else if !to_add.is_empty() {
            if sortable {
                sort = true;
            }
            let mut state = self.0.state.borrow_mut();
            let position = at.unwrap_or(state.items.len()).min(state.items.len());
            state.items.splice(position..position, to_add.iter().cloned());
        }

        if sort {
            if let Err(err) = self.sort(&options.clone().silent(true)) {
                tracing::debug!(error = %err, "skipped sort after reconcile");
                sort = false;
            }
        }

        tracing::debug!(
            added = to_add.len(),
            removed = removed.len(),
            merged = to_merge.len(),
            sorted = sort,
            "reconciled collection"
        );

        if !options.silent {
            for (offset, record) in to_add.iter().enumerate() {
                let index = at.map(|at| at + offset);
                let mut add_options = options.clone();
                add_options.at = index.map(|index| index as isize);
                record.emit(
                    EventKind::Add {
                        record: record.clone(),
                        collection: self.clone(),
                        index,
                    },
                    &add_options,
                );
            }
            if sort || order_changed {
                self.emit(EventKind::Sort, options);
            }
            let changes = Changes {
                added: to_add,
                removed,
                merged: to_merge,
            };
            if !changes.is_empty() {
                self.emit(EventKind::Update(changes), options);
            }
        }

        result
    }

    /// [`set`](Self::set) for a single entry.
    pub fn set_one(&self, entry: impl Into<Entry>, options: &SetOptions) -> Option<Record> {
        self.set(vec![entry.into()], options).into_iter().next()
    }

    /// Insert entries without removing anything.
    pub fn add(&self, entries: Vec<Entry>, options: &SetOptions) -> Vec<Record> {
        let options = SetOptions {
            add: true,
            remove: false,
            ..options.clone()
        };
        self.set(entries, &options)
    }

    pub fn add_one(&self, entry: impl Into<Entry>, options: &SetOptions) -> Option<Record> {
        self.add(vec![entry.into()], options).into_iter().next()
    }

    /// Remove the given records. Records that are not members are ignored.
    pub fn remove(&self, targets: &[Record], options: &SetOptions) -> Vec<Record> {
        let removed = self.remove_records(targets, options);
        if !options.silent && !removed.is_empty() {
            self.emit(
                EventKind::Update(Changes {
                    removed: removed.clone(),
                    ..Changes::default()
                }),
                options,
            );
        }
        removed
    }

    pub fn remove_one(&self, target: &Record, options: &SetOptions) -> Option<Record> {
        self.remove(std::slice::from_ref(target), options)
            .into_iter()
            .next()
    }

    /// Replace the whole contents with `entries`, emitting a single `Reset`.
    pub fn reset(&self, entries: Vec<Entry>, options: &SetOptions) -> Vec<Record> {
        let previous = {
            let mut state = self.0.state.borrow_mut();
            state.index.clear();
            std::mem::take(&mut state.items)
        };
        for record in &previous {
            self.detach(record);
        }

        let added = self.add(entries, &options.clone().silent(true));
        if !options.silent {
            self.emit(EventKind::Reset { previous }, options);
        }
        added
    }

    /// [`set`](Self::set) from a raw list response.
    pub fn set_value(&self, raw: Value, options: &SetOptions) -> Vec<Record> {
        let entries = self.parse_entries(raw, options.parse);
        self.set(entries, options)
    }

    /// [`reset`](Self::reset) from a raw list response.
    pub fn reset_value(&self, raw: Value, options: &SetOptions) -> Vec<Record> {
        let entries = self.parse_entries(raw, options.parse);
        self.reset(entries, options)
    }

    pub(crate) fn parse_entries(&self, raw: Value, parse: bool) -> Vec<Entry> {
        let parser = self.0.parser.borrow().clone();
        let raw = match (parse, parser) {
            (true, Some(parser)) => parser(raw),
            _ => raw,
        };

        match raw {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(attrs) => Some(Entry::Attributes(attrs)),
                    other => {
                        tracing::warn!(value = %other, "skipping non-object record");
                        None
                    }
                })
                .collect(),
            Value::Object(attrs) => vec![Entry::Attributes(attrs)],
            Value::Null => Vec::new(),
            other => {
                tracing::warn!(value = %other, "expected a list of records");
                Vec::new()
            }
        }
    }

    /// Turn an entry into a record that can join this collection.
    pub(crate) fn prepare(
        &self,
        entry: Entry,
        options: &SetOptions,
    ) -> std::result::Result<Record, ValidationError> {
        match entry {
            Entry::Record(record) => Ok(record),
            Entry::Attributes(attrs) => {
                let build_options = SetOptions::default()
                    .parse(options.parse)
                    .validate(options.validate)
                    .silent(true);
                match Record::build(self.store(), attrs, &build_options) {
                    Ok(record) => {
                        record.link_collection(&self.0);
                        Ok(record)
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "rejected new record");
                        self.emit(EventKind::Invalid(err.clone()), options);
                        Err(err)
                    }
                }
            }
        }
    }

    fn attach(&self, record: &Record) {
        self.0.state.borrow_mut().index.insert(record);
        record.link_collection(&self.0);

        let collection = self.downgrade();
        let id = record.events().subscribe(move |event| {
            if let Some(inner) = collection.upgrade() {
                Collection(inner).relay(event);
            }
        });
        let replaced = self.0.relays.borrow_mut().insert(record.handle(), id);
        if let Some(old) = replaced {
            record.events().unsubscribe(old);
        }
    }

    fn detach(&self, record: &Record) {
        let relay = self.0.relays.borrow_mut().remove(&record.handle());
        if let Some(id) = relay {
            record.events().unsubscribe(id);
        }
        record.unlink_collection(&self.0);
    }

    pub(crate) fn remove_records(&self, targets: &[Record], options: &SetOptions) -> Vec<Record> {
        let mut removed = Vec::new();
        for target in targets {
            let Some(record) = self.get(target) else {
                continue;
            };
            let index = {
                let mut state = self.0.state.borrow_mut();
                let Some(index) = state.items.iter().position(|r| *r == record) else {
                    continue;
                };
                state.items.remove(index);
                state.index.remove(&record, None);
                index
            };

            if !options.silent {
                record.emit(
                    EventKind::Remove {
                        record: record.clone(),
                        collection: self.clone(),
                        index,
                    },
                    options,
                );
            }
            self.detach(&record);
            removed.push(record);
        }
        removed
    }

    /// Forward a member record's event to this collection's subscribers.
    fn relay(&self, event: &Event) {
        match &event.kind {
            EventKind::Add { collection, .. } | EventKind::Remove { collection, .. }
                if collection != self =>
            {
                return;
            }
            EventKind::Destroy => {
                if let Some(record) = event.source.record() {
                    self.remove_one(record, &event.options);
                }
            }
            EventKind::Changed => {
                if let Some(record) = event.source.record() {
                    let old = self.store().identity_of(&record.previous_attributes());
                    let new = record.identity();
                    self.0
                        .state
                        .borrow_mut()
                        .index
                        .reindex(record, old.as_ref(), new.as_ref());
                }
            }
            _ => {}
        }
        self.0.events.emit(event.clone());
    }
}
