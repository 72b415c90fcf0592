use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

use crate::api::Origin;
use crate::models::Entity;

/// Observable state a coordinator exposes to the UI: the current list, a
/// loading flag and the origin of the last read. Only the coordinator
/// writes to it.
pub struct ViewState<T> {
    items: watch::Sender<Vec<T>>,
    loading: watch::Sender<bool>,
    in_flight: AtomicUsize,
    source: watch::Sender<Option<Origin>>,
}

impl<T: Entity> Default for ViewState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> ViewState<T> {
    pub fn new() -> Self {
        Self {
            items: watch::channel(Vec::new()).0,
            loading: watch::channel(false).0,
            in_flight: AtomicUsize::new(0),
            source: watch::channel(None).0,
        }
    }

    // ===== Items =====

    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.items.subscribe()
    }

    pub(crate) fn set_items(&self, items: Vec<T>) {
        self.items.send_replace(items);
    }

    /// Replace the entry with the same id, or append it.
    pub(crate) fn upsert_item(&self, item: T) {
        self.items.send_modify(|items| {
            match items.iter_mut().find(|existing| existing.id().is_some() && existing.id() == item.id()) {
                Some(existing) => *existing = item,
                None => items.push(item),
            }
        });
    }

    /// Replace the entry with the same id; does nothing if it is not listed.
    pub(crate) fn replace_item(&self, item: T) {
        self.items.send_if_modified(|items| {
            match items.iter_mut().find(|existing| existing.id().is_some() && existing.id() == item.id()) {
                Some(existing) => {
                    *existing = item;
                    true
                }
                None => false,
            }
        });
    }

    pub(crate) fn retain(&self, mut keep: impl FnMut(&T) -> bool) {
        self.items.send_if_modified(|items| {
            let before = items.len();
            items.retain(|item| keep(item));
            items.len() != before
        });
    }

    pub(crate) fn remove_item(&self, id: i64) {
        self.retain(|item| item.id() != Some(id));
    }

    // ===== Loading =====

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Mark an operation in flight until the returned guard is dropped.
    pub(crate) fn begin(&self) -> LoadingGuard<'_> {
        self.loading.send_modify(|flag| {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            *flag = true;
        });
        LoadingGuard {
            in_flight: &self.in_flight,
            loading: &self.loading,
        }
    }

    // ===== Data source =====

    pub fn data_source(&self) -> Option<Origin> {
        *self.source.borrow()
    }

    pub fn subscribe_data_source(&self) -> watch::Receiver<Option<Origin>> {
        self.source.subscribe()
    }

    pub fn clear_data_source(&self) {
        self.source.send_replace(None);
    }

    pub(crate) fn set_data_source(&self, origin: Origin) {
        self.source.send_replace(Some(origin));
    }
}

/// Clears the loading flag when the last in-flight operation ends, whether
/// it succeeded, failed, or its task was cancelled.
pub struct LoadingGuard<'a> {
    in_flight: &'a AtomicUsize,
    loading: &'a watch::Sender<bool>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.loading.send_modify(|flag| {
            let previous = self.in_flight.fetch_sub(1, Ordering::SeqCst);
            *flag = previous > 1;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Student;

    fn student(id: i64, name: &str) -> Student {
        Student {
            id: Some(id),
            ..Student::draft(name, "a@example.com", "88887777", 1)
        }
    }

    #[test]
    fn test_loading_guard_clears_flag() {
        let state: ViewState<Student> = ViewState::new();
        let mut rx = state.subscribe_loading();
        assert!(!state.is_loading());

        let outer = state.begin();
        let inner = state.begin();
        assert!(state.is_loading());
        assert!(rx.has_changed().expect("sender alive"));
        let _ = rx.borrow_and_update();

        drop(inner);
        assert!(state.is_loading());
        drop(outer);
        assert!(!state.is_loading());
        assert!(!*rx.borrow_and_update());
    }

    #[test]
    fn test_upsert_item_appends_or_replaces() {
        let state = ViewState::new();
        state.set_items(vec![student(1, "Ana")]);

        state.upsert_item(student(2, "Luis"));
        state.upsert_item(student(1, "Ana Maria"));

        let names: Vec<String> = state.items().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Ana Maria", "Luis"]);

        state.replace_item(student(9, "Nobody"));
        assert_eq!(state.items().len(), 2);

        state.remove_item(1);
        assert_eq!(state.items(), vec![student(2, "Luis")]);
    }

    #[test]
    fn test_data_source_read_and_clear() {
        let state: ViewState<Student> = ViewState::new();
        assert_eq!(state.data_source(), None);
        state.set_data_source(Origin::Network);
        assert_eq!(state.data_source(), Some(Origin::Network));
        state.clear_data_source();
        assert_eq!(state.data_source(), None);
    }
}
