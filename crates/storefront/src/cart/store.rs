//! The cart state store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ququ_core::{ProductId, round_money};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::item::{CartLineItem, CatalogProduct};
use super::notify::{CartObserver, Notification, NotificationKind};
use crate::persist::{Debouncer, KeyValueStore, offload};

/// Key the cart is stored under when a store holds a single cart.
pub const CART_KEY: &str = "cart";

/// Largest subtotal a cart may hold, in whole currency units. Every amount
/// derived from it, down to the minor units sent to the payment provider,
/// stays in range.
pub const MAX_SUBTOTAL: i64 = 1_000_000_000_000_000;

/// Render-ready view of the cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub items: Vec<CartLineItem>,
    pub total: Decimal,
    pub count: u32,
}

/// Serialized form of a cart with no lines. It is stored by removing the key.
const EMPTY_CART: &str = "[]";

/// Writes one cart's snapshots to storage.
///
/// Every snapshot is numbered when it is taken. Writes may finish out of
/// order on the blocking pool, so one older than the last stored snapshot is
/// dropped.
struct CartWriter {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    taken: AtomicU64,
    stored: Mutex<u64>,
}

impl CartWriter {
    fn next_generation(&self) -> u64 {
        self.taken.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn write(&self, generation: u64, serialized: &str) {
        let mut stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        if *stored > generation {
            debug!(key = %self.key, generation, "Skipping stale cart write");
            return;
        }
        let result = if serialized == EMPTY_CART {
            self.storage.remove(&self.key)
        } else {
            self.storage.set(&self.key, serialized)
        };
        match result {
            Ok(()) => {
                *stored = generation;
                debug!(key = %self.key, "Cart persisted");
            }
            Err(e) => warn!(key = %self.key, error = %e, "Failed to persist cart"),
        }
    }
}

/// Owns the shopper's cart lines.
///
/// All mutations go through this type. Each one notifies the subscribed
/// observers and schedules a debounced write of the whole cart (JSON array)
/// to the backing [`KeyValueStore`]. Persistence is best-effort: failures are
/// logged and the in-memory lines stay authoritative.
pub struct CartStore {
    items: Vec<CartLineItem>,
    writer: Arc<CartWriter>,
    debouncer: Debouncer,
    observers: Vec<Arc<dyn CartObserver>>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.writer.key)
            .field("items", &self.items)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Hydrate a cart from `storage`.
    ///
    /// A missing key, an unreadable store or unparseable contents all yield an
    /// empty cart; the problem is logged, never returned.
    #[instrument(skip(storage))]
    pub fn load(storage: Arc<dyn KeyValueStore>, key: &str, debounce: Duration) -> Self {
        let items = match storage.get(key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<CartLineItem>>(&raw) {
                Ok(items) => sanitize(items),
                Err(e) => {
                    warn!(error = %e, "Stored cart is not valid JSON, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored cart, starting empty");
                Vec::new()
            }
        };

        debug!(lines = items.len(), "Cart hydrated");

        Self {
            items,
            writer: Arc::new(CartWriter {
                storage,
                key: key.to_owned(),
                taken: AtomicU64::new(0),
                stored: Mutex::new(0),
            }),
            debouncer: Debouncer::new(debounce),
            observers: Vec::new(),
        }
    }

    /// Register an observer for every future notification.
    pub fn subscribe(&mut self, observer: Arc<dyn CartObserver>) {
        self.observers.push(observer);
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Add `quantity` of `product`.
    ///
    /// Products without an id, with a negative price or a zero quantity are
    /// ignored, as is an add that would take the subtotal past
    /// [`MAX_SUBTOTAL`]. An existing line is incremented; otherwise a new line
    /// is appended. The notification is emitted before the line is written.
    pub fn add_item(&mut self, product: &CatalogProduct, quantity: u32) {
        let Some(id) = product.usable_id().cloned() else {
            debug!("Ignoring product without id");
            return;
        };
        if quantity == 0 || product.price.is_sign_negative() {
            debug!(product_id = %id, quantity, "Ignoring invalid add");
            return;
        }

        let existing = self.items.iter().any(|item| item.id == id);
        let next = merge_line(&self.items, product.to_line(id.clone(), quantity));
        if checked_subtotal(&next).is_none() {
            warn!(product_id = %id, quantity, "Ignoring add over the cart limit");
            return;
        }

        let message = if existing {
            format!("+{quantity} {}", product.name)
        } else {
            format!("Added {}", product.name)
        };
        self.emit(Notification::new(NotificationKind::Added, message));

        self.items = next;
        self.schedule_persist();
    }

    /// Remove the line for `id`. Unknown ids are a silent no-op.
    pub fn remove_item(&mut self, id: &ProductId) -> Option<CartLineItem> {
        let index = self.items.iter().position(|item| &item.id == id)?;
        let removed = self.items.remove(index);
        self.emit(Notification::new(
            NotificationKind::Removed,
            format!("Removed {}", removed.name),
        ));
        self.schedule_persist();
        Some(removed)
    }

    /// Set the quantity of the line for `id`. A quantity below 1 removes the
    /// line. Unknown ids are a silent no-op, and a quantity that would take
    /// the subtotal past [`MAX_SUBTOTAL`] leaves the line unchanged.
    pub fn update_quantity(&mut self, id: &ProductId, quantity: u32) {
        if quantity < 1 {
            self.remove_item(id);
            return;
        }

        let mut next = self.items.clone();
        let Some(line) = next.iter_mut().find(|item| &item.id == id) else {
            return;
        };
        line.quantity = quantity;
        let message = format!("Updated {}", line.name);
        if checked_subtotal(&next).is_none() {
            warn!(product_id = %id, quantity, "Ignoring update over the cart limit");
            return;
        }

        self.emit(Notification::new(NotificationKind::Updated, message));
        self.items = next;
        self.schedule_persist();
    }

    /// Empty the cart. Clearing an empty cart is allowed.
    pub fn clear(&mut self) {
        self.items.clear();
        self.emit(Notification::new(NotificationKind::Cleared, "Cart cleared"));
        self.schedule_persist();
    }

    /// Unrounded sum of `price * quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        // Every mutation and hydration keeps the lines within `MAX_SUBTOTAL`.
        checked_subtotal(&self.items).unwrap_or(Decimal::ZERO)
    }

    /// Sum of `price * quantity`, rounded to 2 places (half away from zero).
    #[must_use]
    pub fn total(&self) -> Decimal {
        round_money(self.subtotal())
    }

    /// Total number of units, for the cart badge.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
            total: self.total(),
            count: self.count(),
        }
    }

    /// Write the current state now, cancelling any pending debounced write.
    ///
    /// Inside a Tokio runtime the write runs on the blocking pool and the
    /// returned handle resolves once it is done. Dropping the handle leaves
    /// the write running.
    pub fn flush(&mut self) -> Option<JoinHandle<()>> {
        self.debouncer.cancel();
        let serialized = self.serialize()?;
        let writer = Arc::clone(&self.writer);
        let generation = writer.next_generation();
        offload(move || writer.write(generation, &serialized))
    }

    fn emit(&self, notification: Notification) {
        for observer in &self.observers {
            observer.notify(&notification);
        }
    }

    fn serialize(&self) -> Option<String> {
        serde_json::to_string(&self.items)
            .inspect_err(|e| warn!(error = %e, "Failed to serialize cart"))
            .ok()
    }

    fn schedule_persist(&mut self) {
        let Some(serialized) = self.serialize() else {
            return;
        };
        let writer = Arc::clone(&self.writer);
        let generation = writer.next_generation();
        self.debouncer.schedule(move || writer.write(generation, &serialized));
    }
}

/// Unrounded sum of `price * quantity`, or `None` if it overflows or exceeds
/// [`MAX_SUBTOTAL`].
fn checked_subtotal(items: &[CartLineItem]) -> Option<Decimal> {
    let subtotal = items.iter().try_fold(Decimal::ZERO, |acc, item| {
        acc.checked_add(item.line_total()?)
    })?;
    (subtotal <= Decimal::from(MAX_SUBTOTAL)).then_some(subtotal)
}

/// `items` with `line` added, merged into the existing line for its product.
fn merge_line(items: &[CartLineItem], line: CartLineItem) -> Vec<CartLineItem> {
    let mut next = items.to_vec();
    match next.iter_mut().find(|item| item.id == line.id) {
        Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
        None => next.push(line),
    }
    next
}

/// Repair hydrated lines: drop blank ids, zero quantities, negative prices and
/// lines that would take the subtotal past [`MAX_SUBTOTAL`], and merge
/// duplicate ids into the first occurrence.
fn sanitize(raw: Vec<CartLineItem>) -> Vec<CartLineItem> {
    let mut items: Vec<CartLineItem> = Vec::with_capacity(raw.len());
    for line in raw {
        if line.id.is_blank() || line.quantity == 0 || line.price.is_sign_negative() {
            warn!(product_id = %line.id, "Dropping invalid stored cart line");
            continue;
        }
        let id = line.id.clone();
        let next = merge_line(&items, line);
        if checked_subtotal(&next).is_none() {
            warn!(product_id = %id, "Dropping stored cart line over the cart limit");
            continue;
        }
        items = next;
    }
    items
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::str::FromStr;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::cart::ToastQueue;
    use crate::persist::{MemoryStore, StorageError};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn product(id: &str, price: &str) -> CatalogProduct {
        CatalogProduct::new(id, format!("Product {id}"), dec(price))
    }

    fn empty_store() -> (CartStore, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        let store = CartStore::load(storage.clone(), CART_KEY, Debouncer::DEFAULT_WINDOW);
        (store, storage)
    }

    /// Counts writes and remembers the last value.
    #[derive(Default)]
    struct CountingStore {
        writes: AtomicUsize,
        last: Mutex<Option<String>>,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, value: &str) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(value.to_owned());
            Ok(())
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    /// Always fails to read and write.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::InvalidKey(key.to_owned()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk full".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn test_add_same_id_merges_quantity() {
        let (mut store, _) = empty_store();
        store.add_item(&product("p1", "10"), 2);
        store.add_item(&product("p1", "10"), 3);

        assert_eq!(store.items().len(), 1);
        assert_eq!(store.get(&ProductId::new("p1")).unwrap().quantity, 5);
    }

    #[test]
    fn test_add_without_id_is_ignored() {
        let (mut store, _) = empty_store();
        let mut anonymous = product("p1", "10");
        anonymous.id = None;
        store.add_item(&anonymous, 1);
        store.add_item(&product("", "10"), 1);
        store.add_item(&product("p2", "10"), 0);

        assert!(store.is_empty());
    }

    #[test]
    fn test_update_quantity_zero_equals_remove() {
        let (mut removed, _) = empty_store();
        removed.add_item(&product("p1", "10"), 2);
        removed.add_item(&product("p2", "4"), 1);
        removed.remove_item(&ProductId::new("p1"));

        let (mut updated, _) = empty_store();
        updated.add_item(&product("p1", "10"), 2);
        updated.add_item(&product("p2", "4"), 1);
        updated.update_quantity(&ProductId::new("p1"), 0);

        assert_eq!(removed.items(), updated.items());
    }

    #[test]
    fn test_update_quantity_sets_absolute_value() {
        let (mut store, _) = empty_store();
        store.add_item(&product("p1", "10"), 2);
        store.update_quantity(&ProductId::new("p1"), 7);
        assert_eq!(store.count(), 7);

        store.update_quantity(&ProductId::new("missing"), 3);
        assert_eq!(store.count(), 7);
    }

    #[test]
    fn test_total_rounds_to_two_places() {
        let (mut store, _) = empty_store();
        store.add_item(&product("a", "9.99"), 2);
        store.add_item(&product("b", "5"), 1);
        assert_eq!(store.total(), dec("24.98"));

        store.add_item(&product("c", "0.005"), 1);
        assert_eq!(store.subtotal(), dec("24.985"));
        assert_eq!(store.total(), dec("24.99"));
    }

    #[test]
    fn test_count_sums_quantities() {
        let (mut store, _) = empty_store();
        store.add_item(&product("a", "1"), 2);
        store.add_item(&product("b", "1"), 3);
        assert_eq!(store.count(), 5);
    }

    #[test]
    fn test_clear_twice_is_idempotent() {
        let (mut store, _) = empty_store();
        store.add_item(&product("a", "1"), 2);
        store.clear();
        let first = store.snapshot();
        store.clear();
        let second = store.snapshot();

        assert!(first.items.is_empty() && second.items.is_empty());
        assert_eq!(first.count, second.count);
        assert_eq!(first.total, second.total);
    }

    #[test]
    fn test_notifications() {
        let (mut store, _) = empty_store();
        let toasts = Arc::new(ToastQueue::default());
        store.subscribe(toasts.clone());

        store.add_item(&product("p1", "10"), 1);
        store.add_item(&product("p1", "10"), 2);
        store.update_quantity(&ProductId::new("p1"), 4);
        store.remove_item(&ProductId::new("p1"));
        store.remove_item(&ProductId::new("p1"));
        store.update_quantity(&ProductId::new("p1"), 2);
        store.clear();

        let seen: Vec<_> = toasts
            .drain()
            .into_iter()
            .map(|n| (n.kind, n.message))
            .collect();
        assert_eq!(
            seen,
            vec![
                (NotificationKind::Added, "Added Product p1".to_string()),
                (NotificationKind::Added, "+2 Product p1".to_string()),
                (NotificationKind::Updated, "Updated Product p1".to_string()),
                (NotificationKind::Removed, "Removed Product p1".to_string()),
                (NotificationKind::Cleared, "Cart cleared".to_string()),
            ]
        );
    }

    #[test]
    fn test_closure_observer() {
        let (mut store, _) = empty_store();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        store.subscribe(Arc::new(move |n: &Notification| {
            sink.lock().unwrap().push(n.message.clone());
        }));

        store.add_item(&product("p1", "10"), 1);
        store.remove_item(&ProductId::new("nope"));
        assert_eq!(*messages.lock().unwrap(), ["Added Product p1"]);
    }

    #[test]
    fn test_invariants_hold_over_mixed_sequence() {
        let (mut store, _) = empty_store();
        let ids = ["a", "b", "c"];
        for step in 0_u32..60 {
            let id = ids[(step % 3) as usize];
            match step % 5 {
                0 | 1 => store.add_item(&product(id, "2.50"), step % 4),
                2 => store.update_quantity(&ProductId::new(id), step % 3),
                3 => {
                    store.remove_item(&ProductId::new(id));
                }
                _ => store.update_quantity(&ProductId::new(id), step % 7),
            }

            let mut seen = std::collections::HashSet::new();
            for item in store.items() {
                assert!(item.quantity >= 1, "quantity must stay positive");
                assert!(seen.insert(item.id.clone()), "duplicate line for {}", item.id);
            }
        }
    }

    #[test]
    fn test_hydrates_from_storage() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set(
                CART_KEY,
                r#"[{"id":"p1","name":"Tote","price":"12.50","quantity":2}]"#,
            )
            .unwrap();
        let store = CartStore::load(storage, CART_KEY, Debouncer::DEFAULT_WINDOW);
        assert_eq!(store.count(), 2);
        assert_eq!(store.total(), dec("25.00"));
    }

    #[test]
    fn test_hydration_parse_error_yields_empty_cart() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(CART_KEY, "{not json").unwrap();
        let store = CartStore::load(storage, CART_KEY, Debouncer::DEFAULT_WINDOW);
        assert!(store.is_empty());

        let store = CartStore::load(Arc::new(BrokenStore), CART_KEY, Debouncer::DEFAULT_WINDOW);
        assert!(store.is_empty());
    }

    #[test]
    fn test_hydration_repairs_corrupt_lines() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set(
                CART_KEY,
                r#"[
                    {"id":"p1","name":"Tote","price":"10","quantity":1},
                    {"id":"p2","name":"Zero","price":"10","quantity":0},
                    {"id":"p1","name":"Tote","price":"10","quantity":2},
                    {"id":"","name":"Blank","price":"10","quantity":1}
                ]"#,
            )
            .unwrap();
        let store = CartStore::load(storage, CART_KEY, Debouncer::DEFAULT_WINDOW);
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_add_over_cart_limit_leaves_cart_unchanged() {
        let (mut store, _) = empty_store();
        let toasts = Arc::new(ToastQueue::default());
        store.subscribe(toasts.clone());
        store.add_item(&product("p1", "10"), 1);
        toasts.drain();

        store.add_item(&product("vault", "40000000000000000000000000000"), 2);
        store.add_item(&product("p1", "10"), u32::MAX);

        assert_eq!(store.items().len(), 1);
        assert_eq!(store.count(), 1);
        assert_eq!(store.total(), dec("10.00"));
        assert_eq!(store.snapshot().total, dec("10.00"));
        assert!(toasts.drain().is_empty());
    }

    #[test]
    fn test_update_over_cart_limit_keeps_quantity() {
        let (mut store, _) = empty_store();
        store.add_item(&product("p1", "1000000000"), 2);
        store.update_quantity(&ProductId::new("p1"), u32::MAX);

        assert_eq!(store.count(), 2);
        assert_eq!(store.total(), dec("2000000000.00"));
    }

    #[test]
    fn test_hydration_drops_lines_over_cart_limit() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set(
                CART_KEY,
                r#"[
                    {"id":"p1","name":"Tote","price":"10","quantity":1},
                    {"id":"vault","name":"Vault","price":"40000000000000000000000000000","quantity":2}
                ]"#,
            )
            .unwrap();
        let store = CartStore::load(storage, CART_KEY, Debouncer::DEFAULT_WINDOW);

        assert_eq!(store.items().len(), 1);
        assert_eq!(store.snapshot().total, dec("10.00"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_mutations_writes_once() {
        let counting = Arc::new(CountingStore::default());
        let mut store = CartStore::load(counting.clone(), CART_KEY, Debouncer::DEFAULT_WINDOW);

        store.add_item(&product("p1", "10"), 1);
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.add_item(&product("p2", "5"), 1);
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.update_quantity(&ProductId::new("p1"), 3);
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.remove_item(&ProductId::new("p2"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.add_item(&product("p3", "1"), 2);
        assert!(store.debouncer.is_pending());
        assert_eq!(counting.writes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(counting.writes.load(Ordering::SeqCst), 1);

        let persisted = counting.last.lock().unwrap().clone().unwrap();
        let lines: Vec<CartLineItem> = serde_json::from_str(&persisted).unwrap();
        assert_eq!(lines, store.items());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_keeps_memory_state() {
        let mut store = CartStore::load(Arc::new(BrokenStore), CART_KEY, Debouncer::DEFAULT_WINDOW);
        store.add_item(&product("p1", "10"), 2);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let (mut store, storage) = empty_store();
        store.add_item(&product("p1", "10"), 1);
        assert!(storage.get(CART_KEY).unwrap().is_none());

        store.flush().unwrap().await.unwrap();
        assert!(!store.debouncer.is_pending());
        let reloaded = CartStore::load(storage, CART_KEY, Debouncer::DEFAULT_WINDOW);
        assert_eq!(reloaded.items(), store.items());
    }

    #[test]
    fn test_flush_without_runtime_writes_inline() {
        let (mut store, storage) = empty_store();
        store.add_item(&product("p1", "10"), 1);
        storage.remove(CART_KEY).unwrap();

        assert!(store.flush().is_none());
        assert!(storage.get(CART_KEY).unwrap().is_some());
    }

    #[test]
    fn test_empty_cart_removes_stored_key() {
        let (mut store, storage) = empty_store();
        store.add_item(&product("p1", "10"), 1);
        store.flush();
        assert!(storage.get(CART_KEY).unwrap().is_some());

        store.clear();
        store.flush();
        assert!(storage.get(CART_KEY).unwrap().is_none());
        assert!(CartStore::load(storage, CART_KEY, Debouncer::DEFAULT_WINDOW).is_empty());
    }

    #[test]
    fn test_stale_write_does_not_replace_newer_one() {
        let storage = Arc::new(MemoryStore::new());
        let writer = CartWriter {
            storage: storage.clone(),
            key: CART_KEY.to_string(),
            taken: AtomicU64::new(0),
            stored: Mutex::new(0),
        };
        let older = writer.next_generation();
        let newer = writer.next_generation();

        writer.write(newer, "[\"newer\"]");
        writer.write(older, "[\"older\"]");
        assert_eq!(storage.get(CART_KEY).unwrap().as_deref(), Some("[\"newer\"]"));
    }
}
