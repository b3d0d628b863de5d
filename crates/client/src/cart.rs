//! The active cart and its persistence.
//!
//! [`CartManager`] holds exactly one active cart, bound to one [`OwnerId`].
//! Every mutation writes the cart to both storage namespaces under
//! `cart.<owner>` before subscribers see the new snapshot. Ownership changes
//! are driven by [`crate::reconcile::Reconciler`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use secure_store_core::{Cart, CartItem, CartView, OwnerId, Product, ProductId};

use crate::observable::{Observable, SubscriptionId};
use crate::storage::{TwoTierStorage, keys};

/// Snapshot of the active cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartState {
    /// Who the cart belongs to.
    pub owner: OwnerId,
    /// The items.
    pub cart: Cart,
}

impl CartState {
    /// Derived totals.
    #[must_use]
    pub fn view(&self) -> CartView {
        self.cart.view()
    }
}

/// On-disk record of a cart.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCart {
    owner: OwnerId,
    items: Cart,
    saved_at: DateTime<Utc>,
}

/// Write `cart` under `owner`'s key in both namespaces.
pub(crate) fn persist_cart(storage: &TwoTierStorage, owner: &OwnerId, cart: &Cart) {
    let record = PersistedCart {
        owner: owner.clone(),
        items: cart.clone(),
        saved_at: Utc::now(),
    };
    storage.write_json(&keys::cart(owner), &record);
}

/// Load the cart stored for `owner`, or an empty one.
pub(crate) fn restore_cart(storage: &TwoTierStorage, owner: &OwnerId) -> Cart {
    storage
        .read_json::<PersistedCart>(&keys::cart(owner))
        .map(|record| record.items)
        .unwrap_or_default()
}

/// Remove the cart stored for `owner`.
pub(crate) fn delete_cart(storage: &TwoTierStorage, owner: &OwnerId) {
    storage.delete(&keys::cart(owner));
}

/// Owns the active cart.
pub struct CartManager {
    state: Observable<CartState>,
    storage: TwoTierStorage,
}

impl CartManager {
    /// Activate `owner`'s persisted cart.
    #[must_use]
    pub fn new(owner: OwnerId, storage: TwoTierStorage) -> Self {
        let cart = restore_cart(&storage, &owner);
        debug!(owner = %owner_label(&owner), items = cart.len(), "Restored cart");
        Self {
            state: Observable::new(CartState { owner, cart }),
            storage,
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CartState> {
        self.state.get()
    }

    /// The active owner.
    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.state.get().owner.clone()
    }

    /// The items in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.state.get().cart.items().to_vec()
    }

    #[must_use]
    pub fn view(&self) -> CartView {
        self.state.get().view()
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        self.state.get().cart.total()
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.state.get().cart.count()
    }

    /// Add one unit of `product`.
    pub fn add_item(&self, product: Product) {
        self.mutate(move |cart| {
            cart.add(product);
            true
        });
    }

    /// Set a line's quantity. A quantity of zero or less removes the line;
    /// unknown products are ignored.
    pub fn update_quantity(&self, id: &ProductId, quantity: i64) {
        let id = id.clone();
        self.mutate(move |cart| cart.set_quantity(&id, quantity));
    }

    /// Remove a line. Unknown products are ignored.
    pub fn remove_item(&self, id: &ProductId) {
        let id = id.clone();
        self.mutate(move |cart| cart.remove(&id));
    }

    /// Empty the cart.
    pub fn clear(&self) {
        self.mutate(Cart::clear);
    }

    /// Register for cart changes.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&Arc<CartState>) + Send + Sync + 'static,
    {
        self.state.subscribe(f)
    }

    /// Register for derived-view changes.
    ///
    /// Called on every cart change with the recomputed totals.
    pub fn subscribe_view<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(CartView) + Send + Sync + 'static,
    {
        self.state.subscribe(move |state| f(state.view()))
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    /// Load the cart stored for any owner without activating it.
    #[must_use]
    pub fn restore(&self, owner: &OwnerId) -> Cart {
        restore_cart(&self.storage, owner)
    }

    /// Write the active cart to storage.
    pub fn persist(&self) {
        let state = self.state.get();
        persist_cart(&self.storage, &state.owner, &state.cart);
    }

    /// Apply an ownership transition. Returning `None` leaves the state and
    /// subscribers untouched.
    pub(crate) fn transition<F>(&self, f: F)
    where
        F: FnOnce(&CartState) -> Option<CartState> + Send + 'static,
    {
        self.state.update_if(move |current| {
            let next = f(current)?;
            info!(
                from = %owner_label(&current.owner),
                to = %owner_label(&next.owner),
                items = next.cart.len(),
                "Switched active cart"
            );
            Some(next)
        });
    }

    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut Cart) -> bool + Send + 'static,
    {
        let storage = self.storage.clone();
        self.state.update_if(move |current| {
            let mut next = current.clone();
            if !f(&mut next.cart) {
                return None;
            }
            persist_cart(&storage, &next.owner, &next.cart);
            Some(next)
        });
    }
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// `guest` or `user:<id>`, so guest identities stay out of the logs.
pub(crate) fn owner_label(owner: &OwnerId) -> String {
    match owner {
        OwnerId::Guest(_) => "guest".to_string(),
        OwnerId::User(id) => format!("user:{id}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parking_lot::Mutex;
    use secure_store_core::{GuestId, Price, UserId};

    use super::*;
    use crate::storage::Storage;
    use crate::storage::tests::memory_pair;

    fn product(id: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::from_cents(cents).unwrap(),
            image: None,
        }
    }

    fn guest_manager() -> (CartManager, TwoTierStorage) {
        let (_session, _durable, storage) = memory_pair();
        let owner = OwnerId::Guest(GuestId::generate());
        (CartManager::new(owner, storage.clone()), storage)
    }

    #[test]
    fn test_add_and_view() {
        let (manager, _storage) = guest_manager();
        manager.add_item(product("a", 1000));
        manager.add_item(product("a", 1000));
        manager.add_item(product("b", 500));
        manager.update_quantity(&ProductId::new("b"), 3);

        let view = manager.view();
        assert_eq!(view.total, Decimal::new(3500, 2));
        assert_eq!(view.count, 5);
        assert_eq!(manager.items().len(), 2);
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let (manager, storage) = guest_manager();
        let owner = manager.owner();

        manager.add_item(product("a", 1000));
        assert_eq!(restore_cart(&storage, &owner).count(), 1);

        manager.update_quantity(&ProductId::new("a"), 4);
        assert_eq!(restore_cart(&storage, &owner).count(), 4);

        manager.remove_item(&ProductId::new("a"));
        assert!(restore_cart(&storage, &owner).is_empty());
    }

    #[test]
    fn test_round_trip_restores_items() {
        let (_session, durable, storage) = memory_pair();
        let owner = OwnerId::User(UserId::new("u1"));
        let manager = CartManager::new(owner.clone(), storage.clone());
        manager.add_item(product("a", 1250));
        manager.add_item(product("b", 99));
        manager.update_quantity(&ProductId::new("b"), 2);

        storage.primary().clear().unwrap();
        let restored = CartManager::new(owner, storage);

        assert_eq!(restored.items(), manager.items());
        assert!(durable.get("cart.u1").unwrap().is_some());
    }

    #[test]
    fn test_update_quantity_to_zero_removes_line() {
        let (manager, _storage) = guest_manager();
        manager.add_item(product("a", 1000));
        manager.update_quantity(&ProductId::new("a"), 0);
        assert!(manager.items().is_empty());

        manager.add_item(product("a", 1000));
        manager.update_quantity(&ProductId::new("a"), -3);
        assert!(manager.items().is_empty());
    }

    #[test]
    fn test_noops_do_not_notify() {
        let (manager, _storage) = guest_manager();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        manager.subscribe(move |_| *counter.lock() += 1);

        manager.remove_item(&ProductId::new("missing"));
        manager.update_quantity(&ProductId::new("missing"), 2);
        assert_eq!(*calls.lock(), 0);

        manager.add_item(product("a", 100));
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (manager, storage) = guest_manager();
        let owner = manager.owner();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        manager.add_item(product("a", 100));
        manager.subscribe(move |_| *counter.lock() += 1);

        manager.clear();
        assert!(manager.items().is_empty());
        assert!(restore_cart(&storage, &owner).is_empty());

        manager.clear();
        assert!(manager.items().is_empty());
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_view_subscribers_get_recomputed_totals() {
        let (manager, _storage) = guest_manager();
        let views = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&views);
        manager.subscribe_view(move |view| log.lock().push(view.count));

        manager.add_item(product("a", 100));
        manager.add_item(product("a", 100));
        manager.clear();

        assert_eq!(*views.lock(), vec![1, 2, 0]);
    }

    #[test]
    fn test_corrupt_record_restores_empty() {
        let (_session, _durable, storage) = memory_pair();
        let owner = OwnerId::User(UserId::new("u1"));
        storage.write(&keys::cart(&owner), "{not json");

        let manager = CartManager::new(owner, storage);
        assert!(manager.items().is_empty());
    }
}
