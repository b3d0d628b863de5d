//! Cart ownership reconciliation.
//!
//! Listens to auth transitions and keeps the active cart bound to the right
//! owner:
//!
//! - **guest → user**: the guest cart is saved, the user's cart is loaded,
//!   and a non-empty guest cart is merged into it (user lines win on
//!   conflicts, quantities add up). The guest record is then discarded.
//! - **user → guest**: the user's cart is saved and a fresh guest identity
//!   with an empty cart becomes active. The guest identity is recorded so a
//!   later login can merge whatever was added in between.
//!
//! Transitions run inside the cart's update queue, so they see a consistent
//! snapshot and are never interleaved with item mutations.

use std::sync::Arc;

use tracing::{debug, info};

use secure_store_core::{Cart, GuestId, OwnerId, UserId};

use crate::auth::{AuthManager, AuthPhase, AuthState};
use crate::cart::{CartManager, CartState, delete_cart, persist_cart, restore_cart};
use crate::observable::SubscriptionId;
use crate::storage::{TwoTierStorage, keys};

/// Keeps the active cart's owner in sync with the session.
#[derive(Debug)]
pub struct Reconciler {
    cart: Arc<CartManager>,
    storage: TwoTierStorage,
}

impl Reconciler {
    #[must_use]
    pub const fn new(cart: Arc<CartManager>, storage: TwoTierStorage) -> Self {
        Self { cart, storage }
    }

    /// Subscribe to `auth` so every session change is reconciled.
    pub fn attach(this: &Arc<Self>, auth: &AuthManager) -> SubscriptionId {
        let reconciler = Arc::clone(this);
        auth.subscribe(move |state| reconciler.on_auth_changed(state))
    }

    /// React to a session snapshot.
    ///
    /// An authenticating session without a cached identity is left alone
    /// until the profile arrives.
    pub fn on_auth_changed(&self, auth: &AuthState) {
        match (auth.phase(), auth.user()) {
            (AuthPhase::Anonymous, _) => self.switch_to_guest(),
            (_, Some(user)) => self.switch_to_user(user.id.clone()),
            (_, None) => debug!("Waiting for profile before switching carts"),
        }
    }

    /// Make `user`'s cart active, merging any pending guest cart into it.
    pub fn switch_to_user(&self, user: UserId) {
        let storage = self.storage.clone();
        let target = OwnerId::User(user);

        self.cart.transition(move |current| {
            if current.owner == target {
                return None;
            }

            if !current.cart.is_empty() {
                persist_cart(&storage, &current.owner, &current.cart);
            }

            let mut cart = restore_cart(&storage, &target);

            let pending = storage
                .read(keys::PENDING_GUEST)
                .and_then(|value| GuestId::parse(&value))
                .or_else(|| current.owner.as_guest().cloned());

            if let Some(guest) = pending {
                let guest_owner = OwnerId::Guest(guest);
                let guest_cart = if guest_owner == current.owner {
                    current.cart.clone()
                } else {
                    restore_cart(&storage, &guest_owner)
                };

                if !guest_cart.is_empty() {
                    info!(
                        guest_items = guest_cart.len(),
                        user_items = cart.len(),
                        "Merging guest cart into user cart"
                    );
                    cart.merge(&guest_cart);
                }

                delete_cart(&storage, &guest_owner);
                storage.delete(keys::PENDING_GUEST);
            }

            persist_cart(&storage, &target, &cart);
            Some(CartState {
                owner: target,
                cart,
            })
        });
    }

    /// Save the user's cart and start a fresh guest cart.
    pub fn switch_to_guest(&self) {
        let storage = self.storage.clone();

        self.cart.transition(move |current| {
            if current.owner.is_guest() {
                return None;
            }

            persist_cart(&storage, &current.owner, &current.cart);

            let guest = GuestId::generate();
            storage.write(keys::PENDING_GUEST, guest.as_str());

            Some(CartState {
                owner: OwnerId::Guest(guest),
                cart: Cart::new(),
            })
        });
    }
}

/// The owner whose cart should be active at startup.
///
/// A session with a known user activates that user's cart. Otherwise the
/// recorded guest identity is reused, or a new one is generated and recorded.
#[must_use]
pub fn initial_owner(storage: &TwoTierStorage, auth: &AuthState) -> OwnerId {
    if let Some(user) = auth.user() {
        return OwnerId::User(user.id.clone());
    }

    let guest = storage
        .read(keys::PENDING_GUEST)
        .and_then(|value| GuestId::parse(&value))
        .unwrap_or_else(|| {
            let guest = GuestId::generate();
            storage.write(keys::PENDING_GUEST, guest.as_str());
            guest
        });
    OwnerId::Guest(guest)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use secure_store_core::{Price, Product, ProductId, Role, UserIdentity};

    use super::*;
    use crate::storage::tests::memory_pair;

    fn product(id: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::from_cents(cents).unwrap(),
            image: None,
        }
    }

    fn setup() -> (Arc<CartManager>, Reconciler, TwoTierStorage) {
        let (_session, _durable, storage) = memory_pair();
        let owner = initial_owner(&storage, &AuthState::anonymous());
        let cart = Arc::new(CartManager::new(owner, storage.clone()));
        let reconciler = Reconciler::new(Arc::clone(&cart), storage.clone());
        (cart, reconciler, storage)
    }

    fn signed_in(id: &str) -> AuthState {
        AuthState::authenticated(
            "token",
            UserIdentity::new(UserId::new(id), "ann", Role::User),
        )
    }

    #[test]
    fn test_initial_owner_records_guest() {
        let (_session, _durable, storage) = memory_pair();
        let first = initial_owner(&storage, &AuthState::anonymous());
        let second = initial_owner(&storage, &AuthState::anonymous());

        assert!(first.is_guest());
        assert_eq!(first, second);
    }

    #[test]
    fn test_login_merges_guest_cart_into_user_cart() {
        let (cart, reconciler, storage) = setup();
        let user = OwnerId::User(UserId::new("u1"));

        let mut saved = Cart::new();
        saved.add(product("a", 1000));
        persist_cart(&storage, &user, &saved);

        cart.add_item(product("a", 1000));
        cart.add_item(product("b", 500));
        let guest = cart.owner();

        reconciler.on_auth_changed(&signed_in("u1"));

        let state = cart.snapshot();
        assert_eq!(state.owner, user);
        assert_eq!(state.cart.quantities()[&ProductId::new("a")], 2);
        assert_eq!(state.cart.quantities()[&ProductId::new("b")], 1);
        assert_eq!(state.view().total, Decimal::new(2500, 2));

        assert!(storage.read(&keys::cart(&guest)).is_none());
        assert!(storage.read(keys::PENDING_GUEST).is_none());
        assert_eq!(restore_cart(&storage, &user), state.cart);
    }

    #[test]
    fn test_login_with_empty_guest_cart_keeps_user_cart() {
        let (cart, reconciler, storage) = setup();
        let user = OwnerId::User(UserId::new("u1"));

        let mut saved = Cart::new();
        saved.add(product("a", 1000));
        persist_cart(&storage, &user, &saved);

        reconciler.on_auth_changed(&signed_in("u1"));

        assert_eq!(cart.snapshot().cart, saved);
    }

    #[test]
    fn test_logout_saves_user_cart_and_starts_empty_guest() {
        let (cart, reconciler, storage) = setup();
        reconciler.on_auth_changed(&signed_in("u1"));
        cart.add_item(product("a", 1000));

        reconciler.on_auth_changed(&AuthState::anonymous());

        let state = cart.snapshot();
        assert!(state.owner.is_guest());
        assert!(state.cart.is_empty());
        assert_eq!(
            storage.read(keys::PENDING_GUEST).as_deref(),
            state.owner.as_guest().map(GuestId::as_str)
        );
        assert_eq!(
            restore_cart(&storage, &OwnerId::User(UserId::new("u1"))).count(),
            1
        );
    }

    #[test]
    fn test_guest_items_added_after_logout_merge_on_next_login() {
        let (cart, reconciler, _storage) = setup();
        reconciler.on_auth_changed(&signed_in("u1"));
        cart.add_item(product("a", 1000));
        reconciler.on_auth_changed(&AuthState::anonymous());

        cart.add_item(product("b", 200));
        reconciler.on_auth_changed(&signed_in("u1"));

        let quantities = cart.snapshot().cart.quantities();
        assert_eq!(quantities.len(), 2);
        assert_eq!(quantities[&ProductId::new("a")], 1);
        assert_eq!(quantities[&ProductId::new("b")], 1);
    }

    #[test]
    fn test_switching_users_does_not_leak_carts() {
        let (cart, reconciler, storage) = setup();
        reconciler.on_auth_changed(&signed_in("u1"));
        cart.add_item(product("a", 1000));

        reconciler.on_auth_changed(&signed_in("u2"));

        assert!(cart.snapshot().cart.is_empty());
        assert_eq!(
            restore_cart(&storage, &OwnerId::User(UserId::new("u1"))).count(),
            1
        );
    }

    #[test]
    fn test_repeated_snapshots_are_idempotent() {
        let (cart, reconciler, _storage) = setup();
        cart.add_item(product("a", 1000));

        reconciler.on_auth_changed(&signed_in("u1"));
        reconciler.on_auth_changed(&signed_in("u1"));

        assert_eq!(cart.count(), 1);
    }

    #[test]
    fn test_authenticating_without_identity_waits() {
        let (cart, reconciler, _storage) = setup();
        let before = cart.owner();

        reconciler.on_auth_changed(&AuthState::authenticating("token", None));

        assert_eq!(cart.owner(), before);
    }
}
