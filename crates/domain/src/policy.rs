//! Authorization policy.
//!
//! Pure predicates over the acting user and the touched entity. Enforcement
//! happens at the service boundary, not in a presentation layer.

use store::{Order, OrderUpdate, User};

/// Returns true for admin users.
pub fn is_admin(user: &User) -> bool {
    user.role.is_admin()
}

/// Returns true if the user owns the order.
pub fn owns_order(user: &User, order: &Order) -> bool {
    order.user.id == user.id
}

/// Admins see every order; everyone else only their own.
pub fn can_view_all_orders(user: &User) -> bool {
    is_admin(user)
}

/// Status changes are admin-only; notes-only updates are also allowed for
/// the order's owner.
pub fn can_update_order(actor: &User, order: &Order, update: &OrderUpdate) -> bool {
    if update.status.is_some() {
        return is_admin(actor);
    }
    is_admin(actor) || owns_order(actor, order)
}

/// Only admins may delete orders.
pub fn can_delete_order(actor: &User) -> bool {
    is_admin(actor)
}

/// Only admins may create, update or delete products and assignments.
pub fn can_manage_catalog(actor: &User) -> bool {
    is_admin(actor)
}
