//! The acting user behind a request or an import run.

use shopmap_core::UserId;

use super::Shop;

/// Who is performing an operation.
///
/// Authentication happens upstream; this type only carries the outcome so
/// ownership checks never reach for ambient "current user" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    /// A regular, non-admin user.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    /// An administrator.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// Whether this actor may view, edit or delete `shop`.
    #[must_use]
    pub fn can_manage(&self, shop: &Shop) -> bool {
        self.is_admin || shop.user_id == self.user_id
    }

    /// Owner filter for listings: `None` means every shop is visible.
    #[must_use]
    pub const fn listing_scope(&self) -> Option<UserId> {
        if self.is_admin {
            None
        } else {
            Some(self.user_id)
        }
    }
}
