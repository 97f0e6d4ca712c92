//! User persistence.
//!
//! [`UserStore`] is the seam handlers talk to. The bundled
//! [`InMemoryUserStore`] keeps everything in process memory; a database-backed
//! implementation plugs in behind the same trait.

mod memory;

pub use memory::InMemoryUserStore;

use crate::error::StoreError;
use crate::models::{NewUser, User};
use uuid::Uuid;

/// Conflict message when an email is taken at signup.
pub const EMAIL_REGISTERED: &str = "Email already registered";
/// Conflict message when a username is taken at signup.
pub const USERNAME_TAKEN: &str = "Username already taken";
/// Conflict message when an update would reuse another user's email.
pub const EMAIL_IN_USE: &str = "Email already in use";
/// Conflict message when an update would reuse another user's username.
pub const USERNAME_IN_USE: &str = "Username already in use";

/// CRUD, listing and leaderboard queries over user accounts.
///
/// Every lookup reports a missing record as [`StoreError::NotFound`], distinct
/// from [`StoreError::Backend`].
pub trait UserStore: Send + Sync {
    /// Inserts a user. Fails with [`StoreError::Conflict`] if the email or
    /// username is already registered.
    fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    fn get_by_id(&self, id: Uuid) -> Result<User, StoreError>;

    fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    fn get_by_username(&self, username: &str) -> Result<User, StoreError>;

    /// Replaces the stored record with `user`, bumping `updated_at`.
    fn update(&self, user: User) -> Result<User, StoreError>;

    fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Users in creation order.
    fn list(&self, limit: u64, offset: u64) -> Result<Vec<User>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;

    /// Users ordered by `last_place_count`, highest first.
    fn leaderboard(&self, limit: u64, offset: u64) -> Result<Vec<User>, StoreError>;
}
