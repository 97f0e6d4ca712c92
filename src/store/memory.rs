use super::{UserStore, EMAIL_IN_USE, EMAIL_REGISTERED, USERNAME_IN_USE, USERNAME_TAKEN};
use crate::error::StoreError;
use crate::models::{NewUser, User};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

/// Process-local [`UserStore`].
///
/// A single read-write lock keeps the email and username uniqueness checks
/// atomic with the insert or update that depends on them.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, User>>, StoreError> {
        self.users
            .read()
            .map_err(|_| StoreError::Backend("user store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, User>>, StoreError> {
        self.users
            .write()
            .map_err(|_| StoreError::Backend("user store lock poisoned".into()))
    }

    fn find<P>(&self, predicate: P) -> Result<User, StoreError>
    where
        P: Fn(&User) -> bool,
    {
        self.read()?
            .values()
            .find(|user| predicate(user))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn page<K, F>(&self, limit: u64, offset: u64, key: F) -> Result<Vec<User>, StoreError>
    where
        K: Ord,
        F: Fn(&User) -> K,
    {
        let users = self.read()?;
        let mut sorted: Vec<&User> = users.values().collect();
        sorted.sort_by_key(|user| key(user));

        Ok(sorted
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl UserStore for InMemoryUserStore {
    fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.write()?;

        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict(EMAIL_REGISTERED));
        }
        if users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Conflict(USERNAME_TAKEN));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            bio: new_user.bio,
            profile_picture: None,
            last_place_count: 0,
            created_at: now,
            updated_at: now,
        };

        users.insert(user.id, user.clone());
        debug!(user_id = %user.id, "Created user");
        Ok(user)
    }

    fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.read()?.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.find(|user| user.email == email)
    }

    fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.find(|user| user.username == username)
    }

    fn update(&self, mut user: User) -> Result<User, StoreError> {
        let mut users = self.write()?;

        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        for other in users.values().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(StoreError::Conflict(EMAIL_IN_USE));
            }
            if other.username == user.username {
                return Err(StoreError::Conflict(USERNAME_IN_USE));
            }
        }

        user.updated_at = Utc::now();
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        match self.write()?.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    fn list(&self, limit: u64, offset: u64) -> Result<Vec<User>, StoreError> {
        self.page(limit, offset, |user| (user.created_at, user.id))
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.len() as u64)
    }

    fn leaderboard(&self, limit: u64, offset: u64) -> Result<Vec<User>, StoreError> {
        self.page(limit, offset, |user| {
            (std::cmp::Reverse(user.last_place_count), user.username.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            bio: None,
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("ada@example.com", "ada")).unwrap();

        assert_eq!(store.get_by_id(user.id).unwrap().username, "ada");
        assert_eq!(store.get_by_email("ada@example.com").unwrap().id, user.id);
        assert_eq!(store.get_by_username("ada").unwrap().id, user.id);
        assert_eq!(store.get_by_username("bob"), Err(StoreError::NotFound));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicates_conflict() {
        let store = InMemoryUserStore::new();
        store.create(new_user("ada@example.com", "ada")).unwrap();

        assert_eq!(
            store.create(new_user("ada@example.com", "other")),
            Err(StoreError::Conflict(EMAIL_REGISTERED))
        );
        assert_eq!(
            store.create(new_user("other@example.com", "ada")),
            Err(StoreError::Conflict(USERNAME_TAKEN))
        );
    }

    #[test]
    fn test_update_checks_other_users() {
        let store = InMemoryUserStore::new();
        let ada = store.create(new_user("ada@example.com", "ada")).unwrap();
        store.create(new_user("bob@example.com", "bob")).unwrap();

        let mut renamed = ada.clone();
        renamed.username = "bob".into();
        assert_eq!(store.update(renamed), Err(StoreError::Conflict(USERNAME_IN_USE)));

        let mut same = ada.clone();
        same.bio = Some("hello".into());
        let updated = store.update(same).unwrap();
        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert!(updated.updated_at >= ada.updated_at);
    }

    #[test]
    fn test_delete() {
        let store = InMemoryUserStore::new();
        let ada = store.create(new_user("ada@example.com", "ada")).unwrap();

        store.delete(ada.id).unwrap();
        assert_eq!(store.delete(ada.id), Err(StoreError::NotFound));
        assert_eq!(store.update(ada), Err(StoreError::NotFound));
    }

    #[test]
    fn test_leaderboard_order_and_paging() {
        let store = InMemoryUserStore::new();
        for (i, name) in ["ann", "ben", "cat", "dan"].iter().enumerate() {
            let mut user = store
                .create(new_user(&format!("{name}@example.com"), name))
                .unwrap();
            user.last_place_count = (i as i64 % 2) * 10 + i as i64;
            store.update(user).unwrap();
        }

        let names: Vec<String> = store
            .leaderboard(10, 0)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, ["dan", "ben", "cat", "ann"]);

        let second_page = store.leaderboard(2, 2).unwrap();
        assert_eq!(second_page.len(), 2);
        assert_eq!(second_page[0].username, "cat");

        assert_eq!(store.list(10, 0).unwrap().len(), 4);
        assert!(store.list(10, 4).unwrap().is_empty());
    }
}
