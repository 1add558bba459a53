//! Access resolver
//!
//! Computes the [`PermissionLevel`] of a user within a business from two
//! collaborators: a user lookup and a business-access lookup.

use std::future::Future;
use uuid::Uuid;

use super::permission::{AccessDescriptor, PermissionLevel};
use crate::error::Result;
use crate::models::{BusinessAccess, User};

/// Finds users by id
pub trait UserLookup: Send + Sync {
    fn find_user(&self, user_id: Uuid) -> impl Future<Output = Result<Option<User>>> + Send;
}

/// Finds the role grant of a user within a business
pub trait AccessLookup: Send + Sync {
    fn find_access(
        &self,
        user_id: Uuid,
        business_id: Uuid,
    ) -> impl Future<Output = Result<Option<BusinessAccess>>> + Send;
}

/// Resolves permission levels. Unknown users and businesses degrade to
/// [`PermissionLevel::None`]; an `Err` only ever carries a storage failure.
#[derive(Clone)]
pub struct AccessResolver<U, A> {
    users: U,
    access: A,
}

impl<U: UserLookup, A: AccessLookup> AccessResolver<U, A> {
    pub fn new(users: U, access: A) -> Self {
        Self { users, access }
    }

    /// Permission level of `user_id` within `business_id`.
    ///
    /// `is_active` is deliberately not consulted here; rejecting deactivated
    /// users is the authentication layer's job.
    pub async fn resolve(&self, user_id: Uuid, business_id: Uuid) -> Result<PermissionLevel> {
        let Some(user) = self.users.find_user(user_id).await? else {
            return Ok(PermissionLevel::None);
        };

        // Superadmins never touch the access store.
        if user.is_super_admin {
            return Ok(PermissionLevel::SuperAdmin);
        }

        let level = self
            .access
            .find_access(user_id, business_id)
            .await?
            .map(|grant| PermissionLevel::from_role(grant.role))
            .unwrap_or(PermissionLevel::None);

        Ok(level)
    }

    /// Level for operations not scoped to a business: `SuperAdmin` or `None`
    pub async fn resolve_global(&self, user_id: Uuid) -> Result<PermissionLevel> {
        let level = match self.users.find_user(user_id).await? {
            Some(user) if user.is_super_admin => PermissionLevel::SuperAdmin,
            _ => PermissionLevel::None,
        };
        Ok(level)
    }

    /// UI projection of [`Self::resolve`]
    pub async fn describe_access(
        &self,
        user_id: Uuid,
        business_id: Uuid,
    ) -> Result<AccessDescriptor> {
        let level = self.resolve(user_id, business_id).await?;
        Ok(AccessDescriptor::from(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default, Clone)]
    struct Directory {
        users: HashMap<Uuid, User>,
        grants: HashMap<(Uuid, Uuid), Role>,
        access_calls: Arc<AtomicUsize>,
    }

    impl Directory {
        fn add_user(&mut self, is_super_admin: bool, is_active: bool) -> Uuid {
            let id = Uuid::new_v4();
            self.users.insert(
                id,
                User {
                    id,
                    name: "Test".to_string(),
                    email: format!("{}@example.com", id),
                    is_super_admin,
                    is_active,
                    created_at: Utc::now(),
                },
            );
            id
        }

        fn grant(&mut self, user_id: Uuid, business_id: Uuid, role: Role) {
            self.grants.insert((user_id, business_id), role);
        }

        fn resolver(&self) -> AccessResolver<Directory, Directory> {
            AccessResolver::new(self.clone(), self.clone())
        }
    }

    impl UserLookup for Directory {
        async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
            Ok(self.users.get(&user_id).cloned())
        }
    }

    impl AccessLookup for Directory {
        async fn find_access(
            &self,
            user_id: Uuid,
            business_id: Uuid,
        ) -> Result<Option<BusinessAccess>> {
            self.access_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .grants
                .get(&(user_id, business_id))
                .map(|role| BusinessAccess {
                    user_id,
                    business_id,
                    role: *role,
                    created_at: Utc::now(),
                }))
        }
    }

    #[tokio::test]
    async fn test_superadmin_skips_access_lookup() {
        let mut dir = Directory::default();
        let admin = dir.add_user(true, true);
        let resolver = dir.resolver();

        for _ in 0..5 {
            let level = resolver.resolve(admin, Uuid::new_v4()).await.unwrap();
            assert_eq!(level, PermissionLevel::SuperAdmin);
        }
        assert_eq!(dir.access_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_none() {
        let dir = Directory::default();
        let resolver = dir.resolver();

        for _ in 0..3 {
            let level = resolver.resolve(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
            assert_eq!(level, PermissionLevel::None);
        }
    }

    #[tokio::test]
    async fn test_role_is_scoped_to_business() {
        let mut dir = Directory::default();
        let user = dir.add_user(false, true);
        let business_a = Uuid::new_v4();
        let business_b = Uuid::new_v4();
        dir.grant(user, business_a, Role::Admin);
        let resolver = dir.resolver();

        assert_eq!(
            resolver.resolve(user, business_a).await.unwrap(),
            PermissionLevel::Admin
        );
        assert_eq!(
            resolver.resolve(user, business_b).await.unwrap(),
            PermissionLevel::None
        );
    }

    #[tokio::test]
    async fn test_worker_role() {
        let mut dir = Directory::default();
        let user = dir.add_user(false, true);
        let business = Uuid::new_v4();
        dir.grant(user, business, Role::Worker);

        let level = dir.resolver().resolve(user, business).await.unwrap();
        assert_eq!(level, PermissionLevel::Worker);
    }

    #[tokio::test]
    async fn test_inactive_user_still_resolves() {
        let mut dir = Directory::default();
        let user = dir.add_user(false, false);
        let business = Uuid::new_v4();
        dir.grant(user, business, Role::Worker);

        let level = dir.resolver().resolve(user, business).await.unwrap();
        assert_eq!(level, PermissionLevel::Worker);
    }

    #[tokio::test]
    async fn test_resolve_global() {
        let mut dir = Directory::default();
        let superadmin = dir.add_user(true, true);
        let admin = dir.add_user(false, true);
        dir.grant(admin, Uuid::new_v4(), Role::Admin);
        let resolver = dir.resolver();

        assert_eq!(
            resolver.resolve_global(superadmin).await.unwrap(),
            PermissionLevel::SuperAdmin
        );
        assert_eq!(
            resolver.resolve_global(admin).await.unwrap(),
            PermissionLevel::None
        );
        assert_eq!(dir.access_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_describe_access_consistent_with_resolve() {
        let mut dir = Directory::default();
        let superadmin = dir.add_user(true, true);
        let worker = dir.add_user(false, true);
        let business = Uuid::new_v4();
        dir.grant(worker, business, Role::Worker);
        let resolver = dir.resolver();

        for user in [superadmin, worker, Uuid::new_v4()] {
            for target in [business, Uuid::new_v4()] {
                let level = resolver.resolve(user, target).await.unwrap();
                let described = resolver.describe_access(user, target).await.unwrap();
                assert_eq!(described, AccessDescriptor::from(level));
                assert_eq!(described.has_access, level != PermissionLevel::None);
            }
        }

        let described = resolver.describe_access(worker, business).await.unwrap();
        assert_eq!(described.role, Some(Role::Worker));
        assert!(!described.is_super_admin);
    }
}
