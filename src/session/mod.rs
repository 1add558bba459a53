//! Work sessions and the artifacts captured during them
//!
//! [`SessionManager`] owns the session lifecycle; [`ArtifactGuard`] gates every
//! write to notes and photos on the session being live and owned by the caller.

pub mod guard;
pub mod manager;

pub use guard::{ArtifactGuard, AttachedPhoto, PhotoTarget};
pub use manager::{SessionEvent, SessionManager};

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{Block, BlockContent, Manual, ManualStatus, Role, User};
    use crate::store::Store;

    pub struct Fixture {
        pub store: Store,
        pub worker: User,
        pub other_worker: User,
        pub admin: User,
        pub superadmin: User,
        pub outsider: User,
        pub manual: Manual,
        pub text_block: Block,
        pub photo_block: Block,
    }

    /// One business with a published manual of two blocks and a user per level
    pub async fn fixture() -> Fixture {
        let store = Store::connect("sqlite::memory:", 1)
            .await
            .expect("Failed to create in-memory database");

        let business = store.create_business("Harbor Cafe").await.unwrap();
        let worker = store
            .create_user("Wes", "wes@example.com", false)
            .await
            .unwrap();
        let other_worker = store
            .create_user("Olga", "olga@example.com", false)
            .await
            .unwrap();
        let admin = store
            .create_user("Ada", "ada@example.com", false)
            .await
            .unwrap();
        let superadmin = store
            .create_user("Root", "root@example.com", true)
            .await
            .unwrap();
        let outsider = store
            .create_user("Nobody", "nobody@example.com", false)
            .await
            .unwrap();

        for (user, role) in [
            (&worker, Role::Worker),
            (&other_worker, Role::Worker),
            (&admin, Role::Admin),
        ] {
            store.grant_access(user.id, business.id, role).await.unwrap();
        }

        let manual = store
            .create_manual(business.id, "Espresso machine cleaning", false)
            .await
            .unwrap();
        let manual = store
            .set_manual_status(manual.id, ManualStatus::Published)
            .await
            .unwrap();
        let text_block = store
            .add_block(
                manual.id,
                BlockContent::Text {
                    body: "Backflush each group head".to_string(),
                },
            )
            .await
            .unwrap();
        let photo_block = store
            .add_block(
                manual.id,
                BlockContent::PhotoRecord {
                    instructions: "Photograph the clean drip tray".to_string(),
                },
            )
            .await
            .unwrap();

        Fixture {
            store,
            worker,
            other_worker,
            admin,
            superadmin,
            outsider,
            manual,
            text_block,
            photo_block,
        }
    }
}
