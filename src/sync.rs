// SPDX-License-Identifier: MPL-2.0

//! Replays offline submissions once connectivity returns.

use crate::api::{NewStory, StoryClient};
use crate::net::Fetch;
use crate::photo::PhotoFile;
use crate::state::SessionGate;
use crate::store::{MirrorDb, PendingStore, PendingUpload, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("pending queue unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    /// Still queued for the next pass
    pub failed: usize,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.synced == 0 && self.failed == 0
    }
}

pub struct SyncReconciler<F> {
    db: MirrorDb,
    client: Arc<StoryClient<F>>,
    session: Arc<SessionGate>,
    /// Held for a whole pass; the API does not deduplicate submissions
    draining: Mutex<()>,
}

impl<F: Fetch> SyncReconciler<F> {
    pub fn new(db: MirrorDb, client: Arc<StoryClient<F>>, session: Arc<SessionGate>) -> Self {
        Self {
            db,
            client,
            session,
            draining: Mutex::new(()),
        }
    }

    /// Resubmit every queued upload, oldest first, one at a time.
    ///
    /// An entry leaves the queue only when the server accepted it. A failing
    /// entry is left alone and the pass moves on; nothing is retried within
    /// the same pass. Without a session this does nothing.
    ///
    /// Passes never overlap. A caller arriving mid-pass waits for it and then
    /// reads the queue afresh, so it only sees what is still pending.
    pub async fn drain(&self) -> Result<SyncReport, SyncError> {
        let _pass = self.draining.lock().await;

        let Some(token) = self.session.token() else {
            debug!("no session, skipping pending upload sync");
            return Ok(SyncReport::default());
        };

        let queue = self.db.run(|db| PendingStore::new(db).all()).await?;
        if queue.is_empty() {
            return Ok(SyncReport::default());
        }

        info!(count = queue.len(), "syncing pending uploads");
        let mut report = SyncReport::default();

        for upload in queue {
            let id = upload.id;
            let story = match Self::rebuild(upload) {
                Ok(story) => story,
                Err(e) => {
                    warn!(id, "pending upload cannot be rebuilt: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            match self.client.create_story(&token, &story).await {
                Ok(_) => {
                    report.synced += 1;
                    match self.db.run(move |db| PendingStore::new(db).delete(id)).await {
                        Ok(_) => debug!(id, "pending upload synced"),
                        Err(e) => warn!(id, "synced upload could not be dequeued: {}", e),
                    }
                }
                Err(e) => {
                    warn!(id, "pending upload failed, keeping it queued: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(synced = report.synced, failed = report.failed, "sync pass finished");
        Ok(report)
    }

    fn rebuild(upload: PendingUpload) -> Result<NewStory, crate::photo::PhotoError> {
        Ok(NewStory {
            photo: PhotoFile::from_data_url(&upload.photo)?,
            description: upload.description,
            location: upload.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::LoginResult;
    use crate::net::{Body, Method, PartValue, StatusCode};
    use crate::state::{LocalStorage, SessionStorage};
    use crate::store::NewPendingUpload;
    use crate::testing::{ScriptedNetwork, pending_upload, temp_mirror, tiny_jpeg};
    use serde_json::json;
    use url::Url;

    fn signed_in() -> Arc<SessionGate> {
        let gate = SessionGate::new(LocalStorage::in_memory(), SessionStorage::new());
        gate.sign_in(
            &LoginResult {
                user_id: "user-1".into(),
                name: "Arif".into(),
                token: "tok".into(),
            },
            "arif@example.com",
        )
        .unwrap();
        Arc::new(gate)
    }

    fn reconciler(
        db: &MirrorDb,
        network: &Arc<ScriptedNetwork>,
        session: Arc<SessionGate>,
    ) -> SyncReconciler<Arc<ScriptedNetwork>> {
        let client = StoryClient::new(
            network.clone(),
            Url::parse("https://api.example.com/v1").unwrap(),
        );
        SyncReconciler::new(db.clone(), Arc::new(client), session)
    }

    fn created() -> serde_json::Value {
        json!({"error": false, "message": "Story created successfully"})
    }

    #[tokio::test]
    async fn test_drain_removes_only_confirmed_entries() {
        let (_dir, db) = temp_mirror();
        let pending = PendingStore::new(&db);
        pending.add(&pending_upload("first")).unwrap();
        pending.add(&pending_upload("second")).unwrap();
        pending.add(&pending_upload("third")).unwrap();

        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(Method::POST, "/v1/stories", StatusCode::CREATED, created());
        network.fail(Method::POST, "/v1/stories");
        network.reply_json(Method::POST, "/v1/stories", StatusCode::CREATED, created());

        let report = reconciler(&db, &network, signed_in())
            .drain()
            .await
            .unwrap();

        assert_eq!(report, SyncReport { synced: 2, failed: 1 });
        let left = pending.all().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].description, "second");
        // One attempt per entry
        assert_eq!(network.requests_to(Method::POST, "/v1/stories"), 3);
    }

    #[tokio::test]
    async fn test_failed_entries_are_not_duplicated() {
        let (_dir, db) = temp_mirror();
        let pending = PendingStore::new(&db);
        pending.add(&pending_upload("only")).unwrap();

        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(
            Method::POST,
            "/v1/stories",
            StatusCode::BAD_REQUEST,
            json!({"error": true, "message": "bad"}),
        );

        let sync = reconciler(&db, &network, signed_in());
        sync.drain().await.unwrap();
        sync.drain().await.unwrap();

        assert_eq!(pending.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resubmits_in_queue_order_with_original_photo() {
        let (_dir, db) = temp_mirror();
        let pending = PendingStore::new(&db);
        pending.add(&pending_upload("older")).unwrap();
        pending.add(&pending_upload("newer")).unwrap();

        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(Method::POST, "/v1/stories", StatusCode::CREATED, created());

        reconciler(&db, &network, signed_in())
            .drain()
            .await
            .unwrap();

        let descriptions: Vec<String> = network
            .requests()
            .iter()
            .filter_map(|r| match &r.body {
                Body::Multipart(parts) => match &parts[0].value {
                    PartValue::Text(text) => Some(text.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(descriptions, vec!["older", "newer"]);

        let Body::Multipart(parts) = &network.requests()[0].body else {
            panic!("expected multipart");
        };
        match &parts[1].value {
            PartValue::File {
                file_name, bytes, ..
            } => {
                assert_eq!(file_name, "upload.jpg");
                assert_eq!(bytes.as_ref(), tiny_jpeg().as_slice());
            }
            other => panic!("expected file part, got {other:?}"),
        }
        assert_eq!(network.requests()[0].bearer.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_unreadable_entry_does_not_block_queue() {
        let (_dir, db) = temp_mirror();
        let pending = PendingStore::new(&db);
        pending
            .add(&NewPendingUpload {
                photo: "not a data url".into(),
                ..pending_upload("broken")
            })
            .unwrap();
        pending.add(&pending_upload("fine")).unwrap();

        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(Method::POST, "/v1/stories", StatusCode::CREATED, created());

        let report = reconciler(&db, &network, signed_in())
            .drain()
            .await
            .unwrap();

        assert_eq!(report, SyncReport { synced: 1, failed: 1 });
        assert_eq!(pending.all().unwrap()[0].description, "broken");
    }

    #[tokio::test]
    async fn test_overlapping_drains_upload_each_entry_once() {
        let (_dir, db) = temp_mirror();
        PendingStore::new(&db).add(&pending_upload("only")).unwrap();

        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(Method::POST, "/v1/stories", StatusCode::CREATED, created());
        let gate = network.hold("/v1/stories");
        let sync = Arc::new(reconciler(&db, &network, signed_in()));

        let first = tokio::spawn({
            let sync = sync.clone();
            async move { sync.drain().await }
        });
        while network.requests_to(Method::POST, "/v1/stories") == 0 {
            tokio::task::yield_now().await;
        }

        let second = tokio::spawn({
            let sync = sync.clone();
            async move { sync.drain().await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(network.requests_to(Method::POST, "/v1/stories"), 1);
        assert_eq!(first.synced + second.synced, 1);
        assert!(second.is_empty());
        assert_eq!(PendingStore::new(&db).count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_no_session_means_no_work() {
        let (_dir, db) = temp_mirror();
        PendingStore::new(&db).add(&pending_upload("x")).unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        let guest = Arc::new(SessionGate::new(
            LocalStorage::in_memory(),
            SessionStorage::new(),
        ));

        let report = reconciler(&db, &network, guest).drain().await.unwrap();

        assert!(report.is_empty());
        assert!(network.requests().is_empty());
        assert_eq!(PendingStore::new(&db).count().unwrap(), 1);
    }
}
