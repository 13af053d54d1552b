use std::sync::Arc;

use async_trait::async_trait;
use common::Role;
use common::storage::filesystem::FilesystemObjectStore;
use common::storage::{BoxReader, ObjectKey, ObjectStore, StorageError};
use sea_orm::{ConnectionTrait, DbBackend, EntityTrait, PaginatorTrait, Statement};

use server::entity::{compensation_log, document};
use server::services::reconcile::{ACTION_REMOVE_OBJECT, reconcile_once};

use crate::common::{TestApp, routes};

/// Filesystem store whose deletes always fail.
struct UndeletableStore(FilesystemObjectStore);

#[async_trait]
impl ObjectStore for UndeletableStore {
    async fn put(
        &self,
        key: &ObjectKey,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.0.put(key, data, content_type).await
    }

    async fn get_stream(&self, key: &ObjectKey) -> Result<BoxReader, StorageError> {
        self.0.get_stream(key).await
    }

    async fn delete(&self, _key: &ObjectKey) -> Result<bool, StorageError> {
        Err(StorageError::Backend("store unavailable".into()))
    }

    fn public_url(&self, key: &ObjectKey) -> String {
        self.0.public_url(key)
    }

    async fn presign_get(&self, key: &ObjectKey, ttl_secs: u32) -> Result<String, StorageError> {
        self.0.presign_get(key, ttl_secs).await
    }

    fn verify_presigned(&self, key: &ObjectKey, expires: i64, signature: &str) -> bool {
        self.0.verify_presigned(key, expires, signature)
    }
}

/// Filesystem store that refuses every write.
struct UnwritableStore(FilesystemObjectStore);

#[async_trait]
impl ObjectStore for UnwritableStore {
    async fn put(&self, _: &ObjectKey, _: Vec<u8>, _: &str) -> Result<(), StorageError> {
        Err(StorageError::Backend("bucket is read-only".into()))
    }

    async fn get_stream(&self, key: &ObjectKey) -> Result<BoxReader, StorageError> {
        self.0.get_stream(key).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        self.0.delete(key).await
    }

    fn public_url(&self, key: &ObjectKey) -> String {
        self.0.public_url(key)
    }

    async fn presign_get(&self, key: &ObjectKey, ttl_secs: u32) -> Result<String, StorageError> {
        self.0.presign_get(key, ttl_secs).await
    }
}

async fn spawn_undeletable() -> TestApp {
    TestApp::spawn_with_store(|store| Arc::new(UndeletableStore(store))).await
}

async fn drop_document_table(app: &TestApp) {
    app.db
        .execute_raw(Statement::from_string(
            DbBackend::Sqlite,
            "DROP TABLE document".to_string(),
        ))
        .await
        .expect("Failed to drop document table");
}

#[tokio::test]
async fn failed_store_write_creates_no_document() {
    let app = TestApp::spawn_with_store(|store| Arc::new(UnwritableStore(store))).await;
    let campus = app.create_campus("north").await;
    let student = app
        .create_principal(Role::Student, Some(campus.university_id))
        .await;

    let res = app
        .upload(
            &student.token,
            &[
                ("title", "Unsaved".to_string()),
                ("university_id", campus.university_id.to_string()),
                ("category", "Misc".to_string()),
                ("file_type", "pdf".to_string()),
            ],
            Some(("unsaved.pdf", b"%PDF".to_vec())),
        )
        .await;

    assert_eq!(res.status, 502, "{}", res.text);
    assert_eq!(res.code(), "STORAGE_ERROR");
    let documents = document::Entity::find().count(&app.db).await.unwrap();
    assert_eq!(documents, 0);
    let queued = compensation_log::Entity::find().count(&app.db).await.unwrap();
    assert_eq!(queued, 0);
}

#[tokio::test]
async fn failed_insert_removes_the_stored_object() {
    let app = TestApp::spawn().await;
    let campus = app.create_campus("north").await;
    let student = app
        .create_principal(Role::Student, Some(campus.university_id))
        .await;
    drop_document_table(&app).await;

    let res = app
        .upload(
            &student.token,
            &[
                ("title", "Lost".to_string()),
                ("university_id", campus.university_id.to_string()),
                ("category", "Misc".to_string()),
                ("file_type", "pdf".to_string()),
            ],
            Some(("lost.pdf", b"%PDF".to_vec())),
        )
        .await;

    assert_eq!(res.status, 500, "{}", res.text);
    assert_eq!(res.code(), "PERSISTENCE_ERROR");
    assert!(app.stored_objects().is_empty());
}

#[tokio::test]
async fn failed_insert_cleanup_is_queued_when_store_refuses() {
    let app = spawn_undeletable().await;
    let campus = app.create_campus("north").await;
    let student = app
        .create_principal(Role::Student, Some(campus.university_id))
        .await;
    drop_document_table(&app).await;

    let res = app
        .upload(
            &student.token,
            &[
                ("title", "Orphan".to_string()),
                ("university_id", campus.university_id.to_string()),
                ("category", "Misc".to_string()),
                ("file_type", "pdf".to_string()),
            ],
            Some(("orphan.pdf", b"%PDF".to_vec())),
        )
        .await;
    assert_eq!(res.status, 500);

    let entries = compensation_log::Entity::find().all(&app.db).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, ACTION_REMOVE_OBJECT);
    assert!(entries[0].document_id.is_none());
    assert!(!entries[0].resolved);
    assert_eq!(app.stored_objects().len(), 1);

    let report = reconcile_once(&app.db, &app.healthy_gateway().await, 10)
        .await
        .unwrap();
    assert_eq!(report.resolved, 1);
    assert!(app.stored_objects().is_empty());
}

#[tokio::test]
async fn delete_succeeds_when_file_removal_fails() {
    let app = spawn_undeletable().await;
    let campus = app.create_campus("north").await;
    let student = app
        .create_principal(Role::Student, Some(campus.university_id))
        .await;
    let doc = app.submit(&student, &campus, "Sticky").await;
    let id = doc["id"].as_str().unwrap();

    let res = app.delete_with_token(&routes::document(id), &student.token).await;

    assert_eq!(res.status, 204, "{}", res.text);
    let res = app.get_with_token(&routes::document(id), &student.token).await;
    assert_eq!(res.status, 404);

    let entries = compensation_log::Entity::find().all(&app.db).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].document_id.map(|d| d.to_string()).as_deref(), Some(id));
    assert_eq!(entries[0].attempts, 1);
}

#[tokio::test]
async fn reconciler_retries_until_the_store_recovers() {
    let app = spawn_undeletable().await;
    let campus = app.create_campus("north").await;
    let student = app
        .create_principal(Role::Student, Some(campus.university_id))
        .await;
    let doc = app.submit(&student, &campus, "Sticky").await;
    app.delete_with_token(&routes::document(doc["id"].as_str().unwrap()), &student.token)
        .await;
    assert_eq!(app.stored_objects().len(), 1);

    // Still failing: the attempt is counted and the entry stays open.
    let failing = server::services::gateway::DocumentStoreGateway::new(
        Arc::new(UndeletableStore(
            FilesystemObjectStore::new(
                app.storage.path().to_path_buf(),
                1024 * 1024,
                common::storage::UrlSigner::new("unused", "http://localhost"),
            )
            .await
            .unwrap(),
        )),
        std::time::Duration::from_secs(5),
        60,
    );
    let report = reconcile_once(&app.db, &failing, 10).await.unwrap();
    assert_eq!(report.failed, 1);
    let entry = compensation_log::Entity::find().one(&app.db).await.unwrap().unwrap();
    assert_eq!(entry.attempts, 2);
    assert!(!entry.resolved);

    let report = reconcile_once(&app.db, &app.healthy_gateway().await, 10)
        .await
        .unwrap();
    assert_eq!(report.resolved, 1);
    assert!(app.stored_objects().is_empty());

    let entry = compensation_log::Entity::find().one(&app.db).await.unwrap().unwrap();
    assert!(entry.resolved);
    assert!(entry.resolved_at.is_some());

    let report = reconcile_once(&app.db, &app.healthy_gateway().await, 10)
        .await
        .unwrap();
    assert_eq!(report.resolved + report.failed, 0);
}
