use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::Role;
use common::storage::filesystem::FilesystemObjectStore;
use common::storage::{ObjectStore, UrlSigner};
use reqwest::Client;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

use server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, DocumentsConfig, LeaderboardConfig,
    ProfileDefaults, ReconcileConfig, ServerConfig, StorageConfig,
};
use server::entity::{course, profile, subject, university};
use server::services::aggregation::LiveAggregator;
use server::services::gateway::DocumentStoreGateway;
use server::state::AppState;
use server::utils::jwt;

pub const JWT_SECRET: &str = "test-secret-for-integration-tests";
const SIGNING_SECRET: &str = "test-signing-secret";

pub mod routes {
    use std::fmt::Display;

    pub const SESSION: &str = "/api/v1/session";
    pub const DOCUMENTS: &str = "/api/v1/documents";
    pub const POPULAR: &str = "/api/v1/documents/popular";
    pub const RECENT: &str = "/api/v1/documents/recent";
    pub const MINE: &str = "/api/v1/documents/mine";
    pub const LEADERBOARD: &str = "/api/v1/leaderboard";
    pub const DIRECTOR_STATS: &str = "/api/v1/director/stats";
    pub const DIRECTOR_DOCUMENTS: &str = "/api/v1/director/documents";
    pub const DIRECTOR_PROFESSORS: &str = "/api/v1/director/professors";

    pub fn document(id: impl Display) -> String {
        format!("/api/v1/documents/{id}")
    }

    pub fn download(id: impl Display) -> String {
        format!("/api/v1/documents/{id}/download")
    }

    pub fn moderation(id: impl Display) -> String {
        format!("/api/v1/documents/{id}/moderation")
    }

    pub fn rating(id: impl Display) -> String {
        format!("/api/v1/documents/{id}/rating")
    }

    pub fn file(key: &str) -> String {
        format!("/api/v1/files/{key}")
    }
}

/// A running test server backed by in-memory SQLite and a temp directory.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub storage: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.expect("Failed to read response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    /// `code` of an error body.
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

/// A principal with a profile and a valid token.
pub struct Principal {
    pub id: Uuid,
    pub token: String,
}

/// A university with one course and one subject.
pub struct Campus {
    pub university_id: i32,
    pub course_id: i32,
    pub subject_id: i32,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_store(|store| Arc::new(store)).await
    }

    /// Spawn with the filesystem store wrapped by `wrap`, e.g. to inject faults.
    pub async fn spawn_with_store<F>(wrap: F) -> Self
    where
        F: FnOnce(FilesystemObjectStore) -> Arc<dyn ObjectStore>,
    {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        // Every connection to `:memory:` is a separate database.
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opts)
            .await
            .expect("Failed to open in-memory database");
        server::database::create_schema(&db)
            .await
            .expect("Failed to create schema");
        server::seed::ensure_indexes(&db)
            .await
            .expect("Failed to create indexes");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        let storage = tempfile::tempdir().expect("Failed to create storage dir");
        let storage_config = StorageConfig {
            base_path: storage.path().to_path_buf(),
            public_base_url: format!("http://{addr}/api/v1/files"),
            signing_secret: SIGNING_SECRET.to_string(),
            max_upload_size: 1024 * 1024,
            timeout_secs: 5,
            ..Default::default()
        };

        let store = FilesystemObjectStore::new(
            storage_config.base_path.clone(),
            storage_config.max_upload_size,
            UrlSigner::new(SIGNING_SECRET, storage_config.public_base_url.clone()),
        )
        .await
        .expect("Failed to create object store");
        let gateway = DocumentStoreGateway::new(
            wrap(store),
            Duration::from_secs(storage_config.timeout_secs),
            storage_config.signed_url_ttl_secs,
        );

        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig::default(),
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                connect_timeout_secs: 8,
                acquire_timeout_secs: 8,
                query_timeout_secs: 10,
            },
            auth: AuthConfig {
                jwt_secret: JWT_SECRET.to_string(),
            },
            storage: storage_config,
            documents: DocumentsConfig::default(),
            profile: ProfileDefaults::default(),
            leaderboard: LeaderboardConfig::default(),
            reconcile: ReconcileConfig {
                enabled: false,
                ..Default::default()
            },
        };

        let state = AppState {
            aggregator: Arc::new(LiveAggregator::new(db.clone())),
            db: db.clone(),
            config,
            gateway,
        };

        let app = server::build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            storage,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// A gateway over the same directory as the server's store, without faults.
    pub async fn healthy_gateway(&self) -> DocumentStoreGateway {
        let store = FilesystemObjectStore::new(
            self.storage.path().to_path_buf(),
            1024 * 1024,
            UrlSigner::new(SIGNING_SECRET, format!("http://{}/api/v1/files", self.addr)),
        )
        .await
        .expect("Failed to create object store");
        DocumentStoreGateway::new(Arc::new(store), Duration::from_secs(5), 60)
    }

    /// Relative paths of every stored object.
    pub fn stored_objects(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_files(self.storage.path(), self.storage.path(), &mut found);
        found
    }

    pub async fn create_campus(&self, name: &str) -> Campus {
        let uni = university::ActiveModel {
            name: Set(name.to_string()),
            code: Set(name.to_uppercase()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert university");

        let course = course::ActiveModel {
            name: Set(format!("{name} Engineering")),
            code: Set("ENG".to_string()),
            university_id: Set(uni.id),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert course");

        let subject = subject::ActiveModel {
            name: Set("Calculus I".to_string()),
            code: Set("CALC1".to_string()),
            course_id: Set(course.id),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert subject");

        Campus {
            university_id: uni.id,
            course_id: course.id,
            subject_id: subject.id,
        }
    }

    pub async fn create_principal(&self, role: Role, university_id: Option<i32>) -> Principal {
        self.create_principal_with_points(role, university_id, 0)
            .await
    }

    pub async fn create_principal_with_points(
        &self,
        role: Role,
        university_id: Option<i32>,
        points: i32,
    ) -> Principal {
        let id = Uuid::now_v7();
        let email = format!("{}@uni.test", id.simple());
        profile::ActiveModel {
            id: Set(id),
            email: Set(email.clone()),
            full_name: Set(format!("{role} {}", &id.simple().to_string()[24..])),
            role: Set(role),
            university_id: Set(university_id),
            course_id: Set(None),
            points: Set(points),
            level: Set(1),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert profile");

        Principal {
            id,
            token: self.token_for(id, &email),
        }
    }

    /// A valid token for a principal that has no profile yet.
    pub fn anonymous_principal(&self) -> Principal {
        let id = Uuid::now_v7();
        Principal {
            id,
            token: self.token_for(id, &format!("guest.{}@mail.test", id.simple())),
        }
    }

    fn token_for(&self, id: Uuid, email: &str) -> String {
        jwt::sign(id, email, JWT_SECRET, chrono::Duration::hours(1))
            .expect("Failed to sign token")
    }

    /// Upload a document with the usual fields, asserting success.
    pub async fn submit(&self, author: &Principal, campus: &Campus, title: &str) -> Value {
        let res = self
            .upload(
                &author.token,
                &[
                    ("title", title.to_string()),
                    ("university_id", campus.university_id.to_string()),
                    ("course_id", campus.course_id.to_string()),
                    ("subject_id", campus.subject_id.to_string()),
                    ("file_type", "pdf".to_string()),
                ],
                Some(("notes.pdf", b"%PDF-1.4 test".to_vec())),
            )
            .await;
        assert_eq!(res.status, 201, "Upload failed: {}", res.text);
        res.body
    }

    pub async fn upload(
        &self,
        token: &str,
        fields: &[(&str, String)],
        file: Option<(&str, Vec<u8>)>,
    ) -> TestResponse {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.to_string(), value.clone());
        }
        if let Some((file_name, bytes)) = file {
            let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
            form = form.part("file", part);
        }

        let res = self
            .client
            .post(self.url(routes::DOCUMENTS))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Approve or reject a document as `director`, asserting success.
    pub async fn moderate(&self, director: &Principal, id: &str, approve: bool) -> Value {
        let res = self
            .post_with_token(
                &routes::moderation(id),
                &serde_json::json!({ "approve": approve }),
                &director.token,
            )
            .await;
        assert_eq!(res.status, 200, "Moderation failed: {}", res.text);
        res.body
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn put_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PUT request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }
}

fn collect_files(root: &Path, dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, found);
        } else if let Ok(relative) = path.strip_prefix(root) {
            if !relative.starts_with(".tmp") {
                found.push(relative.to_path_buf());
            }
        }
    }
}
