use common::Role;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{Value, json};
use server::entity::rating;
use uuid::Uuid;

use crate::common::{TestApp, routes};

fn ids(list: &Value) -> Vec<String> {
    list["documents"]
        .as_array()
        .expect("documents array")
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect()
}

mod submission {
    use super::*;

    #[tokio::test]
    async fn student_upload_starts_pending() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;

        let doc = app.submit(&student, &campus, "Calculus Notes").await;

        assert_eq!(doc["approval_state"], "pending");
        assert_eq!(doc["author_id"], student.id.to_string());
        assert_eq!(doc["category"], "Calculus I");
        assert_eq!(doc["file_type"], "pdf");
        assert_eq!(doc["filename"], "notes.pdf");
        assert_eq!(doc["content_type"], "application/pdf");
        assert_eq!(doc["downloads"], 0);
        assert!(doc["approved_by"].is_null());
        assert_eq!(app.stored_objects().len(), 1);
    }

    #[tokio::test]
    async fn professor_upload_is_published_immediately() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let professor = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;

        let doc = app.submit(&professor, &campus, "Lecture 1").await;

        assert_eq!(doc["approval_state"], "approved");
        assert_eq!(doc["approved_by"], professor.id.to_string());
        assert!(doc["approved_at"].is_string());
    }

    #[tokio::test]
    async fn first_upload_provisions_a_profile() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let guest = app.anonymous_principal();

        let doc = app.submit(&guest, &campus, "Guest Notes").await;

        assert_eq!(doc["approval_state"], "pending");
        let scope = app.get_with_token(routes::SESSION, &guest.token).await;
        assert_eq!(scope.body["role"], "generic");
    }

    #[tokio::test]
    async fn missing_fields_are_listed_together() {
        let app = TestApp::spawn().await;
        let student = app.create_principal(Role::Student, None).await;

        let res = app
            .upload(
                &student.token,
                &[("description", "Only a description".to_string())],
                None,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
        assert_eq!(
            res.body["fields"],
            json!(["title", "university_id", "category", "file_type", "file"])
        );
        assert!(app.stored_objects().is_empty());
    }

    #[tokio::test]
    async fn year_range_and_tags_are_normalized() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;

        let res = app
            .upload(
                &student.token,
                &[
                    ("title", "Past Exam".to_string()),
                    ("university_id", campus.university_id.to_string()),
                    ("category", "Exams".to_string()),
                    ("file_type", "PDF".to_string()),
                    ("year", "2023/2024".to_string()),
                    ("tags", r#"["exam", "Exam", " finals "]"#.to_string()),
                ],
                Some(("exam.pdf", b"%PDF".to_vec())),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["publication_year"], 2023);
        assert_eq!(res.body["file_type"], "pdf");
        assert_eq!(res.body["category"], "Exams");
        assert_eq!(res.body["tags"], json!(["exam", "finals"]));
    }

    #[tokio::test]
    async fn invalid_year_is_rejected_before_storing() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app.create_principal(Role::Student, None).await;

        let res = app
            .upload(
                &student.token,
                &[
                    ("title", "Old".to_string()),
                    ("university_id", campus.university_id.to_string()),
                    ("category", "History".to_string()),
                    ("file_type", "pdf".to_string()),
                    ("year", "1850".to_string()),
                ],
                Some(("old.pdf", b"%PDF".to_vec())),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
        assert!(app.stored_objects().is_empty());
    }

    #[tokio::test]
    async fn course_of_another_university_is_rejected() {
        let app = TestApp::spawn().await;
        let north = app.create_campus("north").await;
        let south = app.create_campus("south").await;
        let student = app.create_principal(Role::Student, None).await;

        let res = app
            .upload(
                &student.token,
                &[
                    ("title", "Mixed".to_string()),
                    ("university_id", north.university_id.to_string()),
                    ("course_id", south.course_id.to_string()),
                    ("category", "Misc".to_string()),
                    ("file_type", "pdf".to_string()),
                ],
                Some(("mixed.pdf", b"%PDF".to_vec())),
            )
            .await;

        assert_eq!(res.status, 400);
        assert!(app.stored_objects().is_empty());
    }

    #[tokio::test]
    async fn path_traversal_filenames_are_rejected() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app.create_principal(Role::Student, None).await;

        let res = app
            .upload(
                &student.token,
                &[
                    ("title", "Sneaky".to_string()),
                    ("university_id", campus.university_id.to_string()),
                    ("category", "Misc".to_string()),
                    ("file_type", "pdf".to_string()),
                ],
                Some(("..", b"%PDF".to_vec())),
            )
            .await;

        assert_eq!(res.status, 400);
        assert!(app.stored_objects().is_empty());
    }

    #[tokio::test]
    async fn upload_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app
            .client
            .post(app.url(routes::DOCUMENTS))
            .multipart(reqwest::multipart::Form::new().text("title", "x"))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 401);
    }
}

mod browsing {
    use super::*;

    #[tokio::test]
    async fn listing_only_shows_approved_documents() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;
        let professor = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;

        let pending = app.submit(&student, &campus, "Draft").await;
        let approved = app.submit(&professor, &campus, "Published").await;

        let res = app.get_without_token(routes::DOCUMENTS).await;

        assert_eq!(res.status, 200);
        let listed = ids(&res.body);
        assert_eq!(listed, vec![approved["id"].as_str().unwrap().to_string()]);
        assert!(!listed.contains(&pending["id"].as_str().unwrap().to_string()));
        assert_eq!(res.body["total"], 1);
    }

    #[tokio::test]
    async fn listing_filters_by_text_and_university() {
        let app = TestApp::spawn().await;
        let north = app.create_campus("north").await;
        let south = app.create_campus("south").await;
        let north_prof = app
            .create_principal(Role::Professor, Some(north.university_id))
            .await;
        let south_prof = app
            .create_principal(Role::Professor, Some(south.university_id))
            .await;

        let linear = app.submit(&north_prof, &north, "Linear Algebra").await;
        app.submit(&north_prof, &north, "Thermodynamics").await;
        let south_doc = app.submit(&south_prof, &south, "Linear Programming").await;

        let res = app
            .get_without_token(&format!("{}?q=LINEAR", routes::DOCUMENTS))
            .await;
        let mut found = ids(&res.body);
        found.sort();
        let mut expected = vec![
            linear["id"].as_str().unwrap().to_string(),
            south_doc["id"].as_str().unwrap().to_string(),
        ];
        expected.sort();
        assert_eq!(found, expected);

        let res = app
            .get_without_token(&format!(
                "{}?q=linear&university_id={}",
                routes::DOCUMENTS,
                north.university_id
            ))
            .await;
        assert_eq!(ids(&res.body), vec![linear["id"].as_str().unwrap().to_string()]);
    }

    #[tokio::test]
    async fn listing_paginates_newest_first() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let professor = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;

        let mut created = Vec::new();
        for i in 0..3 {
            let doc = app.submit(&professor, &campus, &format!("Doc {i}")).await;
            created.push(doc["id"].as_str().unwrap().to_string());
        }

        let res = app
            .get_without_token(&format!("{}?limit=2&offset=1", routes::DOCUMENTS))
            .await;

        assert_eq!(ids(&res.body), vec![created[1].clone(), created[0].clone()]);
    }

    #[tokio::test]
    async fn mine_includes_pending_documents() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;
        let other = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;

        let own = app.submit(&student, &campus, "My Draft").await;
        app.submit(&other, &campus, "Not Mine").await;

        let res = app.get_with_token(routes::MINE, &student.token).await;

        assert_eq!(res.status, 200);
        assert_eq!(ids(&res.body), vec![own["id"].as_str().unwrap().to_string()]);
    }

    #[tokio::test]
    async fn recent_and_popular_skip_unapproved() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;
        let professor = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;

        app.submit(&student, &campus, "Draft").await;
        let published = app.submit(&professor, &campus, "Published").await;
        let published_id = published["id"].as_str().unwrap().to_string();

        let recent = app.get_without_token(routes::RECENT).await;
        assert_eq!(ids(&recent.body), vec![published_id.clone()]);

        let popular = app.get_without_token(routes::POPULAR).await;
        assert_eq!(ids(&popular.body), vec![published_id]);
    }

    #[tokio::test]
    async fn viewing_counts_views() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let professor = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;
        let doc = app.submit(&professor, &campus, "Published").await;
        let id = doc["id"].as_str().unwrap();

        app.get_without_token(&routes::document(id)).await;
        let res = app.get_without_token(&routes::document(id)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["views"], 2);
    }

    #[tokio::test]
    async fn pending_documents_are_hidden_from_strangers() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;
        let stranger = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;
        let director = app
            .create_principal(Role::Director, Some(campus.university_id))
            .await;
        let doc = app.submit(&student, &campus, "Draft").await;
        let id = doc["id"].as_str().unwrap();

        let res = app.get_without_token(&routes::document(id)).await;
        assert_eq!(res.status, 404);

        let res = app.get_with_token(&routes::document(id), &stranger.token).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.code(), "NOT_FOUND");

        let res = app.get_with_token(&routes::document(id), &student.token).await;
        assert_eq!(res.status, 200);

        let res = app.get_with_token(&routes::document(id), &director.token).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids() {
        let app = TestApp::spawn().await;

        let res = app
            .get_without_token(&routes::document(uuid::Uuid::now_v7()))
            .await;
        assert_eq!(res.status, 404);

        let res = app.get_without_token(&routes::document("not-a-uuid")).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }
}

mod downloads {
    use super::*;

    #[tokio::test]
    async fn download_returns_signed_url_and_counts() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let professor = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;
        let reader = app.create_principal(Role::Student, None).await;
        let doc = app.submit(&professor, &campus, "Published").await;
        let id = doc["id"].as_str().unwrap();

        let res = app.get_with_token(&routes::download(id), &reader.token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["filename"], "notes.pdf");
        let url = res.body["url"].as_str().unwrap();
        assert!(url.contains("signature="));
        assert!(url.contains("expires="));

        let res = app.get_without_token(&routes::document(id)).await;
        assert_eq!(res.body["downloads"], 1);
    }

    #[tokio::test]
    async fn download_requires_a_token() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let professor = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;
        let doc = app.submit(&professor, &campus, "Published").await;

        let res = app
            .get_without_token(&routes::download(doc["id"].as_str().unwrap()))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn concurrent_downloads_are_all_counted() {
        const N: usize = 20;

        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let professor = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;
        let doc = app.submit(&professor, &campus, "Hot").await;
        let id = doc["id"].as_str().unwrap();

        let url = routes::download(id);
        let requests = (0..N).map(|_| app.get_with_token(&url, &professor.token));
        let responses = futures::future::join_all(requests).await;
        assert!(responses.iter().all(|r| r.status == 200));

        let res = app.get_without_token(&routes::document(id)).await;
        assert_eq!(res.body["downloads"], N as i64);
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn author_deletes_document_and_file() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;
        let doc = app.submit(&student, &campus, "Mistake").await;
        let id = doc["id"].as_str().unwrap();

        let res = app.delete_with_token(&routes::document(id), &student.token).await;

        assert_eq!(res.status, 204, "{}", res.text);
        assert!(app.stored_objects().is_empty());
        let res = app.get_with_token(&routes::document(id), &student.token).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn deleting_removes_ratings() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let professor = app
            .create_principal(Role::Professor, Some(campus.university_id))
            .await;
        let rater = app.create_principal(Role::Student, None).await;
        let doc = app.submit(&professor, &campus, "Rated").await;
        let id = doc["id"].as_str().unwrap();
        let res = app
            .put_with_token(&routes::rating(id), &json!({ "stars": 4 }), &rater.token)
            .await;
        assert_eq!(res.status, 200);

        let res = app.delete_with_token(&routes::document(id), &professor.token).await;

        assert_eq!(res.status, 204, "{}", res.text);
        let doc_id: Uuid = id.parse().unwrap();
        let left = rating::Entity::find()
            .filter(rating::Column::DocumentId.eq(doc_id))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[tokio::test]
    async fn other_students_cannot_delete() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let author = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;
        let other = app
            .create_principal(Role::Student, Some(campus.university_id))
            .await;
        let doc = app.submit(&author, &campus, "Mine").await;

        let res = app
            .delete_with_token(&routes::document(doc["id"].as_str().unwrap()), &other.token)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "NOT_AUTHORIZED");
        assert_eq!(app.stored_objects().len(), 1);
    }

    #[tokio::test]
    async fn director_deletes_student_work_of_own_university_only() {
        let app = TestApp::spawn().await;
        let north = app.create_campus("north").await;
        let south = app.create_campus("south").await;
        let student = app
            .create_principal(Role::Student, Some(north.university_id))
            .await;
        let professor = app
            .create_principal(Role::Professor, Some(north.university_id))
            .await;
        let north_director = app
            .create_principal(Role::Director, Some(north.university_id))
            .await;
        let south_director = app
            .create_principal(Role::Director, Some(south.university_id))
            .await;

        let student_doc = app.submit(&student, &north, "Student Work").await;
        let student_doc = student_doc["id"].as_str().unwrap();
        let professor_doc = app.submit(&professor, &north, "Professor Work").await;
        let professor_doc = professor_doc["id"].as_str().unwrap();

        let res = app
            .delete_with_token(&routes::document(student_doc), &south_director.token)
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "SCOPE_MISMATCH");

        let res = app
            .delete_with_token(&routes::document(professor_doc), &north_director.token)
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "NOT_AUTHORIZED");

        let res = app
            .delete_with_token(&routes::document(student_doc), &north_director.token)
            .await;
        assert_eq!(res.status, 204);
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let app = TestApp::spawn().await;
        let campus = app.create_campus("north").await;
        let student = app.create_principal(Role::Student, None).await;
        let doc = app.submit(&student, &campus, "Once").await;
        let id = doc["id"].as_str().unwrap();

        let res = app.delete_with_token(&routes::document(id), &student.token).await;
        assert_eq!(res.status, 204);
        let res = app.delete_with_token(&routes::document(id), &student.token).await;
        assert_eq!(res.status, 404);
    }
}
