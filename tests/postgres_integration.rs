//! Integration tests against a throwaway Postgres started with testcontainers.

use std::sync::Arc;

use actix_web::dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection};
use serde_json::{json, Value};
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

use prepdesk::config::AppConfig;
use prepdesk::db::models::User;
use prepdesk::db::schema::users;
use prepdesk::db::{self, DbPool};
use prepdesk::services::accounts::{issue_token, Role};
use prepdesk::services::interview::LlmClient;

const MIGRATIONS: &[&str] = &[
    include_str!("../migrations/2025-01-10-000000_create_users/up.sql"),
    include_str!("../migrations/2025-01-10-000100_create_catalog/up.sql"),
    include_str!("../migrations/2025-01-10-000200_create_quizzes/up.sql"),
    include_str!("../migrations/2025-01-10-000300_create_services/up.sql"),
];

struct TestDb {
    _container: ContainerAsync<Postgres>,
    config: Arc<AppConfig>,
    pool: DbPool,
}

async fn create_postgres_container() -> TestDb {
    let container = Postgres::default()
        .with_tag("16-alpine")
        .start()
        .await
        .expect("Failed to start Postgres container");

    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

    let mut conn = AsyncPgConnection::establish(&url)
        .await
        .expect("Failed to connect to Postgres");
    for sql in MIGRATIONS {
        conn.batch_execute(sql).await.expect("Failed to run migration");
    }

    let mut config = AppConfig::default();
    config.database.url = url.clone();
    config.auth.jwt_secret = "integration-secret".into();
    config.storage.upload_path = std::env::temp_dir()
        .join(format!("prepdesk-{}", Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();

    let pool = db::create_pool(&url, 4).unwrap();
    TestDb {
        _container: container,
        config: Arc::new(config),
        pool,
    }
}

fn app(
    db: &TestDb,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let llm = LlmClient::new(db.config.llm.clone()).unwrap();
    App::new()
        .app_data(web::Data::new(db.pool.clone()))
        .app_data(web::Data::from(db.config.clone()))
        .app_data(web::Data::new(llm))
        .configure(prepdesk::api::configure)
}

/// Inserts an account with `role` and returns its id and a bearer header.
async fn account(db: &TestDb, role: Role) -> (Uuid, (&'static str, String)) {
    let now = Utc::now().naive_utc();
    let id = Uuid::new_v4();
    let user = User {
        id,
        name: format!("{} {}", role, id.simple()),
        email: format!("{}@example.com", id.simple()),
        password_hash: "unused".into(),
        role: role.as_str().to_string(),
        created_at: now,
        updated_at: now,
    };
    let mut conn = db.pool.get().await.unwrap();
    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)
        .await
        .unwrap();

    let token = issue_token(&db.config.auth, id, role).unwrap();
    (id, ("Authorization", format!("Bearer {}", token)))
}

async fn send<S, R>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse, Error = actix_web::Error>,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

fn post(uri: &str, auth: &(&'static str, String), body: Value) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .insert_header(auth.clone())
        .set_json(body)
}

fn put(uri: &str, auth: &(&'static str, String), body: Value) -> test::TestRequest {
    test::TestRequest::put()
        .uri(uri)
        .insert_header(auth.clone())
        .set_json(body)
}

fn get(uri: &str) -> test::TestRequest {
    test::TestRequest::get().uri(uri)
}

fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().unwrap().to_string()
}

fn service_form(title: &str) -> (String, Vec<u8>) {
    let boundary = "prepdesk-form-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{t}\r\n--{b}--\r\n",
        b = boundary,
        t = title
    );
    (
        format!("multipart/form-data; boundary={}", boundary),
        body.into_bytes(),
    )
}

#[actix_web::test]
async fn quiz_questions_append_to_the_existing_video_entry() {
    let db = create_postgres_container().await;
    let app = test::init_service(app(&db)).await;
    let (_, admin) = account(&db, Role::Admin).await;

    let (_, course) = send(&app, post("/api/v1/courses", &admin, json!({ "name": "JavaScript" })).to_request()).await;
    let course_id = id_of(&course);
    let (_, channel) = send(
        &app,
        post("/api/v1/channels", &admin, json!({ "name": "Fireship", "courses": [course_id] })).to_request(),
    )
    .await;
    let channel_id = id_of(&channel);

    let mut playlists = Vec::new();
    for link in ["https://yt/list-a", "https://yt/list-b"] {
        let (status, body) = send(
            &app,
            post(
                "/api/v1/playlists",
                &admin,
                json!({ "type": "youtube", "link": link, "channelId": channel_id, "courseId": course_id }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        playlists.push(id_of(&body));
    }

    let (status, bulk) = send(
        &app,
        post(
            "/api/v1/videos/bulk",
            &admin,
            json!({
                "playlistId": playlists[0],
                "videos": [
                    { "title": "Closures", "link": "https://yt/1" },
                    { "title": "Hoisting", "link": "https://yt/2" }
                ]
            }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let first = bulk["data"][0]["id"].as_str().unwrap().to_string();
    let second = bulk["data"][1]["id"].as_str().unwrap().to_string();

    let add = |video_id: &str, question: &str| {
        post(
            "/api/v1/quizzes",
            &admin,
            json!({
                "playlistId": playlists[0],
                "channelName": "Fireship",
                "courseName": "JavaScript",
                "videoId": video_id,
                "videoTitle": "Closures",
                "questions": [{ "question": question, "options": ["a", "b"], "answer": "a" }]
            }),
        )
        .to_request()
    };

    let (status, created) = send(&app, add(&first, "first?")).await;
    assert_eq!(status, StatusCode::CREATED);
    let quiz_id = id_of(&created);

    let (_, appended) = send(&app, add(&first, "second?")).await;
    assert_eq!(id_of(&appended), quiz_id);
    let videos = appended["data"]["videos"].as_array().unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["questions"].as_array().unwrap().len(), 2);

    let (_, pushed) = send(&app, add(&second, "third?")).await;
    assert_eq!(id_of(&pushed), quiz_id);
    assert_eq!(pushed["data"]["videos"].as_array().unwrap().len(), 2);

    let (status, by_playlist) = send(
        &app,
        get(&format!("/api/v1/quizzes/playlist/{}", playlists[0])).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(id_of(&by_playlist), quiz_id);
    assert_eq!(by_playlist["data"]["videos"][0]["videoId"], first.as_str());

    // A video from another playlist cannot join this playlist's quiz.
    let (_, other) = send(
        &app,
        post(
            "/api/v1/videos",
            &admin,
            json!({ "title": "Elsewhere", "link": "https://yt/3", "playlistId": playlists[1] }),
        )
        .to_request(),
    )
    .await;
    let (status, _) = send(&app, add(&id_of(&other), "stray?")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // An answer outside the options is rejected before anything is written.
    let (status, _) = send(
        &app,
        post(
            "/api/v1/quizzes",
            &admin,
            json!({
                "playlistId": playlists[0],
                "channelName": "Fireship",
                "courseName": "JavaScript",
                "videoId": first,
                "videoTitle": "Closures",
                "questions": [{ "question": "?", "options": ["a", "b"], "answer": "z" }]
            }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn membership_sync_is_visible_from_both_sides() {
    let db = create_postgres_container().await;
    let app = test::init_service(app(&db)).await;
    let (_, admin) = account(&db, Role::Admin).await;

    let (_, a) = send(&app, post("/api/v1/courses", &admin, json!({ "name": "DSA" })).to_request()).await;
    let (_, b) = send(&app, post("/api/v1/courses", &admin, json!({ "name": "System Design" })).to_request()).await;
    let (course_a, course_b) = (id_of(&a), id_of(&b));

    let (status, channel) = send(
        &app,
        post("/api/v1/channels", &admin, json!({ "name": "NeetCode", "courses": [course_a] })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let channel_id = id_of(&channel);

    let (_, a) = send(&app, get(&format!("/api/v1/courses/{}", course_a)).to_request()).await;
    assert_eq!(a["data"]["channels"], json!([channel_id]));

    // Channel side: move from A to B.
    let (status, moved) = send(
        &app,
        put(&format!("/api/v1/channels/{}", channel_id), &admin, json!({ "courses": [course_b] })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["data"]["courses"], json!([course_b]));
    let (_, a) = send(&app, get(&format!("/api/v1/courses/{}", course_a)).to_request()).await;
    assert_eq!(a["data"]["channels"], json!([]));
    let (_, b) = send(&app, get(&format!("/api/v1/courses/{}", course_b)).to_request()).await;
    assert_eq!(b["data"]["channels"], json!([channel_id]));

    // Course side: clearing B's channels detaches the channel.
    let (status, _) = send(
        &app,
        put(&format!("/api/v1/courses/{}", course_b), &admin, json!({ "channels": [] })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, channel) = send(&app, get(&format!("/api/v1/channels/{}", channel_id)).to_request()).await;
    assert_eq!(channel["data"]["courses"], json!([]));

    // An unknown course rolls the whole create back.
    let (status, _) = send(
        &app,
        post("/api/v1/channels", &admin, json!({ "name": "Ghost", "courses": [Uuid::new_v4()] })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, list) = send(&app, get("/api/v1/channels").to_request()).await;
    assert_eq!(list["data"]["meta"]["total"], 1);

    let (status, _) = send(
        &app,
        post("/api/v1/courses", &admin, json!({ "name": "Bad ids", "channels": ["nope"] })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        post("/api/v1/channels", &admin, json!({ "name": "   " })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn duplicate_playlist_link_and_service_slug_conflict() {
    let db = create_postgres_container().await;
    let app = test::init_service(app(&db)).await;
    let (_, admin) = account(&db, Role::Admin).await;

    let (_, course) = send(&app, post("/api/v1/courses", &admin, json!({ "name": "Go" })).to_request()).await;
    let (_, channel) = send(&app, post("/api/v1/channels", &admin, json!({ "name": "Gophers" })).to_request()).await;
    let playlist = json!({
        "type": "youtube",
        "link": "https://yt/list-go",
        "channelId": id_of(&channel),
        "courseId": id_of(&course),
    });

    let (status, _) = send(&app, post("/api/v1/playlists", &admin, playlist.clone()).to_request()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, post("/api/v1/playlists", &admin, playlist).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["cause"], "conflict");

    let (status, _) = send(
        &app,
        post(
            "/api/v1/playlists",
            &admin,
            json!({ "type": "youtube", "link": "", "channelId": id_of(&channel), "courseId": id_of(&course) }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (title, expected) in [
        ("Resume Review", StatusCode::CREATED),
        ("resume   review!", StatusCode::CONFLICT),
    ] {
        let (content_type, payload) = service_form(title);
        let req = test::TestRequest::post()
            .uri("/api/v1/services")
            .insert_header(admin.clone())
            .insert_header(("content-type", content_type))
            .set_payload(payload)
            .to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, expected, "creating service {:?}", title);
    }

    let (status, service) = send(&app, get("/api/v1/services/slug/resume-review").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(service["data"]["title"], "Resume Review");
}

#[actix_web::test]
async fn deleting_a_playlist_cascades_to_videos_and_quiz() {
    let db = create_postgres_container().await;
    let app = test::init_service(app(&db)).await;
    let (_, admin) = account(&db, Role::Admin).await;

    let (_, course) = send(&app, post("/api/v1/courses", &admin, json!({ "name": "Rust" })).to_request()).await;
    let (_, channel) = send(&app, post("/api/v1/channels", &admin, json!({ "name": "Crust" })).to_request()).await;
    let (_, playlist) = send(
        &app,
        post(
            "/api/v1/playlists",
            &admin,
            json!({ "type": "youtube", "link": "https://yt/list-rust", "channelId": id_of(&channel), "courseId": id_of(&course) }),
        )
        .to_request(),
    )
    .await;
    let playlist_id = id_of(&playlist);

    let (status, _) = send(
        &app,
        post("/api/v1/videos/bulk", &admin, json!({ "playlistId": playlist_id, "videos": [] })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, video) = send(
        &app,
        post(
            "/api/v1/videos",
            &admin,
            json!({ "title": "Lifetimes", "link": "https://yt/lt", "playlistId": playlist_id }),
        )
        .to_request(),
    )
    .await;
    let (_, quiz) = send(
        &app,
        post(
            "/api/v1/quizzes",
            &admin,
            json!({
                "playlistId": playlist_id,
                "channelName": "Crust",
                "courseName": "Rust",
                "videoId": id_of(&video),
                "videoTitle": "Lifetimes",
                "questions": [{ "question": "'static means?", "options": ["forever", "never"], "answer": "forever" }]
            }),
        )
        .to_request(),
    )
    .await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/playlists/{}", playlist_id))
        .insert_header(admin.clone())
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get(&format!("/api/v1/videos/{}", id_of(&video))).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get(&format!("/api/v1/quizzes/{}", id_of(&quiz))).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn moving_a_playlist_carries_its_videos() {
    let db = create_postgres_container().await;
    let app = test::init_service(app(&db)).await;
    let (_, admin) = account(&db, Role::Admin).await;

    let (_, course) = send(&app, post("/api/v1/courses", &admin, json!({ "name": "SQL" })).to_request()).await;
    let (_, from) = send(&app, post("/api/v1/channels", &admin, json!({ "name": "Old home" })).to_request()).await;
    let (_, to) = send(&app, post("/api/v1/channels", &admin, json!({ "name": "New home" })).to_request()).await;
    let (_, playlist) = send(
        &app,
        post(
            "/api/v1/playlists",
            &admin,
            json!({ "type": "youtube", "link": "https://yt/list-sql", "channelId": id_of(&from), "courseId": id_of(&course) }),
        )
        .to_request(),
    )
    .await;
    let playlist_id = id_of(&playlist);
    let (_, video) = send(
        &app,
        post(
            "/api/v1/videos",
            &admin,
            json!({ "title": "Joins", "link": "https://yt/joins", "playlistId": playlist_id }),
        )
        .to_request(),
    )
    .await;

    let (status, _) = send(
        &app,
        put(&format!("/api/v1/playlists/{}", playlist_id), &admin, json!({ "channelId": id_of(&to) })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, moved) = send(&app, get(&format!("/api/v1/videos/{}", id_of(&video))).to_request()).await;
    assert_eq!(moved["data"]["channelId"], id_of(&to).as_str());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/channels/{}", id_of(&from)))
        .insert_header(admin.clone())
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (_, videos) = send(
        &app,
        get(&format!("/api/v1/videos?playlistId={}", playlist_id)).to_request(),
    )
    .await;
    assert_eq!(videos["data"]["meta"]["total"], 1);
}

#[actix_web::test]
async fn admin_rights_follow_the_stored_role() {
    let db = create_postgres_container().await;
    let app = test::init_service(app(&db)).await;
    let (_, admin) = account(&db, Role::Admin).await;
    let (eve, eve_token) = account(&db, Role::Admin).await;

    let (status, _) = send(&app, post("/api/v1/channels", &eve_token, json!({ "name": "Eve's" })).to_request()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        put(&format!("/api/v1/users/{}/role", eve), &admin, json!({ "role": "superuser" })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        put(&format!("/api/v1/users/{}/role", eve), &admin, json!({ "role": "user" })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "user");

    // The token still claims admin; the stored role wins.
    let (status, _) = send(&app, post("/api/v1/channels", &eve_token, json!({ "name": "Eve's again" })).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut conn = db.pool.get().await.unwrap();
    diesel::delete(users::table.find(eve))
        .execute(&mut conn)
        .await
        .unwrap();
    drop(conn);

    let (status, body) = send(&app, get("/api/v1/users").insert_header(eve_token.clone()).to_request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["cause"], "unauthorized");
}
