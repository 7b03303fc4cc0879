//! API integration tests
//!
//! Expect a server on localhost:8080 backed by the database in `DATABASE_URL`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Suffix that keeps names, emails and ISBNs unique across runs
fn unique() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("{}{}", nanos, COUNTER.fetch_add(1, Ordering::SeqCst))
}

async fn create_category(client: &Client) -> i64 {
    let response = client
        .post(format!("{}/categories", BASE_URL))
        .json(&json!({ "name": format!("Fiction {}", unique()) }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No category id")
}

async fn create_book(client: &Client, total_copies: i32) -> i64 {
    let category_id = create_category(client).await;
    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({
            "name": "The Left Hand of Darkness",
            "author": "Ursula K. Le Guin",
            "category_id": category_id,
            "total_copies": total_copies,
            "isbn": unique(),
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], total_copies);
    body["id"].as_i64().expect("No book id")
}

async fn create_user(client: &Client) -> i64 {
    let suffix = unique();
    let response = client
        .post(format!("{}/users", BASE_URL))
        .json(&json!({
            "moodle_id": format!("m{}", suffix),
            "name": "Test Reader",
            "email": format!("reader{}@example.com", suffix),
            "role": "MEMBER",
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No user id")
}

async fn borrow(client: &Client, user_id: i64, book_id: i64) -> reqwest::Response {
    client
        .post(format!("{}/borrows", BASE_URL))
        .json(&json!({ "user_id": user_id, "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request")
}

async fn available_copies(client: &Client, book_id: i64) -> i64 {
    let body: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    body["available_copies"].as_i64().expect("No available_copies")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness_reaches_database() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_borrow_extend_return_scenario() {
    let client = Client::new();
    let book_id = create_book(&client, 2).await;
    let user_id = create_user(&client).await;
    let today = Utc::now().date_naive();

    let response = borrow(&client, user_id, book_id).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(created["status"], "ACTIVE");
    assert_eq!(created["extension_count"], 0);
    assert_eq!(created["due_date"], (today + Duration::days(14)).to_string());
    assert_eq!(available_copies(&client, book_id).await, 1);

    let borrow_id = created["id"].as_i64().expect("No borrow id");

    let extended: Value = client
        .post(format!("{}/borrows/{}/extend", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(extended["due_date"], (today + Duration::days(21)).to_string());
    assert_eq!(extended["extension_count"], 1);

    let response = client
        .post(format!("{}/borrows/{}/return", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["status"], "RETURNED");
    assert_eq!(returned["return_date"], today.to_string());
    assert_eq!(available_copies(&client, book_id).await, 2);

    // a second return is refused
    let response = client
        .post(format!("{}/borrows/{}/return", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(available_copies(&client, book_id).await, 2);
}

#[tokio::test]
#[ignore]
async fn test_borrow_without_copies_is_conflict() {
    let client = Client::new();
    let book_id = create_book(&client, 1).await;
    let first = create_user(&client).await;
    let second = create_user(&client).await;

    assert_eq!(borrow(&client, first, book_id).await.status(), StatusCode::CREATED);

    let response = borrow(&client, second, book_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(available_copies(&client, book_id).await, 0);

    let history: Value = client
        .get(format!("{}/users/{}/borrows", BASE_URL, second))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(history["total"], 0);
}

#[tokio::test]
#[ignore]
async fn test_same_book_twice_is_conflict() {
    let client = Client::new();
    let book_id = create_book(&client, 3).await;
    let user_id = create_user(&client).await;

    assert_eq!(borrow(&client, user_id, book_id).await.status(), StatusCode::CREATED);

    let response = borrow(&client, user_id, book_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["message"].as_str().unwrap_or_default().contains("already"));
    assert_eq!(available_copies(&client, book_id).await, 2);
}

#[tokio::test]
#[ignore]
async fn test_borrow_limit_recovers_after_return() {
    let client = Client::new();
    let user_id = create_user(&client).await;

    let mut borrow_ids = Vec::new();
    for _ in 0..5 {
        let book_id = create_book(&client, 1).await;
        let response = borrow(&client, user_id, book_id).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse response");
        borrow_ids.push(body["id"].as_i64().expect("No borrow id"));
    }

    let sixth = create_book(&client, 1).await;
    let response = borrow(&client, user_id, sixth).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{}/borrows/{}/return", BASE_URL, borrow_ids[0]))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    assert_eq!(borrow(&client, user_id, sixth).await.status(), StatusCode::CREATED);
}

#[tokio::test]
#[ignore]
async fn test_extension_cap() {
    let client = Client::new();
    let book_id = create_book(&client, 1).await;
    let user_id = create_user(&client).await;

    let body: Value = borrow(&client, user_id, book_id)
        .await
        .json()
        .await
        .expect("Failed to parse response");
    let borrow_id = body["id"].as_i64().expect("No borrow id");

    for _ in 0..2 {
        let response = client
            .post(format!("{}/borrows/{}/extend", BASE_URL, borrow_id))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = client
        .post(format!("{}/borrows/{}/extend", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_unknown_ids_are_not_found() {
    let client = Client::new();
    let user_id = create_user(&client).await;

    let response = borrow(&client, user_id, i64::MAX).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(format!("{}/borrows/{}/return", BASE_URL, i64::MAX))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_of_last_copy() {
    let client = Client::new();
    let book_id = create_book(&client, 1).await;
    let first = create_user(&client).await;
    let second = create_user(&client).await;

    let (a, b) = tokio::join!(
        borrow(&client, first, book_id),
        borrow(&client, second, book_id)
    );

    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
    assert_eq!(available_copies(&client, book_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_copy_counts_stay_in_range() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = sqlx::PgPool::connect(&url).await.expect("Failed to connect to database");

    let broken: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM books WHERE available_copies < 0 OR available_copies > total_copies",
    )
    .fetch_one(&pool)
    .await
    .expect("Failed to query books");
    assert_eq!(broken, 0);
}

#[tokio::test]
#[ignore]
async fn test_new_book_notifies_admin() {
    let client = Client::new();
    let book_id = create_book(&client, 1).await;

    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    let expected = format!(
        "A new book titled '{}' is now available in the library!",
        book["name"].as_str().expect("No name")
    );

    let unread: Value = client
        .get(format!("{}/notifications", BASE_URL))
        .query(&[("recipient", "admin@library.local")])
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    let messages: Vec<&str> = unread
        .as_array()
        .expect("Expected an array")
        .iter()
        .filter_map(|n| n["message"].as_str())
        .collect();
    assert!(messages.contains(&expected.as_str()));
}

async fn database() -> sqlx::PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    sqlx::PgPool::connect(&url).await.expect("Failed to connect to database")
}

async fn sweep(client: &Client) -> u64 {
    let response = client
        .post(format!("{}/borrows/overdue/sweep", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["updated"].as_u64().expect("No updated count")
}

#[tokio::test]
#[ignore]
async fn test_overdue_lifecycle() {
    let client = Client::new();
    let pool = database().await;
    let late_book = create_book(&client, 1).await;
    let other_book = create_book(&client, 1).await;
    let user_id = create_user(&client).await;

    let created: Value = borrow(&client, user_id, late_book)
        .await
        .json()
        .await
        .expect("Failed to parse response");
    let borrow_id = created["id"].as_i64().expect("No borrow id");

    let past_due = Utc::now().date_naive() - Duration::days(3);
    sqlx::query("UPDATE borrows SET due_date = $1 WHERE id = $2")
        .bind(past_due)
        .bind(borrow_id)
        .execute(&pool)
        .await
        .expect("Failed to backdate borrow");

    // late but not swept yet: already blocks extension and new borrows
    let response = client
        .post(format!("{}/borrows/{}/extend", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = borrow(&client, user_id, other_book).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["message"].as_str().unwrap_or_default().contains("overdue"));

    assert_eq!(sweep(&client).await, 1);
    assert_eq!(sweep(&client).await, 0);

    let swept: Value = client
        .get(format!("{}/borrows/{}", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(swept["status"], "OVERDUE");
    assert_eq!(swept["days_overdue"], 3);

    let response = client
        .post(format!("{}/borrows/{}/extend", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = borrow(&client, user_id, other_book).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{}/borrows/{}/return", BASE_URL, borrow_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["status"], "RETURNED");
    assert_eq!(available_copies(&client, late_book).await, 1);

    assert_eq!(borrow(&client, user_id, other_book).await.status(), StatusCode::CREATED);
}

#[tokio::test]
#[ignore]
async fn test_total_copies_cannot_strand_borrowed_copies() {
    let client = Client::new();
    let book_id = create_book(&client, 3).await;
    for _ in 0..2 {
        let user_id = create_user(&client).await;
        assert_eq!(borrow(&client, user_id, book_id).await.status(), StatusCode::CREATED);
    }

    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .json(&json!({ "total_copies": 2 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .json(&json!({ "total_copies": 4, "available_copies": 2 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["total_copies"], 4);
    assert_eq!(body["available_copies"], 2);
}

#[tokio::test]
#[ignore]
async fn test_rejected_upload_leaves_no_files() {
    let client = Client::new();
    let category_id = create_category(&client).await;
    let isbn = unique();
    let book = json!({
        "name": "Middlemarch",
        "author": "George Eliot",
        "category_id": category_id,
        "total_copies": 1,
        "isbn": isbn,
    });

    let upload = |cover_name: String| {
        let form = reqwest::multipart::Form::new()
            .text("book_data", book.to_string())
            .part(
                "book_cover",
                reqwest::multipart::Part::bytes(b"png".to_vec()).file_name(cover_name),
            );
        client
            .post(format!("{}/books/upload", BASE_URL))
            .multipart(form)
            .send()
    };

    let first = upload(format!("cover{}.png", unique()))
        .await
        .expect("Failed to send request");
    assert_eq!(first.status(), StatusCode::CREATED);

    let rejected_name = format!("cover{}.png", unique());
    let second = upload(rejected_name.clone())
        .await
        .expect("Failed to send request");
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let uploads = std::env::var("LIBRARY_UPLOADS__DIR").unwrap_or_else(|_| "uploads".to_string());
    let covers = std::path::Path::new(&uploads).join("covers");
    if let Ok(entries) = std::fs::read_dir(&covers) {
        let leftover = entries
            .filter_map(Result::ok)
            .any(|e| e.file_name().to_string_lossy().ends_with(&rejected_name));
        assert!(!leftover, "rejected upload left a file in {}", covers.display());
    }
}

#[tokio::test]
#[ignore]
async fn test_category_books_and_recommendations() {
    let client = Client::new();
    let book_id = create_book(&client, 1).await;
    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    let category_id = book["category_id"].as_i64().expect("No category id");

    let page: Value = client
        .get(format!("{}/categories/{}/books", BASE_URL, category_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], book_id);

    let response = client
        .get(format!("{}/categories/{}/books", BASE_URL, i64::MAX))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("{}/books/recommended", BASE_URL))
        .query(&[("limit", "5")])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let books: Value = response.json().await.expect("Failed to parse response");
    assert!(books.as_array().expect("Expected an array").len() <= 5);
}

#[tokio::test]
#[ignore]
async fn test_huge_page_is_not_an_error() {
    let client = Client::new();
    let response = client
        .get(format!("{}/books", BASE_URL))
        .query(&[("page", i64::MAX.to_string())])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
}
