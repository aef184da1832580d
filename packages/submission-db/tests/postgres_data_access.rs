//! Integration tests against a real Postgres container, in the style of
//! `server/tests/common/harness.rs`'s shared-container setup.

use sqlx::PgPool;
use submission_core::{JobPriority, SubmissionStatus, UpsertOutcome};
use submission_db::{DataAccess, PostgresDataAccess};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

async fn test_pool() -> (PgPool, testcontainers::ContainerAsync<Postgres>) {
    let container = Postgres::default()
        .start()
        .await
        .expect("failed to start postgres container");

    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

    let pool = PgPool::connect(&url)
        .await
        .expect("failed to connect to test postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    (pool, container)
}

async fn seed_customer_and_job(pool: &PgPool) -> uuid::Uuid {
    sqlx::query(
        "INSERT INTO customers (id, business_name, email) VALUES ($1, 'Acme Roofing', 'a@acme.test')",
    )
    .bind("cust-1")
    .execute(pool)
    .await
    .unwrap();

    let job = submission_core::Job::builder()
        .customer_id("cust-1")
        .priority(JobPriority::Pro)
        .build();

    let dao = PostgresDataAccess::new(pool.clone());
    dao.insert_job(job).await.unwrap().id
}

#[tokio::test]
async fn upsert_job_result_is_idempotent_on_key() {
    let (pool, _container) = test_pool().await;
    let job_id = seed_customer_and_job(&pool).await;
    let dao = PostgresDataAccess::new(pool.clone());

    let key = "fixed-key-1";
    let first = dao
        .upsert_job_result(job_id, "yelp", SubmissionStatus::Submitted, key, None, None, None)
        .await
        .unwrap();
    assert_eq!(first, UpsertOutcome::Inserted);

    // A second attempt with the same key and a terminal prior status must
    // not overwrite it (Invariant I2).
    let second = dao
        .upsert_job_result(
            job_id,
            "yelp",
            SubmissionStatus::Failed,
            key,
            None,
            None,
            Some("should not land"),
        )
        .await
        .unwrap();
    assert_eq!(second, UpsertOutcome::DuplicateSuccess);

    let row: (String,) = sqlx::query_as("SELECT status::text FROM job_results WHERE idempotency_key = $1")
        .bind(key)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.0, "submitted");
}

#[tokio::test]
async fn upsert_job_result_allows_progress_from_submitting() {
    let (pool, _container) = test_pool().await;
    let job_id = seed_customer_and_job(&pool).await;
    let dao = PostgresDataAccess::new(pool.clone());

    let key = "fixed-key-2";
    dao.upsert_job_result(job_id, "google", SubmissionStatus::Submitting, key, None, None, None)
        .await
        .unwrap();

    let outcome = dao
        .upsert_job_result(job_id, "google", SubmissionStatus::Submitted, key, None, None, None)
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
}

#[tokio::test]
async fn get_directory_info_falls_back_to_synthesis() {
    let (pool, _container) = test_pool().await;
    let dao = PostgresDataAccess::new(pool.clone());

    let info = dao.get_directory_info("totally-unknown-directory").await.unwrap();
    assert_eq!(info.name, "totally-unknown-directory");
    assert!(info.url.starts_with("https://"));
}

#[tokio::test]
async fn find_stale_jobs_detects_missing_heartbeat_past_threshold() {
    let (pool, _container) = test_pool().await;
    let job_id = seed_customer_and_job(&pool).await;
    let dao = PostgresDataAccess::new(pool.clone());

    dao.set_job_status(job_id, submission_core::JobStatus::InProgress, None)
        .await
        .unwrap();
    sqlx::query("UPDATE jobs SET started_at = NOW() - interval '30 minutes' WHERE id = $1")
        .bind(job_id)
        .execute(&pool)
        .await
        .unwrap();

    let stale = dao.find_stale_jobs(10).await.unwrap();
    assert!(stale.iter().any(|j| j.id == job_id));
}
