//! Integration tests for the jobs repository against an in-memory database:
//! submission, FIFO claiming, terminal-state guards, cleanup, and stats.

use chrono::{Duration, Utc};
use reelsmith_db::models::job::{JobListQuery, SubmitJob};
use reelsmith_db::models::status::JobStatus;
use reelsmith_db::repositories::JobRepo;
use reelsmith_db::{create_pool, DbPool, MIGRATOR};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn test_pool() -> DbPool {
    let pool = create_pool("sqlite::memory:")
        .await
        .expect("in-memory pool");
    MIGRATOR.run(&pool).await.expect("migrations");
    pool
}

fn submit_input(output: &str) -> SubmitJob {
    SubmitJob {
        template_id: "tpl-1".to_string(),
        variables: serde_json::json!({"TITLE": "hello"})
            .as_object()
            .cloned()
            .unwrap(),
        output_path: output.to_string(),
        metadata: None,
    }
}

// ---------------------------------------------------------------------------
// Submission & lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_persists_a_queued_job() {
    let pool = test_pool().await;
    let job = JobRepo::submit(&pool, &submit_input("/tmp/a.mp4")).await.unwrap();

    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);
    assert!(job.started_at.is_none());

    let fetched = JobRepo::find_by_id(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(fetched.output_path, "/tmp/a.mp4");
    assert_eq!(fetched.variables["TITLE"], serde_json::json!("hello"));
}

#[tokio::test]
async fn find_by_id_returns_none_for_unknown_job() {
    let pool = test_pool().await;
    let missing = JobRepo::find_by_id(&pool, &"nope".to_string()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn list_is_newest_first_and_filterable() {
    let pool = test_pool().await;
    let a = JobRepo::submit(&pool, &submit_input("/tmp/a.mp4")).await.unwrap();
    let b = JobRepo::submit(&pool, &submit_input("/tmp/b.mp4")).await.unwrap();
    JobRepo::mark_processing(&pool, &a.id).await.unwrap();

    let all = JobRepo::list(&pool, &JobListQuery::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, b.id);

    let processing = JobRepo::list(
        &pool,
        &JobListQuery {
            status: Some(JobStatus::Processing),
            limit: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].id, a.id);
}

// ---------------------------------------------------------------------------
// Claiming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn next_awaiting_is_fifo_by_creation_time() {
    let pool = test_pool().await;
    let first = JobRepo::submit(&pool, &submit_input("/tmp/1.mp4")).await.unwrap();
    let second = JobRepo::submit(&pool, &submit_input("/tmp/2.mp4")).await.unwrap();
    let third = JobRepo::submit(&pool, &submit_input("/tmp/3.mp4")).await.unwrap();

    let claimed = JobRepo::next_awaiting(&pool, 2).await.unwrap();
    assert_eq!(claimed.len(), 2);
    assert_eq!(claimed[0].id, first.id);
    assert_eq!(claimed[1].id, second.id);

    // Jobs already promoted to processing are not claimable again.
    JobRepo::mark_processing(&pool, &first.id).await.unwrap();
    JobRepo::mark_processing(&pool, &second.id).await.unwrap();
    let remaining = JobRepo::next_awaiting(&pool, 10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, third.id);
}

#[tokio::test]
async fn mark_processing_refuses_cancelled_jobs() {
    let pool = test_pool().await;
    let job = JobRepo::submit(&pool, &submit_input("/tmp/a.mp4")).await.unwrap();
    assert!(JobRepo::cancel(&pool, &job.id).await.unwrap());

    assert!(!JobRepo::mark_processing(&pool, &job.id).await.unwrap());
    let fetched = JobRepo::find_by_id(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, JobStatus::Cancelled);
    assert!(fetched.started_at.is_none());
}

// ---------------------------------------------------------------------------
// Terminal-state guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_returns_false_for_terminal_jobs() {
    let pool = test_pool().await;
    let job = JobRepo::submit(&pool, &submit_input("/tmp/a.mp4")).await.unwrap();
    JobRepo::mark_processing(&pool, &job.id).await.unwrap();
    assert!(JobRepo::complete(&pool, &job.id).await.unwrap());

    assert!(!JobRepo::cancel(&pool, &job.id).await.unwrap());
    let fetched = JobRepo::find_by_id(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, JobStatus::Completed);
    assert_eq!(fetched.progress, 100);
}

#[tokio::test]
async fn complete_loses_the_race_against_cancel() {
    let pool = test_pool().await;
    let job = JobRepo::submit(&pool, &submit_input("/tmp/a.mp4")).await.unwrap();
    JobRepo::mark_processing(&pool, &job.id).await.unwrap();
    assert!(JobRepo::cancel(&pool, &job.id).await.unwrap());

    // The render finished after the cancel: its terminal write is discarded.
    assert!(!JobRepo::complete(&pool, &job.id).await.unwrap());
    assert!(!JobRepo::fail(&pool, &job.id, "boom").await.unwrap());
    let fetched = JobRepo::find_by_id(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, JobStatus::Cancelled);
}

#[tokio::test]
async fn fail_records_the_error_message() {
    let pool = test_pool().await;
    let job = JobRepo::submit(&pool, &submit_input("/tmp/a.mp4")).await.unwrap();
    JobRepo::mark_processing(&pool, &job.id).await.unwrap();
    assert!(JobRepo::fail(&pool, &job.id, "ffmpeg exited with code 1").await.unwrap());

    let fetched = JobRepo::find_by_id(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, JobStatus::Failed);
    assert_eq!(fetched.error_message.as_deref(), Some("ffmpeg exited with code 1"));
    assert!(fetched.completed_at.is_some());
}

// ---------------------------------------------------------------------------
// Cleanup & stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clear_finished_removes_only_terminal_jobs() {
    let pool = test_pool().await;
    let done = JobRepo::submit(&pool, &submit_input("/tmp/1.mp4")).await.unwrap();
    let failed = JobRepo::submit(&pool, &submit_input("/tmp/2.mp4")).await.unwrap();
    let queued = JobRepo::submit(&pool, &submit_input("/tmp/3.mp4")).await.unwrap();

    JobRepo::mark_processing(&pool, &done.id).await.unwrap();
    JobRepo::complete(&pool, &done.id).await.unwrap();
    JobRepo::mark_processing(&pool, &failed.id).await.unwrap();
    JobRepo::fail(&pool, &failed.id, "boom").await.unwrap();

    let removed = JobRepo::clear_finished(&pool).await.unwrap();
    assert_eq!(removed, 2);

    let remaining = JobRepo::list(&pool, &JobListQuery::default()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, queued.id);
}

#[tokio::test]
async fn stats_average_over_completed_jobs_only() {
    let pool = test_pool().await;
    let base = Utc::now();

    // Three completed jobs with 1000/2000/3000 ms spans, plus one failed job
    // whose span must not contribute.
    for (idx, millis) in [1000i64, 2000, 3000].iter().enumerate() {
        let job = JobRepo::submit(&pool, &submit_input(&format!("/tmp/{idx}.mp4")))
            .await
            .unwrap();
        JobRepo::mark_processing(&pool, &job.id).await.unwrap();
        JobRepo::complete(&pool, &job.id).await.unwrap();
        sqlx::query("UPDATE jobs SET started_at = ?, completed_at = ? WHERE id = ?")
            .bind(base)
            .bind(base + Duration::milliseconds(*millis))
            .bind(&job.id)
            .execute(&pool)
            .await
            .unwrap();
    }
    let failed = JobRepo::submit(&pool, &submit_input("/tmp/f.mp4")).await.unwrap();
    JobRepo::mark_processing(&pool, &failed.id).await.unwrap();
    JobRepo::fail(&pool, &failed.id, "boom").await.unwrap();

    let stats = JobRepo::stats(&pool).await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.counts_by_status.get("completed"), Some(&3));
    assert_eq!(stats.counts_by_status.get("failed"), Some(&1));
    assert_eq!(stats.average_render_time_ms, 2000);
    assert_eq!(stats.total_render_time_ms, 6000);
}

#[tokio::test]
async fn active_count_tracks_non_terminal_jobs() {
    let pool = test_pool().await;
    assert_eq!(JobRepo::active_count(&pool).await.unwrap(), 0);

    let a = JobRepo::submit(&pool, &submit_input("/tmp/a.mp4")).await.unwrap();
    let b = JobRepo::submit(&pool, &submit_input("/tmp/b.mp4")).await.unwrap();
    JobRepo::mark_processing(&pool, &a.id).await.unwrap();
    assert_eq!(JobRepo::active_count(&pool).await.unwrap(), 2);

    JobRepo::complete(&pool, &a.id).await.unwrap();
    JobRepo::cancel(&pool, &b.id).await.unwrap();
    assert_eq!(JobRepo::active_count(&pool).await.unwrap(), 0);
}
