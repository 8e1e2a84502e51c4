//! End-to-end pipeline scenarios: enqueue through worker to stores.

mod common;

use std::time::Duration;

use common::*;
use serde_json::Value;
use uuid::Uuid;

use server_core::kernel::assets::AssetStore;
use server_core::kernel::jobs::{EnqueueOptions, JobStatus, JobStore, JobType, RetryPolicy};
use server_core::kernel::{MockRenderer, ServiceConfig, TestDependencies};

#[tokio::test]
async fn export_success_produces_a_locatable_asset() {
    let pipeline = Pipeline::new();
    pipeline
        .seed_template_version("T", "v1", title_only_spec())
        .await;

    let result = pipeline
        .enqueue("T", JobType::Export, "v1", EnqueueOptions::default())
        .await;
    assert!(!result.was_duplicate());

    pipeline.tick().await;

    let job = pipeline.job("T", result.job_id()).await;
    assert_eq!(job.status, JobStatus::Done);

    let output_ref = job.output_ref.expect("done job must carry an output ref");
    assert_opaque_ref(&output_ref);

    // The output ref is the asset id; the record and the bytes are both
    // reachable through it.
    let asset_id: Uuid = output_ref.parse().expect("output ref is an asset id");
    let asset = pipeline
        .test
        .asset_store
        .get("T", asset_id)
        .await
        .unwrap()
        .expect("asset record exists");
    assert!(asset.storage_key.ends_with(".pptx"));
    assert!(asset.storage_key.starts_with(&output_ref));
    assert!(pipeline.test.storage.object(&asset.storage_key).is_some());
}

#[tokio::test]
async fn duplicate_enqueue_after_done_returns_the_prior_job() {
    let pipeline = Pipeline::new();
    pipeline
        .seed_template_version("T", "v1", title_only_spec())
        .await;

    let first = pipeline
        .enqueue(
            "T",
            JobType::Export,
            "v1",
            EnqueueOptions::with_dedup_key("K"),
        )
        .await;
    pipeline.tick().await;
    assert_eq!(
        pipeline.job("T", first.job_id()).await.status,
        JobStatus::Done
    );

    let second = pipeline
        .enqueue(
            "T",
            JobType::Export,
            "v1",
            EnqueueOptions::with_dedup_key("K"),
        )
        .await;
    assert!(second.was_duplicate());
    assert_eq!(second.job_id(), first.job_id());

    // Exactly one row holds key K.
    let jobs = pipeline
        .test
        .job_store
        .list_by_input("T", "v1", JobType::Export)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
}

#[tokio::test]
async fn dedup_key_is_released_by_failure() {
    // A permanently failing renderer dead-letters the first job.
    let test = TestDependencies::with_collaborators(
        MockRenderer::failing("invalid spec: renderer rejected layout"),
        Default::default(),
        Default::default(),
    );
    let pipeline = Pipeline::with_dependencies(test);
    pipeline
        .seed_template_version("T", "v1", title_only_spec())
        .await;

    let first = pipeline
        .enqueue(
            "T",
            JobType::Export,
            "v1",
            EnqueueOptions::with_dedup_key("K"),
        )
        .await;
    pipeline.tick().await;
    assert_eq!(
        pipeline.job("T", first.job_id()).await.status,
        JobStatus::DeadLetter
    );

    let second = pipeline
        .enqueue(
            "T",
            JobType::Export,
            "v1",
            EnqueueOptions::with_dedup_key("K"),
        )
        .await;
    assert!(!second.was_duplicate());
    assert_ne!(second.job_id(), first.job_id());

    let jobs = pipeline
        .test
        .job_store
        .list_by_input("T", "v1", JobType::Export)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);
}

#[tokio::test]
async fn concurrent_duplicate_submissions_insert_once() {
    let pipeline = std::sync::Arc::new(Pipeline::new());
    pipeline
        .seed_template_version("T", "v1", title_only_spec())
        .await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let p = pipeline.clone();
        handles.push(tokio::spawn(async move {
            p.enqueue(
                "T",
                JobType::Export,
                "v1",
                EnqueueOptions::with_dedup_key("K"),
            )
            .await
        }));
    }

    let mut created = 0;
    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        let result = handle.await.unwrap();
        if !result.was_duplicate() {
            created += 1;
        }
        ids.insert(result.job_id());
    }

    assert_eq!(created, 1, "exactly one insert may win");
    assert_eq!(ids.len(), 1, "every caller sees the same job");
}

#[tokio::test]
async fn retryable_failures_exhaust_into_dead_letter() {
    let test = TestDependencies::with_collaborators(
        MockRenderer::failing("renderer unavailable"),
        Default::default(),
        Default::default(),
    );
    let pipeline = Pipeline::with_parts(accelerated_config(2), test);
    pipeline
        .seed_template_version("T", "v1", title_only_spec())
        .await;

    let result = pipeline
        .enqueue("T", JobType::Render, "v1", EnqueueOptions::default())
        .await;

    pipeline.tick().await;
    assert_eq!(
        pipeline.job("T", result.job_id()).await.status,
        JobStatus::Retry
    );
    pipeline.tick().await;
    assert_eq!(
        pipeline.job("T", result.job_id()).await.status,
        JobStatus::Retry
    );
    pipeline.tick().await;

    let job = pipeline.job("T", result.job_id()).await;
    assert_eq!(job.status, JobStatus::DeadLetter);
    assert_eq!(job.retry_count, 2);
    let error = job.error.unwrap();
    assert!(error.contains("Final retry"), "error was: {error}");
    assert_eq!(job.output_ref, None);
}

#[tokio::test(start_paused = true)]
async fn blocked_renderer_hits_the_deadline_and_leaves_running() {
    let test = TestDependencies::with_collaborators(
        MockRenderer::blocking(),
        Default::default(),
        Default::default(),
    );
    let mut config = accelerated_config(1);
    config.job_timeout = Duration::from_secs(2);
    let pipeline = Pipeline::with_parts(config, test);
    pipeline
        .seed_template_version("T", "v1", title_only_spec())
        .await;

    let result = pipeline
        .enqueue("T", JobType::Render, "v1", EnqueueOptions::default())
        .await;
    pipeline.tick().await;

    let job = pipeline.job("T", result.job_id()).await;
    assert_ne!(job.status, JobStatus::Running, "deadline must conclude the attempt");
    assert!(matches!(job.status, JobStatus::Retry | JobStatus::DeadLetter));
    assert!(job.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn string_spec_is_rendered_without_double_encoding() {
    let spec_literal = r#"{"layouts":[{"name":"T","placeholders":[{"id":"t","geometry":{"x":0.1,"y":0.1,"w":0.8,"h":0.2}}]}]}"#;
    let pipeline = Pipeline::new();
    pipeline
        .seed_template_version("T", "v-str", Value::String(spec_literal.to_string()))
        .await;

    let result = pipeline
        .enqueue("T", JobType::Render, "v-str", EnqueueOptions::default())
        .await;
    pipeline.tick().await;

    let job = pipeline.job("T", result.job_id()).await;
    assert_eq!(job.status, JobStatus::Done, "error: {:?}", job.error);
    assert!(job
        .error
        .map(|e| !e.contains("invalid template spec"))
        .unwrap_or(true));

    // The renderer saw canonical bytes of the document, not a re-encoded
    // string.
    let seen = pipeline.test.renderer.last_spec().expect("renderer called");
    let expected = deckspec::normalize_value(&serde_json::from_str(spec_literal).unwrap()).unwrap();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn generate_without_metadata_dead_letters_and_creates_nothing() {
    let pipeline = Pipeline::new();

    let result = pipeline
        .enqueue("T", JobType::Generate, "tpl-1", EnqueueOptions::default())
        .await;
    pipeline.tick().await;

    let job = pipeline.job("T", result.job_id()).await;
    assert_eq!(job.status, JobStatus::DeadLetter);
    assert!(job.error.unwrap().contains("missing job metadata"));
    assert_eq!(job.output_ref, None);

    // No side effects: no asset bytes, no AI call, no version insert.
    assert_eq!(pipeline.test.storage.object_count(), 0);
    assert!(pipeline.test.ai.generate_calls().is_empty());
}

#[tokio::test]
async fn requeued_dead_letter_is_processed_again() {
    // Rejects the spec once (permanent, straight to dead letter), then
    // recovers.
    let test = TestDependencies::with_collaborators(
        MockRenderer::failing_times(1, "invalid spec: bad layout"),
        Default::default(),
        Default::default(),
    );
    let pipeline = Pipeline::with_parts(accelerated_config(2), test);
    pipeline
        .seed_template_version("T", "v1", title_only_spec())
        .await;

    let result = pipeline
        .enqueue("T", JobType::Render, "v1", EnqueueOptions::default())
        .await;
    pipeline.tick().await;
    assert_eq!(
        pipeline.job("T", result.job_id()).await.status,
        JobStatus::DeadLetter
    );

    pipeline
        .test
        .job_store
        .requeue_dead_letter(result.job_id())
        .await
        .unwrap();
    let requeued = pipeline.job("T", result.job_id()).await;
    assert_eq!(requeued.status, JobStatus::Queued);
    assert_eq!(requeued.retry_count, 0);
    assert!(requeued.error.is_none());

    pipeline.tick().await;
    assert_eq!(
        pipeline.job("T", result.job_id()).await.status,
        JobStatus::Done
    );
}

#[tokio::test]
async fn status_history_is_monotonic_for_a_retried_job() {
    let test = TestDependencies::with_collaborators(
        MockRenderer::failing_times(2, "renderer unavailable"),
        Default::default(),
        Default::default(),
    );
    let pipeline = Pipeline::with_parts(accelerated_config(3), test);
    pipeline
        .seed_template_version("T", "v1", title_only_spec())
        .await;

    let result = pipeline
        .enqueue("T", JobType::Render, "v1", EnqueueOptions::default())
        .await;

    let mut observed = vec![pipeline.job("T", result.job_id()).await.status];
    for _ in 0..3 {
        pipeline.tick().await;
        observed.push(pipeline.job("T", result.job_id()).await.status);
    }

    assert_eq!(
        observed,
        vec![
            JobStatus::Queued,
            JobStatus::Retry,
            JobStatus::Retry,
            JobStatus::Done
        ]
    );

    // Retry credit never exceeds the budget, and output appears only on Done.
    let job = pipeline.job("T", result.job_id()).await;
    assert!(job.retry_count <= job.max_retries);
    assert!(job.output_ref.is_some());
}

#[tokio::test]
async fn hour_long_backoff_defers_the_second_attempt() {
    let test = TestDependencies::with_collaborators(
        MockRenderer::failing("renderer unavailable"),
        Default::default(),
        Default::default(),
    );
    let config = ServiceConfig::default().with_retry_policy(
        JobType::Render,
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(7200),
            backoff_factor: 2.0,
        },
    );
    let pipeline = Pipeline::with_parts(config, test);
    pipeline
        .seed_template_version("T", "v1", title_only_spec())
        .await;

    let result = pipeline
        .enqueue("T", JobType::Render, "v1", EnqueueOptions::default())
        .await;

    pipeline.tick().await;
    pipeline.tick().await;
    pipeline.tick().await;

    let job = pipeline.job("T", result.job_id()).await;
    assert_eq!(job.status, JobStatus::Retry);
    assert_eq!(job.retry_count, 1, "backoff window must gate reclaims");
    assert_eq!(pipeline.test.renderer.render_calls(), 1);
}
