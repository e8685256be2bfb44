//! Exercises the property `claim()` exists to guarantee: when several
//! workers race to claim the same job, exactly one succeeds. Runs against
//! the KV backend's in-memory tiers so the test needs no live Postgres.

use std::sync::Arc;

use kb_cache::{MemoryDurableTier, MemoryFastTier, TwoTierCache};
use kb_core::{JobType, SourceType};
use kb_repository::{JobRecord, JobRepository, KvJobRepository};

fn build_repository() -> Arc<KvJobRepository> {
    let cache = Arc::new(TwoTierCache::new(Arc::new(MemoryFastTier::new()), Arc::new(MemoryDurableTier::new())));
    Arc::new(KvJobRepository::new(cache))
}

fn sample_record(job_id: &str) -> JobRecord {
    JobRecord::new(job_id.to_string(), "alice@example.com".to_string(), SourceType::Email, JobType::EmailAnalysis, serde_json::json!({"subject": "hi"}))
}

#[tokio::test]
async fn exactly_one_concurrent_claimant_wins() {
    let repo = build_repository();
    repo.put(sample_record("job-race")).await.unwrap();

    const CLAIMANTS: usize = 20;
    let mut handles = Vec::with_capacity(CLAIMANTS);
    for _ in 0..CLAIMANTS {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let lock_expires_at = chrono::Utc::now() + chrono::Duration::seconds(60);
            repo.claim("job-race", lock_expires_at).await.unwrap()
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }

    assert_eq!(wins, 1, "exactly one claimant must win the race");

    let record = repo.get_record("job-race").await.unwrap();
    assert!(matches!(record.status, kb_core::JobStatus::Processing { .. }));
}

#[tokio::test]
async fn concurrent_claims_across_distinct_jobs_all_succeed() {
    let repo = build_repository();
    for i in 0..10 {
        repo.put(sample_record(&format!("job-{i}"))).await.unwrap();
    }

    let mut handles = Vec::with_capacity(10);
    for i in 0..10 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let lock_expires_at = chrono::Utc::now() + chrono::Duration::seconds(60);
            repo.claim(&format!("job-{i}"), lock_expires_at).await.unwrap()
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap(), "distinct jobs must never contend with one another");
    }
}
