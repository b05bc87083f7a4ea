// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::context::Context;
use crate::testing::{at, make_config, make_job, sync_active_jobs};
use furiko_core::job::{Job, JobCondition, JobPhase, JobResult, StartPolicy};
use furiko_core::jobconfig::{ConcurrencyPolicy, JobConfig};
use furiko_runtime::clock::FakeClock;
use furiko_runtime::reconciler::{ReconcileResult, Reconciler};

const NOW: &str = "2021-02-09T04:06:05Z";
const START_AFTER: &str = "2021-02-09T04:21:00Z";

struct Fixture {
    context: Context<FakeClock>,
    clock: FakeClock,
    reconciler: JobQueueReconciler<FakeClock>,
}

impl Fixture {
    fn new() -> Self {
        let clock = FakeClock::at(NOW);
        let context = Context::new(clock.clone());
        let reconciler = JobQueueReconciler::new(context.clone());
        Self {
            context,
            clock,
            reconciler,
        }
    }

    fn add_config(&self, config: JobConfig) -> JobConfig {
        self.context.job_configs.create(config).unwrap()
    }

    fn add_job(&self, job: Job) -> Job {
        let created = self.context.jobs.create(job).unwrap();
        sync_active_jobs(&self.context);
        created
    }

    fn add_started_job(&self, name: &str, config: &JobConfig) -> Job {
        let mut job = make_job(name, Some(config));
        job.status.start_time = Some(at(NOW));
        self.add_job(job)
    }

    fn reconcile(&self, job: &Job) -> ReconcileResult {
        let result = self.reconciler.reconcile(&job.metadata.key()).unwrap();
        sync_active_jobs(&self.context);
        result
    }

    fn job(&self, job: &Job) -> Job {
        self.context.jobs.get(&job.metadata.key()).unwrap()
    }
}

#[test]
fn job_with_no_pressure_is_admitted() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Allow, 1));
    let job = fixture.add_job(make_job("job-to-be-started", Some(&config)));

    let result = fixture.reconcile(&job);
    assert_eq!(result, ReconcileResult::Done);

    let admitted = fixture.job(&job);
    assert_eq!(admitted.status.start_time, Some(at(NOW)));
    assert_eq!(admitted.status.phase, JobPhase::Starting);
    assert!(matches!(
        admitted.status.condition,
        JobCondition::Waiting { .. }
    ));
}

#[test]
fn already_started_job_is_untouched() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Allow, 1));
    let job = fixture.add_started_job("started", &config);
    let version = fixture.job(&job).metadata.resource_version;

    assert_eq!(fixture.reconcile(&job), ReconcileResult::Done);
    assert_eq!(fixture.job(&job).metadata.resource_version, version);
}

#[test]
fn future_start_after_requeues_without_status_update() {
    let fixture = Fixture::new();
    let mut job = make_job("job-with-start-after", None);
    job.spec.start_policy = Some(StartPolicy {
        concurrency_policy: None,
        start_after: Some(at(START_AFTER)),
    });
    let job = fixture.add_job(job);
    let version = fixture.job(&job).metadata.resource_version;

    let result = fixture.reconcile(&job);
    assert_eq!(
        result,
        ReconcileResult::RequeueAfter(at(START_AFTER) - at(NOW))
    );
    // No status update was issued.
    assert_eq!(fixture.job(&job).metadata.resource_version, version);
    assert!(fixture.job(&job).status.start_time.is_none());
}

#[test]
fn reached_start_after_admits_at_that_instant() {
    let fixture = Fixture::new();
    let mut job = make_job("job-with-start-after", None);
    job.spec.start_policy = Some(StartPolicy {
        concurrency_policy: None,
        start_after: Some(at(START_AFTER)),
    });
    let job = fixture.add_job(job);

    fixture.clock.set(at(START_AFTER));
    assert_eq!(fixture.reconcile(&job), ReconcileResult::Done);
    assert_eq!(fixture.job(&job).status.start_time, Some(at(START_AFTER)));
}

#[test]
fn forbid_rejects_when_inflight_exists() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Forbid, 1));
    fixture.add_started_job("running", &config);
    let job = fixture.add_job(make_job("blocked", Some(&config)));

    assert_eq!(fixture.reconcile(&job), ReconcileResult::Done);

    let rejected = fixture.job(&job);
    assert_eq!(rejected.status.phase, JobPhase::AdmissionError);
    assert!(rejected.status.start_time.is_none());
    match &rejected.status.condition {
        JobCondition::Finished { result, reason, .. } => {
            assert_eq!(*result, JobResult::Failed);
            assert_eq!(reason, "ConcurrencyConflict");
        }
        other => panic!("expected finished condition, got {:?}", other),
    }
}

#[test]
fn forbid_admits_when_nothing_is_inflight() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Forbid, 1));
    let job = fixture.add_job(make_job("lonely", Some(&config)));

    fixture.reconcile(&job);
    assert!(fixture.job(&job).is_started());
}

#[test]
fn forbid_ignores_finished_jobs() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Forbid, 1));

    let mut done = make_job("done", Some(&config));
    done.status.start_time = Some(at("2021-02-09T04:00:00Z"));
    done.status.condition = JobCondition::Finished {
        created_at: None,
        finished_at: at("2021-02-09T04:05:00Z"),
        result: JobResult::Succeeded,
        reason: String::new(),
        message: String::new(),
    };
    fixture.add_job(done);

    let job = fixture.add_job(make_job("next", Some(&config)));
    fixture.reconcile(&job);
    assert!(fixture.job(&job).is_started());
}

#[test]
fn enqueue_holds_jobs_at_max_concurrency() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Enqueue, 2));
    fixture.add_started_job("running-1", &config);
    fixture.add_started_job("running-2", &config);
    let job = fixture.add_job(make_job("waiting", Some(&config)));

    let result = fixture.reconcile(&job);
    assert!(matches!(result, ReconcileResult::RequeueAfter(_)));
    assert!(!fixture.job(&job).is_started());
}

#[test]
fn enqueue_admits_below_max_concurrency() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Enqueue, 2));
    fixture.add_started_job("running-1", &config);
    let job = fixture.add_job(make_job("next", Some(&config)));

    assert_eq!(fixture.reconcile(&job), ReconcileResult::Done);
    assert!(fixture.job(&job).is_started());
}

#[test]
fn enqueue_admits_after_inflight_job_finishes() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Enqueue, 1));
    let running = fixture.add_started_job("running", &config);
    let job = fixture.add_job(make_job("waiting", Some(&config)));

    assert!(matches!(
        fixture.reconcile(&job),
        ReconcileResult::RequeueAfter(_)
    ));

    // The running job finishes; the informer event would flush the queue.
    let mut finished = fixture.job(&running);
    finished.status.condition = JobCondition::Finished {
        created_at: None,
        finished_at: at(NOW),
        result: JobResult::Succeeded,
        reason: String::new(),
        message: String::new(),
    };
    fixture.context.jobs.update(finished).unwrap();
    sync_active_jobs(&fixture.context);

    assert_eq!(fixture.reconcile(&job), ReconcileResult::Done);
    assert!(fixture.job(&job).is_started());
}

#[test]
fn start_policy_override_takes_precedence() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Forbid, 1));
    fixture.add_started_job("running", &config);

    // The job opts into Allow despite the config's Forbid.
    let mut job = make_job("pushy", Some(&config));
    job.spec.start_policy = Some(StartPolicy {
        concurrency_policy: Some(ConcurrencyPolicy::Allow),
        start_after: None,
    });
    let job = fixture.add_job(job);

    fixture.reconcile(&job);
    assert!(fixture.job(&job).is_started());
}

#[test]
fn enqueue_cap_rejects_newest_jobs() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Enqueue, 1));
    fixture.add_started_job("running", &config);

    // Cap the queue at 2 via dynamic config.
    let mut loader = furiko_runtime::config::DefaultsLoader::new();
    loader.set(
        furiko_runtime::config::ConfigName::JobConfigExecutionConfig,
        serde_json::json!({"maxEnqueuedJobs": 2}),
    );
    fixture.context.config.add_loader(std::sync::Arc::new(loader));

    let first = fixture.add_job(make_job("queued-1", Some(&config)));
    fixture.clock.advance(chrono::Duration::seconds(1));
    let second = fixture.add_job(make_job("queued-2", Some(&config)));
    fixture.clock.advance(chrono::Duration::seconds(1));
    let third = fixture.add_job(make_job("queued-3", Some(&config)));

    // The two oldest stay queued, the newest is rejected.
    assert!(matches!(
        fixture.reconcile(&first),
        ReconcileResult::RequeueAfter(_)
    ));
    assert!(matches!(
        fixture.reconcile(&second),
        ReconcileResult::RequeueAfter(_)
    ));
    assert_eq!(fixture.reconcile(&third), ReconcileResult::Done);

    let rejected = fixture.job(&third);
    assert_eq!(rejected.status.phase, JobPhase::AdmissionError);
    match &rejected.status.condition {
        JobCondition::Finished { reason, .. } => assert_eq!(reason, "QueueFull"),
        other => panic!("expected finished condition, got {:?}", other),
    }
}

#[test]
fn adhoc_job_without_config_is_admitted() {
    let fixture = Fixture::new();
    let job = fixture.add_job(make_job("adhoc", None));
    assert_eq!(fixture.reconcile(&job), ReconcileResult::Done);
    assert!(fixture.job(&job).is_started());
}

#[test]
fn admission_refreshes_config_counters() {
    let fixture = Fixture::new();
    let config = fixture.add_config(make_config("my-config", ConcurrencyPolicy::Allow, 1));
    let job = fixture.add_job(make_job("job-1", Some(&config)));

    fixture.reconcile(&job);
    // The index is refreshed from the informer before counters are synced
    // on a later pass.
    fixture.reconcile(&job);

    let stored = fixture
        .context
        .job_configs
        .get(&config.metadata.key())
        .unwrap();
    assert_eq!(stored.status.active, 1);
    assert_eq!(stored.status.queued, 0);
}
