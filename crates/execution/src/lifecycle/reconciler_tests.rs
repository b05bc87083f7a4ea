// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::context::Context;
use crate::tasks::TaskPhase;
use crate::testing::{at, make_job, sync_active_jobs, NAMESPACE};
use chrono::Duration;
use furiko_core::job::{Job, JobCondition, JobPhase, JobResult, DELETE_DEPENDENTS_FINALIZER};
use furiko_core::jobconfig::ConcurrencyPolicy;
use furiko_core::options::{JobOption, OptionSpec, OptionType, StringOptionConfig};
use furiko_runtime::clock::FakeClock;
use furiko_runtime::reconciler::{ReconcileResult, Reconciler};

const CREATE_TIME: &str = "2021-02-09T04:06:00Z";
const START_TIME: &str = "2021-02-09T04:06:01Z";
const KILL_TIME: &str = "2021-02-09T04:06:10Z";
const NOW: &str = "2021-02-09T04:06:05Z";
const LATER_15M: &str = "2021-02-09T04:21:00Z";

struct Fixture {
    context: Context<FakeClock>,
    clock: FakeClock,
    reconciler: JobReconciler<FakeClock>,
    job_key: String,
}

impl Fixture {
    /// An admitted job stored at CREATE_TIME with start time START_TIME
    fn new() -> Self {
        Self::with_job(make_job("my-sample-job", None))
    }

    fn with_job(mut job: Job) -> Self {
        let clock = FakeClock::at(CREATE_TIME);
        let context = Context::new(clock.clone());
        let executor = context.task_executor();
        let reconciler = JobReconciler::new(context.clone(), executor);

        job.status.start_time = Some(at(START_TIME));
        let created = context.jobs.create(job).unwrap();
        sync_active_jobs(&context);

        Self {
            job_key: created.metadata.key(),
            context,
            clock,
            reconciler,
        }
    }

    fn reconcile(&self) -> ReconcileResult {
        self.reconciler.reconcile(&self.job_key).unwrap()
    }

    fn job(&self) -> Job {
        self.context.jobs.get(&self.job_key).unwrap()
    }

    fn task_key(&self) -> String {
        format!("{}/my-sample-job-1", NAMESPACE)
    }

    fn task(&self) -> crate::tasks::Task {
        self.context.tasks.get(&self.task_key()).unwrap()
    }

    /// Flip the single task into the Running phase, as the runtime would
    fn start_task(&self) {
        let mut task = self.task();
        task.status.phase = TaskPhase::Running;
        task.status.start_time = Some(at(START_TIME));
        self.context.tasks.update(task).unwrap();
    }

    fn set_kill_timestamp(&self, ts: &str) {
        let mut job = self.job();
        job.spec.kill_timestamp = Some(at(ts));
        self.context.jobs.update(job).unwrap();
    }
}

#[test]
fn starting_job_creates_first_task() {
    let fixture = Fixture::new();
    let result = fixture.reconcile();

    let task = fixture.task();
    assert_eq!(task.spec.job_name, "my-sample-job");
    assert_eq!(task.spec.retry_index, 1);
    assert_eq!(task.spec.args, vec!["echo", "Hello world!"]);

    let job = fixture.job();
    assert_eq!(job.status.created_tasks, 1);
    assert_eq!(job.status.tasks.len(), 1);
    assert_eq!(job.status.phase, JobPhase::Pending);

    // The next wakeup is the pending timeout deadline.
    assert_eq!(
        result,
        ReconcileResult::RequeueAfter(Duration::seconds(900))
    );
}

#[test]
fn reconcile_is_idempotent_for_created_task() {
    let fixture = Fixture::new();
    fixture.reconcile();
    fixture.reconcile();

    assert_eq!(fixture.context.tasks.len(), 1);
    assert_eq!(fixture.job().status.created_tasks, 1);
}

#[test]
fn missing_job_is_done() {
    let fixture = Fixture::new();
    let result = fixture.reconciler.reconcile("test/absent").unwrap();
    assert_eq!(result, ReconcileResult::Done);
}

#[test]
fn unadmitted_job_is_left_to_the_queue_controller() {
    let fixture = Fixture::new();
    let mut job = fixture.job();
    job.status.start_time = None;
    fixture.context.jobs.update(job).unwrap();

    assert_eq!(fixture.reconcile(), ReconcileResult::Done);
    assert!(fixture.context.tasks.is_empty());
}

#[test]
fn option_placeholders_resolve_into_task() {
    let mut job = make_job("my-sample-job", None);
    job.spec.template.args = vec!["greet".to_string(), "${option.greeting}".to_string()];
    job.spec.option_values.insert(
        "greeting".to_string(),
        serde_json::Value::String("hello".to_string()),
    );

    // The owning config declares the option.
    let clock = FakeClock::at(CREATE_TIME);
    let context = Context::new(clock.clone());
    let mut config = crate::testing::make_config("my-config", ConcurrencyPolicy::Allow, 1);
    config.spec.option_spec = Some(OptionSpec {
        options: vec![JobOption {
            name: "greeting".to_string(),
            required: false,
            option_type: OptionType::String(StringOptionConfig::default()),
        }],
    });
    let config = context.job_configs.create(config).unwrap();
    job.spec.config_ref = Some(furiko_core::job::ConfigRef {
        name: config.metadata.name.clone(),
        uid: config.metadata.uid.clone(),
    });
    job.status.start_time = Some(at(START_TIME));
    let created = context.jobs.create(job).unwrap();

    let reconciler = JobReconciler::new(context.clone(), context.task_executor());
    reconciler.reconcile(&created.metadata.key()).unwrap();

    let task = context.tasks.get("test/my-sample-job-1").unwrap();
    assert_eq!(task.spec.args, vec!["greet", "hello"]);
}

#[test]
fn invalid_options_terminate_with_admission_error() {
    let mut job = make_job("my-sample-job", None);
    job.spec
        .option_values
        .insert("name".to_string(), serde_json::Value::Null);

    let clock = FakeClock::at(CREATE_TIME);
    let context = Context::new(clock.clone());
    let mut config = crate::testing::make_config("my-config", ConcurrencyPolicy::Allow, 1);
    config.spec.option_spec = Some(OptionSpec {
        options: vec![JobOption {
            name: "name".to_string(),
            required: true,
            option_type: OptionType::String(StringOptionConfig::default()),
        }],
    });
    let config = context.job_configs.create(config).unwrap();
    job.spec.config_ref = Some(furiko_core::job::ConfigRef {
        name: config.metadata.name.clone(),
        uid: config.metadata.uid.clone(),
    });
    job.status.start_time = Some(at(START_TIME));
    let created = context.jobs.create(job).unwrap();

    let reconciler = JobReconciler::new(context.clone(), context.task_executor());
    let result = reconciler.reconcile(&created.metadata.key()).unwrap();
    assert_eq!(result, ReconcileResult::Done);

    let job = context.jobs.get(&created.metadata.key()).unwrap();
    assert_eq!(job.status.phase, JobPhase::AdmissionError);
    match &job.status.condition {
        JobCondition::Finished { result, reason, .. } => {
            assert_eq!(*result, JobResult::Failed);
            assert_eq!(reason, "InvalidJobOptions");
        }
        other => panic!("expected finished condition, got {:?}", other),
    }

    // Permanent: no task is ever created, and re-reconciling stays put.
    assert!(context.tasks.is_empty());
    reconciler.reconcile(&created.metadata.key()).unwrap();
    assert!(context.tasks.is_empty());
}

#[test]
fn pending_timeout_kills_pending_task() {
    let fixture = Fixture::new();
    fixture.reconcile();

    // Default pending timeout is 900s from task creation.
    fixture.clock.set(at(LATER_15M));
    fixture.reconcile();

    let task = fixture.task();
    assert!(task.is_kill_requested());
    assert!(task.is_killed_from_pending_timeout());
    assert_eq!(task.kill_timestamp(), Some(at(CREATE_TIME) + Duration::seconds(900)));
}

#[test]
fn pending_timeout_zero_disables_kill() {
    let mut job = make_job("my-sample-job", None);
    job.spec.template.pending_timeout_seconds = Some(0);
    let fixture = Fixture::with_job(job);
    fixture.reconcile();

    fixture.clock.set(at(LATER_15M));
    fixture.reconcile();

    assert!(!fixture.task().is_kill_requested());
}

#[test]
fn running_task_is_not_pending_timed_out() {
    let fixture = Fixture::new();
    fixture.reconcile();
    fixture.start_task();

    fixture.clock.set(at(LATER_15M));
    fixture.reconcile();

    assert!(!fixture.task().is_kill_requested());
}

#[test]
fn explicit_kill_wins_over_pending_timeout() {
    let fixture = Fixture::new();
    fixture.reconcile();
    fixture.set_kill_timestamp(KILL_TIME);

    // Both the pending timeout and the explicit kill are due.
    fixture.clock.set(at(LATER_15M));
    fixture.reconcile();

    let task = fixture.task();
    assert_eq!(task.kill_timestamp(), Some(at(KILL_TIME)));
    assert!(!task.is_killed_from_pending_timeout());
}

#[test]
fn kill_flow_soft_kill_then_delete_then_force_delete() {
    let fixture = Fixture::new();
    fixture.reconcile();
    fixture.start_task();
    fixture.set_kill_timestamp(KILL_TIME);

    // Before the kill time nothing happens; the reconciler waits for it.
    fixture.clock.set(at(NOW));
    let result = fixture.reconcile();
    assert!(!fixture.task().is_kill_requested());
    assert_eq!(result, ReconcileResult::RequeueAfter(Duration::seconds(5)));

    // Stage 1 at T: annotate and bound the runtime.
    fixture.clock.set(at(KILL_TIME));
    fixture.reconcile();
    let task = fixture.task();
    assert_eq!(task.kill_timestamp(), Some(at(KILL_TIME)));
    assert_eq!(task.spec.active_deadline_seconds, Some(9));
    assert!(!task.metadata.is_deleting());

    // Stage 2 at T + deleteKillingTasksTimeoutSeconds: delete.
    fixture.clock.set(at(KILL_TIME) + Duration::seconds(30));
    fixture.reconcile();
    let task = fixture.task();
    assert!(task.metadata.is_deleting());
    let job = fixture.job();
    let deleted_status = job.status.tasks[0].deleted_status.as_ref().unwrap();
    assert_eq!(deleted_status.reason, "Deleted");
    assert_eq!(deleted_status.result, Some(JobResult::Killed));

    // Stage 3 after forceDeleteKillingTasksTimeoutSeconds past deletion.
    fixture
        .clock
        .set(at(KILL_TIME) + Duration::seconds(30 + 60));
    fixture.reconcile();
    assert!(fixture.context.tasks.is_empty());

    let job = fixture.job();
    let deleted_status = job.status.tasks[0].deleted_status.as_ref().unwrap();
    assert_eq!(deleted_status.reason, "ForceDeleted");
    assert_eq!(job.status.phase, JobPhase::Killed);
    assert_eq!(job.status.condition.finished_result(), Some(JobResult::Killed));
}

#[test]
fn forbid_force_deletion_stays_in_delete_stage() {
    let mut job = make_job("my-sample-job", None);
    job.spec.template.forbid_force_deletion = true;
    let fixture = Fixture::with_job(job);
    fixture.reconcile();
    fixture.start_task();
    fixture.set_kill_timestamp(KILL_TIME);

    fixture.clock.set(at(KILL_TIME));
    fixture.reconcile();
    fixture.clock.set(at(KILL_TIME) + Duration::seconds(30));
    fixture.reconcile();

    // Way past the force-delete deadline: the task must survive.
    fixture.clock.set(at(KILL_TIME) + Duration::seconds(30 + 600));
    let result = fixture.reconcile();
    assert!(fixture.context.tasks.get(&fixture.task_key()).is_some());
    assert!(matches!(result, ReconcileResult::RequeueAfter(_)));
}

#[test]
fn job_deletion_kills_live_tasks_and_releases_finalizer() {
    let fixture = Fixture::new();
    fixture.reconcile();
    fixture.start_task();

    // Host-side delete: the finalizer intercepts it.
    fixture.clock.set(at(KILL_TIME));
    fixture.context.jobs.delete(&fixture.job_key).unwrap();
    let job = fixture.job();
    assert!(job.metadata.is_deleting());
    assert!(job.metadata.has_finalizer(DELETE_DEPENDENTS_FINALIZER));

    // The deletion timestamp acts as the kill time.
    fixture.reconcile();
    assert_eq!(fixture.task().kill_timestamp(), Some(at(KILL_TIME)));

    // Delete, then force-delete the task as the stages elapse.
    fixture.clock.set(at(KILL_TIME) + Duration::seconds(30));
    fixture.reconcile();
    fixture.clock.set(at(KILL_TIME) + Duration::seconds(30 + 60));
    fixture.reconcile();
    assert!(fixture.context.tasks.is_empty());

    // With every task reaped and recorded, the finalizer is released and
    // the store completes the deletion.
    fixture.reconcile();
    assert!(fixture.context.jobs.get(&fixture.job_key).is_none());
}

#[test]
fn ttl_zero_deletes_immediately_after_finish() {
    let mut job = make_job("my-sample-job", None);
    job.spec.ttl_seconds_after_finished = Some(0);
    let fixture = Fixture::with_job(job);
    fixture.reconcile();
    fixture.start_task();

    // The task succeeds.
    let mut task = fixture.task();
    task.status.phase = TaskPhase::Succeeded;
    task.status.finish_time = Some(at("2021-02-09T04:06:18Z"));
    fixture.context.tasks.update(task).unwrap();

    fixture.clock.set(at("2021-02-09T04:06:18Z"));
    fixture.reconcile();

    // Finished and TTL-expired at once: the job enters deletion.
    assert!(fixture.job().metadata.is_deleting());
}

#[test]
fn ttl_waits_out_the_grace_period() {
    let fixture = Fixture::new();
    fixture.reconcile();
    fixture.start_task();

    let mut task = fixture.task();
    task.status.phase = TaskPhase::Succeeded;
    task.status.finish_time = Some(at("2021-02-09T04:06:18Z"));
    fixture.context.tasks.update(task).unwrap();

    fixture.clock.set(at("2021-02-09T04:06:18Z"));
    let result = fixture.reconcile();

    let job = fixture.job();
    assert_eq!(job.status.phase, JobPhase::Succeeded);
    assert!(!job.metadata.is_deleting());
    // Default TTL is 3600s from finish.
    assert_eq!(
        result,
        ReconcileResult::RequeueAfter(Duration::seconds(3600))
    );

    fixture.clock.advance(Duration::seconds(3600));
    fixture.reconcile();
    assert!(fixture.job().metadata.is_deleting());
}

#[test]
fn finished_condition_brackets_first_creation_to_last_finish() {
    let fixture = Fixture::new();
    fixture.reconcile();
    fixture.start_task();

    let finish = at("2021-02-09T04:06:18Z");
    let mut task = fixture.task();
    task.status.phase = TaskPhase::Succeeded;
    task.status.finish_time = Some(finish);
    fixture.context.tasks.update(task).unwrap();

    fixture.clock.set(finish);
    fixture.reconcile();

    match &fixture.job().status.condition {
        JobCondition::Finished {
            created_at,
            finished_at,
            result,
            ..
        } => {
            assert_eq!(*created_at, Some(at(CREATE_TIME)));
            assert_eq!(*finished_at, finish);
            assert_eq!(*result, JobResult::Succeeded);
        }
        other => panic!("expected finished condition, got {:?}", other),
    }
}
