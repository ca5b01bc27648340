//! Run orchestration: enumerate, decide fates concurrently, destroy
//! concurrently, report.
//!
//! Both the cron scheduler and the HTTP handlers call into [`Destroyer`];
//! the run procedure itself lives in [`Destroyer::execute`].

use lemur_core::fate::FateEngine;
use lemur_core::infrastructure::Infrastructure;
use lemur_core::reporter::Reporter;
use lemur_core::state::RunState;
use lemur_core::task::{Task, TaskStore};
use lemur_core::types::{State, Trigger};
use lemur_core::{LemurError, Member};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SPACE: char = '\u{00A0}';
const BULLET: char = '\u{2022}';

pub struct Destroyer {
    infrastructure: Arc<dyn Infrastructure>,
    fate_engine: Arc<dyn FateEngine>,
    reporter: Arc<dyn Reporter>,
    tasks: Arc<TaskStore>,
    run_state: Arc<RunState>,
    dry_run: bool,
    workers: Arc<Semaphore>,
}

impl Destroyer {
    pub fn new(
        infrastructure: Arc<dyn Infrastructure>,
        fate_engine: Arc<dyn FateEngine>,
        reporter: Arc<dyn Reporter>,
        tasks: Arc<TaskStore>,
        run_state: Arc<RunState>,
    ) -> Self {
        Self {
            infrastructure,
            fate_engine,
            reporter,
            tasks,
            run_state,
            dry_run: false,
            workers: Arc::new(Semaphore::new(8)),
        }
    }

    /// Evaluate fates but never call `destroy`.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Upper bound on destroy calls in flight at once.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.workers = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn tasks(&self) -> &Arc<TaskStore> {
        &self.tasks
    }

    pub fn run_state(&self) -> &Arc<RunState> {
        &self.run_state
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Scheduled trigger: create a `SCHEDULED` task and run it to completion.
    pub async fn destroy(&self) -> lemur_core::Result<Task> {
        let task = self.tasks.create(Trigger::Scheduled);
        self.execute(task.id).await
    }

    /// On-demand trigger: create a `MANUAL` task, run it in the background and
    /// return the freshly created task so the caller can poll it.
    pub fn chaos(self: &Arc<Self>) -> Task {
        let task = self.tasks.create(Trigger::Manual);
        let destroyer = Arc::clone(self);
        let id = task.id;
        tokio::spawn(async move {
            if let Err(e) = destroyer.execute(id).await {
                error!(task = id, error = %e, "manual run bookkeeping failed");
            }
        });
        task
    }

    /// Run procedure for an existing task. Returns the task in its final state.
    pub async fn execute(&self, task_id: u64) -> lemur_core::Result<Task> {
        let identifier = Uuid::new_v4();

        if self.run_state.get() == State::Stopped {
            info!(run = %identifier, task = task_id, "chaos lemur is stopped, skipping run");
            return self.tasks.complete(task_id);
        }

        self.tasks.start(task_id)?;
        info!(run = %identifier, task = task_id, "beginning run");

        match self.destroy_members(identifier).await {
            Ok(destroyed) => {
                let task = self.tasks.complete(task_id)?;
                self.report(identifier, &destroyed).await;
                info!(
                    run = %identifier,
                    task = task_id,
                    destroyed = destroyed.len(),
                    "run complete"
                );
                Ok(task)
            }
            Err(e) => {
                error!(run = %identifier, task = task_id, error = %e, "run failed");
                self.tasks.fail(task_id, format!("{e:#}"))
            }
        }
    }

    async fn destroy_members(&self, identifier: Uuid) -> anyhow::Result<Vec<Member>> {
        let infrastructure = Arc::clone(&self.infrastructure);
        let members = tokio::task::spawn_blocking(move || infrastructure.members())
            .await
            .map_err(|e| anyhow::anyhow!("member enumeration aborted: {e}"))??;
        debug!(run = %identifier, count = members.len(), "member snapshot");

        let doomed = self.decide_fates(identifier, members).await?;

        if self.dry_run {
            for member in &doomed {
                info!(run = %identifier, member = %member, "dry run, would destroy");
            }
            return Ok(Vec::new());
        }

        let destroyed = Arc::new(Mutex::new(Vec::with_capacity(doomed.len())));
        let mut units = JoinSet::new();
        for member in doomed {
            let infrastructure = Arc::clone(&self.infrastructure);
            let workers = Arc::clone(&self.workers);
            let destroyed = Arc::clone(&destroyed);
            units.spawn(async move {
                // The semaphore is never closed.
                let _permit = workers.acquire_owned().await.ok();
                debug!(run = %identifier, member = %member, "destroying");
                let target = member.clone();
                match tokio::task::spawn_blocking(move || infrastructure.destroy(&target)).await {
                    Ok(Ok(())) => {
                        info!(run = %identifier, member = %member, "destroyed");
                        destroyed.lock().await.push(member);
                    }
                    Ok(Err(e @ LemurError::Destruction { .. })) => {
                        warn!(run = %identifier, member = %member, error = %e, "destroy failed");
                    }
                    Ok(Err(e)) => {
                        error!(run = %identifier, member = %member, error = %e, "destroy failed unexpectedly");
                    }
                    Err(e) => {
                        error!(run = %identifier, member = %member, error = %e, "destroy aborted");
                    }
                }
            });
        }

        while let Some(joined) = units.join_next().await {
            if let Err(e) = joined {
                error!(run = %identifier, error = %e, "destroy worker aborted");
            }
        }

        let mut destroyed = std::mem::take(&mut *destroyed.lock().await);
        destroyed.sort();
        Ok(destroyed)
    }

    /// Evaluate every member's fate concurrently and return the members
    /// selected for destruction. All decisions resolve before this returns,
    /// so no destroy call can overlap fate evaluation.
    ///
    /// A fate error means the configuration cannot yield a probability and
    /// fails the run; a panicking evaluation only excludes that member.
    async fn decide_fates(
        &self,
        identifier: Uuid,
        members: Vec<Member>,
    ) -> lemur_core::Result<Vec<Member>> {
        let mut units = JoinSet::new();
        for member in members {
            let fate_engine = Arc::clone(&self.fate_engine);
            let workers = Arc::clone(&self.workers);
            units.spawn(async move {
                let _permit = workers.acquire_owned().await.ok();
                let label = member.to_string();
                let verdict = tokio::task::spawn_blocking(move || {
                    fate_engine
                        .should_destroy(&member)
                        .map(|doomed| doomed.then_some(member))
                })
                .await;
                (label, verdict)
            });
        }

        let mut doomed = Vec::new();
        let mut failure = None;
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((_, Ok(Ok(Some(member))))) => doomed.push(member),
                Ok((label, Ok(Ok(None)))) => {
                    debug!(run = %identifier, member = %label, "spared");
                }
                Ok((_, Ok(Err(e)))) => {
                    failure.get_or_insert(e);
                }
                Ok((label, Err(e))) => {
                    error!(run = %identifier, member = %label, error = %e, "fate evaluation aborted");
                }
                Err(e) => {
                    error!(run = %identifier, error = %e, "fate worker aborted");
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(doomed),
        }
    }

    async fn report(&self, identifier: Uuid, destroyed: &[Member]) {
        let reporter = Arc::clone(&self.reporter);
        let title = title(&identifier);
        let body = message(destroyed);
        match tokio::task::spawn_blocking(move || reporter.send_event(&title, &body)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(run = %identifier, error = %e, "report failed"),
            Err(e) => warn!(run = %identifier, error = %e, "report aborted"),
        }
    }
}

pub fn title(identifier: &Uuid) -> String {
    format!("Chaos Lemur Destruction ({identifier})")
}

/// Bulleted listing of destroyed members, in the order given.
pub fn message(members: &[Member]) -> String {
    let size = members.len();
    let noun = if size == 1 { "VM" } else { "VMs" };
    let lines: Vec<String> = members
        .iter()
        .map(|m| format!("{SPACE}{SPACE}{BULLET}{SPACE}{}", m.name))
        .collect();
    format!("\n{size} {noun} destroyed:\n{}", lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lemur_core::types::TaskStatus;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct StubInfrastructure {
        members: Vec<Member>,
        failing: HashSet<String>,
        broken: HashSet<String>,
        panicking: HashSet<String>,
        enumerations: AtomicUsize,
        destroyed: StdMutex<Vec<Member>>,
        unreachable: bool,
    }

    impl Infrastructure for StubInfrastructure {
        fn members(&self) -> lemur_core::Result<Vec<Member>> {
            self.enumerations.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(LemurError::Director("connection refused".to_string()));
            }
            Ok(self.members.clone())
        }

        fn destroy(&self, member: &Member) -> lemur_core::Result<()> {
            self.destroyed.lock().unwrap().push(member.clone());
            if self.panicking.contains(&member.name) {
                panic!("backend blew up");
            }
            if self.broken.contains(&member.name) {
                return Err(LemurError::Infrastructure("quota exceeded".to_string()));
            }
            if self.failing.contains(&member.name) {
                return Err(LemurError::Destruction {
                    member: member.to_string(),
                    reason: "already stopped".to_string(),
                });
            }
            Ok(())
        }
    }

    struct StubFate(HashSet<String>);

    impl FateEngine for StubFate {
        fn should_destroy(&self, member: &Member) -> lemur_core::Result<bool> {
            Ok(self.0.contains(&member.name))
        }
    }

    struct BrokenFate;

    impl FateEngine for BrokenFate {
        fn should_destroy(&self, _member: &Member) -> lemur_core::Result<bool> {
            Err(LemurError::NoCandidate)
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: StdMutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl Reporter for RecordingReporter {
        fn send_event(&self, title: &str, body: &str) -> lemur_core::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            if self.fail {
                return Err(LemurError::Reporter("unavailable".to_string()));
            }
            Ok(())
        }
    }

    fn m1() -> Member {
        Member::new("id-1", "test-deployment", "job-a", "m1")
    }

    fn m2() -> Member {
        Member::new("id-2", "test-deployment", "job-b", "m2")
    }

    fn select(names: &[&str]) -> Arc<StubFate> {
        Arc::new(StubFate(names.iter().map(|s| s.to_string()).collect()))
    }

    fn destroyer(
        infra: &Arc<StubInfrastructure>,
        fate: Arc<dyn FateEngine>,
        reporter: &Arc<RecordingReporter>,
        state: State,
    ) -> Destroyer {
        Destroyer::new(
            infra.clone(),
            fate,
            reporter.clone(),
            Arc::new(TaskStore::new()),
            Arc::new(RunState::new(state)),
        )
    }

    #[tokio::test]
    async fn destroys_only_selected_members_and_reports() {
        let infra = Arc::new(StubInfrastructure {
            members: vec![m1(), m2()],
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(&infra, select(&["m1"]), &reporter, State::Started);

        let task = d.destroy().await.unwrap();

        assert_eq!(task.trigger, Trigger::Scheduled);
        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(*infra.destroyed.lock().unwrap(), vec![m1()]);

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].0.starts_with("Chaos Lemur Destruction ("));
        assert_eq!(
            events[0].1,
            "\n1 VM destroyed:\n\u{a0}\u{a0}\u{2022}\u{a0}m1"
        );
    }

    #[tokio::test]
    async fn failed_destructions_are_excluded_but_run_completes() {
        let m3 = Member::new("id-3", "d", "job-c", "m3");
        let m4 = Member::new("id-4", "d", "job-d", "m4");
        let infra = Arc::new(StubInfrastructure {
            members: vec![m1(), m2(), m3.clone(), m4.clone()],
            failing: ["m1".to_string()].into(),
            broken: ["m3".to_string()].into(),
            panicking: ["m4".to_string()].into(),
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(
            &infra,
            select(&["m1", "m2", "m3", "m4"]),
            &reporter,
            State::Started,
        );

        let task = d.destroy().await.unwrap();

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(infra.destroyed.lock().unwrap().len(), 4);
        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].1.contains("1 VM destroyed"));
        assert!(events[0].1.contains("m2"));
        assert!(!events[0].1.contains("m1"));
        assert!(!events[0].1.contains("m3"));
        assert!(!events[0].1.contains("m4"));
    }

    #[tokio::test]
    async fn dry_run_never_destroys() {
        let infra = Arc::new(StubInfrastructure {
            members: vec![m1(), m2()],
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(&infra, select(&["m1", "m2"]), &reporter, State::Started)
            .with_dry_run(true);

        let task = d.destroy().await.unwrap();

        assert_eq!(task.status, TaskStatus::Complete);
        assert!(infra.destroyed.lock().unwrap().is_empty());
        let events = reporter.events.lock().unwrap();
        assert_eq!(events[0].1, "\n0 VMs destroyed:\n");
    }

    #[tokio::test]
    async fn stopped_state_skips_infrastructure() {
        let infra = Arc::new(StubInfrastructure {
            members: vec![m1()],
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(&infra, select(&["m1"]), &reporter, State::Stopped);

        let task = d.destroy().await.unwrap();

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(infra.enumerations.load(Ordering::SeqCst), 0);
        assert!(infra.destroyed.lock().unwrap().is_empty());
        assert!(reporter.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn state_change_applies_to_next_run() {
        let infra = Arc::new(StubInfrastructure {
            members: vec![m1()],
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(&infra, select(&["m1"]), &reporter, State::Started);

        d.run_state().set(State::Stopped);
        d.destroy().await.unwrap();
        assert_eq!(infra.enumerations.load(Ordering::SeqCst), 0);

        d.run_state().set(State::Started);
        d.destroy().await.unwrap();
        assert_eq!(infra.enumerations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn enumeration_failure_fails_the_task() {
        let infra = Arc::new(StubInfrastructure {
            unreachable: true,
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(&infra, select(&[]), &reporter, State::Started);

        let task = d.destroy().await.unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("connection refused"));
        assert!(reporter.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fate_configuration_error_fails_the_task() {
        let infra = Arc::new(StubInfrastructure {
            members: vec![m1()],
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(&infra, Arc::new(BrokenFate), &reporter, State::Started);

        let task = d.destroy().await.unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(infra.destroyed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reporter_failure_does_not_fail_run() {
        let infra = Arc::new(StubInfrastructure {
            members: vec![m1()],
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter {
            fail: true,
            ..Default::default()
        });
        let d = destroyer(&infra, select(&["m1"]), &reporter, State::Started);

        let task = d.destroy().await.unwrap();
        assert_eq!(task.status, TaskStatus::Complete);
    }

    #[tokio::test]
    async fn manual_trigger_returns_created_task_and_runs_in_background() {
        let infra = Arc::new(StubInfrastructure {
            members: vec![m1(), m2()],
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = Arc::new(destroyer(&infra, select(&["m1"]), &reporter, State::Started));

        let task = d.chaos();
        assert_eq!(task.trigger, Trigger::Manual);
        assert_eq!(task.status, TaskStatus::Created);

        let mut status = task.status;
        for _ in 0..100 {
            status = d.tasks().get(task.id).unwrap().status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(status, TaskStatus::Complete);
        assert_eq!(*infra.destroyed.lock().unwrap(), vec![m1()]);
    }

    /// Destroys "slow" only after `release` is set; everything else returns at once.
    #[derive(Default)]
    struct GatedInfrastructure {
        members: Vec<Member>,
        release: AtomicBool,
        finished: StdMutex<Vec<String>>,
    }

    impl Infrastructure for GatedInfrastructure {
        fn members(&self) -> lemur_core::Result<Vec<Member>> {
            Ok(self.members.clone())
        }

        fn destroy(&self, member: &Member) -> lemur_core::Result<()> {
            if member.name == "slow" {
                let deadline = Instant::now() + Duration::from_secs(5);
                while !self.release.load(Ordering::SeqCst) && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
            self.finished.lock().unwrap().push(member.name.clone());
            Ok(())
        }
    }

    struct SleepyFate(Duration);

    impl FateEngine for SleepyFate {
        fn should_destroy(&self, _member: &Member) -> lemur_core::Result<bool> {
            std::thread::sleep(self.0);
            Ok(true)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_destruction_does_not_hold_up_the_others() {
        let fast = ["a", "b", "c"];
        let mut members: Vec<Member> = fast
            .iter()
            .map(|n| Member::new(*n, "d", "j", *n))
            .collect();
        members.push(Member::new("s", "d", "j", "slow"));
        let infra = Arc::new(GatedInfrastructure {
            members,
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = Arc::new(Destroyer::new(
            infra.clone(),
            select(&["a", "b", "c", "slow"]),
            reporter.clone(),
            Arc::new(TaskStore::new()),
            Arc::new(RunState::default()),
        ));

        let run = tokio::spawn({
            let d = Arc::clone(&d);
            async move { d.destroy().await }
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let done = infra.finished.lock().unwrap().clone();
            if fast.iter().all(|n| done.iter().any(|f| f == n)) {
                break;
            }
            assert!(Instant::now() < deadline, "fast members stuck behind slow one");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!infra.finished.lock().unwrap().iter().any(|n| n == "slow"));
        assert!(reporter.events.lock().unwrap().is_empty());

        infra.release.store(true, Ordering::SeqCst);
        let task = run.await.unwrap().unwrap();

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(infra.finished.lock().unwrap().len(), 4);
        let events = reporter.events.lock().unwrap();
        assert!(events[0].1.contains("4 VMs destroyed"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fate_decisions_run_in_parallel() {
        let members: Vec<Member> = (0..5)
            .map(|i| Member::new(format!("id-{i}"), "d", "j", format!("m{i}")))
            .collect();
        let infra = Arc::new(StubInfrastructure {
            members,
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(
            &infra,
            Arc::new(SleepyFate(Duration::from_millis(200))),
            &reporter,
            State::Started,
        );

        let started = Instant::now();
        let task = d.destroy().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(infra.destroyed.lock().unwrap().len(), 5);
        assert!(elapsed < Duration::from_millis(700), "took {elapsed:?}");
    }

    struct PanickyFate;

    impl FateEngine for PanickyFate {
        fn should_destroy(&self, member: &Member) -> lemur_core::Result<bool> {
            if member.name == "m1" {
                panic!("fate blew up");
            }
            Ok(true)
        }
    }

    #[tokio::test]
    async fn panicking_fate_only_spares_that_member() {
        let infra = Arc::new(StubInfrastructure {
            members: vec![m1(), m2()],
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(&infra, Arc::new(PanickyFate), &reporter, State::Started);

        let task = d.destroy().await.unwrap();

        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(*infra.destroyed.lock().unwrap(), vec![m2()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrency_limit_bounds_parallel_fates() {
        let members: Vec<Member> = (0..4)
            .map(|i| Member::new(format!("id-{i}"), "d", "j", format!("m{i}")))
            .collect();
        let infra = Arc::new(StubInfrastructure {
            members,
            ..Default::default()
        });
        let reporter = Arc::new(RecordingReporter::default());
        let d = destroyer(
            &infra,
            Arc::new(SleepyFate(Duration::from_millis(100))),
            &reporter,
            State::Started,
        )
        .with_max_concurrency(1);

        let started = Instant::now();
        d.destroy().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn message_pluralizes_and_lists_in_order() {
        assert_eq!(message(&[]), "\n0 VMs destroyed:\n");
        let body = message(&[m1(), m2()]);
        assert_eq!(
            body,
            "\n2 VMs destroyed:\n\u{a0}\u{a0}\u{2022}\u{a0}m1\n\u{a0}\u{a0}\u{2022}\u{a0}m2"
        );
    }

    #[test]
    fn title_includes_identifier() {
        let id = Uuid::nil();
        assert_eq!(
            title(&id),
            "Chaos Lemur Destruction (00000000-0000-0000-0000-000000000000)"
        );
    }
}
