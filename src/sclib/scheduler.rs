use crate::sclib::{
    compare_scaffold, ComparisonRow, PairOverlaps, RcError, ScaffoldOutcome, ScaffoldTask,
    SnpLocation,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Work done for a single scaffold
pub type ScaffoldJob = Arc<dyn Fn(&ScaffoldTask) -> Result<ScaffoldOutcome, RcError> + Send + Sync>;

type InputType = Option<(usize, ScaffoldTask)>;

enum WorkerMsg {
    Started(usize),
    Done(usize, ScaffoldOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Run on the calling thread
    Inline,
    Threads(usize),
}

impl PoolKind {
    pub fn for_threads(threads: usize) -> Self {
        if threads > 1 {
            PoolKind::Threads(threads)
        } else {
            PoolKind::Inline
        }
    }

    /// The smaller pool failed scaffolds are retried on
    pub fn retry(&self) -> Self {
        match self {
            PoolKind::Inline => PoolKind::Inline,
            PoolKind::Threads(n) => PoolKind::Threads((n / 2).max(1)),
        }
    }
}

/// Everything produced by a scheduler run
#[derive(Debug, Default)]
pub struct ComparisonSet {
    pub rows: Vec<ComparisonRow>,
    pub snp_locations: Vec<SnpLocation>,
    /// scaffold -> pair -> mismatch level -> positions
    pub coverage_overlaps: IndexMap<String, PairOverlaps>,
    pub compared: Vec<String>,
    pub skipped: Vec<String>,
    /// Scaffolds without a result after the retry
    pub failed: Vec<String>,
}

impl ComparisonSet {
    fn absorb(&mut self, outcomes: Vec<ScaffoldOutcome>) {
        for outcome in outcomes {
            match outcome {
                ScaffoldOutcome::Compared(cmp) => {
                    self.compared.push(cmp.scaffold.clone());
                    self.rows.extend(cmp.rows);
                    self.snp_locations.extend(cmp.snp_locations);
                    if !cmp.pair_overlaps.is_empty() {
                        self.coverage_overlaps.insert(cmp.scaffold, cmp.pair_overlaps);
                    }
                }
                ScaffoldOutcome::Skipped(name) => self.skipped.push(name),
                ScaffoldOutcome::Failed(_) => {}
            }
        }
    }

    /// Requested scaffolds that were neither compared nor skipped
    fn missing(&self, requested: &[String]) -> Vec<String> {
        let done: HashSet<&str> = self
            .compared
            .iter()
            .chain(self.skipped.iter())
            .map(|s| s.as_str())
            .collect();
        requested
            .iter()
            .filter(|s| !done.contains(s.as_str()))
            .cloned()
            .collect()
    }
}

/// Run one job and turn any error or panic into a failed outcome
pub fn run_guarded(job: &ScaffoldJob, task: &ScaffoldTask) -> ScaffoldOutcome {
    match catch_unwind(AssertUnwindSafe(|| (**job)(task))) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!("whole scaffold exception {}: {}", task.scaffold, e);
            ScaffoldOutcome::Failed(task.scaffold.clone())
        }
        Err(_) => {
            error!("whole scaffold exception {}: worker panicked", task.scaffold);
            ScaffoldOutcome::Failed(task.scaffold.clone())
        }
    }
}

/// Fans scaffold tasks out to a worker pool and gathers the outcomes.
///
/// Scaffolds that fail on the first pass are tried once more on a smaller pool.
/// Whatever still has no result is reported in `ComparisonSet::failed`.
pub struct ComparisonScheduler {
    job: ScaffoldJob,
    pool: PoolKind,
    task_timeout: Option<Duration>,
    progress: bool,
}

impl ComparisonScheduler {
    pub fn new(threads: usize) -> Self {
        Self {
            job: Arc::new(compare_scaffold),
            pool: PoolKind::for_threads(threads),
            task_timeout: None,
            progress: true,
        }
    }

    pub fn with_job(mut self, job: ScaffoldJob) -> Self {
        self.job = job;
        self
    }

    pub fn with_pool(mut self, pool: PoolKind) -> Self {
        self.pool = pool;
        self
    }

    /// Tasks running longer than this are marked failed. Only applies to thread pools
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(&self, tasks: Vec<ScaffoldTask>) -> ComparisonSet {
        let requested: Vec<String> = tasks.iter().map(|t| t.scaffold.clone()).collect();
        let level = if self.progress {
            log::Level::Info
        } else {
            log::Level::Debug
        };

        let mut ret = ComparisonSet::default();
        ret.absorb(self.run_pass(tasks.clone(), self.pool));

        let failed = ret.missing(&requested);
        if !failed.is_empty() {
            warn!(
                "{} scaffolds failed, retrying on a smaller pool: {}",
                failed.len(),
                failed.join(", ")
            );
            let failed: HashSet<String> = failed.into_iter().collect();
            let retry: Vec<ScaffoldTask> = tasks
                .into_iter()
                .filter(|t| failed.contains(&t.scaffold))
                .collect();
            ret.absorb(self.run_pass(retry, self.pool.retry()));
        }

        ret.failed = ret.missing(&requested);
        log!(
            level,
            "{} scaffolds compared, {} skipped",
            ret.compared.len(),
            ret.skipped.len()
        );
        if !ret.failed.is_empty() {
            warn!(
                "{} scaffolds failed twice and are left out: {}",
                ret.failed.len(),
                ret.failed.join(", ")
            );
        }
        ret
    }

    fn run_pass(&self, tasks: Vec<ScaffoldTask>, pool: PoolKind) -> Vec<ScaffoldOutcome> {
        if tasks.is_empty() {
            return vec![];
        }
        let pbar = self.progress_bar(tasks.len() as u64);
        let ret = match pool {
            PoolKind::Inline => tasks
                .iter()
                .map(|task| {
                    let outcome = run_guarded(&self.job, task);
                    pbar.inc(1);
                    outcome
                })
                .collect(),
            PoolKind::Threads(n) => self.run_threads(tasks, n, &pbar),
        };
        pbar.finish();
        ret
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let sty = ProgressStyle::with_template(
            " [{elapsed_precise}] {bar:44.cyan/blue} > {pos}/{len} scaffolds",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        ProgressBar::new(len).with_style(sty)
    }

    fn run_threads(
        &self,
        tasks: Vec<ScaffoldTask>,
        threads: usize,
        pbar: &ProgressBar,
    ) -> Vec<ScaffoldOutcome> {
        let names: Vec<String> = tasks.iter().map(|t| t.scaffold.clone()).collect();
        let workers = threads.min(tasks.len()).max(1);

        let (task_sender, task_receiver): (Sender<InputType>, Receiver<InputType>) = unbounded();
        let (result_sender, result_receiver): (Sender<WorkerMsg>, Receiver<WorkerMsg>) =
            unbounded();

        debug!("spawning {} threads", workers);
        let task_handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|_| {
                let m_job = self.job.clone();
                let m_receiver = task_receiver.clone();
                let m_result_sender = result_sender.clone();

                thread::spawn(move || loop {
                    match m_receiver.recv() {
                        Ok(None) | Err(_) => break,
                        Ok(Some((idx, task))) => {
                            // The collector may have given up on us
                            if m_result_sender.send(WorkerMsg::Started(idx)).is_err() {
                                break;
                            }
                            let outcome = run_guarded(&m_job, &task);
                            if m_result_sender.send(WorkerMsg::Done(idx, outcome)).is_err() {
                                break;
                            }
                        }
                    }
                })
            })
            .collect();
        drop(result_sender);

        for (idx, task) in tasks.into_iter().enumerate() {
            let _ = task_sender.send(Some((idx, task)));
        }
        for _ in 0..workers {
            let _ = task_sender.send(None);
        }

        let mut pending: HashSet<usize> = (0..names.len()).collect();
        let mut running: HashMap<usize, Instant> = HashMap::new();
        let mut stuck: HashSet<usize> = HashSet::new();
        let mut ret = Vec::with_capacity(names.len());

        while !pending.is_empty() {
            let msg = match self.task_timeout {
                None => result_receiver
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
                Some(limit) => {
                    let wait = running
                        .values()
                        .map(|start| limit.saturating_sub(start.elapsed()))
                        .min()
                        .unwrap_or(limit);
                    result_receiver.recv_timeout(wait)
                }
            };

            match msg {
                Ok(WorkerMsg::Started(idx)) => {
                    running.insert(idx, Instant::now());
                }
                Ok(WorkerMsg::Done(idx, outcome)) => {
                    running.remove(&idx);
                    stuck.remove(&idx);
                    if pending.remove(&idx) {
                        ret.push(outcome);
                        pbar.inc(1);
                    } else {
                        debug!("dropping late result for {}", names[idx]);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let Some(limit) = self.task_timeout else {
                        continue;
                    };
                    let expired: Vec<usize> = running
                        .iter()
                        .filter(|(_, start)| start.elapsed() >= limit)
                        .map(|(idx, _)| *idx)
                        .collect();
                    for idx in expired {
                        running.remove(&idx);
                        pending.remove(&idx);
                        stuck.insert(idx);
                        error!("whole scaffold exception {}: exceeded {:?}", names[idx], limit);
                        ret.push(ScaffoldOutcome::Failed(names[idx].clone()));
                        pbar.inc(1);
                    }

                    // Every worker is stuck so nothing queued will start
                    if stuck.len() >= workers {
                        error!(
                            "all {} workers timed out, abandoning {} queued scaffolds",
                            workers,
                            pending.len()
                        );
                        let mut left: Vec<usize> = pending.drain().collect();
                        left.sort_unstable();
                        for idx in left {
                            ret.push(ScaffoldOutcome::Failed(names[idx].clone()));
                            pbar.inc(1);
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let mut left: Vec<usize> = pending.drain().collect();
                    left.sort_unstable();
                    for idx in left {
                        error!("whole scaffold exception {}: no result", names[idx]);
                        ret.push(ScaffoldOutcome::Failed(names[idx].clone()));
                    }
                }
            }
        }

        if stuck.is_empty() {
            for handle in task_handles {
                if handle.join().is_err() {
                    error!("worker thread panicked");
                }
            }
        } else {
            // Leave stuck workers behind. Empty the queue so they exit once they return
            while task_receiver.try_recv().is_ok() {}
            warn!("{} workers still running abandoned scaffolds", stuck.len());
        }

        ret
    }
}
