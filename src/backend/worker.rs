//! Threaded attribute I/O
//!
//! Each variable and each response gets a persistent worker thread that owns
//! its attribute for the whole run. The coordinator talks to the workers
//! through crossbeam channels:
//!
//! - one request channel per worker ([`WorkerRequest`])
//! - one shared completion channel back to the coordinator ([`WorkerReply`])
//!
//! A phase (all sets, or all gets) sends one request per participating
//! worker and then blocks until every reply has arrived. Failures travel back
//! on the completion channel, so an attribute error never leaves the
//! coordinator waiting.
//!
//! # Timeouts
//!
//! With a worker timeout configured, a phase that does not complete in time
//! fails with [`SweepError::WorkerTimeout`]. The stuck worker still holds a
//! request, so the pool is poisoned and refuses further work.
//!
//! # Shutdown
//!
//! Dropping the pool drops every request sender; idle workers see the
//! disconnect and exit. Threads are detached rather than joined, so a worker
//! stuck inside an instrument call cannot block shutdown.

use super::attribute::SharedAttribute;
use super::coordinator::{assemble_responses, SkipTracker};
use crate::error::{Result, SweepError};
use crate::types::AttrValue;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Work item sent to a single worker
#[derive(Debug, Clone)]
pub enum WorkerRequest {
    /// Apply a value through the attribute's setter
    Set(AttrValue),
    /// Read through the attribute's getter
    Fetch,
}

/// Completion notice from a worker
#[derive(Debug)]
pub struct WorkerReply {
    /// Index of the worker within its group
    pub slot: usize,
    /// Getter value (`None` for sets) or the attribute's error
    pub result: Result<Option<AttrValue>>,
}

struct WorkerHandle {
    name: String,
    requests: Sender<WorkerRequest>,
}

/// Persistent per-attribute worker threads
pub struct WorkerPool {
    setters: Vec<WorkerHandle>,
    getters: Vec<WorkerHandle>,
    response_names: Vec<String>,
    set_done: Receiver<WorkerReply>,
    get_done: Receiver<WorkerReply>,
    tracker: SkipTracker,
    timeout: Option<Duration>,
    poisoned: bool,
}

impl WorkerPool {
    /// Start one worker per variable and per response
    pub fn spawn(
        variable_names: Vec<String>,
        setters: Vec<SharedAttribute>,
        response_names: Vec<String>,
        getters: Vec<SharedAttribute>,
        tracker: SkipTracker,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let (set_tx, set_done) = crossbeam_channel::unbounded();
        let (get_tx, get_done) = crossbeam_channel::unbounded();

        let setters = spawn_group("set", &variable_names, setters, &set_tx)?;
        let getters = spawn_group("get", &response_names, getters, &get_tx)?;

        tracing::debug!(
            "Started {} setter and {} getter workers",
            setters.len(),
            getters.len()
        );

        Ok(Self {
            setters,
            getters,
            response_names,
            set_done,
            get_done,
            tracker,
            timeout,
            poisoned: false,
        })
    }

    /// Number of live worker threads
    pub fn worker_count(&self) -> usize {
        self.setters.len() + self.getters.len()
    }

    /// Whether an earlier phase timed out
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Dispatch all needed sets and wait for them; returns the number sent
    pub fn set_variables(&mut self, batch: &[Vec<f64>]) -> Result<usize> {
        self.check_usable()?;
        let plan = self.tracker.plan(batch);

        let mut sent = 0;
        for (handle, value) in self.setters.iter().zip(plan) {
            if let Some(value) = value {
                send(handle, WorkerRequest::Set(value))?;
                sent += 1;
            }
        }

        self.collect(true, sent)?;
        Ok(sent)
    }

    /// Ask every response worker for a value and wait for all of them
    pub fn get_responses(&mut self, rows: usize) -> Result<Vec<Vec<f64>>> {
        self.check_usable()?;
        for handle in &self.getters {
            send(handle, WorkerRequest::Fetch)?;
        }

        let replies = self.collect(false, self.getters.len())?;
        let mut values = vec![AttrValue::Scalar(f64::NAN); self.getters.len()];
        for (slot, value) in replies {
            if let Some(value) = value {
                values[slot] = value;
            }
        }
        assemble_responses(&self.response_names, values, rows)
    }

    fn check_usable(&self) -> Result<()> {
        if self.poisoned {
            Err(SweepError::Channel(
                "worker pool is unusable after a timeout".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Wait for `expected` replies on one completion channel.
    ///
    /// Every reply is drained even after a failure so the next phase starts
    /// clean; the first error wins.
    fn collect(&mut self, sets: bool, expected: usize) -> Result<Vec<(usize, Option<AttrValue>)>> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut replies = Vec::with_capacity(expected);
        let mut first_error = None;

        for received in 0..expected {
            let done = if sets { &self.set_done } else { &self.get_done };
            let reply = match deadline {
                Some(deadline) => match done.recv_deadline(deadline) {
                    Ok(reply) => reply,
                    Err(RecvTimeoutError::Timeout) => {
                        self.poisoned = true;
                        tracing::error!(
                            "Attribute workers timed out with {} reply(ies) outstanding",
                            expected - received
                        );
                        return Err(SweepError::WorkerTimeout {
                            pending: expected - received,
                        });
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(SweepError::Channel("completion channel closed".to_string()))
                    }
                },
                None => done
                    .recv()
                    .map_err(|_| SweepError::Channel("completion channel closed".to_string()))?,
            };

            match reply.result {
                Ok(value) => replies.push((reply.slot, value)),
                Err(e) => {
                    let group = if sets { &self.setters } else { &self.getters };
                    let name = group.get(reply.slot).map(|h| h.name.as_str()).unwrap_or("?");
                    tracing::warn!("Attribute worker {} failed: {}", name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(replies),
        }
    }
}

fn send(handle: &WorkerHandle, request: WorkerRequest) -> Result<()> {
    handle
        .requests
        .send(request)
        .map_err(|_| SweepError::WorkerDisconnected(handle.name.clone()))
}

fn spawn_group(
    role: &str,
    names: &[String],
    attributes: Vec<SharedAttribute>,
    done: &Sender<WorkerReply>,
) -> Result<Vec<WorkerHandle>> {
    names
        .iter()
        .zip(attributes)
        .enumerate()
        .map(|(slot, (name, attribute))| {
            let (tx, rx) = crossbeam_channel::unbounded();
            let done = done.clone();
            let worker_name = name.clone();
            std::thread::Builder::new()
                .name(format!("{}-{}", role, name))
                .spawn(move || worker_loop(slot, worker_name, attribute, rx, done))?;
            Ok(WorkerHandle {
                name: name.clone(),
                requests: tx,
            })
        })
        .collect()
}

/// Body of one worker thread: serve requests until the pool goes away.
///
/// A panicking attribute still produces a reply, then the worker exits.
fn worker_loop(
    slot: usize,
    name: String,
    attribute: SharedAttribute,
    requests: Receiver<WorkerRequest>,
    done: Sender<WorkerReply>,
) {
    while let Ok(request) = requests.recv() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match request {
            WorkerRequest::Set(value) => attribute.set(&value).map(|_| None),
            WorkerRequest::Fetch => attribute.get().map(Some),
        }));
        let (result, panicked) = match outcome {
            Ok(result) => (result, false),
            Err(_) => {
                tracing::error!("Attribute worker {} panicked, shutting it down", name);
                (Err(SweepError::WorkerDisconnected(name.clone())), true)
            }
        };
        if done.send(WorkerReply { slot, result }).is_err() || panicked {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FnAttribute, SimulatedAttribute, SimulatedPattern};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn pool(
        setters: Vec<(&str, SharedAttribute)>,
        getters: Vec<(&str, SharedAttribute)>,
        timeout: Option<Duration>,
    ) -> WorkerPool {
        let flags = vec![false; setters.len()];
        let (vn, va): (Vec<_>, Vec<_>) = setters
            .into_iter()
            .map(|(n, a)| (n.to_string(), a))
            .unzip();
        let (rn, ra): (Vec<_>, Vec<_>) = getters
            .into_iter()
            .map(|(n, a)| (n.to_string(), a))
            .unzip();
        WorkerPool::spawn(vn, va, rn, ra, SkipTracker::new(flags), timeout).unwrap()
    }

    #[test]
    fn test_threaded_set_and_get() {
        let a = Arc::new(SimulatedAttribute::recorder());
        let b = Arc::new(SimulatedAttribute::recorder());
        let mut pool = pool(
            vec![("a", a.clone()), ("b", b.clone())],
            vec![("ra", a.clone()), ("rb", b.clone())],
            None,
        );
        assert_eq!(pool.worker_count(), 4);

        assert_eq!(pool.set_variables(&[vec![1.0, 2.0]]).unwrap(), 2);
        let responses = pool.get_responses(1).unwrap();
        assert_eq!(responses, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_sets_finish_before_gets_start() {
        let sets_done = Arc::new(AtomicUsize::new(0));
        let counter = sets_done.clone();
        let slow: SharedAttribute = Arc::new(FnAttribute::setter(move |_| {
            std::thread::sleep(Duration::from_millis(20));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let observed = sets_done.clone();
        let watcher: SharedAttribute = Arc::new(FnAttribute::getter(move || {
            Ok(AttrValue::Scalar(observed.load(Ordering::SeqCst) as f64))
        }));

        let mut pool = pool(vec![("slow", slow)], vec![("seen", watcher)], None);
        pool.set_variables(&[vec![0.0]]).unwrap();
        assert_eq!(pool.get_responses(1).unwrap(), vec![vec![1.0]]);
    }

    #[test]
    fn test_worker_error_is_returned() {
        let bad: SharedAttribute = Arc::new(FnAttribute::getter(|| {
            Err(SweepError::attribute("bad", "no signal"))
        }));
        let good: SharedAttribute =
            Arc::new(SimulatedAttribute::new(SimulatedPattern::Constant(1.0)));
        let mut pool = pool(vec![], vec![("good", good), ("bad", bad)], None);

        let err = pool.get_responses(1).unwrap_err();
        assert!(matches!(err, SweepError::Attribute { ref name, .. } if name == "bad"));
        // The pool keeps working after an attribute error
        assert!(!pool.is_poisoned());
    }

    #[test]
    fn test_panicking_attribute_does_not_hang_pool() {
        let echo = Arc::new(SimulatedAttribute::recorder());
        let broken: SharedAttribute =
            Arc::new(FnAttribute::getter(|| panic!("driver bug")));
        let mut pool = pool(
            vec![("x", echo.clone())],
            vec![("echo", echo), ("broken", broken)],
            None,
        );
        pool.set_variables(&[vec![1.0]]).unwrap();

        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let _ = tx.send(pool.get_responses(1));
        });
        let result = rx
            .recv_timeout(Duration::from_secs(3))
            .expect("get_responses returned");
        assert!(matches!(
            result,
            Err(SweepError::WorkerDisconnected(ref name)) if name == "broken"
        ));
    }

    #[test]
    fn test_timeout_poisons_pool() {
        let stuck: SharedAttribute = Arc::new(
            SimulatedAttribute::new(SimulatedPattern::Constant(0.0))
                .with_latency(Duration::from_millis(500)),
        );
        let mut pool = pool(vec![], vec![("stuck", stuck)], Some(Duration::from_millis(20)));

        let err = pool.get_responses(1).unwrap_err();
        assert!(matches!(err, SweepError::WorkerTimeout { pending: 1 }));
        assert!(pool.is_poisoned());
        assert!(pool.get_responses(1).is_err());
    }
}
