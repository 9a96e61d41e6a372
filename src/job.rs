// src/job.rs

//! Cooperative job, progress and cancellation handle
//!
//! A refresh cycle runs as a tree of jobs: the orchestrator holds the root
//! and hands weighted sub-jobs to detection sources and phases. Progress
//! reported by a sub-job is mapped into its slice of the parent's range.
//!
//! Cancellation is cooperative. Nothing is interrupted; work checks
//! [`Job::should_proceed`] at phase boundaries and skips what remains.
//!
//! ```ignore
//! let job = Job::new("Refreshing installed packages");
//! let sub = job.new_sub_job(0.5, "Detecting installer records");
//! if sub.should_proceed() {
//!     // ... do work ...
//!     sub.set_progress(1.0);
//! }
//! sub.complete();
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

struct ParentLink {
    parent: Arc<JobInner>,
    /// Share of the parent's range covered by this job
    weight: f64,
    /// Parent progress when this job was created
    base: f64,
}

struct JobInner {
    title: String,
    parent: Option<ParentLink>,
    progress: Mutex<f64>,
    error: Mutex<Option<String>>,
    completed: AtomicBool,
    /// Shared by every job in one tree
    cancelled: Arc<AtomicBool>,
}

impl JobInner {
    fn set_progress(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        {
            let mut progress = self.progress.lock();
            if fraction <= *progress {
                return;
            }
            *progress = fraction;
        }
        debug!("{}: {:.0}%", self.title, fraction * 100.0);

        if let Some(link) = &self.parent {
            link.parent.set_progress(link.base + fraction * link.weight);
        }
    }

    fn error_message(&self) -> Option<String> {
        self.error.lock().clone()
    }
}

/// Handle to one node of a job tree
///
/// Cloning yields another handle to the same job.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    /// Create a root job
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(JobInner {
                title: title.into(),
                parent: None,
                progress: Mutex::new(0.0),
                error: Mutex::new(None),
                completed: AtomicBool::new(false),
                cancelled: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Create a child job covering `weight` of this job's progress range
    pub fn new_sub_job(&self, weight: f64, title: impl Into<String>) -> Job {
        let title = title.into();
        debug!("{}: starting {}", self.inner.title, title);
        Job {
            inner: Arc::new(JobInner {
                title,
                parent: Some(ParentLink {
                    parent: Arc::clone(&self.inner),
                    weight: weight.clamp(0.0, 1.0),
                    base: self.progress(),
                }),
                progress: Mutex::new(0.0),
                error: Mutex::new(None),
                completed: AtomicBool::new(false),
                cancelled: Arc::clone(&self.inner.cancelled),
            }),
        }
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    /// Whether work should continue: not cancelled and no error recorded
    pub fn should_proceed(&self) -> bool {
        !self.is_cancelled() && self.inner.error.lock().is_none()
    }

    /// Request cancellation of the whole job tree
    pub fn cancel(&self) {
        debug!("{}: cancellation requested", self.inner.title);
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Report progress as a fraction in 0..=1; progress never goes back
    pub fn set_progress(&self, fraction: f64) {
        self.inner.set_progress(fraction);
    }

    pub fn progress(&self) -> f64 {
        *self.inner.progress.lock()
    }

    /// Record a user-visible failure; the first message wins
    pub fn set_error_message(&self, message: impl Into<String>) {
        let message = message.into();
        let mut error = self.inner.error.lock();
        if error.is_none() {
            warn!("{}: {}", self.inner.title, message);
            *error = Some(message);
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.inner.error_message()
    }

    /// Mark the job finished
    ///
    /// An error recorded on this job is copied to its parent if the
    /// parent has none. Completing twice has no further effect.
    pub fn complete(&self) {
        if self.inner.completed.swap(true, Ordering::SeqCst) {
            return;
        }

        match (self.inner.error_message(), &self.inner.parent) {
            (Some(message), Some(link)) => {
                let mut parent_error = link.parent.error.lock();
                if parent_error.is_none() {
                    *parent_error = Some(format!("{}: {}", self.inner.title, message));
                }
            }
            (None, _) => debug!("{}: complete", self.inner.title),
            (Some(_), None) => {}
        }
    }

    /// Set progress to 100% and complete
    pub fn complete_with_progress(&self) {
        self.set_progress(1.0);
        self.complete();
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("title", &self.inner.title)
            .field("progress", &self.progress())
            .field("cancelled", &self.is_cancelled())
            .field("completed", &self.is_completed())
            .finish()
    }
}
