//! Progress reporting for task execution
//!
//! The executor emits a [`TaskExecutionEvent`] at every lifecycle step of a
//! run. Reporters receive them from the scheduling loop, in order.

use std::time::Duration;

use crate::task::TaskKey;

/// Event types that can be reported during task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExecutionEvent {
    /// A run started
    ExecutionStarted { root: TaskKey, total_tasks: usize },
    /// Task execution started
    TaskStarted { key: TaskKey, task_name: String },
    /// Task stored its result
    TaskCompleted {
        key: TaskKey,
        task_name: String,
        duration: Duration,
    },
    /// Task execution failed
    TaskFailed {
        key: TaskKey,
        task_name: String,
        error: String,
        duration: Duration,
    },
    /// A run finished, successfully or not
    ExecutionFinished {
        total_tasks: usize,
        completed_tasks: usize,
        failed_tasks: usize,
        duration: Duration,
    },
}

/// Trait for reporting task execution progress
pub trait ExecutionReporter: Send + Sync {
    /// Report a task execution event
    fn report_event(&mut self, event: TaskExecutionEvent);

    /// Called when the reporter is no longer needed
    fn finish(&mut self) {}
}

/// A no-op reporter that discards all events
#[derive(Debug, Default)]
pub struct NoOpReporter;

impl ExecutionReporter for NoOpReporter {
    fn report_event(&mut self, _event: TaskExecutionEvent) {}
}

/// A simple console reporter
#[derive(Debug, Default)]
pub struct SimpleConsoleReporter {
    prefix: Option<String>,
}

impl SimpleConsoleReporter {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Prefix every line with `[prefix]`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn format_duration(duration: Duration) -> String {
        if duration.as_secs() > 0 {
            format!("{:.1}s", duration.as_secs_f32())
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    fn render(&self, event: &TaskExecutionEvent) -> String {
        let prefix = self
            .prefix
            .as_ref()
            .map(|p| format!("[{}] ", p))
            .unwrap_or_default();

        match event {
            TaskExecutionEvent::ExecutionStarted { root, total_tasks } => {
                format!("{}Running {} ({} tasks)", prefix, root, total_tasks)
            }
            TaskExecutionEvent::TaskStarted { task_name, .. } => {
                format!("{}Started {}", prefix, task_name)
            }
            TaskExecutionEvent::TaskCompleted {
                task_name, duration, ..
            } => format!(
                "{}Completed {} in {}",
                prefix,
                task_name,
                Self::format_duration(*duration)
            ),
            TaskExecutionEvent::TaskFailed {
                task_name,
                error,
                duration,
                ..
            } => format!(
                "{}Failed {} after {} - {}",
                prefix,
                task_name,
                Self::format_duration(*duration),
                error
            ),
            TaskExecutionEvent::ExecutionFinished {
                total_tasks,
                completed_tasks,
                failed_tasks,
                duration,
            } => format!(
                "{}Finished: {}/{} completed, {} failed in {}",
                prefix,
                completed_tasks,
                total_tasks,
                failed_tasks,
                Self::format_duration(*duration)
            ),
        }
    }
}

impl ExecutionReporter for SimpleConsoleReporter {
    fn report_event(&mut self, event: TaskExecutionEvent) {
        println!("{}", self.render(&event));
    }
}

/// A multi-reporter that broadcasts events to multiple reporters
#[derive(Default)]
pub struct MultiReporter {
    reporters: Vec<Box<dyn ExecutionReporter>>,
}

impl MultiReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reporter<R: ExecutionReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl ExecutionReporter for MultiReporter {
    fn report_event(&mut self, event: TaskExecutionEvent) {
        for reporter in &mut self.reporters {
            reporter.report_event(event.clone());
        }
    }

    fn finish(&mut self) {
        for reporter in &mut self.reporters {
            reporter.finish();
        }
    }
}
