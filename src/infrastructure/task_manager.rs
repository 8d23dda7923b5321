use tokio::task::JoinHandle;

/// Tracks the background tasks of one socket connection (read loop, heartbeat)
/// so they can be torn down together when the connection goes away.
pub struct TaskManager {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskManager {
    /// Create a new empty task manager
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Spawn a named task and track it
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|(_, handle)| !handle.is_finished());
        self.handles.push((name, tokio::spawn(future)));
    }

    /// Number of tracked tasks that are still running
    pub fn active(&self) -> usize {
        self.handles
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Abort all tasks without waiting
    pub fn abort_all(&mut self) {
        for (name, handle) in self.handles.drain(..) {
            if !handle.is_finished() {
                tracing::debug!("Aborting {} task", name);
            }
            handle.abort();
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
