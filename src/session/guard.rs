use tokio::task::JoinHandle;
use tracing::info;

/// Identity of one outbound generate/greeting request.
///
/// Compared at resolution time: only the currently active handle's result
/// may update session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationHandle(u64);

#[derive(Debug)]
struct ActiveRequest {
    id: u64,
    task: Option<JoinHandle<()>>,
}

/// Ensures at most one in-flight generate/greeting request is honored.
///
/// Beginning a new request invalidates the previous one and aborts its
/// task; a superseded request that still manages to settle is rejected by
/// `is_active`.
#[derive(Debug, Default)]
pub struct RequestGuard {
    next_id: u64,
    active: Option<ActiveRequest>,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate any previous request and mark a new one active.
    pub fn begin(&mut self) -> CancellationHandle {
        self.invalidate();
        self.next_id += 1;
        self.active = Some(ActiveRequest {
            id: self.next_id,
            task: None,
        });
        CancellationHandle(self.next_id)
    }

    /// Attach the request's task so invalidation can abort it.
    pub fn attach(&mut self, handle: CancellationHandle, task: JoinHandle<()>) {
        if let Some(active) = self.active.as_mut() {
            if active.id == handle.0 {
                active.task = Some(task);
            }
        }
    }

    /// Whether this handle still owns the active slot.
    pub fn is_active(&self, handle: CancellationHandle) -> bool {
        self.active.as_ref().map(|a| a.id) == Some(handle.0)
    }

    /// Mark the active request settled.
    pub fn finish(&mut self, handle: CancellationHandle) {
        if self.is_active(handle) {
            self.active = None;
        }
    }

    /// Abort and forget the active request, if any.
    pub fn invalidate(&mut self) {
        if let Some(previous) = self.active.take() {
            if let Some(task) = previous.task {
                task.abort();
            }
            info!("invalidated in-flight request {}", previous.id);
        }
    }
}
