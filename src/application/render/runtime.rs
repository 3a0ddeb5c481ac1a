use std::{
    collections::{BTreeMap, BTreeSet},
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Command,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Describes how invoked code resolves its own dependencies: working
/// directory plus environment overrides applied on top of the host's.
///
/// The default value inherits everything from the host process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    working_dir: Option<PathBuf>,
    vars: BTreeMap<OsString, OsString>,
    removed: BTreeSet<OsString>,
}

impl ExecutionContext {
    pub fn inherited() -> Self {
        Self::default()
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        let key = key.into();
        self.removed.remove(&key);
        self.vars.insert(key, value.into());
        self
    }

    pub fn without_var(mut self, key: impl Into<OsString>) -> Self {
        let key = key.into();
        self.vars.remove(&key);
        self.removed.insert(key);
        self
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn var(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn removes(&self, key: impl AsRef<OsStr>) -> bool {
        self.removed.contains(key.as_ref())
    }

    pub fn is_inherited(&self) -> bool {
        self == &Self::default()
    }

    /// Configure a child process to run inside this context.
    pub fn apply(&self, command: &mut Command) {
        for key in &self.removed {
            command.env_remove(key);
        }
        command.envs(&self.vars);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
    }
}

/// Shared slot holding the ambient execution context of this process.
///
/// Toolchain invocations never read the slot directly; they receive the
/// context granted by a [`ContextScope`].
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    slot: Arc<Mutex<ExecutionContext>>,
}

impl RuntimeContext {
    pub fn new(initial: ExecutionContext) -> Self {
        Self {
            slot: Arc::new(Mutex::new(initial)),
        }
    }

    /// Snapshot of the ambient context. Blocks while a scope is active.
    pub fn current(&self) -> ExecutionContext {
        self.lock().clone()
    }

    /// Install `isolated` as the ambient context until the scope is dropped.
    ///
    /// The slot stays locked for the lifetime of the scope, so only one
    /// invocation can run inside an isolated context at a time.
    pub fn enter(&self, isolated: ExecutionContext) -> ContextScope<'_> {
        let mut slot = self.lock();
        let previous = std::mem::replace(&mut *slot, isolated);
        ContextScope {
            slot,
            previous: Some(previous),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExecutionContext> {
        // A panic inside a scope still runs ContextScope::drop, so the value
        // behind a poisoned lock is the restored one.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guard restoring the saved ambient context when dropped.
pub struct ContextScope<'a> {
    slot: MutexGuard<'a, ExecutionContext>,
    previous: Option<ExecutionContext>,
}

impl ContextScope<'_> {
    /// The isolated context granted to the invocation.
    pub fn context(&self) -> &ExecutionContext {
        &self.slot
    }

    /// The context that will be restored on drop.
    pub fn previous(&self) -> Option<&ExecutionContext> {
        self.previous.as_ref()
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.slot = previous;
        }
    }
}
