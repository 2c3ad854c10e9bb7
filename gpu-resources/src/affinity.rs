//! Creator-thread affinity checks.

use std::thread::{self, ThreadId};

use crate::error::{ResourceError, ResourceResult};

/// Remembers the thread an object was created on.
///
/// Native device teardown must run on the thread that created the device,
/// since that thread may still be rendering with it.
#[derive(Debug, Clone)]
pub(crate) struct ThreadAffinity {
    id: ThreadId,
    name: String,
}

impl ThreadAffinity {
    /// Bind to the calling thread.
    pub fn current() -> Self {
        let thread = thread::current();
        Self {
            id: thread.id(),
            name: describe(&thread),
        }
    }

    /// Returns true if the calling thread is the owner.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }

    /// Fail with [`ResourceError::CrossThreadTeardown`] unless called from the owner.
    pub fn ensure_current(&self, operation: &'static str) -> ResourceResult<()> {
        if self.is_current() {
            return Ok(());
        }
        let current = describe(&thread::current());
        log::error!(
            "{operation} called on thread [{current}], but the owner is [{}]",
            self.name
        );
        Err(ResourceError::CrossThreadTeardown {
            operation,
            owner: self.name.clone(),
            current,
        })
    }

    /// Owner thread name, for diagnostics.
    pub fn owner_name(&self) -> &str {
        &self.name
    }
}

fn describe(thread: &thread::Thread) -> String {
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}
