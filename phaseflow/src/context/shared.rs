//! The per-run context shared by every step of a pipeline.

use super::SideChannel;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Holds the request, the response and a side channel for one pipeline.
///
/// The context is shared by reference (`Arc<SharedContext<_, _>>`) with every
/// work unit. The side channel is write-once per key. The request and response
/// slots sit behind reader/writer locks; the engine does not order writers, so
/// steps of the same phase that write the same slot race with each other.
#[derive(Debug, Default)]
pub struct SharedContext<Req, Resp> {
    request: RwLock<Req>,
    response: RwLock<Resp>,
    side_channel: SideChannel,
}

impl<Req, Resp> SharedContext<Req, Resp> {
    /// Creates a context with initial request and response values.
    #[must_use]
    pub fn new(request: Req, response: Resp) -> Self {
        Self {
            request: RwLock::new(request),
            response: RwLock::new(response),
            side_channel: SideChannel::new(),
        }
    }

    /// Locks the request slot for reading.
    pub fn request(&self) -> RwLockReadGuard<'_, Req> {
        self.request.read()
    }

    /// Locks the request slot for writing.
    pub fn request_mut(&self) -> RwLockWriteGuard<'_, Req> {
        self.request.write()
    }

    /// Replaces the request.
    pub fn set_request(&self, request: Req) {
        *self.request.write() = request;
    }

    /// Locks the response slot for reading.
    pub fn response(&self) -> RwLockReadGuard<'_, Resp> {
        self.response.read()
    }

    /// Locks the response slot for writing.
    pub fn response_mut(&self) -> RwLockWriteGuard<'_, Resp> {
        self.response.write()
    }

    /// Replaces the response.
    pub fn set_response(&self, response: Resp) {
        *self.response.write() = response;
    }

    /// Mutates the request under a single write lock.
    pub fn update_request<R>(&self, f: impl FnOnce(&mut Req) -> R) -> R {
        f(&mut self.request.write())
    }

    /// Mutates the response under a single write lock.
    pub fn update_response<R>(&self, f: impl FnOnce(&mut Resp) -> R) -> R {
        f(&mut self.response.write())
    }

    /// Returns the side channel.
    #[must_use]
    pub fn side_channel(&self) -> &SideChannel {
        &self.side_channel
    }
}

impl<Req, Resp: Clone> SharedContext<Req, Resp> {
    /// Returns a copy of the current response.
    #[must_use]
    pub fn response_snapshot(&self) -> Resp {
        self.response.read().clone()
    }
}
