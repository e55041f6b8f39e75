//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Per-worker stack of request frames.
//!
//! # Storage
//!
//! A task scoped with [`scope`] or [`bind`] keeps its stack in a Tokio
//! task-local, so it follows the task across runtime threads. Everything
//! else (plain threads, unscoped tasks) uses a thread-local stack.
//!
//! # Capture and restore
//!
//! [`make_closure`] and [`bind`] carry the frame that is current when they
//! are called over to wherever the work eventually runs. The frame is
//! shared, not copied: attributes set on it later are visible to every
//! holder.

use super::{ContextError, ContextsContainer};
use parking_lot::RwLock;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::warn;

/// Slots hold `None` when a closure captured an empty stack, which hides any
/// outer frame from the work it runs.
type FrameStack = Vec<Option<Arc<Frame>>>;

tokio::task_local! {
    static TASK_FRAMES: RefCell<FrameStack>;
}

thread_local! {
    static THREAD_FRAMES: RefCell<FrameStack> = const { RefCell::new(Vec::new()) };
}

fn with_frames<R>(f: impl FnOnce(&mut FrameStack) -> R) -> R {
    if TASK_FRAMES.try_with(|_| ()).is_ok() {
        TASK_FRAMES.with(|frames| f(&mut frames.borrow_mut()))
    } else {
        THREAD_FRAMES.with(|frames| f(&mut frames.borrow_mut()))
    }
}

/// Generates a fresh request id.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One request's identity, its context container and free-form attributes.
pub struct Frame {
    request_id: String,
    container: ContextsContainer,
    attributes: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Frame {
    /// Creates a frame. The request id must not be empty.
    pub fn new(
        request_id: impl Into<String>,
        container: ContextsContainer,
    ) -> Result<Arc<Self>, ContextError> {
        let request_id = request_id.into();
        if request_id.is_empty() {
            return Err(ContextError::InvalidArgument("request id can not be empty"));
        }
        Ok(Arc::new(Self {
            request_id,
            container,
            attributes: RwLock::new(HashMap::new()),
        }))
    }

    /// The request id.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The context container.
    pub fn container(&self) -> &ContextsContainer {
        &self.container
    }

    /// Sets an attribute, replacing any previous value under `key`.
    pub fn set_attribute<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        self.attributes
            .write()
            .insert(key.to_string(), Arc::new(value));
    }

    /// Returns the attribute under `key` if it holds a `T`.
    pub fn attribute<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.attributes.read().get(key).cloned()?;
        value.downcast::<T>().ok()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("request_id", &self.request_id)
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

/// Pushes `frame` on the current worker's stack.
pub fn push_frame(frame: Arc<Frame>) {
    with_frames(|frames| frames.push(Some(frame)));
}

/// Pops the top frame of the current worker's stack. Popping an empty stack
/// is a no-op.
pub fn pop_frame() -> Option<Arc<Frame>> {
    with_frames(|frames| frames.pop()).flatten()
}

/// The top frame of the current worker's stack.
pub fn current_frame() -> Option<Arc<Frame>> {
    with_frames(|frames| frames.last().cloned().flatten())
}

/// The request id of the top frame.
pub fn current_request_id() -> Option<String> {
    current_frame().map(|frame| frame.request_id.clone())
}

/// The context container of the top frame.
pub fn current_container() -> Option<ContextsContainer> {
    current_frame().map(|frame| frame.container.clone())
}

/// Number of frames on the current worker's stack.
pub fn depth() -> usize {
    with_frames(|frames| frames.len())
}

struct PopOnDrop;

impl Drop for PopOnDrop {
    fn drop(&mut self) {
        with_frames(|frames| frames.pop());
    }
}

/// Wraps `work` so that it runs with the frame current right now, on
/// whichever thread eventually calls it.
///
/// The captured frame is pushed before `work` runs and popped afterwards,
/// also when `work` panics.
///
/// # Examples
///
/// ```rust
/// use rxnet::context::{self, ContextsContainer, Frame};
///
/// let frame = Frame::new("req-1", ContextsContainer::new()).unwrap();
/// context::push_frame(frame);
/// let work = context::make_closure(context::current_request_id);
/// context::pop_frame();
///
/// let seen = std::thread::spawn(work).join().unwrap();
/// assert_eq!(seen.as_deref(), Some("req-1"));
/// ```
pub fn make_closure<F, R>(work: F) -> impl FnOnce() -> R + Send
where
    F: FnOnce() -> R + Send,
{
    let captured = current_frame();
    move || {
        with_frames(|frames| frames.push(captured));
        let _pop = PopOnDrop;
        work()
    }
}

/// Gives `future` its own frame stack holding `frame`.
///
/// The stack lives in a task-local, so the frame stays current however the
/// future moves between threads. The frame disappears when the future
/// completes or is dropped.
pub fn bind<F: Future>(frame: Option<Arc<Frame>>, future: F) -> impl Future<Output = F::Output> {
    TASK_FRAMES.scope(RefCell::new(vec![frame]), future)
}

/// [`bind`] with the frame current right now.
pub fn bind_current<F: Future>(future: F) -> impl Future<Output = F::Output> {
    bind(current_frame(), future)
}

/// Gives `future` its own, initially empty, frame stack.
pub fn scope<F: Future>(future: F) -> impl Future<Output = F::Output> {
    TASK_FRAMES.scope(RefCell::new(Vec::new()), future)
}

/// Lifecycle hooks through which the client and server paths publish the
/// request they are working on.
///
/// Every `on_new_server_request`/`before_new_client_request` must be paired
/// with exactly one matching `*_processing_end` on the same worker.
pub trait RequestCorrelator: Send + Sync {
    /// Request id to propagate on an outbound request.
    fn request_id_for_client_request(&self) -> Option<String>;

    /// Context container to propagate on the outbound request `request_id`.
    fn context_for_client_request(&self, request_id: &str) -> Option<ContextsContainer>;

    /// A server started processing `request_id`.
    fn on_new_server_request(
        &self,
        request_id: &str,
        container: ContextsContainer,
    ) -> Result<(), ContextError>;

    /// A client is about to send `request_id`.
    fn before_new_client_request(
        &self,
        request_id: &str,
        container: ContextsContainer,
    ) -> Result<(), ContextError>;

    /// A server finished processing `request_id`.
    fn on_server_processing_end(&self, request_id: &str);

    /// A client finished processing `request_id`.
    fn on_client_processing_end(&self, request_id: &str);
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Server,
    Client,
}

/// Calls the matching `*_processing_end` hook when dropped, so an exchange
/// that is cancelled midway still pairs its push.
pub(crate) struct ProcessingEnd<'a> {
    correlator: &'a dyn RequestCorrelator,
    request_id: &'a str,
    side: Side,
}

impl<'a> ProcessingEnd<'a> {
    /// Pushes the server frame for `request_id` and returns its closer.
    pub(crate) fn server(
        correlator: &'a dyn RequestCorrelator,
        request_id: &'a str,
        container: ContextsContainer,
    ) -> Result<Self, ContextError> {
        correlator.on_new_server_request(request_id, container)?;
        Ok(Self {
            correlator,
            request_id,
            side: Side::Server,
        })
    }

    /// Pushes the client frame for `request_id` and returns its closer.
    pub(crate) fn client(
        correlator: &'a dyn RequestCorrelator,
        request_id: &'a str,
        container: ContextsContainer,
    ) -> Result<Self, ContextError> {
        correlator.before_new_client_request(request_id, container)?;
        Ok(Self {
            correlator,
            request_id,
            side: Side::Client,
        })
    }
}

impl Drop for ProcessingEnd<'_> {
    fn drop(&mut self) {
        match self.side {
            Side::Server => self.correlator.on_server_processing_end(self.request_id),
            Side::Client => self.correlator.on_client_processing_end(self.request_id),
        }
    }
}

/// [`RequestCorrelator`] over the per-worker frame stack of this module.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCorrelator;

impl FrameCorrelator {
    /// Creates the correlator.
    pub fn new() -> Self {
        Self
    }

    /// See [`make_closure`].
    pub fn make_closure<F, R>(&self, work: F) -> impl FnOnce() -> R + Send + use<F, R>
    where
        F: FnOnce() -> R + Send,
    {
        make_closure(work)
    }

    fn push(&self, request_id: &str, container: ContextsContainer) -> Result<(), ContextError> {
        push_frame(Frame::new(request_id, container)?);
        Ok(())
    }

    #[cfg_attr(not(feature = "observability"), allow(unused_variables))]
    fn pop(&self, request_id: &str) {
        let popped = with_frames(|frames| frames.pop());

        #[cfg(feature = "observability")]
        match popped {
            None => warn!(request_id, "Processing end without a frame"),
            Some(Some(frame)) if frame.request_id != request_id => warn!(
                request_id,
                top = %frame.request_id,
                "Processing end does not match the top frame"
            ),
            Some(_) => {}
        }
        #[cfg(not(feature = "observability"))]
        let _ = popped;
    }
}

impl RequestCorrelator for FrameCorrelator {
    fn request_id_for_client_request(&self) -> Option<String> {
        current_request_id()
    }

    fn context_for_client_request(&self, _request_id: &str) -> Option<ContextsContainer> {
        current_container()
    }

    fn on_new_server_request(
        &self,
        request_id: &str,
        container: ContextsContainer,
    ) -> Result<(), ContextError> {
        self.push(request_id, container)
    }

    fn before_new_client_request(
        &self,
        request_id: &str,
        container: ContextsContainer,
    ) -> Result<(), ContextError> {
        self.push(request_id, container)
    }

    fn on_server_processing_end(&self, request_id: &str) {
        self.pop(request_id);
    }

    fn on_client_processing_end(&self, request_id: &str) {
        self.pop(request_id);
    }
}
