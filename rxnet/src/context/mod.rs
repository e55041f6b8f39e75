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

//! Request context correlation.
//!
//! Code handling a request publishes a [`Frame`] (request id plus a
//! [`ContextsContainer`]) on the current worker's frame stack. Code running
//! later on the same worker reads it back; code deferred to another worker
//! takes it along with [`make_closure`] or [`bind`].
//!
//! # Examples
//!
//! ```rust
//! use rxnet::context::{self, ContextsContainer, FrameCorrelator, RequestCorrelator};
//!
//! # fn example() -> Result<(), rxnet::context::ContextError> {
//! let correlator = FrameCorrelator::new();
//! correlator.on_new_server_request("req-7", ContextsContainer::new())?;
//! assert_eq!(context::current_request_id().as_deref(), Some("req-7"));
//! correlator.on_server_processing_end("req-7");
//! assert!(context::current_request_id().is_none());
//! # Ok(())
//! # }
//! ```

mod container;
mod correlator;
mod error;

pub use container::{ContextSerializer, ContextsContainer, JsonContextSerializer};
pub use correlator::{
    Frame, FrameCorrelator, RequestCorrelator, bind, bind_current, current_container,
    current_frame, current_request_id, depth, generate_request_id, make_closure, pop_frame,
    push_frame, scope,
};
pub(crate) use correlator::ProcessingEnd;
pub use error::ContextError;
