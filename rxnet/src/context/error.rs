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

use thiserror::Error;

/// Errors raised by request context handling.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A frame was pushed without a usable identity.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A context value could not be converted to or from bytes.
    #[error("context '{name}' could not be serialized: {reason}")]
    Serialization {
        /// Name of the context value
        name: String,
        /// What went wrong
        reason: String,
    },

    /// A context value exists but holds a different type.
    #[error("context '{name}' holds a value of a different type")]
    TypeMismatch {
        /// Name of the context value
        name: String,
    },
}

impl ContextError {
    pub(crate) fn serialization(name: &str, reason: impl std::fmt::Display) -> Self {
        ContextError::Serialization {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
