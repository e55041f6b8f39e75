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

//! Errors of the message codec.
//!
//! Both types carry a short description plus the lower-level cause. The
//! connection bridge tells I/O failures (the transport broke) apart from
//! codec failures (the bytes were wrong) through `io_source`.

use std::error::Error;
use std::fmt;

type BoxedSource = Box<dyn Error + Send + Sync>;

macro_rules! codec_error {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            message: String,
            source: Option<BoxedSource>,
        }

        impl $name {
            /// Error described by `message` alone.
            pub fn new(message: impl Into<String>) -> Self {
                Self {
                    message: message.into(),
                    source: None,
                }
            }

            /// Error described by `message` and caused by `source`.
            pub fn with_source(
                message: impl Into<String>,
                source: impl Error + Send + Sync + 'static,
            ) -> Self {
                Self {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }

            /// The description without the cause.
            pub fn message(&self) -> &str {
                &self.message
            }

            /// The cause, when it is an I/O error of the underlying stream.
            pub fn io_source(&self) -> Option<&std::io::Error> {
                self.source.as_ref()?.downcast_ref()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, ": {}"), self.message)?;
                match &self.source {
                    Some(source) => write!(f, ": {source}"),
                    None => Ok(()),
                }
            }
        }

        impl Error for $name {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                self.source.as_deref().map(|source| source as &(dyn Error + 'static))
            }
        }
    };
}

codec_error!(
    /// A message or frame could not be encoded or written.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rxnet::serialization::SerializationError;
    ///
    /// let error = SerializationError::new("frame of 20 MiB");
    /// assert_eq!(error.to_string(), "encode failed: frame of 20 MiB");
    /// ```
    SerializationError,
    "encode failed"
);

codec_error!(
    /// Bytes could not be read or decoded into a frame or message.
    DeserializationError,
    "decode failed"
);

impl From<serde_json::Error> for SerializationError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_source("invalid JSON value", error)
    }
}

impl From<serde_json::Error> for DeserializationError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_source("invalid JSON document", error)
    }
}
