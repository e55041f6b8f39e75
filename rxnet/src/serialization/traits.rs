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

use crate::serialization::{DeserializationError, SerializationError};

/// Message codec of a [`Connection`](crate::connection::Connection).
///
/// One serializer instance is shared by the reader and writer tasks of a
/// connection, so it must be usable from several threads at once. A
/// serializer only maps messages to payloads; framing is applied around it.
///
/// # Examples
///
/// A custom codec delegating to `serde_json`:
///
/// ```rust
/// use rxnet::serialization::{DeserializationError, SerializationError, Serializer};
///
/// #[derive(Clone)]
/// struct Lines;
///
/// impl Serializer for Lines {
///     fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
///     where
///         T: serde::Serialize + ?Sized,
///     {
///         Ok(serde_json::to_vec(value)?)
///     }
///
///     fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
///     where
///         T: serde::de::DeserializeOwned,
///     {
///         Ok(serde_json::from_slice(bytes)?)
///     }
///
///     fn name(&self) -> &'static str {
///         "lines"
///     }
/// }
/// ```
pub trait Serializer: Send + Sync + 'static {
    /// Encodes one outbound message.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: serde::Serialize + ?Sized;

    /// Decodes one inbound payload.
    ///
    /// # Errors
    ///
    /// Malformed payloads and payloads of another type. The connection
    /// reports either as a codec error and closes.
    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
    where
        T: serde::de::DeserializeOwned;

    /// Short format label for logs.
    fn name(&self) -> &'static str;
}
