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

//! Message serialization and framing.
//!
//! A [`Connection`](crate::connection::Connection) turns a byte transport
//! into a stream of typed messages by combining a [`Serializer`] with the
//! length-prefixed [`framing`] format.
//!
//! # Examples
//!
//! ```rust
//! use rxnet::serialization::JsonSerializer;
//! use rxnet::serialization::framing::{read_message, write_message};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Message {
//!     id: u32,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let serializer = JsonSerializer::default();
//! let mut buffer = Vec::new();
//! write_message(&mut buffer, &serializer, &Message { id: 7 }).await?;
//!
//! let mut reader = &buffer[..];
//! let decoded: Option<Message> = read_message(&mut reader, &serializer).await?;
//! assert_eq!(decoded, Some(Message { id: 7 }));
//! # Ok(())
//! # }
//! ```

mod error;
pub mod framing;
mod json;
mod traits;

pub use error::{DeserializationError, SerializationError};
pub use json::JsonSerializer;
pub use traits::Serializer;
