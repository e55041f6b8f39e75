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

//! JSON message codec.

use crate::serialization::{DeserializationError, SerializationError, Serializer};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encodes messages as JSON documents with `serde_json`.
///
/// HTTP request and response frames travel in this format by default.
///
/// # Examples
///
/// ```rust
/// use rxnet::serialization::{JsonSerializer, Serializer};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let serializer = JsonSerializer::default();
/// let bytes = serializer.serialize(&("ping", 3u8))?;
/// assert_eq!(bytes, br#"["ping",3]"#);
///
/// let (word, count): (String, u8) = serializer.deserialize(&bytes)?;
/// assert_eq!((word.as_str(), count), ("ping", 3));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output, easier to read when frames are captured or logged.
    pub fn with_pretty_print(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl Serializer for JsonSerializer {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        Ok(encoded?)
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_malformed_document() {
        let result: Result<BTreeMap<String, u32>, _> =
            JsonSerializer::new().deserialize(b"{\"open\": ");
        let error = result.unwrap_err();
        assert!(error.io_source().is_none());
    }

    #[test]
    fn test_type_mismatch() {
        let result: Result<u32, _> = JsonSerializer::new().deserialize(b"\"seven\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_pretty_output_is_indented() {
        let mut headers = BTreeMap::new();
        headers.insert("host", "example.com");
        let bytes = JsonSerializer::new()
            .with_pretty_print()
            .serialize(&headers)
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\n  \"host\": \"example.com\"\n}"
        );
        assert_eq!(JsonSerializer::new().name(), "json");
    }
}
