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

//! The bridge between byte transports and typed message streams.
//!
//! A [`Connection`] is installed on every physical transport. It exposes the
//! inbound messages as an [`InputStream`] and a [`write`](Connection::write)
//! path that reports completion once the frame was flushed. Closing follows
//! `Open → Closing → Closed` and happens exactly once no matter how many
//! parties (handler completion, peer close, pool discard) request it.
//!
//! [`serve`] runs a [`ConnectionHandler`] and guarantees the connection is
//! closed when the handler finishes by any path.

mod bridge;
mod input;
mod lifecycle;

pub use bridge::{Connection, ConnectionState};
pub use input::{InputItem, InputStream};
pub use lifecycle::{BoxError, ConnectionHandler, serve};
