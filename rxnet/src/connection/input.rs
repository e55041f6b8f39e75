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

//! Single-subscriber input stream of a connection.

use crate::transport::TransportError;
use futures_util::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One item of a connection's input: a decoded message, or the error that
/// terminated the stream.
pub type InputItem<I> = Result<I, TransportError>;

/// Holds the receiving end of the input channel while nobody is subscribed.
pub(crate) struct InputSlot<I> {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<InputItem<I>>>>,
}

impl<I> InputSlot<I> {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<InputItem<I>>) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub(crate) fn subscribe(self: &Arc<Self>) -> Result<InputStream<I>, TransportError> {
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or(TransportError::AlreadySubscribed)?;
        Ok(InputStream {
            receiver: Some(receiver),
            slot: Arc::clone(self),
        })
    }
}

/// Inbound messages of a [`Connection`](super::Connection) in arrival order.
///
/// The stream ends when the peer closes the connection or the connection is
/// closed locally. A transport or decode failure is delivered as a final
/// `Err` item before the end. Dropping the stream gives the subscription back,
/// so a later [`input`](super::Connection::input) call continues where this
/// one stopped; once the stream has ended, later subscriptions end
/// immediately.
pub struct InputStream<I> {
    receiver: Option<mpsc::UnboundedReceiver<InputItem<I>>>,
    slot: Arc<InputSlot<I>>,
}

impl<I> Stream for InputStream<I> {
    type Item = InputItem<I>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().receiver.as_mut() {
            Some(receiver) => receiver.poll_recv(cx),
            None => Poll::Ready(None),
        }
    }
}

impl<I> Drop for InputStream<I> {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            *self.slot.receiver.lock() = Some(receiver);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_single_subscriber() {
        let (tx, rx) = mpsc::unbounded_channel::<InputItem<u32>>();
        let slot = Arc::new(InputSlot::new(rx));

        let mut first = slot.subscribe().unwrap();
        assert!(matches!(
            slot.subscribe(),
            Err(TransportError::AlreadySubscribed)
        ));

        tx.send(Ok(1)).unwrap();
        assert_eq!(first.next().await.unwrap().unwrap(), 1);
        drop(first);

        tx.send(Ok(2)).unwrap();
        drop(tx);
        let mut second = slot.subscribe().unwrap();
        assert_eq!(second.next().await.unwrap().unwrap(), 2);
        assert!(second.next().await.is_none());
        drop(second);

        let mut third = slot.subscribe().unwrap();
        assert!(third.next().await.is_none());
    }
}
