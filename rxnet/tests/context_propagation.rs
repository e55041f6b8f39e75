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

//! Request frames following work across threads, blocking pools and tasks.

use rxnet::context::{
    self, ContextsContainer, Frame, FrameCorrelator, JsonContextSerializer, RequestCorrelator,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tenant {
    name: String,
    tier: u8,
}

fn tenant_frame(request_id: &str, tenant: &str) -> Arc<Frame> {
    let container = ContextsContainer::new();
    container
        .add_context(
            "tenant",
            Tenant {
                name: tenant.to_string(),
                tier: 2,
            },
            &JsonContextSerializer,
        )
        .unwrap();
    Frame::new(request_id, container).unwrap()
}

fn current_tenant() -> Option<String> {
    let container = context::current_container()?;
    let tenant = container
        .get_context::<Tenant, _>("tenant", &JsonContextSerializer)
        .ok()??;
    Some(tenant.name.clone())
}

#[test]
fn test_closure_carries_frame_to_plain_threads() {
    let correlator = FrameCorrelator;
    let frame = tenant_frame("req-1", "acme");

    context::push_frame(Arc::clone(&frame));
    let work = correlator.make_closure(|| (context::current_request_id(), current_tenant()));
    context::pop_frame();
    assert_eq!(context::depth(), 0);

    let (request_id, tenant) = std::thread::spawn(work).join().unwrap();
    assert_eq!(request_id.as_deref(), Some("req-1"));
    assert_eq!(tenant.as_deref(), Some("acme"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_closure_carries_frame_to_blocking_pool() {
    let frame = tenant_frame("req-2", "globex");

    let work = context::bind(Some(frame), async {
        context::make_closure(context::current_request_id)
    })
    .await;
    let request_id = tokio::task::spawn_blocking(work).await.unwrap();
    assert_eq!(request_id.as_deref(), Some("req-2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_keep_their_own_frames() {
    let mut tasks = Vec::new();
    for i in 0..32 {
        let frame = tenant_frame(&format!("req-{i}"), &format!("tenant-{i}"));
        tasks.push(tokio::spawn(context::bind(Some(frame), async move {
            for _ in 0..10 {
                tokio::task::yield_now().await;
                assert_eq!(context::current_request_id(), Some(format!("req-{i}")));
            }
            // Work handed to another task keeps the frame.
            let nested = tokio::spawn(context::bind_current(async { current_tenant() }));
            nested.await.unwrap()
        })));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), Some(format!("tenant-{i}")));
    }
}

#[tokio::test]
async fn test_server_and_client_correlator_hooks() {
    let correlator = FrameCorrelator;
    let incoming = ContextsContainer::new();
    incoming.add_serialized_context("tenant", br#"{"name":"initech","tier":1}"#.to_vec());

    context::scope(async {
        correlator
            .on_new_server_request("srv-9", incoming.clone())
            .unwrap();
        assert_eq!(current_tenant().as_deref(), Some("initech"));

        // An outgoing call made while serving inherits the id and contexts.
        let request_id = correlator.request_id_for_client_request().unwrap();
        assert_eq!(request_id, "srv-9");
        let outgoing = correlator.context_for_client_request(&request_id).unwrap();
        assert!(outgoing.ptr_eq(&incoming));

        correlator
            .before_new_client_request(&request_id, outgoing)
            .unwrap();
        assert_eq!(context::depth(), 2);
        correlator.on_client_processing_end(&request_id);

        correlator.on_server_processing_end("srv-9");
        assert_eq!(context::current_request_id(), None);
    })
    .await;
}
