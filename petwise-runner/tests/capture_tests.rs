//! Reply capture over arbitrary chunkings.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use petwise_core::{LlmEventStream, StreamEvent};
use petwise_runner::{CompletedReply, capture, extract_buttons};
use proptest::prelude::*;

fn events(chunks: Vec<String>) -> LlmEventStream {
    let mut list: Vec<StreamEvent> =
        chunks.into_iter().map(|delta| StreamEvent::OutputTextDelta { delta }).collect();
    list.push(StreamEvent::Completed);
    Box::pin(futures::stream::iter(list))
}

fn split(text: &str, sizes: &[usize]) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    let mut sizes = sizes.iter().cycle();
    while !rest.is_empty() {
        let n = (*sizes.next().unwrap_or(&1)).clamp(1, rest.len());
        chunks.push(rest[..n].to_string());
        rest = &rest[n..];
    }
    chunks
}

fn arb_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}( [a-z]{1,8}){0,5}[.!?]?",
        Just(String::new()),
        Just("<3 this one is great".to_string()),
        Just("<Show grain-free options>".to_string()),
        Just("<Compare the top two> <Treats for training>".to_string()),
        Just("<https://example.com/deal>".to_string()),
        Just("<Hi>".to_string()),
    ]
}

/// **Property 8: streaming completeness**
///
/// Whatever the chunking, the yielded text equals the cleaned reply reported
/// to the callback, and that equals the full reply minus its button lines.
mod prop_capture_completeness {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn yielded_text_is_the_cleaned_reply(
            lines in prop::collection::vec(arb_line(), 1..8),
            sizes in prop::collection::vec(1usize..12, 1..6),
        ) {
            let full = lines.join("\n");
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (yielded, reply) = rt.block_on(async {
                let seen: Arc<Mutex<Option<CompletedReply>>> = Arc::new(Mutex::new(None));
                let slot = Arc::clone(&seen);
                let stream = capture(events(split(&full, &sizes)), move |reply| {
                    *slot.lock().unwrap() = Some(reply);
                });
                let yielded: String = stream.collect::<Vec<_>>().await.concat();
                let reply = seen.lock().unwrap().take();
                (yielded, reply)
            });

            let reply = reply.expect("callback fired");
            let (cleaned, buttons) = extract_buttons(&full);
            prop_assert_eq!(&yielded, &reply.cleaned);
            prop_assert_eq!(&reply.cleaned, cleaned.as_str());
            prop_assert_eq!(&reply.buttons, &buttons);
            prop_assert_eq!(&reply.text, &full);
            prop_assert!(!reply.partial);
        }
    }
}

#[tokio::test]
async fn callback_fires_once_when_dropped_before_start() {
    let count = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&count);
    let stream = capture(events(vec!["Hello there".into()]), move |reply| {
        assert!(reply.partial);
        assert!(reply.cleaned.is_empty());
        *counter.lock().unwrap() += 1;
    });
    drop(stream);
    assert_eq!(*count.lock().unwrap(), 1);
}
