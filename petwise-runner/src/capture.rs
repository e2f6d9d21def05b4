//! Stream wrapper that forwards reply text while capturing it.
//!
//! The model is asked to end replies with suggested follow-ups written as
//! `<Button Text>` on their own lines. Those lines must never reach the
//! reader as prose, so the wrapper holds back any trailing region that could
//! still turn into button lines and only releases it once the next text
//! proves otherwise. The chunks it yields always concatenate to the cleaned
//! reply.
//!
//! The completion callback fires exactly once: at end of stream, after a
//! mid-stream error (with [`STREAM_APOLOGY`] appended), or when the consumer
//! drops the stream early. The last two are reported as `partial`.

use std::pin::Pin;
use std::time::{Duration, Instant};

use async_stream::stream;
use futures::{Stream, StreamExt};
use petwise_core::{LlmEventStream, StreamEvent};
use tracing::{debug, warn};

pub const MAX_BUTTONS: usize = 6;
const BUTTON_MIN_CHARS: usize = 5;
const BUTTON_MAX_CHARS: usize = 50;

/// Appended when the model stream fails after it started.
pub const STREAM_APOLOGY: &str =
    "\n\nSorry, I lost my connection while answering. Please ask again and I'll pick up where I left off.";

/// Text chunks delivered to the caller, in arrival order.
pub type ReplyStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// What the callback receives once the reply is over.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedReply {
    /// Everything the model produced, button lines included.
    pub text: String,
    /// Exactly what was yielded to the consumer.
    pub cleaned: String,
    pub buttons: Vec<String>,
    pub elapsed: Duration,
    pub first_chunk: Option<Duration>,
    pub partial: bool,
}

fn button_label(group: &str) -> Option<&str> {
    let inner = group.strip_prefix('<')?.strip_suffix('>')?.trim();
    let chars = inner.chars().count();
    let lower = inner.to_ascii_lowercase();
    let is_url = lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("www.")
        || lower.starts_with("mailto:");
    let ok = (BUTTON_MIN_CHARS..=BUTTON_MAX_CHARS).contains(&chars)
        && !is_url
        && !inner.contains(['<', '>']);
    ok.then_some(inner)
}

/// Labels on a line made only of `<...>` groups, or `None` if anything else is on it.
fn button_line(line: &str) -> Option<Vec<&str>> {
    let mut rest = line.trim();
    if rest.is_empty() {
        return None;
    }
    let mut labels = Vec::new();
    while !rest.is_empty() {
        let end = rest.find('>')?;
        labels.push(button_label(&rest[..=end])?);
        rest = rest[end + 1..].trim_start();
    }
    Some(labels)
}

/// Whether more text could still turn this unfinished line into a button line.
fn may_become_button_line(line: &str) -> bool {
    let mut rest = line.trim();
    while !rest.is_empty() {
        if !rest.starts_with('<') {
            return false;
        }
        match rest.find('>') {
            Some(end) => {
                if button_label(&rest[..=end]).is_none() {
                    return false;
                }
                rest = rest[end + 1..].trim_start();
            }
            None => return rest.trim_start_matches('<').trim().chars().count() <= BUTTON_MAX_CHARS,
        }
    }
    true
}

/// Split a finished reply into cleaned text and buttons.
///
/// Only trailing lines that are blank or made of buttons are removed, and
/// only when at least one of them holds a button.
pub fn extract_buttons(text: &str) -> (String, Vec<String>) {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut keep = lines.len();
    let mut found = false;
    while keep > 0 {
        let line = lines[keep - 1];
        if line.trim().is_empty() {
            keep -= 1;
        } else if button_line(line).is_some() {
            found = true;
            keep -= 1;
        } else {
            break;
        }
    }
    if !found {
        return (text.to_string(), Vec::new());
    }

    let mut buttons: Vec<String> = Vec::new();
    for label in lines[keep..].iter().filter_map(|l| button_line(l)).flatten() {
        if buttons.len() == MAX_BUTTONS {
            break;
        }
        if !buttons.iter().any(|b| b.eq_ignore_ascii_case(label)) {
            buttons.push(label.to_string());
        }
    }
    (lines[..keep].join("\n").trim_end().to_string(), buttons)
}

/// Length of the prefix of an unfinished reply that no later text can remove.
fn releasable(text: &str) -> usize {
    let last_start = text.rfind('\n').map_or(0, |i| i + 1);
    if !may_become_button_line(&text[last_start..]) {
        return text.trim_end().len();
    }

    let mut start = last_start;
    while start > 0 {
        let prev_start = text[..start - 1].rfind('\n').map_or(0, |i| i + 1);
        let prev = &text[prev_start..start - 1];
        if prev.trim().is_empty() || button_line(prev).is_some() {
            start = prev_start;
        } else {
            break;
        }
    }
    text[..start].trim_end().len()
}

type OnComplete = Box<dyn FnOnce(CompletedReply) + Send>;

struct Capture {
    started: Instant,
    first_chunk: Option<Duration>,
    text: String,
    emitted: String,
    on_complete: Option<OnComplete>,
}

impl Capture {
    fn next_chunk(&mut self, end: usize) -> Option<String> {
        let chunk = self.text.get(self.emitted.len()..end)?.to_string();
        if chunk.is_empty() {
            return None;
        }
        self.first_chunk.get_or_insert_with(|| self.started.elapsed());
        self.emitted.push_str(&chunk);
        Some(chunk)
    }

    /// The rest of the cleaned reply once no more model text will arrive.
    fn finish_chunk(&mut self) -> (Option<String>, Vec<String>) {
        let (cleaned, buttons) = extract_buttons(&self.text);
        let rest = cleaned.strip_prefix(self.emitted.as_str()).unwrap_or_default().to_string();
        if rest.is_empty() {
            return (None, buttons);
        }
        self.first_chunk.get_or_insert_with(|| self.started.elapsed());
        self.emitted.push_str(&rest);
        (Some(rest), buttons)
    }

    fn complete(&mut self, buttons: Vec<String>, partial: bool) {
        if let Some(callback) = self.on_complete.take() {
            callback(CompletedReply {
                text: self.text.clone(),
                cleaned: self.emitted.clone(),
                buttons,
                elapsed: self.started.elapsed(),
                first_chunk: self.first_chunk,
                partial,
            });
        }
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if self.on_complete.is_some() {
            debug!(emitted = self.emitted.len(), "reply stream dropped before completion");
            self.complete(Vec::new(), true);
        }
    }
}

/// Wrap model events into a reply stream that reports its outcome once.
pub fn capture<F>(events: LlmEventStream, on_complete: F) -> ReplyStream
where
    F: FnOnce(CompletedReply) + Send + 'static,
{
    let mut state = Capture {
        started: Instant::now(),
        first_chunk: None,
        text: String::new(),
        emitted: String::new(),
        on_complete: Some(Box::new(on_complete)),
    };

    Box::pin(stream! {
        let mut events = events;
        let mut failed = false;
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::OutputTextDelta { delta } => {
                    state.text.push_str(&delta);
                    let end = releasable(&state.text);
                    if let Some(chunk) = state.next_chunk(end) {
                        yield chunk;
                    }
                }
                StreamEvent::Completed => break,
                StreamEvent::Error { message } => {
                    warn!(error = %message, "reply stream failed");
                    failed = true;
                    break;
                }
            }
        }
        drop(events);

        let (rest, buttons) = state.finish_chunk();
        if let Some(rest) = rest {
            yield rest;
        }
        if failed {
            state.text.push_str(STREAM_APOLOGY);
            state.emitted.push_str(STREAM_APOLOGY);
            yield STREAM_APOLOGY.to_string();
        }
        state.complete(buttons, failed);
    })
}

/// A one-chunk reply for text that is already complete.
pub fn capture_text<F>(text: impl Into<String>, on_complete: F) -> ReplyStream
where
    F: FnOnce(CompletedReply) + Send + 'static,
{
    let events = vec![StreamEvent::OutputTextDelta { delta: text.into() }, StreamEvent::Completed];
    capture(Box::pin(futures::stream::iter(events)), on_complete)
}
