// src/transcript.rs
//! Client-side chat transcript.
//!
//! The browser page in `public/` and the `chat-client` binary keep the
//! conversation the same way: the user's message and an empty assistant
//! entry are appended together, streamed reply text is appended to that
//! last entry, and a failed request leaves a fixed apology behind.

use crate::message::{ChatMessage, Role};

pub const WELCOME_MESSAGE: &str = "Welcome to the Rate My Professor assistant! I'm here to help you find information about professors and courses. How can I assist you today?";

pub const APOLOGY_MESSAGE: &str =
    "I apologize, there was an error processing your request. Can you please try again?";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self { messages: vec![ChatMessage::assistant(WELCOME_MESSAGE)] }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Start a turn. Blank input is ignored. Otherwise the user message and
    /// an empty assistant placeholder are appended, and the transcript to
    /// send (everything but the placeholder) is returned.
    pub fn begin_turn(&mut self, text: &str) -> Option<Vec<ChatMessage>> {
        if text.trim().is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::user(text));
        let payload = self.messages.clone();
        self.messages.push(ChatMessage::assistant(""));
        Some(payload)
    }

    /// Append streamed text to the last entry.
    pub fn append_chunk(&mut self, chunk: &str) {
        if let Some(last) = self.messages.last_mut() {
            last.content.push_str(chunk);
        }
    }

    /// Replace an unanswered placeholder with the apology.
    pub fn fail_turn(&mut self) {
        if matches!(self.messages.last(), Some(m) if m.role == Role::Assistant && m.content.is_empty()) {
            self.messages.pop();
        }
        self.messages.push(ChatMessage::assistant(APOLOGY_MESSAGE));
    }
}

/// Turns a reply body arriving in arbitrary byte chunks into text. A
/// character split across chunks is held back until it completes; invalid
/// bytes come out as U+FFFD.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Whatever is still held back once the body has ended.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
