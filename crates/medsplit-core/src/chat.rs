//! Chat transcript helpers for the assistant.
//!
//! Everything needed to turn a conversation into a request for the chat
//! backend and to read its reply, minus the HTTP itself:
//!
//! - [`prune_messages`] keeps the request small (last system prompt plus
//!   the most recent turns).
//! - [`build_user_content`] appends a short summary of the user's
//!   documents when the message is about documents.
//! - [`collapse_messages`] flattens a transcript into a single prompt.
//! - [`is_quick_query`] decides whether a reply should be streamed.
//! - [`SseReader`] reassembles `text/event-stream` bodies chunk by chunk.

use serde::{Deserialize, Serialize};

use crate::models::Document;

/// Shown when the backend returns no text.
pub const EMPTY_REPLY_FALLBACK: &str = "I couldn't generate a response. Please try again.";

/// Number of non-system turns sent to the backend by default.
pub const DEFAULT_KEEP_MESSAGES: usize = 4;

const GREETINGS: [&str; 12] = [
    "hi",
    "hello",
    "hey",
    "yo",
    "sup",
    "howdy",
    "hola",
    "hallo",
    "bonjour",
    "morning",
    "evening",
    "afternoon",
];

const QUICK_MAX_WORDS: usize = 12;

const DOCUMENT_INTENT_TERMS: [&str; 12] = [
    "document",
    "record",
    "result",
    "file",
    "report",
    "prescription",
    "insurance",
    "upload",
    "pdf",
    "image",
    "jpg",
    "png",
];

const CONTEXT_DOCS: usize = 3;
const CONTEXT_NAME_MAX: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Flatten a transcript into one prompt.
///
/// Messages with blank content are skipped. An empty transcript yields a
/// bare greeting so the backend always has something to answer.
pub fn collapse_messages(messages: &[ChatMessage]) -> String {
    let lines: Vec<String> = messages
        .iter()
        .filter_map(|m| {
            let content = m.content.trim();
            if content.is_empty() {
                return None;
            }
            Some(match m.role {
                Role::System => format!("[System]\n{}\n", content),
                Role::Assistant => format!("Assistant:\n{}\n", content),
                Role::User => format!("User:\n{}\n", content),
            })
        })
        .collect();

    let prompt = lines.join("\n").trim().to_string();
    if prompt.is_empty() {
        "User: Hello!\nAssistant:".to_string()
    } else {
        prompt
    }
}

/// Prefix a prompt with a note about an attached file.
pub fn with_uploaded_file(prompt: &str, file_name: &str) -> String {
    format!("[User uploaded file: {}]\n{}", file_name, prompt)
}

/// Keep the latest system message followed by the last `keep` others.
pub fn prune_messages(messages: &[ChatMessage], keep: usize) -> Vec<ChatMessage> {
    let system = messages.iter().rev().find(|m| m.role == Role::System);
    let others: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();
    let tail = &others[others.len().saturating_sub(keep)..];

    system
        .into_iter()
        .chain(tail.iter().copied())
        .cloned()
        .collect()
}

/// Short prompts and greetings get a streamed reply.
pub fn is_quick_query(text: &str) -> bool {
    let first = text
        .trim_start()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or("")
        .to_lowercase();
    if GREETINGS.contains(&first.as_str()) {
        return true;
    }
    text.split_whitespace().count() <= QUICK_MAX_WORDS
}

/// True if the message mentions documents, files, or records.
pub fn mentions_documents(text: &str) -> bool {
    let lower = text.to_lowercase();
    DOCUMENT_INTENT_TERMS.iter().any(|t| lower.contains(t))
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max - 1).collect();
        format!("{}…", head)
    } else {
        text.to_string()
    }
}

/// The user's message, plus a short document list when it asks about them.
///
/// At most three documents are summarised, one per line, as
/// `- name (type, verified|pending)`.
pub fn build_user_content(text: &str, docs: &[Document]) -> String {
    if docs.is_empty() || !mentions_documents(text) {
        return text.to_string();
    }
    let summary: Vec<String> = docs
        .iter()
        .take(CONTEXT_DOCS)
        .map(|d| {
            let name = if d.name.is_empty() { "Untitled" } else { &d.name };
            format!(
                "- {} ({}, {})",
                truncate_chars(name, CONTEXT_NAME_MAX),
                d.kind,
                if d.verified { "verified" } else { "pending" }
            )
        })
        .collect();
    format!("{}\n\n[User Documents]\n{}", text, summary.join("\n"))
}

/// Incremental reader for `text/event-stream` bodies.
///
/// Feed raw byte chunks as they arrive; complete `data:` payloads come
/// back in order. Lines may be split across chunks, and both `\n` and
/// `\r\n` endings are accepted. `event:` lines and the `[DONE]` sentinel
/// are dropped.
#[derive(Debug, Default)]
pub struct SseReader {
    pending: Vec<u8>,
    done: bool,
}

impl SseReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(p) = self.parse_line(&line) {
                payloads.push(p);
            }
        }
        payloads
    }

    /// Flush a trailing line that had no newline.
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.pending);
        self.parse_line(&line).into_iter().collect()
    }

    fn parse_line(&mut self, raw: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with("event:") {
            return None;
        }
        let data = line.strip_prefix("data: ")?;
        if data == "[DONE]" {
            self.done = true;
            return None;
        }
        Some(data.to_string())
    }
}

/// Accumulates a streamed reply.
///
/// Plain-text payloads are whole lines; JSON deltas are fragments.
#[derive(Debug, Default)]
pub struct ReplyBuffer {
    text: String,
}

impl ReplyBuffer {
    /// Append a plain-text payload as its own line.
    pub fn push(&mut self, payload: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(payload);
    }

    /// Append a fragment with no separator.
    pub fn push_delta(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKind, FileType};
    use chrono::NaiveDate;

    fn doc(name: &str, verified: bool) -> Document {
        Document {
            id: 1,
            name: name.into(),
            kind: DocumentKind::LabResult,
            file_type: FileType::Pdf,
            size: String::new(),
            upload_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            verified,
            file_url: None,
            shared_with: vec![],
        }
    }

    #[test]
    fn test_collapse_messages() {
        let msgs = vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("  Hi  "),
            ChatMessage::assistant(""),
            ChatMessage::assistant("Hello!"),
        ];
        assert_eq!(
            collapse_messages(&msgs),
            "[System]\nBe brief.\n\nUser:\nHi\n\nAssistant:\nHello!"
        );
    }

    #[test]
    fn test_collapse_empty_transcript() {
        assert_eq!(collapse_messages(&[]), "User: Hello!\nAssistant:");
        assert_eq!(
            collapse_messages(&[ChatMessage::user("   ")]),
            "User: Hello!\nAssistant:"
        );
    }

    #[test]
    fn test_with_uploaded_file() {
        assert_eq!(
            with_uploaded_file("User:\nwhat is this?", "scan.png"),
            "[User uploaded file: scan.png]\nUser:\nwhat is this?"
        );
    }

    #[test]
    fn test_prune_keeps_last_system_and_tail() {
        let msgs = vec![
            ChatMessage::system("old"),
            ChatMessage::user("1"),
            ChatMessage::assistant("2"),
            ChatMessage::system("new"),
            ChatMessage::user("3"),
            ChatMessage::assistant("4"),
            ChatMessage::user("5"),
        ];
        let pruned = prune_messages(&msgs, 4);
        let contents: Vec<&str> = pruned.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["new", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_prune_short_transcript_unchanged() {
        let msgs = vec![ChatMessage::user("a"), ChatMessage::assistant("b")];
        assert_eq!(prune_messages(&msgs, 4), msgs);
    }

    #[test]
    fn test_quick_query() {
        assert!(is_quick_query(
            "Hello there, I need a very long explanation of how this whole thing works today"
        ));
        assert!(is_quick_query("what is metformin?"));
        assert!(!is_quick_query(
            "could you please explain in detail the side effects of taking metformin with lisinopril daily"
        ));
        // "hiya" is not a greeting word.
        assert!(!is_quick_query(
            "hiya could you please explain in detail the side effects of taking metformin daily"
        ));
    }

    #[test]
    fn test_build_user_content_adds_documents() {
        let docs = vec![
            doc("Blood Test Results", false),
            doc("Metformin Prescription", true),
            doc(&"x".repeat(80), true),
            doc("fourth", true),
        ];
        let out = build_user_content("show my results", &docs);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "show my results");
        assert_eq!(lines[2], "[User Documents]");
        assert_eq!(lines[3], "- Blood Test Results (lab-result, pending)");
        assert_eq!(lines[4], "- Metformin Prescription (lab-result, verified)");
        assert!(lines[5].ends_with("… (lab-result, verified)"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_build_user_content_without_intent() {
        let docs = vec![doc("Blood Test Results", false)];
        assert_eq!(build_user_content("hello", &docs), "hello");
        assert_eq!(build_user_content("my files", &[]), "my files");
    }

    #[test]
    fn test_sse_reader_across_chunks() {
        let mut reader = SseReader::new();
        let mut out = reader.feed(b"data: Hel");
        assert!(out.is_empty());
        out.extend(reader.feed(b"lo\r\n\r\nevent: done\ndata: world\n"));
        out.extend(reader.feed(b"data: [DONE]\n"));
        assert_eq!(out, vec!["Hello", "world"]);
        assert!(reader.is_done());
    }

    #[test]
    fn test_sse_reader_finish_flushes_tail() {
        let mut reader = SseReader::new();
        assert!(reader.feed(b"data: tail").is_empty());
        assert_eq!(reader.finish(), vec!["tail"]);
        assert!(reader.finish().is_empty());
    }

    #[test]
    fn test_reply_buffer_joins_with_newlines() {
        let mut buf = ReplyBuffer::default();
        buf.push("one");
        buf.push("two");
        assert_eq!(buf.as_str(), "one\ntwo");
    }

    #[test]
    fn test_reply_buffer_deltas() {
        let mut buf = ReplyBuffer::default();
        assert!(buf.is_empty());
        buf.push_delta("Hel");
        buf.push_delta("lo");
        assert_eq!(buf.into_string(), "Hello");
    }
}
