//! Assistant relay to an OpenAI-compatible chat backend.
//!
//! A conversation is pruned, the latest user turn is enriched with a short
//! summary of the user's documents, and the whole transcript is collapsed
//! into a single user prompt for `POST {base_url}/chat/completions`.
//!
//! Short or greeting-style questions are streamed (`"stream": true`) and
//! tokens are handed to a callback as they arrive; longer ones wait for the
//! full completion.
//!
//! Retry strategy (both modes, before any body is read):
//! - HTTP 429 or 5xx → retry with exponential backoff
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error → retry

use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use medsplit_core::chat::{
    build_user_content, collapse_messages, is_quick_query, prune_messages, with_uploaded_file,
    ChatMessage, ReplyBuffer, Role, SseReader, EMPTY_REPLY_FALLBACK,
};
use medsplit_core::models::Document;
use medsplit_core::store::Store;

use crate::config::{ChatConfig, Config};
use crate::data::DataFile;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Name of a file the user attached, if any.
    #[serde(default)]
    pub file_name: Option<String>,
}

pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
    keep_messages: usize,
}

impl ChatClient {
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let base = config
            .base_url
            .as_deref()
            .ok_or_else(|| anyhow!("Chat is disabled. Set [chat] base_url in config."))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.is_empty()),
            max_retries: config.max_retries,
            keep_messages: config.keep_messages,
        })
    }

    /// The single prompt sent upstream for this conversation.
    pub fn build_prompt(
        &self,
        messages: &[ChatMessage],
        docs: &[Document],
        file_name: Option<&str>,
    ) -> String {
        let mut pruned = prune_messages(messages, self.keep_messages);
        if let Some(last) = pruned.last_mut().filter(|m| m.role == Role::User) {
            last.content = build_user_content(&last.content, docs);
        }
        let prompt = collapse_messages(&pruned);
        match file_name.filter(|f| !f.is_empty()) {
            Some(name) => with_uploaded_file(&prompt, name),
            None => prompt,
        }
    }

    /// Answer a conversation, streaming when the last question is short.
    ///
    /// `on_token` only fires for streamed replies.
    pub async fn respond(
        &self,
        req: &ChatRequest,
        docs: &[Document],
        on_token: impl FnMut(&str),
    ) -> Result<String> {
        let question = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let prompt = self.build_prompt(&req.messages, docs, req.file_name.as_deref());
        if is_quick_query(question) {
            self.stream(&prompt, on_token).await
        } else {
            self.reply(&prompt).await
        }
    }

    /// One non-streamed completion.
    pub async fn reply(&self, prompt: &str) -> Result<String> {
        let resp = self.send(prompt, false).await?;
        let body: Value = resp.json().await?;
        let text = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        if text.is_empty() {
            warn!("chat backend returned an empty reply");
            return Ok(EMPTY_REPLY_FALLBACK.to_string());
        }
        Ok(text.to_string())
    }

    /// A streamed completion. Returns the full reply once the stream ends.
    pub async fn stream(&self, prompt: &str, mut on_token: impl FnMut(&str)) -> Result<String> {
        let mut resp = self.send(prompt, true).await?;
        let mut reader = SseReader::new();
        let mut reply = ReplyBuffer::default();

        while let Some(chunk) = resp.chunk().await? {
            for payload in reader.feed(&chunk) {
                absorb(&payload, &mut reply, &mut on_token);
            }
            if reader.is_done() {
                break;
            }
        }
        for payload in reader.finish() {
            absorb(&payload, &mut reply, &mut on_token);
        }

        if reply.is_empty() {
            warn!("chat stream ended without text");
            return Ok(EMPTY_REPLY_FALLBACK.to_string());
        }
        Ok(reply.into_string())
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": stream,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying chat request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.http.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("Chat backend error {}: {}", status, body_text));
                        continue;
                    }
                    bail!("Chat backend error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Chat request failed after retries")))
    }
}

/// Fold one SSE payload into the reply.
///
/// OpenAI-style JSON chunks contribute their `delta.content`; anything that
/// is not a JSON object is taken as a plain line of text.
fn absorb(payload: &str, reply: &mut ReplyBuffer, on_token: &mut impl FnMut(&str)) {
    match serde_json::from_str::<Value>(payload) {
        Ok(v) if v.is_object() => {
            if let Some(delta) = v.pointer("/choices/0/delta/content").and_then(Value::as_str) {
                if !delta.is_empty() {
                    on_token(delta);
                    reply.push_delta(delta);
                }
            }
        }
        _ => {
            on_token(payload);
            reply.push(payload);
        }
    }
}

/// `medsplit chat <message>`: one-shot question from the terminal.
pub async fn run_chat(config: &Config, message: &str, file_name: Option<String>) -> Result<()> {
    let client = ChatClient::from_config(&config.chat)?;
    let docs = DataFile::from_config(config).list_documents().await?;
    let req = ChatRequest {
        messages: vec![ChatMessage::user(message)],
        file_name,
    };

    let mut streamed = false;
    let mut stdout = std::io::stdout();
    let reply = client
        .respond(&req, &docs, |token| {
            streamed = true;
            let _ = write!(stdout, "{}", token);
            let _ = stdout.flush();
        })
        .await?;

    if streamed {
        println!();
    } else {
        println!("{}", reply);
    }
    Ok(())
}
