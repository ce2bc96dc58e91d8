//! Typed streaming events and the fold that turns them into a final
//! outcome.
//!
//! The wire stream is a sequence of SSE `data:` payloads. Each payload is a
//! JSON object with a `type` discriminator; [`StreamAccumulator::feed`]
//! maps it to a [`StreamEvent`] for live forwarding while accumulating the
//! full text and any tool-call requests.

use serde::{Deserialize, Serialize};

/// One typed event from the streaming response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StreamEvent {
    MessageStart,
    /// A fragment of assistant text.
    ContentDelta(String),
    /// The model began requesting a tool invocation.
    ToolUseStart { id: String, name: String },
    /// A fragment of the tool-call input JSON.
    ToolInputDelta(String),
    MessageStop,
}

/// A completed tool-call request folded out of the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Everything the stream produced once it ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamOutcome {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Folds raw SSE data payloads into accumulated text + tool calls.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    tool_calls: Vec<ToolCall>,
    pending_tool: Option<PendingTool>,
}

#[derive(Debug)]
struct PendingTool {
    id: String,
    name: String,
    input_json: String,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one SSE data payload (the JSON after `data: `).
    ///
    /// Returns the typed event to forward, or `None` for bookkeeping
    /// payloads and anything unparseable (unknown event types are ignored
    /// so new server-side event kinds don't break old clients).
    pub fn feed(&mut self, data: &str) -> Option<StreamEvent> {
        let json: serde_json::Value = serde_json::from_str(data).ok()?;
        let kind = json.get("type").and_then(|t| t.as_str())?;

        match kind {
            "message_start" => Some(StreamEvent::MessageStart),

            "content_block_start" => {
                let block = json.get("content_block")?;
                if block.get("type").and_then(|t| t.as_str()) == Some("tool_use") {
                    let id = block.get("id").and_then(|v| v.as_str())?.to_string();
                    let name = block.get("name").and_then(|v| v.as_str())?.to_string();
                    self.pending_tool = Some(PendingTool {
                        id: id.clone(),
                        name: name.clone(),
                        input_json: String::new(),
                    });
                    Some(StreamEvent::ToolUseStart { id, name })
                } else {
                    None
                }
            }

            "content_block_delta" => {
                let delta = json.get("delta")?;
                match delta.get("type").and_then(|t| t.as_str()) {
                    Some("text_delta") => {
                        let text = delta.get("text").and_then(|t| t.as_str())?;
                        if text.is_empty() {
                            return None;
                        }
                        self.text.push_str(text);
                        Some(StreamEvent::ContentDelta(text.to_string()))
                    }
                    Some("input_json_delta") => {
                        let partial = delta.get("partial_json").and_then(|t| t.as_str())?;
                        if let Some(pending) = self.pending_tool.as_mut() {
                            pending.input_json.push_str(partial);
                        }
                        Some(StreamEvent::ToolInputDelta(partial.to_string()))
                    }
                    _ => None,
                }
            }

            "content_block_stop" => {
                if let Some(pending) = self.pending_tool.take() {
                    let input = if pending.input_json.is_empty() {
                        serde_json::Value::Object(Default::default())
                    } else {
                        match serde_json::from_str(&pending.input_json) {
                            Ok(value) => value,
                            Err(e) => {
                                tracing::warn!(
                                    tool = %pending.name,
                                    error = %e,
                                    "discarding tool call with malformed input JSON"
                                );
                                return None;
                            }
                        }
                    };
                    self.tool_calls.push(ToolCall {
                        id: pending.id,
                        name: pending.name,
                        input,
                    });
                }
                None
            }

            "message_stop" => Some(StreamEvent::MessageStop),

            _ => None,
        }
    }

    /// Consume the accumulator once the stream ends.
    pub fn finish(self) -> StreamOutcome {
        StreamOutcome {
            text: self.text,
            tool_calls: self.tool_calls,
        }
    }
}
