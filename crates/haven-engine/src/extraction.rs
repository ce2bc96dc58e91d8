//! Memory extraction pipeline.
//!
//! Fired once per successful unlock as a detached background task. It
//! gathers all plaintext activity since the last covered window, asks the
//! model for a structured digest in a single non-streaming call, and
//! persists the result as that day's [`DailyMemory`].
//!
//! Failure semantics: every error is logged and swallowed; sign-in UX is
//! never blocked and the user never sees an extraction failure. Because a
//! failed run does not write a memory, the checkpoint stays where it was
//! and the same window is retried on the next unlock. The vault may lock
//! at any point mid-run (auto-lock, explicit lock); every storage call
//! re-checks that and the run aborts harmlessly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use haven_llm::{json::extract_json, ChatRequest, ChatTurn, LlmConfig, LlmTransport};
use haven_vault::models::{ChatMessage, DailyMemory, DailyMetric, JournalEntry, MessageRole};
use haven_vault::{Vault, VaultError};

use crate::error::{EngineError, Result};

/// Emotional-state label used when a window contained no activity.
const NO_ACTIVITY_STATE: &str = "no activity";

/// Per-message and per-entry truncation bounds for the digest.
const MAX_CHAT_CHARS: usize = 280;
const MAX_JOURNAL_CHARS: usize = 500;

const EXTRACTION_MAX_TOKENS: u32 = 1024;

/// Fixed instruction for the extraction call. The response must be a single
/// JSON object and nothing else.
const EXTRACTION_INSTRUCTION: &str = "\
You are the memory-keeper for a recovery companion app. You receive a digest \
of the user's recent conversations, journal entries, and daily check-ins, \
plus the previously known facts about them. Respond with ONLY a JSON object, \
no prose, of this exact shape:\n\
{\n\
  \"conversationSummary\": string or null,\n\
  \"journalSummary\": string or null,\n\
  \"checkinSummary\": string or null,\n\
  \"userFacts\": [string, ...],\n\
  \"followUps\": [string, ...],\n\
  \"emotionalState\": string,\n\
  \"notablePatterns\": [string, ...]\n\
}\n\
userFacts must be the COMPLETE replacement set of durable facts about the \
user: carry forward previous facts that still hold, update ones that \
changed, and drop only those that are contradicted. Keep summaries under \
three sentences each.";

/// How the pipeline concluded. Informational; callers fire and forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// A memory for today already exists.
    AlreadyExtractedToday,
    /// Another extraction run is in flight in this process.
    AlreadyRunning,
    /// First-ever run: nothing to cover, no record written.
    FirstRunNoOp,
    /// Window was empty; a carry-forward memory advanced the checkpoint.
    NoActivity,
    /// A full memory was extracted and persisted.
    Extracted,
    /// The vault locked mid-run; aborted without writing.
    VaultLocked,
    /// A concurrent run won the conditional insert for today.
    LostRace,
}

/// The strict JSON shape required from the model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedMemory {
    #[serde(default)]
    conversation_summary: Option<String>,
    #[serde(default)]
    journal_summary: Option<String>,
    #[serde(default)]
    checkin_summary: Option<String>,
    #[serde(default)]
    user_facts: Option<Vec<String>>,
    #[serde(default)]
    follow_ups: Vec<String>,
    emotional_state: String,
    #[serde(default)]
    notable_patterns: Vec<String>,
}

pub struct ExtractionPipeline {
    vault: Arc<Vault>,
    llm: Arc<dyn LlmTransport>,
    model: String,
    running: AtomicBool,
}

/// Clears the running flag even when the run exits early.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ExtractionPipeline {
    pub fn new(vault: Arc<Vault>, llm: Arc<dyn LlmTransport>, config: &LlmConfig) -> Self {
        Self {
            vault,
            llm,
            model: config.model.clone(),
            running: AtomicBool::new(false),
        }
    }

    /// Fire-and-forget trigger; call after each successful unlock.
    ///
    /// The spawned task owns its error boundary: nothing propagates back
    /// into the caller's stack.
    pub fn spawn(self: &Arc<Self>) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            match pipeline.run().await {
                Ok(outcome) => tracing::debug!(?outcome, "memory extraction finished"),
                Err(e) => tracing::warn!(
                    error = %e,
                    "memory extraction failed; window will be retried on next unlock"
                ),
            }
        });
    }

    /// One extraction attempt. Public for direct invocation in tests and
    /// tooling; production code goes through [`ExtractionPipeline::spawn`].
    pub async fn run(&self) -> Result<ExtractionOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(ExtractionOutcome::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let today = Utc::now().date_naive();

        let Some(previous) = ok_or_locked(self.vault.latest_memory())? else {
            return Ok(ExtractionOutcome::VaultLocked);
        };

        let previous = match previous {
            Some(memory) if memory.date == today => {
                return Ok(ExtractionOutcome::AlreadyExtractedToday);
            }
            Some(memory) => memory,
            // Nothing has ever been covered: there is no window to digest,
            // so the first run writes nothing at all.
            None => return Ok(ExtractionOutcome::FirstRunNoOp),
        };

        let covering_from = previous.covering_to;
        let previous_facts = previous.user_facts;

        let Some(chat) = ok_or_locked(self.vault.chat_messages_in_sessions_since(covering_from))?
        else {
            return Ok(ExtractionOutcome::VaultLocked);
        };
        let from_ts = covering_from
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        let Some(journal) = ok_or_locked(self.vault.journal_entries_since(from_ts))? else {
            return Ok(ExtractionOutcome::VaultLocked);
        };
        let Some(metrics) = ok_or_locked(self.vault.metrics_since(covering_from))? else {
            return Ok(ExtractionOutcome::VaultLocked);
        };

        if chat.is_empty() && journal.is_empty() && metrics.is_empty() {
            // Still advance the checkpoint so the empty range is not
            // re-scanned forever; facts carry forward unchanged.
            let memory = DailyMemory {
                date: today,
                covering_from,
                covering_to: today,
                conversation_summary: None,
                journal_summary: None,
                checkin_summary: None,
                user_facts: previous_facts,
                follow_ups: Vec::new(),
                emotional_state: NO_ACTIVITY_STATE.to_string(),
                notable_patterns: Vec::new(),
                created_at: Utc::now(),
            };
            return self.persist(memory, ExtractionOutcome::NoActivity);
        }

        let digest = build_digest(&chat, &journal, &metrics, &previous_facts);
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: EXTRACTION_MAX_TOKENS,
            system: Some(EXTRACTION_INSTRUCTION.to_string()),
            messages: vec![ChatTurn::user(digest)],
            tools: None,
        };

        tracing::debug!(
            chat = chat.len(),
            journal = journal.len(),
            metrics = metrics.len(),
            from = %covering_from,
            to = %today,
            "requesting memory extraction"
        );
        let response = self.llm.complete(&request).await?;

        let Some(extracted) = extract_json::<ExtractedMemory>(&response) else {
            tracing::warn!("extraction response was not the required JSON shape");
            return Err(EngineError::MalformedExtraction);
        };

        let user_facts = match extracted.user_facts {
            Some(facts) => {
                if previous_facts.len() >= 2 && facts.len() * 2 < previous_facts.len() {
                    tracing::warn!(
                        previous = previous_facts.len(),
                        replacement = facts.len(),
                        "model dropped most known user facts"
                    );
                }
                facts
            }
            None => previous_facts,
        };

        let memory = DailyMemory {
            date: today,
            covering_from,
            covering_to: today,
            conversation_summary: extracted.conversation_summary,
            journal_summary: extracted.journal_summary,
            checkin_summary: extracted.checkin_summary,
            user_facts,
            follow_ups: extracted.follow_ups,
            emotional_state: extracted.emotional_state,
            notable_patterns: extracted.notable_patterns,
            created_at: Utc::now(),
        };
        self.persist(memory, ExtractionOutcome::Extracted)
    }

    fn persist(&self, memory: DailyMemory, outcome: ExtractionOutcome) -> Result<ExtractionOutcome> {
        let Some(inserted) = ok_or_locked(self.vault.insert_memory_if_absent(&memory))? else {
            return Ok(ExtractionOutcome::VaultLocked);
        };
        if inserted {
            Ok(outcome)
        } else {
            tracing::debug!(date = %memory.date, "another run already wrote today's memory");
            Ok(ExtractionOutcome::LostRace)
        }
    }
}

/// `Ok(None)` when the vault locked mid-run, so callers can abort cleanly.
fn ok_or_locked<T>(result: haven_vault::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(VaultError::Locked) => {
            tracing::debug!("vault locked mid-extraction, aborting run");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Digest
// ---------------------------------------------------------------------------

fn build_digest(
    chat: &[ChatMessage],
    journal: &[JournalEntry],
    metrics: &[DailyMetric],
    previous_facts: &[String],
) -> String {
    let mut digest = String::new();

    digest.push_str("PREVIOUSLY KNOWN USER FACTS:\n");
    if previous_facts.is_empty() {
        digest.push_str("(none)\n");
    } else {
        for fact in previous_facts {
            digest.push_str(&format!("- {fact}\n"));
        }
    }

    if !chat.is_empty() {
        digest.push_str("\nCONVERSATIONS:\n");
        let mut current_session = "";
        for message in chat {
            if message.session_id != current_session {
                current_session = &message.session_id;
                digest.push_str(&format!("[session starting {}]\n", message.timestamp.format("%Y-%m-%d %H:%M")));
            }
            let speaker = match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "companion",
                MessageRole::System => "system",
            };
            digest.push_str(&format!(
                "{speaker}: {}\n",
                truncate_for_prompt(&message.content, MAX_CHAT_CHARS)
            ));
        }
    }

    if !journal.is_empty() {
        digest.push_str("\nJOURNAL:\n");
        for entry in journal {
            digest.push_str(&format!(
                "[{}] {}\n",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                truncate_for_prompt(&entry.text, MAX_JOURNAL_CHARS)
            ));
        }
    }

    if !metrics.is_empty() {
        digest.push_str("\nCHECK-INS:\n");
        for metric in metrics {
            digest.push_str(&metric_line(metric));
            digest.push('\n');
        }
    }

    digest
}

fn metric_line(metric: &DailyMetric) -> String {
    let mut line = format!(
        "{}: sober={}",
        metric.date,
        if metric.sobriety_maintained { "yes" } else { "no" }
    );
    if let Some(mood) = metric.mood {
        line.push_str(&format!(", mood {mood}/10"));
    }
    if let Some(craving) = metric.craving_intensity {
        line.push_str(&format!(", craving {craving}/10"));
    }
    if let Some(sleep) = metric.sleep_quality {
        line.push_str(&format!(", sleep {sleep}/10"));
    }
    if let Some(anxiety) = metric.anxiety_level {
        line.push_str(&format!(", anxiety {anxiety}/10"));
    }
    let done: Vec<&str> = metric
        .habits
        .iter()
        .filter(|(_, done)| **done)
        .map(|(name, _)| name.as_str())
        .collect();
    if !done.is_empty() {
        line.push_str(&format!(", habits: {}", done.join("/")));
    }
    if let Some(notes) = &metric.notes {
        line.push_str(&format!(", notes: {}", truncate_for_prompt(notes, MAX_JOURNAL_CHARS)));
    }
    line
}

fn truncate_for_prompt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}
