//! Decrypted domain structs.
//!
//! These exist only in memory, inside an unlocked session. Before they
//! touch the store they are serialized to JSON and AEAD-encrypted; the
//! store only ever sees the ciphertext plus the index fields mirrored onto
//! its row types.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use haven_shared::types::{CrisisLevel, WidgetKind};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Singleton per vault. Created at onboarding completion, overwritten (not
/// versioned) by later edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub display_name: String,
    /// Chosen recovery philosophy (e.g. abstinence, moderation).
    #[serde(default)]
    pub recovery_philosophy: Option<String>,
    /// Self-assessed stage of change.
    #[serde(default)]
    pub recovery_stage: Option<String>,
    /// The usage pattern the user described during onboarding.
    #[serde(default)]
    pub usage_pattern: Option<String>,
    #[serde(default)]
    pub commitment_statement: Option<String>,
    #[serde(default)]
    pub sobriety_start: Option<NaiveDate>,
    #[serde(default)]
    pub onboarding_complete: bool,
}

// ---------------------------------------------------------------------------
// Daily metric
// ---------------------------------------------------------------------------

/// One check-in per calendar date. Saving twice for the same date
/// overwrites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyMetric {
    pub date: NaiveDate,
    /// Mood score 1-10.
    #[serde(default)]
    pub mood: Option<u8>,
    pub sobriety_maintained: bool,
    /// Boolean habit flags keyed by habit name (exercise, meditation, ...).
    #[serde(default)]
    pub habits: BTreeMap<String, bool>,
    #[serde(default)]
    pub craving_intensity: Option<u8>,
    #[serde(default)]
    pub sleep_quality: Option<u8>,
    #[serde(default)]
    pub anxiety_level: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// Fixed tag vocabulary for journal entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JournalTag {
    Craving,
    Trigger,
    Gratitude,
    Win,
    Setback,
    Relationship,
    Health,
    Work,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<JournalTag>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

impl JournalEntry {
    pub fn new(text: impl Into<String>, tags: Vec<JournalTag>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            text: text.into(),
            tags,
            sentiment: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A widget invocation embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidgetInvocation {
    pub kind: WidgetKind,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub widgets: Vec<WidgetInvocation>,
    #[serde(default)]
    pub crisis_level: Option<CrisisLevel>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(session_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            widgets: Vec::new(),
            crisis_level: None,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session ids
// ---------------------------------------------------------------------------

/// Mint a session id that encodes its creation time.
///
/// Ids sort lexicographically by creation time, so "sessions created since
/// date D" is a plain string comparison against [`session_window_prefix`].
pub fn new_session_id() -> String {
    new_session_id_at(Utc::now())
}

pub fn new_session_id_at(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("s{}-{}", at.format("%Y%m%dT%H%M%S"), &suffix[..8])
}

/// Lower bound matching every session created on or after `from`.
pub fn session_window_prefix(from: NaiveDate) -> String {
    format!("s{}T000000", from.format("%Y%m%d"))
}

// ---------------------------------------------------------------------------
// Daily memory
// ---------------------------------------------------------------------------

/// Output of the extraction pipeline: a structured digest of the user's
/// activity over `[covering_from, covering_to)`. At most one per calendar
/// date; never mutated after creation, a newer date supersedes it as
/// "latest".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyMemory {
    pub date: NaiveDate,
    /// Inclusive start of the covered window.
    pub covering_from: NaiveDate,
    /// Exclusive end of the covered window.
    pub covering_to: NaiveDate,
    #[serde(default)]
    pub conversation_summary: Option<String>,
    #[serde(default)]
    pub journal_summary: Option<String>,
    #[serde(default)]
    pub checkin_summary: Option<String>,
    /// The authoritative, deduplicated set of durable user facts. Each new
    /// memory *replaces* this set; it is never appended to.
    #[serde(default)]
    pub user_facts: Vec<String>,
    #[serde(default)]
    pub follow_ups: Vec<String>,
    pub emotional_state: String,
    #[serde(default)]
    pub notable_patterns: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Support network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SupportTier {
    Core,
    Extended,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupportPerson {
    pub id: Uuid,
    pub name: String,
    pub relationship: String,
    #[serde(default)]
    pub contact_method: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
    pub tier: SupportTier,
    /// Whether this person may be surfaced in a crisis.
    #[serde(default)]
    pub notify_in_crisis: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencyContact {
    pub name: String,
    pub contact_info: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Singleton blob, edited wholesale by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SupportNetwork {
    #[serde(default)]
    pub people: Vec<SupportPerson>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

/// Singleton; no history kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSettings {
    #[serde(default)]
    pub theme: Theme,
    /// Whether support-network names may appear in model context.
    #[serde(default)]
    pub share_names_with_model: bool,
    /// Idle minutes before the vault locks itself. `None` disables.
    #[serde(default = "default_auto_lock")]
    pub auto_lock_minutes: Option<u32>,
    /// Therapist-configured guidance injected into the model context.
    #[serde(default)]
    pub guidance: Option<String>,
}

fn default_auto_lock() -> Option<u32> {
    Some(15)
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            share_names_with_model: false,
            auto_lock_minutes: default_auto_lock(),
            guidance: None,
        }
    }
}
