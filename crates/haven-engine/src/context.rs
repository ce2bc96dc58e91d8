//! Context window assembler.
//!
//! Builds the single bounded prompt payload for each model invocation from
//! everything the vault knows: profile, recent check-ins, daily memories,
//! durable facts, support network, configured guidance, and (for an ongoing
//! conversation) the session history plus any crisis note.
//!
//! Every fetch is independently fallible: a section whose read fails (no
//! support network yet, vault locked mid-assembly, corrupted record) is
//! omitted with a warning, never allowed to abort assembly. The user must
//! always be able to talk to the companion even when background features
//! are broken.

use haven_llm::{ChatRequest, ChatTurn, LlmConfig};
use haven_shared::types::{WidgetKind, WIDGET_COMMAND_SYNTAX};
use haven_vault::models::{
    AppSettings, DailyMemory, DailyMetric, MessageRole, SupportNetwork, UserProfile,
};
use haven_vault::Vault;

/// Bounded windows for context gathering.
const RECENT_METRICS: u32 = 7;
const RECENT_MEMORIES: u32 = 3;
const RECENT_SESSIONS: u32 = 5;

/// What kind of model invocation is being prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextRequest {
    /// First contact after opening the app.
    Greeting,
    /// A turn in an ongoing conversation.
    Ongoing {
        session_id: String,
        /// Safety note injected by the crisis gate, if any.
        crisis_note: Option<String>,
    },
}

/// Summary of widget-completion activity. The underlying logs live outside
/// the vault core; this trait is the seam.
pub trait ActivityInsights: Send + Sync {
    fn summary(&self) -> Option<String>;
}

/// No insights available (default collaborator).
pub struct NoInsights;

impl ActivityInsights for NoInsights {
    fn summary(&self) -> Option<String> {
        None
    }
}

pub struct ContextAssembler {
    model: String,
    max_tokens: u32,
}

impl ContextAssembler {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Gather every context source and compose the request payload.
    pub fn assemble(
        &self,
        vault: &Vault,
        request: &ContextRequest,
        insights: &dyn ActivityInsights,
    ) -> ChatRequest {
        let profile = fetch("profile", vault.get_profile()).flatten();
        let settings = fetch("settings", vault.get_settings());
        let metrics = fetch("metrics", vault.recent_metrics(RECENT_METRICS)).unwrap_or_default();
        let memories =
            fetch("memories", vault.recent_memories(RECENT_MEMORIES)).unwrap_or_default();
        let support = fetch("support_network", vault.get_support_network());
        let sessions =
            fetch("sessions", vault.recent_session_ids(RECENT_SESSIONS)).unwrap_or_default();
        let activity = insights.summary();

        let crisis_note = match request {
            ContextRequest::Ongoing { crisis_note, .. } => crisis_note.as_deref(),
            ContextRequest::Greeting => None,
        };

        let system = compose_system(
            profile.as_ref(),
            settings.as_ref(),
            &metrics,
            &memories,
            support.as_ref(),
            &sessions,
            activity.as_deref(),
            crisis_note,
        );

        let messages = match request {
            ContextRequest::Greeting => vec![ChatTurn::user(
                "(The user just opened the app. Greet them warmly and check in.)",
            )],
            ContextRequest::Ongoing { session_id, .. } => {
                let history = fetch("chat_history", vault.session_messages(session_id))
                    .unwrap_or_default();
                let mut turns: Vec<ChatTurn> = history
                    .iter()
                    .filter_map(|message| match message.role {
                        MessageRole::User => Some(ChatTurn::user(message.content.clone())),
                        MessageRole::Assistant => {
                            Some(ChatTurn::assistant(message.content.clone()))
                        }
                        MessageRole::System => None,
                    })
                    .collect();
                if turns.is_empty() {
                    turns.push(ChatTurn::user("(The user has just started this conversation.)"));
                }
                turns
            }
        };

        ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(system),
            messages,
            tools: None,
        }
    }
}

fn fetch<T>(section: &'static str, result: haven_vault::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(section, error = %e, "context section unavailable, omitting");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Block builders
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn compose_system(
    profile: Option<&UserProfile>,
    settings: Option<&AppSettings>,
    metrics: &[DailyMetric],
    memories: &[DailyMemory],
    support: Option<&SupportNetwork>,
    sessions: &[String],
    activity: Option<&str>,
    crisis_note: Option<&str>,
) -> String {
    let mut system = base_instruction();

    if let Some(profile) = profile {
        system.push_str(&profile_block(profile));
    }
    if let Some(guidance) = settings.and_then(|s| s.guidance.as_deref()) {
        system.push_str(&format!("\n\nCONFIGURED GUIDANCE:\n{guidance}"));
    }

    let knowledge = knowledge_block(memories);
    if !knowledge.is_empty() {
        system.push_str("\n\nWHAT YOU KNOW ABOUT THIS USER:\n");
        system.push_str(&knowledge);
    }

    if !metrics.is_empty() {
        system.push_str("\n\nRECENT CHECK-INS (newest first):\n");
        for metric in metrics {
            system.push_str(&metric_line(metric));
            system.push('\n');
        }
    }

    if let Some(support) = support {
        let block = support_block(
            support,
            settings.map(|s| s.share_names_with_model).unwrap_or(false),
        );
        if !block.is_empty() {
            system.push_str("\n\nSUPPORT NETWORK:\n");
            system.push_str(&block);
        }
    }

    if let Some(activity) = activity {
        system.push_str(&format!("\n\nACTIVITY INSIGHTS:\n{activity}"));
    }

    if !sessions.is_empty() {
        system.push_str(&format!(
            "\n\n(The user has {} recent conversation(s) with you.)",
            sessions.len()
        ));
    }

    if let Some(note) = crisis_note {
        system.push_str(&format!("\n\n{note}"));
    }

    system
}

fn base_instruction() -> String {
    let widget_ids = WidgetKind::ALL
        .iter()
        .map(|w| w.id())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a supportive recovery companion. You help the user stay \
         grounded in their recovery: listen first, reflect what you hear, and \
         never moralize. Keep responses warm and concise. You may offer an \
         interactive widget by embedding the tag {WIDGET_COMMAND_SYNTAX} in \
         your reply; valid widget ids are: {widget_ids}. Never invent facts \
         about the user beyond the context below."
    )
}

fn profile_block(profile: &UserProfile) -> String {
    let mut block = format!("\n\nUSER PROFILE:\nName: {}", profile.display_name);
    if let Some(philosophy) = &profile.recovery_philosophy {
        block.push_str(&format!("\nRecovery philosophy: {philosophy}"));
    }
    if let Some(stage) = &profile.recovery_stage {
        block.push_str(&format!("\nStage: {stage}"));
    }
    if let Some(commitment) = &profile.commitment_statement {
        block.push_str(&format!("\nCommitment: {commitment}"));
    }
    if let Some(start) = profile.sobriety_start {
        block.push_str(&format!("\nSobriety start date: {start}"));
    }
    block
}

/// Facts from the latest memory, then narrative summaries, follow-ups, and
/// patterns from the recent window (newest first).
fn knowledge_block(memories: &[DailyMemory]) -> String {
    let mut block = String::new();

    if let Some(latest) = memories.first() {
        for fact in &latest.user_facts {
            block.push_str(&format!("- {fact}\n"));
        }
    }

    for memory in memories {
        for summary in [
            &memory.conversation_summary,
            &memory.journal_summary,
            &memory.checkin_summary,
        ]
        .into_iter()
        .flatten()
        {
            block.push_str(&format!("[{}] {summary}\n", memory.date));
        }
        for follow_up in &memory.follow_ups {
            block.push_str(&format!("Follow up: {follow_up}\n"));
        }
        for pattern in &memory.notable_patterns {
            block.push_str(&format!("Pattern: {pattern}\n"));
        }
    }

    block
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
    if let Some(notes) = &metric.notes {
        line.push_str(&format!(", notes: {notes}"));
    }
    line
}

fn support_block(support: &SupportNetwork, share_names: bool) -> String {
    let mut block = String::new();
    for person in &support.people {
        let who = if share_names {
            format!("{} ({})", person.name, person.relationship)
        } else {
            // privacy toggle off: relationship only, no names in model context
            person.relationship.clone()
        };
        let crisis = if person.notify_in_crisis {
            ", can be reached in a crisis"
        } else {
            ""
        };
        block.push_str(&format!("- {who}{crisis}\n"));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::sync::Arc;
    use uuid::Uuid;

    use haven_store::Database;
    use haven_vault::models::{
        ChatMessage, SupportPerson, SupportTier,
    };

    fn populated_vault() -> Arc<Vault> {
        let vault = Arc::new(Vault::new(Database::open_in_memory().unwrap()));
        vault.create("pw").unwrap();

        vault
            .save_profile(&UserProfile {
                display_name: "Alex".to_string(),
                sobriety_start: NaiveDate::from_ymd_opt(2026, 1, 1),
                onboarding_complete: true,
                ..Default::default()
            })
            .unwrap();
        vault
            .save_metric(&DailyMetric {
                date: Utc::now().date_naive(),
                mood: Some(6),
                sobriety_maintained: true,
                habits: Default::default(),
                craving_intensity: None,
                sleep_quality: None,
                anxiety_level: None,
                notes: Some("long walk helped".to_string()),
            })
            .unwrap();
        vault
            .insert_memory_if_absent(&DailyMemory {
                date: Utc::now().date_naive(),
                covering_from: Utc::now().date_naive(),
                covering_to: Utc::now().date_naive(),
                conversation_summary: Some("Talked about work stress.".to_string()),
                journal_summary: None,
                checkin_summary: None,
                user_facts: vec!["trigger: work stress".to_string()],
                follow_ups: vec!["ask about the job interview".to_string()],
                emotional_state: "hopeful".to_string(),
                notable_patterns: vec![],
                created_at: Utc::now(),
            })
            .unwrap();
        vault
            .save_support_network(&SupportNetwork {
                people: vec![SupportPerson {
                    id: Uuid::new_v4(),
                    name: "Jordan".to_string(),
                    relationship: "sponsor".to_string(),
                    contact_method: None,
                    contact_info: None,
                    tier: SupportTier::Core,
                    notify_in_crisis: true,
                }],
                emergency_contacts: vec![],
            })
            .unwrap();
        vault
    }

    fn assembler() -> ContextAssembler {
        ContextAssembler::new(&LlmConfig::default())
    }

    #[test]
    fn greeting_includes_known_context() {
        let vault = populated_vault();
        let request = assembler().assemble(&vault, &ContextRequest::Greeting, &NoInsights);

        let system = request.system.unwrap();
        assert!(system.contains("Alex"));
        assert!(system.contains("trigger: work stress"));
        assert!(system.contains("long walk helped"));
        assert!(system.contains("ask about the job interview"));
        assert!(system.contains("breathing"));
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn support_names_hidden_unless_shared() {
        let vault = populated_vault();

        // default: privacy toggle off, names stay out of model context
        let request = assembler().assemble(&vault, &ContextRequest::Greeting, &NoInsights);
        let system = request.system.unwrap();
        assert!(!system.contains("Jordan"));
        assert!(system.contains("sponsor"));

        let mut settings = vault.get_settings().unwrap();
        settings.share_names_with_model = true;
        vault.save_settings(&settings).unwrap();

        let request = assembler().assemble(&vault, &ContextRequest::Greeting, &NoInsights);
        assert!(request.system.unwrap().contains("Jordan"));
    }

    #[test]
    fn ongoing_includes_history_and_crisis_note() {
        let vault = populated_vault();
        let session = haven_vault::models::new_session_id();
        vault
            .append_chat_message(&ChatMessage::new(&session, MessageRole::User, "rough day"))
            .unwrap();
        vault
            .append_chat_message(&ChatMessage::new(
                &session,
                MessageRole::Assistant,
                "tell me about it",
            ))
            .unwrap();

        let request = assembler().assemble(
            &vault,
            &ContextRequest::Ongoing {
                session_id: session,
                crisis_note: Some("SAFETY CONTEXT: concern level.".to_string()),
            },
            &NoInsights,
        );

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, "rough day");
        assert!(request.system.unwrap().contains("SAFETY CONTEXT"));
    }

    #[test]
    fn locked_vault_still_produces_a_prompt() {
        let vault = populated_vault();
        vault.lock();

        let request = assembler().assemble(&vault, &ContextRequest::Greeting, &NoInsights);
        let system = request.system.unwrap();

        // fixed instruction survives; user-specific sections are omitted
        assert!(system.contains("recovery companion"));
        assert!(!system.contains("Alex"));
        assert!(!request.messages.is_empty());
    }

    struct FixedInsights;

    impl ActivityInsights for FixedInsights {
        fn summary(&self) -> Option<String> {
            Some("Completed 3 breathing exercises this week.".to_string())
        }
    }

    #[test]
    fn insights_section_included_when_available() {
        let vault = populated_vault();
        let request = assembler().assemble(&vault, &ContextRequest::Greeting, &FixedInsights);
        assert!(request
            .system
            .unwrap()
            .contains("Completed 3 breathing exercises"));
    }
}
