//! Crisis gate.
//!
//! The keyword/heuristic classifier itself lives outside the core and is
//! consumed through the [`CrisisClassifier`] trait. The core's only
//! obligation is the branch: every user message passes through
//! [`gate_message`] *before* any model request is constructed.

use haven_shared::types::{CrisisAssessment, CrisisLevel};

/// Black-box classifier collaborator.
pub trait CrisisClassifier: Send + Sync {
    fn assess(&self, text: &str) -> CrisisAssessment;
}

/// Decision for one outgoing user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageGate {
    /// `Emergency`: no model request may be made for this message.
    Blocked { assessment: CrisisAssessment },
    /// Proceed, optionally injecting a safety note into the prompt.
    Proceed {
        assessment: CrisisAssessment,
        context_note: Option<String>,
    },
}

/// Classify a user message and decide how the model request proceeds:
/// `emergency` blocks it entirely, `urgent`/`concern` inject extra context,
/// `monitor` passes through unchanged.
pub fn gate_message(classifier: &dyn CrisisClassifier, text: &str) -> MessageGate {
    let assessment = classifier.assess(text);

    match assessment.level {
        CrisisLevel::Emergency => {
            tracing::warn!(
                action = %assessment.recommended_action,
                "message blocked by crisis gate"
            );
            MessageGate::Blocked { assessment }
        }
        CrisisLevel::Urgent | CrisisLevel::Concern => {
            let note = format!(
                "SAFETY CONTEXT: the user's latest message was assessed at the \
                 '{level}' level. Recommended action: {action}. Respond with \
                 particular care, prioritize the user's immediate wellbeing, and \
                 surface their support network where appropriate.",
                level = level_name(assessment.level),
                action = assessment.recommended_action,
            );
            MessageGate::Proceed {
                assessment,
                context_note: Some(note),
            }
        }
        CrisisLevel::Monitor => MessageGate::Proceed {
            assessment,
            context_note: None,
        },
    }
}

fn level_name(level: CrisisLevel) -> &'static str {
    match level {
        CrisisLevel::Monitor => "monitor",
        CrisisLevel::Concern => "concern",
        CrisisLevel::Urgent => "urgent",
        CrisisLevel::Emergency => "emergency",
    }
}
