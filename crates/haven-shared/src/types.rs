//! Domain types shared across crates.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Crisis assessment
// ---------------------------------------------------------------------------

/// Severity reported by the crisis classifier, ordered by urgency.
///
/// The classifier itself is an external collaborator; the core only branches
/// on its output: `Emergency` blocks the model request entirely,
/// `Urgent`/`Concern` inject extra context into the prompt, `Monitor`
/// proceeds unchanged.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum CrisisLevel {
    #[default]
    Monitor,
    Concern,
    Urgent,
    Emergency,
}

/// Output of the crisis classifier for one user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrisisAssessment {
    pub level: CrisisLevel,
    pub recommended_action: String,
}

// ---------------------------------------------------------------------------
// Widgets
// ---------------------------------------------------------------------------

/// Interactive widgets the model may request by embedding a command tag in
/// its text output.
///
/// The tag syntax is `[[widget:<id> <json-params>]]`, e.g.
/// `[[widget:breathing {"cycles":4}]]`. Parsing the tag out of streamed text
/// and rendering the widget is a UI concern; this registry exists so the
/// system instruction can enumerate valid identifiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    /// Guided breathing exercise.
    Breathing,
    /// CBT thought record form.
    ThoughtRecord,
    /// SMART goal builder.
    SmartGoal,
    /// Urge-surfing timer.
    UrgeSurf,
    /// Crisis safety plan review.
    SafetyPlan,
    /// Gratitude list prompt.
    Gratitude,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 6] = [
        WidgetKind::Breathing,
        WidgetKind::ThoughtRecord,
        WidgetKind::SmartGoal,
        WidgetKind::UrgeSurf,
        WidgetKind::SafetyPlan,
        WidgetKind::Gratitude,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            WidgetKind::Breathing => "breathing",
            WidgetKind::ThoughtRecord => "thought_record",
            WidgetKind::SmartGoal => "smart_goal",
            WidgetKind::UrgeSurf => "urge_surf",
            WidgetKind::SafetyPlan => "safety_plan",
            WidgetKind::Gratitude => "gratitude",
        }
    }

    pub fn from_id(id: &str) -> Option<WidgetKind> {
        Self::ALL.iter().copied().find(|w| w.id() == id)
    }
}

/// The tag syntax description embedded in the system instruction.
pub const WIDGET_COMMAND_SYNTAX: &str = "[[widget:<id> <json-params>]]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crisis_level_ordering() {
        assert!(CrisisLevel::Monitor < CrisisLevel::Concern);
        assert!(CrisisLevel::Concern < CrisisLevel::Urgent);
        assert!(CrisisLevel::Urgent < CrisisLevel::Emergency);
    }

    #[test]
    fn test_crisis_level_serde() {
        let json = serde_json::to_string(&CrisisLevel::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
        let back: CrisisLevel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CrisisLevel::Urgent);
    }

    #[test]
    fn test_widget_id_roundtrip() {
        for widget in WidgetKind::ALL {
            assert_eq!(WidgetKind::from_id(widget.id()), Some(widget));
        }
        assert_eq!(WidgetKind::from_id("nope"), None);
    }
}
