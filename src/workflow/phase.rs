//! Phase definitions.
//!
//! A session moves through a fixed set of phases:
//! Brainstorming → Planning → Implementation → Review → Finishing
//!
//! The registry below is static. Allowed transitions are ordered, and the
//! first entry is the one auto-advance picks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A stage of the development workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Exploring the problem and agreeing on a design
    #[default]
    Brainstorming,
    /// Writing the implementation plan
    Planning,
    /// Executing the plan
    Implementation,
    /// Reviewing the result
    Review,
    /// Merging, cleaning up, closing out
    Finishing,
}

/// Static description of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDefinition {
    /// The phase being described
    pub phase: Phase,
    /// Display name
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Phases reachable directly from this one, in preference order
    pub allowed_transitions: &'static [Phase],
    /// If true, auto-advance never fires from this phase
    pub requires_confirmation: bool,
    /// Skills a front end may activate when entering this phase
    pub auto_activate_skills: &'static [&'static str],
    /// Advisory duration budget in minutes (0 = unlimited)
    pub max_duration_minutes: u32,
}

const BRAINSTORMING: PhaseDefinition = PhaseDefinition {
    phase: Phase::Brainstorming,
    name: "Brainstorming",
    description: "Explore the problem space and settle on a design",
    allowed_transitions: &[Phase::Planning],
    requires_confirmation: true,
    auto_activate_skills: &["brainstorming"],
    max_duration_minutes: 30,
};

const PLANNING: PhaseDefinition = PhaseDefinition {
    phase: Phase::Planning,
    name: "Planning",
    description: "Break the design into an ordered implementation plan",
    allowed_transitions: &[Phase::Implementation, Phase::Brainstorming],
    requires_confirmation: true,
    auto_activate_skills: &["writing-plans"],
    max_duration_minutes: 60,
};

const IMPLEMENTATION: PhaseDefinition = PhaseDefinition {
    phase: Phase::Implementation,
    name: "Implementation",
    description: "Execute the plan task by task",
    allowed_transitions: &[Phase::Review, Phase::Planning],
    requires_confirmation: false,
    auto_activate_skills: &["executing-plans", "test-driven-development"],
    max_duration_minutes: 0,
};

const REVIEW: PhaseDefinition = PhaseDefinition {
    phase: Phase::Review,
    name: "Review",
    description: "Review the changes and address feedback",
    allowed_transitions: &[Phase::Finishing, Phase::Implementation],
    requires_confirmation: true,
    auto_activate_skills: &["requesting-code-review", "receiving-code-review"],
    max_duration_minutes: 30,
};

const FINISHING: PhaseDefinition = PhaseDefinition {
    phase: Phase::Finishing,
    name: "Finishing",
    description: "Merge or open a pull request and clean up the branch",
    allowed_transitions: &[],
    requires_confirmation: true,
    auto_activate_skills: &["finishing-a-development-branch"],
    max_duration_minutes: 15,
};

impl Phase {
    /// Every phase, in workflow order.
    pub const ALL: [Self; 5] =
        [Self::Brainstorming, Self::Planning, Self::Implementation, Self::Review, Self::Finishing];

    /// Get the static definition of this phase.
    pub fn definition(self) -> &'static PhaseDefinition {
        match self {
            Self::Brainstorming => &BRAINSTORMING,
            Self::Planning => &PLANNING,
            Self::Implementation => &IMPLEMENTATION,
            Self::Review => &REVIEW,
            Self::Finishing => &FINISHING,
        }
    }

    /// Phases reachable directly from this one.
    pub fn transitions_from(self) -> &'static [Phase] {
        self.definition().allowed_transitions
    }

    /// Whether moving out of this phase needs a user decision.
    pub fn requires_confirmation(self) -> bool {
        self.definition().requires_confirmation
    }

    /// Whether `target` is directly reachable from this phase.
    pub fn can_transition_to(self, target: Phase) -> bool {
        self.transitions_from().contains(&target)
    }

    /// The transition auto-advance would take, if any.
    pub fn default_next(self) -> Option<Phase> {
        self.transitions_from().first().copied()
    }

    /// Whether no transitions leave this phase.
    pub fn is_terminal(self) -> bool {
        self.transitions_from().is_empty()
    }

    /// Lowercase identifier used in the state file and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brainstorming => "brainstorming",
            Self::Planning => "planning",
            Self::Implementation => "implementation",
            Self::Review => "review",
            Self::Finishing => "finishing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "brainstorming" | "brainstorm" => Ok(Self::Brainstorming),
            "planning" | "plan" => Ok(Self::Planning),
            "implementation" | "implement" => Ok(Self::Implementation),
            "review" => Ok(Self::Review),
            "finishing" | "finish" => Ok(Self::Finishing),
            other => Err(format!(
                "unknown phase '{other}' (expected one of: brainstorming, planning, implementation, review, finishing)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finishing_is_terminal() {
        assert!(Phase::Finishing.transitions_from().is_empty());
        assert!(Phase::Finishing.is_terminal());
        assert_eq!(Phase::Finishing.default_next(), None);
    }

    #[test]
    fn test_only_finishing_is_terminal() {
        for phase in Phase::ALL {
            assert_eq!(phase.is_terminal(), phase == Phase::Finishing, "{phase}");
        }
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(Phase::Brainstorming.transitions_from(), &[Phase::Planning]);
        assert_eq!(
            Phase::Planning.transitions_from(),
            &[Phase::Implementation, Phase::Brainstorming]
        );
        assert_eq!(Phase::Implementation.transitions_from(), &[Phase::Review, Phase::Planning]);
        assert_eq!(Phase::Review.transitions_from(), &[Phase::Finishing, Phase::Implementation]);
    }

    #[test]
    fn test_brainstorming_cannot_skip_to_implementation() {
        assert!(!Phase::Brainstorming.can_transition_to(Phase::Implementation));
        assert!(Phase::Brainstorming.can_transition_to(Phase::Planning));
    }

    #[test]
    fn test_no_phase_transitions_to_itself() {
        for phase in Phase::ALL {
            assert!(!phase.can_transition_to(phase));
        }
    }

    #[test]
    fn test_confirmation_requirements() {
        assert!(Phase::Brainstorming.requires_confirmation());
        assert!(!Phase::Implementation.requires_confirmation());
        assert!(Phase::Review.requires_confirmation());
    }

    #[test]
    fn test_definition_matches_phase() {
        for phase in Phase::ALL {
            assert_eq!(phase.definition().phase, phase);
            assert!(!phase.definition().auto_activate_skills.is_empty());
        }
        assert_eq!(Phase::Implementation.definition().max_duration_minutes, 0);
    }

    #[test]
    fn test_parse_and_display() {
        for phase in Phase::ALL {
            assert_eq!(phase.to_string().parse::<Phase>(), Ok(phase));
        }
        assert_eq!("Plan".parse::<Phase>(), Ok(Phase::Planning));
        assert!("deploy".parse::<Phase>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&Phase::Implementation).unwrap();
        assert_eq!(json, "\"implementation\"");
        let back: Phase = serde_json::from_str("\"review\"").unwrap();
        assert_eq!(back, Phase::Review);
    }
}
