//! Reservation records: the unit of planning.

use serde::{Deserialize, Serialize};

use crate::program::Program;
use crate::query::{EncodeOption, RuleOption};
use crate::rule::Rule;
use crate::{RuleId, UnixMillis};

/// How a reservation came to exist.
///
/// Serialised untagged and flattened into the reservation record, so the
/// document carries `manualId` xor `ruleId` — exactly one, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Origin {
    /// Pinned to one specific program by the user. `manual_id` is the
    /// creation-time epoch-ms and doubles as the manual priority: smaller
    /// means reserved earlier means higher authority.
    Manual {
        #[serde(rename = "manualId")]
        manual_id: UnixMillis,
    },
    /// Produced by a matching rule at planning time; comes and goes as the
    /// catalogue changes.
    Rule {
        #[serde(rename = "ruleId")]
        rule_id: RuleId,
        #[serde(rename = "ruleOption", default, skip_serializing_if = "Option::is_none")]
        rule_option: Option<RuleOption>,
    },
}

/// One program the user wants recorded, with its origin, output policy and
/// the flags derived by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Program snapshot captured at planning time.
    pub program: Program,
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encode_option: Option<EncodeOption>,
    /// User override: keep the record but do not record the program.
    #[serde(default)]
    pub is_skip: bool,
    /// Derived by the resolver; never trusted as input.
    #[serde(default)]
    pub is_conflict: bool,
}

impl Reservation {
    /// Creates a manual reservation for one specific program.
    pub fn manual(
        program: Program,
        manual_id: UnixMillis,
        encode_option: Option<EncodeOption>,
    ) -> Self {
        Self {
            program,
            origin: Origin::Manual { manual_id },
            encode_option,
            is_skip: false,
            is_conflict: false,
        }
    }

    /// Creates a rule reservation, snapshotting the rule's output and encode
    /// policy alongside the match.
    pub fn from_rule(rule: &Rule, program: Program) -> Self {
        Self {
            program,
            origin: Origin::Rule {
                rule_id: rule.id,
                rule_option: Some(RuleOption::from(rule)),
            },
            encode_option: EncodeOption::from_rule(rule),
            is_skip: false,
            is_conflict: false,
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self.origin, Origin::Manual { .. })
    }

    pub fn manual_id(&self) -> Option<UnixMillis> {
        match self.origin {
            Origin::Manual { manual_id } => Some(manual_id),
            Origin::Rule { .. } => None,
        }
    }

    pub fn rule_id(&self) -> Option<RuleId> {
        match self.origin {
            Origin::Manual { .. } => None,
            Origin::Rule { rule_id, .. } => Some(rule_id),
        }
    }
}
