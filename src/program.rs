//! Broadcast program descriptors as delivered by the catalogue.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::interval::Interval;
use crate::{ProgramId, UnixMillis};

/// Broadcast channel family a program airs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    GR,
    BS,
    CS,
    SKY,
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelType::GR => "GR",
            ChannelType::BS => "BS",
            ChannelType::CS => "CS",
            ChannelType::SKY => "SKY",
        };
        f.write_str(name)
    }
}

/// A broadcast event with a fixed airtime and channel type.
///
/// The planner interprets only the identity, the airtime and the channel
/// type. Every other field is descriptive payload for the recorder and is
/// carried through unchanged; fields this struct does not name land in
/// [`extra`](Program::extra) and survive a save/load cycle verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: ProgramId,
    pub start_at: UnixMillis,
    pub end_at: UnixMillis,
    pub channel_type: ChannelType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre1: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre2: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_free: Option<bool>,
    /// Descriptive fields the planner does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Program {
    /// Airtime as a half-open interval.
    pub fn airtime(&self) -> Interval {
        Interval::new(self.start_at, self.end_at)
    }

    /// Returns true if the two airtimes overlap.
    pub fn overlaps(&self, other: &Program) -> bool {
        self.airtime().overlaps(&other.airtime())
    }
}
