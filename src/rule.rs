//! User-defined matching rule records.

use serde::{Deserialize, Serialize};

use crate::RuleId;

/// A user-defined query that yields zero or more programs per re-plan,
/// together with the output and encode policy applied to every match.
///
/// The record is stored wide; the catalogue and the recorder each consume a
/// narrow projection of it (see [`crate::query`]). Optional fields left
/// `None` are simply absent from the projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub enable: bool,
    /// Weekday bitmask, bit 0 = Sunday.
    pub week: u8,

    // Search fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_keyword: Option<String>,
    /// Case-sensitive keyword matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_cs: Option<bool>,
    /// Treat the keyword as a regular expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_reg_exp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<bool>,
    #[serde(rename = "GR", default, skip_serializing_if = "Option::is_none")]
    pub gr: Option<bool>,
    #[serde(rename = "BS", default, skip_serializing_if = "Option::is_none")]
    pub bs: Option<bool>,
    #[serde(rename = "CS", default, skip_serializing_if = "Option::is_none")]
    pub cs: Option<bool>,
    #[serde(rename = "SKY", default, skip_serializing_if = "Option::is_none")]
    pub sky: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genrelv1: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genrelv2: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur_min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur_max: Option<i32>,

    // Output fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_format: Option<String>,

    // Encode fields. `del_ts` set is what opts a rule into encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode1: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode2: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode3: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub del_ts: Option<bool>,
}

impl Rule {
    /// Creates an enabled rule matching every weekday, with no other criteria.
    pub fn new(id: RuleId) -> Self {
        Self {
            id,
            enable: true,
            week: 0b111_1111,
            keyword: None,
            ignore_keyword: None,
            key_cs: None,
            key_reg_exp: None,
            title: None,
            description: None,
            extended: None,
            gr: None,
            bs: None,
            cs: None,
            sky: None,
            station: None,
            genrelv1: None,
            genrelv2: None,
            start_time: None,
            time_range: None,
            is_free: None,
            dur_min: None,
            dur_max: None,
            directory: None,
            recorded_format: None,
            mode1: None,
            directory1: None,
            mode2: None,
            directory2: None,
            mode3: None,
            directory3: None,
            del_ts: None,
        }
    }
}
