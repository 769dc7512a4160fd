//! Projections of a rule record into the catalogue query and the recording
//! options attached to its matches.
//!
//! A rule is stored as one wide record; the catalogue and the recorder each
//! consume a narrow slice of it. The projections copy a field only when the
//! rule carries a value, so absence and an explicit null in the rule store
//! are indistinguishable downstream.

use serde::{Deserialize, Serialize};

use crate::rule::Rule;

/// Catalogue search parameters derived from a rule.
///
/// `week` is always present; every other criterion is forwarded only when
/// the rule sets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOption {
    /// Weekday bitmask, bit 0 = Sunday.
    pub week: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_cs: Option<bool>,
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
}

impl From<&Rule> for SearchOption {
    fn from(rule: &Rule) -> Self {
        Self {
            week: rule.week,
            keyword: rule.keyword.clone(),
            ignore_keyword: rule.ignore_keyword.clone(),
            key_cs: rule.key_cs,
            key_reg_exp: rule.key_reg_exp,
            title: rule.title,
            description: rule.description,
            extended: rule.extended,
            gr: rule.gr,
            bs: rule.bs,
            cs: rule.cs,
            sky: rule.sky,
            station: rule.station,
            genrelv1: rule.genrelv1,
            genrelv2: rule.genrelv2,
            start_time: rule.start_time,
            time_range: rule.time_range,
            is_free: rule.is_free,
            dur_min: rule.dur_min,
            dur_max: rule.dur_max,
        }
    }
}

/// Per-rule output policy applied to every match of the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOption {
    pub enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_format: Option<String>,
}

impl From<&Rule> for RuleOption {
    fn from(rule: &Rule) -> Self {
        Self {
            enable: rule.enable,
            directory: rule.directory.clone(),
            recorded_format: rule.recorded_format.clone(),
        }
    }
}

/// Transcode directive attached to a reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeOption {
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
    /// Delete the transport stream once every encode finished.
    pub del_ts: bool,
}

impl EncodeOption {
    /// Builds the directive from a rule. A rule opts into encoding by setting
    /// `delTs`; without it no directive is attached to its matches.
    pub fn from_rule(rule: &Rule) -> Option<Self> {
        let del_ts = rule.del_ts?;
        Some(Self {
            mode1: rule.mode1,
            directory1: rule.directory1.clone(),
            mode2: rule.mode2,
            directory2: rule.directory2.clone(),
            mode3: rule.mode3,
            directory3: rule.directory3.clone(),
            del_ts,
        })
    }

    /// Validates a caller-supplied directive before it is accepted into a
    /// manual reservation: at least one mode must be named, and a directory
    /// is meaningless without its mode.
    pub fn validate(&self) -> Result<(), String> {
        if self.mode1.is_none() && self.mode2.is_none() && self.mode3.is_none() {
            return Err("no encode mode specified".to_string());
        }
        for (directory, mode, slot) in [
            (&self.directory1, self.mode1, 1),
            (&self.directory2, self.mode2, 2),
            (&self.directory3, self.mode3, 3),
        ] {
            if directory.is_some() && mode.is_none() {
                return Err(format!("directory{slot} given without mode{slot}"));
            }
        }
        Ok(())
    }
}
