use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::scheduler::prober::ProbeError;

/// Command names emitted by the front-end that change the monitored set.
pub const ADD_URL_COMMAND: &str = "add_url";
pub const MUTE_ALL_COMMAND: &str = "mute_all";
pub const UNMUTE_ALL_COMMAND: &str = "unmute_all";

pub const REFRESH_COMMANDS: [&str; 3] = [ADD_URL_COMMAND, MUTE_ALL_COMMAND, UNMUTE_ALL_COMMAND];

/// A user-registered URL, as read from the target store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredTarget {
    pub owner_id: i64,
    pub url: String,
    /// Request timeout as a duration string, e.g. `"5s"`.
    pub connection_timeout: String,
    /// Poll interval as a duration string; also the grouping key.
    pub poll_interval: String,
    pub notify_on_failure: bool,
}

/// Targets bucketed by their poll-interval key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetGroups {
    groups: BTreeMap<String, Vec<MonitoredTarget>>,
}

impl TargetGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partitions `targets` by `poll_interval`, keeping input order within each group.
    pub fn from_targets<I>(targets: I) -> Self
    where
        I: IntoIterator<Item = MonitoredTarget>,
    {
        let mut groups = Self::new();
        for target in targets {
            groups.push(target);
        }
        groups
    }

    pub fn push(&mut self, target: MonitoredTarget) {
        self.groups
            .entry(target.poll_interval.clone())
            .or_default()
            .push(target);
    }

    /// Appends every target of `other` to the matching group of `self`.
    pub fn merge(&mut self, other: TargetGroups) {
        for (key, targets) in other.groups {
            self.groups.entry(key).or_default().extend(targets);
        }
    }

    pub fn get(&self, key: &str) -> Option<&[MonitoredTarget]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Number of distinct interval keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of targets across all groups.
    pub fn target_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MonitoredTarget])> {
        self.groups
            .iter()
            .map(|(key, targets)| (key.as_str(), targets.as_slice()))
    }
}

impl IntoIterator for TargetGroups {
    type Item = (String, Vec<MonitoredTarget>);
    type IntoIter = btree_map::IntoIter<String, Vec<MonitoredTarget>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

impl FromIterator<MonitoredTarget> for TargetGroups {
    fn from_iter<I: IntoIterator<Item = MonitoredTarget>>(iter: I) -> Self {
        Self::from_targets(iter)
    }
}

/// The recorded result of one probe attempt.
#[derive(Clone, Debug)]
pub struct ProbeOutcome {
    pub target: MonitoredTarget,
    pub error: Option<ProbeError>,
    pub http_status: u16,
    pub elapsed_seconds: f64,
    pub cancelled: bool,
    pub recorded_at: DateTime<Utc>,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandPhase {
    Before,
    After,
}

/// Emitted by the command front-end around a mutating command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub command: String,
    pub phase: CommandPhase,
}

impl ChangeEvent {
    pub fn new(command: impl Into<String>, phase: CommandPhase) -> Self {
        Self {
            command: command.into(),
            phase,
        }
    }

    pub fn after(command: impl Into<String>) -> Self {
        Self::new(command, CommandPhase::After)
    }

    /// Whether this command can change the set of scheduled targets.
    pub fn requires_refresh(&self) -> bool {
        REFRESH_COMMANDS.contains(&self.command.as_str())
    }
}
