//! Wire types for generation runs.
//!
//! The server's step/action payloads are loosely shaped: fields come and go
//! between revisions, timestamps arrive as either RFC 3339 strings or unix
//! milliseconds, and `null` is used interchangeably with omission. All of
//! that tolerance lives here, at the decoding boundary; everything downstream
//! works with plain typed records and the pure [`derive_step_state`]
//! function.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

/// A JSON field that distinguishes "absent" from "present but null" from a
/// parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<T> {
    Missing,
    Null,
    Value(T),
}

// Not derived: the derive would bound `T: Default`, which the wrapped types
// don't all have.
impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Missing
    }
}

impl<T> Field<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Present on the wire, whether or not it carried a usable value.
    pub fn is_set(&self) -> bool {
        matches!(self, Field::Value(_))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `#[serde(default)]` on the containing field yields `Missing` when
        // the key is absent entirely.
        Ok(match Option::<T>::deserialize(deserializer)? {
            None => Field::Null,
            Some(v) => Field::Value(v),
        })
    }
}

/// A timestamp that may arrive as an RFC 3339 string or unix milliseconds.
///
/// Unparseable values decode as [`StartDate::Raw`] instead of failing the
/// whole snapshot: presence alone is enough to mark a step in progress, the
/// parsed instant is only needed for the elapsed display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDate {
    Parsed(DateTime<Utc>),
    Raw,
}

impl StartDate {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            StartDate::Parsed(t) => Some(*t),
            StartDate::Raw => None,
        }
    }
}

impl<'de> Deserialize<'de> for StartDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StartDateVisitor;

        impl<'de> Visitor<'de> for StartDateVisitor {
            type Value = StartDate;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an RFC 3339 timestamp or unix milliseconds")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<StartDate, E> {
                Ok(DateTime::parse_from_rfc3339(v)
                    .map(|t| StartDate::Parsed(t.with_timezone(&Utc)))
                    .unwrap_or(StartDate::Raw))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<StartDate, E> {
                Ok(match Utc.timestamp_millis_opt(v).single() {
                    Some(t) => StartDate::Parsed(t),
                    None => StartDate::Raw,
                })
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<StartDate, E> {
                self.visit_i64(i64::try_from(v).unwrap_or(i64::MAX))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<StartDate, E> {
                self.visit_i64(v as i64)
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<StartDate, E> {
                Ok(StartDate::Raw)
            }
        }

        deserializer.deserialize_any(StartDateVisitor)
    }
}

/// Execution record a step points to.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub start_date: Field<StartDate>,
    /// Milliseconds, populated once the action completes.
    #[serde(default)]
    pub elapsed_time: Field<f64>,
}

/// Named unit of generation work.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub action_id: i64,
    #[serde(default = "unknown_description")]
    pub description: String,
}

fn unknown_description() -> String {
    "Unknown".to_string()
}

/// Paired steps/actions state for a generation run at one point in time.
///
/// Snapshots fully replace each other; nothing is merged across deliveries.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub all_steps: Vec<Step>,
    #[serde(default)]
    pub all_actions: Vec<Action>,
}

impl Snapshot {
    /// Decode from a raw JSON value, degrading to an empty snapshot when the
    /// payload is structurally unexpected.
    pub fn from_value(value: serde_json::Value) -> Snapshot {
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn find_action(&self, action_id: i64) -> Option<&Action> {
        self.all_actions.iter().find(|a| a.id == action_id)
    }
}

/// Displayed state of a step, derived from its referenced action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepState {
    Waiting,
    InProgress { elapsed_secs: Option<f64> },
    Completed { elapsed_secs: Option<f64> },
}

/// Derive a step's display state from the snapshot's actions.
///
/// No matching action means waiting. A matching action with a populated
/// start date but no completion flag is in progress, elapsed computed
/// against `now`. A completed action reports its recorded elapsed time.
pub fn derive_step_state(step: &Step, snapshot: &Snapshot, now: DateTime<Utc>) -> StepState {
    let Some(action) = snapshot.find_action(step.action_id) else {
        return StepState::Waiting;
    };

    if action.is_completed {
        return StepState::Completed {
            elapsed_secs: action.elapsed_time.value().map(|ms| ms / 1000.0),
        };
    }

    if action.start_date.is_set() {
        let elapsed_secs = action
            .start_date
            .value()
            .and_then(StartDate::instant)
            .map(|start| (now - start).num_milliseconds().max(0) as f64 / 1000.0);
        return StepState::InProgress { elapsed_secs };
    }

    StepState::Waiting
}

/// Lightweight run status from the active-run endpoint.
///
/// Independent of [`Snapshot`]; used as a secondary completion signal and to
/// sanity-check that the session is known to the server.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub active_run_id: i64,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub start_date: Field<StartDate>,
}

impl JobStatus {
    /// Sentinel run id the server returns for unknown sessions.
    pub const INVALID_RUN_ID: i64 = -1;

    pub fn is_invalid_session(&self) -> bool {
        self.active_run_id == Self::INVALID_RUN_ID
    }
}
