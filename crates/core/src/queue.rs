//! Queue entry removal payloads.
//!
//! Removing a patient from a service queue ends the queue entry, ends the active visit and
//! completes the patient's checked-in appointments for the day. This module builds the
//! request bodies; the client sends them.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A `{ uuid }` reference to another resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub uuid: String,
}

/// The patient's active visit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub uuid: String,
    #[serde(default)]
    pub location: Option<ResourceRef>,
    #[serde(default)]
    pub start_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visit_type: Option<ResourceRef>,
}

/// A queue entry selected for removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntryRef {
    pub queue_uuid: String,
    pub queue_entry_uuid: String,
    pub visit_uuid: String,
    pub patient_uuid: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndQueueEntryPayload {
    pub ended_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndVisitPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_type: Option<String>,
    pub stop_datetime: DateTime<Utc>,
}

impl EndVisitPayload {
    /// Closes `visit` at `now`, keeping its location, start and type.
    pub fn from_visit(visit: Option<&Visit>, now: DateTime<Utc>) -> Self {
        Self {
            location: visit.and_then(|v| v.location.as_ref()).map(|l| l.uuid.clone()),
            start_datetime: visit.and_then(|v| v.start_datetime),
            visit_type: visit
                .and_then(|v| v.visit_type.as_ref())
                .map(|t| t.uuid.clone()),
            stop_datetime: now,
        }
    }
}

pub const CHECKED_IN_STATUS: &str = "CheckedIn";
pub const COMPLETED_STATUS: &str = "Completed";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub uuid: String,
    pub status: String,
    #[serde(default)]
    pub patient: Option<ResourceRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentStatusChange {
    pub to_status: String,
    pub on_date: DateTime<Utc>,
}

impl AppointmentStatusChange {
    pub fn completed(on_date: DateTime<Utc>) -> Self {
        Self {
            to_status: COMPLETED_STATUS.to_string(),
            on_date,
        }
    }
}

/// Checked-in appointments belonging to `patient_uuid`.
pub fn checked_in_appointments<'a>(
    appointments: &'a [Appointment],
    patient_uuid: &str,
) -> Vec<&'a Appointment> {
    appointments
        .iter()
        .filter(|a| a.status == CHECKED_IN_STATUS)
        .filter(|a| a.patient.as_ref().is_some_and(|p| p.uuid == patient_uuid))
        .collect()
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}
