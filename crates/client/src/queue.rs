//! Queue entry removal.

use crate::error::ClientResult;
use crate::transport::{decode, encode, path_segment};
use crate::OpenmrsClient;
use chrono::{DateTime, Utc};
use reg_core::queue::{
    checked_in_appointments, start_of_day, Appointment, AppointmentStatusChange,
    EndQueueEntryPayload, EndVisitPayload, QueueEntryRef, Visit, CHECKED_IN_STATUS,
};

const APPOINTMENT_STATUS_PATH: &str = "/ws/rest/v1/appointment/appointmentStatus";

impl OpenmrsClient {
    /// The patient's checked-in appointments for the day containing `now`.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` if the request fails or the response cannot be decoded.
    pub async fn checked_in_appointments(
        &self,
        patient_uuid: &str,
        now: DateTime<Utc>,
    ) -> ClientResult<Vec<Appointment>> {
        let value = self
            .transport()
            .get_json(
                APPOINTMENT_STATUS_PATH,
                &[
                    ("forDate", start_of_day(now).to_rfc3339()),
                    ("status", CHECKED_IN_STATUS.to_string()),
                ],
            )
            .await?;
        let appointments: Vec<Appointment> = decode(APPOINTMENT_STATUS_PATH, value)?;
        Ok(checked_in_appointments(&appointments, patient_uuid)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Ends the queue entry, then the visit, then completes each appointment.
    ///
    /// Stops at the first failing request; nothing already sent is rolled back.
    ///
    /// # Errors
    ///
    /// Returns the `ClientError` of the first failing request, or `ClientError::InvalidUrl`
    /// when a uuid is not a single path segment.
    pub async fn end_queue_entry(
        &self,
        entry: &QueueEntryRef,
        visit: Option<&Visit>,
        appointments: &[Appointment],
        now: DateTime<Utc>,
    ) -> ClientResult<()> {
        let entry_path = format!(
            "/ws/rest/v1/queue/{}/entry/{}",
            path_segment("queue uuid", &entry.queue_uuid)?,
            path_segment("queue entry uuid", &entry.queue_entry_uuid)?
        );
        let body = encode(&entry_path, &EndQueueEntryPayload { ended_at: now })?;
        self.transport().post_json(&entry_path, &body).await?;

        let visit_path = format!(
            "/ws/rest/v1/visit/{}",
            path_segment("visit uuid", &entry.visit_uuid)?
        );
        let body = encode(&visit_path, &EndVisitPayload::from_visit(visit, now))?;
        self.transport().post_json(&visit_path, &body).await?;

        for appointment in appointments {
            let path = format!(
                "/ws/rest/v1/appointments/{}/status-change",
                path_segment("appointment uuid", &appointment.uuid)?
            );
            let body = encode(&path, &AppointmentStatusChange::completed(now))?;
            self.transport().post_json(&path, &body).await?;
        }

        tracing::info!(
            queue_entry = %entry.queue_entry_uuid,
            visit = %entry.visit_uuid,
            appointments = appointments.len(),
            "queue entry removed"
        );
        Ok(())
    }
}
