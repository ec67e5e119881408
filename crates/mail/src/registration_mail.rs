//! Confirms a new registration (plan enrollment) to the student.

use std::sync::Arc;

use chrono::{DateTime, Months, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use gympoint_core::{JobError, JobId, JobResult};
use gympoint_queue::{JobHandler, JobQueue, JobStore};

use crate::format;
use crate::mailer::{MailError, MailMessage, Mailer};
use crate::payload::{Plan, Student};

/// Only the title is read; any other plan fields in the payload are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationMailPayload {
    pub student: Student,
    pub plan: PlanSummary,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(alias = "formatedPrice")]
    pub formatted_price: String,
}

impl RegistrationMailPayload {
    pub fn to_message(&self) -> MailMessage {
        MailMessage {
            to: self.student.mailbox(),
            subject: RegistrationMail::SUBJECT.to_string(),
            template: RegistrationMail::TEMPLATE.to_string(),
            context: json!({
                "student": self.student.name,
                "plan": self.plan.title,
                "start_date": format::date(&self.start_date),
                "end_date": format::date(&self.end_date),
                "price": self.formatted_price,
            }),
        }
    }
}

pub struct RegistrationMail {
    mailer: Arc<dyn Mailer>,
}

impl RegistrationMail {
    pub const KEY: &'static str = "RegistrationMail";
    pub const SUBJECT: &'static str = "Matrícula realizada";
    pub const TEMPLATE: &'static str = "registration";

    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

impl JobHandler for RegistrationMail {
    fn handle(&self, payload: &JsonValue) -> anyhow::Result<()> {
        let payload = RegistrationMailPayload::deserialize(payload)
            .map_err(|e| MailError::invalid_payload(e.to_string()))?;
        self.mailer.send_mail(&payload.to_message())?;
        Ok(())
    }
}

/// Dates and price of a registration, derived from the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationTerms {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub price_cents: u64,
}

impl RegistrationTerms {
    /// The registration starts at the beginning of `start`'s day and runs for
    /// `plan.duration` calendar months.
    pub fn for_plan(plan: &Plan, start: DateTime<Utc>) -> Result<Self, MailError> {
        let start_date = start.date_naive().and_time(NaiveTime::MIN).and_utc();
        let end_date = start_date
            .checked_add_months(Months::new(plan.duration))
            .ok_or_else(|| {
                MailError::invalid_payload(format!(
                    "end date out of range for a {}-month plan",
                    plan.duration
                ))
            })?;

        Ok(Self {
            start_date,
            end_date,
            price_cents: plan.total_price_cents(),
        })
    }

    pub fn formatted_price(&self) -> String {
        format::brl(self.price_cents)
    }
}

/// Compute the registration terms and hand the confirmation mail off to the
/// queue. The terms are returned so the caller can persist them.
pub fn enqueue_registration_mail<S: JobStore>(
    queue: &JobQueue<S>,
    student: &Student,
    plan: &Plan,
    start: DateTime<Utc>,
) -> JobResult<(JobId, RegistrationTerms)> {
    let terms = RegistrationTerms::for_plan(plan, start)
        .map_err(|e| JobError::enqueue_failed(e.to_string()))?;

    let payload = RegistrationMailPayload {
        student: student.clone(),
        plan: PlanSummary {
            title: plan.title.clone(),
        },
        start_date: terms.start_date,
        end_date: terms.end_date,
        formatted_price: terms.formatted_price(),
    };
    let job_id = queue.enqueue(RegistrationMail::KEY, &payload)?;
    Ok((job_id, terms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::InMemoryMailer;
    use chrono::TimeZone;
    use gympoint_queue::InMemoryJobStore;

    #[test]
    fn sends_registration_template() {
        let payload = json!({
            "student": {"id": 3, "name": "Bruno", "email": "bruno@x.com"},
            "plan": {"id": 1, "title": "Gold", "duration": 3, "price": 129.9},
            "start_date": "2024-03-01T00:00:00.000Z",
            "end_date": "2024-06-01T00:00:00.000Z",
            "formatedPrice": "R$ 389,70",
        });

        let mailer = Arc::new(InMemoryMailer::new());
        RegistrationMail::new(mailer.clone()).handle(&payload).unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "Bruno <bruno@x.com>");
        assert_eq!(sent[0].subject, "Matrícula realizada");
        assert_eq!(sent[0].template, "registration");
        assert_eq!(
            sent[0].context,
            json!({
                "student": "Bruno",
                "plan": "Gold",
                "start_date": "01/03/2024",
                "end_date": "01/06/2024",
                "price": "R$ 389,70",
            })
        );
    }

    #[test]
    fn terms_start_at_midnight_and_span_calendar_months() {
        let plan = Plan::new("Diamond", 1, 8_990);
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 18, 45, 0).unwrap();

        let terms = RegistrationTerms::for_plan(&plan, start).unwrap();
        assert_eq!(terms.start_date, Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap());
        assert_eq!(terms.end_date, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
        assert_eq!(terms.formatted_price(), "R$ 89,90");
    }

    #[test]
    fn enqueue_builds_payload_from_plan() {
        let queue = JobQueue::new(InMemoryJobStore::new());
        let plan = Plan::new("Platinum", 12, 10_900);
        let start = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();

        let (job_id, terms) =
            enqueue_registration_mail(&queue, &Student::new("Ana", "ana@x.com"), &plan, start)
                .unwrap();
        assert_eq!(terms.price_cents, 130_800);

        let job = queue.store().get(job_id).unwrap().unwrap();
        assert_eq!(job.job_type, RegistrationMail::KEY);
        assert_eq!(job.payload["formatted_price"], "R$ 1.308,00");
        assert_eq!(job.payload["plan"]["title"], "Platinum");

        let stored: RegistrationMailPayload = serde_json::from_value(job.payload).unwrap();
        assert_eq!(stored.end_date, Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap());
    }
}
