//! Notifies a student that their help request was answered.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use gympoint_core::{JobId, JobResult};
use gympoint_queue::{JobHandler, JobQueue, JobStore};

use crate::format;
use crate::mailer::{MailError, MailMessage, Mailer};
use crate::payload::Student;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMailPayload {
    pub student: Student,
    pub question: String,
    pub answer: String,
    pub answer_at: DateTime<Utc>,
}

impl AnswerMailPayload {
    pub fn to_message(&self) -> MailMessage {
        MailMessage {
            to: self.student.mailbox(),
            subject: AnswerMail::SUBJECT.to_string(),
            template: AnswerMail::TEMPLATE.to_string(),
            context: json!({
                "student": self.student.name,
                "question": self.question,
                "answer": self.answer,
                "answer_at": format::date_time(&self.answer_at),
            }),
        }
    }
}

pub struct AnswerMail {
    mailer: Arc<dyn Mailer>,
}

impl AnswerMail {
    pub const KEY: &'static str = "AnswerMail";
    pub const SUBJECT: &'static str = "Pedido de auxílio respondido";
    pub const TEMPLATE: &'static str = "answer";

    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

impl JobHandler for AnswerMail {
    fn handle(&self, payload: &JsonValue) -> anyhow::Result<()> {
        let payload = AnswerMailPayload::deserialize(payload)
            .map_err(|e| MailError::invalid_payload(e.to_string()))?;
        self.mailer.send_mail(&payload.to_message())?;
        Ok(())
    }
}

/// Hand the answer notification off to the queue.
pub fn enqueue_answer_mail<S: JobStore>(
    queue: &JobQueue<S>,
    student: &Student,
    question: &str,
    answer: &str,
    answer_at: DateTime<Utc>,
) -> JobResult<JobId> {
    let payload = AnswerMailPayload {
        student: student.clone(),
        question: question.to_string(),
        answer: answer.to_string(),
        answer_at,
    };
    queue.enqueue(AnswerMail::KEY, &payload)
}
