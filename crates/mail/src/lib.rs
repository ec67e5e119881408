//! Transactional mail for the gym: the mail transport boundary and the two
//! background jobs that use it.
//!
//! Request handlers call [`enqueue_answer_mail`] or
//! [`enqueue_registration_mail`] and return immediately; a worker process that
//! has called [`register_mail_jobs`] performs the actual send.

pub mod answer_mail;
pub mod format;
pub mod mailer;
pub mod payload;
pub mod registration_mail;

use std::sync::Arc;

use gympoint_core::JobResult;
use gympoint_queue::JobRegistry;

pub use answer_mail::{AnswerMail, AnswerMailPayload, enqueue_answer_mail};
pub use mailer::{InMemoryMailer, LogMailer, MailError, MailMessage, Mailer};
pub use payload::{Plan, Student};
pub use registration_mail::{
    RegistrationMail, RegistrationMailPayload, RegistrationTerms, enqueue_registration_mail,
};

/// Register every mail job handler, all sharing one transport.
pub fn register_mail_jobs(registry: &mut JobRegistry, mailer: Arc<dyn Mailer>) -> JobResult<()> {
    registry.register(AnswerMail::KEY, AnswerMail::new(mailer.clone()))?;
    registry.register(RegistrationMail::KEY, RegistrationMail::new(mailer))?;
    Ok(())
}
