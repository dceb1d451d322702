//! services/api/src/adapters/mailer.rs
//!
//! Feedback "mailer" that hands messages to the log. Delivery is done by an
//! external mail relay reading these records.

use async_trait::async_trait;
use lingo_core::domain::User;
use lingo_core::ports::{FeedbackMailer, PortResult};
use tracing::info;

#[derive(Default)]
pub struct LogFeedbackMailer;

#[async_trait]
impl FeedbackMailer for LogFeedbackMailer {
    async fn send_feedback(
        &self,
        subject: &str,
        context: &str,
        message: &str,
        user: &User,
    ) -> PortResult<()> {
        info!(
            target: "feedback",
            user_id = user.id,
            email = %user.email,
            subject,
            context,
            "{}",
            message
        );
        Ok(())
    }
}
