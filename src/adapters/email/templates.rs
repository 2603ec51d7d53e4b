//! Subject and body text for each notification template.
//!
//! Templates read their values from the notification's JSON data. A missing
//! value renders as an empty string rather than failing the delivery.

use serde_json::Value;

use crate::ports::{Notification, NotificationError};

/// A composed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
}

fn field<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Composes the email for a notification.
///
/// Unknown templates are rejected: redelivering them would never succeed.
pub fn compose(notification: &Notification) -> Result<EmailContent, NotificationError> {
    let d = &notification.data;
    let greeting = format!("Hello {},\n\n", field(d, "learner_name"));
    let course = format!(
        "{} ({}), {} to {}",
        field(d, "course_title"),
        field(d, "location"),
        field(d, "starts_at"),
        field(d, "ends_at")
    );

    let content = match notification.template.as_str() {
        "quote_issued" => EmailContent {
            subject: format!(
                "Quote {} for {}",
                field(d, "quote_number"),
                field(d, "course_title")
            ),
            text: format!(
                "{}Your seat on {} is held pending payment.\n\n\
                 Please transfer {} {} quoting reference {}.\n\
                 The quote with our bank details is attached.\n",
                greeting,
                course,
                field(d, "amount_ttc"),
                field(d, "currency"),
                field(d, "quote_number")
            ),
        },
        "payment_confirmed" => EmailContent {
            subject: format!("Registration confirmed: {}", field(d, "course_title")),
            text: format!(
                "{}We received your payment of {} {}. Your registration for {} is confirmed.\n\n\
                 Your receipt is attached.\n",
                greeting,
                field(d, "amount_ttc"),
                field(d, "currency"),
                course
            ),
        },
        "registration_cancelled" => EmailContent {
            subject: format!("Registration cancelled: {}", field(d, "course_title")),
            text: format!(
                "{}Your registration for {} has been cancelled.\n\nReason: {}\n",
                greeting,
                course,
                field(d, "cancellation_reason")
            ),
        },
        other => {
            return Err(NotificationError::rejected(format!(
                "Unknown template: {}",
                other
            )))
        }
    };

    Ok(content)
}
