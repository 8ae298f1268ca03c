//! Reminder email bodies

use chrono::{DateTime, Utc};

pub const DUE_REMINDER_SUBJECT: &str = "Library Book Due Reminder";
pub const OVERDUE_NOTICE_SUBJECT: &str = "Library Book Overdue Notice";

const FOOTER: &str = r#"<hr style="border: 1px solid #eee; margin: 20px 0;">
    <p style="color: #666; font-size: 12px;">
      This is an automated message. Please do not reply to this email.
    </p>"#;

/// Rendered message ready for the mail transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: &'static str,
    pub html: String,
}

pub fn due_reminder(book_title: &str, due_date: DateTime<Utc>) -> RenderedEmail {
    let html = format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2 style="color: #2196F3;">{subject}</h2>
    <p>Dear Library Member,</p>
    <p>This is a friendly reminder that the following book is due tomorrow:</p>
    <div style="background-color: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;">
      <p><strong>Book Title:</strong> {title}</p>
      <p><strong>Due Date:</strong> {due}</p>
    </div>
    <p>Please return the book on time to avoid any late fees.</p>
    <p>Thank you for your cooperation.</p>
    {footer}
  </body>
</html>
"#,
        subject = DUE_REMINDER_SUBJECT,
        title = escape_html(book_title),
        due = format_date(due_date),
        footer = FOOTER,
    );

    RenderedEmail {
        subject: DUE_REMINDER_SUBJECT,
        html,
    }
}

pub fn overdue_notice(
    book_title: &str,
    due_date: DateTime<Utc>,
    days_overdue: i64,
) -> RenderedEmail {
    let html = format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2 style="color: #F44336;">{subject}</h2>
    <p>Dear Library Member,</p>
    <p>The following book is currently overdue:</p>
    <div style="background-color: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;">
      <p><strong>Book Title:</strong> {title}</p>
      <p><strong>Due Date:</strong> {due}</p>
      <p><strong>Days Overdue:</strong> {days}</p>
    </div>
    <p>Please return the book as soon as possible to avoid accumulating late fees.</p>
    <p>If you have any questions, please contact the library staff.</p>
    {footer}
  </body>
</html>
"#,
        subject = OVERDUE_NOTICE_SUBJECT,
        title = escape_html(book_title),
        due = format_date(due_date),
        days = days_overdue,
        footer = FOOTER,
    );

    RenderedEmail {
        subject: OVERDUE_NOTICE_SUBJECT,
        html,
    }
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_due_reminder_body() {
        let due = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap();
        let email = due_reminder("Dune", due);

        assert_eq!(email.subject, "Library Book Due Reminder");
        assert!(email.html.contains("<strong>Book Title:</strong> Dune"));
        assert!(email.html.contains("2024-03-09 14:30 UTC"));
        assert!(!email.html.contains("Days Overdue"));
    }

    #[test]
    fn test_overdue_notice_body() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let email = overdue_notice("Dune", due, 2);

        assert_eq!(email.subject, "Library Book Overdue Notice");
        assert!(email.html.contains("<strong>Days Overdue:</strong> 2"));
    }

    #[test]
    fn test_titles_are_escaped() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let email = due_reminder("<script>alert('x')</script> & Co", due);

        assert!(!email.html.contains("<script>"));
        assert!(email
            .html
            .contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; Co"));
    }
}
