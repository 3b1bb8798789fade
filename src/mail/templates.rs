use askama::Template;

use super::{MailError, OutgoingMail};

#[derive(Template)]
#[template(path = "email/verification.txt")]
pub struct VerificationEmail<'a> {
    pub name: &'a str,
    pub link: &'a str,
    pub expiry_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/group_invitation.txt")]
pub struct GroupInvitationEmail<'a> {
    pub inviter: &'a str,
    pub group_title: &'a str,
    pub link: &'a str,
    pub expiry_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/pokerboard_invitation.txt")]
pub struct PokerboardInvitationEmail<'a> {
    pub inviter: &'a str,
    pub pokerboard_title: &'a str,
    pub role: &'a str,
    pub link: &'a str,
    pub expiry_minutes: i64,
}

fn render(template: &impl Template, subject: &str, recipient: &str) -> Result<OutgoingMail, MailError> {
    let body = template
        .render()
        .map_err(|e| MailError::Other(format!("Failed to render email: {e}")))?;
    Ok(OutgoingMail {
        subject: subject.to_string(),
        recipient: recipient.to_string(),
        body,
    })
}

impl VerificationEmail<'_> {
    pub fn to_mail(&self, recipient: &str) -> Result<OutgoingMail, MailError> {
        render(self, "Verify your email address", recipient)
    }
}

impl GroupInvitationEmail<'_> {
    pub fn to_mail(&self, recipient: &str) -> Result<OutgoingMail, MailError> {
        render(self, "You have been invited to a group", recipient)
    }
}

impl PokerboardInvitationEmail<'_> {
    pub fn to_mail(&self, recipient: &str) -> Result<OutgoingMail, MailError> {
        render(self, "You have been invited to a pokerboard", recipient)
    }
}
