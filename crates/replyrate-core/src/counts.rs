//! Outreach channels, outcomes and aggregate counts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outreach medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    LinkedInMessage,
    LinkedInInmail,
}

impl Channel {
    pub const ALL: [Channel; 3] = [
        Channel::Email,
        Channel::LinkedInMessage,
        Channel::LinkedInInmail,
    ];

    /// History entry `type` value for this channel
    pub fn event_type(&self) -> &'static str {
        match self {
            Channel::Email => "EMAIL_SENT",
            Channel::LinkedInMessage => "LINKEDIN_MESSAGE_SENT",
            Channel::LinkedInInmail => "LINKEDIN_INMAIL_SENT",
        }
    }

    /// Prefix of the GraphQL aliases for this channel
    pub fn alias_prefix(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::LinkedInMessage => "linkedin_message",
            Channel::LinkedInInmail => "linkedin_inmail",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Channel::Email => "Emails",
            Channel::LinkedInMessage => "LinkedIn Messages",
            Channel::LinkedInInmail => "LinkedIn InMails",
        }
    }

    pub fn color(&self, outcome: Outcome) -> &'static str {
        match (self, outcome) {
            (Channel::Email, Outcome::Success) => "#040A33",
            (Channel::Email, Outcome::Failure) => "#6275F4",
            (Channel::LinkedInMessage, Outcome::Success) => "#0A66C2",
            (Channel::LinkedInMessage, Outcome::Failure) => "#86BFF9",
            (Channel::LinkedInInmail, Outcome::Success) => "#E6AE2F",
            (Channel::LinkedInInmail, Outcome::Failure) => "#EDC568",
        }
    }

    /// Label of a single (channel, outcome) slice
    pub fn detail_label(&self, outcome: Outcome) -> &'static str {
        match (self, outcome) {
            (Channel::Email, Outcome::Success) => "Successful emails",
            (Channel::Email, Outcome::Failure) => "Failed emails",
            (Channel::LinkedInMessage, Outcome::Success) => "Successful LinkedIn messages",
            (Channel::LinkedInMessage, Outcome::Failure) => "Failed LinkedIn messages",
            (Channel::LinkedInInmail, Outcome::Success) => "Successful LinkedIn InMails",
            (Channel::LinkedInInmail, Outcome::Failure) => "Failed LinkedIn InMails",
        }
    }

    /// GraphQL alias for a (channel, outcome) count, e.g. `email_solicitation_success`
    pub fn alias(&self, outcome: Outcome) -> String {
        format!("{}_solicitation_{}", self.alias_prefix(), outcome.alias_suffix())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether the recipient is known to have replied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub const ALL: [Outcome; 2] = [Outcome::Success, Outcome::Failure];

    /// Value of `triggerHasBeenRepliedTo` matched by this outcome
    pub fn replied(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn alias_suffix(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failed",
        }
    }
}

/// Event counts per (channel, outcome) for one user and date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AggregateCounts {
    pub email_success: u64,
    pub email_failure: u64,
    pub message_success: u64,
    pub message_failure: u64,
    pub inmail_success: u64,
    pub inmail_failure: u64,
}

impl AggregateCounts {
    pub fn get(&self, channel: Channel, outcome: Outcome) -> u64 {
        match (channel, outcome) {
            (Channel::Email, Outcome::Success) => self.email_success,
            (Channel::Email, Outcome::Failure) => self.email_failure,
            (Channel::LinkedInMessage, Outcome::Success) => self.message_success,
            (Channel::LinkedInMessage, Outcome::Failure) => self.message_failure,
            (Channel::LinkedInInmail, Outcome::Success) => self.inmail_success,
            (Channel::LinkedInInmail, Outcome::Failure) => self.inmail_failure,
        }
    }

    pub fn set(&mut self, channel: Channel, outcome: Outcome, count: u64) {
        let slot = match (channel, outcome) {
            (Channel::Email, Outcome::Success) => &mut self.email_success,
            (Channel::Email, Outcome::Failure) => &mut self.email_failure,
            (Channel::LinkedInMessage, Outcome::Success) => &mut self.message_success,
            (Channel::LinkedInMessage, Outcome::Failure) => &mut self.message_failure,
            (Channel::LinkedInInmail, Outcome::Success) => &mut self.inmail_success,
            (Channel::LinkedInInmail, Outcome::Failure) => &mut self.inmail_failure,
        };
        *slot = count;
    }

    /// Success + failure for one channel
    pub fn channel_total(&self, channel: Channel) -> u64 {
        self.get(channel, Outcome::Success) + self.get(channel, Outcome::Failure)
    }

    pub fn email_total(&self) -> u64 {
        self.channel_total(Channel::Email)
    }

    /// Messages and InMails together
    pub fn linkedin_total(&self) -> u64 {
        self.channel_total(Channel::LinkedInMessage) + self.channel_total(Channel::LinkedInInmail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_match_backend_contract() {
        let aliases: Vec<String> = Channel::ALL
            .iter()
            .flat_map(|c| Outcome::ALL.iter().map(move |o| c.alias(*o)))
            .collect();
        assert_eq!(
            aliases,
            vec![
                "email_solicitation_success",
                "email_solicitation_failed",
                "linkedin_message_solicitation_success",
                "linkedin_message_solicitation_failed",
                "linkedin_inmail_solicitation_success",
                "linkedin_inmail_solicitation_failed",
            ]
        );
    }

    #[test]
    fn test_get_set() {
        let mut counts = AggregateCounts::default();
        counts.set(Channel::LinkedInInmail, Outcome::Failure, 8);
        assert_eq!(counts.inmail_failure, 8);
        assert_eq!(counts.get(Channel::LinkedInInmail, Outcome::Failure), 8);
        assert_eq!(counts.get(Channel::LinkedInInmail, Outcome::Success), 0);
    }

    #[test]
    fn test_totals() {
        let counts = AggregateCounts {
            email_success: 7,
            email_failure: 3,
            message_success: 10,
            message_failure: 0,
            inmail_success: 2,
            inmail_failure: 8,
        };
        assert_eq!(counts.email_total(), 10);
        assert_eq!(counts.linkedin_total(), 20);
        assert_eq!(counts.channel_total(Channel::LinkedInMessage), 10);
    }

    #[test]
    fn test_outcome_reply_flag() {
        assert!(Outcome::Success.replied());
        assert!(!Outcome::Failure.replied());
    }
}
