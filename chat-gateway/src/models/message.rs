use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message. `id` is assigned by the backend and grows
/// monotonically, which is what makes it usable as a polling cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub message: String,
    pub sender: String,
    #[serde(
        default,
        deserialize_with = "super::opt_id_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        if self.group_id.is_some() {
            MessageKind::Group
        } else {
            MessageKind::Direct
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Group,
    Direct,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Group => write!(f, "group"),
            MessageKind::Direct => write!(f, "direct"),
        }
    }
}

/// Insert payload. Exactly one of `group_id` / `receiver` is set.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewMessage {
    pub message: String,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

impl NewMessage {
    pub fn to_group(message: String, sender: String, group_id: String) -> Self {
        Self {
            message,
            sender,
            group_id: Some(group_id),
            receiver: None,
        }
    }

    pub fn to_receiver(message: String, sender: String, receiver: String) -> Self {
        Self {
            message,
            sender,
            group_id: None,
            receiver: Some(receiver),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageFilter {
    /// Every message posted to a group.
    Group {
        group_id: String,
        after_id: Option<i64>,
    },
    /// Both directions of a one-to-one conversation.
    Conversation {
        sender: String,
        receiver: String,
        after_id: Option<i64>,
    },
}

impl MessageFilter {
    pub fn after_id(&self) -> Option<i64> {
        match self {
            MessageFilter::Group { after_id, .. } | MessageFilter::Conversation { after_id, .. } => {
                *after_id
            }
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        if let Some(after) = self.after_id() {
            if message.id <= after {
                return false;
            }
        }

        match self {
            MessageFilter::Group { group_id, .. } => {
                message.group_id.as_deref() == Some(group_id.as_str())
            }
            MessageFilter::Conversation {
                sender, receiver, ..
            } => {
                let forward = message.sender == *sender
                    && message.receiver.as_deref() == Some(receiver.as_str());
                let backward = message.sender == *receiver
                    && message.receiver.as_deref() == Some(sender.as_str());
                forward || backward
            }
        }
    }
}
