//! Team data delivered by the session bootstrap.
//!
//! A [`SessionSnapshot`] is produced once per successful bootstrap and then
//! shared read-only (`Arc<SessionSnapshot>`). A reconnect replaces it as a
//! whole; nothing mutates a published snapshot.

use serde::{Deserialize, Serialize};

/// The bot's own user identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotUser {
    /// User ID of the bot.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// The team the bot is connected to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team ID.
    pub id: String,
    /// Team name.
    #[serde(default)]
    pub name: String,
    /// Team domain.
    #[serde(default)]
    pub domain: String,
}

/// A member of the team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: String,
    /// Handle.
    #[serde(default)]
    pub name: String,
    /// Full name, when the profile carries one.
    #[serde(default)]
    pub real_name: Option<String>,
    /// Whether the user is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// Whether the account has been deactivated.
    #[serde(default)]
    pub deleted: bool,
}

/// A public channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel ID.
    pub id: String,
    /// Channel name (without `#`).
    #[serde(default)]
    pub name: String,
    /// Whether the bot is a member.
    #[serde(default)]
    pub is_member: bool,
    /// Whether the channel is archived.
    #[serde(default)]
    pub is_archived: bool,
}

/// A private channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group ID.
    pub id: String,
    /// Group name.
    #[serde(default)]
    pub name: String,
    /// Member user IDs.
    #[serde(default)]
    pub members: Vec<String>,
}

/// A direct message conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Im {
    /// Conversation ID.
    pub id: String,
    /// The user on the other side.
    pub user: String,
}

/// Everything the bootstrap call reports about the team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// The bot's identity. `None` until the first bootstrap completes.
    #[serde(default)]
    pub bot: Option<BotUser>,
    /// The connected team.
    #[serde(default)]
    pub team: Option<Team>,
    /// Team members.
    #[serde(default)]
    pub users: Vec<User>,
    /// Public channels.
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Private channels.
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Direct message conversations.
    #[serde(default)]
    pub ims: Vec<Im>,
}

impl SessionSnapshot {
    /// Returns the empty snapshot used before any bootstrap.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if no bootstrap has populated this snapshot.
    pub fn is_empty(&self) -> bool {
        self.bot.is_none()
            && self.team.is_none()
            && self.users.is_empty()
            && self.channels.is_empty()
            && self.groups.is_empty()
            && self.ims.is_empty()
    }

    /// Looks up a user by ID.
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Looks up a public channel by ID.
    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Looks up a private channel by ID.
    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Looks up a direct message conversation by ID.
    pub fn im(&self, id: &str) -> Option<&Im> {
        self.ims.iter().find(|im| im.id == id)
    }

    /// Finds the direct message conversation with a user.
    pub fn im_for_user(&self, user_id: &str) -> Option<&Im> {
        self.ims.iter().find(|im| im.user == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            bot: Some(BotUser {
                id: "B1".into(),
                name: "chameleon".into(),
            }),
            team: Some(Team {
                id: "T1".into(),
                name: "Acme".into(),
                domain: "acme".into(),
            }),
            users: vec![User {
                id: "U1".into(),
                name: "alice".into(),
                ..Default::default()
            }],
            channels: vec![Channel {
                id: "C1".into(),
                name: "general".into(),
                is_member: true,
                is_archived: false,
            }],
            groups: vec![],
            ims: vec![Im {
                id: "D1".into(),
                user: "U1".into(),
            }],
        }
    }

    #[test]
    fn test_lookups() {
        let snapshot = snapshot();
        assert_eq!(snapshot.user("U1").map(|u| u.name.as_str()), Some("alice"));
        assert_eq!(snapshot.channel("C1").map(|c| c.name.as_str()), Some("general"));
        assert!(snapshot.group("G1").is_none());
        assert_eq!(snapshot.im_for_user("U1").map(|im| im.id.as_str()), Some("D1"));
        assert!(snapshot.im("D2").is_none());
    }

    #[test]
    fn test_empty() {
        assert!(SessionSnapshot::empty().is_empty());
        assert!(!snapshot().is_empty());
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{"users":[{"id":"U9"}],"team":{"id":"T9"}}"#;
        let snapshot: SessionSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.users[0].id, "U9");
        assert!(!snapshot.users[0].is_bot);
        assert_eq!(snapshot.team.unwrap().id, "T9");
        assert!(snapshot.bot.is_none());
    }
}
