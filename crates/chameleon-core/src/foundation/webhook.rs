//! Models built from inbound webhook callbacks.
//!
//! Webhook bodies arrive as flat mappings (form fields or a JSON object).
//! Models are decoded against the current [`SessionSnapshot`]: user, channel
//! and team IDs are resolved to the snapshot's records, falling back to the
//! identity carried in the payload when the snapshot does not know the ID.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::{DecodeError, DecodeResult};
use super::session::{Channel, SessionSnapshot, Team, User};

/// A decoded webhook body.
pub type Payload = Map<String, Value>;

/// Leading character of slash commands.
pub const COMMAND_PREFIX: char = '/';

/// Normalises a command to exactly one leading [`COMMAND_PREFIX`].
///
/// ```
/// use chameleon_core::normalize_command;
///
/// assert_eq!(normalize_command("weather"), "/weather");
/// assert_eq!(normalize_command("/weather"), "/weather");
/// assert_eq!(normalize_command(" //weather "), "/weather");
/// ```
pub fn normalize_command(command: &str) -> String {
    let trimmed = command.trim().trim_start_matches(COMMAND_PREFIX);
    format!("{COMMAND_PREFIX}{trimmed}")
}

fn required_str(payload: &Payload, field: &'static str) -> DecodeResult<String> {
    match payload.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(DecodeError::invalid(field, format!("expected string, got {other}"))),
        None => Err(DecodeError::MissingField(field)),
    }
}

fn optional_str(payload: &Payload, field: &'static str) -> Option<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn resolve_user(session: &SessionSnapshot, id: String, name: Option<String>) -> User {
    session.user(&id).cloned().unwrap_or_else(|| User {
        name: name.unwrap_or_default(),
        id,
        ..Default::default()
    })
}

fn resolve_channel(session: &SessionSnapshot, id: String, name: Option<String>) -> Channel {
    if let Some(channel) = session.channel(&id) {
        return channel.clone();
    }
    let name = name
        .or_else(|| session.group(&id).map(|g| g.name.clone()))
        .unwrap_or_default();
    Channel {
        id,
        name,
        ..Default::default()
    }
}

fn resolve_team(session: &SessionSnapshot, id: Option<String>, domain: Option<String>) -> Option<Team> {
    let id = id?;
    match &session.team {
        Some(team) if team.id == id => Some(team.clone()),
        _ => Some(Team {
            id,
            name: String::new(),
            domain: domain.unwrap_or_default(),
        }),
    }
}

// =============================================================================
// Slash Commands
// =============================================================================

/// A slash command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SlashCommand {
    /// Verification token sent by the backend.
    pub token: String,
    /// The command, normalised to a single leading `/`.
    pub command: String,
    /// Everything typed after the command.
    pub text: String,
    /// Invoking user.
    pub user: User,
    /// Channel the command was issued in.
    pub channel: Channel,
    /// Team the command was issued in.
    pub team: Option<Team>,
    /// URL for delayed responses.
    pub response_url: Option<String>,
    /// Trigger for opening dialogs.
    pub trigger_id: Option<String>,
}

impl SlashCommand {
    /// Decodes a slash command body.
    pub fn from_payload(payload: &Payload, session: &SessionSnapshot) -> DecodeResult<Self> {
        let token = required_str(payload, "token")?;
        let command = normalize_command(&required_str(payload, "command")?);
        let user_id = required_str(payload, "user_id")?;
        let channel_id = required_str(payload, "channel_id")?;

        Ok(Self {
            token,
            command,
            text: optional_str(payload, "text").unwrap_or_default(),
            user: resolve_user(session, user_id, optional_str(payload, "user_name")),
            channel: resolve_channel(session, channel_id, optional_str(payload, "channel_name")),
            team: resolve_team(
                session,
                optional_str(payload, "team_id"),
                optional_str(payload, "team_domain"),
            ),
            response_url: optional_str(payload, "response_url"),
            trigger_id: optional_str(payload, "trigger_id"),
        })
    }
}

// =============================================================================
// Interactive Buttons
// =============================================================================

/// One pressed button.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ButtonAction {
    /// Button name.
    pub name: String,
    /// Button value.
    #[serde(default)]
    pub value: Option<String>,
    /// Action type, normally `"button"`.
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Deserialize)]
struct RawButtonPayload {
    token: String,
    callback_id: String,
    #[serde(default)]
    actions: Vec<ButtonAction>,
    user: IdRef,
    channel: IdRef,
    #[serde(default)]
    team: Option<IdRef>,
    #[serde(default)]
    action_ts: Option<String>,
    #[serde(default)]
    message_ts: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
    #[serde(default)]
    original_message: Option<Value>,
}

/// A press on an interactive message button.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveButton {
    /// Verification token sent by the backend.
    pub token: String,
    /// Callback ID of the attachment that carried the buttons.
    pub callback_id: String,
    /// The pressed buttons.
    pub actions: Vec<ButtonAction>,
    /// User who pressed.
    pub user: User,
    /// Channel of the message.
    pub channel: Channel,
    /// Team of the message.
    pub team: Option<Team>,
    /// Timestamp of the action.
    pub action_ts: Option<String>,
    /// Timestamp of the message holding the buttons.
    pub message_ts: Option<String>,
    /// URL for delayed responses.
    pub response_url: Option<String>,
    /// The message the buttons were attached to.
    pub original_message: Option<Value>,
}

impl InteractiveButton {
    /// Decodes the (already unwrapped) interactive button payload.
    pub fn from_payload(payload: &Payload, session: &SessionSnapshot) -> DecodeResult<Self> {
        let raw: RawButtonPayload = serde_json::from_value(Value::Object(payload.clone()))
            .map_err(|e| DecodeError::invalid("payload", e.to_string()))?;

        let team = raw
            .team
            .and_then(|t| resolve_team(session, Some(t.id), t.domain));

        Ok(Self {
            token: raw.token,
            callback_id: raw.callback_id,
            actions: raw.actions,
            user: resolve_user(session, raw.user.id, raw.user.name),
            channel: resolve_channel(session, raw.channel.id, raw.channel.name),
            team,
            action_ts: raw.action_ts,
            message_ts: raw.message_ts,
            response_url: raw.response_url,
            original_message: raw.original_message,
        })
    }

    /// Unwraps the serialized `payload` form field.
    ///
    /// Returns `Ok(None)` when the field is absent.
    pub fn embedded_payload(form: &Payload) -> DecodeResult<Option<Payload>> {
        match form.get("payload") {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Ok(Some(map)),
                Ok(other) => Err(DecodeError::invalid(
                    "payload",
                    format!("expected object, got {other}"),
                )),
                Err(e) => Err(DecodeError::invalid("payload", e.to_string())),
            },
            Some(other) => Err(DecodeError::invalid(
                "payload",
                format!("expected string, got {other}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::session::BotUser;
    use serde_json::json;

    fn session() -> SessionSnapshot {
        SessionSnapshot {
            bot: Some(BotUser {
                id: "B1".into(),
                name: "bot".into(),
            }),
            team: Some(Team {
                id: "T1".into(),
                name: "Acme".into(),
                domain: "acme".into(),
            }),
            users: vec![User {
                id: "U1".into(),
                name: "alice".into(),
                real_name: Some("Alice Liddell".into()),
                ..Default::default()
            }],
            channels: vec![Channel {
                id: "C1".into(),
                name: "general".into(),
                is_member: true,
                is_archived: false,
            }],
            ..Default::default()
        }
    }

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_normalize_command() {
        assert_eq!(normalize_command("deploy"), "/deploy");
        assert_eq!(normalize_command("/deploy"), "/deploy");
    }

    #[test]
    fn test_slash_command_resolves_against_session() {
        let body = payload(json!({
            "token": "secret",
            "command": "/weather",
            "text": "london",
            "user_id": "U1",
            "user_name": "ignored",
            "channel_id": "C1",
            "team_id": "T1",
            "response_url": "https://hooks.example/1",
        }));

        let cmd = SlashCommand::from_payload(&body, &session()).unwrap();
        assert_eq!(cmd.command, "/weather");
        assert_eq!(cmd.text, "london");
        assert_eq!(cmd.user.real_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(cmd.channel.name, "general");
        assert_eq!(cmd.team.unwrap().name, "Acme");
        assert!(cmd.trigger_id.is_none());
    }

    #[test]
    fn test_slash_command_falls_back_to_payload_identity() {
        let body = payload(json!({
            "token": "secret",
            "command": "weather",
            "user_id": "U2",
            "user_name": "bob",
            "channel_id": "D9",
            "channel_name": "directmessage",
        }));

        let cmd = SlashCommand::from_payload(&body, &session()).unwrap();
        assert_eq!(cmd.command, "/weather");
        assert_eq!(cmd.user.id, "U2");
        assert_eq!(cmd.user.name, "bob");
        assert_eq!(cmd.channel.name, "directmessage");
        assert!(cmd.team.is_none());
    }

    #[test]
    fn test_slash_command_missing_field() {
        let body = payload(json!({"token": "secret", "user_id": "U1", "channel_id": "C1"}));
        assert_eq!(
            SlashCommand::from_payload(&body, &session()),
            Err(DecodeError::MissingField("command"))
        );
    }

    #[test]
    fn test_interactive_button() {
        let inner = json!({
            "token": "secret",
            "callback_id": "approve",
            "actions": [{"name": "yes", "value": "1", "type": "button"}],
            "user": {"id": "U1", "name": "alice"},
            "channel": {"id": "C1", "name": "general"},
            "team": {"id": "T1", "domain": "acme"},
            "message_ts": "1500000000.000001",
        });
        let form = payload(json!({ "payload": inner.to_string() }));

        let embedded = InteractiveButton::embedded_payload(&form).unwrap().unwrap();
        let button = InteractiveButton::from_payload(&embedded, &session()).unwrap();
        assert_eq!(button.callback_id, "approve");
        assert_eq!(button.actions[0].name, "yes");
        assert_eq!(button.actions[0].kind, "button");
        assert_eq!(button.user.real_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(button.team.unwrap().name, "Acme");
    }

    #[test]
    fn test_embedded_payload_edge_cases() {
        assert_eq!(InteractiveButton::embedded_payload(&Payload::new()), Ok(None));

        let broken = payload(json!({ "payload": "{not json" }));
        assert!(InteractiveButton::embedded_payload(&broken).is_err());

        let list = payload(json!({ "payload": "[1,2]" }));
        assert!(InteractiveButton::embedded_payload(&list).is_err());
    }
}
