use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ack::Nack;
use super::context::Context;
use super::message::{CancelMessage, OrderMessage, SearchMessage, StatusMessage};

/// The six request actions a seeker can send to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Search,
    Select,
    Init,
    Confirm,
    Status,
    Cancel,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Search,
        ActionKind::Select,
        ActionKind::Init,
        ActionKind::Confirm,
        ActionKind::Status,
        ActionKind::Cancel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Search => "search",
            ActionKind::Select => "select",
            ActionKind::Init => "init",
            ActionKind::Confirm => "confirm",
            ActionKind::Status => "status",
            ActionKind::Cancel => "cancel",
        }
    }

    /// Name of the paired callback, e.g. `on_search`.
    pub fn callback(self) -> &'static str {
        match self {
            ActionKind::Search => "on_search",
            ActionKind::Select => "on_select",
            ActionKind::Init => "on_init",
            ActionKind::Confirm => "on_confirm",
            ActionKind::Status => "on_status",
            ActionKind::Cancel => "on_cancel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn from_callback(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.callback() == name.trim_start_matches('/'))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context plus an action-specific message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request<M> {
    pub context: Context,
    #[serde(default)]
    pub message: M,
}

/// A decoded inbound action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "request", rename_all = "snake_case")]
pub enum Action {
    Search(Request<SearchMessage>),
    Select(Request<OrderMessage>),
    Init(Request<OrderMessage>),
    Confirm(Request<OrderMessage>),
    Status(Request<StatusMessage>),
    Cancel(Request<CancelMessage>),
}

impl Action {
    /// Decode `body` as the action served by the endpoint `kind`.
    ///
    /// Fails with a `10000` NACK when the body is not valid JSON, does not fit the
    /// action's schema, or names a different action in its context.
    pub fn decode(kind: ActionKind, body: &[u8]) -> Result<Self, Nack> {
        let action = match kind {
            ActionKind::Search => Action::Search(parse(kind, body)?),
            ActionKind::Select => Action::Select(parse(kind, body)?),
            ActionKind::Init => Action::Init(parse(kind, body)?),
            ActionKind::Confirm => Action::Confirm(parse(kind, body)?),
            ActionKind::Status => Action::Status(parse(kind, body)?),
            ActionKind::Cancel => Action::Cancel(parse(kind, body)?),
        };

        let declared = action.context().action.as_str();
        if !declared.is_empty() && declared != kind.as_str() {
            return Err(Nack::parse(format!(
                "context.action '{declared}' does not match the {kind} endpoint"
            )));
        }

        Ok(action)
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Search(_) => ActionKind::Search,
            Action::Select(_) => ActionKind::Select,
            Action::Init(_) => ActionKind::Init,
            Action::Confirm(_) => ActionKind::Confirm,
            Action::Status(_) => ActionKind::Status,
            Action::Cancel(_) => ActionKind::Cancel,
        }
    }

    pub fn context(&self) -> &Context {
        match self {
            Action::Search(request) => &request.context,
            Action::Select(request) | Action::Init(request) | Action::Confirm(request) => {
                &request.context
            }
            Action::Status(request) => &request.context,
            Action::Cancel(request) => &request.context,
        }
    }
}

fn parse<M>(kind: ActionKind, body: &[u8]) -> Result<Request<M>, Nack>
where
    M: DeserializeOwned + Default,
{
    serde_json::from_slice(body)
        .map_err(|err| Nack::parse(format!("invalid {kind} request: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ack::NackCode;
    use serde_json::json;

    #[test]
    fn decodes_each_kind_into_its_variant() {
        let body = json!({
            "context": {"action": "init", "transaction_id": "T1", "bap_uri": "http://bap"},
            "message": {"order": {"items": [{"id": "J1"}], "fulfillments": [{"id": "F1"}]}}
        });
        let action = Action::decode(ActionKind::Init, body.to_string().as_bytes())
            .expect("init decodes");
        let Action::Init(request) = &action else {
            panic!("expected init, got {action:?}");
        };
        assert_eq!(request.message.order.items[0].id, "J1");
        assert_eq!(action.kind(), ActionKind::Init);
        assert_eq!(action.context().transaction_id, "T1");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let nack = Action::decode(ActionKind::Select, b"{not json").expect_err("rejects");
        assert_eq!(nack.code, NackCode::ParseError);
    }

    #[test]
    fn mismatched_context_action_is_rejected() {
        let body = json!({"context": {"action": "cancel"}, "message": {}});
        let nack = Action::decode(ActionKind::Status, body.to_string().as_bytes())
            .expect_err("rejects");
        assert_eq!(nack.code, NackCode::ParseError);
        assert!(nack.message.contains("status"));
    }

    #[test]
    fn missing_message_defaults_to_empty_payload() {
        let body = json!({"context": {"action": "search", "bap_uri": "http://bap"}});
        let action = Action::decode(ActionKind::Search, body.to_string().as_bytes())
            .expect("search decodes");
        assert!(matches!(
            action,
            Action::Search(ref request) if request.message.intent.item.is_none()
        ));
    }

    #[test]
    fn callback_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_callback(kind.callback()), Some(kind));
        }
        assert_eq!(ActionKind::from_callback("/on_status"), Some(ActionKind::Status));
        assert_eq!(ActionKind::from_callback("status"), None);
    }
}
