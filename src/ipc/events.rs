//! Wire types of the IPC protocol.
//!
//! Both directions are newline-delimited JSON. A client writes one
//! [`IpcRequest`] per line and reads [`IpcEvent`] lines back.

use serde::{Deserialize, Serialize};

use crate::filter::{Command, FilterStatus, ReactiveEvent};

/// What a client can ask the daemon to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Dispatch a filter command.
    Command { command: Command },
    /// Report a reactive event that happened outside the daemon.
    Notify { event: ReactiveEvent },
    /// Switch to the next configured profile.
    NextProfile,
    /// Change one setting; `value` is parsed by the daemon.
    Set { field: String, value: String },
    /// Keep the connection open and receive every event, starting with the
    /// current state.
    Subscribe,
}

/// Everything the daemon sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum IpcEvent {
    /// The request was accepted.
    Ack,
    /// The request was refused.
    Rejected { message: String },
    /// The filter switched on or off.
    FilterToggled { filter_is_on: bool },
    /// A transition was refused because the overlay may not be drawn.
    PermissionDenied,
    /// Brightness lowering was requested without write access.
    BrightnessDenied,
    /// Full state after any change.
    StateChanged {
        #[serde(flatten)]
        status: FilterStatus,
    },
}

impl IpcEvent {
    pub fn rejected(message: impl Into<String>) -> Self {
        IpcEvent::Rejected {
            message: message.into(),
        }
    }

    pub fn state_changed(status: FilterStatus) -> Self {
        IpcEvent::StateChanged { status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::StateKind;

    fn status() -> FilterStatus {
        FilterStatus {
            state: StateKind::Preview,
            filter_is_on: false,
            return_to: Some(StateKind::Off),
            holds: Some(2),
            profile: "Custom".to_string(),
            color: 3400,
            intensity: 50,
            dim: 30,
        }
    }

    #[test]
    fn test_request_parsing() {
        let request: IpcRequest =
            serde_json::from_str(r#"{"request":"command","command":"show_preview"}"#).unwrap();
        assert_eq!(
            request,
            IpcRequest::Command {
                command: Command::ShowPreview
            }
        );

        let request: IpcRequest =
            serde_json::from_str(r#"{"request":"notify","event":"orientation_changed"}"#).unwrap();
        assert_eq!(
            request,
            IpcRequest::Notify {
                event: ReactiveEvent::OrientationChanged
            }
        );

        let request: IpcRequest =
            serde_json::from_str(r#"{"request":"set","field":"dim","value":"40"}"#).unwrap();
        assert!(matches!(request, IpcRequest::Set { ref field, .. } if field == "dim"));

        assert!(serde_json::from_str::<IpcRequest>(r#"{"request":"explode"}"#).is_err());
        assert!(
            serde_json::from_str::<IpcRequest>(r#"{"request":"command","command":"dance"}"#)
                .is_err()
        );
    }

    #[test]
    fn test_state_changed_serialization() {
        let json = serde_json::to_string(&IpcEvent::state_changed(status())).unwrap();

        assert!(json.contains("\"event_type\":\"state_changed\""));
        assert!(json.contains("\"state\":\"preview\""));
        assert!(json.contains("\"return_to\":\"off\""));
        assert!(json.contains("\"holds\":2"));

        match serde_json::from_str::<IpcEvent>(&json).unwrap() {
            IpcEvent::StateChanged { status: parsed } => assert_eq!(parsed, status()),
            other => panic!("Wrong event type deserialized: {other:?}"),
        }
    }

    #[test]
    fn test_unit_events_serialization() {
        assert_eq!(
            serde_json::to_string(&IpcEvent::PermissionDenied).unwrap(),
            r#"{"event_type":"permission_denied"}"#
        );
        assert_eq!(
            serde_json::to_string(&IpcEvent::FilterToggled { filter_is_on: true }).unwrap(),
            r#"{"event_type":"filter_toggled","filter_is_on":true}"#
        );
        assert_eq!(
            serde_json::to_string(&IpcEvent::rejected("nope")).unwrap(),
            r#"{"event_type":"rejected","message":"nope"}"#
        );
    }
}
