//! Inbound commands from the host.

use serde::{Deserialize, Serialize};

use crate::tracking::config::ConfigUpdate;

/// A command sent to a running engine.
///
/// Wire form is a JSON object tagged by `command`:
///
/// ```text
/// {"command": "updateConfig", "thermal_multiplier": 1.5}
/// {"command": "recoverStream"}
/// {"command": "getStatus"}
/// {"command": "activityUpdate", "activity": "in_vehicle"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum EngineCommand {
    /// Merge the provided fields into the capture configuration.
    UpdateConfig(ConfigUpdate),
    /// Clear the backoff gate and recreate the subscription now.
    RecoverStream,
    /// Emit a `status` snapshot.
    GetStatus,
    /// Motion-context hint copied into later captures.
    ActivityUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        activity: Option<String>,
    },
}

impl EngineCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::UpdateConfig(_) => "updateConfig",
            EngineCommand::RecoverStream => "recoverStream",
            EngineCommand::GetStatus => "getStatus",
            EngineCommand::ActivityUpdate { .. } => "activityUpdate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_update_config() {
        let json = r#"{"command":"updateConfig","stationary_interval_seconds":300,"thermal_multiplier":1.5}"#;
        let cmd: EngineCommand = serde_json::from_str(json).unwrap();

        match cmd {
            EngineCommand::UpdateConfig(update) => {
                assert_eq!(update.stationary_interval_seconds, Some(300));
                assert_eq!(update.thermal_multiplier, Some(1.5));
                assert_eq!(update.active_interval_seconds, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_decode_unit_commands() {
        let cmd: EngineCommand = serde_json::from_str(r#"{"command":"recoverStream"}"#).unwrap();
        assert_eq!(cmd, EngineCommand::RecoverStream);

        let cmd: EngineCommand = serde_json::from_str(r#"{"command":"getStatus"}"#).unwrap();
        assert_eq!(cmd.name(), "getStatus");
    }

    #[test]
    fn test_decode_activity_update_without_activity() {
        let cmd: EngineCommand = serde_json::from_str(r#"{"command":"activityUpdate"}"#).unwrap();
        assert_eq!(cmd, EngineCommand::ActivityUpdate { activity: None });
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(serde_json::from_str::<EngineCommand>(r#"{"command":"selfDestruct"}"#).is_err());
    }
}
