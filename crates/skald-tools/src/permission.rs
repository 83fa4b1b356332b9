//! The role-to-tool permission table.

use skald_core::{Caller, EngineError, EngineResult, Role, ToolName};

/// Whether a role may call a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The call proceeds.
    Allow,
    /// The call is refused before it reaches the store.
    Deny,
}

/// Look up the table. Narrators may call everything; participants may roll
/// dice and read state.
pub fn access(tool: ToolName, role: Role) -> Access {
    match role {
        Role::Narrator => Access::Allow,
        Role::Participant => match tool {
            ToolName::Roll
            | ToolName::ValidateNotation
            | ToolName::BatchRoll
            | ToolName::GetState
            | ToolName::GetTurnContext
            | ToolName::GetRecentEvents => Access::Allow,
            _ => Access::Deny,
        },
    }
}

/// The tools `role` may call, in declaration order.
pub fn allowed_tools(role: Role) -> Vec<ToolName> {
    ToolName::ALL
        .iter()
        .copied()
        .filter(|&tool| access(tool, role) == Access::Allow)
        .collect()
}

/// Refuse the call unless the caller's role allows `tool`.
pub fn check(tool: ToolName, caller: &Caller) -> EngineResult<()> {
    match access(tool, caller.role) {
        Access::Allow => Ok(()),
        Access::Deny => {
            tracing::warn!(tool = %tool, caller = %caller.name, role = %caller.role, "permission denied");
            Err(EngineError::Permission {
                tool,
                role: caller.role,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrator_may_call_everything() {
        assert_eq!(allowed_tools(Role::Narrator).len(), ToolName::ALL.len());
    }

    #[test]
    fn participants_roll_and_read_only() {
        let allowed = allowed_tools(Role::Participant);
        assert_eq!(
            allowed,
            vec![
                ToolName::Roll,
                ToolName::ValidateNotation,
                ToolName::BatchRoll,
                ToolName::GetState,
                ToolName::GetTurnContext,
                ToolName::GetRecentEvents,
            ]
        );
        for tool in ToolName::ALL.iter().filter(|t| t.is_write()) {
            assert_eq!(access(*tool, Role::Participant), Access::Deny, "{tool}");
        }
    }

    #[test]
    fn denial_is_a_permission_error() {
        let err = check(ToolName::ApplyDamage, &Caller::participant("Thorin")).unwrap_err();
        assert_eq!(err.code(), "permission_error");
        assert!(!err.is_retryable());
        assert!(check(ToolName::ApplyDamage, &Caller::narrator("DungeonMaster")).is_ok());
    }
}
