//! Actors, roles, and the operation permission table.

use serde::{Deserialize, Serialize};

/// What kind of identity an actor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ActorType {
    /// A person at a keyboard.
    Human,
    /// This system itself. System actors may never authorize
    /// externally-visible effects.
    System,
    /// An external platform or service.
    External,
}

/// The roles recognized by the permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum Role {
    /// Runs executions, transmissions, and exports.
    Operator,
    /// Read-only chain verification.
    Auditor,
    /// Seals phases and decommissions.
    Administrator,
    /// Approves drafts and verifies.
    Reviewer,
}

impl Role {
    /// Returns the persisted name of this role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Operator => "OPERATOR",
            Self::Auditor => "AUDITOR",
            Self::Administrator => "ADMINISTRATOR",
            Self::Reviewer => "REVIEWER",
        }
    }

    /// Closed permission table: which operations this role may perform.
    ///
    /// Operators cannot approve; auditors cannot execute; only
    /// administrators seal or decommission. Anything not listed here is
    /// denied.
    #[must_use]
    pub const fn permits(&self, operation: Operation) -> bool {
        matches!(
            (self, operation),
            (
                Self::Operator,
                Operation::Execute | Operation::Transmit | Operation::Export | Operation::VerifyChain
            ) | (Self::Reviewer, Operation::Approve | Operation::VerifyChain)
                | (Self::Auditor, Operation::VerifyChain)
                | (
                    Self::Administrator,
                    Operation::Seal | Operation::Decommission | Operation::VerifyChain
                )
        )
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The governed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Operation {
    /// Execute a browser action.
    Execute,
    /// Transmit a report to a platform.
    Transmit,
    /// Export evidence.
    Export,
    /// Approve a draft.
    Approve,
    /// Seal a phase.
    Seal,
    /// Decommission the system.
    Decommission,
    /// Verify an audit or manifest chain.
    VerifyChain,
}

impl Operation {
    /// Returns the operation name used in audit records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Transmit => "transmit",
            Self::Export => "export",
            Self::Approve => "approve",
            Self::Seal => "seal",
            Self::Decommission => "decommission",
            Self::VerifyChain => "verify_chain",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable acting identity, created at session start from
/// validated credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    actor_id: String,
    display_name: String,
    actor_type: ActorType,
    role: Role,
}

impl Actor {
    /// Creates an actor record.
    #[must_use]
    pub fn new(actor_id: &str, display_name: &str, actor_type: ActorType, role: Role) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            display_name: display_name.to_string(),
            actor_type,
            role,
        }
    }

    /// The stable identity string.
    #[must_use]
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// The human-readable name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The identity kind.
    #[must_use]
    pub const fn actor_type(&self) -> ActorType {
        self.actor_type
    }

    /// The actor's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// True when this actor can author a human authorization: a HUMAN
    /// actor, regardless of role. SYSTEM and EXTERNAL identities can
    /// never mint confirmations.
    #[must_use]
    pub const fn can_authorize(&self) -> bool {
        matches!(self.actor_type, ActorType::Human)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_permissions() {
        assert!(Role::Operator.permits(Operation::Execute));
        assert!(Role::Operator.permits(Operation::Transmit));
        assert!(Role::Operator.permits(Operation::Export));
        assert!(!Role::Operator.permits(Operation::Approve));
        assert!(!Role::Operator.permits(Operation::Seal));
        assert!(!Role::Operator.permits(Operation::Decommission));
    }

    #[test]
    fn auditor_is_read_only() {
        assert!(Role::Auditor.permits(Operation::VerifyChain));
        assert!(!Role::Auditor.permits(Operation::Execute));
        assert!(!Role::Auditor.permits(Operation::Transmit));
        assert!(!Role::Auditor.permits(Operation::Export));
    }

    #[test]
    fn only_administrator_seals_and_decommissions() {
        for role in [Role::Operator, Role::Auditor, Role::Reviewer] {
            assert!(!role.permits(Operation::Seal));
            assert!(!role.permits(Operation::Decommission));
        }
        assert!(Role::Administrator.permits(Operation::Seal));
        assert!(Role::Administrator.permits(Operation::Decommission));
    }

    #[test]
    fn system_actors_cannot_authorize() {
        let system = Actor::new("sys-1", "Scheduler", ActorType::System, Role::Operator);
        let external = Actor::new("ext-1", "Platform", ActorType::External, Role::Reviewer);
        let human = Actor::new("op-1", "Operator One", ActorType::Human, Role::Operator);
        assert!(!system.can_authorize());
        assert!(!external.can_authorize());
        assert!(human.can_authorize());
    }
}
