//! Finite state machine for two-phase credential rotations.
//!
//! Each rotated credential moves through
//! `(unset) -> Preparing -> Prepared -> Completing -> Completed -> Preparing ...`.
//! Users trigger the start and complete steps through operation annotations;
//! the intermediate steps are reported by the reconciler through the status.

use std::fmt;

use crate::crd::CredentialsRotationPhase::{Completed, Completing, Prepared, Preparing};
use crate::crd::{
    CredentialRotation, CredentialsRotationPhase, LastOperation, LastOperationState,
    LastOperationType, ShootStatus,
};

/// A credential with its own rotation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Credential {
    CertificateAuthorities,
    ServiceAccountKey,
    EtcdEncryptionKey,
}

impl Credential {
    pub const ALL: [Credential; 3] = [
        Credential::CertificateAuthorities,
        Credential::ServiceAccountKey,
        Credential::EtcdEncryptionKey,
    ];

    /// Field name below `.status.credentials.rotation`.
    pub fn status_field(&self) -> &'static str {
        match self {
            Credential::CertificateAuthorities => "certificateAuthorities",
            Credential::ServiceAccountKey => "serviceAccountKey",
            Credential::EtcdEncryptionKey => "etcdEncryptionKey",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Credential::CertificateAuthorities => "CA rotation",
            Credential::ServiceAccountKey => "service account key rotation",
            Credential::EtcdEncryptionKey => "ETCD encryption key rotation",
        }
    }

    /// Current phase as observed in `status`, `None` if never rotated.
    pub fn phase(&self, status: Option<&ShootStatus>) -> Option<CredentialsRotationPhase> {
        let rotation = status.and_then(ShootStatus::rotation)?;
        let state: Option<&CredentialRotation> = match self {
            Credential::CertificateAuthorities => rotation.certificate_authorities.as_ref(),
            Credential::ServiceAccountKey => rotation.service_account_key.as_ref(),
            Credential::EtcdEncryptionKey => rotation.etcd_encryption_key.as_ref(),
        };
        state.and_then(|s| s.phase)
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_field())
    }
}

/// Events that move a credential rotation forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RotationEvent {
    /// A `rotate-*-start` operation was requested.
    StartRequested,
    /// New credentials were distributed next to the old ones.
    PreparationDone,
    /// A `rotate-*-complete` operation was requested.
    CompleteRequested,
    /// Old credentials were revoked.
    CompletionDone,
}

impl fmt::Display for RotationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationEvent::StartRequested => write!(f, "StartRequested"),
            RotationEvent::PreparationDone => write!(f, "PreparationDone"),
            RotationEvent::CompleteRequested => write!(f, "CompleteRequested"),
            RotationEvent::CompletionDone => write!(f, "CompletionDone"),
        }
    }
}

/// State of one credential; `None` means no rotation has happened yet.
pub type RotationState = Option<CredentialsRotationPhase>;

/// Context available to transition guards.
#[derive(Clone, Copy, Debug, Default)]
pub struct RotationContext<'a> {
    pub last_operation: Option<&'a LastOperation>,
}

impl<'a> RotationContext<'a> {
    pub fn from_status(status: Option<&'a ShootStatus>) -> Self {
        Self {
            last_operation: status.and_then(|s| s.last_operation.as_ref()),
        }
    }

    /// A rotation may start once the shoot was created or restored
    /// successfully, or whenever it is being reconciled.
    pub fn ready_for_rotation_start(&self) -> bool {
        let Some(op) = self.last_operation else {
            return false;
        };
        match op.r#type {
            LastOperationType::Create | LastOperationType::Restore => {
                op.state == LastOperationState::Succeeded
            }
            LastOperationType::Reconcile => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct Transition {
    pub from: RotationState,
    pub to: CredentialsRotationPhase,
    pub event: RotationEvent,
    pub description: &'static str,
}

impl Transition {
    const fn new(
        from: RotationState,
        to: CredentialsRotationPhase,
        event: RotationEvent,
        description: &'static str,
    ) -> Self {
        Self {
            from,
            to,
            event,
            description,
        }
    }
}

const TRANSITIONS: &[Transition] = &[
    Transition::new(None, Preparing, RotationEvent::StartRequested, "First rotation started"),
    Transition::new(Some(Completed), Preparing, RotationEvent::StartRequested, "Rotation started again"),
    Transition::new(Some(Preparing), Prepared, RotationEvent::PreparationDone, "New credentials distributed"),
    Transition::new(Some(Prepared), Completing, RotationEvent::CompleteRequested, "Revoking old credentials"),
    Transition::new(Some(Completing), Completed, RotationEvent::CompletionDone, "Old credentials revoked"),
];

/// Why a requested transition was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The last operation does not allow starting a rotation.
    NotReady,
    /// No transition for `event` leaves `current`.
    InvalidPhase {
        current: RotationState,
        required: CredentialsRotationPhase,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum TransitionResult {
    Success {
        from: RotationState,
        to: CredentialsRotationPhase,
        description: &'static str,
    },
    Rejected(Vec<Rejection>),
}

pub struct RotationStateMachine {
    transitions: &'static [Transition],
}

impl Default for RotationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationStateMachine {
    pub const fn new() -> Self {
        Self {
            transitions: TRANSITIONS,
        }
    }

    fn find(&self, current: RotationState, event: RotationEvent) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.from == current && t.event == event)
    }

    pub fn can_transition(&self, current: RotationState, event: RotationEvent) -> bool {
        self.find(current, event).is_some()
    }

    pub fn valid_events(&self, current: RotationState) -> Vec<RotationEvent> {
        self.transitions
            .iter()
            .filter(|t| t.from == current)
            .map(|t| t.event)
            .collect()
    }

    /// Phase that must be observed before `event` may fire, when the table
    /// names exactly one. Start accepts both `Completed` and unset.
    fn required_phase(&self, event: RotationEvent) -> Option<CredentialsRotationPhase> {
        self.transitions
            .iter()
            .filter(|t| t.event == event)
            .find_map(|t| t.from)
    }

    /// Applies the guard and the phase check together, collecting every
    /// reason for a rejection.
    pub fn transition(
        &self,
        current: RotationState,
        event: RotationEvent,
        ctx: &RotationContext<'_>,
    ) -> TransitionResult {
        let mut rejections = Vec::new();
        if event == RotationEvent::StartRequested && !ctx.ready_for_rotation_start() {
            rejections.push(Rejection::NotReady);
        }

        match self.find(current, event) {
            Some(t) if rejections.is_empty() => TransitionResult::Success {
                from: t.from,
                to: t.to,
                description: t.description,
            },
            Some(_) => TransitionResult::Rejected(rejections),
            None => {
                if let Some(required) = self.required_phase(event) {
                    rejections.push(Rejection::InvalidPhase { current, required });
                }
                TransitionResult::Rejected(rejections)
            }
        }
    }
}

pub static ROTATION: RotationStateMachine = RotationStateMachine::new();

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::crd::{ShootCredentials, ShootCredentialsRotation};

    fn last_operation(r#type: LastOperationType, state: LastOperationState) -> LastOperation {
        LastOperation {
            r#type,
            state,
            description: String::new(),
            progress: 100,
            last_update_time: None,
        }
    }

    #[test]
    fn test_full_cycle() {
        let op = last_operation(LastOperationType::Reconcile, LastOperationState::Processing);
        let ctx = RotationContext {
            last_operation: Some(&op),
        };
        let mut state: RotationState = None;
        for event in [
            RotationEvent::StartRequested,
            RotationEvent::PreparationDone,
            RotationEvent::CompleteRequested,
            RotationEvent::CompletionDone,
            RotationEvent::StartRequested,
        ] {
            match ROTATION.transition(state, event, &ctx) {
                TransitionResult::Success { to, .. } => state = Some(to),
                other => panic!("unexpected {:?} for {}", other, event),
            }
        }
        assert_eq!(state, Some(Preparing));
    }

    #[test]
    fn test_start_requires_ready_shoot() {
        let op = last_operation(LastOperationType::Create, LastOperationState::Processing);
        let ctx = RotationContext {
            last_operation: Some(&op),
        };
        assert_eq!(
            ROTATION.transition(None, RotationEvent::StartRequested, &ctx),
            TransitionResult::Rejected(vec![Rejection::NotReady])
        );

        let op = last_operation(LastOperationType::Restore, LastOperationState::Succeeded);
        let ctx = RotationContext {
            last_operation: Some(&op),
        };
        assert!(matches!(
            ROTATION.transition(Some(Completed), RotationEvent::StartRequested, &ctx),
            TransitionResult::Success { .. }
        ));

        assert!(!RotationContext::default().ready_for_rotation_start());
    }

    #[test]
    fn test_rejections_accumulate() {
        let ctx = RotationContext::default();
        assert_eq!(
            ROTATION.transition(Some(Prepared), RotationEvent::StartRequested, &ctx),
            TransitionResult::Rejected(vec![
                Rejection::NotReady,
                Rejection::InvalidPhase {
                    current: Some(Prepared),
                    required: Completed,
                },
            ])
        );
    }

    #[test]
    fn test_complete_requires_prepared() {
        let ctx = RotationContext::default();
        for current in [None, Some(Preparing), Some(Completing), Some(Completed)] {
            assert_eq!(
                ROTATION.transition(current, RotationEvent::CompleteRequested, &ctx),
                TransitionResult::Rejected(vec![Rejection::InvalidPhase {
                    current,
                    required: Prepared,
                }])
            );
        }
        assert!(ROTATION.can_transition(Some(Prepared), RotationEvent::CompleteRequested));
    }

    #[test]
    fn test_valid_events() {
        assert_eq!(ROTATION.valid_events(None), vec![RotationEvent::StartRequested]);
        assert_eq!(ROTATION.valid_events(Some(Preparing)), vec![RotationEvent::PreparationDone]);
    }

    #[test]
    fn test_phase_from_status() {
        let status = ShootStatus {
            credentials: Some(ShootCredentials {
                rotation: Some(ShootCredentialsRotation {
                    service_account_key: Some(CredentialRotation {
                        phase: Some(Prepared),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };
        assert_eq!(Credential::ServiceAccountKey.phase(Some(&status)), Some(Prepared));
        assert_eq!(Credential::CertificateAuthorities.phase(Some(&status)), None);
        assert_eq!(Credential::EtcdEncryptionKey.phase(None), None);
    }
}
