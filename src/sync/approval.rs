//! Client half of the approval state machine.
//!
//! A newly registered client sits in `Pending` until an advisor approves
//! them. There is no push channel, so the client polls its own user record
//! and crosses into the dashboard on the first poll that reports approval.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{ApprovalState, BankingError, BankingResult, User};
use crate::infrastructure::api_client::BankingApi;
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::identity::SessionContext;
use crate::sync::poller::{PollEvent, Poller};

/// `Pending -> Approved`, observed on a polled user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalTransition {
    pub user: User,
}

/// Fires once, on the first approved record after a pending one.
#[derive(Debug, Clone)]
pub struct ApprovalGate {
    state: ApprovalState,
}

impl ApprovalGate {
    pub fn new(cached: &User) -> Self {
        Self {
            state: cached.approval_state(),
        }
    }

    pub fn state(&self) -> ApprovalState {
        self.state
    }

    /// Pure check: would `polled` complete the transition?
    pub fn observe(&self, polled: &User) -> Option<ApprovalTransition> {
        match (self.state, polled.is_approved) {
            (ApprovalState::Pending, true) => Some(ApprovalTransition {
                user: polled.clone(),
            }),
            _ => None,
        }
    }

    /// Latch the gate once the transition has been persisted.
    pub fn commit(&mut self, _transition: &ApprovalTransition) {
        self.state = ApprovalState::Approved;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalEvent {
    /// One-time success signal. The refreshed user is already in the session.
    Approved(User),
    /// A poll failed; polling continues with the cached identity.
    PollFailed(BankingError),
}

/// Where the client should go after loading its session.
#[derive(Debug)]
pub enum GateDecision {
    Unauthenticated,
    Dashboard(User),
    AwaitApproval(ApprovalHandle),
}

/// Handle on a running approval watch. Dropping it stops polling.
#[derive(Debug)]
pub struct ApprovalHandle {
    events: mpsc::Receiver<ApprovalEvent>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ApprovalHandle {
    /// Next event, or `None` once the watch has ended.
    pub async fn next_event(&mut self) -> Option<ApprovalEvent> {
        self.events.recv().await
    }

    /// Wait for approval, ignoring poll failures.
    pub async fn wait_for_approval(&mut self) -> Option<User> {
        while let Some(event) = self.next_event().await {
            if let ApprovalEvent::Approved(user) = event {
                return Some(user);
            }
        }
        None
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ApprovalHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct ApprovalWatcher {
    api: Arc<dyn BankingApi>,
    poller: Poller,
    token: CancellationToken,
}

impl ApprovalWatcher {
    pub fn new(api: Arc<dyn BankingApi>, config: &SyncConfig, token: CancellationToken) -> Self {
        Self {
            api,
            poller: Poller::new(config),
            token,
        }
    }

    /// Route the cached identity. Only a pending client starts polling.
    pub async fn enter(&self, session: &SessionContext) -> BankingResult<GateDecision> {
        let user = match session.load().await? {
            Some(user) => user,
            None => {
                debug!("No cached identity, routing to login");
                return Ok(GateDecision::Unauthenticated);
            }
        };

        if !user.is_client() || user.is_approved {
            return Ok(GateDecision::Dashboard(user));
        }

        info!(user_id = %user.id, "Awaiting advisor approval");
        Ok(GateDecision::AwaitApproval(self.watch(user, session.clone())))
    }

    fn watch(&self, user: User, session: SessionContext) -> ApprovalHandle {
        let token = self.token.child_token();
        let (sender, events) = mpsc::channel(8);

        let api = self.api.clone();
        let user_id = user.id.clone();
        let fetch = move || {
            let api = api.clone();
            let user_id = user_id.clone();
            async move { api.get_user(&user_id, &user_id).await }
        };
        let (mut polls, _poll_task) = self.poller.spawn("approval", fetch, token.clone());

        let watch_token = token.clone();
        let task = tokio::spawn(async move {
            let mut gate = ApprovalGate::new(&user);
            while let Some(event) = polls.recv().await {
                match event {
                    PollEvent::Fetched(polled) => {
                        let transition = match gate.observe(&polled) {
                            Some(transition) => transition,
                            None => continue,
                        };
                        if let Err(e) = session.store(&transition.user).await {
                            warn!(
                                user_id = %transition.user.id,
                                "Could not persist approved user, will retry: {}", e
                            );
                            continue;
                        }
                        gate.commit(&transition);
                        info!(user_id = %transition.user.id, "Account approved, opening dashboard");
                        let _ = sender.send(ApprovalEvent::Approved(transition.user)).await;
                        break;
                    }
                    PollEvent::Failed { error, .. } => {
                        if sender.send(ApprovalEvent::PollFailed(error)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            watch_token.cancel();
        });

        ApprovalHandle {
            events,
            token,
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;

    fn user(approved: bool) -> User {
        let mut user = User::new("u1", UserRole::Client, "Alice", "alice@example.com");
        user.is_approved = approved;
        user
    }

    #[test]
    fn test_gate_fires_once_for_sequence() {
        let mut gate = ApprovalGate::new(&user(false));
        let mut fired = 0;
        for approved in [false, false, true, true] {
            if let Some(transition) = gate.observe(&user(approved)) {
                gate.commit(&transition);
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(gate.state(), ApprovalState::Approved);
    }

    #[test]
    fn test_gate_never_fires_for_already_approved() {
        let gate = ApprovalGate::new(&user(true));
        assert!(gate.observe(&user(true)).is_none());
    }

    #[test]
    fn test_observe_is_pure() {
        let gate = ApprovalGate::new(&user(false));
        assert!(gate.observe(&user(true)).is_some());
        assert!(gate.observe(&user(true)).is_some());
        assert_eq!(gate.state(), ApprovalState::Pending);
    }
}
