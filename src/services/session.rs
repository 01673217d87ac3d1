// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client session store.
//!
//! Follows the identity provider's principal stream and, for a signed-in
//! principal, a live subscription to that principal's profile record. The
//! merged result is published as a [`SessionState`] on a `watch` channel.
//!
//! A principal without a profile record resolves to an anonymous session,
//! as does any failure to read the profile.

use crate::db::{Database, ProfileEvent, ProfileSubscription};
use crate::models::{CurrentUser, Role};
use crate::services::identity::Principal;
use std::sync::Arc;
use tokio::sync::watch;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Resolved,
}

/// Snapshot of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub current_user: Option<CurrentUser>,
}

impl SessionState {
    pub fn uninitialized() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            current_user: None,
        }
    }

    pub fn loading() -> Self {
        Self {
            phase: SessionPhase::Loading,
            current_user: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            phase: SessionPhase::Resolved,
            current_user: None,
        }
    }

    pub fn authenticated(user: CurrentUser) -> Self {
        Self {
            phase: SessionPhase::Resolved,
            current_user: Some(user),
        }
    }

    /// True until the session has resolved.
    pub fn is_loading(&self) -> bool {
        self.phase != SessionPhase::Resolved
    }

    pub fn is_resolved(&self) -> bool {
        self.phase == SessionPhase::Resolved
    }

    fn has_role(&self, role: Role) -> bool {
        self.is_resolved() && self.current_user.as_ref().is_some_and(|u| u.role == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_student(&self) -> bool {
        self.has_role(Role::Student)
    }
}

/// Process-wide session state, driven by a background task.
///
/// Dropping the store shuts the task down and cancels any open profile
/// subscription.
pub struct SessionStore {
    state: watch::Receiver<SessionState>,
    stop: watch::Sender<bool>,
}

impl SessionStore {
    /// Start following `principals`. Must be called inside a tokio runtime.
    pub fn start(
        principals: watch::Receiver<Option<Principal>>,
        db: Arc<dyn Database>,
    ) -> Self {
        let (state_tx, state) = watch::channel(SessionState::uninitialized());
        let (stop, stop_rx) = watch::channel(false);

        tokio::spawn(SessionDriver::new(db, state_tx).run(principals, stop_rx));

        Self { state, stop }
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Change notifications for the session.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the session has resolved and return that state.
    pub async fn wait_resolved(&self) -> SessionState {
        let mut state = self.state.clone();
        let resolved = match state.wait_for(SessionState::is_resolved).await {
            Ok(resolved) => resolved.clone(),
            // Driver gone; report whatever was last published.
            Err(_) => self.current(),
        };
        resolved
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.state.borrow().current_user.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn is_admin(&self) -> bool {
        self.state.borrow().is_admin()
    }

    pub fn is_student(&self) -> bool {
        self.state.borrow().is_student()
    }

    /// Stop the background task. Later calls are no-ops.
    pub fn shutdown(&self) {
        self.stop.send_replace(true);
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum Step {
    Stop,
    PrincipalChanged(bool),
    Profile(String, Option<ProfileEvent>),
}

struct SessionDriver {
    db: Arc<dyn Database>,
    state: watch::Sender<SessionState>,
    principal: Option<Principal>,
    subscription: Option<ProfileSubscription>,
}

impl SessionDriver {
    fn new(db: Arc<dyn Database>, state: watch::Sender<SessionState>) -> Self {
        Self {
            db,
            state,
            principal: None,
            subscription: None,
        }
    }

    async fn run(
        mut self,
        mut principals: watch::Receiver<Option<Principal>>,
        mut stop: watch::Receiver<bool>,
    ) {
        let initial = principals.borrow_and_update().clone();
        self.switch_principal(initial).await;

        loop {
            if *stop.borrow() {
                break;
            }

            let step = tokio::select! {
                biased;
                _ = stop.changed() => Step::Stop,
                changed = principals.changed() => Step::PrincipalChanged(changed.is_ok()),
                (uid, event) = next_profile_event(&mut self.subscription) => Step::Profile(uid, event),
            };

            match step {
                Step::Stop => break,
                Step::PrincipalChanged(false) => {
                    tracing::debug!("Identity provider closed its principal stream");
                    break;
                }
                Step::PrincipalChanged(true) => {
                    let next = principals.borrow_and_update().clone();
                    if next != self.principal {
                        self.switch_principal(next).await;
                    }
                }
                Step::Profile(uid, event) => self.apply_profile_event(&uid, event),
            }
        }

        self.close_subscription();
        tracing::debug!("Session driver stopped");
    }

    /// Tear down the old principal's listener and start on the new one.
    async fn switch_principal(&mut self, next: Option<Principal>) {
        self.close_subscription();
        self.principal = next;

        let Some(principal) = self.principal.clone() else {
            self.state.send_replace(SessionState::anonymous());
            return;
        };

        self.state.send_replace(SessionState::loading());
        match self.db.watch_user(&principal.uid).await {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => {
                tracing::warn!(uid = %principal.uid, error = %e, "Failed to subscribe to profile");
                self.state.send_replace(SessionState::anonymous());
            }
        }
    }

    fn apply_profile_event(&mut self, uid: &str, event: Option<ProfileEvent>) {
        let Some(principal) = self.principal.as_ref().filter(|p| p.uid == uid) else {
            tracing::debug!(uid, "Ignoring profile event for a previous principal");
            return;
        };

        match event {
            Some(ProfileEvent::Snapshot(Some(profile))) => {
                let user = CurrentUser::from_profile(
                    profile,
                    principal.email.clone(),
                    principal.display_name.clone(),
                );
                self.state.send_replace(SessionState::authenticated(user));
            }
            Some(ProfileEvent::Snapshot(None)) => {
                tracing::info!(uid, "No profile record for signed-in principal");
                self.state.send_replace(SessionState::anonymous());
            }
            Some(ProfileEvent::Error(e)) => {
                tracing::warn!(uid, error = %e, "Profile subscription failed");
                self.close_subscription();
                self.state.send_replace(SessionState::anonymous());
            }
            None => {
                tracing::debug!(uid, "Profile subscription ended");
                self.close_subscription();
                if self.state.borrow().is_loading() {
                    self.state.send_replace(SessionState::anonymous());
                }
            }
        }
    }

    fn close_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}

/// Next event from the open subscription, or never when there is none.
async fn next_profile_event(
    subscription: &mut Option<ProfileSubscription>,
) -> (String, Option<ProfileEvent>) {
    match subscription {
        Some(subscription) => {
            let uid = subscription.uid().to_string();
            (uid, subscription.next().await)
        }
        None => std::future::pending().await,
    }
}
