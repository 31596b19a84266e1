// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use futures_util::lock::Mutex;
use log::{debug, info, warn};
use secrecy::SecretString;
use tokio::sync::watch;

use crate::{
    error::{Error, ErrorClass, Result},
    gateway::{
        auth,
        model::{Registration, User},
        Gateway,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Session {
    Unauthenticated,
    Authenticated(User),
}

impl Session {
    pub(crate) const fn is_authenticated(&self) -> bool {
        matches!(*self, Self::Authenticated(_))
    }

    pub(crate) const fn user(&self) -> Option<&User> {
        match *self {
            Self::Authenticated(ref user) => Some(user),
            Self::Unauthenticated => None,
        }
    }
}

/// How a startup check resolved. Both `NoCredential` and `Rejected` leave the
/// session unauthenticated, but only a rejection means a previously valid
/// session was lost.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum AuthCheck {
    NoCredential,
    Restored,
    Rejected(ErrorClass),
}

/// Owns the session state. Transitions are serialized, so the in-between
/// state of a login or check is never published.
pub(crate) struct SessionManager {
    gateway: Gateway,
    state: watch::Sender<Session>,
    transition: Mutex<()>,
}

impl SessionManager {
    pub(crate) fn new(gateway: Gateway) -> Self {
        let (state, _) = watch::channel(Session::Unauthenticated);
        Self {
            gateway,
            state,
            transition: Mutex::new(()),
        }
    }

    pub(crate) fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    fn publish(&self, session: Session) {
        match session {
            Session::Authenticated(ref user) => info!("Signed in as {}", user.username),
            Session::Unauthenticated if self.current().is_authenticated() => info!("Signed out"),
            Session::Unauthenticated => {}
        }
        _ = self.state.send_replace(session);
    }

    async fn clear(&self) {
        if let Err(e) = auth::logout(&self.gateway).await {
            debug!("The credential is cleared for this process only: {}", e);
        }
        self.publish(Session::Unauthenticated);
    }

    pub(crate) async fn login(&self, username: &str, password: &SecretString) -> Result<User> {
        let _transition = self.transition.lock().await;
        debug!("Authenticating {}", username);

        _ = auth::login(&self.gateway, username, password).await?;
        match auth::me(&self.gateway).await {
            Ok(user) => {
                self.publish(Session::Authenticated(user.clone()));
                Ok(user)
            }
            Err(e) => {
                warn!("Obtained a token for {} but could not load the profile: {}", username, e);
                self.clear().await;
                Err(e)
            }
        }
    }

    /// Creates an account. The session is not changed; the new user still
    /// has to log in.
    pub(crate) async fn register(&self, registration: &Registration) -> Result<User> {
        let user = auth::register(&self.gateway, registration).await?;
        info!("Registered {}", user.username);
        Ok(user)
    }

    pub(crate) async fn logout(&self) {
        let _transition = self.transition.lock().await;
        self.clear().await;
    }

    /// Reconciles a stored credential with the backend. With no credential,
    /// nothing is sent.
    pub(crate) async fn check_auth(&self) -> AuthCheck {
        let _transition = self.transition.lock().await;

        if !self.gateway.credentials().is_present().await {
            debug!("No stored credential");
            self.publish(Session::Unauthenticated);
            return AuthCheck::NoCredential;
        }

        match auth::me(&self.gateway).await {
            Ok(user) => {
                self.publish(Session::Authenticated(user));
                AuthCheck::Restored
            }
            Err(e) => {
                warn!("The stored credential was not accepted: {}", e);
                self.clear().await;
                AuthCheck::Rejected(e.class())
            }
        }
    }

    /// Signs out if `err` shows the credential is no longer valid. Returns
    /// whether it did.
    pub(crate) async fn observe_error(&self, err: &Error) -> bool {
        if err.class() != ErrorClass::Auth {
            return false;
        }

        warn!("Signing out after an authorization failure: {}", err);
        self.logout().await;
        true
    }
}
