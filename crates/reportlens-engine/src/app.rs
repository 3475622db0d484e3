use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reportlens_contracts::errors::AppError;
use reportlens_contracts::identity::{IdentityEvent, IdentityGateway, Principal, Subscription};
use reportlens_contracts::prefs::{avatar_key, PreferenceStore};
use tracing::{error, info};

use crate::mime_for_path;

/// What the application can show right now.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// Blocking. Nothing else renders.
    ConfigurationError(AppError),
    Loading,
    SignedOut,
    Dashboard(Principal),
}

#[derive(Debug, Clone, PartialEq)]
enum AuthState {
    Loading,
    Ready(Option<Principal>),
    Failed(AppError),
}

/// Application root: identity, local preferences and screen selection.
pub struct AppShell {
    gateway: Result<Box<dyn IdentityGateway>, AppError>,
    prefs: Box<dyn PreferenceStore>,
    auth: Arc<Mutex<AuthState>>,
    subscription: Option<Subscription>,
}

impl AppShell {
    /// Subscribes to identity changes once, here. A gateway that failed to
    /// connect leaves the shell on the configuration error screen.
    pub fn start(
        gateway: Result<Box<dyn IdentityGateway>, AppError>,
        prefs: Box<dyn PreferenceStore>,
    ) -> Self {
        let auth = Arc::new(Mutex::new(AuthState::Loading));
        let mut shell = Self {
            gateway,
            prefs,
            auth: Arc::clone(&auth),
            subscription: None,
        };
        if let Ok(gateway) = shell.gateway.as_mut() {
            shell.subscription = Some(gateway.subscribe(Box::new(move |event: &IdentityEvent| {
                let next = match event {
                    IdentityEvent::Changed(principal) => AuthState::Ready(principal.clone()),
                    IdentityEvent::Error(message) => {
                        error!(%message, "identity provider error");
                        AuthState::Failed(AppError::Auth(message.clone()))
                    }
                };
                if let Ok(mut state) = auth.lock() {
                    *state = next;
                }
            })));
        }
        shell
    }

    pub fn screen(&self) -> Screen {
        if let Err(err) = &self.gateway {
            return Screen::ConfigurationError(err.clone());
        }
        match self.auth_state() {
            AuthState::Loading => Screen::Loading,
            AuthState::Failed(err) => Screen::ConfigurationError(err),
            AuthState::Ready(None) => Screen::SignedOut,
            AuthState::Ready(Some(principal)) => Screen::Dashboard(principal),
        }
    }

    /// Set when normal rendering must halt.
    pub fn blocking_error(&self) -> Option<AppError> {
        match self.screen() {
            Screen::ConfigurationError(err) => Some(err),
            _ => None,
        }
    }

    pub fn principal(&self) -> Option<Principal> {
        match self.auth_state() {
            AuthState::Ready(principal) => principal,
            _ => None,
        }
    }

    pub fn sign_in(&mut self, email: &str, display_name: Option<&str>) -> Result<Principal> {
        let principal = self.gateway_mut()?.sign_in(email, display_name)?;
        info!(principal_id = %principal.id, "signed in");
        Ok(principal)
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.gateway_mut()?.sign_out()
    }

    /// The error's display text is the message shown to the user.
    pub fn update_display_name(&mut self, name: &str) -> Result<Principal> {
        self.gateway_mut()
            .and_then(|gateway| gateway.update_display_name(name))
            .map_err(|err| anyhow!("Failed to update profile: {err}"))
    }

    /// Locally chosen image first, then the provider's avatar URL.
    pub fn avatar(&mut self) -> Option<String> {
        let principal = self.principal()?;
        self.prefs
            .get(&avatar_key(&principal.id))
            .or(principal.avatar_url)
    }

    /// Stores the image as a data URL under the signed-in user's key.
    pub fn set_avatar(&mut self, path: &Path) -> Result<String> {
        let Some(principal) = self.principal() else {
            bail!("sign in to set an avatar");
        };
        let data_url = read_image_as_data_url(path)?;
        self.prefs.set(&avatar_key(&principal.id), &data_url)?;
        Ok(data_url)
    }

    /// Drops the identity subscription.
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    fn auth_state(&self) -> AuthState {
        self.auth
            .lock()
            .map(|state| state.clone())
            .unwrap_or(AuthState::Loading)
    }

    fn gateway_mut(&mut self) -> Result<&mut Box<dyn IdentityGateway>> {
        match self.gateway.as_mut() {
            Ok(gateway) => Ok(gateway),
            Err(err) => bail!("{err}"),
        }
    }
}

fn read_image_as_data_url(path: &Path) -> Result<String> {
    let Some(mime) = mime_for_path(path).filter(|mime| mime.starts_with("image/")) else {
        bail!("unsupported avatar image: {}", path.display());
    };
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}
