use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reportlens_contracts::errors::AppError;
use reportlens_contracts::identity::{
    IdentityEvent, IdentityGateway, IdentityListener, ListenerSet, Principal, Subscription,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::IDENTITY_KEY_MISSING;

/// Identity provider backed by a single `profile.json`.
///
/// The file holds the signed-in principal; no file means signed out. A file
/// that cannot be parsed is reported to subscribers as an error event.
pub struct LocalIdentityGateway {
    profile_path: PathBuf,
    principal: Option<Principal>,
    load_error: Option<String>,
    listeners: ListenerSet,
}

impl LocalIdentityGateway {
    /// Fails with a configuration error when credentials are missing.
    pub fn connect(
        api_key: Option<&str>,
        profile_path: impl Into<PathBuf>,
    ) -> Result<Self, AppError> {
        if api_key.map(str::trim).filter(|key| !key.is_empty()).is_none() {
            return Err(AppError::Configuration(IDENTITY_KEY_MISSING.to_string()));
        }
        let profile_path = profile_path.into();
        let (principal, load_error) = match load_profile(&profile_path) {
            Ok(principal) => (principal, None),
            Err(err) => {
                warn!(path = %profile_path.display(), error = %err, "profile unreadable");
                (None, Some(format!("{err:#}")))
            }
        };
        Ok(Self {
            profile_path,
            principal,
            load_error,
            listeners: ListenerSet::new(),
        })
    }

    pub fn profile_path(&self) -> &Path {
        &self.profile_path
    }

    fn current_event(&self) -> IdentityEvent {
        match &self.load_error {
            Some(message) => IdentityEvent::Error(message.clone()),
            None => IdentityEvent::Changed(self.principal.clone()),
        }
    }

    fn store(&mut self, principal: Principal) -> Result<Principal> {
        if let Some(parent) = self.profile_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.profile_path, serde_json::to_string_pretty(&principal)?)
            .with_context(|| format!("failed writing {}", self.profile_path.display()))?;
        self.principal = Some(principal.clone());
        self.load_error = None;
        self.listeners.notify(&self.current_event());
        Ok(principal)
    }
}

impl IdentityGateway for LocalIdentityGateway {
    fn current_principal(&self) -> Option<Principal> {
        self.principal.clone()
    }

    fn sign_in(&mut self, email: &str, display_name: Option<&str>) -> Result<Principal> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            bail!("invalid email address: {email:?}");
        }
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let principal = match self
            .principal
            .clone()
            .filter(|known| {
                known
                    .email
                    .as_deref()
                    .is_some_and(|stored| stored.eq_ignore_ascii_case(email))
            })
        {
            Some(mut known) => {
                if display_name.is_some() {
                    known.display_name = display_name;
                }
                known
            }
            None => Principal {
                id: Uuid::new_v4().to_string(),
                display_name,
                email: Some(email.to_string()),
                avatar_url: None,
            },
        };
        debug!(principal_id = %principal.id, "signed in");
        self.store(principal)
    }

    fn sign_out(&mut self) -> Result<()> {
        match fs::remove_file(&self.profile_path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed removing {}", self.profile_path.display()))
            }
        }
        self.principal = None;
        self.load_error = None;
        self.listeners.notify(&self.current_event());
        Ok(())
    }

    fn update_display_name(&mut self, name: &str) -> Result<Principal> {
        let Some(mut principal) = self.principal.clone() else {
            bail!("no user is signed in");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("display name cannot be empty");
        }
        principal.display_name = Some(name.to_string());
        self.store(principal)
    }

    fn subscribe(&mut self, listener: IdentityListener) -> Subscription {
        let subscription = self.listeners.subscribe(listener);
        self.listeners
            .notify_one(&subscription, &self.current_event());
        subscription
    }
}

fn load_profile(path: &Path) -> Result<Option<Principal>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("failed reading {}", path.display())),
    };
    let principal: Principal = serde_json::from_str(&raw)
        .with_context(|| format!("profile {} is corrupt", path.display()))?;
    if principal.id.trim().is_empty() {
        bail!("profile {} has no user id", path.display());
    }
    Ok(Some(principal))
}
