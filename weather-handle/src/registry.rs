use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    error::HandleError,
    handle::{WeatherHandle, masked},
    model::UpdatePolicy,
    remote::RemoteClient,
    transport::{HttpTransport, Transport},
};

/// Creates weather handles and keeps at most one live handle per credential.
///
/// Clones share the same table. When the last clone is dropped every handle
/// still registered is disposed.
#[derive(Debug, Clone)]
pub struct Registry {
    shared: Arc<RegistryShared>,
}

#[derive(Debug)]
pub(crate) struct RegistryShared {
    config: Config,
    remote: RemoteClient,
    clock: Arc<dyn Clock>,
    handles: Mutex<HashMap<String, WeatherHandle>>,
}

impl Registry {
    /// A registry talking to the real API over HTTP, timed by the system clock.
    pub fn new(config: Config) -> Self {
        Self::with_parts(config, Arc::new(HttpTransport::new()), Arc::new(SystemClock))
    }

    pub fn with_parts(config: Config, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let remote = RemoteClient::from_config(transport, &config);
        Self {
            shared: Arc::new(RegistryShared {
                config,
                remote,
                clock,
                handles: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create and register a handle for `credential`.
    ///
    /// Fails with [`HandleError::CredentialOccupied`] while another live handle
    /// holds the same credential. A polling handle starts its background task
    /// here; outside a Tokio runtime that fails with [`HandleError::NoRuntime`].
    pub fn create(
        &self,
        credential: impl Into<String>,
        policy: UpdatePolicy,
    ) -> Result<WeatherHandle, HandleError> {
        let credential = credential.into();
        if credential.is_empty() {
            return Err(HandleError::EmptyCredential);
        }

        let mut handles = self.shared.lock_handles();
        if handles.contains_key(&credential) {
            return Err(HandleError::CredentialOccupied { credential });
        }

        let handle = WeatherHandle::spawn(
            credential.clone(),
            policy,
            &self.shared.config,
            self.shared.remote.clone(),
            Arc::clone(&self.shared.clock),
            Arc::downgrade(&self.shared),
        )?;
        handles.insert(credential, handle.clone());

        Ok(handle)
    }

    /// Same as [`WeatherHandle::dispose`].
    pub fn dispose(&self, handle: &WeatherHandle) {
        handle.dispose();
    }

    /// Dispose every registered handle. Fine to call with none registered.
    pub fn dispose_all(&self) {
        self.shared.dispose_all();
    }

    pub fn get(&self, credential: &str) -> Option<WeatherHandle> {
        self.shared.lock_handles().get(credential).cloned()
    }

    /// Credentials of all live handles, sorted.
    pub fn credentials(&self) -> Vec<String> {
        let mut credentials: Vec<String> = self.shared.lock_handles().keys().cloned().collect();
        credentials.sort();
        credentials
    }

    pub fn len(&self) -> usize {
        self.shared.lock_handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Current time according to the registry's clock.
    pub fn now_secs(&self) -> i64 {
        self.shared.clock.now_secs()
    }
}

impl RegistryShared {
    fn lock_handles(&self) -> MutexGuard<'_, HashMap<String, WeatherHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the credential binding, but only if it still points at `handle`.
    pub(crate) fn unregister(&self, handle: &WeatherHandle) {
        let mut handles = self.lock_handles();
        let registered = handles.get(handle.credential()).is_some_and(|h| h.same_handle(handle));
        if registered {
            handles.remove(handle.credential());
            debug!(credential = %masked(handle.credential()), "credential released");
        }
    }

    fn dispose_all(&self) {
        // Handles unregister themselves, so release the lock before disposing.
        let drained: Vec<WeatherHandle> = self.lock_handles().drain().map(|(_, h)| h).collect();
        for handle in drained {
            handle.dispose();
        }
    }
}

impl Drop for RegistryShared {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
