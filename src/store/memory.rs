use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Ceremony, CeremonyStore, StoreError};
use crate::webauthn::credential::unix_now;
use crate::webauthn::{CeremonyType, Credential};

#[derive(Default)]
struct Tables {
    ceremonies:  HashMap<Vec<u8>, Ceremony>,
    credentials: HashMap<Vec<u8>, Credential>,
}

/// In-process [`CeremonyStore`]. Every operation runs under one lock, so the
/// conditional writes are atomic with respect to each other.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    pub fn credential(&self, credential_id: &[u8]) -> Result<Credential, StoreError> {
        self.lock()?
            .credentials
            .get(credential_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    pub fn credential_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.credentials.len())
    }

    /// Drop ceremonies whose TTL has run out. Returns how many were removed.
    pub fn remove_expired(&self) -> Result<usize, StoreError> {
        let now = unix_now();
        let mut tables = self.lock()?;
        let before = tables.ceremonies.len();
        tables.ceremonies.retain(|_, c| !c.is_expired(now));
        Ok(before - tables.ceremonies.len())
    }
}

fn live_ceremony<'t>(tables: &'t Tables, challenge_id: &[u8]) -> Result<&'t Ceremony, StoreError> {
    match tables.ceremonies.get(challenge_id) {
        Some(c) if !c.is_expired(unix_now()) => Ok(c),
        _ => Err(StoreError::NotFound),
    }
}

impl CeremonyStore for MemoryStore {
    fn put_ceremony(&self, ceremony: Ceremony) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if tables.ceremonies.contains_key(&ceremony.challenge_id) {
            return Err(StoreError::ConditionFailed("challenge already in use"));
        }
        tables.ceremonies.insert(ceremony.challenge_id.clone(), ceremony);
        Ok(())
    }

    fn get_ceremony(&self, challenge_id: &[u8]) -> Result<Ceremony, StoreError> {
        let tables = self.lock()?;
        live_ceremony(&tables, challenge_id).cloned()
    }

    fn get_existing_ceremony_and_credential(
        &self,
        challenge_id: &[u8],
        credential_id: &[u8],
    ) -> Result<(Ceremony, Credential), StoreError> {
        let tables = self.lock()?;
        let ceremony = live_ceremony(&tables, challenge_id)?;
        if ceremony.credential_id.as_deref().is_some_and(|id| id != credential_id) {
            return Err(StoreError::ConditionFailed("ceremony belongs to another credential"));
        }
        let credential = tables.credentials.get(credential_id).ok_or(StoreError::NotFound)?;
        Ok((ceremony.clone(), credential.clone()))
    }

    fn write_new_credential(&self, ceremony: &Ceremony, credential: &Credential) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        {
            let stored = live_ceremony(&tables, &ceremony.challenge_id)?;
            if stored.session_id != ceremony.session_id {
                return Err(StoreError::ConditionFailed("session mismatch"));
            }
            if stored.ceremony_type != CeremonyType::Create {
                return Err(StoreError::ConditionFailed("not a registration ceremony"));
            }
        }
        if tables.credentials.contains_key(&credential.raw_id) {
            return Err(StoreError::AlreadyExists);
        }
        tables.ceremonies.remove(&ceremony.challenge_id);
        tables.credentials.insert(credential.raw_id.clone(), credential.clone());
        tracing::info!(cred_id = credential.id_hex(), "Credential stored");
        Ok(())
    }

    fn increment_credential_counter(
        &self,
        credential_id: &[u8],
        new_sign_count: u32,
        ceremony_id: &[u8],
    ) -> Result<(), StoreError> {
        let now = unix_now();
        let mut tables = self.lock()?;
        {
            let ceremony = live_ceremony(&tables, ceremony_id)?;
            if ceremony.ceremony_type != CeremonyType::Get {
                return Err(StoreError::ConditionFailed("not a login ceremony"));
            }
            if ceremony.credential_id.as_deref().is_some_and(|id| id != credential_id) {
                return Err(StoreError::ConditionFailed("ceremony belongs to another credential"));
            }
        }

        let credential = tables.credentials.get_mut(credential_id).ok_or(StoreError::NotFound)?;
        if new_sign_count < credential.sign_counter {
            credential.clone_warning = true;
            credential.updated_at = now;
            tracing::warn!(
                cred_id = credential.id_hex(),
                stored = credential.sign_counter,
                received = new_sign_count,
                "Counter regression, credential flagged"
            );
            return Err(StoreError::CounterNotMonotone {
                stored: credential.sign_counter,
                received: new_sign_count,
            });
        }
        credential.sign_counter = new_sign_count;
        credential.updated_at = now;
        tables.ceremonies.remove(ceremony_id);
        tracing::info!(count = new_sign_count, "Counter updated");
        Ok(())
    }
}
