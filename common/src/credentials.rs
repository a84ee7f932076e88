use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use log::warn;

use crate::error::{Error, Result};

const KEY_PREFIX: &str = "PRIVATE_KEY_";
const KEY_LEN: usize = 66;

/// A signing key and the address derived from it.
#[derive(Clone)]
pub struct Account {
    signer: PrivateKeySigner,
    address: Address,
}

impl Account {
    /// Parses a `0x`-prefixed, 32-byte hex secret.
    pub fn from_secret(secret: &str) -> Result<Self> {
        let hex = secret
            .strip_prefix("0x")
            .filter(|_| secret.len() == KEY_LEN)
            .ok_or_else(|| Error::Config("expected 0x followed by 64 hex characters".into()))?;
        let signer = PrivateKeySigner::from_str(hex)
            .map_err(|e| Error::Config(format!("invalid private key: {e}")))?;
        let address = signer.address();
        Ok(Self { signer, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Somewhere numbered secrets can be looked up by name.
pub trait SecretSource {
    fn secret(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the process environment (after `.env` was loaded).
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn secret(&self, name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl SecretSource for HashMap<String, String> {
    fn secret(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

/// Loads `PRIVATE_KEY_1`, `PRIVATE_KEY_2`, ... until the first gap. Invalid
/// entries are skipped with a warning; order is preserved.
pub fn load_accounts(source: &dyn SecretSource) -> Vec<Account> {
    let mut accounts = Vec::new();
    for i in 1.. {
        let name = format!("{KEY_PREFIX}{i}");
        let Some(secret) = source.secret(&name) else {
            break;
        };
        match Account::from_secret(secret.trim()) {
            Ok(account) => accounts.push(account),
            Err(e) => warn!("Invalid {name} in .env, skipping... ({e})"),
        }
    }
    accounts
}

/// Fails with a configuration error when no usable key was found.
pub fn require_accounts(source: &dyn SecretSource) -> Result<Vec<Account>> {
    let accounts = load_accounts(source);
    if accounts.is_empty() {
        return Err(Error::Config("No valid private keys found in .env".into()));
    }
    Ok(accounts)
}
