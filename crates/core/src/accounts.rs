//! Account id → account type mapping, built once from configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AccountsConfig;

/// Which configured slot an account occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccountType {
    Standard,
    #[serde(rename = "IRA")]
    Ira,
    Third,
    Unknown,
}

impl AccountType {
    /// The three configurable slots in display order.
    pub const CONFIGURED: [AccountType; 3] = [Self::Standard, Self::Ira, Self::Third];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Ira => "IRA",
            Self::Third => "Third",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A registered brokerage account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub kind: AccountType,
}

#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Vec<Account>,
}

impl AccountRegistry {
    /// Builds the registry from configured ids. Blank ids are ignored and an
    /// id already registered under an earlier slot is skipped.
    #[must_use]
    pub fn from_config(config: &AccountsConfig) -> Self {
        let mut registry = Self::default();
        registry.register(&config.primary, AccountType::Standard);
        if let Some(ira) = &config.ira {
            registry.register(ira, AccountType::Ira);
        }
        if let Some(third) = &config.third {
            registry.register(third, AccountType::Third);
        }
        registry
    }

    fn register(&mut self, id: &str, kind: AccountType) {
        let id = id.trim();
        if id.is_empty() {
            return;
        }
        if let Some(existing) = self.accounts.iter().find(|a| a.id == id) {
            warn!(
                account = id,
                slot = %kind,
                registered_as = %existing.kind,
                "Account id already registered, skipping"
            );
            return;
        }
        self.accounts.push(Account {
            id: id.to_string(),
            kind,
        });
    }

    /// Type for an account id; `Unknown` when the id is not registered.
    #[must_use]
    pub fn account_type(&self, id: &str) -> AccountType {
        self.accounts
            .iter()
            .find(|a| a.id == id)
            .map_or(AccountType::Unknown, |a| a.kind)
    }

    /// Id registered for a slot, if any.
    #[must_use]
    pub fn id_for(&self, kind: AccountType) -> Option<&str> {
        self.accounts
            .iter()
            .find(|a| a.kind == kind)
            .map(|a| a.id.as_str())
    }

    #[must_use]
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.accounts.iter().map(|a| a.id.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }
}
