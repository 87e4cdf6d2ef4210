#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use crm_bridge_sdk::{
    AccessToken, AuthMode, AuthModeKind, CredentialError, CredentialProvider, DataObject, Entity,
    EntityMapper, FieldResolver, MappingError, Value,
};
use crm_security::SecurityContext;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use url::Url;
use uuid::Uuid;

use crate::domain::connection::{ConnectionSettings, ServiceCredentials};

pub const ACCOUNT: &str = "account";

/// Account data object as a REST layer would carry it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Account {
    pub id: Option<String>,
    pub version: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub employees: Option<i64>,
    pub city: Option<String>,
}

impl Account {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub version: Option<String>,
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub employees: Option<Option<i64>>,
    pub city: Option<Option<String>>,
}

impl DataObject for Account {
    type Patch = AccountPatch;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn apply_patch(&mut self, patch: AccountPatch) {
        if let Some(version) = patch.version {
            self.version = Some(version);
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        if let Some(employees) = patch.employees {
            self.employees = employees;
        }
        if let Some(city) = patch.city {
            self.city = city;
        }
    }
}

pub struct AccountMapper;

impl FieldResolver for AccountMapper {
    fn resolve_backend_field(&self, field: &str) -> Option<&str> {
        match field {
            "id" => Some("accountid"),
            "name" => Some("name"),
            "phone" => Some("telephone1"),
            "employees" => Some("numberofemployees"),
            "city" => Some("address1_city"),
            _ => None,
        }
    }
}

impl EntityMapper<Account> for AccountMapper {
    fn to_entity(&self, data: &Account) -> Result<Entity, MappingError> {
        if data.name.trim().is_empty() {
            return Err(MappingError::missing_field("name"));
        }
        Ok(Entity::new(ACCOUNT)
            .with_attribute("name", data.name.as_str())
            .with_attribute("telephone1", data.phone.clone())
            .with_attribute("numberofemployees", data.employees)
            .with_attribute("address1_city", data.city.clone()))
    }

    fn to_data(&self, entity: &Entity) -> Result<Account, MappingError> {
        let id = entity.id().ok_or_else(|| MappingError::missing_field("accountid"))?;
        let name = entity
            .get_str("name")
            .ok_or_else(|| MappingError::missing_field("name"))?;
        Ok(Account {
            id: Some(id.to_string()),
            version: entity.row_version().map(str::to_owned),
            name: name.to_owned(),
            phone: entity.get_str("telephone1").map(str::to_owned),
            employees: entity.get("numberofemployees").and_then(Value::as_i64),
            city: entity.get_str("address1_city").map(str::to_owned),
        })
    }
}

/// Credential provider that hands out a fixed token and records what it was
/// asked for.
pub struct CountingCredentials {
    token: String,
    calls: AtomicU32,
    failures: AtomicU32,
    last: Mutex<Option<(AuthModeKind, Option<String>)>>,
}

impl CountingCredentials {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_owned(),
            calls: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fail the next `n` acquisitions with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn last_mode(&self) -> Option<AuthModeKind> {
        self.last.lock().as_ref().map(|(kind, _)| *kind)
    }

    pub fn last_assertion(&self) -> Option<String> {
        self.last.lock().as_ref().and_then(|(_, a)| a.clone())
    }
}

#[async_trait]
impl CredentialProvider for CountingCredentials {
    async fn acquire_token(
        &self,
        _endpoint: &Url,
        mode: &AuthMode,
    ) -> Result<AccessToken, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let assertion = match mode {
            AuthMode::Delegated { user_assertion } => {
                Some(user_assertion.expose_secret().to_owned())
            }
            _ => None,
        };
        *self.last.lock() = Some((mode.kind(), assertion));

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CredentialError::Unavailable("identity provider down".to_owned()));
        }
        Ok(AccessToken::new(self.token.as_str()))
    }
}

pub fn ctx_with_token(token: &str) -> SecurityContext {
    SecurityContext::builder()
        .subject_id(Uuid::new_v4())
        .bearer_token(token)
        .build()
}

pub fn settings(mode: AuthModeKind) -> ConnectionSettings {
    ConnectionSettings {
        endpoint: Url::parse("https://org.crm.example.com").unwrap(),
        auth_mode: mode,
        service_identity: Some(ServiceCredentials {
            username: "svc@example.com".to_owned(),
            password: SecretString::from("pw"),
        }),
    }
}
