#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Shared fixtures: a contact data object, its mapper and a bridge over the
//! in-memory store.

use std::sync::Arc;

use crm_bridge::infra::memory_store::MemoryStore;
use crm_bridge::infra::static_token::StaticCredentialProvider;
use crm_bridge::{CrmBridge, CrmBridgeConfig, MappingRegistry};
use crm_bridge_sdk::{
    AuthModeKind, DataObject, Entity, EntityMapper, FieldResolver, MappingError, RecordsClient,
    Value,
};

pub const CONTACT: &str = "contact";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contact {
    pub id: Option<String>,
    pub version: Option<String>,
    pub name: String,
    pub city: Option<String>,
    pub age: Option<i64>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Contact {
    pub fn new(name: &str, city: &str) -> Self {
        Self {
            name: name.to_owned(),
            city: Some(city.to_owned()),
            ..Default::default()
        }
    }

    pub fn aged(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_owned());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub version: Option<String>,
    pub name: Option<String>,
    pub city: Option<Option<String>>,
    pub age: Option<Option<i64>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

impl DataObject for Contact {
    type Patch = ContactPatch;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn apply_patch(&mut self, patch: ContactPatch) {
        if let Some(version) = patch.version {
            self.version = Some(version);
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(city) = patch.city {
            self.city = city;
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
    }
}

pub struct ContactMapper;

impl FieldResolver for ContactMapper {
    fn resolve_backend_field(&self, field: &str) -> Option<&str> {
        match field {
            "id" => Some("contactid"),
            "name" => Some("fullname"),
            "city" => Some("address1_city"),
            "age" => Some("new_age"),
            "email" => Some("emailaddress1"),
            "phone" => Some("telephone1"),
            _ => None,
        }
    }
}

impl EntityMapper<Contact> for ContactMapper {
    fn to_entity(&self, data: &Contact) -> Result<Entity, MappingError> {
        Ok(Entity::new(CONTACT)
            .with_attribute("fullname", data.name.as_str())
            .with_attribute("address1_city", data.city.clone())
            .with_attribute("new_age", data.age)
            .with_attribute("emailaddress1", data.email.clone())
            .with_attribute("telephone1", data.phone.clone()))
    }

    fn to_data(&self, entity: &Entity) -> Result<Contact, MappingError> {
        Ok(Contact {
            id: entity.id().map(|id| id.to_string()),
            version: entity.row_version().map(str::to_owned),
            name: entity.get_str("fullname").unwrap_or_default().to_owned(),
            city: entity.get_str("address1_city").map(str::to_owned),
            age: entity.get("new_age").and_then(Value::as_i64),
            email: entity.get_str("emailaddress1").map(str::to_owned),
            phone: entity.get_str("telephone1").map(str::to_owned),
        })
    }
}

pub fn config(max_page_size: u32) -> CrmBridgeConfig {
    CrmBridgeConfig {
        endpoint: "https://org.crm.example.com".to_owned(),
        client_id: "client".to_owned(),
        auth_mode: AuthModeKind::Application,
        max_page_size,
        ..Default::default()
    }
}

/// Contacts client over a fresh in-memory store.
pub fn contacts(max_page_size: u32) -> (Arc<dyn RecordsClient<Contact>>, MemoryStore) {
    let store = MemoryStore::new();
    let registry = MappingRegistry::new()
        .with::<Contact>(CONTACT, Arc::new(ContactMapper))
        .unwrap();
    let credentials =
        StaticCredentialProvider::new().with_token(AuthModeKind::Application, "app-token");
    let bridge = CrmBridge::new(
        &config(max_page_size),
        registry,
        Arc::new(credentials),
        Arc::new(store.clone()),
    )
    .unwrap();
    (bridge.client::<Contact>().unwrap(), store)
}
