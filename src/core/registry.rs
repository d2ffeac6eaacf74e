//! Subscriber registry.
//!
//! Holds subscriber profiles and the append-only list of orders each one has
//! made. Only the engine appends to a history.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::{EngineError, EngineResult};
use crate::util::{OrderId, SubscriberId};

/// What a registered user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular parking subscriber.
    #[default]
    Subscriber,
    /// Facility attendant.
    Attendant,
    /// Facility manager.
    Manager,
}

impl Role {
    /// Attendants and managers.
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Attendant | Self::Manager)
    }
}

/// Profile data supplied at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberProfile {
    /// Display name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Email address.
    pub email: String,
    /// Licence plate.
    pub car_number: String,
    /// Granted role.
    #[serde(default)]
    pub role: Role,
}

/// Partial contact update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    /// New phone number.
    pub phone: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New licence plate.
    pub car_number: Option<String>,
}

/// Registered subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Unique id.
    pub id: SubscriberId,
    /// Login credential issued at registration.
    pub subscriber_code: String,
    /// Display name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Email address.
    pub email: String,
    /// Licence plate.
    pub car_number: String,
    /// Granted role.
    pub role: Role,
    /// Orders in creation order.
    #[serde(default)]
    pub history: Vec<OrderId>,
}

impl Subscriber {
    /// Build a subscriber from a profile.
    pub fn from_profile(id: SubscriberId, subscriber_code: String, profile: SubscriberProfile) -> Self {
        Self {
            id,
            subscriber_code,
            name: profile.name,
            phone: profile.phone,
            email: profile.email,
            car_number: profile.car_number,
            role: profile.role,
            history: Vec::new(),
        }
    }
}

fn validate_profile(profile: &SubscriberProfile) -> EngineResult<()> {
    if profile.name.trim().is_empty() {
        return Err(EngineError::InvalidRequest("subscriber name is empty".into()));
    }
    if !profile.email.is_empty() && !profile.email.contains('@') {
        return Err(EngineError::InvalidRequest(format!(
            "`{}` is not an email address",
            profile.email
        )));
    }
    Ok(())
}

/// In-memory subscriber table.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<BTreeMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously persisted subscribers.
    pub(crate) fn restore(&self, subscribers: impl IntoIterator<Item = Subscriber>) {
        let mut table = self.subscribers.write();
        for sub in subscribers {
            table.insert(sub.id, sub);
        }
    }

    /// Register a new subscriber. The id is one past the highest in use and
    /// the code is freshly generated.
    pub fn register(&self, profile: SubscriberProfile) -> EngineResult<Subscriber> {
        validate_profile(&profile)?;
        let mut table = self.subscribers.write();
        let id = table.keys().next_back().map_or(1, |last| last + 1);
        let code = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        let sub = Subscriber::from_profile(id, code, profile);
        table.insert(id, sub.clone());
        Ok(sub)
    }

    /// Insert a subscriber with a fixed id (configuration seeds).
    pub fn insert(&self, sub: Subscriber) -> EngineResult<()> {
        let mut table = self.subscribers.write();
        if table.contains_key(&sub.id) {
            return Err(EngineError::InvalidRequest(format!(
                "subscriber {} already registered",
                sub.id
            )));
        }
        table.insert(sub.id, sub);
        Ok(())
    }

    /// Look up by id.
    pub fn get(&self, id: SubscriberId) -> EngineResult<Subscriber> {
        self.subscribers
            .read()
            .get(&id)
            .cloned()
            .ok_or(EngineError::UnknownSubscriber(id))
    }

    /// Whether the id is registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Case-insensitive name search.
    pub fn find_by_name(&self, name: &str) -> Vec<Subscriber> {
        let needle = name.trim().to_lowercase();
        self.subscribers
            .read()
            .values()
            .filter(|s| s.name.to_lowercase() == needle)
            .cloned()
            .collect()
    }

    /// All subscribers ordered by id.
    pub fn list(&self) -> Vec<Subscriber> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Apply `f` to a draft of the record. When `f` reports a change, the
    /// draft is handed to `persist` and committed only if that succeeds. The
    /// table lock is held throughout, so persisted versions follow commit
    /// order.
    fn modify<F, P>(&self, id: SubscriberId, f: F, persist: P) -> EngineResult<Subscriber>
    where
        F: FnOnce(&mut Subscriber) -> EngineResult<bool>,
        P: FnOnce(&Subscriber) -> EngineResult<()>,
    {
        let mut table = self.subscribers.write();
        let current = table.get_mut(&id).ok_or(EngineError::UnknownSubscriber(id))?;
        let mut draft = current.clone();
        if f(&mut draft)? {
            persist(&draft)?;
            *current = draft;
        }
        Ok(current.clone())
    }

    /// Apply a contact update, returning the new record.
    pub fn update_contact<P>(
        &self,
        id: SubscriberId,
        update: ContactUpdate,
        persist: P,
    ) -> EngineResult<Subscriber>
    where
        P: FnOnce(&Subscriber) -> EngineResult<()>,
    {
        if let Some(email) = update.email.as_deref() {
            if !email.contains('@') {
                return Err(EngineError::InvalidRequest(format!(
                    "`{email}` is not an email address"
                )));
            }
        }
        self.modify(
            id,
            |sub| {
                if let Some(phone) = update.phone {
                    sub.phone = phone;
                }
                if let Some(email) = update.email {
                    sub.email = email;
                }
                if let Some(car) = update.car_number {
                    sub.car_number = car;
                }
                Ok(true)
            },
            persist,
        )
    }

    /// Add an order to the subscriber's history, kept sorted by order id.
    pub(crate) fn record_order<P>(
        &self,
        id: SubscriberId,
        order: OrderId,
        persist: P,
    ) -> EngineResult<Subscriber>
    where
        P: FnOnce(&Subscriber) -> EngineResult<()>,
    {
        self.modify(
            id,
            |sub| match sub.history.binary_search(&order) {
                Ok(_) => Ok(false),
                Err(pos) => {
                    sub.history.insert(pos, order);
                    Ok(true)
                }
            },
            persist,
        )
    }
}
