//! In-memory record store.
//!
//! A [`StoreClient`] that keeps records in process and executes native
//! queries itself. Used for development, tests and as the reference for how
//! a store is expected to treat conditions, ordering and paging:
//!
//! - each record gets the primary attribute `<logical_name>id`;
//! - every write assigns a new, globally increasing row version;
//! - updates merge the given attributes into the stored ones and honour an
//!   expected row version;
//! - conditions against a null or missing attribute are false, except for
//!   `Null`/`NotNull`;
//! - string comparison is ordinal and case-sensitive;
//! - ascending order puts nulls first; unordered results keep insertion order.
//!
//! Counters ([`MemoryStore::stats`]) and scheduled interleaved writes
//! ([`MemoryStore::interleave`]) let tests observe and perturb the calls the
//! bridge makes.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use crm_bridge_sdk::{
    AccessToken, ColumnSet, ConditionExpression, ConditionOperator, Entity, FilterExpression,
    LogicalOperator, NativeQuery, OrderExpression, OrderType, StoreClient, StoreError,
    StoreSession, Value,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use url::Url;
use uuid::Uuid;

/// Store calls, as counted by [`StoreStats`] and targeted by [`Interference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Retrieve,
    RetrieveMultiple,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub connections: u64,
    pub creates: u64,
    pub retrieves: u64,
    pub queries: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl StoreStats {
    /// Calls made through sessions (connections excluded).
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.creates + self.retrieves + self.queries + self.updates + self.deletes
    }
}

/// What a scheduled interleaved writer does.
#[derive(Debug, Clone)]
pub enum InterleavedAction {
    Write { attribute: String, value: Value },
    Delete,
}

/// A write by "someone else", applied right before the `skip + 1`-th
/// following call of kind `before`.
#[derive(Debug, Clone)]
pub struct Interference {
    pub before: Operation,
    pub skip: u32,
    pub logical_name: String,
    pub id: Uuid,
    pub action: InterleavedAction,
}

#[derive(Debug, Clone)]
struct Record {
    id: Uuid,
    row_version: u64,
    attributes: BTreeMap<String, Value>,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Record>>,
    last_version: u64,
    stats: StoreStats,
    tokens_seen: Vec<String>,
    reject_writes: bool,
    pending: Vec<Interference>,
}

impl State {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn table(&mut self, logical_name: &str) -> &mut Vec<Record> {
        self.tables.entry(logical_name.to_owned()).or_default()
    }

    fn find(&self, logical_name: &str, id: Uuid) -> Option<&Record> {
        self.tables
            .get(logical_name)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
    }

    fn find_mut(&mut self, logical_name: &str, id: Uuid) -> Option<&mut Record> {
        self.tables
            .get_mut(logical_name)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
    }

    /// Count the call and run any interference scheduled before it.
    fn enter(&mut self, op: Operation) {
        let stats = &mut self.stats;
        match op {
            Operation::Create => stats.creates += 1,
            Operation::Retrieve => stats.retrieves += 1,
            Operation::RetrieveMultiple => stats.queries += 1,
            Operation::Update => stats.updates += 1,
            Operation::Delete => stats.deletes += 1,
        }

        let mut due = Vec::new();
        self.pending.retain_mut(|i| {
            if i.before != op {
                return true;
            }
            if i.skip == 0 {
                due.push(i.clone());
                return false;
            }
            i.skip -= 1;
            true
        });
        for interference in due {
            self.apply_interference(interference);
        }
    }

    fn apply_interference(&mut self, interference: Interference) {
        let Interference {
            logical_name,
            id,
            action,
            ..
        } = interference;
        match action {
            InterleavedAction::Write { attribute, value } => {
                let version = self.next_version();
                if let Some(record) = self.find_mut(&logical_name, id) {
                    record.attributes.insert(attribute, value);
                    record.row_version = version;
                }
            }
            InterleavedAction::Delete => {
                self.table(&logical_name).retain(|r| r.id != id);
            }
        }
    }
}

/// Shared in-memory store; clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the primary identifier attribute of `logical_name` records.
    #[must_use]
    pub fn primary_attribute(logical_name: &str) -> String {
        format!("{logical_name}id")
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.state.lock().stats
    }

    /// Access tokens sessions were opened with, in order.
    #[must_use]
    pub fn tokens_seen(&self) -> Vec<String> {
        self.state.lock().tokens_seen.clone()
    }

    /// Make every create, update and delete fail with [`StoreError::Rejected`].
    pub fn set_reject_writes(&self, reject: bool) {
        self.state.lock().reject_writes = reject;
    }

    pub fn interleave(&self, interference: Interference) {
        self.state.lock().pending.push(interference);
    }

    /// Insert a record directly, bypassing sessions and counters.
    pub fn seed(&self, entity: &Entity) -> Uuid {
        let mut state = self.state.lock();
        let id = entity.id().unwrap_or_else(Uuid::new_v4);
        let record = new_record(&mut state, entity, id);
        state.table(entity.logical_name()).push(record);
        id
    }

    /// Current state of a record, bypassing sessions and counters.
    #[must_use]
    pub fn snapshot(&self, logical_name: &str, id: Uuid) -> Option<Entity> {
        let state = self.state.lock();
        state
            .find(logical_name, id)
            .map(|r| to_entity(logical_name, r, &ColumnSet::All))
    }

    #[must_use]
    pub fn record_count(&self, logical_name: &str) -> usize {
        self.state
            .lock()
            .tables
            .get(logical_name)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn connect(
        &self,
        endpoint: &Url,
        token: AccessToken,
    ) -> Result<Arc<dyn StoreSession>, StoreError> {
        if token.expose().is_empty() {
            return Err(StoreError::Unauthorized("empty access token".to_owned()));
        }
        let mut state = self.state.lock();
        state.stats.connections += 1;
        state.tokens_seen.push(token.expose().to_owned());
        tracing::debug!(%endpoint, "memory store session opened");
        Ok(Arc::new(MemorySession {
            store: self.clone(),
        }))
    }
}

struct MemorySession {
    store: MemoryStore,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn create(&self, entity: Entity) -> Result<Uuid, StoreError> {
        let mut state = self.store.state.lock();
        state.enter(Operation::Create);
        if state.reject_writes {
            return Err(StoreError::Rejected("writes are disabled".to_owned()));
        }
        let id = entity.id().unwrap_or_else(Uuid::new_v4);
        if state.find(entity.logical_name(), id).is_some() {
            return Err(StoreError::Rejected(format!(
                "{} record {id} already exists",
                entity.logical_name()
            )));
        }
        let record = new_record(&mut state, &entity, id);
        state.table(entity.logical_name()).push(record);
        Ok(id)
    }

    async fn retrieve(
        &self,
        logical_name: &str,
        id: Uuid,
        columns: &ColumnSet,
    ) -> Result<Option<Entity>, StoreError> {
        let mut state = self.store.state.lock();
        state.enter(Operation::Retrieve);
        Ok(state
            .find(logical_name, id)
            .map(|r| to_entity(logical_name, r, columns)))
    }

    async fn retrieve_multiple(&self, query: &NativeQuery) -> Result<Vec<Entity>, StoreError> {
        let mut state = self.store.state.lock();
        state.enter(Operation::RetrieveMultiple);

        let Some(rows) = state.tables.get(&query.entity_name) else {
            return Ok(Vec::new());
        };
        let mut matched: Vec<&Record> = rows
            .iter()
            .filter(|r| matches_filter(&query.criteria, &r.attributes))
            .collect();
        if !query.orders.is_empty() {
            matched.sort_by(|a, b| compare_records(&query.orders, a, b));
        }

        let (skip, take) = match query.paging {
            None => (0, usize::MAX),
            Some(paging) => (
                usize::try_from(paging.offset()).unwrap_or(usize::MAX),
                usize::try_from(paging.count).unwrap_or(usize::MAX),
            ),
        };
        Ok(matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|r| to_entity(&query.entity_name, r, &query.column_set))
            .collect())
    }

    async fn update(&self, entity: Entity) -> Result<(), StoreError> {
        let mut state = self.store.state.lock();
        state.enter(Operation::Update);
        if state.reject_writes {
            return Err(StoreError::Rejected("writes are disabled".to_owned()));
        }
        let logical_name = entity.logical_name().to_owned();
        let Some(id) = entity.id() else {
            return Err(StoreError::Rejected(
                "update requires a record id".to_owned(),
            ));
        };

        let version = state.last_version + 1;
        let Some(record) = state.find_mut(&logical_name, id) else {
            return Err(StoreError::RecordNotFound { logical_name, id });
        };
        if let Some(expected) = entity.row_version()
            && expected != record.row_version.to_string()
        {
            return Err(StoreError::VersionMismatch { logical_name, id });
        }

        let primary = MemoryStore::primary_attribute(&logical_name);
        for (name, value) in entity.attributes() {
            if *name != primary {
                record.attributes.insert(name.clone(), value.clone());
            }
        }
        record.row_version = version;
        state.last_version = version;
        Ok(())
    }

    async fn delete(&self, logical_name: &str, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.store.state.lock();
        state.enter(Operation::Delete);
        if state.reject_writes {
            return Err(StoreError::Rejected("writes are disabled".to_owned()));
        }
        let Some(rows) = state.tables.get_mut(logical_name) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() < before)
    }
}

fn new_record(state: &mut State, entity: &Entity, id: Uuid) -> Record {
    let mut attributes = entity.attributes().clone();
    attributes.insert(
        MemoryStore::primary_attribute(entity.logical_name()),
        Value::Uuid(id),
    );
    Record {
        id,
        row_version: state.next_version(),
        attributes,
    }
}

fn to_entity(logical_name: &str, record: &Record, columns: &ColumnSet) -> Entity {
    let primary = MemoryStore::primary_attribute(logical_name);
    let mut entity = Entity::new(logical_name).with_id(record.id);
    entity.set_row_version(Some(record.row_version.to_string()));
    for (name, value) in &record.attributes {
        if *name == primary || columns.includes(name) {
            entity.set(name.clone(), value.clone());
        }
    }
    entity
}

fn matches_filter(filter: &FilterExpression, attributes: &BTreeMap<String, Value>) -> bool {
    if filter.is_empty() {
        return true;
    }
    let mut results = filter
        .conditions
        .iter()
        .map(|c| matches_condition(c, attributes))
        .chain(filter.filters.iter().map(|f| matches_filter(f, attributes)));
    match filter.filter_operator {
        LogicalOperator::And => results.all(|r| r),
        LogicalOperator::Or => results.any(|r| r),
    }
}

fn matches_condition(condition: &ConditionExpression, attributes: &BTreeMap<String, Value>) -> bool {
    let actual = attributes
        .get(&condition.attribute_name)
        .filter(|v| !v.is_null());
    let Some(actual) = actual else {
        return condition.operator == ConditionOperator::Null;
    };
    let operand = condition.values.first();
    let ordering = || operand.and_then(|v| compare_values(actual, v));
    let text = || actual.as_str().zip(operand.and_then(Value::as_str));

    match condition.operator {
        ConditionOperator::Null => false,
        ConditionOperator::NotNull => true,
        ConditionOperator::Equal => ordering() == Some(Ordering::Equal),
        ConditionOperator::NotEqual => ordering().is_some_and(Ordering::is_ne),
        ConditionOperator::LessThan => ordering() == Some(Ordering::Less),
        ConditionOperator::LessEqual => ordering().is_some_and(Ordering::is_le),
        ConditionOperator::GreaterThan => ordering() == Some(Ordering::Greater),
        ConditionOperator::GreaterEqual => ordering().is_some_and(Ordering::is_ge),
        ConditionOperator::Like => text().is_some_and(|(s, p)| like(s, p)),
        ConditionOperator::NotLike => text().is_some_and(|(s, p)| !like(s, p)),
        ConditionOperator::BeginsWith => text().is_some_and(|(s, p)| s.starts_with(p)),
        ConditionOperator::DoesNotBeginWith => text().is_some_and(|(s, p)| !s.starts_with(p)),
        ConditionOperator::EndsWith => text().is_some_and(|(s, p)| s.ends_with(p)),
        ConditionOperator::DoesNotEndWith => text().is_some_and(|(s, p)| !s.ends_with(p)),
        ConditionOperator::In => in_list(actual, &condition.values) == Some(true),
        ConditionOperator::NotIn => in_list(actual, &condition.values) == Some(false),
    }
}

/// `Some(true)` if any value equals `actual`, `Some(false)` if every value is
/// comparable and different, `None` otherwise.
fn in_list(actual: &Value, values: &[Value]) -> Option<bool> {
    let mut known = true;
    for value in values {
        match compare_values(actual, value) {
            Some(Ordering::Equal) => return Some(true),
            Some(_) => {}
            None => known = false,
        }
    }
    known.then_some(false)
}

/// Ordering between two non-null values of compatible types.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(_) | Value::Decimal(_), Value::Int(_) | Value::Decimal(_)) => {
            let x: Decimal = a.as_decimal()?;
            let y: Decimal = b.as_decimal()?;
            Some(x.cmp(&y))
        }
        (Value::Uuid(x), Value::Uuid(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_records(orders: &[OrderExpression], a: &Record, b: &Record) -> Ordering {
    for order in orders {
        let x = a.attributes.get(&order.attribute_name).filter(|v| !v.is_null());
        let y = b.attributes.get(&order.attribute_name).filter(|v| !v.is_null());
        let ordering = match (x, y) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        };
        let ordering = match order.order_type {
            OrderType::Ascending => ordering,
            OrderType::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    AnyRun,
    AnyOne,
    OneOf(Vec<char>),
}

/// LIKE match: `%` any run, `_` any one character, `[abc]` one of the listed
/// characters (so `[%]` is a literal percent sign).
fn like(text: &str, pattern: &str) -> bool {
    let tokens = tokenize(pattern);
    let text: Vec<char> = text.chars().collect();
    like_from(&text, &tokens)
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '%' => tokens.push(Token::AnyRun),
            '_' => tokens.push(Token::AnyOne),
            '[' => {
                let mut set = Vec::new();
                // The first character is always part of the set, so `[[]`
                // and `[]]` work.
                if let Some(first) = chars.next() {
                    set.push(first);
                }
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    set.push(c);
                }
                tokens.push(Token::OneOf(set));
            }
            c => tokens.push(Token::OneOf(vec![c])),
        }
    }
    tokens
}

fn like_from(text: &[char], tokens: &[Token]) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return text.is_empty();
    };
    match token {
        Token::AnyRun => (0..=text.len()).any(|n| like_from(&text[n..], rest)),
        Token::AnyOne => !text.is_empty() && like_from(&text[1..], rest),
        Token::OneOf(set) => text
            .first()
            .is_some_and(|c| set.contains(c) && like_from(&text[1..], rest)),
    }
}
