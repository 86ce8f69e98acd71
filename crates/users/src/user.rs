use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dddkit_core::{AggregateId, AggregateRoot, DomainError, DomainResult, Entity, ValueObject};
use dddkit_events::{
    AnyCommand, AnyEvent, BusError, EventSourced, EventSourcedAggregate, EventStream,
    MessageBus, Mutations, SourcedAggregate, command_family, event_family, impl_command, impl_event,
};

dddkit_core::uuid_newtype! {
    /// User identifier.
    pub struct UserId;
}

impl From<UserId> for AggregateId {
    fn from(value: UserId) -> Self {
        AggregateId::from_uuid(*value.as_uuid())
    }
}

/// Display name of a user: trimmed, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserName(String);

impl UserName {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for UserName {}

impl TryFrom<String> for UserName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserName> for String {
    fn from(value: UserName) -> Self {
        value.0
    }
}

impl core::fmt::Display for UserName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

event_family! {
    /// Any event about a user.
    pub struct UserEvent: AnyEvent = "user";
}

/// Event: UserCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub id: UserId,
    pub name: UserName,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UserNameChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNameChanged {
    pub id: UserId,
    pub old_name: UserName,
    pub new_name: UserName,
    pub occurred_at: DateTime<Utc>,
}

impl_event!(UserCreated: UserEvent = "user.created");
impl_event!(UserNameChanged: UserEvent = "user.name_changed");

command_family! {
    /// Any command addressed to a user.
    pub struct UserCommand: AnyCommand = "user.command";
}

/// Command: RenameUser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameUser {
    pub id: UserId,
    pub new_name: String,
}

impl_command!(RenameUser: UserCommand = "user.rename");

/// Current user state, as folded from events.
///
/// An entity: two records are the same user when their ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    id: UserId,
    name: UserName,
}

impl UserRecord {
    pub fn name(&self) -> &UserName {
        &self.name
    }
}

impl Entity for UserRecord {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

impl PartialEq for UserRecord {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

impl Eq for UserRecord {}

/// Failure of a user behavior method.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The event was applied but publishing it failed.
    #[error(transparent)]
    Publish(#[from] BusError),
}

/// Aggregate root: User.
///
/// Behavior methods apply one event each and then publish it on the bus they
/// are handed. Pending events stay in [`User::changes`] until the caller
/// persists them.
#[derive(Debug, Clone)]
pub struct User {
    id: UserId,
    root: EventSourcedAggregate<User>,
}

impl EventSourced for User {
    type State = Option<UserRecord>;

    fn mutations() -> &'static Mutations<Self::State> {
        static TABLE: OnceLock<Mutations<Option<UserRecord>>> = OnceLock::new();
        TABLE.get_or_init(|| {
            Mutations::new("user")
                .on(User::user_created)
                .on(User::user_name_changed)
        })
    }
}

impl User {
    /// Create a new user and publish `UserCreated`.
    pub fn create(bus: &MessageBus, name: &str) -> Result<Self, UserError> {
        let name = UserName::parse(name)?;
        let id = UserId::generate();

        let mut root = EventSourcedAggregate::<User>::new();
        let event = root.apply(UserCreated {
            id,
            name,
            occurred_at: Utc::now(),
        })?;
        bus.publish(event.as_message())?;

        Ok(Self { id, root })
    }

    /// Rehydrate from persisted history. The stream must contain the user's
    /// creation event.
    pub fn from_stream(stream: &EventStream) -> DomainResult<Self> {
        let root = EventSourcedAggregate::<User>::from_stream(stream)?;
        let id = root
            .state()
            .as_ref()
            .map(|record| record.id)
            .ok_or_else(|| DomainError::invariant("user stream has no user.created event"))?;
        Ok(Self { id, root })
    }

    /// Rename the user and publish `UserNameChanged`.
    pub fn change_name(&mut self, bus: &MessageBus, new_name: &str) -> Result<(), UserError> {
        let new_name = UserName::parse(new_name)?;
        let old_name = self.record()?.name.clone();

        let event = self.root.apply(UserNameChanged {
            id: self.id,
            old_name,
            new_name,
            occurred_at: Utc::now(),
        })?;
        bus.publish(event.as_message())?;

        Ok(())
    }

    /// Handle a routed `RenameUser` command.
    pub fn handle_rename(&mut self, bus: &MessageBus, cmd: &RenameUser) -> Result<(), UserError> {
        if cmd.id != self.id {
            return Err(DomainError::invariant("user_id mismatch").into());
        }
        self.change_name(bus, &cmd.new_name)
    }

    pub fn name(&self) -> &str {
        self.root
            .state()
            .as_ref()
            .map_or("", |record| record.name.as_str())
    }

    /// Events applied since this instance was created or loaded.
    pub fn changes(&self) -> Vec<dddkit_events::SharedEvent> {
        self.root.changes()
    }

    fn record(&self) -> DomainResult<&UserRecord> {
        self.root.state().as_ref().ok_or_else(DomainError::not_found)
    }

    fn user_created(state: &mut Option<UserRecord>, event: &UserCreated) {
        *state = Some(UserRecord {
            id: event.id,
            name: event.name.clone(),
        });
    }

    fn user_name_changed(state: &mut Option<UserRecord>, event: &UserNameChanged) {
        if let Some(record) = state.as_mut() {
            record.name = event.new_name.clone();
        }
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.root.version()
    }
}

impl SourcedAggregate for User {
    fn from_stream(stream: &EventStream) -> DomainResult<Self> {
        User::from_stream(stream)
    }

    fn root(&self) -> &EventSourcedAggregate<Self> {
        &self.root
    }
}
