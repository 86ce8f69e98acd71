//! Users domain module (event-sourced).
//!
//! A small but complete aggregate built on `dddkit-events`: a `UserEvent`
//! family, a `RenameUser` command, and a `User` aggregate whose behavior
//! methods apply events and then publish them on a `MessageBus`.

pub mod user;

pub use user::{
    RenameUser, User, UserCommand, UserCreated, UserError, UserEvent, UserId, UserName,
    UserNameChanged, UserRecord,
};
