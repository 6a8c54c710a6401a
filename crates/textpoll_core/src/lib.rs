pub mod domain;
pub mod options;
pub mod phone;
pub mod ports;
pub mod registration;
pub mod validate;

pub use domain::{NewPoll, Poll, PollPatch, VoteOption, VoteOptions, Voter};
pub use ports::{PollStore, PortError, PortResult, SmsSender};
pub use registration::{PendingRegistration, RegistrationState};
