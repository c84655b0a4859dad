//! The WebSocket chat layer
//!
//! [`protocol`] defines the wire contract, [`connection`] the
//! per-connection actor loop, [`nudge`] the idle re-engagement timer, and
//! the remaining modules the concrete chat flavors built on top.

pub mod connection;
pub mod flowstate;
pub mod learn_more;
pub mod login;
pub mod nudge;
pub mod protocol;

pub use connection::{progress_reporter, run_chat, ChatError, ChatHandler, EventSender};
pub use flowstate::FlowstateChat;
pub use learn_more::LearnMoreChat;
pub use login::LoginChat;
pub use nudge::NudgeTimer;
pub use protocol::{parse_client_message, ClientMessage, ProtocolError, ServerEvent};
