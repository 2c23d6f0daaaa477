//! TNS and TTC protocol messages
//!
//! Connect handshake packets (CONNECT, ACCEPT, REFUSE, REDIRECT), the two
//! negotiation exchanges and the logon flow.

mod accept;
mod auth;
mod connect;
mod data_types;
mod protocol;
mod redirect;
mod refuse;

pub use accept::AcceptMessage;
pub use auth::{alter_session_statement, authenticate, AuthMessage, SessionKeyData, SessionProperties};
pub use connect::ConnectMessage;
pub use data_types::{negotiate_data_types, timezone_bytes, DataTypesMessage, DATA_TYPES, DATA_TYPES_12C};
pub use protocol::{negotiate_protocol, ProtocolMessage};
pub use redirect::RedirectMessage;
pub use refuse::RefuseMessage;

use crate::error::Result;
use crate::session::Session;

/// Bring a fresh session up to a logged-on state
///
/// Runs the connect handshake, TCP negotiation, data-type negotiation and
/// both logon phases in order.
pub async fn login(session: &mut Session) -> Result<SessionProperties> {
    session.connect().await?;
    negotiate_protocol(session).await?;
    negotiate_data_types(session).await?;
    authenticate(session).await
}
