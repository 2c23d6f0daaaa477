#![warn(missing_docs)]

//! # oracle-tns
//!
//! Client core for Oracle's TNS packet protocol and the TTC data protocol,
//! written without OCI or any native client library.
//!
//! The crate covers three layers:
//!
//! - the packet [`Session`], with segmentation, RESEND and MARKER handling,
//!   cancellation and a stack of saved buffer states;
//! - negotiation and the O3LOGON/O5LOGON logon handshake in [`messages`];
//! - the wire [`types`] codecs and [`LobStream`] for out-of-line LOB data.
//!
//! Statement execution, pooling and DSN parsing are left to callers, which
//! build TTC calls with [`Session::put_ttc_func`] and the output buffer and
//! read replies with the `read_*` helpers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oracle_tns::{messages, ConnectionConfig, LobStream, Session};
//!
//! # async fn example(locator: oracle_tns::LobLocator) -> oracle_tns::Result<()> {
//! let config = ConnectionConfig::new("localhost", 1521, "FREEPDB1", "scott", "tiger");
//! let mut session = Session::new(config);
//! let props = messages::login(&mut session).await?;
//! println!("session id: {:?}", props.session_id());
//!
//! let mut lob = LobStream::new(locator);
//! let size = lob.get_size(&mut session).await?;
//! let data = lob.read(&mut session, 0, size).await?;
//! println!("{} bytes", data.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Object types
//!
//! Object and collection images are encoded from schemas registered in the
//! process-wide [`registry`]. Sessions take a snapshot of it when created.
//!
//! ```rust
//! use oracle_tns::registry;
//! use oracle_tns::types::{ObjectSchema, TypeDescriptor, WireType};
//!
//! registry::register_schema(ObjectSchema::object(
//!     "HR.POINT",
//!     [
//!         ("X", TypeDescriptor::new(WireType::Number)),
//!         ("Y", TypeDescriptor::new(WireType::Number)),
//!     ],
//! ));
//! assert!(registry::schema("HR.POINT").is_ok());
//! ```

pub mod buffer;
pub mod capabilities;
pub mod charset;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod lob;
pub mod messages;
pub mod packet;
pub mod registry;
pub mod session;
pub mod summary;
pub mod trace;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use buffer::{ReadBuffer, StreamOptions, WriteBuffer};
pub use capabilities::Capabilities;
pub use charset::StringConverter;
pub use config::{ClientInfo, ConnectionConfig, LogonMode};
pub use error::{Error, Result};
pub use lob::LobStream;
pub use registry::RegistrySnapshot;
pub use session::{NetworkSecurity, Session, SessionState};
pub use summary::Summary;
pub use trace::{NullTracer, SharedTracer, Tracer, TracingTracer};
pub use transport::TlsConfig;
pub use types::{LobLocator, Number, TypeDescriptor, Value, WireType};

// Re-export serde_json for users working with JSON columns
pub use serde_json;
