//! Authentication messages
//!
//! This module implements the O3LOGON/O5LOGON logon flow. Authentication
//! happens in two phases:
//!
//! 1. **Phase One** (function 0x76): the client sends the user name and its
//!    identity (terminal, program, machine, pid, OS user). The server answers
//!    with `AUTH_SESSKEY` and `AUTH_VFR_DATA`.
//!
//! 2. **Phase Two** (function 0x73): the client sends its encrypted session
//!    key, the encrypted password and the session settings. The server answers
//!    with the session properties, including `AUTH_SVR_RESPONSE`.

use std::collections::HashMap;

use chrono::{Local, Offset};

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::config::{ConnectionConfig, LogonMode};
use crate::constants::{auth_mode, function, message};
use crate::crypto::AuthObject;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::summary::{Summary, Warning};

/// Number of key/value slots in the phase-two request
const KEY_VAL_SIZE: usize = 22;

/// Client version announced in phase two
const CLIENT_VERSION: &str = "1.0.0.0";

/// Values received in the phase-one dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionKeyData {
    /// Encrypted server session key (hex)
    pub session_key: String,
    /// Verifier salt (hex)
    pub salt: String,
    /// Verifier type from the `AUTH_VFR_DATA` flag
    pub verifier_type: u32,
}

/// Session properties returned by phase two
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionProperties(pub HashMap<String, String>);

impl SessionProperties {
    /// Value of one property
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// `AUTH_SESSION_ID`
    pub fn session_id(&self) -> Option<u32> {
        self.get("AUTH_SESSION_ID")?.parse().ok()
    }

    /// `AUTH_SERIAL_NUM`
    pub fn serial_number(&self) -> Option<u32> {
        self.get("AUTH_SERIAL_NUM")?.parse().ok()
    }

    /// `AUTH_VERSION_NO`
    pub fn version_number(&self) -> Option<u32> {
        self.get("AUTH_VERSION_NO")?.parse().ok()
    }
}

/// Decode a key/value dictionary (message 8); the code byte is consumed
fn read_dictionary(buf: &mut ReadBuffer) -> Result<Vec<(String, String, u32)>> {
    let count = buf.read_ub4()? as usize;
    let mut entries = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let (key, value, flag) = buf.read_key_val()?;
        entries.push((
            String::from_utf8_lossy(&key).into_owned(),
            String::from_utf8_lossy(&value).into_owned(),
            flag,
        ));
    }
    Ok(entries)
}

/// `ALTER SESSION` statement sent with phase two
///
/// Registered session parameters are appended as `name=value` settings.
pub fn alter_session_statement(offset_seconds: i32, parameters: &[(String, String)]) -> String {
    let tz = if offset_seconds == 0 {
        "00:00".to_string()
    } else {
        let hours = offset_seconds / 3600;
        let minutes = ((offset_seconds / 60) % 60).abs();
        format!("{:+03}:{:02}", hours, minutes)
    };
    let mut statement = format!(
        "ALTER SESSION SET NLS_LANGUAGE='AMERICAN' NLS_TERRITORY='AMERICA'  TIME_ZONE='{}'",
        tz
    );
    for (name, value) in parameters {
        statement.push_str(&format!(" {}={}", name, value));
    }
    statement.push('\0');
    statement
}

/// Authentication message builder
#[derive(Debug, Clone)]
pub struct AuthMessage {
    username: String,
    mode: u32,
    session_parameters: Vec<(String, String)>,
}

impl AuthMessage {
    /// Create the message for a user and logon mode
    pub fn new(username: impl Into<String>, mode: LogonMode) -> Self {
        Self {
            username: username.into(),
            mode: mode.bits() | auth_mode::NO_NEW_PASS,
            session_parameters: Vec::new(),
        }
    }

    /// Settings applied through `AUTH_ALTER_SESSION`
    pub fn with_session_parameters<'a>(
        mut self,
        parameters: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        self.session_parameters = parameters
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self
    }

    /// Mode bits sent in phase one
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Write the phase-one request
    pub fn write_phase_one(&self, buf: &mut WriteBuffer, config: &ConnectionConfig) {
        buf.write_bytes(&[message::FUNCTION, function::AUTH_PHASE_ONE, 0, 1]);
        buf.write_ub4(self.username.len() as u32);
        buf.write_ub4(self.mode);
        buf.write_bytes(&[1, 1, 5, 1, 1]);
        buf.write_clr(self.username.as_bytes());
        let client = &config.client;
        buf.write_key_val_str("AUTH_TERMINAL", &client.host_name, 0);
        buf.write_key_val_str("AUTH_PROGRAM_NM", &client.program_name, 0);
        buf.write_key_val_str("AUTH_MACHINE", &client.host_name, 0);
        buf.write_key_val_str("AUTH_PID", &client.pid.to_string(), 0);
        buf.write_key_val_str("AUTH_SID", &client.os_user, 0);
    }

    /// Write the phase-two request
    pub fn write_phase_two(
        &self,
        buf: &mut WriteBuffer,
        config: &ConnectionConfig,
        auth: &AuthObject,
        server_charset: u16,
        timezone_offset: i32,
    ) {
        buf.write_bytes(&[message::FUNCTION, function::AUTH_PHASE_TWO, 0]);
        let has_user = !self.username.is_empty();
        if has_user {
            buf.write_u8(1);
            buf.write_ub4(self.username.len() as u32);
        } else {
            buf.write_bytes(&[0, 0]);
        }
        let mut mode = self.mode;
        if has_user && !auth.encrypted_password.is_empty() {
            mode |= auth_mode::USER_AND_PASS;
        }
        buf.write_ub4(mode);
        buf.write_u8(1);
        buf.write_ub4(KEY_VAL_SIZE as u32);
        buf.write_bytes(&[1, 1]);
        buf.write_bytes(self.username.as_bytes());

        let client = &config.client;
        let mut entries: Vec<(&str, String, u32)> = Vec::with_capacity(KEY_VAL_SIZE);
        if !auth.encrypted_client_key.is_empty() {
            entries.push(("AUTH_SESSKEY", auth.encrypted_client_key.clone(), 1));
        }
        if !auth.encrypted_password.is_empty() {
            entries.push(("AUTH_PASSWORD", auth.encrypted_password.clone(), 0));
        }
        entries.extend([
            ("AUTH_TERMINAL", client.host_name.clone(), 0),
            ("AUTH_PROGRAM_NM", client.program_name.clone(), 0),
            ("AUTH_MACHINE", client.host_name.clone(), 0),
            ("AUTH_PID", client.pid.to_string(), 0),
            ("AUTH_SID", client.os_user.clone(), 0),
            ("AUTH_CONNECT_STRING", config.connect_descriptor(), 0),
            ("SESSION_CLIENT_CHARSET", server_charset.to_string(), 0),
            ("SESSION_CLIENT_LIB_TYPE", "0".to_string(), 0),
            ("SESSION_CLIENT_DRIVER_NAME", client.driver_name.clone(), 0),
            ("SESSION_CLIENT_VERSION", CLIENT_VERSION.to_string(), 0),
            ("SESSION_CLIENT_LOBATTR", "1".to_string(), 0),
            (
                "AUTH_ALTER_SESSION",
                alter_session_statement(timezone_offset, &self.session_parameters),
                1,
            ),
        ]);
        for (key, value, flag) in &entries {
            buf.write_key_val_str(key, value, *flag);
        }
        for _ in entries.len()..KEY_VAL_SIZE {
            buf.write_key_val(&[], &[], 0);
        }
    }
}

/// Read the phase-one answer up to its summary
async fn read_phase_one(session: &mut Session) -> Result<SessionKeyData> {
    let mut data = SessionKeyData::default();
    loop {
        let code = session.read_u8().await?;
        match code {
            message::SUMMARY => {
                let summary = session.read_summary().await?;
                if summary.has_error() {
                    return Err(summary.error());
                }
                return Ok(data);
            }
            message::PARAMETER => {
                for (key, value, flag) in session.decode(read_dictionary).await? {
                    match key.as_str() {
                        "AUTH_SESSKEY" => data.session_key = value,
                        "AUTH_VFR_DATA" => {
                            data.salt = value;
                            data.verifier_type = flag;
                        }
                        _ => {}
                    }
                }
            }
            code => {
                return Err(Error::UnexpectedMessage {
                    code,
                    context: "authentication phase one",
                })
            }
        }
    }
}

/// Read the phase-two answer; a warning also ends it
async fn read_phase_two(session: &mut Session) -> Result<SessionProperties> {
    let mut properties = SessionProperties::default();
    loop {
        let code = session.read_u8().await?;
        match code {
            message::SUMMARY => {
                let summary: &Summary = session.read_summary().await?;
                if summary.has_error() {
                    return Err(summary.error());
                }
                return Ok(properties);
            }
            message::PARAMETER => {
                for (key, value, _) in session.decode(read_dictionary).await? {
                    properties.0.insert(key, value);
                }
            }
            message::WARNING => {
                let conv = session.converter();
                let warning = session.decode(|buf| Warning::decode(buf, conv)).await?;
                tracing::warn!(target: "oracle_tns", code = warning.code, "{}", warning.message);
                return Ok(properties);
            }
            code => {
                return Err(Error::UnexpectedMessage {
                    code,
                    context: "authentication phase two",
                })
            }
        }
    }
}

/// Log on with the configured user, password and mode
///
/// Returns the session properties sent by the server. When the server
/// includes `AUTH_SVR_RESPONSE` for a non-privileged logon the response must
/// decrypt to the expected marker, otherwise the logon fails.
pub async fn authenticate(session: &mut Session) -> Result<SessionProperties> {
    let config = session.config().clone();
    let message = AuthMessage::new(config.username.clone(), config.logon_mode)
        .with_session_parameters(session.registry().session_parameters());

    session.tracer().print("doAuth");
    session.reset_buffer();
    message.write_phase_one(session.output(), &config);
    session.write().await?;
    let keys = read_phase_one(session).await?;

    let padding = session.capabilities().logon_padding();
    let auth = AuthObject::new(
        &config.username,
        config.password(),
        &keys.session_key,
        &keys.salt,
        keys.verifier_type,
        padding,
    )?;
    tracing::debug!(target: "oracle_tns", verifier = keys.verifier_type, padding, "session key decrypted");

    session.reset_buffer();
    let charset = session.capabilities().charset_id;
    let offset = Local::now().offset().fix().local_minus_utc();
    message.write_phase_two(session.output(), &config, &auth, charset, offset);
    session.write().await?;
    let properties = read_phase_two(session).await?;

    let privileged = message.mode() & (auth_mode::SYSDBA | auth_mode::SYSOPER) != 0;
    if let Some(response) = properties.get("AUTH_SVR_RESPONSE") {
        if !privileged && !auth.verify_response(response) {
            return Err(Error::AuthenticationFailed(
                "server response verification failed".to_string(),
            ));
        }
    }
    Ok(properties)
}
