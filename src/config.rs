//! Connection configuration
//!
//! [`ConnectionConfig`] is the value object the session consumes: where to
//! connect, deadlines, data unit sizes, TLS material and the client identity
//! announced during logon.

use std::time::Duration;

use crate::constants::{auth_mode, charset, connection};
use crate::transport::TlsConfig;

/// Default Oracle port
pub const DEFAULT_PORT: u16 = 1521;

/// Default client driver name announced during logon
pub const DEFAULT_DRIVER_NAME: &str = "oracle-tns";

/// Service identification method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceMethod {
    /// Connect using service name
    ServiceName(String),
    /// Connect using SID (legacy)
    Sid(String),
}

/// Privilege requested at logon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogonMode {
    /// Regular user session
    #[default]
    Normal,
    /// SYSDBA
    SysDba,
    /// SYSOPER
    SysOper,
}

impl LogonMode {
    /// Mode bits sent in both authentication phases
    pub fn bits(self) -> u32 {
        match self {
            LogonMode::Normal => 0,
            LogonMode::SysDba => auth_mode::SYSDBA,
            LogonMode::SysOper => auth_mode::SYSOPER,
        }
    }
}

/// Client identity announced to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Full program path
    pub program_path: String,
    /// Program name without directories
    pub program_name: String,
    /// Client machine name
    pub host_name: String,
    /// Operating system user
    pub os_user: String,
    /// Client process id
    pub pid: u32,
    /// Driver name sent as SESSION_CLIENT_DRIVER_NAME
    pub driver_name: String,
}

impl ClientInfo {
    /// Collect the identity of the running process
    pub fn current() -> Self {
        let program_path = std::env::args().next().unwrap_or_default();
        let program_name = std::path::Path::new(&program_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program_path.clone());
        let host_name = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        let os_user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            program_path,
            program_name,
            host_name,
            os_user,
            pid: std::process::id(),
            driver_name: DEFAULT_DRIVER_NAME.to_string(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::current()
    }
}

/// Connection configuration consumed by the session
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Host to connect to
    pub host: String,
    /// Port to connect to
    pub port: u16,
    /// Service name or SID
    pub service: ServiceMethod,
    /// Username for authentication
    pub username: String,
    password: String,
    /// Requested privilege
    pub logon_mode: LogonMode,
    /// TLS material; `None` means plain TCP
    pub tls: Option<TlsConfig>,
    /// Deadline for establishing the TCP connection
    pub connect_timeout: Duration,
    /// Deadline for every packet read and write; `None` waits forever
    pub timeout: Option<Duration>,
    /// Requested session data unit
    pub sdu: u32,
    /// Requested transport data unit
    pub tdu: u32,
    /// Client charset id
    pub charset_id: u16,
    /// Client identity
    pub client: ClientInfo,
}

impl ConnectionConfig {
    /// Create a new configuration with service name
    pub fn new(
        host: impl Into<String>,
        port: u16,
        service_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            service: ServiceMethod::ServiceName(service_name.into()),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Use a SID instead of a service name
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.service = ServiceMethod::Sid(sid.into());
        self
    }

    /// Enable TLS with the given configuration
    pub fn tls(mut self, config: TlsConfig) -> Self {
        self.tls = Some(config);
        self
    }

    /// Set the per-packet read/write deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connect deadline
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the session data unit size
    pub fn sdu(mut self, sdu: u32) -> Self {
        self.sdu = sdu;
        self
    }

    /// Request a privileged session
    pub fn logon_mode(mut self, mode: LogonMode) -> Self {
        self.logon_mode = mode;
        self
    }

    /// Set the password
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// Password used during logon
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Build the TNS connect descriptor sent in the CONNECT packet
    pub fn connect_descriptor(&self) -> String {
        let protocol = if self.is_tls_enabled() { "TCPS" } else { "TCP" };
        let service = match &self.service {
            ServiceMethod::ServiceName(name) => format!("(SERVICE_NAME={})", name),
            ServiceMethod::Sid(sid) => format!("(SID={})", sid),
        };
        format!(
            "(DESCRIPTION=(ADDRESS=(PROTOCOL={})(HOST={})(PORT={}))(CONNECT_DATA={}(CID=(PROGRAM={})(HOST={})(USER={}))))",
            protocol,
            self.host,
            self.port,
            service,
            self.client.program_path,
            self.client.host_name,
            self.client.os_user
        )
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            service: ServiceMethod::ServiceName("FREEPDB1".to_string()),
            username: String::new(),
            password: String::new(),
            logon_mode: LogonMode::Normal,
            tls: None,
            connect_timeout: Duration::from_secs(10),
            timeout: Some(Duration::from_secs(120)),
            sdu: connection::DEFAULT_SDU,
            tdu: connection::DEFAULT_TDU,
            charset_id: charset::AL32UTF8,
            client: ClientInfo::current(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_descriptor() {
        let mut config = ConnectionConfig::new("dbhost", 1521, "FREEPDB1", "scott", "tiger");
        config.client.program_path = "app".to_string();
        config.client.host_name = "box".to_string();
        config.client.os_user = "me".to_string();
        assert_eq!(
            config.connect_descriptor(),
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=dbhost)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=FREEPDB1)(CID=(PROGRAM=app)(HOST=box)(USER=me))))"
        );
    }

    #[test]
    fn test_logon_mode_bits() {
        assert_eq!(LogonMode::Normal.bits(), 0);
        assert_eq!(LogonMode::SysDba.bits(), 0x20);
        assert_eq!(LogonMode::SysOper.bits(), 0x40);
    }
}
