//! Session: packet I/O, buffering and break/reset handling
//!
//! A [`Session`] owns one transport and drives exactly one request/response
//! cycle at a time. Requests are built into the output buffer and sent by
//! [`Session::write`], which splits them into DATA packets of `SDU - 64`
//! bytes. Replies are appended to the input buffer as packets arrive; the
//! `read_*` helpers and [`Session::decode`] pull values from it and fetch more
//! packets whenever a decoder runs out of bytes.
//!
//! RESEND packets replay every packet written since the last reset. A MARKER
//! packet is answered with a reset marker and surfaces as
//! [`Error::ConnectionReset`]; the error summary that follows stays in the
//! input buffer for the caller to read.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::buffer::{ReadBuffer, StreamOptions, WriteBuffer};
use crate::capabilities::Capabilities;
use crate::charset::StringConverter;
use crate::config::ConnectionConfig;
use crate::constants::{
    connection, data_flags, message, packet_flags, version, MarkerType, PacketType, PACKET_HEADER_SIZE,
};
use crate::error::{Error, Result};
use crate::messages::{AcceptMessage, ConnectMessage, RedirectMessage, RefuseMessage};
use crate::packet::{self, Packet, PacketHeader};
use crate::registry::{self, RegistrySnapshot};
use crate::summary::{self, Summary, Warning};
use crate::trace::{default_tracer, SharedTracer};
use crate::transport::{self, with_deadline, Transport};
use crate::types::TypeDescriptor;

/// Redirects followed before giving up
const MAX_REDIRECTS: usize = 8;

/// Boxed future returned by closures passed to [`Session::with_nested_state`]
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Optional advanced-security layer (checksumming/encryption of data payloads)
pub trait NetworkSecurity: Send {
    /// Reinitialize hash and cipher state after a marker reset
    fn reset(&mut self) -> Result<()>;

    /// Transform an outgoing request before segmentation
    fn protect(&mut self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Transform an incoming data payload before it reaches the input buffer
    fn unprotect(&mut self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Values fixed by the CONNECT/ACCEPT handshake
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Negotiated TNS protocol version
    pub version: u16,
    /// Service options from ACCEPT
    pub service_options: u16,
    /// Session data unit
    pub sdu: u32,
    /// Transport data unit
    pub tdu: u32,
    /// ACCEPT has been received
    pub handshake_complete: bool,
}

impl SessionContext {
    fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            version: version::DESIRED,
            service_options: 0,
            sdu: config.sdu,
            tdu: config.tdu,
            handshake_complete: false,
        }
    }

    /// Packet headers carry a 4-byte length
    pub fn large_sdu(&self) -> bool {
        self.handshake_complete && self.version >= version::MIN_LARGE_SDU
    }

    /// Largest packet accepted from the server
    pub fn max_packet_size(&self) -> usize {
        self.sdu.max(self.tdu).max(connection::DEFAULT_TDU) as usize
    }
}

/// One frame of the saved-state stack
#[derive(Debug, Default)]
pub struct SessionState {
    /// Summary of the frame's last call
    pub summary: Option<Summary>,
    sent_packets: Vec<Bytes>,
    input: ReadBuffer,
    output: WriteBuffer,
}

impl SessionState {
    /// Empty frame for a nested sub-protocol
    pub fn new() -> Self {
        Self::default()
    }
}

/// Packets the session can receive while reading
enum Incoming {
    Data,
    Marker(u8),
    Accept(Packet),
    Refuse(Packet),
    Redirect(RedirectMessage),
    Other(u8),
}

impl Incoming {
    fn packet_type(&self) -> u8 {
        match self {
            Incoming::Data => PacketType::Data as u8,
            Incoming::Marker(_) => PacketType::Marker as u8,
            Incoming::Accept(_) => PacketType::Accept as u8,
            Incoming::Refuse(_) => PacketType::Refuse as u8,
            Incoming::Redirect(_) => PacketType::Redirect as u8,
            Incoming::Other(t) => *t,
        }
    }
}

/// A TNS session over one TCP or TLS connection
pub struct Session {
    config: ConnectionConfig,
    transport: Option<Box<dyn Transport>>,
    tracer: SharedTracer,
    security: Option<Box<dyn NetworkSecurity>>,
    context: SessionContext,
    input: ReadBuffer,
    output: WriteBuffer,
    sent_packets: Vec<Bytes>,
    summary: Option<Summary>,
    states: Vec<SessionState>,
    break_pending: bool,
    caps: Capabilities,
    converter: StringConverter,
    seq: u8,
    registry: RegistrySnapshot,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .field("connected", &self.is_connected())
            .field("break_pending", &self.break_pending)
            .field("states", &self.states.len())
            .finish()
    }
}

impl Session {
    /// Create an unconnected session
    ///
    /// The registry snapshot is taken here; schemas registered later are only
    /// seen by sessions created afterwards.
    pub fn new(config: ConnectionConfig) -> Self {
        let registry = registry::snapshot();
        let converter = StringConverter::for_charset(config.charset_id);
        Self {
            context: SessionContext::from_config(&config),
            config,
            transport: None,
            tracer: default_tracer(),
            security: None,
            input: ReadBuffer::new(),
            output: WriteBuffer::new(),
            sent_packets: Vec::new(),
            summary: None,
            states: Vec::new(),
            break_pending: false,
            caps: Capabilities::new(),
            converter,
            seq: 0,
            registry,
        }
    }

    /// Replace the tracer
    pub fn with_tracer(mut self, tracer: SharedTracer) -> Self {
        self.tracer = tracer;
        self
    }

    /// Install an advanced-security layer
    pub fn set_network_security(&mut self, security: Box<dyn NetworkSecurity>) {
        self.security = Some(security);
    }

    /// Connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Handshake results
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Negotiated capabilities
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub(crate) fn capabilities_mut(&mut self) -> &mut Capabilities {
        &mut self.caps
    }

    /// Converter for text in the database charset
    pub fn converter(&self) -> StringConverter {
        self.converter
    }

    /// Tracer for diagnostics
    pub fn tracer(&self) -> &SharedTracer {
        &self.tracer
    }

    /// Registry snapshot taken when the session was created
    pub fn registry(&self) -> &RegistrySnapshot {
        &self.registry
    }

    /// Bind a descriptor to this session's registry snapshot
    ///
    /// Codecs given the result resolve object schemas, the default charset
    /// and time zone regions as they were when the session was created.
    pub fn describe(&self, desc: TypeDescriptor) -> TypeDescriptor {
        desc.with_registry(self.registry.clone())
    }

    /// Summary of the last call
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Replace the summary of the current call
    pub fn set_summary(&mut self, summary: Option<Summary>) {
        self.summary = summary;
    }

    /// Whether the last summary carries a real error
    pub fn has_error(&self) -> bool {
        self.summary.as_ref().map_or(false, Summary::has_error)
    }

    /// The error of the last summary, if any
    pub fn error(&self) -> Option<Error> {
        self.summary
            .as_ref()
            .filter(|s| s.has_error())
            .map(Summary::error)
    }

    /// Check if a transport is open
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().map_or(false, |t| t.is_connected())
    }

    /// Check if a break was sent and not yet acknowledged
    pub fn is_break(&self) -> bool {
        self.break_pending
    }

    /// Output buffer of the request being built
    pub fn output(&mut self) -> &mut WriteBuffer {
        &mut self.output
    }

    /// Input buffer of the reply being read
    pub fn input(&mut self) -> &mut ReadBuffer {
        &mut self.input
    }

    /// Switch both buffers and the converter to the negotiated settings
    pub(crate) fn apply_capabilities(&mut self) {
        let options: StreamOptions = self.caps.stream_options();
        self.input.set_options(options);
        self.output.set_options(options);
        self.converter = StringConverter::for_charset(self.caps.charset_id);
    }

    // =========================================================================
    // Connect / disconnect
    // =========================================================================

    /// Open the transport and run the CONNECT/ACCEPT handshake
    ///
    /// REDIRECT packets are followed to the address they name, sending the
    /// reconnect data as the new descriptor. REFUSE ends the attempt with
    /// [`Error::ConnectionRefused`].
    pub async fn connect(&mut self) -> Result<()> {
        self.reset_buffer();
        self.disconnect().await;
        let mut host = self.config.host.clone();
        let mut port = self.config.port;
        let mut descriptor = self.config.connect_descriptor();

        for _ in 0..=MAX_REDIRECTS {
            self.tracer.print(&format!("Connect: {}:{}", host, port));
            self.transport = Some(transport::open(&self.config, &host, port).await?);
            self.context = SessionContext::from_config(&self.config);
            self.tracer.print(&format!("Open: {}", descriptor));

            let (connect, follow) = ConnectMessage::with_descriptor(&self.config, descriptor.clone()).build();
            self.write_packet(&connect).await?;
            if let Some(data) = follow {
                self.write_packet(&data).await?;
            }

            match self.read_packet().await? {
                Incoming::Accept(packet) => {
                    let accept = AcceptMessage::parse(&packet)?;
                    self.context.version = accept.protocol_version;
                    self.context.service_options = accept.service_options;
                    self.context.sdu = accept.sdu;
                    self.context.tdu = accept.tdu;
                    self.context.handshake_complete = true;
                    self.sent_packets.clear();
                    debug!(
                        target: "oracle_tns",
                        version = accept.protocol_version,
                        sdu = accept.sdu,
                        "handshake complete"
                    );
                    return Ok(());
                }
                Incoming::Redirect(redirect) => {
                    self.tracer.print(&format!("Redirect: {}", redirect.address));
                    self.disconnect().await;
                    let Some((next_host, next_port)) = redirect.host_port() else {
                        return Err(redirect.into_error());
                    };
                    host = next_host;
                    port = next_port;
                    if let Some(data) = redirect.reconnect_data {
                        descriptor = data;
                    }
                    self.sent_packets.clear();
                }
                Incoming::Refuse(packet) => {
                    let refuse = RefuseMessage::parse(&packet)?;
                    self.tracer.print(&format!(
                        "connection to {}:{} refused with error: {}",
                        host, port, refuse.error_code
                    ));
                    self.disconnect().await;
                    return Err(refuse.into_error());
                }
                other => {
                    self.disconnect().await;
                    return Err(Error::UnexpectedPacket(other.packet_type()));
                }
            }
        }
        Err(Error::protocol("too many redirects"))
    }

    /// Close the transport, ignoring shutdown errors
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.shutdown().await {
                debug!(target: "oracle_tns", error = %e, "shutdown failed");
            }
        }
        self.context.handshake_complete = false;
        self.break_pending = false;
    }

    /// Cancel the call in progress
    ///
    /// After the handshake an interrupt marker is sent and the session enters
    /// break state; the next read consumes the server's reset. Before the
    /// handshake a final end-of-file DATA packet is sent and the transport
    /// closed.
    pub async fn break_connection(&mut self) -> Result<()> {
        self.tracer.print("Break Connection");
        if self.context.handshake_complete {
            self.write_packet_raw(&Packet::marker(MarkerType::Interrupt)).await?;
            self.break_pending = true;
        } else {
            let result = self.write_packet_raw(&Packet::data(Bytes::new(), data_flags::EOF)).await;
            self.disconnect().await;
            result?;
        }
        Ok(())
    }

    // =========================================================================
    // Buffers and saved state
    // =========================================================================

    /// Clear the summary and both buffers before a new call
    pub fn reset_buffer(&mut self) {
        self.summary = None;
        self.reset_write();
        self.reset_read();
    }

    fn reset_write(&mut self) {
        self.sent_packets.clear();
        self.output.clear();
    }

    fn reset_read(&mut self) {
        self.input.clear();
    }

    /// Push the current buffers and summary and install `state` (or empty ones)
    pub fn save_state(&mut self, state: Option<SessionState>) {
        let mut next = state.unwrap_or_default();
        next.input.set_options(self.input.options());
        next.output.set_options(self.output.options());
        let current = SessionState {
            summary: std::mem::replace(&mut self.summary, next.summary),
            sent_packets: std::mem::replace(&mut self.sent_packets, next.sent_packets),
            input: std::mem::replace(&mut self.input, next.input),
            output: std::mem::replace(&mut self.output, next.output),
        };
        self.states.push(current);
    }

    /// Restore the most recently saved state
    ///
    /// Returns the nested state that was active, or `None` when the stack is
    /// empty (in which case nothing changes).
    pub fn load_state(&mut self) -> Option<SessionState> {
        let saved = self.states.pop()?;
        Some(SessionState {
            summary: std::mem::replace(&mut self.summary, saved.summary),
            sent_packets: std::mem::replace(&mut self.sent_packets, saved.sent_packets),
            input: std::mem::replace(&mut self.input, saved.input),
            output: std::mem::replace(&mut self.output, saved.output),
        })
    }

    /// Depth of the saved-state stack
    pub fn state_depth(&self) -> usize {
        self.states.len()
    }

    /// Run `f` on fresh buffers, restoring the outer state afterwards
    ///
    /// The outer state is restored whether `f` succeeds or fails.
    pub async fn with_nested_state<T, F>(&mut self, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut Session) -> SessionFuture<'a, T>,
    {
        self.save_state(None);
        let result = f(self).await;
        self.load_state();
        result
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Start a TTC function call: `3, code, seq`
    pub fn put_ttc_func(&mut self, code: u8) {
        if self.seq == 0 || self.seq == 255 {
            self.seq = 1;
        }
        self.output.write_u8(message::FUNCTION);
        self.output.write_u8(code);
        self.output.write_u8(self.seq);
        self.seq += 1;
    }

    /// Send the output buffer as DATA packets
    ///
    /// An empty buffer sends one empty DATA packet.
    pub async fn write(&mut self) -> Result<()> {
        let mut data = self.output.take();
        if let Some(security) = self.security.as_mut() {
            if !data.is_empty() {
                data = Bytes::from(security.protect(&data)?);
            }
        }
        for pck in packet::segment(&data, self.context.sdu) {
            self.write_packet(&pck).await?;
        }
        Ok(())
    }

    async fn write_packet(&mut self, pck: &Packet) -> Result<()> {
        let result = self.write_packet_raw(pck).await;
        self.check_timeout(result).await
    }

    /// Record and send a packet without break-on-timeout handling
    ///
    /// Markers are never recorded, so a RESEND replays only the request.
    async fn write_packet_raw(&mut self, pck: &Packet) -> Result<()> {
        let raw = pck.to_bytes(self.context.large_sdu());
        if pck.packet_type() != PacketType::Marker {
            self.sent_packets.push(raw.clone());
        }
        self.tracer.log_packet("Write packet:", &raw);
        self.io_write(&raw).await
    }

    async fn io_write(&mut self, raw: &[u8]) -> Result<()> {
        let deadline = self.config.timeout;
        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
        with_deadline(deadline, transport.write_all(raw)).await
    }

    async fn io_read(&mut self, buf: &mut [u8]) -> Result<()> {
        let deadline = self.config.timeout;
        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
        with_deadline(deadline, transport.read_exact(buf)).await
    }

    /// Break the call when an operation on a connected session timed out
    async fn check_timeout<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(Error::Timeout(limit)) = &result {
            if self.context.handshake_complete && !self.break_pending {
                warn!(target: "oracle_tns", timeout = ?limit, "network timeout, breaking call");
                if let Err(e) = self.break_connection().await {
                    self.tracer.print(&format!("Connection Break With Error: {}", e));
                }
            }
        }
        result
    }

    // =========================================================================
    // Reading packets
    // =========================================================================

    async fn read_raw_packet(&mut self) -> Result<Packet> {
        let result = self.read_raw_packet_inner().await;
        self.check_timeout(result).await
    }

    async fn read_raw_packet_inner(&mut self) -> Result<Packet> {
        let large_sdu = self.context.large_sdu();
        let mut head = [0u8; PACKET_HEADER_SIZE];
        self.io_read(&mut head).await?;
        let length = PacketHeader::peek_length(&head, large_sdu) as usize;
        if length < PACKET_HEADER_SIZE {
            return Err(Error::protocol(format!("packet length {} shorter than header", length)));
        }
        let limit = self.context.max_packet_size();
        if length > limit {
            return Err(Error::protocol(format!("packet length {} exceeds limit {}", length, limit)));
        }
        let mut raw = vec![0u8; length];
        raw[..PACKET_HEADER_SIZE].copy_from_slice(&head);
        self.io_read(&mut raw[PACKET_HEADER_SIZE..]).await?;
        self.tracer.log_packet("Read packet:", &raw);
        Packet::from_bytes(Bytes::from(raw), large_sdu)
    }

    async fn renegotiate(&mut self) -> Result<()> {
        if let Some(transport) = self.transport.as_mut() {
            if transport.is_tls() {
                self.tracer.print("TLS renegotiation");
                transport.renegotiate().await?;
            }
        }
        Ok(())
    }

    async fn resend(&mut self) -> Result<()> {
        let packets = self.sent_packets.clone();
        for raw in &packets {
            self.tracer.log_packet("Resend packet:", raw);
            self.io_write(raw).await?;
        }
        Ok(())
    }

    /// Read one meaningful packet; DATA payloads go to the input buffer
    async fn read_packet(&mut self) -> Result<Incoming> {
        loop {
            let pck = self.read_raw_packet().await?;
            match pck.packet_type() {
                PacketType::Resend => {
                    if pck.flags() & packet_flags::TLS_RENEG != 0 {
                        self.renegotiate().await?;
                    }
                    self.resend().await?;
                }
                PacketType::Accept => return Ok(Incoming::Accept(pck)),
                PacketType::Refuse => return Ok(Incoming::Refuse(pck)),
                PacketType::Redirect => {
                    let data = match RedirectMessage::inline_data(&pck)? {
                        Some(data) => data,
                        None => self.read_raw_packet().await?.payload.to_vec(),
                    };
                    return Ok(Incoming::Redirect(RedirectMessage::from_data(&data, pck.flags())));
                }
                PacketType::Data => {
                    let flags = pck.data_flags.unwrap_or(0);
                    if flags & data_flags::TLS_RENEG != 0 || pck.flags() & packet_flags::DATA_RENEG != 0 {
                        self.renegotiate().await?;
                    }
                    match self.security.as_mut() {
                        Some(security) if !pck.payload.is_empty() => {
                            let plain = security.unprotect(&pck.payload)?;
                            self.input.extend(&plain);
                        }
                        _ => self.input.extend(&pck.payload),
                    }
                    if flags == data_flags::EOF {
                        self.disconnect().await;
                        return Err(Error::ConnectionClosed);
                    }
                    return Ok(Incoming::Data);
                }
                PacketType::Marker => return Ok(Incoming::Marker(pck.marker_type().unwrap_or(0))),
                other => return Ok(Incoming::Other(other as u8)),
            }
        }
    }

    /// Answer a server marker: reset marker, security reset, then drain
    /// markers until the next data packet
    async fn process_marker(&mut self) -> Result<()> {
        self.reset_write();
        self.write_packet(&Packet::marker(MarkerType::Reset)).await?;
        if let Some(security) = self.security.as_mut() {
            security.reset()?;
        }
        loop {
            match self.read_packet().await? {
                Incoming::Marker(_) => continue,
                Incoming::Data => break,
                other => return Err(Error::UnexpectedPacket(other.packet_type())),
            }
        }
        self.break_pending = false;
        Ok(())
    }

    /// Receive one more DATA packet into the input buffer
    pub async fn receive(&mut self) -> Result<()> {
        match self.read_packet().await? {
            Incoming::Data => Ok(()),
            Incoming::Marker(marker) => {
                debug!(target: "oracle_tns", marker, "marker received, resetting");
                let break_index = self.input.len();
                self.process_marker().await?;
                self.input.set_position(break_index)?;
                Err(Error::ConnectionReset)
            }
            other => Err(Error::UnexpectedPacket(other.packet_type())),
        }
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Run a decoder over the input buffer, receiving packets until it fits
    ///
    /// The decoder must be restartable: on [`Error::BufferUnderflow`] the read
    /// position is restored and the decoder runs again once more data arrived.
    pub async fn decode<T, F>(&mut self, mut decoder: F) -> Result<T>
    where
        F: FnMut(&mut ReadBuffer) -> Result<T>,
    {
        loop {
            let mark = self.input.position();
            match decoder(&mut self.input) {
                Err(Error::BufferUnderflow { .. }) => {
                    self.input.set_position(mark)?;
                    self.receive().await?;
                }
                result => return result,
            }
        }
    }

    /// Read a single byte
    pub async fn read_u8(&mut self) -> Result<u8> {
        self.decode(|buf| buf.read_u8()).await
    }

    /// Read exactly `n` bytes
    pub async fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.decode(|buf| buf.read_bytes_vec(n)).await
    }

    /// Read an integer in compressed or fixed form
    pub async fn read_int(&mut self, size: usize, compress: bool, big_endian: bool) -> Result<i64> {
        self.decode(|buf| buf.read_int(size, compress, big_endian)).await
    }

    /// Read a big-endian u16
    pub async fn read_u16_be(&mut self) -> Result<u16> {
        self.decode(|buf| buf.read_u16_be()).await
    }

    /// Read a little-endian u16
    pub async fn read_u16_le(&mut self) -> Result<u16> {
        self.decode(|buf| buf.read_u16_le()).await
    }

    /// Read a compressed u16
    pub async fn read_ub2(&mut self) -> Result<u16> {
        self.decode(|buf| buf.read_ub2()).await
    }

    /// Read a compressed u32
    pub async fn read_ub4(&mut self) -> Result<u32> {
        self.decode(|buf| buf.read_ub4()).await
    }

    /// Read a compressed u64
    pub async fn read_ub8(&mut self) -> Result<u64> {
        self.decode(|buf| buf.read_ub8()).await
    }

    /// Read a Clr byte string
    pub async fn read_clr(&mut self) -> Result<Vec<u8>> {
        self.decode(|buf| buf.read_clr()).await
    }

    /// Read a Dlc byte string
    pub async fn read_dlc(&mut self) -> Result<Vec<u8>> {
        self.decode(|buf| buf.read_dlc()).await
    }

    /// Read a key/value/flag triple
    pub async fn read_key_val(&mut self) -> Result<(Vec<u8>, Vec<u8>, u32)> {
        self.decode(|buf| buf.read_key_val()).await
    }

    /// Read a NUL-terminated string of at most `max` bytes
    pub async fn read_null_term_string(&mut self, max: usize) -> Result<String> {
        self.decode(|buf| buf.read_null_term_string(max)).await
    }

    /// Read and store a call summary (the code byte is already consumed)
    pub async fn read_summary(&mut self) -> Result<&Summary> {
        let ctx = self.caps.wire();
        let conv = self.converter;
        let summary = self.decode(|buf| Summary::decode(buf, ctx, conv)).await?;
        Ok(self.summary.insert(summary))
    }

    /// Handle the server messages shared by every call
    ///
    /// Summary (4) ends the call, clearing it on 1403 and failing on any other
    /// error. Status (9) ends the call. Warnings (15) are logged. Returns
    /// whether the call is finished.
    pub async fn process_server_message(&mut self, code: u8, context: &'static str) -> Result<bool> {
        match code {
            message::SUMMARY => {
                let summary = self.read_summary().await?;
                if summary.ret_code == crate::constants::error_code::NO_DATA_FOUND {
                    self.summary = None;
                } else if summary.has_error() {
                    return Err(summary.error());
                }
                Ok(true)
            }
            message::STATUS => {
                let ctx = self.caps.wire();
                let (call_status, ecid) = self.decode(|buf| summary::decode_status(buf, ctx)).await?;
                debug!(target: "oracle_tns", call_status, ecid, "call status");
                Ok(true)
            }
            message::WARNING => {
                let conv = self.converter;
                let warning = self.decode(|buf| Warning::decode(buf, conv)).await?;
                if warning.code != 0 {
                    warn!(target: "oracle_tns", code = warning.code, "{}", warning.message);
                }
                Ok(false)
            }
            code => Err(Error::UnexpectedMessage { code, context }),
        }
    }

    /// Read the error summary left in the input buffer by a marker reset
    pub async fn read_reset_error(&mut self) -> Result<Error> {
        loop {
            let code = self.read_u8().await?;
            if code == message::SUMMARY {
                let summary = self.read_summary().await?;
                return Ok(summary.error());
            }
            self.process_server_message(code, "reset").await?;
        }
    }
}
