//! LOB streaming
//!
//! A [`LobStream`] wraps one locator and performs LOB operations on it over
//! a [`Session`]. Every operation is a TTC LOB call (function 0x60) whose
//! reply carries the echoed locators, optional size/charset fields and,
//! for reads, the data in one or more LOB_DATA messages.

use tracing::debug;

use crate::charset::StringConverter;
use crate::constants::{csfrm, function, lob_mode, lob_op, message};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::LobLocator;

/// Locators freed per piggyback message
const FREE_BATCH_SIZE: usize = 25_000;

/// Length of the locator sent to create a temporary LOB
const TEMP_LOCATOR_LENGTH: usize = 40;

/// Lifetime code of a temporary LOB (session duration)
const TEMP_DURATION: u64 = 10;

/// LOB operations over a single locator
///
/// The transient fields describe the next request only and are reset at the
/// start of every operation.
#[derive(Debug, Clone, Default)]
pub struct LobStream {
    locator: LobLocator,
    dest: Vec<u8>,
    dest_len: usize,
    scn: Vec<u8>,
    source_offset: u64,
    dest_offset: u64,
    charset_id: u16,
    send_charset: bool,
    size: u64,
    data: Vec<u8>,
    null_o2u: bool,
    is_null: bool,
    send_size: bool,
}

impl LobStream {
    /// Stream over an existing locator
    pub fn new(locator: LobLocator) -> Self {
        Self {
            locator,
            ..Default::default()
        }
    }

    /// Current locator, updated by every server reply
    pub fn locator(&self) -> &LobLocator {
        &self.locator
    }

    /// Consume the stream, keeping the locator
    pub fn into_locator(self) -> LobLocator {
        self.locator
    }

    /// Charset reported when the LOB was created, zero otherwise
    pub fn charset_id(&self) -> u16 {
        self.charset_id
    }

    fn initialize(&mut self) {
        self.null_o2u = false;
        self.send_charset = false;
        self.send_size = false;
        self.size = 0;
        self.source_offset = 0;
        self.dest_offset = 0;
    }

    fn check_locator(&self) -> Result<()> {
        if self.locator.is_empty() {
            return Err(Error::EmptyLocator);
        }
        Ok(())
    }

    /// Size of the LOB in bytes (BLOB) or characters (CLOB)
    pub async fn get_size(&mut self, session: &mut Session) -> Result<u64> {
        self.check_locator()?;
        session.tracer().print("Read LOB size");
        self.initialize();
        self.send_size = true;
        self.call(session, lob_op::GET_SIZE, None).await?;
        session.tracer().print(&format!("LOB size: {}", self.size));
        Ok(self.size)
    }

    /// Read `count` units starting at the 0-based `offset`
    ///
    /// A count of zero reads to the end of the LOB.
    pub async fn read(&mut self, session: &mut Session, offset: u64, count: u64) -> Result<Vec<u8>> {
        self.check_locator()?;
        session
            .tracer()
            .print(&format!("Read LOB data position: {}, count: {}", offset, count));
        self.initialize();
        self.size = count;
        self.source_offset = offset + 1;
        self.send_size = true;
        self.data.clear();
        self.call(session, lob_op::READ, None).await?;
        Ok(std::mem::take(&mut self.data))
    }

    /// Write `data` starting at the 0-based `offset`
    pub async fn write(&mut self, session: &mut Session, offset: u64, data: &[u8]) -> Result<()> {
        self.check_locator()?;
        session
            .tracer()
            .print(&format!("Write LOB data: {} bytes", data.len()));
        self.initialize();
        self.source_offset = offset + 1;
        self.call(session, lob_op::WRITE, Some(data)).await
    }

    /// Converter for CLOB text: AL16UTF16 for variable-width locators,
    /// otherwise the reported charset or the session's
    pub fn string_converter(&self, session: &Session) -> StringConverter {
        if self.locator.is_variable_width() {
            if self.locator.is_little_endian() {
                StringConverter::Utf16Le
            } else {
                StringConverter::Utf16Be
            }
        } else if self.charset_id != 0 {
            StringConverter::for_charset(self.charset_id)
        } else {
            session.converter()
        }
    }

    /// Read CLOB text
    pub async fn read_string(&mut self, session: &mut Session, offset: u64, count: u64) -> Result<String> {
        let data = self.read(session, offset, count).await?;
        Ok(self.string_converter(session).decode(&data))
    }

    /// Write CLOB text
    pub async fn write_string(&mut self, session: &mut Session, offset: u64, text: &str) -> Result<()> {
        let data = self.string_converter(session).encode(text);
        self.write(session, offset, &data).await
    }

    /// Whether the LOB (or BFILE) exists
    pub async fn exists(&mut self, session: &mut Session) -> Result<bool> {
        self.check_locator()?;
        self.initialize();
        self.null_o2u = true;
        self.is_null = false;
        self.call(session, lob_op::EXISTS, None).await?;
        Ok(self.is_null)
    }

    /// Open the LOB in `mode` (see `lob_mode`) using operation `op_id`
    ///
    /// Temporary LOBs are opened locally without a round trip.
    pub async fn open(&mut self, session: &mut Session, mode: u32, op_id: u32) -> Result<()> {
        self.check_locator()?;
        session
            .tracer()
            .print(&format!("Open LOB: mode={} operation={:#x}", mode, op_id));
        if self.locator.is_temporary() {
            if self.locator.is_open() {
                return Err(Error::protocol("temporary LOB is already open"));
            }
            if mode == lob_mode::READ_WRITE {
                self.locator.set_bits(7, 0x10);
            }
            return Ok(());
        }
        self.initialize();
        self.size = mode as u64;
        self.send_size = true;
        self.call(session, op_id, None).await
    }

    /// Close the LOB using operation `op_id`
    pub async fn close(&mut self, session: &mut Session, op_id: u32) -> Result<()> {
        self.check_locator()?;
        session.tracer().print("Close LOB");
        self.initialize();
        self.call(session, op_id, None).await
    }

    /// Create a temporary LOB
    ///
    /// A `charset_form` of zero creates a BLOB; otherwise a CLOB (or NCLOB
    /// for `csfrm::NCHAR`) in `charset_id`.
    pub async fn create_temporary(session: &mut Session, charset_id: u16, charset_form: u8) -> Result<Self> {
        session.tracer().print("Create temporary LOB");
        let mut locator = vec![0u8; TEMP_LOCATOR_LENGTH];
        locator[1] = 0x54;
        let mut stream = LobStream::new(LobLocator::new(locator));
        stream.null_o2u = true;
        stream.scn = vec![0];
        stream.dest_len = TEMP_DURATION as usize;
        stream.size = TEMP_DURATION;
        stream.send_size = true;
        stream.send_charset = true;
        if charset_form == 0 {
            stream.dest_offset = 0x71;
            stream.charset_id = 1;
        } else {
            stream.dest_offset = 0x70;
            stream.charset_id = charset_id;
            stream.source_offset = charset_form as u64;
        }
        stream.call(session, lob_op::CREATE_TEMP, None).await?;
        stream.scn.clear();
        stream.dest_len = 0;
        debug!(
            target: "oracle_tns",
            len = stream.locator.len(),
            nchar = charset_form == csfrm::NCHAR,
            "temporary LOB created"
        );
        Ok(stream)
    }

    /// Free a temporary LOB; the locator is cleared afterwards
    pub async fn free_temporary(&mut self, session: &mut Session) -> Result<()> {
        self.check_locator()?;
        self.initialize();
        self.call(session, lob_op::FREE_TEMP, None).await?;
        self.locator = LobLocator::default();
        Ok(())
    }

    /// Copy `length` units from this LOB at `src_offset` into `dest` at
    /// `dest_offset`; both offsets are 1-based
    pub async fn copy(
        &mut self,
        session: &mut Session,
        dest: &LobLocator,
        src_offset: u64,
        dest_offset: u64,
        length: u64,
    ) -> Result<()> {
        self.check_locator()?;
        if dest.is_empty() {
            return Err(Error::EmptyLocator);
        }
        self.initialize();
        self.dest = dest.as_bytes().to_vec();
        self.source_offset = src_offset;
        self.dest_offset = dest_offset;
        self.size = length;
        self.send_size = true;
        let result = self.call(session, lob_op::COPY, None).await;
        self.dest.clear();
        result
    }

    /// Append the contents of this LOB to `dest`
    pub async fn append_to(&mut self, session: &mut Session, dest: &LobLocator) -> Result<()> {
        self.check_locator()?;
        if dest.is_empty() {
            return Err(Error::EmptyLocator);
        }
        self.initialize();
        self.dest = dest.as_bytes().to_vec();
        let result = self.call(session, lob_op::APPEND, None).await;
        self.dest.clear();
        result
    }

    /// Free many temporary LOBs in one round trip
    ///
    /// Locators go out in piggyback messages of up to 25 000 each, followed
    /// by a close-temporary-LOBs call.
    pub async fn free_all_temporary(session: &mut Session, locators: &[LobLocator]) -> Result<()> {
        if locators.is_empty() {
            return Ok(());
        }
        session
            .tracer()
            .print(&format!("Free {} temporary LOBs", locators.len()));
        session.reset_buffer();
        let out = session.output();
        for batch in locators.chunks(FREE_BATCH_SIZE) {
            let total: usize = batch.iter().map(LobLocator::len).sum();
            out.write_u8(message::PIGGYBACK);
            out.write_u8(function::LOB_OP);
            out.write_u8(0);
            out.write_u8(1);
            out.write_uint(total as u64, 4, true, true);
            out.write_zeros(7);
            out.write_uint(lob_op::FREE_ALL_TEMP as u64, 4, true, true);
            out.write_zeros(11);
            for locator in batch {
                out.write_bytes(locator.as_bytes());
            }
        }
        out.write_u8(message::FUNCTION);
        out.write_u8(function::CLOSE_TEMP_LOBS);
        out.write_u8(0);
        session.write().await?;
        loop {
            let code = session.read_u8().await?;
            if session.process_server_message(code, "free temporary LOBs").await? {
                return Ok(());
            }
        }
    }

    async fn call(&mut self, session: &mut Session, op: u32, payload: Option<&[u8]>) -> Result<()> {
        session.reset_buffer();
        self.write_op(session, op);
        if let Some(data) = payload {
            let out = session.output();
            out.write_u8(message::LOB_DATA);
            out.write_clr(data);
        }
        session.write().await?;
        match self.read_response(session).await {
            Err(Error::ConnectionReset) => Err(session.read_reset_error().await?),
            other => other,
        }
    }

    fn write_op(&mut self, session: &mut Session, op: u32) {
        let ttc_version = session.capabilities().ttc_version;
        session.put_ttc_func(function::LOB_OP);
        if !self.dest.is_empty() {
            self.dest_len = self.dest.len();
        }
        let out = session.output();

        out.write_u8(!self.locator.is_empty() as u8);
        out.write_uint(self.locator.len() as u64, 4, true, true);
        out.write_u8(!self.dest.is_empty() as u8);
        out.write_uint(self.dest_len as u64, 4, true, true);

        if ttc_version < 3 {
            out.write_uint(self.source_offset, 4, true, true);
            out.write_uint(self.dest_offset, 4, true, true);
        } else {
            out.write_zeros(2);
        }

        out.write_u8(self.send_charset as u8);
        out.write_u8((self.send_size && ttc_version < 3) as u8);
        out.write_u8(self.null_o2u as u8);
        out.write_int(op as i64, 4, true, true);
        out.write_u8(!self.scn.is_empty() as u8);
        out.write_uint(self.scn.len() as u64, 4, true, true);

        if ttc_version >= 3 {
            out.write_uint(self.source_offset, 8, true, true);
            out.write_int(self.dest_offset as i64, 8, true, true);
            out.write_u8(self.send_size as u8);
        }
        if ttc_version >= 4 {
            out.write_zeros(6);
        }

        out.write_bytes(self.locator.as_bytes());
        out.write_bytes(&self.dest);

        if self.send_charset {
            out.write_uint(self.charset_id as u64, 2, true, true);
        }
        if ttc_version < 3 && self.send_size {
            out.write_uint(self.size, 4, true, true);
        }
        for b in &self.scn {
            out.write_uint(*b as u64, 4, true, true);
        }
        if ttc_version >= 3 && self.send_size {
            out.write_uint(self.size, 8, true, true);
        }
    }

    async fn read_response(&mut self, session: &mut Session) -> Result<()> {
        loop {
            let code = session.read_u8().await?;
            match code {
                message::PARAMETER => self.read_parameters(session).await?,
                message::LOB_DATA => {
                    let chunk = session.read_clr().await?;
                    self.data.extend_from_slice(&chunk);
                }
                code => {
                    if session.process_server_message(code, "LOB operation").await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Locators echoed at their request lengths, then charset, size and the
    /// null flag, each only when requested
    async fn read_parameters(&mut self, session: &mut Session) -> Result<()> {
        if !self.locator.is_empty() {
            let echoed = session.read_bytes(self.locator.len()).await?;
            self.locator = LobLocator::new(echoed);
        }
        if !self.dest.is_empty() {
            self.dest = session.read_bytes(self.dest.len()).await?;
            self.dest_len = self.dest.len();
        } else {
            self.dest_len = 0;
        }
        if self.send_charset {
            self.charset_id = session.read_int(2, true, true).await? as u16;
        }
        if self.send_size {
            let width = if session.capabilities().ttc_version < 3 { 4 } else { 8 };
            self.size = session.read_int(width, true, true).await? as u64;
        }
        if self.null_o2u {
            self.is_null = session.read_int(2, true, true).await? != 0;
        }
        Ok(())
    }
}
