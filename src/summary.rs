//! Call summary, status and warning messages
//!
//! Every server call ends with a summary (TTC message 4) or a status (message
//! 9). The summary layout depends on capabilities negotiated earlier, so the
//! decoders take a [`WireContext`] copied from the session.

use crate::buffer::ReadBuffer;
use crate::charset::StringConverter;
use crate::constants::error_code;
use crate::error::{Error, Result};

/// Capability flags that shape later messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireContext {
    /// Summary carries the end-of-call status
    pub has_eos: bool,
    /// Summary carries the end-to-end ECID sequence
    pub has_fsap: bool,
}

/// Decoded call summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Summary {
    pub end_of_call_status: u32,
    pub end_to_end_ecid_seq: u16,
    pub cur_row_number: u64,
    pub ret_code: u32,
    pub array_elm_error: u16,
    pub array_elm_errno: u16,
    pub cursor_id: u16,
    pub error_pos: u16,
    pub sql_type: u8,
    pub oer_fatal: u8,
    pub flags: u16,
    pub user_cursor_opt: u8,
    pub upi_param: u8,
    pub warning_flag: u8,
    pub rba: u32,
    pub partition_id: u16,
    pub table_id: u8,
    pub block_number: u32,
    pub slot_number: u16,
    pub os_error: u32,
    pub stmt_number: u8,
    pub call_number: u8,
    pub pad1: u16,
    pub success_iter: u32,
    pub oerrdd: Vec<u8>,
    /// Per-row error codes of an array call
    pub batch_errors: Vec<u16>,
    /// Row offsets matching `batch_errors`
    pub batch_offsets: Vec<u32>,
    /// Per-row error messages of an array call
    pub batch_messages: Vec<String>,
    /// Server error text, when `ret_code` is set
    pub error_message: String,
}

impl Summary {
    /// Decode a summary; the message code byte has already been consumed
    pub fn decode(buf: &mut ReadBuffer, ctx: WireContext, conv: StringConverter) -> Result<Self> {
        let mut s = Summary::default();
        if ctx.has_eos {
            s.end_of_call_status = buf.read_ub4()?;
        }
        if ctx.has_fsap {
            s.end_to_end_ecid_seq = buf.read_ub2()?;
        }
        s.cur_row_number = buf.read_ub4()? as u64;
        s.ret_code = buf.read_ub2()? as u32;
        s.array_elm_error = buf.read_ub2()?;
        s.array_elm_errno = buf.read_ub2()?;
        s.cursor_id = buf.read_ub2()?;
        s.error_pos = buf.read_ub2()?;
        s.sql_type = buf.read_u8()?;
        s.oer_fatal = buf.read_u8()?;
        s.flags = buf.read_ub2()?;
        s.user_cursor_opt = buf.read_ub1()?;
        s.upi_param = buf.read_ub1()?;
        s.warning_flag = buf.read_ub1()?;
        s.rba = buf.read_ub4()?;
        s.partition_id = buf.read_ub2()?;
        s.table_id = buf.read_ub1()?;
        s.block_number = buf.read_ub4()?;
        s.slot_number = buf.read_ub2()?;
        s.os_error = buf.read_ub4()?;
        s.stmt_number = buf.read_ub1()?;
        s.call_number = buf.read_ub1()?;
        s.pad1 = buf.read_ub2()?;
        s.success_iter = buf.read_ub4()?;

        let oerrdd_len = buf.read_ub4()?;
        if oerrdd_len > 0 {
            s.oerrdd = buf.read_clr()?;
        }

        let count = buf.read_ub2()? as usize;
        if count > 0 {
            let chunked = buf.read_u8()? == 0xFE;
            for _ in 0..count {
                if chunked {
                    buf.read_ub4()?;
                }
                s.batch_errors.push(buf.read_ub2()?);
            }
            if chunked {
                buf.skip(1)?;
            }
        }

        let count = buf.read_ub4()? as usize;
        if count > 0 {
            let chunked = buf.read_u8()? == 0xFE;
            for _ in 0..count {
                if chunked {
                    buf.read_ub4()?;
                }
                s.batch_offsets.push(buf.read_ub4()?);
            }
            if chunked {
                buf.skip(1)?;
            }
        }

        let count = buf.read_ub2()? as usize;
        if count > 0 {
            buf.skip(1)?;
            for _ in 0..count {
                buf.read_ub2()?;
                let msg = buf.read_clr()?;
                s.batch_messages.push(conv.decode(&msg).trim().to_string());
                buf.skip(2)?;
            }
        }

        if s.ret_code != 0 {
            let msg = buf.read_clr()?;
            s.error_message = conv.decode(&msg).trim().to_string();
        }
        Ok(s)
    }

    /// Check for a real error (1403 marks the end of a fetch)
    pub fn has_error(&self) -> bool {
        self.ret_code != 0 && self.ret_code != error_code::NO_DATA_FOUND
    }

    /// The error carried by this summary
    pub fn error(&self) -> Error {
        Error::oracle(self.ret_code, self.error_message.clone())
    }
}

/// Decode a status message (code 9)
pub fn decode_status(buf: &mut ReadBuffer, ctx: WireContext) -> Result<(u32, u16)> {
    let call_status = if ctx.has_eos { buf.read_ub4()? } else { 0 };
    let ecid_seq = if ctx.has_fsap { buf.read_ub2()? } else { 0 };
    Ok((call_status, ecid_seq))
}

/// Server warning (message code 15)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Warning {
    pub code: u16,
    pub flag: u16,
    pub message: String,
}

impl Warning {
    /// Decode a warning message
    pub fn decode(buf: &mut ReadBuffer, conv: StringConverter) -> Result<Self> {
        let code = buf.read_ub2()?;
        let length = buf.read_ub2()? as usize;
        let flag = buf.read_ub2()?;
        let message = if length > 0 {
            let bytes = buf.read_bytes_vec(length)?;
            conv.decode(&bytes).trim().to_string()
        } else {
            String::new()
        };
        Ok(Self {
            code,
            flag,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::WriteBuffer;

    /// Summary body with every numeric field zero except `ret_code`
    fn summary_bytes(ctx: WireContext, ret_code: u32, message: &str) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        if ctx.has_eos {
            w.write_ub4(0x1234);
        }
        if ctx.has_fsap {
            w.write_ub2(7);
        }
        w.write_ub4(3);
        w.write_ub2(ret_code.min(0xFFFF) as u16);
        for _ in 0..4 {
            w.write_ub2(0);
        }
        w.write_u8(0);
        w.write_u8(0);
        w.write_ub2(0);
        w.write_u8(0);
        w.write_u8(0);
        w.write_u8(0);
        w.write_ub4(0);
        w.write_ub2(0);
        w.write_u8(0);
        w.write_ub4(0);
        w.write_ub2(0);
        w.write_ub4(0);
        w.write_u8(0);
        w.write_u8(0);
        w.write_ub2(0);
        w.write_ub4(0);
        w.write_ub4(0);
        w.write_ub2(0);
        w.write_ub4(0);
        w.write_ub2(0);
        if ret_code != 0 {
            w.write_clr(message.as_bytes());
        }
        w.as_slice().to_vec()
    }

    #[test]
    fn test_summary_with_eos_and_fsap() {
        let ctx = WireContext {
            has_eos: true,
            has_fsap: true,
        };
        let data = summary_bytes(ctx, 942, "ORA-00942: table or view does not exist\n");
        let mut buf = ReadBuffer::from_vec(data);
        let s = Summary::decode(&mut buf, ctx, StringConverter::default()).unwrap();
        assert_eq!(s.end_of_call_status, 0x1234);
        assert_eq!(s.end_to_end_ecid_seq, 7);
        assert_eq!(s.ret_code, 942);
        assert_eq!(s.cur_row_number, 3);
        assert_eq!(s.error_pos, 0);
        assert!(s.has_error());
        assert_eq!(s.error_message, "ORA-00942: table or view does not exist");
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_summary_without_eos() {
        let ctx = WireContext::default();
        let data = summary_bytes(ctx, 0, "");
        let mut buf = ReadBuffer::from_vec(data);
        let s = Summary::decode(&mut buf, ctx, StringConverter::default()).unwrap();
        assert_eq!(s.ret_code, 0);
        assert!(!s.has_error());
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_no_data_found_is_not_error() {
        let ctx = WireContext::default();
        let data = summary_bytes(ctx, 1403, "ORA-01403: no data found");
        let s = Summary::decode(&mut ReadBuffer::from_vec(data), ctx, StringConverter::default()).unwrap();
        assert!(!s.has_error());
        assert!(s.error().is_no_data_found());
    }

    #[test]
    fn test_summary_truncated_underflows() {
        let ctx = WireContext::default();
        let mut data = summary_bytes(ctx, 0, "");
        data.truncate(data.len() - 3);
        let result = Summary::decode(&mut ReadBuffer::from_vec(data), ctx, StringConverter::default());
        assert!(matches!(result, Err(Error::BufferUnderflow { .. })));
    }

    #[test]
    fn test_status_and_warning() {
        let mut w = WriteBuffer::new();
        w.write_ub4(2);
        w.write_ub2(5);
        w.write_ub2(28002);
        w.write_ub2(5);
        w.write_ub2(0);
        w.write_bytes(b"hello");
        let mut buf = ReadBuffer::from_vec(w.as_slice().to_vec());
        let ctx = WireContext {
            has_eos: true,
            has_fsap: true,
        };
        assert_eq!(decode_status(&mut buf, ctx).unwrap(), (2, 5));
        let warning = Warning::decode(&mut buf, StringConverter::default()).unwrap();
        assert_eq!(warning.code, 28002);
        assert_eq!(warning.message, "hello");
    }
}
