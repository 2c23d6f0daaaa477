//! Data types negotiation message
//!
//! Sent right after TCP negotiation. The request carries the client
//! compile-time and runtime capabilities, the client time zone and the
//! type-representation table; the server answers with its database time zone
//! and its own table, which is read and discarded.
//!
//! Request structure:
//! ```text
//! Size | Description
//! -----+------------------------------------------------
//!    1 | Message type (2)
//!    4 | Zero
//!    1 | Server flags echoed back
//!  1+n | Compile-time caps (length-prefixed)
//!  1+n | Runtime caps (length-prefixed)
//!   11 | Client time zone (when rcaps[1] & 1)
//!    4 | Zero (when the time zone is sent and big Clr chunks are on)
//!    2 | National charset id (LE)
//!    n | Type reps: dty, ndty[, rep, 0], terminated by 0
//! ```
//!
//! Type reps are single bytes unless `ccaps[27]` is set, in which case every
//! value is a big-endian u16.

use chrono::{Local, Offset};

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::capabilities::Capabilities;
use crate::constants::{ccap_index, message};
use crate::error::{Error, Result};
use crate::session::Session;

/// Length of the time zone block in both directions
const TIMEZONE_LENGTH: usize = 11;

/// Entries are `(data type, converted data type, representation)`.
/// A converted type of 0 ends the entry after two values.
/// Type representations understood by every server since 8.1
pub static DATA_TYPES: &[(u16, u16, u16)] = &[
    (1, 1, 1), (2, 2, 10), (8, 8, 1), (12, 12, 10),
    (23, 23, 1), (24, 24, 1), (25, 25, 1), (26, 26, 1),
    (27, 27, 1), (28, 28, 1), (29, 29, 1), (30, 30, 1),
    (31, 31, 1), (32, 32, 1), (33, 33, 1), (10, 10, 1),
    (11, 11, 1), (40, 40, 1), (41, 41, 1), (117, 117, 1),
    (120, 120, 1), (290, 290, 1), (291, 291, 1), (292, 292, 1),
    (293, 293, 1), (294, 294, 1), (298, 298, 1), (299, 299, 1),
    (300, 300, 1), (301, 301, 1), (302, 302, 1), (303, 303, 1),
    (304, 304, 1), (305, 305, 1), (306, 306, 1), (307, 307, 1),
    (308, 308, 1), (309, 309, 1), (310, 310, 1), (311, 311, 1),
    (312, 312, 1), (313, 313, 1), (315, 315, 1), (316, 316, 1),
    (317, 317, 1), (318, 318, 1), (319, 319, 1), (320, 320, 1),
    (321, 321, 1), (322, 322, 1), (323, 323, 1), (327, 327, 1),
    (328, 328, 1), (329, 329, 1), (331, 331, 1), (333, 333, 1),
    (334, 334, 1), (335, 335, 1), (336, 336, 1), (337, 337, 1),
    (338, 338, 1), (339, 339, 1), (340, 340, 1), (341, 341, 1),
    (342, 342, 1), (343, 343, 1), (344, 344, 1), (345, 345, 1),
    (346, 346, 1), (348, 348, 1), (349, 349, 1), (354, 354, 1),
    (355, 355, 1), (359, 359, 1), (363, 363, 1), (380, 380, 1),
    (381, 381, 1), (382, 382, 1), (383, 383, 1), (384, 384, 1),
    (385, 385, 1), (386, 386, 1), (387, 387, 1), (388, 388, 1),
    (389, 389, 1), (390, 390, 1), (391, 391, 1), (393, 393, 1),
    (394, 394, 1), (395, 395, 1), (396, 396, 1), (397, 397, 1),
    (398, 398, 1), (399, 399, 1), (400, 400, 1), (401, 401, 1),
    (404, 404, 1), (405, 405, 1), (406, 406, 1), (407, 407, 1),
    (413, 413, 1), (414, 414, 1), (415, 415, 1), (416, 416, 1),
    (417, 417, 1), (418, 418, 1), (419, 419, 1), (420, 420, 1),
    (421, 421, 1), (422, 422, 1), (423, 423, 1), (424, 424, 1),
    (425, 425, 1), (426, 426, 1), (427, 427, 1), (429, 429, 1),
    (430, 430, 1), (431, 431, 1), (432, 432, 1), (433, 433, 1),
    (449, 449, 1), (450, 450, 1), (454, 454, 1), (455, 455, 1),
    (456, 456, 1), (457, 457, 1), (458, 458, 1), (459, 459, 1),
    (460, 460, 1), (461, 461, 1), (462, 462, 1), (463, 463, 1),
    (466, 466, 1), (467, 467, 1), (468, 468, 1), (469, 469, 1),
    (470, 470, 1), (471, 471, 1), (472, 472, 1), (473, 473, 1),
    (474, 474, 1), (475, 475, 1), (476, 476, 1), (477, 477, 1),
    (478, 478, 1), (479, 479, 1), (480, 480, 1), (481, 481, 1),
    (482, 482, 1), (483, 483, 1), (484, 484, 1), (485, 485, 1),
    (486, 486, 1), (490, 490, 1), (491, 491, 1), (492, 492, 1),
    (493, 493, 1), (494, 494, 1), (495, 495, 1), (496, 496, 1),
    (498, 498, 1), (499, 499, 1), (500, 500, 1), (501, 501, 1),
    (502, 502, 1), (509, 509, 1), (510, 510, 1), (513, 513, 1),
    (514, 514, 1), (516, 516, 1), (517, 517, 1), (518, 518, 1),
    (519, 519, 1), (520, 520, 1), (521, 521, 1), (522, 522, 1),
    (523, 523, 1), (524, 524, 1), (525, 525, 1), (526, 526, 1),
    (527, 527, 1), (528, 528, 1), (529, 529, 1), (530, 530, 1),
    (531, 531, 1), (532, 532, 1), (533, 533, 1), (534, 534, 1),
    (535, 535, 1), (536, 536, 1), (537, 537, 1), (538, 538, 1),
    (539, 539, 1), (540, 540, 1), (541, 541, 1), (542, 542, 1),
    (543, 543, 1), (560, 560, 1), (565, 565, 1), (572, 572, 1),
    (573, 573, 1), (574, 574, 1), (575, 575, 1), (576, 576, 1),
    (578, 578, 1), (580, 580, 1), (581, 581, 1), (582, 582, 1),
    (583, 583, 1), (584, 584, 1), (585, 585, 1), (3, 2, 10),
    (4, 2, 10), (5, 1, 1), (6, 2, 10), (7, 2, 10),
    (9, 1, 1), (13, 0, 0), (14, 0, 0), (15, 23, 1),
    (16, 0, 0), (17, 0, 0), (18, 0, 0), (19, 0, 0),
    (20, 0, 0), (21, 0, 0), (22, 0, 0), (39, 120, 1),
    (58, 0, 0), (68, 2, 10), (69, 0, 0), (70, 0, 0),
    (74, 0, 0), (76, 0, 0), (91, 2, 10), (94, 1, 1),
    (95, 23, 1), (96, 96, 1), (97, 96, 1), (100, 100, 1),
    (101, 101, 1), (102, 102, 1), (104, 11, 1), (105, 0, 0),
    (106, 106, 1), (108, 109, 1), (109, 109, 1), (110, 111, 1),
    (111, 111, 1), (112, 112, 1), (113, 113, 1), (114, 114, 1),
    (115, 115, 1), (116, 102, 1), (118, 0, 0), (119, 0, 0),
    (121, 0, 0), (122, 0, 0), (123, 0, 0), (136, 0, 0),
    (146, 146, 1), (147, 0, 0), (152, 2, 10), (153, 2, 10),
    (154, 2, 10), (155, 1, 1), (156, 12, 10), (172, 2, 10),
    (178, 178, 1), (179, 179, 1), (180, 180, 1), (181, 181, 1),
    (182, 182, 1), (183, 183, 1), (184, 12, 10), (185, 185, 1),
    (186, 186, 1), (187, 187, 1), (188, 188, 1), (189, 189, 1),
    (190, 190, 1), (191, 0, 0), (192, 0, 0), (195, 112, 1),
    (196, 113, 1), (197, 114, 1), (208, 208, 1), (209, 0, 0),
    (231, 231, 1), (232, 231, 1), (233, 233, 1), (241, 109, 1),
    (515, 0, 0),
];

/// Type representations added by 12c servers
pub static DATA_TYPES_12C: &[(u16, u16, u16)] = &[
    (590, 590, 1), (591, 591, 1), (592, 592, 1),
];

/// Client time zone as sent in the request
///
/// Hours, minutes and seconds of the UTC offset are biased by 60.
pub fn timezone_bytes(offset_seconds: i32) -> [u8; TIMEZONE_LENGTH] {
    let hours = (offset_seconds / 3600) as i8;
    let minutes = ((offset_seconds / 60) % 60) as i8;
    let seconds = (offset_seconds % 60) as i8;
    [
        128,
        0,
        0,
        0,
        (hours + 60) as u8,
        (minutes + 60) as u8,
        (seconds + 60) as u8,
        128,
        0,
        0,
        0,
    ]
}

/// Data types negotiation request
#[derive(Debug, Clone)]
pub struct DataTypesMessage {
    /// UTC offset of the client in seconds
    pub timezone_offset: i32,
}

impl Default for DataTypesMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTypesMessage {
    /// Create a request for the local time zone
    pub fn new() -> Self {
        Self {
            timezone_offset: Local::now().offset().fix().local_minus_utc(),
        }
    }

    /// Type reps sent to a server; pre-11g servers stop before the 12c tail
    pub fn type_reps(caps: &Capabilities) -> impl Iterator<Item = &'static (u16, u16, u16)> {
        let tail: &'static [(u16, u16, u16)] = if caps.server_is_pre_11g() {
            &[]
        } else {
            DATA_TYPES_12C
        };
        DATA_TYPES.iter().chain(tail.iter())
    }

    /// Write the request body; capability fixups must already be applied
    pub fn write(&self, buf: &mut WriteBuffer, caps: &Capabilities) {
        buf.write_u8(message::DATA_TYPES);
        buf.write_zeros(4);
        buf.write_u8(caps.server_flags);
        buf.write_u8(caps.compile_caps.len() as u8);
        buf.write_bytes(&caps.compile_caps);
        buf.write_u8(caps.runtime_caps.len() as u8);
        buf.write_bytes(&caps.runtime_caps);
        if caps.sends_timezone() {
            buf.write_bytes(&timezone_bytes(self.timezone_offset));
            if caps.advertises_big_chunks() {
                buf.write_zeros(4);
            }
        }
        buf.write_u16_le(caps.ncharset_id);

        let wide = caps.uses_ub2_type_reps();
        let mut put = |value: u16| {
            if wide {
                buf.write_u16_be(value);
            } else {
                buf.write_u8(value as u8);
            }
        };
        for &(dty, ndty, rep) in Self::type_reps(caps) {
            put(dty);
            put(ndty);
            if ndty != 0 {
                put(rep);
                put(0);
            }
        }
        put(0);
    }

    /// Decode the response; the message code byte has already been consumed
    ///
    /// Returns the database time zone bytes, if the server sent them.
    pub fn parse_response(buf: &mut ReadBuffer, caps: &Capabilities) -> Result<Vec<u8>> {
        let mut db_timezone = Vec::new();
        if caps.runtime_caps[1] == 1 {
            db_timezone = buf.read_bytes_vec(TIMEZONE_LENGTH)?;
            if caps.advertises_big_chunks() {
                buf.read_u32_be()?;
            }
        }
        let wide = caps.uses_ub2_type_reps();
        let mut level = 0;
        loop {
            let num = if wide {
                buf.read_u16_be()?
            } else {
                buf.read_u8()? as u16
            };
            if num == 0 && level == 0 {
                break;
            }
            if num == 0 && level == 1 {
                level = 0;
                continue;
            }
            if level == 3 {
                level = 0;
                continue;
            }
            level += 1;
        }
        Ok(db_timezone)
    }
}

/// Run data types negotiation and freeze the negotiated capabilities
pub async fn negotiate_data_types(session: &mut Session) -> Result<()> {
    session.reset_buffer();
    session.capabilities_mut().apply_server_fixups();
    let request = DataTypesMessage::new();
    let caps = session.capabilities().clone();
    request.write(session.output(), &caps);
    session.write().await?;

    let code = session.read_u8().await?;
    if code != message::DATA_TYPES {
        return Err(Error::UnexpectedMessage {
            code,
            context: "data types negotiation",
        });
    }
    let db_timezone = session
        .decode(|buf| DataTypesMessage::parse_response(buf, &caps))
        .await?;

    let caps = session.capabilities_mut();
    caps.db_timezone = db_timezone;
    caps.finish_negotiation();
    tracing::debug!(
        target: "oracle_tns",
        ttc_version = caps.ttc_version,
        big_chunks = caps.use_big_clr_chunks,
        ub2_reps = caps.compile_caps[ccap_index::UB2_DTY] != 0,
        "data types negotiated"
    );
    session.apply_capabilities();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiated_caps(server_ccaps: Vec<u8>) -> Capabilities {
        let mut caps = Capabilities::new();
        caps.set_server_caps(server_ccaps, vec![]);
        caps.apply_server_fixups();
        caps
    }

    #[test]
    fn test_table_sizes() {
        assert_eq!(DATA_TYPES.len(), 293);
        assert_eq!(DATA_TYPES_12C.len(), 3);
        assert_eq!(DATA_TYPES.iter().filter(|t| t.1 == 0).count(), 26);
        assert_eq!(DATA_TYPES[0], (1, 1, 1));
    }

    #[test]
    fn test_timezone_bytes() {
        assert_eq!(
            timezone_bytes(5 * 3600 + 30 * 60),
            [128, 0, 0, 0, 65, 90, 60, 128, 0, 0, 0]
        );
        assert_eq!(timezone_bytes(-3600)[4], 59);
    }

    #[test]
    fn test_request_with_byte_reps() {
        let mut caps = negotiated_caps(vec![0; 20]);
        caps.ncharset_id = 2000;
        caps.server_flags = 2;
        let mut buf = WriteBuffer::new();
        DataTypesMessage { timezone_offset: 0 }.write(&mut buf, &caps);
        let out = buf.as_slice();
        assert_eq!(&out[..7], &[2, 0, 0, 0, 0, 2, 38]);
        assert_eq!(out[7 + 37], 0);
        let after_caps = 7 + 38;
        assert_eq!(out[after_caps], 7);
        let tz = after_caps + 1 + 7;
        assert_eq!(&out[tz..tz + 11], &[128, 0, 0, 0, 60, 60, 60, 128, 0, 0, 0]);
        assert_eq!(&out[tz + 11..tz + 13], &2000u16.to_le_bytes());
        assert_eq!(&out[tz + 13..tz + 17], &[1, 1, 1, 0]);
        assert_eq!(*out.last().unwrap(), 0);
    }

    #[test]
    fn test_request_with_wide_reps() {
        let mut server = vec![0u8; 40];
        server[27] = 1;
        server[37] = 2;
        let caps = negotiated_caps(server);
        let mut buf = WriteBuffer::new();
        DataTypesMessage { timezone_offset: 0 }.write(&mut buf, &caps);
        let out = buf.as_slice();
        let reps = 7 + 38 + 1 + 7 + 11 + 4 + 2;
        assert_eq!(&out[reps..reps + 8], &[0, 1, 0, 1, 0, 1, 0, 0]);
        assert_eq!(&out[out.len() - 2..], &[0, 0]);
    }

    #[test]
    fn test_pre_11g_server_drops_12c_tail() {
        let mut server = vec![0u8; 20];
        server[7] = 5;
        let caps = negotiated_caps(server);
        assert_eq!(DataTypesMessage::type_reps(&caps).count(), 293);
        let caps = negotiated_caps(vec![0u8; 20]);
        assert_eq!(DataTypesMessage::type_reps(&caps).count(), 296);
    }

    #[test]
    fn test_parse_response_level_loop() {
        let caps = negotiated_caps(vec![0u8; 20]);
        let mut data = vec![0x80, 0, 0, 0, 60, 60, 60, 0x80, 0, 0, 0];
        data.extend_from_slice(&[1, 1, 1, 0, 2, 2, 10, 0, 9, 0, 0, 0xEE]);
        let mut buf = ReadBuffer::from_vec(data);
        let tz = DataTypesMessage::parse_response(&mut buf, &caps).unwrap();
        assert_eq!(tz.len(), 11);
        assert_eq!(buf.remaining_bytes(), &[0xEE]);
    }
}
