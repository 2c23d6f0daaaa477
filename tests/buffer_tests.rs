//! Integration tests for the binary value stream

use oracle_tns::buffer::{ReadBuffer, StreamOptions, WriteBuffer};
use oracle_tns::Error;

#[test]
fn test_compressed_integer_layout() {
    let mut buf = WriteBuffer::new();
    buf.write_ub4(0);
    buf.write_ub4(0x0102);
    buf.write_sb4(-5);
    assert_eq!(buf.as_slice(), &[0, 2, 1, 2, 0x81, 5]);

    let mut read = ReadBuffer::from_slice(buf.as_slice());
    assert_eq!(read.read_ub4().unwrap(), 0);
    assert_eq!(read.read_ub4().unwrap(), 0x0102);
    assert_eq!(read.read_sb4().unwrap(), -5);
    assert_eq!(read.remaining(), 0);
}

#[test]
fn test_clr_short_and_chunked() {
    let long: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
    let mut buf = WriteBuffer::new();
    buf.write_clr(b"short");
    buf.write_clr(&long);
    buf.write_clr(&[]);

    let bytes = buf.as_slice();
    assert_eq!(bytes[0], 5);
    assert_eq!(bytes[6], 0xFE);

    let mut read = ReadBuffer::from_slice(bytes);
    assert_eq!(read.read_clr().unwrap(), b"short".to_vec());
    assert_eq!(read.read_clr().unwrap(), long);
    assert!(read.read_clr().unwrap().is_empty());
    assert_eq!(read.remaining(), 0);
}

#[test]
fn test_big_chunks_need_matching_reader() {
    let data = vec![7u8; 300];
    let mut buf = WriteBuffer::with_options(StreamOptions::big_chunks());
    buf.write_clr(&data);
    // 0xFE, compressed length 300, data, terminator
    assert_eq!(&buf.as_slice()[..4], &[0xFE, 2, 1, 44]);

    let mut read = ReadBuffer::from_slice(buf.as_slice());
    read.set_options(StreamOptions::big_chunks());
    assert_eq!(read.read_clr().unwrap(), data);
}

#[test]
fn test_key_val_roundtrip() {
    let mut buf = WriteBuffer::new();
    buf.write_key_val_str("AUTH_SESSKEY", "ABCDEF", 1);
    buf.write_key_val(b"EMPTY", &[], 0);

    let mut read = ReadBuffer::from_slice(buf.as_slice());
    assert_eq!(
        read.read_key_val().unwrap(),
        (b"AUTH_SESSKEY".to_vec(), b"ABCDEF".to_vec(), 1)
    );
    assert_eq!(read.read_key_val().unwrap(), (b"EMPTY".to_vec(), Vec::new(), 0));
}

#[test]
fn test_underflow_reports_sizes() {
    let mut read = ReadBuffer::from_slice(&[1, 2]);
    assert!(matches!(
        read.read_u32_be(),
        Err(Error::BufferUnderflow { needed: 4, available: 2 })
    ));
}

#[test]
fn test_position_tracking() {
    let mut buf = ReadBuffer::from_vec(vec![1, 2, 3, 4, 5]);
    assert_eq!(buf.position(), 0);
    buf.read_u8().unwrap();
    buf.skip(2).unwrap();
    assert_eq!(buf.position(), 3);
    assert_eq!(buf.remaining(), 2);
    buf.set_position(1).unwrap();
    assert_eq!(buf.read_u8().unwrap(), 2);
    assert!(buf.set_position(6).is_err());
}

#[test]
fn test_write_buffer_patching() {
    let mut buf = WriteBuffer::new();
    let length_pos = buf.len();
    buf.write_u32_be(0);
    buf.write_bytes(&[1, 2, 3, 4, 5]);
    buf.patch_u32_be(length_pos, 5).unwrap();

    let mut read = ReadBuffer::from_slice(buf.as_slice());
    assert_eq!(read.read_u32_be().unwrap(), 5);
    assert_eq!(read.read_u8().unwrap(), 1);
}
