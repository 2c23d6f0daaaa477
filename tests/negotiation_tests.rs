//! TCP and data-type negotiation against hand-built server replies

mod common;

use common::*;
use oracle_tns::constants::charset;
use oracle_tns::{Error, Session};

#[tokio::test]
async fn test_protocol_negotiation() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut stream = accept_client(&listener, 8192).await;
        let request = read_request(&mut stream, 8192).await;
        send_data(&mut stream, &protocol_reply(6, &server_compile_caps(6))).await;
        request
    });

    let mut session = Session::new(config(port));
    session.connect().await.unwrap();
    oracle_tns::messages::negotiate_protocol(&mut session).await.unwrap();

    let caps = session.capabilities();
    assert_eq!(caps.protocol_server_version, 6);
    assert_eq!(caps.server_compile_version, 8100);
    assert_eq!(caps.server_banner, "x86_64/Linux 2.4.xx");
    assert_eq!(caps.charset_id, charset::AL32UTF8);
    assert_eq!(caps.ncharset_id, charset::AL16UTF16);
    assert_eq!(caps.server_flags, 3);
    assert!(caps.has_eos);
    assert!(caps.has_fsap);
    assert_eq!(caps.server_runtime_caps, vec![2, 1]);

    let request = server.await.unwrap();
    assert_eq!(&request[..3], &[1, 6, 0]);
    assert_eq!(request.last(), Some(&0));
}

#[tokio::test]
async fn test_unsupported_server_version() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut stream = accept_client(&listener, 8192).await;
        read_request(&mut stream, 8192).await;
        send_data(&mut stream, &protocol_reply(3, &server_compile_caps(6))).await;
    });

    let mut session = Session::new(config(port));
    session.connect().await.unwrap();
    let err = oracle_tns::messages::negotiate_protocol(&mut session).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedServerVersion(3)));
    server.await.unwrap();
}

#[tokio::test]
async fn test_data_types_negotiation() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut stream = accept_client(&listener, 8192).await;
        read_request(&mut stream, 8192).await;
        send_data(&mut stream, &protocol_reply(6, &server_compile_caps(6))).await;
        let request = read_request(&mut stream, 8192).await;
        send_data(&mut stream, &data_types_reply()).await;
        request
    });

    let session = negotiated_session(port).await;
    let caps = session.capabilities();
    assert_eq!(caps.ttc_version, 6);
    assert!(caps.use_big_clr_chunks);
    assert!(caps.uses_ub2_type_reps());
    assert_eq!(caps.db_timezone.len(), 11);

    let request = server.await.unwrap();
    assert_eq!(request[0], 2);
    assert_eq!(&request[1..5], &[0, 0, 0, 0]);
    assert_eq!(request[5], 3);
    assert_eq!(request[6] as usize, caps.compile_caps.len());
    // the two-byte type-rep table ends with a zero entry
    assert_eq!(&request[request.len() - 2..], &[0, 0]);
}

#[tokio::test]
async fn test_short_server_caps_disable_big_chunks() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut stream = accept_client(&listener, 8192).await;
        read_request(&mut stream, 8192).await;
        let mut short = server_compile_caps(6);
        short.truncate(30);
        send_data(&mut stream, &protocol_reply(6, &short)).await;
        read_request(&mut stream, 8192).await;
        // time zone without the big-chunk word
        let mut reply = vec![2u8];
        reply.extend_from_slice(&[0x80, 0, 0, 0, 0x3c, 0x3c, 0x80, 0, 0, 0, 0]);
        reply.extend_from_slice(&[0, 1, 0, 1, 0, 1, 0, 0, 0, 0]);
        send_data(&mut stream, &reply).await;
    });

    let session = negotiated_session(port).await;
    let caps = session.capabilities();
    assert!(!caps.use_big_clr_chunks);
    assert!(caps.uses_ub2_type_reps());
    assert_eq!(caps.compile_caps[37], 0);
    assert_eq!(caps.ttc_version, 6);
    server.await.unwrap();
}
