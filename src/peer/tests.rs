use super::*;
use crate::constants::{HANDSHAKE_LEN, MAX_FRAME_LEN};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

fn handshake() -> Handshake {
    Handshake::new([0xaa; 20], *b"-XX0100-abcdefghijkl")
}

fn stream_with(frames: &[RawMessage]) -> Vec<u8> {
    let mut stream = handshake().encode().to_vec();
    for frame in frames {
        stream.extend_from_slice(frame.as_bytes());
    }
    stream
}

fn feed_bytewise(stream: &[u8]) -> WireProtocol {
    let mut wire = WireProtocol::new();
    for byte in stream {
        wire.consume(std::slice::from_ref(byte));
    }
    wire
}

#[test]
fn test_peer_id_generate() {
    let id1 = PeerId::generate();
    let id2 = PeerId::generate();
    assert_ne!(id1.0, id2.0);
    assert_eq!(id1.client_id(), Some("BP0001"));
}

#[test]
fn test_peer_id_seeded() {
    let a = PeerId::generate_with(&mut StdRng::seed_from_u64(1));
    let b = PeerId::generate_with(&mut StdRng::seed_from_u64(1));
    assert_eq!(a, b);
    assert_eq!(&a.as_bytes()[..8], b"-BP0001-");
    assert!(PeerId::from_bytes(&[0u8; 19]).is_none());
}

#[test]
fn test_handshake_encode_decode() {
    let handshake = handshake();
    let encoded = handshake.encode();
    assert_eq!(encoded.len(), HANDSHAKE_LEN);
    assert_eq!(encoded[0], 19);
    assert_eq!(&encoded[1..20], b"BitTorrent protocol");

    let decoded = Handshake::decode(&encoded).unwrap();
    assert_eq!(decoded, handshake);
    assert!(!decoded.supports_extension_protocol());
    assert!(!decoded.supports_fast_extension());
    assert!(!decoded.supports_dht());
}

#[test]
fn test_handshake_reserved_bits() {
    let mut reserved = [0u8; 8];
    reserved[5] = 0x10;
    reserved[7] = 0x05;
    let decoded = Handshake::decode(&handshake().with_reserved(reserved).encode()).unwrap();

    assert!(decoded.supports_extension_protocol());
    assert!(decoded.supports_fast_extension());
    assert!(decoded.supports_dht());
}

#[test]
fn test_handshake_decode_rejects() {
    let encoded = handshake().encode();
    assert!(matches!(
        Handshake::decode(&encoded[..67]),
        Err(PeerError::InvalidHandshake)
    ));

    let mut bad = encoded.to_vec();
    bad[0] = 18;
    assert!(matches!(Handshake::decode(&bad), Err(PeerError::InvalidHandshake)));

    let mut bad = encoded.to_vec();
    bad[5] = b'X';
    assert!(matches!(Handshake::decode(&bad), Err(PeerError::InvalidHandshake)));
}

#[test]
fn test_raw_message_layout() {
    let keep_alive = RawMessage::keep_alive();
    assert!(keep_alive.is_keep_alive());
    assert_eq!(keep_alive.as_bytes(), &[0, 0, 0, 0]);
    assert_eq!(keep_alive.id(), None);
    assert!(keep_alive.payload().is_empty());
    assert!(keep_alive.body().is_empty());

    let request = RawMessage::new(6, &[0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0x40, 0]);
    assert!(!request.is_keep_alive());
    assert_eq!(request.len(), 17);
    assert_eq!(&request.as_bytes()[..4], &[0, 0, 0, 13]);
    assert_eq!(request.id(), Some(6));
    assert_eq!(request.payload().len(), 13);
    assert_eq!(request.body().len(), 12);
}

#[test]
fn test_handshake_and_keep_alives_any_chunking() {
    let stream = stream_with(&[RawMessage::keep_alive(), RawMessage::keep_alive()]);
    assert_eq!(stream.len(), 76);

    let mut whole = WireProtocol::new();
    whole.consume(&stream);

    let bytewise = feed_bytewise(&stream);

    for wire in [&whole, &bytewise] {
        assert_eq!(wire.state(), WireState::Connected);
        assert_eq!(wire.handshake(), Some(&handshake()));
        assert_eq!(wire.messages().len(), 2);
        assert!(wire.messages().iter().all(RawMessage::is_keep_alive));
        assert_eq!(wire.buffered(), 0);
    }
    assert_eq!(whole.messages(), bytewise.messages());
}

#[test]
fn test_mixed_chunk_sizes_agree() {
    let stream = stream_with(&[
        RawMessage::new(1, &[]),
        RawMessage::new(4, &9u32.to_be_bytes()),
        RawMessage::keep_alive(),
        RawMessage::new(7, &[0xee; 300]),
    ]);
    let reference = feed_bytewise(&stream);

    for size in [2, 3, 7, 64, 69, 1000] {
        let mut wire = WireProtocol::new();
        for chunk in stream.chunks(size) {
            wire.consume(chunk);
        }
        assert_eq!(wire.state(), reference.state(), "chunk size {}", size);
        assert_eq!(wire.handshake(), reference.handshake());
        assert_eq!(wire.messages(), reference.messages());
    }

    let ids: Vec<_> = reference.messages().iter().map(RawMessage::id).collect();
    assert_eq!(ids, vec![Some(1), Some(4), None, Some(7)]);
    assert_eq!(reference.messages()[3].body(), &[0xee; 300][..]);
}

#[test]
fn test_handshake_waits_for_full_length() {
    let encoded = handshake().encode();
    let mut wire = WireProtocol::new();

    wire.consume(&encoded[..67]);
    assert_eq!(wire.state(), WireState::WantHandshake);
    assert!(wire.handshake().is_none());

    wire.consume(&encoded[67..]);
    assert_eq!(wire.state(), WireState::Connected);
}

#[test]
fn test_partial_frame_retained() {
    let mut wire = WireProtocol::new();
    wire.consume(&handshake().encode());

    let have = RawMessage::new(4, &3u32.to_be_bytes());
    wire.consume(&have.as_bytes()[..6]);
    assert!(wire.messages().is_empty());
    assert_eq!(wire.buffered(), 6);

    wire.consume(&have.as_bytes()[6..]);
    assert_eq!(wire.messages(), &[have]);
    assert_eq!(wire.buffered(), 0);
}

#[test]
fn test_bad_magic_is_terminal() {
    let mut stream = stream_with(&[RawMessage::keep_alive()]);
    stream[0] = b'X';

    let mut wire = WireProtocol::new();
    wire.consume(&stream);
    assert_eq!(wire.state(), WireState::Error);
    assert_eq!(wire.error(), Some(&ProtocolViolation::BadHandshake));
    assert!(wire.handshake().is_none());

    wire.consume(&stream_with(&[RawMessage::keep_alive()]));
    assert_eq!(wire.state(), WireState::Error);
    assert!(wire.handshake().is_none());
    assert!(wire.messages().is_empty());
    assert_eq!(wire.buffered(), 0);
}

#[test]
fn test_bad_magic_bytewise_is_terminal() {
    let mut stream = stream_with(&[RawMessage::keep_alive()]);
    stream[3] = b'?';

    let wire = feed_bytewise(&stream);
    assert_eq!(wire.state(), WireState::Error);
    assert!(wire.messages().is_empty());
}

#[test]
fn test_oversized_frame_is_terminal() {
    let mut stream = stream_with(&[RawMessage::new(2, &[])]);
    stream.extend_from_slice(&((MAX_FRAME_LEN + 1) as u32).to_be_bytes());
    stream.extend_from_slice(RawMessage::keep_alive().as_bytes());

    let mut wire = WireProtocol::new();
    wire.consume(&stream);
    assert_eq!(wire.state(), WireState::Error);
    assert_eq!(
        wire.error(),
        Some(&ProtocolViolation::FrameTooLarge(MAX_FRAME_LEN + 1))
    );
    assert_eq!(wire.messages().len(), 1);

    wire.consume(RawMessage::keep_alive().as_bytes());
    assert_eq!(wire.messages().len(), 1);

    let bytewise = feed_bytewise(&stream);
    assert_eq!(bytewise.state(), WireState::Error);
    assert_eq!(bytewise.messages(), wire.messages());
}

#[test]
fn test_take_messages_drains() {
    let mut wire = WireProtocol::new();
    wire.consume(&stream_with(&[RawMessage::keep_alive(), RawMessage::new(0, &[])]));

    let taken = wire.take_messages();
    assert_eq!(taken.len(), 2);
    assert!(wire.messages().is_empty());

    wire.consume(RawMessage::new(1, &[]).as_bytes());
    assert_eq!(wire.messages().len(), 1);
}

#[tokio::test]
async fn test_transport_exchange() {
    let (local, mut remote) = duplex(1024);
    let mut transport = PeerTransport::new(local);

    transport.send_handshake(&handshake()).await.unwrap();
    let mut sent = [0u8; HANDSHAKE_LEN];
    remote.read_exact(&mut sent).await.unwrap();
    assert_eq!(Handshake::decode(&sent).unwrap(), handshake());

    remote
        .write_all(&stream_with(&[RawMessage::new(5, &[0xff]), RawMessage::keep_alive()]))
        .await
        .unwrap();

    assert_eq!(transport.receive_handshake().await.unwrap(), handshake());
    assert_eq!(transport.receive_message().await.unwrap().id(), Some(5));
    assert!(transport.receive_message().await.unwrap().is_keep_alive());

    transport.send_message(&RawMessage::new(2, &[])).await.unwrap();
    let mut frame = [0u8; 5];
    remote.read_exact(&mut frame).await.unwrap();
    assert_eq!(frame, [0, 0, 0, 1, 2]);
}

#[tokio::test]
async fn test_transport_split_writes() {
    let (local, mut remote) = duplex(1024);
    let mut transport = PeerTransport::new(local);

    let stream = stream_with(&[RawMessage::new(3, &[])]);
    tokio::spawn(async move {
        for chunk in stream.chunks(5) {
            remote.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
        remote
    });

    assert_eq!(transport.receive_handshake().await.unwrap(), handshake());
    assert_eq!(transport.receive_message().await.unwrap().id(), Some(3));
}

#[tokio::test]
async fn test_transport_surfaces_protocol_error() {
    let (local, mut remote) = duplex(1024);
    let mut transport = PeerTransport::new(local);

    remote.write_all(&[0u8; HANDSHAKE_LEN]).await.unwrap();

    let err = transport.receive_handshake().await.unwrap_err();
    assert!(matches!(
        err,
        PeerError::Protocol(ProtocolViolation::BadHandshake)
    ));
    assert_eq!(transport.protocol().state(), WireState::Error);

    let err = transport.receive_message().await.unwrap_err();
    assert!(matches!(err, PeerError::Protocol(_)));
}

#[tokio::test]
async fn test_transport_connection_closed() {
    let (local, remote) = duplex(64);
    let mut transport = PeerTransport::new(local);
    drop(remote);

    assert!(matches!(
        transport.receive_handshake().await,
        Err(PeerError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_connect_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut transport = PeerTransport::new(stream);
        let theirs = transport.receive_handshake().await.unwrap();
        transport
            .send_handshake(&Handshake::new(theirs.info_hash, [9u8; 20]))
            .await
            .unwrap();
        transport.send_message(&RawMessage::keep_alive()).await.unwrap();
        transport
    });

    let ours = handshake();
    let (mut transport, theirs) = PeerTransport::connect(addr, &ours).await.unwrap();
    assert_eq!(theirs.peer_id, [9u8; 20]);
    assert!(transport.receive_message().await.unwrap().is_keep_alive());
    assert_eq!(transport.peer_addr().unwrap(), addr);

    server.await.unwrap();
}

#[tokio::test]
async fn test_connect_rejects_other_torrent() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut transport = PeerTransport::new(stream);
        transport.receive_handshake().await.unwrap();
        transport
            .send_handshake(&Handshake::new([0x55; 20], [9u8; 20]))
            .await
            .unwrap();
        transport
    });

    let result = PeerTransport::connect(addr, &handshake()).await;
    assert!(matches!(result, Err(PeerError::InfoHashMismatch)));
}

#[tokio::test]
async fn test_connect_times_out_on_silent_peer() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Accepts the connection but never answers the handshake.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let started = Instant::now();
    let result = PeerTransport::connect_within(
        addr,
        &handshake(),
        Duration::from_secs(1),
        Duration::from_millis(50),
    )
    .await;

    assert!(matches!(result, Err(PeerError::Timeout)));
    assert!(started.elapsed() < Duration::from_secs(2));
    server.abort();
}

#[test]
fn test_peer_id_display() {
    let mut bytes = *b"-BP0001-";
    let id = PeerId::from_bytes(&[&bytes[..], &[0xab; 12][..]].concat()).unwrap();
    assert_eq!(id.to_string(), format!("-BP0001-{}", "ab".repeat(12)));

    bytes[0] = b'x';
    let mut raw = [0u8; 20];
    raw[..8].copy_from_slice(&bytes);
    assert_eq!(PeerId(raw).to_string().len(), 40);
}
