//! Integration tests for the size handshake.
//!
//! Each test runs one real side of the protocol on loopback against a
//! hand-driven peer socket, so the peer can withhold, garble, or misdirect
//! replies and observe what the other side does next.

use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Duration;

use udp_window_ftp::{
    packet::{Packet, FRAME_LEN, SEQ_SIZE_ANNOUNCE, SEQ_TERMINATE},
    Receiver, Sender, Socket, TransferConfig,
};

const WAIT: Option<Duration> = Some(Duration::from_secs(2));

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

async fn bind() -> Socket {
    Socket::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap())
        .await
        .expect("bind loopback socket")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Silence, a wrong-sequence ack, and a garbled reply all leave the sender
/// announcing.  Data flows only after a valid seq −1 acknowledgment.
#[tokio::test]
async fn sender_waits_for_valid_size_ack() {
    let sender_sock = bind().await;
    let sender_addr = sender_sock.local_addr;
    let peer = bind().await;

    let data = b"hello over udp".to_vec();
    let len = data.len() as u64;
    let sender = Sender::new(
        sender_sock,
        peer.local_addr,
        Cursor::new(data.clone()),
        len,
        TransferConfig::default(),
    )
    .unwrap();
    let task = tokio::spawn(sender.run());

    // No reply at all: the sender's receive times out and it announces again.
    let (frame, _) = peer.recv_frame(WAIT).await.unwrap();
    assert_eq!(frame.seq, SEQ_SIZE_ANNOUNCE);
    assert_eq!(frame.announced_len(), len as i32);
    let (frame, _) = peer.recv_frame(WAIT).await.unwrap();
    assert_eq!(frame.seq, SEQ_SIZE_ANNOUNCE);

    // Wrong sequence number.
    peer.send_packet(&Packet::ack(7), sender_addr).await.unwrap();
    let (frame, _) = peer.recv_frame(WAIT).await.unwrap();
    assert_eq!(frame.seq, SEQ_SIZE_ANNOUNCE);

    // Garbage that fails the checksum.
    peer.send_raw(&[0xFF; FRAME_LEN], sender_addr).await.unwrap();
    let (frame, _) = peer.recv_frame(WAIT).await.unwrap();
    assert_eq!(frame.seq, SEQ_SIZE_ANNOUNCE);

    // Valid acknowledgment; drain any announcements already in flight.
    peer.send_packet(&Packet::ack(SEQ_SIZE_ANNOUNCE), sender_addr)
        .await
        .unwrap();
    let first_data = loop {
        let (frame, _) = peer.recv_frame(WAIT).await.unwrap();
        if frame.seq != SEQ_SIZE_ANNOUNCE {
            break frame;
        }
    };
    assert_eq!(first_data.seq, 1);
    assert_eq!(&first_data.payload[..data.len()], &data[..]);

    // Acknowledge data until the terminator shows up.
    peer.send_packet(&Packet::ack(1), sender_addr).await.unwrap();
    loop {
        let (frame, _) = peer.recv_frame(WAIT).await.unwrap();
        if frame.seq == SEQ_TERMINATE {
            break;
        }
        peer.send_packet(&Packet::ack(frame.seq), sender_addr)
            .await
            .unwrap();
    }

    let report = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("sender timed out")
        .expect("sender task panicked")
        .expect("sender failed");
    assert!(report.announcements >= 4, "{report:?}");
    assert_eq!(report.packets, 1);
}

/// An acknowledgment from an address other than the peer does not complete
/// the handshake.
#[tokio::test]
async fn sender_ignores_ack_from_stranger() {
    let sender_sock = bind().await;
    let sender_addr = sender_sock.local_addr;
    let peer = bind().await;
    let stranger = bind().await;

    let sender = Sender::new(
        sender_sock,
        peer.local_addr,
        Cursor::new(vec![1u8; 10]),
        10,
        TransferConfig::default(),
    )
    .unwrap();
    let task = tokio::spawn(sender.run());

    let (frame, _) = peer.recv_frame(WAIT).await.unwrap();
    assert_eq!(frame.seq, SEQ_SIZE_ANNOUNCE);

    stranger
        .send_packet(&Packet::ack(SEQ_SIZE_ANNOUNCE), sender_addr)
        .await
        .unwrap();
    for _ in 0..3 {
        let (frame, _) = peer.recv_frame(WAIT).await.unwrap();
        assert_eq!(frame.seq, SEQ_SIZE_ANNOUNCE);
    }

    task.abort();
}

/// Data before the size announcement and a negative announcement are both
/// ignored; the first acknowledgment the receiver sends is for seq −1.
#[tokio::test]
async fn receiver_acks_only_a_valid_announcement() {
    let server = bind().await;
    let client = bind().await;
    let client_addr = client.local_addr;

    let receiver = Receiver::new(client, server.local_addr, Cursor::new(Vec::new()));
    let task = tokio::spawn(receiver.run("greeting.txt"));

    let (request, from) = server.recv_raw().await.unwrap();
    assert_eq!(request, b"greeting.txt");
    assert_eq!(from, client_addr);

    server
        .send_packet(&Packet::data(1, b"early".to_vec()), client_addr)
        .await
        .unwrap();
    server
        .send_packet(&Packet::size_announcement(-5), client_addr)
        .await
        .unwrap();
    server
        .send_packet(&Packet::size_announcement(3), client_addr)
        .await
        .unwrap();

    let (ack, _) = server.recv_frame(WAIT).await.unwrap();
    assert_eq!(ack.seq, SEQ_SIZE_ANNOUNCE);

    server
        .send_packet(&Packet::data(1, b"abc".to_vec()), client_addr)
        .await
        .unwrap();
    let (ack, _) = server.recv_frame(WAIT).await.unwrap();
    assert_eq!(ack.seq, 1);

    server
        .send_packet(&Packet::terminator(), client_addr)
        .await
        .unwrap();

    let (report, sink) = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("receiver timed out")
        .expect("receiver task panicked")
        .expect("receiver failed");
    assert_eq!(report.total_len, 3);
    assert_eq!(report.acks_sent, 2);
    assert_eq!(sink.into_inner(), b"abc");
}
