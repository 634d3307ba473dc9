//! End-to-end client/server behavior over loopback.

mod common;

use common::{
    client, client_with, loopback, pump_for, pump_until, server_port, start_server, Mode,
    ServerEvent,
};
use kiln_networking::{
    Address, ClientConfig, ClientState, NetError, NetResult, Packet, PacketType, Resolver,
    ServerState, Socket, SocketKind,
};

#[test]
fn test_echo_round_trip() {
    let mut server = start_server(Mode::Echo, 8);
    let mut client = client();
    client.connect("127.0.0.1", server_port(&server)).unwrap();

    pump_until("connection", || {
        server.update();
        client.update();
        client.state() == ClientState::Connected && server.peer_count() == 1
    });
    assert_eq!(client.handler().connected, 1);

    assert!(client.send_data(&[0x41, 0x42, 0x43]));
    pump_until("echo", || {
        client.update();
        server.update();
        client.handler().received.len() >= 3
    });

    let peer = server.handler().connected()[0];
    assert_eq!(server.handler().bytes_from(peer), vec![0x41, 0x42, 0x43]);
    assert_eq!(client.handler().received, vec![0x41, 0x42, 0x43]);
    assert!(client.handler().errors.is_empty());
}

#[test]
fn test_graceful_client_close() {
    let mut server = start_server(Mode::Record, 8);
    let mut client = client();
    client.connect("127.0.0.1", server_port(&server)).unwrap();

    pump_until("connection", || {
        server.update();
        client.update();
        client.state() == ClientState::Connected && server.peer_count() == 1
    });
    let peer = server.handler().connected()[0];

    client.disconnect().unwrap();
    client.update();
    assert_eq!(client.state(), ClientState::Disconnected);
    assert_eq!(client.handler().disconnected, vec![Ok(())]);

    pump_until("peer removal", || {
        server.update();
        !server.handler().disconnected().is_empty()
    });
    pump_for(5, || server.update());

    assert_eq!(server.handler().disconnected(), vec![(peer, Ok(()))]);
    assert_eq!(server.peer_count(), 0);
}

#[test]
fn test_server_disconnects_client() {
    let mut server = start_server(Mode::Record, 8);
    let mut client = client();
    client.connect("127.0.0.1", server_port(&server)).unwrap();

    pump_until("connection", || {
        server.update();
        client.update();
        client.state() == ClientState::Connected && server.peer_count() == 1
    });
    let peer = server.handler().connected()[0];

    server.disconnect_client(peer).unwrap();
    assert!(!server.send_data(peer, b"too late"));

    pump_until("client notices close", || {
        server.update();
        client.update();
        client.state() == ClientState::Disconnected
    });
    assert_eq!(server.handler().disconnected(), vec![(peer, Ok(()))]);
    assert_eq!(client.handler().disconnected, vec![Ok(())]);
    assert!(client.handler().errors.is_empty());
}

struct ListResolver(Vec<Address>);

impl Resolver for ListResolver {
    fn resolve(&self, _host: &str, _port: u16, _kind: SocketKind) -> NetResult<Vec<Address>> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_fail_over_to_second_address() {
    let mut server = start_server(Mode::Record, 8);

    // Bound but not listening: connecting to it is refused.
    let mut refusing = Socket::create(SocketKind::Tcp, false).unwrap();
    refusing.bind(&loopback(0)).unwrap();
    let dead = refusing.local_address().unwrap().clone();

    let resolver = ListResolver(vec![dead, loopback(server_port(&server))]);
    let mut client = client().with_resolver(resolver);
    client.connect("kiln.test", server_port(&server)).unwrap();

    pump_until("fail-over connection", || {
        server.update();
        client.update();
        client.state() == ClientState::Connected
    });
    pump_for(5, || {
        server.update();
        client.update();
    });

    assert_eq!(client.state(), ClientState::Connected);
    assert_eq!(client.handler().connected, 1);
    assert!(client.handler().errors.is_empty());
    assert_eq!(client.remote_address().unwrap().port(), server_port(&server));
}

#[test]
fn test_send_back_pressure() {
    let mut server = start_server(Mode::Record, 8);
    let config = ClientConfig {
        send_buffer_size: 16,
        ..ClientConfig::default()
    };
    let mut client = client_with(config);
    client.connect("127.0.0.1", server_port(&server)).unwrap();

    pump_until("connection", || {
        server.update();
        client.update();
        client.state() == ClientState::Connected && server.peer_count() == 1
    });

    let first: Vec<u8> = (0..10).collect();
    assert!(client.send_data(&first));
    assert!(!client.send_data(&[0xEE; 10]));
    assert_eq!(client.pending_send(), 10);

    let peer = server.handler().connected()[0];
    pump_until("first payload", || {
        client.update();
        server.update();
        server.handler().bytes_from(peer).len() >= 10
    });
    pump_for(5, || {
        client.update();
        server.update();
    });

    assert_eq!(server.handler().bytes_from(peer), first);
    assert_eq!(client.pending_send(), 0);
}

#[test]
fn test_send_queued_while_connecting() {
    let mut server = start_server(Mode::Record, 8);
    let mut client = client();
    client.connect("127.0.0.1", server_port(&server)).unwrap();
    assert!(!client.send_data(b"not yet"));

    client.update();
    assert!(matches!(
        client.state(),
        ClientState::Connecting | ClientState::Connected
    ));
    assert!(client.send_data(b"queued"));

    pump_until("queued bytes", || {
        server.update();
        client.update();
        server
            .handler()
            .connected()
            .first()
            .is_some_and(|peer| server.handler().bytes_from(*peer) == b"queued")
    });
}

#[test]
fn test_max_peers_rejects_extra_connection() {
    let mut server = start_server(Mode::Record, 2);
    let port = server_port(&server);

    let mut clients: Vec<_> = (0..3).map(|_| client()).collect();
    for client in &mut clients {
        client.connect("127.0.0.1", port).unwrap();
    }

    // The OS completes every handshake; the server closes the third.
    pump_until("rejected client to be closed", || {
        server.update();
        for client in &mut clients {
            client.update();
        }
        clients
            .iter()
            .filter(|client| !client.handler().disconnected.is_empty())
            .count()
            == 1
    });
    pump_for(10, || {
        server.update();
        for client in &mut clients {
            client.update();
        }
    });

    assert_eq!(server.handler().connected().len(), 2);
    assert_eq!(server.peer_count(), 2);
    assert!(server.handler().disconnected().is_empty());
    let still_connected = clients
        .iter()
        .filter(|client| client.state() == ClientState::Connected)
        .count();
    assert_eq!(still_connected, 2);
}

#[test]
fn test_stop_releases_every_peer_before_stopping() {
    let mut server = start_server(Mode::Record, 8);
    let port = server_port(&server);

    let mut clients: Vec<_> = (0..3).map(|_| client()).collect();
    for client in &mut clients {
        client.connect("127.0.0.1", port).unwrap();
    }
    pump_until("three peers", || {
        server.update();
        for client in &mut clients {
            client.update();
        }
        server.peer_count() == 3
    });

    server.stop().unwrap();
    assert_eq!(server.state(), ServerState::ShuttingDown);
    let first = server.handler().connected()[0];
    assert!(!server.send_data(first, b"closing"));
    server.update();
    assert_eq!(server.state(), ServerState::Stopped);

    let events = &server.handler().events;
    let tail = &events[events.len() - 4..];
    for event in &tail[..3] {
        assert!(matches!(event, ServerEvent::Disconnected(_, Ok(()))), "{event:?}");
    }
    assert_eq!(tail[3], ServerEvent::Stopped(Ok(())));
    assert_eq!(server.handler().disconnected().len(), 3);

    pump_until("clients notice shutdown", || {
        for client in &mut clients {
            client.update();
        }
        clients
            .iter()
            .all(|client| client.state() == ClientState::Disconnected)
    });
}

#[test]
fn test_peer_ids_strictly_increase() {
    let mut server = start_server(Mode::Record, 1);
    let port = server_port(&server);

    for round in 1..=3 {
        let mut client = client();
        client.connect("127.0.0.1", port).unwrap();
        pump_until("connection", || {
            server.update();
            client.update();
            server.handler().connected().len() == round
        });
        client.disconnect().unwrap();
        client.update();
        pump_until("removal", || {
            server.update();
            server.peer_count() == 0
        });
    }

    let ids = server.handler().connected();
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "{ids:?}");
    assert!(ids.iter().all(|id| !id.is_invalid()));
}

#[test]
fn test_partial_frames_stay_buffered() {
    let mut server = start_server(Mode::Frames, 8);
    let mut client = client();
    client.connect("127.0.0.1", server_port(&server)).unwrap();
    pump_until("connection", || {
        server.update();
        client.update();
        client.state() == ClientState::Connected && server.peer_count() == 1
    });

    let packet = Packet::with_payload(PacketType(3), b"hello, frames");
    let bytes = packet.to_bytes().unwrap();
    let (head, tail) = bytes.split_at(5);

    assert!(client.send_data(head));
    pump_for(20, || {
        client.update();
        server.update();
    });
    assert!(server.handler().frames().is_empty());

    assert!(client.send_data(tail));
    pump_until("whole frame", || {
        client.update();
        server.update();
        !server.handler().frames().is_empty()
    });
    assert_eq!(server.handler().frames(), vec![packet]);
}

#[test]
fn test_connect_to_closed_port_reports_failure() {
    common::init();
    let mut refusing = Socket::create(SocketKind::Tcp, false).unwrap();
    refusing.bind(&loopback(0)).unwrap();
    let port = refusing.local_address().unwrap().port();

    let mut client = client();
    client.connect("127.0.0.1", port).unwrap();
    pump_until("failure", || {
        client.update();
        client.state() == ClientState::Disconnected
    });

    assert_eq!(client.handler().errors, vec![NetError::ConnectFailed]);
    assert_eq!(client.handler().disconnected, vec![Err(NetError::ConnectFailed)]);

    // A failed client can try again
    assert!(client.connect("127.0.0.1", port).is_ok());
}

#[test]
fn test_unanswered_connect_stays_connecting_until_disconnect() {
    common::init();
    // A listener that never accepts: once its queue is full the OS ignores
    // further handshakes, so the next connect never completes.
    let mut silent = Socket::create(SocketKind::Tcp, false).unwrap();
    silent.bind(&loopback(0)).unwrap();
    silent.listen(0).unwrap();
    let port = silent.local_address().unwrap().port();

    let mut fillers = Vec::new();
    for _ in 0..4 {
        let mut filler = Socket::create(SocketKind::Tcp, false).unwrap();
        match filler.connect(&loopback(port)) {
            Ok(()) | Err(NetError::WouldBlock) => {}
            Err(err) => panic!("filler connect failed: {err}"),
        }
        fillers.push(filler);
    }
    pump_for(50, || {
        for filler in &mut fillers {
            let _ = filler.check_connect();
        }
    });

    let mut client = client();
    client.connect("127.0.0.1", port).unwrap();
    pump_for(500, || client.update());

    assert_eq!(client.state(), ClientState::Connecting);
    assert!(client.handler().errors.is_empty());
    assert!(client.handler().disconnected.is_empty());
    assert_eq!(client.handler().connected, 0);

    client.disconnect().unwrap();
    client.update();
    assert_eq!(client.state(), ClientState::Disconnected);
    assert_eq!(client.handler().disconnected, vec![Ok(())]);
    assert!(client.handler().errors.is_empty());
}
