//! Drives a full host/client session over in-process loopback providers:
//! connect handshake on both channels, a published region, a one-sided
//! write, and a credit-gated message exchange. Exercises the stack the way
//! the teacher exercises `net::channel::Channel` against an in-memory
//! transport rather than a live socket.

use netfr_client::{Client, ClientOptions};
use netfr_core::ChannelEvent;
use netfr_fabric::loopback;
use netfr_host::{Host, HostOptions};
use netfr_support::logging;

const PRIMARY: usize = 0;
const SECONDARY: usize = 1;

fn addrs() -> Vec<String> {
    vec!["primary".to_owned(), "secondary".to_owned()]
}

#[test]
fn connect_publish_write_and_message_roundtrip() {
    let (host_primary, client_primary) = loopback::pair();
    let (host_secondary, client_secondary) = loopback::pair();

    let mut host = Host::init(vec![host_primary, host_secondary], HostOptions::new(addrs()), logging::discard()).unwrap();
    let mut client =
        Client::init(vec![client_primary, client_secondary], ClientOptions::new(), &addrs(), logging::discard()).unwrap();

    client.session_init().unwrap();

    let mut host_events = Vec::new();
    let mut client_events = Vec::new();
    for _ in 0..4 {
        host_events.extend(host.process().unwrap());
        client_events.extend(client.process().unwrap());
    }

    assert!(host.client_count(PRIMARY).unwrap());
    assert!(host.client_count(SECONDARY).unwrap());
    assert!(client_events.iter().filter(|(_, e)| matches!(e, ChannelEvent::Connected)).count() >= 2);

    let region_index = client.attach_memory(PRIMARY, 4096).unwrap();
    for _ in 0..4 {
        host_events.extend(host.process().unwrap());
    }
    assert!(host_events.iter().any(|(c, e)| *c == PRIMARY && matches!(e, ChannelEvent::RegionPublished { .. })));

    let payload = b"bulk transfer payload".to_vec();
    host.write_buffer(PRIMARY, &payload).unwrap();

    let mut landed = None;
    for _ in 0..4 {
        host_events.extend(host.process().unwrap());
        for (channel, event) in client.process().unwrap() {
            if channel == PRIMARY {
                if let ChannelEvent::BufferLanded { index, offset, len, .. } = event {
                    landed = Some((index, offset, len));
                }
            }
        }
    }
    let (index, offset, len) = landed.expect("buffer update never arrived");
    assert_eq!(index, region_index);

    let data = client.read_data(PRIMARY, index, offset, len).unwrap();
    assert_eq!(data, payload);

    client.send_data(SECONDARY, b"hello host").unwrap();
    let mut received = None;
    for _ in 0..4 {
        for (channel, event) in host.process().unwrap() {
            if channel == SECONDARY {
                if let ChannelEvent::DataReceived { data, .. } = event {
                    received = Some(data);
                }
            }
        }
        client.process().unwrap();
    }
    assert_eq!(received.unwrap(), b"hello host");
}
