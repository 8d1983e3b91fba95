//! Thin demo CLI: connects a two-channel client to a running
//! `netfr-host-demo`, publishes a small buffer, and streams a counter on
//! the messaging channel.

use clap::{App, Arg};
use netfr_fabric::tcp::TcpProvider;
use netfr_client::{Client, ClientOptions};
use netfr_support::logging;
use std::thread;
use std::time::Duration;

const PRIMARY: usize = 0;
const SECONDARY: usize = 1;

fn main() {
    let matches = App::new("netfr-client-demo")
        .version("0.1.0")
        .author("Bush Hammer Industries")
        .about("Connects to a netfr host over TCP and exchanges data")
        .arg(Arg::with_name("PRIMARY_ADDR").help("Host address for the primary (bulk) channel").required(true))
        .arg(Arg::with_name("SECONDARY_ADDR").help("Host address for the secondary (messaging) channel").required(true))
        .arg(Arg::with_name("config").long("config").takes_value(true).help("TOML file overriding ClientOptions"))
        .get_matches();

    let primary = matches.value_of("PRIMARY_ADDR").unwrap().to_owned();
    let secondary = matches.value_of("SECONDARY_ADDR").unwrap().to_owned();

    let logger = logging::init();
    let providers = vec![TcpProvider::new().expect("primary provider"), TcpProvider::new().expect("secondary provider")];

    let opts = match matches.value_of("config") {
        Some(path) => ClientOptions::from_toml_file(path).expect("config file"),
        None => ClientOptions::new(),
    };

    let mut client = Client::init(providers, opts, &[primary, secondary], logger.clone()).expect("client init");
    client.session_init().expect("session init");

    let mut region_index = None;
    let mut counter: u32 = 0;

    loop {
        for (channel, event) in client.process().expect("process") {
            slog::info!(logger, "event"; "channel" => channel, "event" => ?event);
            if channel == PRIMARY && region_index.is_none() {
                region_index = client.attach_memory(PRIMARY, 64 * 1024).ok();
            }
        }

        if client.send_data(SECONDARY, format!("tick {}", counter).as_bytes()).is_ok() {
            counter += 1;
        }

        thread::sleep(Duration::from_millis(10));
    }
}
