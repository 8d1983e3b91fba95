//! Thin demo CLI: runs a host with two TCP-backed channels, printing every
//! event it sees. Exercises `netfr-host` the way the teacher's
//! `util::test_listen` exercises a raw `mio::net::TcpListener`.

use clap::{App, Arg};
use netfr_fabric::tcp::TcpProvider;
use netfr_host::{Host, HostOptions};
use netfr_support::logging;
use std::thread;
use std::time::Duration;

fn main() {
    let matches = App::new("netfr-host-demo")
        .version("0.1.0")
        .author("Bush Hammer Industries")
        .about("Runs a two-channel relay host over TCP")
        .arg(Arg::with_name("PRIMARY_ADDR").help("Bind address for the primary (bulk) channel").required(true))
        .arg(Arg::with_name("SECONDARY_ADDR").help("Bind address for the secondary (messaging) channel").required(true))
        .arg(Arg::with_name("config").long("config").takes_value(true).help("TOML file overriding HostOptions"))
        .get_matches();

    let primary = matches.value_of("PRIMARY_ADDR").unwrap().to_owned();
    let secondary = matches.value_of("SECONDARY_ADDR").unwrap().to_owned();

    let logger = logging::init();
    let providers = vec![TcpProvider::new().expect("primary provider"), TcpProvider::new().expect("secondary provider")];

    let opts = match matches.value_of("config") {
        Some(path) => HostOptions::from_toml_file(path).expect("config file"),
        None => HostOptions::new(vec![primary, secondary]),
    };

    let mut host = Host::init(providers, opts, logger.clone()).expect("host init");

    loop {
        for (channel, event) in host.process().expect("process") {
            slog::info!(logger, "event"; "channel" => channel, "event" => ?event);
        }
        thread::sleep(Duration::from_millis(10));
    }
}
