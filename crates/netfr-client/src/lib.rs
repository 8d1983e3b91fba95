//! Client public API (spec §4.8): owns one [`Channel`] per element of
//! `N_CHANNELS` and drives each through the connect handshake before
//! handing control to `process()`.

use netfr_core::api;
use netfr_core::{Channel, ChannelEvent, Role};
use netfr_fabric::FabricProvider;
use netfr_proto::hello::encode_client_hello;
use netfr_support::constants::N_CHANNELS;
use netfr_support::error::{NetfrError, NetfrResult};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::fs;

/// Client-side configuration, loadable from a TOML file via
/// [`ClientOptions::from_toml_file`]. Peer addresses are supplied
/// separately to [`Client::init`], not carried here — spec §4.8 treats
/// `init(opts, peerAddrs)` as two distinct parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Sets `RDMAV_HUGEPAGES_SAFE=1` before opening the fabric, for
    /// providers backed by huge-page-registered memory.
    #[serde(default)]
    pub huge_pages: bool,
}

impl ClientOptions {
    pub fn new() -> ClientOptions {
        ClientOptions { huge_pages: false }
    }

    pub fn from_toml_file(path: &str) -> NetfrResult<ClientOptions> {
        let contents = fs::read_to_string(path)?;
        serdeconv::from_toml_str(&contents).map_err(|_| NetfrError::BadMessage { reason: "malformed client config file" })
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions::new()
    }
}

pub struct Client<P: FabricProvider> {
    channels: Vec<Channel<P>>,
    peer_addrs: Vec<String>,
}

impl<P: FabricProvider> Client<P> {
    pub fn init(providers: Vec<P>, opts: ClientOptions, peer_addrs: &[String], logger: Logger) -> NetfrResult<Client<P>> {
        if providers.len() != N_CHANNELS || peer_addrs.len() != N_CHANNELS {
            return Err(NetfrError::BadMessage { reason: "expected exactly N_CHANNELS providers and addresses" });
        }
        if opts.huge_pages {
            std::env::set_var("RDMAV_HUGEPAGES_SAFE", "1");
        }
        let channels = providers
            .into_iter()
            .map(|provider| Channel::new(provider, Role::Client, logger.clone()))
            .collect();
        Ok(Client { channels, peer_addrs: peer_addrs.to_vec() })
    }

    /// Initiates the connect handshake on every channel against its
    /// corresponding peer address from `init`. Completion
    /// (`ChannelEvent::Connected` or `ConnectFailed`) arrives through a
    /// later `process()` call.
    pub fn session_init(&mut self) -> NetfrResult<()> {
        for (channel, addr) in self.channels.iter_mut().zip(self.peer_addrs.iter()) {
            channel.provider.open_fabric()?;
            channel.client_conn.ready()?;
            channel.client_conn.begin_connecting()?;
            let conn = channel.provider.connect(addr, &encode_client_hello())?;
            channel.conn = Some(conn);
        }
        Ok(())
    }

    /// Drains fabric events on every channel: connection-manager replies
    /// advance the connection state machine, send/write/recv completions
    /// release their contexts and re-arm receives, and decoded messages
    /// become [`ChannelEvent`]s for the caller.
    pub fn process(&mut self) -> NetfrResult<Vec<(usize, ChannelEvent)>> {
        let mut out = Vec::new();
        for (index, channel) in self.channels.iter_mut().enumerate() {
            for event in api::process(channel)? {
                out.push((index, event));
            }
        }
        Ok(out)
    }

    /// Implements spec §4.8's single-event `process_one`, scoped to one
    /// channel (`Some(n)`) or the first channel with anything pending
    /// (`None`, the spec's `channel == -1`).
    pub fn process_one(&mut self, channel: Option<usize>) -> NetfrResult<Option<(usize, ChannelEvent)>> {
        match channel {
            Some(index) => Ok(api::process_one(self.channel_mut(index)?)?.map(|event| (index, event))),
            None => {
                for (index, channel) in self.channels.iter_mut().enumerate() {
                    if let Some(event) = api::process_one(channel)? {
                        return Ok(Some((index, event)));
                    }
                }
                Ok(None)
            }
        }
    }

    pub fn attach_memory(&mut self, channel: usize, size: usize) -> NetfrResult<usize> {
        api::attach_memory(self.channel_mut(channel)?, size)
    }

    pub fn write_buffer(&mut self, channel: usize, data: &[u8]) -> NetfrResult<()> {
        api::write_buffer(self.channel_mut(channel)?, data)
    }

    pub fn read_data(&mut self, channel: usize, index: usize, offset: u32, len: u32) -> NetfrResult<Vec<u8>> {
        api::read_data(self.channel_mut(channel)?, index, offset, len)
    }

    pub fn send_data(&mut self, channel: usize, payload: &[u8]) -> NetfrResult<()> {
        api::send_data(self.channel_mut(channel)?, payload)
    }

    fn channel_mut(&mut self, channel: usize) -> NetfrResult<&mut Channel<P>> {
        self.channels.get_mut(channel).ok_or(NetfrError::BadMessage { reason: "channel index out of range" })
    }
}
