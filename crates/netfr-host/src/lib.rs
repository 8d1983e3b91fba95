//! Host public API (spec §4.8): owns one [`Channel`] per element of
//! `N_CHANNELS`, each listening independently for its one permitted client.

use netfr_core::api;
use netfr_core::{Channel, ChannelEvent, Role};
use netfr_fabric::FabricProvider;
use netfr_support::constants::N_CHANNELS;
use netfr_support::error::{NetfrError, NetfrResult};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::fs;

/// Host-side configuration, loadable from a TOML file via
/// [`HostOptions::from_toml_file`] the way the teacher's binaries load
/// their `sloggers`/`serdeconv`-backed config structs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostOptions {
    /// One listen address per element of `N_CHANNELS`, primary first.
    pub listen_addrs: Vec<String>,
    /// Sets `RDMAV_HUGEPAGES_SAFE=1` before opening the fabric, for
    /// providers backed by huge-page-registered memory.
    #[serde(default)]
    pub huge_pages: bool,
}

impl HostOptions {
    pub fn new(listen_addrs: Vec<String>) -> HostOptions {
        HostOptions { listen_addrs, huge_pages: false }
    }

    pub fn from_toml_file(path: &str) -> NetfrResult<HostOptions> {
        let contents = fs::read_to_string(path)?;
        serdeconv::from_toml_str(&contents).map_err(|_| NetfrError::BadMessage { reason: "malformed host config file" })
    }
}

pub struct Host<P: FabricProvider> {
    channels: Vec<Channel<P>>,
}

impl<P: FabricProvider> Host<P> {
    /// Takes one already-constructed provider per channel. Providers are
    /// passed in rather than built here so tests can hand in loopback pairs
    /// and binaries can hand in real sockets.
    pub fn init(providers: Vec<P>, opts: HostOptions, logger: Logger) -> NetfrResult<Host<P>> {
        if providers.len() != N_CHANNELS || opts.listen_addrs.len() != N_CHANNELS {
            return Err(NetfrError::BadMessage { reason: "expected exactly N_CHANNELS providers and addresses" });
        }
        if opts.huge_pages {
            std::env::set_var("RDMAV_HUGEPAGES_SAFE", "1");
        }

        let mut channels = Vec::with_capacity(N_CHANNELS);
        for (mut provider, addr) in providers.into_iter().zip(opts.listen_addrs.iter()) {
            provider.open_fabric()?;
            provider.passive_listen(addr)?;
            channels.push(Channel::new(provider, Role::Host, logger.clone()));
        }
        Ok(Host { channels })
    }

    /// Drains every channel through [`api::process`]. `None` scans all
    /// channels; `Some(n)` restricts the drain to channel `n`, mirroring
    /// spec §4.8's per-channel `client_process` scope.
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

    /// Per-channel client presence: each channel permits at most one
    /// client, so this is always `{0, 1}`, never a cross-channel sum.
    pub fn client_count(&self, channel: usize) -> NetfrResult<bool> {
        Ok(self.channel(channel)?.is_connected())
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

    fn channel(&self, channel: usize) -> NetfrResult<&Channel<P>> {
        self.channels.get(channel).ok_or(NetfrError::BadMessage { reason: "channel index out of range" })
    }

    fn channel_mut(&mut self, channel: usize) -> NetfrResult<&mut Channel<P>> {
        self.channels.get_mut(channel).ok_or(NetfrError::BadMessage { reason: "channel index out of range" })
    }
}
