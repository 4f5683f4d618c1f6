//! Engine backend speaking the WireGuard cross-platform userspace API
//!
//! A userspace WireGuard implementation listens on a Unix socket named after
//! its interface (`<socket_dir>/<ifname>.sock`). Requests are `set=1` or
//! `get=1` followed by `key=value` lines and a blank line; every reply ends
//! with `errno=<n>` and a blank line.
use super::{BindStrategy, EngineError, EngineHandle, EngineLogger, TunnelEngine};
use crate::network::InterfaceLink;
use crate::translate::DirectiveList;
use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default directory holding engine control sockets
pub const DEFAULT_SOCKET_DIR: &str = "/var/run/wireguard";

/// Read/write timeout on the control socket
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend attaching to engines through their UAPI socket
#[derive(Debug, Clone)]
pub struct UapiEngine {
    socket_dir: PathBuf,
}

impl UapiEngine {
    pub fn new(socket_dir: impl Into<PathBuf>) -> Self {
        UapiEngine {
            socket_dir: socket_dir.into(),
        }
    }

    /// Control socket of the engine serving `interface`
    pub fn socket_path(&self, interface: &str) -> PathBuf {
        self.socket_dir.join(format!("{}.sock", interface))
    }
}

impl Default for UapiEngine {
    fn default() -> Self {
        UapiEngine::new(DEFAULT_SOCKET_DIR)
    }
}

impl<L, T> TunnelEngine<L, T> for UapiEngine
where
    L: InterfaceLink + Send,
    T: Send,
{
    type Handle = UapiHandle<L, T>;

    fn create(
        &self,
        link: L,
        transport: T,
        bind: BindStrategy,
        logger: EngineLogger,
    ) -> Result<Self::Handle, EngineError> {
        let path = self.socket_path(link.name());
        let stream = connect(&path)?;

        logger.verbose(format_args!(
            "attached to {} ({:?} bind)",
            path.display(),
            bind
        ));
        info!("Engine control socket {} connected", path.display());

        Ok(UapiHandle {
            reader: BufReader::new(stream),
            link,
            _transport: transport,
            logger,
        })
    }
}

fn connect(path: &Path) -> Result<UnixStream, EngineError> {
    let stream = UnixStream::connect(path)?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;
    Ok(stream)
}

/// Clears the device key and every peer before the socket is dropped
const TEARDOWN: &str = concat!(
    "set=1\n",
    "private_key=0000000000000000000000000000000000000000000000000000000000000000\n",
    "replace_peers=true\n\n"
);

/// Engine instance reached over a UAPI socket. Owns the interface it runs on.
pub struct UapiHandle<L, T> {
    /// One reader for the whole connection; bytes buffered past a reply
    /// belong to the next one
    reader: BufReader<UnixStream>,
    link: L,
    _transport: T,
    logger: EngineLogger,
}

impl<L: InterfaceLink, T> UapiHandle<L, T> {
    /// Send one request and return the reply lines before `errno=`
    fn request(&mut self, body: &str) -> Result<Vec<String>, EngineError> {
        let writer = self.reader.get_mut();
        writer.write_all(body.as_bytes())?;
        writer.flush()?;

        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim_end_matches('\n');
            if line.is_empty() {
                break;
            }
            lines.push(line.to_string());
        }

        let last = lines
            .pop()
            .ok_or_else(|| EngineError::Protocol("empty reply".to_string()))?;
        let errno = last
            .strip_prefix("errno=")
            .and_then(|n| n.parse::<i32>().ok())
            .ok_or_else(|| EngineError::Protocol(format!("unexpected reply line: {}", last)))?;

        if errno != 0 {
            self.logger.error(format_args!("request failed with errno={}", errno));
            return Err(EngineError::Rejected { errno });
        }

        Ok(lines)
    }
}

impl<L, T> EngineHandle for UapiHandle<L, T>
where
    L: InterfaceLink + Send,
    T: Send,
{
    fn apply_config(&mut self, directives: &DirectiveList) -> Result<(), EngineError> {
        let body = if directives.is_empty() {
            "set=1\n\n".to_string()
        } else {
            format!("set=1\n{}\n\n", directives)
        };

        self.request(&body)?;
        self.logger
            .verbose(format_args!("applied {} directives", directives.len()));
        Ok(())
    }

    fn activate(&mut self) -> Result<(), EngineError> {
        self.link.set_up()?;
        self.logger
            .verbose(format_args!("device {} up", self.link.name()));
        Ok(())
    }

    fn query_status(&mut self) -> Result<String, EngineError> {
        Ok(self.request("get=1\n\n")?.join("\n"))
    }

    fn close(mut self) {
        // A replacement session may already be running on the same device
        if self.link.is_exclusive() {
            if let Err(e) = self.request(TEARDOWN) {
                warn!("Clearing engine state on {} failed: {}", self.link.name(), e);
            }
        } else {
            debug!("Leaving engine state on {} to its successor", self.link.name());
        }

        if let Err(e) = self.reader.get_ref().shutdown(Shutdown::Both) {
            warn!("Engine socket shutdown failed: {}", e);
        }
        debug!("Released engine on {}", self.link.name());
    }
}
