//! # Hub socket
//! The TCP connection to the broker, shared between the MQTT client and the session loop.
//!
//! The client reads and writes through a [`SharedSocket`]. The session loop only waits on
//! [`SharedSocket::readable`], which consumes nothing and can be dropped at any point. A packet is then read by a
//! receive that always runs to completion, so the client never loses its place in the byte stream.

use embassy_net::tcp::{Error, TcpSocket};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_io_async::{ErrorType, Read, Write};

/// The socket, owned by the session
pub type SocketCell<'d> = Mutex<NoopRawMutex, TcpSocket<'d>>;

/// A handle on the session's socket
#[derive(Clone, Copy)]
pub struct SharedSocket<'a, 'd> {
    /// The socket all handles share
    socket: &'a SocketCell<'d>,
}

impl<'a, 'd> SharedSocket<'a, 'd> {
    /// Create a new handle on `socket`
    pub const fn new(socket: &'a SocketCell<'d>) -> Self {
        Self { socket }
    }

    /// Wait until the broker has sent something
    pub async fn readable(&self) {
        self.socket.lock().await.wait_read_ready().await;
    }
}

impl ErrorType for SharedSocket<'_, '_> {
    type Error = Error;
}

impl Read for SharedSocket<'_, '_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.lock().await.read(buf).await
    }
}

impl Write for SharedSocket<'_, '_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.lock().await.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.lock().await.flush().await
    }
}
