//! A boxed, hyper-compatible I/O handle unifying plain TCP and TLS streams
//! behind one type.

use hyper::rt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

trait Io: rt::Read + rt::Write + Send + 'static {}
impl<T> Io for T where T: rt::Read + rt::Write + Send + 'static {}

pub struct BoxedIo(Pin<Box<dyn Io>>);

impl BoxedIo {
    pub fn new<I: Io>(io: I) -> Self {
        BoxedIo(Box::pin(io))
    }
}

impl rt::Read for BoxedIo {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: rt::ReadBufCursor<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl rt::Write for BoxedIo {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}
