//! Bridge from an async source stream to a blocking `std::io::Read`
//!
//! Blocking transport clients pull bytes through [`ChunkReader`] on the
//! blocking pool while [`pump`] feeds it from the async side. The channel is
//! bounded, so at most `capacity` chunks of a file are held in memory.

use std::io::{self, Cursor, Read};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Bytes read from the source per chunk
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks buffered between the source and the blocking reader
pub const CHUNK_CAPACITY: usize = 4;

/// Blocking reader over chunks sent by [`pump`]; must not be read on an
/// async worker thread
pub struct ChunkReader {
    chunks: mpsc::Receiver<io::Result<Vec<u8>>>,
    current: Cursor<Vec<u8>>,
}

/// Connected sender/reader pair
pub fn channel(capacity: usize) -> (mpsc::Sender<io::Result<Vec<u8>>>, ChunkReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        tx,
        ChunkReader {
            chunks: rx,
            current: Cursor::new(Vec::new()),
        },
    )
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = Read::read(&mut self.current, buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }

            match self.chunks.blocking_recv() {
                Some(Ok(chunk)) => self.current = Cursor::new(chunk),
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }
    }
}

/// Copy `source` into the channel until EOF, a read error or the reader
/// going away. Returns the number of bytes handed over.
pub async fn pump<R>(source: &mut R, tx: mpsc::Sender<io::Result<Vec<u8>>>) -> u64
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut sent = 0u64;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                    break;
                }
                sent += n as u64;
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }

    sent
}
