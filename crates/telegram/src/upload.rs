//! Upload body that reports how much of the file has been read.

use std::{
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use {
    mediarelay_pipeline::ProgressHandle,
    tokio::io::{AsyncRead, ReadBuf},
};

/// Wraps a file so every read publishes `(bytes read, total)`.
pub struct ProgressReader<R> {
    inner: R,
    read: u64,
    total: u64,
    progress: Arc<ProgressHandle>,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, total: u64, progress: Arc<ProgressHandle>) -> Self {
        Self {
            inner,
            read: 0,
            total,
            progress,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            let n = (buf.filled().len() - before) as u64;
            if n > 0 {
                self.read += n;
                self.progress.update(self.read, self.total);
            }
        }
        poll
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tokio::io::AsyncReadExt};

    #[tokio::test]
    async fn publishes_running_total() {
        let data = vec![7_u8; 10_000];
        let (handle, rx) = ProgressHandle::channel();
        let mut reader = ProgressReader::new(&data[..], data.len() as u64, Arc::new(handle));

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out.len(), data.len());
        let last = *rx.borrow();
        assert_eq!((last.current, last.total), (10_000, 10_000));
        assert!(last.is_complete());
    }
}
