use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error_handling::types::FramingError;

/// H.264 NAL start code. Units are delimited by this sequence on the wire,
/// and every published frame is re-prefixed with it.
pub const NAL_DELIMITER: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Splits an unbounded elementary stream into NAL unit payloads.
///
/// Each call to [`next_unit`](Self::next_unit) yields the maximal byte range
/// between two consecutive, non-overlapping occurrences of
/// [`NAL_DELIMITER`]; the delimiter itself is stripped. When the source ends
/// with a delimiter-free remnant, the remnant is emitted as a final unit and
/// the following call returns `Ok(None)`.
///
/// The working buffer is bounded (the supervisor sizes it at a quarter of
/// the configured bitrate, in bytes). A unit that would not fit returns
/// [`FramingError::BufferOverrun`]; the splitter is not usable afterwards
/// and the session must be torn down.
///
/// A splitter holds no cross-session state: one is constructed fresh for
/// every capture session and dropped with it.
pub struct NalSplitter<R> {
    source: R,
    buf: Vec<u8>,
    /// Length of the valid prefix of `buf`
    filled: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> NalSplitter<R> {
    pub fn new(source: R, capacity: usize) -> Self {
        Self {
            source,
            buf: vec![0u8; capacity],
            filled: 0,
            eof: false,
        }
    }

    /// Releases the underlying byte source.
    ///
    /// Used by the session stop sequence, which must close the connection
    /// itself before the capture process is signalled.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Returns the next unit payload, or `Ok(None)` once the stream is
    /// exhausted with nothing buffered.
    pub async fn next_unit(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        loop {
            if let Some(at) = find_delimiter(&self.buf[..self.filled]) {
                let payload = self.buf[..at].to_vec();
                let consumed = at + NAL_DELIMITER.len();
                self.buf.copy_within(consumed..self.filled, 0);
                self.filled -= consumed;
                trace!("split unit of {} bytes", payload.len());
                return Ok(Some(payload));
            }

            if self.eof {
                if self.filled == 0 {
                    return Ok(None);
                }
                // Trailing remnant with no closing delimiter
                let payload = self.buf[..self.filled].to_vec();
                self.filled = 0;
                trace!("split trailing unit of {} bytes", payload.len());
                return Ok(Some(payload));
            }

            if self.filled == self.buf.len() {
                return Err(FramingError::BufferOverrun(self.buf.len()));
            }

            let n = self.source.read(&mut self.buf[self.filled..]).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.filled += n;
            }
        }
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(NAL_DELIMITER.len())
        .position(|window| window == NAL_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const D: [u8; 4] = NAL_DELIMITER;

    fn stream(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    async fn collect<R: tokio::io::AsyncRead + Unpin>(
        splitter: &mut NalSplitter<R>,
    ) -> Vec<Vec<u8>> {
        let mut units = Vec::new();
        while let Some(unit) = splitter.next_unit().await.unwrap() {
            units.push(unit);
        }
        units
    }

    #[tokio::test]
    async fn splits_delimited_payloads_in_order() {
        let bytes = stream(&[&D, b"AAA", &D, b"", &D, b"BB"]);
        let mock = Builder::new().read(&bytes).build();
        let mut splitter = NalSplitter::new(mock, 1024);

        let units = collect(&mut splitter).await;
        assert_eq!(units, vec![b"".to_vec(), b"AAA".to_vec(), b"".to_vec(), b"BB".to_vec()]);
    }

    #[tokio::test]
    async fn emits_trailing_remnant_then_end_of_stream() {
        let bytes = stream(&[&D, b"CCCC"]);
        let mock = Builder::new().read(&bytes).build();
        let mut splitter = NalSplitter::new(mock, 1024);

        assert_eq!(splitter.next_unit().await.unwrap(), Some(b"".to_vec()));
        assert_eq!(splitter.next_unit().await.unwrap(), Some(b"CCCC".to_vec()));
        assert_eq!(splitter.next_unit().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_stream_signals_end_immediately() {
        let mock = Builder::new().build();
        let mut splitter = NalSplitter::new(mock, 1024);
        assert_eq!(splitter.next_unit().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reassembles_delimiter_split_across_reads() {
        // Delimiter broken over three reads; payload broken over two.
        let mock = Builder::new()
            .read(&[0x00])
            .read(&[0x00, 0x00])
            .read(&[0x01, b'X'])
            .read(b"YZ")
            .read(&D)
            .read(b"tail")
            .build();
        let mut splitter = NalSplitter::new(mock, 1024);

        let units = collect(&mut splitter).await;
        assert_eq!(units, vec![b"".to_vec(), b"XYZ".to_vec(), b"tail".to_vec()]);
    }

    #[tokio::test]
    async fn first_occurrence_wins_and_match_is_consumed() {
        // Five zero bytes then 0x01: the first window [0,0,0,0] is not a
        // delimiter; the match starts at offset 2 and consumes four bytes.
        let bytes = stream(&[b"ab", &[0x00, 0x00], &D, b"rest"]);
        let mock = Builder::new().read(&bytes).build();
        let mut splitter = NalSplitter::new(mock, 1024);

        assert_eq!(
            splitter.next_unit().await.unwrap(),
            Some(vec![b'a', b'b', 0x00, 0x00])
        );
        assert_eq!(splitter.next_unit().await.unwrap(), Some(b"rest".to_vec()));
        assert_eq!(splitter.next_unit().await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_unit_is_a_buffer_overrun() {
        let bytes = stream(&[&D, &[0xAB; 32], &D]);
        let mock = Builder::new().read(&bytes).build();
        // Capacity too small for the 32-byte unit plus its closing delimiter
        let mut splitter = NalSplitter::new(mock, 16);

        assert_eq!(splitter.next_unit().await.unwrap(), Some(b"".to_vec()));
        match splitter.next_unit().await {
            Err(FramingError::BufferOverrun(16)) => (),
            other => panic!("expected BufferOverrun, got {:?}", other),
        }
        // The overrun leaves bytes unread; the mock panics on drop otherwise.
        std::mem::forget(splitter.into_inner());
    }

    #[tokio::test]
    async fn adjacent_delimiters_yield_empty_units() {
        let bytes = stream(&[&D, &D, &D]);
        let mock = Builder::new().read(&bytes).build();
        let mut splitter = NalSplitter::new(mock, 64);

        let units = collect(&mut splitter).await;
        assert_eq!(units, vec![Vec::<u8>::new(); 3]);
    }
}
