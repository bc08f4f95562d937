//! Adapter turning a raw byte stream into decoded text fragments.

use std::pin::Pin;
use std::task::{Context, Poll};

use bluebox_types::error::TransportError;
use futures_util::Stream;
use futures_util::stream::FusedStream;
use pin_project_lite::pin_project;

use super::utf8::Utf8Decoder;

/// Boxed byte stream as produced by a transport.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send + 'static>>;

/// Text stream handed to the session engine.
pub type TextStream = FragmentStream<ByteStream>;

pin_project! {
    /// Yields UTF-8 text fragments decoded from a chunked byte stream.
    ///
    /// Characters split across chunk boundaries are reassembled. Chunks that
    /// decode to nothing (for example a lone lead byte) yield no fragment.
    /// After an error or the end of input the stream is exhausted and the
    /// underlying transport is dropped.
    pub struct FragmentStream<S> {
        #[pin]
        inner: Option<S>,
        decoder: Utf8Decoder,
        done: bool,
    }
}

impl<S> FragmentStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Some(inner),
            decoder: Utf8Decoder::new(),
            done: false,
        }
    }
}

impl<S, B> Stream for FragmentStream<S>
where
    S: Stream<Item = Result<B, TransportError>>,
    B: AsRef<[u8]>,
{
    type Item = Result<String, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        loop {
            let Some(inner) = this.inner.as_mut().as_pin_mut() else {
                *this.done = true;
                return Poll::Ready(None);
            };

            match inner.poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(chunk))) => {
                    let text = this.decoder.decode(chunk.as_ref());
                    if !text.is_empty() {
                        return Poll::Ready(Some(Ok(text)));
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    *this.done = true;
                    this.inner.set(None);
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    this.inner.set(None);
                    let rest = this.decoder.finish();
                    if rest.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(rest)));
                }
            }
        }
    }
}

impl<S, B> FusedStream for FragmentStream<S>
where
    S: Stream<Item = Result<B, TransportError>>,
    B: AsRef<[u8]>,
{
    fn is_terminated(&self) -> bool {
        self.done
    }
}

/// Box any byte stream into a [`TextStream`].
pub fn text_stream<S>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<Vec<u8>, TransportError>> + Send + 'static,
{
    FragmentStream::new(Box::pin(bytes) as ByteStream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{StreamExt, stream};

    fn chunks(parts: Vec<Result<Vec<u8>, TransportError>>) -> TextStream {
        text_stream(stream::iter(parts))
    }

    #[tokio::test]
    async fn yields_fragments_in_order() {
        let mut s = chunks(vec![Ok(b"Base".to_vec()), Ok(b"d on".to_vec())]);
        assert_eq!(s.next().await, Some(Ok("Base".to_string())));
        assert_eq!(s.next().await, Some(Ok("d on".to_string())));
        assert_eq!(s.next().await, None);
        assert!(s.is_terminated());
    }

    #[tokio::test]
    async fn reassembles_split_character() {
        let bytes = "né".as_bytes().to_vec();
        let mut s = chunks(vec![Ok(bytes[..2].to_vec()), Ok(bytes[2..].to_vec())]);

        let collected: Vec<String> = s
            .by_ref()
            .map(|item| item.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(collected, vec!["n".to_string(), "é".to_string()]);
    }

    #[tokio::test]
    async fn lone_lead_byte_chunk_is_skipped() {
        let euro = "€".as_bytes().to_vec();
        let mut s = chunks(vec![
            Ok(euro[..1].to_vec()),
            Ok(euro[1..2].to_vec()),
            Ok(euro[2..].to_vec()),
        ]);
        assert_eq!(s.next().await, Some(Ok("€".to_string())));
        assert_eq!(s.next().await, None);
    }

    #[tokio::test]
    async fn error_terminates_stream() {
        let mut s = chunks(vec![
            Ok(b"Base".to_vec()),
            Err(TransportError::Stream("connection reset".into())),
            Ok(b"never".to_vec()),
        ]);
        assert_eq!(s.next().await, Some(Ok("Base".to_string())));
        assert!(matches!(s.next().await, Some(Err(TransportError::Stream(_)))));
        assert_eq!(s.next().await, None);
        assert!(s.is_terminated());
    }

    #[tokio::test]
    async fn truncated_tail_flushed_at_end() {
        let mut s = chunks(vec![Ok(vec![b'o', b'k', 0xE2])]);
        assert_eq!(s.next().await, Some(Ok("ok".to_string())));
        assert_eq!(s.next().await, Some(Ok("\u{FFFD}".to_string())));
        assert_eq!(s.next().await, None);
    }

    #[tokio::test]
    async fn empty_input_ends_immediately() {
        let mut s = chunks(vec![]);
        assert_eq!(s.next().await, None);
    }
}
