// Delimiter-based message framing over TCP.
//
// The transport is an ordered byte stream with no inherent message
// boundaries, so every encoded message is its payload serialized to UTF-8
// text followed by a delimiter string chosen once per session: a random
// 10-character printable-ASCII token, generated by the host at session
// creation and distributed to clients during the handshake. A random token
// makes accidental collision with payload content astronomically unlikely —
// it is not a cryptographic guarantee.
//
// `encode_frame` produces one self-delimited frame. `FrameDecoder::feed`
// buffers bytes across calls, splits on the delimiter, and yields complete
// segments while retaining any trailing partial for the next call, so
// decoding is independent of how the OS chunks the stream.
//
// Two reserved payload literals are part of the framing contract:
// - `PING`  — liveness probe from a prospective joiner; never joins.
// - `QUIT`  — explicit graceful disconnect, distinguishable from the
//             zero-length read that signals an abrupt socket close.
//
// A segment that fails to parse as a message is logged and discarded; the
// decode loop keeps draining subsequent buffered segments. Framing errors
// never crash a receive loop.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

/// Length of the per-session framing delimiter.
pub const DELIMITER_LEN: usize = 10;

/// Reserved liveness-probe payload.
pub const PING: &str = "ping";

/// Reserved graceful-disconnect payload.
pub const QUIT: &str = "{quit}";

/// Cap on buffered bytes awaiting a delimiter. A peer that streams data
/// without ever sending the delimiter is misbehaving; once the cap is hit
/// the pending buffer is dropped rather than growing without bound.
pub const MAX_PENDING: usize = 1024 * 1024;

/// Generate a fresh session delimiter: `DELIMITER_LEN` random characters
/// from the visible ASCII range `'!'..='~'`.
///
/// Randomness comes from hashing a counter through a freshly seeded
/// `RandomState` — each `RandomState` carries OS-seeded entropy, which is
/// plenty for collision avoidance and keeps the crate free of an RNG
/// dependency.
pub fn random_delimiter() -> String {
    let state = RandomState::new();
    let mut out = String::with_capacity(DELIMITER_LEN);
    let mut counter = 0u64;
    'outer: loop {
        let mut hasher = state.build_hasher();
        hasher.write_u64(counter);
        counter += 1;
        for byte in hasher.finish().to_le_bytes() {
            out.push((b'!' + byte % 94) as char);
            if out.len() == DELIMITER_LEN {
                break 'outer;
            }
        }
    }
    out
}

/// Encode one message payload as a self-delimited frame.
pub fn encode_frame(payload: &str, delimiter: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + delimiter.len());
    frame.extend_from_slice(payload.as_bytes());
    frame.extend_from_slice(delimiter.as_bytes());
    frame
}

/// Incremental frame decoder for one connection.
///
/// Holds the session delimiter and a carry-over buffer. `feed` may be called
/// with arbitrary chunks — single bytes, half frames, many frames at once —
/// and always yields exactly the segments a single-chunk feed would have.
pub struct FrameDecoder {
    delimiter: Vec<u8>,
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(delimiter: &str) -> Self {
        Self {
            delimiter: delimiter.as_bytes().to_vec(),
            buf: Vec::new(),
        }
    }

    /// Buffer `bytes` and return every completed payload segment.
    ///
    /// Empty segments (two adjacent delimiters) are skipped. Payloads are
    /// recovered lossily from UTF-8 — a mangled payload then simply fails
    /// message parsing downstream and is dropped there.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut segments = Vec::new();
        while let Some(pos) = find_delimiter(&self.buf, &self.delimiter) {
            let payload = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
            self.buf.drain(..pos + self.delimiter.len());
            if !payload.is_empty() {
                segments.push(payload);
            }
        }
        if self.buf.len() > MAX_PENDING {
            log::warn!(
                "dropping {} buffered bytes with no delimiter in sight",
                self.buf.len()
            );
            self.buf.clear();
        }
        segments
    }

    /// Feed bytes and parse each completed segment with `parse`. Segments
    /// that fail to parse are logged and discarded; decoding continues with
    /// the remaining buffered segments.
    pub fn feed_parse<M>(
        &mut self,
        bytes: &[u8],
        parse: fn(&str) -> Result<M, serde_json::Error>,
    ) -> Vec<M> {
        self.feed(bytes)
            .iter()
            .filter_map(|segment| match parse(segment) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    log::warn!("discarding unparseable message ({e}): {segment:.80}");
                    None
                }
            })
            .collect()
    }
}

/// First occurrence of `delimiter` in `haystack`, if any.
fn find_delimiter(haystack: &[u8], delimiter: &[u8]) -> Option<usize> {
    if haystack.len() < delimiter.len() {
        return None;
    }
    haystack
        .windows(delimiter.len())
        .position(|window| window == delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELIM: &str = "Z7q$kX#p9!";

    #[test]
    fn single_feed_recovers_all_messages() {
        let mut wire = Vec::new();
        for payload in ["alpha", "beta", "gamma"] {
            wire.extend_from_slice(&encode_frame(payload, DELIM));
        }
        let mut decoder = FrameDecoder::new(DELIM);
        assert_eq!(decoder.feed(&wire), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn byte_by_byte_feed_matches_single_feed() {
        let payloads = ["first", r#"{"State":{"players":[]}}"#, "ping", "{quit}"];
        let mut wire = Vec::new();
        for payload in payloads {
            wire.extend_from_slice(&encode_frame(payload, DELIM));
        }

        let mut whole = FrameDecoder::new(DELIM);
        let expected = whole.feed(&wire);

        let mut chunked = FrameDecoder::new(DELIM);
        let mut recovered = Vec::new();
        for byte in &wire {
            recovered.extend(chunked.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(recovered, expected);
        assert_eq!(recovered.len(), payloads.len());
    }

    #[test]
    fn partial_message_retained_across_feeds() {
        let mut decoder = FrameDecoder::new(DELIM);
        let frame = encode_frame("split me", DELIM);
        let (head, tail) = frame.split_at(4);
        assert!(decoder.feed(head).is_empty());
        assert_eq!(decoder.feed(tail), vec!["split me"]);
    }

    #[test]
    fn delimiter_split_across_chunk_boundary() {
        let frame = encode_frame("payload", DELIM);
        // Cut in the middle of the trailing delimiter.
        let cut = frame.len() - 3;
        let mut decoder = FrameDecoder::new(DELIM);
        assert!(decoder.feed(&frame[..cut]).is_empty());
        assert_eq!(decoder.feed(&frame[cut..]), vec!["payload"]);
    }

    #[test]
    fn adjacent_delimiters_yield_no_empty_segment() {
        let mut wire = encode_frame("a", DELIM);
        wire.extend_from_slice(DELIM.as_bytes());
        wire.extend_from_slice(&encode_frame("b", DELIM));
        let mut decoder = FrameDecoder::new(DELIM);
        assert_eq!(decoder.feed(&wire), vec!["a", "b"]);
    }

    #[test]
    fn unparseable_segment_does_not_stop_later_ones() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct Probe {
            n: u32,
        }
        fn parse(s: &str) -> Result<Probe, serde_json::Error> {
            serde_json::from_str(s)
        }

        let mut wire = Vec::new();
        wire.extend_from_slice(&encode_frame(r#"{"n":1}"#, DELIM));
        wire.extend_from_slice(&encode_frame("not json at all", DELIM));
        wire.extend_from_slice(&encode_frame(r#"{"n":2}"#, DELIM));

        let mut decoder = FrameDecoder::new(DELIM);
        let parsed = decoder.feed_parse(&wire, parse);
        assert_eq!(parsed, vec![Probe { n: 1 }, Probe { n: 2 }]);
    }

    #[test]
    fn runaway_buffer_is_dropped() {
        let mut decoder = FrameDecoder::new(DELIM);
        let junk = vec![b'x'; MAX_PENDING + 1];
        assert!(decoder.feed(&junk).is_empty());
        // The pending buffer was cleared; a well-formed frame still decodes.
        assert_eq!(decoder.feed(&encode_frame("ok", DELIM)), vec!["ok"]);
    }

    #[test]
    fn random_delimiter_shape() {
        let a = random_delimiter();
        let b = random_delimiter();
        assert_eq!(a.len(), DELIMITER_LEN);
        assert!(a.bytes().all(|c| (b'!'..=b'~').contains(&c)));
        // Two draws colliding would mean the entropy source is broken.
        assert_ne!(a, b);
    }
}
