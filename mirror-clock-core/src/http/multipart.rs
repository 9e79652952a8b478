//! Incremental `multipart/form-data` reader for the firmware upload.
//!
//! Body bytes arrive in arbitrary pieces. They are staged in a fixed buffer
//! and everything that cannot be the start of a boundary is handed on at
//! once; only the last `delimiter.len() - 1` bytes are held back, so a
//! boundary split across two reads is still found.

use heapless::Vec;
use mirror_clock_common::*;

use super::UPLOAD_FIELD;

pub const UPLOAD_BUFFER_LEN: usize = 2048;
/// RFC 2046 limit.
pub const MAX_BOUNDARY_LEN: usize = 70;
const DELIMITER_LEN: usize = MAX_BOUNDARY_LEN + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MultipartError {
    #[error("missing multipart boundary")]
    MissingBoundary,
    #[error("multipart boundary is longer than 70 bytes")]
    BoundaryTooLong,
    #[error("part headers do not fit the upload buffer")]
    HeadersTooLarge,
    #[error("malformed multipart body")]
    Malformed,
}

/// What the upload stream delivered, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UploadEvent<'a> {
    Start { filename: &'a str },
    Data(&'a [u8]),
    End { total_size: u32 },
    /// The body ended before the file part was closed.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    Delimiter,
    Headers,
    Body { file: bool },
    Done,
}

pub struct MultipartUpload {
    delimiter: Vec<u8, DELIMITER_LEN>,
    buf: Vec<u8, UPLOAD_BUFFER_LEN>,
    state: State,
    file_open: bool,
    file_seen: bool,
    total: u32,
}

impl MultipartUpload {
    pub fn new(boundary: &str) -> Result<Self, MultipartError> {
        if boundary.is_empty() {
            return Err(MultipartError::MissingBoundary);
        }
        if boundary.len() > MAX_BOUNDARY_LEN {
            return Err(MultipartError::BoundaryTooLong);
        }

        let mut delimiter: Vec<u8, DELIMITER_LEN> = Vec::new();
        delimiter.extend_from_slice(b"\r\n--").ok();
        delimiter
            .extend_from_slice(boundary.as_bytes())
            .map_err(|_| MultipartError::BoundaryTooLong)?;

        // The body opens with "--boundary" without the leading CRLF.
        let mut buf = Vec::new();
        buf.extend_from_slice(b"\r\n").ok();

        Ok(Self {
            delimiter,
            buf,
            state: State::Preamble,
            file_open: false,
            file_seen: false,
            total: 0,
        })
    }

    /// True once the closing boundary has been read.
    pub fn is_complete(&self) -> bool {
        self.state == State::Done
    }

    /// Bytes of the file part delivered so far.
    pub fn received(&self) -> u32 {
        self.total
    }

    pub fn feed<F>(&mut self, mut data: &[u8], sink: &mut F) -> Result<(), MultipartError>
    where
        F: FnMut(UploadEvent<'_>),
    {
        while !data.is_empty() && self.state != State::Done {
            let room = self.buf.capacity() - self.buf.len();
            if room == 0 {
                return Err(MultipartError::HeadersTooLarge);
            }
            let take = room.min(data.len());
            self.buf.extend_from_slice(&data[..take]).ok();
            data = &data[take..];
            self.drain(sink)?;
        }
        Ok(())
    }

    /// Ends the stream. Returns whether the body was complete; an open file
    /// part is reported as [`UploadEvent::Aborted`].
    pub fn finish<F>(&mut self, sink: &mut F) -> bool
    where
        F: FnMut(UploadEvent<'_>),
    {
        let complete = self.state == State::Done;
        if self.file_open {
            warn!("Upload ended inside the file part after {} bytes", self.total);
            sink(UploadEvent::Aborted);
            self.file_open = false;
        }
        self.state = State::Done;
        self.buf.clear();
        complete
    }

    fn drain<F>(&mut self, sink: &mut F) -> Result<(), MultipartError>
    where
        F: FnMut(UploadEvent<'_>),
    {
        loop {
            match self.state {
                State::Preamble => match find_subsequence(&self.buf, &self.delimiter) {
                    Some(pos) => {
                        self.consume(pos + self.delimiter.len());
                        self.state = State::Delimiter;
                    }
                    None => {
                        let keep = self.delimiter.len() - 1;
                        self.consume(self.buf.len().saturating_sub(keep));
                        return Ok(());
                    }
                },
                State::Delimiter => {
                    if self.buf.len() < 2 {
                        return Ok(());
                    }
                    if self.buf.starts_with(b"--") {
                        debug!("Closing boundary reached");
                        self.state = State::Done;
                        self.buf.clear();
                        return Ok(());
                    }
                    if !self.buf.starts_with(b"\r\n") {
                        return Err(MultipartError::Malformed);
                    }
                    self.consume(2);
                    self.state = State::Headers;
                }
                State::Headers => {
                    let Some(end) = find_subsequence(&self.buf, b"\r\n\r\n") else {
                        return if self.buf.is_full() {
                            Err(MultipartError::HeadersTooLarge)
                        } else {
                            Ok(())
                        };
                    };

                    let headers = &self.buf[..end];
                    let name = quoted_param(headers, b"name=\"");
                    let filename = quoted_param(headers, b"filename=\"");
                    let file = match (name, filename) {
                        (Some(name), Some(raw))
                            if name == UPLOAD_FIELD.as_bytes() && !self.file_seen =>
                        {
                            let filename =
                                core::str::from_utf8(raw).map_err(|_| MultipartError::Malformed)?;
                            info!("Receiving upload {}", filename);
                            sink(UploadEvent::Start { filename });
                            true
                        }
                        _ => false,
                    };

                    if file {
                        self.file_open = true;
                        self.file_seen = true;
                        self.total = 0;
                    }
                    self.consume(end + 4);
                    self.state = State::Body { file };
                }
                State::Body { file } => match find_subsequence(&self.buf, &self.delimiter) {
                    Some(pos) => {
                        if file {
                            if pos > 0 {
                                sink(UploadEvent::Data(&self.buf[..pos]));
                            }
                            self.total = self.total.saturating_add(pos as u32);
                            sink(UploadEvent::End {
                                total_size: self.total,
                            });
                            self.file_open = false;
                        }
                        self.consume(pos + self.delimiter.len());
                        self.state = State::Delimiter;
                    }
                    None => {
                        let safe = self.buf.len().saturating_sub(self.delimiter.len() - 1);
                        if safe > 0 {
                            if file {
                                sink(UploadEvent::Data(&self.buf[..safe]));
                                self.total = self.total.saturating_add(safe as u32);
                            }
                            self.consume(safe);
                        }
                        return Ok(());
                    }
                },
                State::Done => {
                    self.buf.clear();
                    return Ok(());
                }
            }
        }
    }

    fn consume(&mut self, count: usize) {
        let len = self.buf.len();
        let count = count.min(len);
        self.buf.copy_within(count..len, 0);
        self.buf.truncate(len - count);
    }
}

/// Boundary parameter of a `Content-Type` header value.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    let bytes = content_type.as_bytes();
    let marker = b"boundary=";
    let pos = bytes
        .windows(marker.len())
        .position(|window| window.eq_ignore_ascii_case(marker))?;
    let rest = &content_type[pos + marker.len()..];

    let boundary = match rest.strip_prefix('"') {
        Some(quoted) => &quoted[..quoted.find('"')?],
        None => {
            let end = rest
                .find(|c: char| c == ';' || c == ' ' || c == '\r' || c == '\n')
                .unwrap_or(rest.len());
            &rest[..end]
        }
    };

    (!boundary.is_empty()).then_some(boundary)
}

/// Value of `key"value"` in part headers. `key` must not be the tail of a
/// longer parameter name, so `name="` does not match inside `filename="`.
fn quoted_param<'h>(headers: &'h [u8], key: &[u8]) -> Option<&'h [u8]> {
    let mut offset = 0;
    while let Some(pos) = headers[offset..]
        .windows(key.len())
        .position(|window| window.eq_ignore_ascii_case(key))
    {
        let start = offset + pos;
        let value_start = start + key.len();
        if start == 0 || !headers[start - 1].is_ascii_alphanumeric() {
            let rest = &headers[value_start..];
            let end = rest.iter().position(|&b| b == b'"')?;
            return Some(&rest[..end]);
        }
        offset = value_start;
    }
    None
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::vec::Vec;

    #[derive(Debug, PartialEq)]
    enum Seen {
        Start(String),
        End(u32),
        Aborted,
    }

    #[derive(Default)]
    struct Collected {
        events: Vec<Seen>,
        data: Vec<u8>,
    }

    impl Collected {
        fn record(&mut self, event: UploadEvent<'_>) {
            match event {
                UploadEvent::Start { filename } => self.events.push(Seen::Start(filename.into())),
                UploadEvent::Data(bytes) => self.data.extend_from_slice(bytes),
                UploadEvent::End { total_size } => self.events.push(Seen::End(total_size)),
                UploadEvent::Aborted => self.events.push(Seen::Aborted),
            }
        }
    }

    const BOUNDARY: &str = "----formXyZ";

    fn payload() -> Vec<u8> {
        // contains a near miss of the delimiter
        let mut payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        payload.splice(1000..1000, b"\r\n------formXy".iter().copied());
        payload
    }

    fn body(payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"------formXyZ\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n");
        body.extend_from_slice(b"------formXyZ\r\n");
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"update\"; filename=\"fw.bin\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n------formXyZ--\r\n");
        body
    }

    fn run(body: &[u8], piece: usize) -> (Collected, bool) {
        let mut upload = MultipartUpload::new(BOUNDARY).unwrap();
        let mut collected = Collected::default();
        let mut sink = |event: UploadEvent<'_>| collected.record(event);
        for chunk in body.chunks(piece) {
            upload.feed(chunk, &mut sink).unwrap();
        }
        let complete = upload.finish(&mut sink);
        (collected, complete)
    }

    #[test]
    fn file_part_survives_any_read_size() {
        let payload = payload();
        let body = body(&payload);
        for piece in [1, 3, 64, 1460, 4096] {
            let (collected, complete) = run(&body, piece);
            assert!(complete, "piece size {piece}");
            assert_eq!(
                collected.events,
                [Seen::Start("fw.bin".into()), Seen::End(payload.len() as u32)],
                "piece size {piece}"
            );
            assert_eq!(collected.data, payload, "piece size {piece}");
        }
    }

    #[test]
    fn truncated_body_reports_abort() {
        let payload = payload();
        let body = body(&payload);
        let (collected, complete) = run(&body[..body.len() / 2], 512);

        assert!(!complete);
        assert_eq!(collected.events.first(), Some(&Seen::Start("fw.bin".into())));
        assert_eq!(collected.events.last(), Some(&Seen::Aborted));
    }

    #[test]
    fn oversized_headers_are_rejected() {
        let mut upload = MultipartUpload::new(BOUNDARY).unwrap();
        let mut sink = |_: UploadEvent<'_>| {};
        upload.feed(b"------formXyZ\r\n", &mut sink).unwrap();
        let junk = [b'a'; UPLOAD_BUFFER_LEN];
        assert_eq!(
            upload.feed(&junk, &mut sink),
            Err(MultipartError::HeadersTooLarge)
        );
    }

    #[test]
    fn boundary_parameter_is_extracted() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=----formXyZ"),
            Some("----formXyZ")
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; Boundary=\"a b\"; charset=x"),
            Some("a b")
        );
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
        assert_eq!(boundary_from_content_type("multipart/form-data; boundary="), None);
    }

    #[test]
    fn name_does_not_match_inside_filename() {
        let headers = b"Content-Disposition: form-data; filename=\"x.bin\"; name=\"update\"";
        assert_eq!(quoted_param(headers, b"name=\""), Some(&b"update"[..]));
        assert_eq!(quoted_param(headers, b"filename=\""), Some(&b"x.bin"[..]));
    }

    #[test]
    fn boundary_length_is_limited() {
        let long = "x".repeat(MAX_BOUNDARY_LEN + 1);
        assert!(matches!(
            MultipartUpload::new(&long),
            Err(MultipartError::BoundaryTooLong)
        ));
        assert!(matches!(
            MultipartUpload::new(""),
            Err(MultipartError::MissingBoundary)
        ));
    }
}
