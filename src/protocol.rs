//! The file server's wire protocol: `LIST`, `PULL`, `PUSH`.
//!
//! A request is a single line terminated by `\n`. Lines are read and parsed
//! as raw bytes, not `str`, because a `PUSH` payload is whatever bytes the
//! caller wrote between the third space and the line's terminating `\n` —
//! arbitrary file content, not necessarily valid UTF-8.
//!
//! This module holds both the line-framing primitives shared by client and
//! server, and the client-side request builders used by the enumerator
//! (`LIST`) and worker pool (`PULL`/`PUSH`). The server-side handlers live in
//! [`crate::fileserver`].

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Read buffer size for streaming file content, matching the chunking used
/// by both `PULL`'s sender loop and the worker's pull-then-push relay.
pub const CHUNK_SIZE: usize = 4096;

/// Read one line, trimmed of a trailing `\r\n` or `\n`. Returns `None` on
/// EOF (peer closed the connection without sending anything further).
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(buf))
}

/// A parsed request line.
#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    List(String),
    Pull(String),
    Push { path: String, n: i64, chunk: Vec<u8> },
}

/// Parse one request line per the wire grammar.
///
/// `LIST`/`PULL` take a single whitespace-delimited argument (anything past
/// the first token on the line is ignored, matching `sscanf("%s", ...)`
/// semantics). `PUSH` splits on the third space only: verb, path, length,
/// then payload-to-end-of-line, so the payload may contain further spaces
/// (or arbitrary bytes) but never a `\n`.
pub fn parse_request(line: &[u8]) -> Option<Request> {
    let sp = line.iter().position(|&b| b == b' ')?;
    let verb = std::str::from_utf8(&line[..sp]).ok()?;
    let rest = &line[sp + 1..];

    match verb {
        "LIST" => Some(Request::List(decode_token(first_token(rest)))),
        "PULL" => Some(Request::Pull(decode_token(first_token(rest)))),
        "PUSH" => {
            let sp2 = rest.iter().position(|&b| b == b' ')?;
            let path = decode_token(&rest[..sp2]);
            let rest2 = &rest[sp2 + 1..];
            let sp3 = rest2.iter().position(|&b| b == b' ');
            let (n_bytes, chunk) = match sp3 {
                Some(i) => (&rest2[..i], rest2[i + 1..].to_vec()),
                None => (rest2, Vec::new()),
            };
            let n: i64 = std::str::from_utf8(n_bytes).ok()?.trim().parse().ok()?;
            Some(Request::Push { path, n, chunk })
        }
        _ => None,
    }
}

fn first_token(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let rest = &bytes[start..];
    let end = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
    &rest[..end]
}

fn decode_token(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ===========================================================================
// Client-side request builders (used by the enumerator and worker pool).
// ===========================================================================

/// Issue `LIST <dir>` against `addr` and return the raw lines received before
/// the `.` terminator — whatever they are. The server sends `ERR: ...` as an
/// ordinary line followed by the terminator when the directory can't be
/// opened, so a caller that wants to distinguish that case must inspect the
/// returned lines itself; the enumerator does not.
pub async fn list(addr: &str, dir: &str) -> io::Result<Vec<String>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(format!("LIST {}\n", dir).as_bytes()).await?;

    let mut reader = tokio::io::BufReader::new(stream);
    let mut names = Vec::new();
    loop {
        match read_line(&mut reader).await? {
            None => break,
            Some(line) => {
                if line == b"." {
                    break;
                }
                names.push(String::from_utf8_lossy(&line).into_owned());
            }
        }
    }
    Ok(names)
}

/// Result of a `PULL` header: either the byte length to stream next, with
/// the connection positioned right after the header, or the server's error
/// message.
pub enum PullOutcome {
    Ok {
        body: tokio::io::BufReader<TcpStream>,
        len: u64,
    },
    Err(String),
}

/// Issue `PULL <path>` against `addr`. On success, the returned reader is
/// positioned at the start of the file content; exactly `len` bytes follow,
/// then the server closes — there is no trailing terminator to read.
pub async fn pull(addr: &str, path: &str) -> io::Result<PullOutcome> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(format!("PULL {}\n", path).as_bytes()).await?;

    let mut reader = tokio::io::BufReader::new(stream);
    let mut header = Vec::new();
    let n = reader.read_until(b' ', &mut header).await?;
    if n == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "empty PULL header"));
    }
    if header.last() == Some(&b' ') {
        header.pop();
    }
    let len: i64 = std::str::from_utf8(&header)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-UTF8 PULL header"))?
        .trim()
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed PULL header"))?;

    if len < 0 {
        // The error line may or may not end in `\n`; accept both.
        let mut msg = Vec::new();
        let _ = reader.read_until(b'\n', &mut msg).await;
        while matches!(msg.last(), Some(&b'\n') | Some(&b'\r')) {
            msg.pop();
        }
        return Ok(PullOutcome::Err(String::from_utf8_lossy(&msg).into_owned()));
    }

    Ok(PullOutcome::Ok {
        body: reader,
        len: len as u64,
    })
}

/// A `PUSH` session: one TCP connection carrying the `begin` frame, zero or
/// more data frames, and the closing `end` frame for a single destination
/// file.
pub struct PushSession {
    stream: TcpStream,
    path: String,
}

impl PushSession {
    pub async fn connect(addr: &str, path: impl Into<String>) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            path: path.into(),
        })
    }

    /// `PUSH <path> -1 start` — truncate/open the destination file.
    pub async fn begin(&mut self) -> io::Result<()> {
        let frame = format!("PUSH {} -1 start\n", self.path);
        self.stream.write_all(frame.as_bytes()).await
    }

    /// `PUSH <path> <n> <data>` — append `data` to the destination file.
    /// `data` must not be empty and must not contain `\n`.
    pub async fn send_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        let header = format!("PUSH {} {} ", self.path, data.len());
        self.stream.write_all(header.as_bytes()).await?;
        self.stream.write_all(data).await?;
        self.stream.write_all(b"\n").await
    }

    /// `PUSH <path> 0 done` — close the destination file and the connection.
    pub async fn finish(mut self) -> io::Result<()> {
        let frame = format!("PUSH {} 0 done\n", self.path);
        self.stream.write_all(frame.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list() {
        assert_eq!(
            parse_request(b"LIST /srv/data"),
            Some(Request::List("/srv/data".to_string()))
        );
    }

    #[test]
    fn parse_list_ignores_trailing_tokens() {
        assert_eq!(
            parse_request(b"LIST /srv/data extra words"),
            Some(Request::List("/srv/data".to_string()))
        );
    }

    #[test]
    fn parse_pull() {
        assert_eq!(
            parse_request(b"PULL /srv/data/a.txt"),
            Some(Request::Pull("/srv/data/a.txt".to_string()))
        );
    }

    #[test]
    fn parse_push_begin() {
        assert_eq!(
            parse_request(b"PUSH /dst/a.txt -1 start"),
            Some(Request::Push {
                path: "/dst/a.txt".to_string(),
                n: -1,
                chunk: b"start".to_vec(),
            })
        );
    }

    #[test]
    fn parse_push_data_with_embedded_spaces() {
        let parsed = parse_request(b"PUSH /dst/a.txt 5 a b\0c").unwrap();
        match parsed {
            Request::Push { path, n, chunk } => {
                assert_eq!(path, "/dst/a.txt");
                assert_eq!(n, 5);
                assert_eq!(chunk, b"a b\0c");
            }
            _ => panic!("expected Push"),
        }
    }

    #[test]
    fn parse_push_end() {
        assert_eq!(
            parse_request(b"PUSH /dst/a.txt 0 done"),
            Some(Request::Push {
                path: "/dst/a.txt".to_string(),
                n: 0,
                chunk: b"done".to_vec(),
            })
        );
    }

    #[test]
    fn parse_unknown_verb() {
        assert_eq!(parse_request(b"FROB something"), None);
    }

    #[test]
    fn parse_push_missing_length_fails() {
        assert_eq!(parse_request(b"PUSH /dst/a.txt"), None);
    }
}
