//! Payload extraction for `application/http` record blocks.
//!
//! A response block holds the status line, the HTTP headers and the payload as
//! they went over the wire. Consumers want the payload only, with chunked
//! transfer coding undone and gzip/deflate content coding removed.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

use ccjoin_shared::{CcJoinError, Result};

/// Strip the HTTP envelope from a block and decode its payload.
pub fn decode_payload(block: &[u8]) -> Result<Vec<u8>> {
    let (head, body) = split_head(block)
        .ok_or_else(|| CcJoinError::parse("HTTP header block is not terminated"))?;

    let head = String::from_utf8_lossy(head);
    let mut transfer_encoding = None;
    let mut content_encoding = None;
    for line in head.lines().skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("Transfer-Encoding") {
            transfer_encoding = Some(value.trim().to_ascii_lowercase());
        } else if name.eq_ignore_ascii_case("Content-Encoding") {
            content_encoding = Some(value.trim().to_ascii_lowercase());
        }
    }

    let body = match transfer_encoding.as_deref() {
        Some(te) if te.contains("chunked") => dechunk(body)?,
        _ => body.to_vec(),
    };

    match content_encoding.as_deref() {
        None | Some("") | Some("identity") => Ok(body),
        Some("gzip") | Some("x-gzip") => inflate(GzDecoder::new(body.as_slice()), "gzip"),
        Some("deflate") => inflate(ZlibDecoder::new(body.as_slice()), "deflate")
            .or_else(|_| inflate(DeflateDecoder::new(body.as_slice()), "deflate")),
        Some(other) => Err(CcJoinError::parse(format!(
            "unsupported content-encoding '{other}'"
        ))),
    }
}

/// Split at the first empty line. Returns `(head, body)`.
fn split_head(block: &[u8]) -> Option<(&[u8], &[u8])> {
    if let Some(pos) = find(block, b"\r\n\r\n") {
        return Some((&block[..pos], &block[pos + 4..]));
    }
    find(block, b"\n\n").map(|pos| (&block[..pos], &block[pos + 2..]))
}

/// Undo `Transfer-Encoding: chunked`. Trailers after the last chunk are ignored.
fn dechunk(mut data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    loop {
        let line_end = find(data, b"\n")
            .ok_or_else(|| CcJoinError::parse("chunk size line missing"))?;
        let line = std::str::from_utf8(&data[..line_end])
            .map_err(|_| CcJoinError::parse("chunk size line is not ASCII"))?;
        let size_field = line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_field, 16)
            .map_err(|_| CcJoinError::parse(format!("invalid chunk size {size_field:?}")))?;
        data = &data[line_end + 1..];

        if size == 0 {
            return Ok(out);
        }
        if data.len() < size {
            return Err(CcJoinError::parse("chunk overruns payload"));
        }
        out.extend_from_slice(&data[..size]);
        data = &data[size..];
        data = data
            .strip_prefix(b"\r\n")
            .or_else(|| data.strip_prefix(b"\n"))
            .unwrap_or(data);
    }
}

fn inflate<R: Read>(mut decoder: R, coding: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CcJoinError::parse(format!("{coding} payload: {e}")))?;
    Ok(out)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
