//! Size-capped response body reading.

use bytes::{Bytes, BytesMut};

use crate::{IncidentIoError, IncidentIoResult};

/// Reads `response` into memory, failing once more than `cap` bytes arrive.
///
/// An advertised `Content-Length` above the cap fails before any chunk is read.
/// The advertised length is otherwise ignored: chunks are counted as they
/// arrive, so a server that under-reports its length is still stopped at the cap.
pub async fn read_capped(mut response: reqwest::Response, cap: usize) -> IncidentIoResult<Bytes> {
    if let Some(advertised) = response.content_length() {
        if advertised > cap as u64 {
            return Err(IncidentIoError::SizeExceeded { limit: cap });
        }
    }

    let mut buffer = BytesMut::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(body_read_error)?
    {
        if buffer.len() + chunk.len() > cap {
            return Err(IncidentIoError::SizeExceeded { limit: cap });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}

fn body_read_error(error: reqwest::Error) -> IncidentIoError {
    if error.is_timeout() {
        IncidentIoError::Network(format!("timed out reading response body: {error}"))
    } else {
        IncidentIoError::Decode(format!("failed to read response body: {error}"))
    }
}

/// Percent-escapes a caller-supplied identifier for use as one path segment.
///
/// Every byte outside the RFC 3986 unreserved set is escaped, so `/`, `?`, `#`,
/// `%` and control characters cannot change the path or reach the query string.
/// Empty and dot-only identifiers are rejected: URL normalisation would
/// collapse them into a different path even when escaped.
pub fn escape_path_segment(segment: &str) -> IncidentIoResult<String> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(IncidentIoError::InvalidRequest(format!(
            "invalid identifier {segment:?}"
        )));
    }
    Ok(urlencoding::encode(segment).into_owned())
}
