//! Batch response demultiplexing and error mapping
//!
//! The service answers a batch with a multipart body mirroring the request:
//! one embedded HTTP response per operation, in operation order. This module
//! splits that body positionally and is the single point where raw service
//! failures become [`TableError`] values.

use crate::errors::{Result, TableError};
use serde_json::Value;
use tracing::warn;

/// Demultiplex a batch response into one ETag slot per operation.
///
/// Slots are in operation order; `None` marks an operation with no surviving
/// row (Delete). Any failure (a non-success top-level status, an embedded
/// error part, or framing the parser cannot interpret) raises instead of
/// returning partial results: the service's transaction is all-or-nothing.
pub fn parse_batch_response(
    status: u16,
    content_type: Option<&str>,
    body: &str,
    expected_ops: usize,
) -> Result<Vec<Option<String>>> {
    if !(200..300).contains(&status) {
        return Err(map_service_error(status, body, 0));
    }

    let batch_boundary = content_type.and_then(boundary_token).ok_or_else(|| {
        TableError::MalformedResponse("response content type carries no boundary".to_string())
    })?;

    let outer = split_parts(body, &batch_boundary);
    let outer_part = outer.first().ok_or_else(|| {
        TableError::MalformedResponse("response contains no batch part".to_string())
    })?;

    let changeset_boundary = boundary_token(outer_part).ok_or_else(|| {
        TableError::MalformedResponse("batch part declares no changeset boundary".to_string())
    })?;

    let mut etags = Vec::new();
    for (position, part) in split_parts(outer_part, &changeset_boundary).iter().enumerate() {
        let (part_status, etag, part_body) = parse_http_part(part)?;
        if !(200..300).contains(&part_status) {
            warn!(
                status = part_status,
                position, "batch operation rejected by service"
            );
            return Err(map_service_error(part_status, part_body, position));
        }
        etags.push(etag);
    }

    if etags.len() != expected_ops {
        return Err(TableError::MalformedResponse(format!(
            "expected {} response parts, found {}",
            expected_ops,
            etags.len()
        )));
    }
    Ok(etags)
}

/// Normalize a service error payload into [`TableError::BatchRejected`].
///
/// Error bodies are OData JSON; the failing operation's index is encoded as
/// a decimal prefix of the message (`"1:The specified resource does not
/// exist."`). When the prefix is absent, `fallback_index` (the position of
/// the failing part, or 0 for a top-level rejection) is used.
fn map_service_error(status: u16, body: &str, fallback_index: usize) -> TableError {
    let mut code = String::new();
    let mut message = body.trim().to_string();

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let error = value.get("odata.error").or_else(|| value.get("error"));
        if let Some(error) = error {
            if let Some(c) = error.get("code").and_then(|v| v.as_str()) {
                code = c.to_string();
            }
            if let Some(m) = error
                .get("message")
                .and_then(|m| m.get("value").and_then(|v| v.as_str()).or_else(|| m.as_str()))
            {
                message = m.to_string();
            }
        }
    }

    let (index, message) = split_index_prefix(&message).unwrap_or((fallback_index, message.clone()));
    TableError::BatchRejected {
        index,
        status,
        code,
        message,
    }
}

/// `"2:text"` → `(2, "text")`
fn split_index_prefix(message: &str) -> Option<(usize, String)> {
    let (prefix, rest) = message.split_once(':')?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((prefix.parse().ok()?, rest.to_string()))
}

/// Extract the boundary token from a `Content-Type` header value or a part
/// header block.
fn boundary_token(text: &str) -> Option<String> {
    let start = text.find("boundary=")? + "boundary=".len();
    let rest = &text[start..];
    let end = rest
        .find(|c: char| c == '\r' || c == '\n' || c == ';' || c == ' ' || c == '"')
        .unwrap_or(rest.len());
    let token = rest[..end].trim_matches('"');
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Split a multipart body into its parts, dropping the prologue before the
/// first boundary and everything after the terminator.
fn split_parts<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{}", boundary);
    let mut parts = Vec::new();
    let mut segments = body.split(delimiter.as_str());
    segments.next(); // prologue
    for segment in segments {
        if segment.starts_with("--") {
            break; // terminator
        }
        parts.push(segment);
    }
    parts
}

/// Parse one `application/http` part into its embedded status, ETag header,
/// and body.
fn parse_http_part(part: &str) -> Result<(u16, Option<String>, &str)> {
    let status_line_at = part.find("HTTP/1.1 ").ok_or_else(|| {
        TableError::MalformedResponse("response part carries no status line".to_string())
    })?;
    let embedded = &part[status_line_at..];

    // Head and body are separated by the first blank line.
    let (head, body) = match embedded.find("\r\n\r\n") {
        Some(at) => (&embedded[..at], &embedded[at + 4..]),
        None => match embedded.find("\n\n") {
            Some(at) => (&embedded[..at], &embedded[at + 2..]),
            None => (embedded, ""),
        },
    };

    let mut lines = head.lines();
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .trim_start_matches("HTTP/1.1 ")
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| {
            TableError::MalformedResponse(format!("unparseable status line: {:?}", status_line))
        })?;

    let mut etag = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("etag") {
                etag = Some(value.trim().to_string());
            }
        }
    }

    Ok((status, etag, body.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH_BOUNDARY: &str = "batchresponse_0123";
    const CHANGESET_BOUNDARY: &str = "changesetresponse_4567";

    fn success_part(status_line: &str, etag: Option<&str>) -> String {
        let mut part = String::new();
        part.push_str("Content-Type: application/http\r\n");
        part.push_str("Content-Transfer-Encoding: binary\r\n");
        part.push_str("\r\n");
        part.push_str(&format!("HTTP/1.1 {}\r\n", status_line));
        part.push_str("X-Content-Type-Options: nosniff\r\n");
        part.push_str("Cache-Control: no-cache\r\n");
        if let Some(etag) = etag {
            part.push_str(&format!("ETag: {}\r\n", etag));
        }
        part.push_str("DataServiceVersion: 1.0;\r\n");
        part.push_str("\r\n");
        part
    }

    fn error_part(status_line: &str, json: &str) -> String {
        let mut part = String::new();
        part.push_str("Content-Type: application/http\r\n");
        part.push_str("Content-Transfer-Encoding: binary\r\n");
        part.push_str("\r\n");
        part.push_str(&format!("HTTP/1.1 {}\r\n", status_line));
        part.push_str("Content-Type: application/json;odata=minimalmetadata\r\n");
        part.push_str("\r\n");
        part.push_str(json);
        part.push_str("\r\n");
        part
    }

    fn batch_body(parts: &[String]) -> String {
        let mut body = String::new();
        body.push_str(&format!("--{}\r\n", BATCH_BOUNDARY));
        body.push_str(&format!(
            "Content-Type: multipart/mixed; boundary={}\r\n\r\n",
            CHANGESET_BOUNDARY
        ));
        for part in parts {
            body.push_str(&format!("--{}\r\n", CHANGESET_BOUNDARY));
            body.push_str(part);
        }
        body.push_str(&format!("--{}--\r\n", CHANGESET_BOUNDARY));
        body.push_str(&format!("--{}--\r\n", BATCH_BOUNDARY));
        body
    }

    fn content_type() -> String {
        format!("multipart/mixed; boundary={}", BATCH_BOUNDARY)
    }

    #[test]
    fn test_success_etags_in_order() {
        let body = batch_body(&[
            success_part("204 No Content", Some("W/\"datetime'one'\"")),
            success_part("204 No Content", Some("W/\"datetime'two'\"")),
        ]);
        let etags = parse_batch_response(202, Some(&content_type()), &body, 2).unwrap();
        assert_eq!(
            etags,
            vec![
                Some("W/\"datetime'one'\"".to_string()),
                Some("W/\"datetime'two'\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_delete_slot_is_none() {
        let body = batch_body(&[
            success_part("204 No Content", Some("W/\"datetime'one'\"")),
            success_part("204 No Content", None),
        ]);
        let etags = parse_batch_response(202, Some(&content_type()), &body, 2).unwrap();
        assert_eq!(etags[0].as_deref(), Some("W/\"datetime'one'\""));
        assert_eq!(etags[1], None);
    }

    #[test]
    fn test_error_part_rejects_whole_batch() {
        let body = batch_body(&[error_part(
            "404 Not Found",
            r#"{"odata.error":{"code":"ResourceNotFound","message":{"lang":"en-US","value":"1:The specified resource does not exist."}}}"#,
        )]);
        let err = parse_batch_response(202, Some(&content_type()), &body, 2).unwrap_err();
        match err {
            TableError::BatchRejected {
                index,
                status,
                code,
                message,
            } => {
                assert_eq!(index, 1);
                assert_eq!(status, 404);
                assert_eq!(code, "ResourceNotFound");
                assert_eq!(message, "The specified resource does not exist.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_without_index_prefix_uses_position() {
        let body = batch_body(&[
            success_part("204 No Content", Some("W/\"x\"")),
            error_part(
                "409 Conflict",
                r#"{"odata.error":{"code":"EntityAlreadyExists","message":{"value":"The specified entity already exists."}}}"#,
            ),
        ]);
        let err = parse_batch_response(202, Some(&content_type()), &body, 2).unwrap_err();
        match err {
            TableError::BatchRejected { index, status, .. } => {
                assert_eq!(index, 1);
                assert_eq!(status, 409);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_top_level_rejection_skips_part_parsing() {
        let err = parse_batch_response(
            400,
            Some("application/json"),
            r#"{"odata.error":{"code":"InvalidInput","message":{"value":"0:Bad request."}}}"#,
            2,
        )
        .unwrap_err();
        match err {
            TableError::BatchRejected {
                index,
                status,
                code,
                ..
            } => {
                assert_eq!(index, 0);
                assert_eq!(status, 400);
                assert_eq!(code, "InvalidInput");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_top_level_rejection_with_plain_body() {
        let err = parse_batch_response(503, None, "service unavailable", 1).unwrap_err();
        match err {
            TableError::BatchRejected { status, message, .. } => {
                assert_eq!(status, 503);
                assert_eq!(message, "service unavailable");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_part_count_mismatch_is_malformed() {
        let body = batch_body(&[success_part("204 No Content", Some("W/\"x\""))]);
        let err = parse_batch_response(202, Some(&content_type()), &body, 2).unwrap_err();
        assert!(matches!(err, TableError::MalformedResponse(_)));
    }

    #[test]
    fn test_missing_boundary_is_malformed() {
        let err =
            parse_batch_response(202, Some("application/json"), "{}", 1).unwrap_err();
        assert!(matches!(err, TableError::MalformedResponse(_)));
    }

    #[test]
    fn test_garbled_part_is_malformed() {
        let body = batch_body(&["not an http part at all\r\n".to_string()]);
        let err = parse_batch_response(202, Some(&content_type()), &body, 1).unwrap_err();
        assert!(matches!(err, TableError::MalformedResponse(_)));
    }
}
