//! Batch wire serialization
//!
//! Renders a batch as one `multipart/mixed` transaction: an outer batch part
//! wrapping a single changeset whose `application/http` parts carry the
//! operations in append order. Each part's `Content-ID` is its 1-based
//! position, which is how the response is correlated back.
//!
//! Serialization is pure and deterministic: the multipart boundaries are
//! derived from a digest of the batch content, never from random
//! identifiers, so a retried send produces a byte-identical request.

use crate::batch::builder::Batch;
use crate::batch::types::{Operation, OperationKind};
use crate::entity::encode_properties;
use crate::errors::{Result, TableError};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use url::Url;

const CRLF: &str = "\r\n";

/// A rendered batch request: the body and the `Content-Type` header value
/// carrying the outer boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedBatch {
    /// Value for the request's `Content-Type` header
    pub content_type: String,
    /// Multipart request body
    pub body: String,
}

/// Render `batch` into a single atomic multipart request against `endpoint`.
pub fn serialize_batch(batch: &Batch, endpoint: &Url) -> Result<SerializedBatch> {
    if batch.is_empty() {
        return Err(TableError::InvalidArgument(
            "cannot serialize an empty batch".to_string(),
        ));
    }

    let base = endpoint.as_str().trim_end_matches('/');
    let parts: Vec<String> = batch
        .operations()
        .iter()
        .enumerate()
        .map(|(index, op)| render_part(batch, op, index, base))
        .collect::<Result<_>>()?;

    let (batch_boundary, changeset_boundary) = boundaries(batch, &parts);

    let mut body = String::new();
    body.push_str(&format!("--{}{}", batch_boundary, CRLF));
    body.push_str(&format!(
        "Content-Type: multipart/mixed; boundary={}{}",
        changeset_boundary, CRLF
    ));
    body.push_str(CRLF);
    for part in &parts {
        body.push_str(&format!("--{}{}", changeset_boundary, CRLF));
        body.push_str(part);
    }
    body.push_str(&format!("--{}--{}", changeset_boundary, CRLF));
    body.push_str(&format!("--{}--{}", batch_boundary, CRLF));

    Ok(SerializedBatch {
        content_type: format!("multipart/mixed; boundary={}", batch_boundary),
        body,
    })
}

/// Boundary tokens derived from the batch content.
fn boundaries(batch: &Batch, parts: &[String]) -> (String, String) {
    let mut hasher = Sha256::new();
    hasher.update(batch.table().as_bytes());
    hasher.update([0]);
    hasher.update(batch.partition_key().as_bytes());
    for part in parts {
        hasher.update([0]);
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    (
        format!("batch_{}", &digest[..16]),
        format!("changeset_{}", &digest[16..32]),
    )
}

fn render_part(batch: &Batch, op: &Operation, index: usize, base: &str) -> Result<String> {
    let uri = if matches!(op.kind, OperationKind::Insert) {
        // Inserts address the table; the keys travel in the body.
        format!("{}/{}", base, batch.table())
    } else {
        entity_uri(base, batch.table(), batch.partition_key(), &op.row_key)
    };

    let mut part = String::new();
    part.push_str(&format!("Content-Type: application/http{}", CRLF));
    part.push_str(&format!("Content-Transfer-Encoding: binary{}", CRLF));
    part.push_str(&format!("Content-ID: {}{}", index + 1, CRLF));
    part.push_str(CRLF);
    part.push_str(&format!("{} {} HTTP/1.1{}", op.kind.http_method(), uri, CRLF));
    part.push_str(&format!(
        "Accept: application/json;odata=minimalmetadata{}",
        CRLF
    ));
    if op.kind.is_conditional() {
        let etag = op.if_match.as_deref().unwrap_or("*");
        part.push_str(&format!("If-Match: {}{}", etag, CRLF));
    }
    match &op.payload {
        Some(properties) => {
            let mut object = Map::new();
            object.insert(
                "PartitionKey".to_string(),
                Value::String(batch.partition_key().to_string()),
            );
            object.insert("RowKey".to_string(), Value::String(op.row_key.clone()));
            object.append(&mut encode_properties(properties));
            let json = serde_json::to_string(&Value::Object(object))?;
            part.push_str(&format!("Content-Type: application/json{}", CRLF));
            part.push_str(CRLF);
            part.push_str(&json);
            part.push_str(CRLF);
        }
        None => {
            part.push_str(CRLF);
        }
    }
    Ok(part)
}

/// Characters percent-encoded within a key literal. Keys may legitimately
/// contain characters that are not URI-safe (spaces above all); left raw
/// they would split the part's request line. Quotes are handled by
/// doubling, not encoding, so they stay out of this set.
const KEY_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Render a key as an OData string literal: single quotes doubled, then
/// non-URI-safe characters percent-encoded.
fn key_literal(key: &str) -> String {
    let doubled = key.replace('\'', "''");
    utf8_percent_encode(&doubled, KEY_ENCODE).to_string()
}

/// OData entity addressing.
fn entity_uri(base: &str, table: &str, partition_key: &str, row_key: &str) -> String {
    format!(
        "{}/{}(PartitionKey='{}',RowKey='{}')",
        base,
        table,
        key_literal(partition_key),
        key_literal(row_key)
    )
}
