//! Cursor pagination for the proposal listing.
//!
//! A cursor names the creation sequence of the first proposal on the next
//! page. Proposals are append-only, so a cursor stays valid however many
//! proposals are created between two page requests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Page size when `count` is not given.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

pub const MAX_PAGE_SIZE: u32 = 1000;

/// Query parameters accepted by list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    /// Opaque cursor from a previous response.
    pub cursor: Option<String>,
    pub count: Option<u32>,
}

impl PaginationParams {
    /// Page size clamped to `[1, MAX_PAGE_SIZE]`.
    pub fn effective_count(&self) -> u32 {
        self.count
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// First sequence number to include. `Err` on a cursor this server did
    /// not issue.
    pub fn start_sequence(&self) -> Result<u64, String> {
        match self.cursor.as_deref() {
            None | Some("") => Ok(0),
            Some(cursor) => {
                decode_cursor(cursor).ok_or_else(|| format!("malformed cursor '{cursor}'"))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Cursor for the next page; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Take one page from `items` (in sequence order) starting at the cursor.
pub fn paginate<T>(
    items: impl IntoIterator<Item = T>,
    sequence_of: impl Fn(&T) -> u64,
    params: &PaginationParams,
) -> Result<(Vec<T>, PaginationMeta), String> {
    let start = params.start_sequence()?;
    let page_size = params.effective_count() as usize;

    let mut rest = items
        .into_iter()
        .skip_while(|item| sequence_of(item) < start)
        .peekable();
    let page: Vec<T> = rest.by_ref().take(page_size).collect();
    let cursor = rest.peek().map(|next| encode_cursor(sequence_of(next)));
    Ok((page, PaginationMeta { cursor }))
}

/// Unpadded URL-safe base64 of the big-endian sequence number.
pub fn encode_cursor(sequence: u64) -> String {
    URL_SAFE_NO_PAD.encode(sequence.to_be_bytes())
}

pub fn decode_cursor(cursor: &str) -> Option<u64> {
    let bytes = URL_SAFE_NO_PAD.decode(cursor).ok()?;
    let bytes: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
