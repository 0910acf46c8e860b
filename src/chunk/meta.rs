use crate::error::{Result, ServerError};
use chrono::{DateTime, Utc};

/// Identity of one uploaded chunk, carried in the upload filename as
/// `recorderID_sessionID_chunkID_timestamp.raw` (four underscore-separated
/// tokens, extension stripped from the last one).
///
/// Chunk IDs are zero-padded by the edge uploader, so their lexicographic
/// order is the concatenation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMeta {
    pub recorder_id: String,
    pub session_id: String,
    pub chunk_id: String,
    pub timestamp: String,
}

impl ChunkMeta {
    /// Parse and validate an upload filename. Rejects anything that does
    /// not split into exactly four non-empty tokens, or whose session ID is
    /// not an integer epoch.
    pub fn parse(file_name: &str) -> Result<Self> {
        let tokens: Vec<&str> = file_name.split('_').collect();
        if tokens.len() != 4 {
            return Err(ServerError::Validation(format!(
                "cannot parse file name: {}",
                file_name
            )));
        }

        let timestamp = match tokens[3].split_once('.') {
            Some((stem, _ext)) => stem,
            None => tokens[3],
        };

        let meta = Self {
            recorder_id: tokens[0].to_string(),
            session_id: tokens[1].to_string(),
            chunk_id: tokens[2].to_string(),
            timestamp: timestamp.to_string(),
        };

        if meta.recorder_id.is_empty()
            || meta.session_id.is_empty()
            || meta.chunk_id.is_empty()
            || meta.timestamp.is_empty()
        {
            return Err(ServerError::Validation(format!(
                "empty token in file name: {}",
                file_name
            )));
        }

        if decode_session_epoch(&meta.session_id).is_none() {
            return Err(ServerError::Validation(format!(
                "session id is not an epoch value: {}",
                meta.session_id
            )));
        }

        Ok(meta)
    }

    /// File name of this chunk inside its staging directory.
    pub fn staged_file_name(&self) -> String {
        format!("{}_{}.raw", self.chunk_id, self.timestamp)
    }
}

/// Session identifiers are their creation instant, as nanoseconds since the
/// Unix epoch.
pub fn decode_session_epoch(session_id: &str) -> Option<DateTime<Utc>> {
    let nanos: i64 = session_id.parse().ok()?;
    Some(DateTime::from_timestamp_nanos(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_name() {
        let meta = ChunkMeta::parse("rec01_1700000000000000000_0042_987654.raw").unwrap();
        assert_eq!(meta.recorder_id, "rec01");
        assert_eq!(meta.session_id, "1700000000000000000");
        assert_eq!(meta.chunk_id, "0042");
        assert_eq!(meta.timestamp, "987654");
        assert_eq!(meta.staged_file_name(), "0042_987654.raw");
    }

    #[test]
    fn keeps_timestamp_without_extension() {
        let meta = ChunkMeta::parse("rec01_1700000000000000000_0001_123").unwrap();
        assert_eq!(meta.timestamp, "123");
    }

    #[test]
    fn rejects_wrong_token_count() {
        assert!(ChunkMeta::parse("rec01_123_0001.raw").is_err());
        assert!(ChunkMeta::parse("a_b_c_d_e.raw").is_err());
        assert!(ChunkMeta::parse("").is_err());
    }

    #[test]
    fn rejects_empty_tokens() {
        assert!(ChunkMeta::parse("_1700000000000000000_0001_123.raw").is_err());
        assert!(ChunkMeta::parse("rec01_1700000000000000000__123.raw").is_err());
    }

    #[test]
    fn rejects_non_epoch_session_id() {
        assert!(ChunkMeta::parse("rec01_latest_0001_123.raw").is_err());
    }

    #[test]
    fn decodes_epoch_nanos() {
        let ts = decode_session_epoch("1700000000000000000").unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert!(decode_session_epoch("not-a-number").is_none());
    }
}
