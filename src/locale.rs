use indexmap::IndexMap;
use thiserror::Error;

/// Keys per outbound completion call.
pub const BATCH_SIZE: usize = 30;

/// One locale file: flat key -> translated string, in source order.
pub type LocaleMap = IndexMap<String, String>;

#[derive(Debug, Error)]
pub enum LocaleMapError {
    #[error("invalid locale json: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub fn parse_locale_map(text: &str) -> Result<LocaleMap, LocaleMapError> {
    Ok(serde_json::from_str(text)?)
}

pub fn first_empty_key(map: &LocaleMap) -> Option<&str> {
    map.iter()
        .find(|(_, v)| v.is_empty())
        .map(|(k, _)| k.as_str())
}

/// Splits `map` into consecutive chunks of at most `batch_size` entries.
///
/// Concatenating the chunks in order yields the original map. An empty map yields no chunks.
pub fn chunk_locale_map(map: &LocaleMap, batch_size: usize) -> Vec<LocaleMap> {
    let batch_size = batch_size.max(1);
    let mut chunks: Vec<LocaleMap> = Vec::with_capacity(map.len().div_ceil(batch_size));
    for (idx, (k, v)) in map.iter().enumerate() {
        if idx % batch_size == 0 {
            chunks.push(LocaleMap::with_capacity(batch_size));
        }
        if let Some(last) = chunks.last_mut() {
            last.insert(k.clone(), v.clone());
        }
    }
    chunks
}
