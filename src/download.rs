use crate::encoder::DataUrl;
use crate::error::{Result, TryOnError};
use crate::types::{is_inline_source, HistoryEntry, ImageReference};

const RESULT_BASE_NAME: &str = "nano-style-tryon";
const HISTORY_BASE_NAME: &str = "nano-history";

/// A decoded image ready to be saved or offered as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DownloadFile {
    /// Download for the current composite.
    pub fn for_result(result: &ImageReference) -> Result<Self> {
        Self::from_source(RESULT_BASE_NAME, &result.source)
    }

    /// Download for a history entry, named after the entry id.
    pub fn for_history_entry(entry: &HistoryEntry) -> Result<Self> {
        Self::from_source(
            &format!("{}-{}", HISTORY_BASE_NAME, entry.id),
            &entry.result_ref,
        )
    }

    fn from_source(base_name: &str, source: &str) -> Result<Self> {
        if !is_inline_source(source) {
            return Err(TryOnError::Decode(
                "only inline images can be downloaded".into(),
            ));
        }
        let data_url = DataUrl::parse(source)?;
        let bytes = data_url.bytes()?;
        Ok(Self {
            file_name: format!("{}.{}", base_name, extension_for(&data_url.mime_type)),
            mime_type: data_url.mime_type,
            bytes,
        })
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}
