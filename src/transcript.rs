use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// One chat record after header separation, ready for the message model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    pub offset_ms: u64,
    pub nick: String,
    pub color: Option<String>,
    pub body: String,
}

/// A parsed transcript: the leading metadata header plus the ordered chat
/// records.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub header: Value,
    pub records: Vec<ChatRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    attributes: RawAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct RawAttributes {
    #[serde(rename = "video-offset")]
    video_offset: Option<u64>,
    command: Option<String>,
    from: Option<String>,
    message: Option<String>,
    #[serde(default)]
    tags: Option<RawTags>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTags {
    #[serde(rename = "display-name")]
    display_name: Option<String>,
    color: Option<String>,
}

pub fn load_transcript(path: &Path) -> Result<Transcript> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read chat transcript {}", path.display()))?;
    parse_transcript(&raw)
        .with_context(|| format!("invalid chat transcript {}", path.display()))
}

pub fn parse_transcript(raw: &str) -> Result<Transcript> {
    let mut elements: Vec<Value> =
        serde_json::from_str(raw).context("transcript is not a JSON array")?;
    if elements.is_empty() {
        bail!("transcript is empty");
    }

    // First element is video metadata, not a chat record.
    let header = elements.remove(0);

    let mut records = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        let record: RawRecord = serde_json::from_value(element)
            .with_context(|| format!("malformed chat record at index {}", index + 1))?;
        let attributes = record.attributes;

        // Room commands carry no displayable text.
        if attributes.command.as_deref() == Some("ROOMSTATE") {
            continue;
        }
        let Some(body) = attributes.message else {
            continue;
        };

        let offset_ms = attributes.video_offset.ok_or_else(|| {
            anyhow!("chat record at index {} is missing video-offset", index + 1)
        })?;
        let tags = attributes.tags.unwrap_or_default();
        let nick = tags
            .display_name
            .or(attributes.from)
            .ok_or_else(|| anyhow!("chat record at index {} has no sender name", index + 1))?;

        records.push(ChatRecord {
            offset_ms,
            nick,
            color: tags.color,
            body,
        });
    }

    if records.is_empty() {
        bail!("transcript contains no chat messages");
    }
    records.sort_by_key(|record| record.offset_ms);

    Ok(Transcript { header, records })
}
