// Media URL extraction from chat message entities
//
// Entity offsets and lengths count UTF-16 code units, as chat platforms
// report them, so slicing goes through `encode_utf16`.

use serde::{Deserialize, Serialize};

use super::classifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityKind {
    /// Plain URL typed into the text
    Url,
    /// Link hidden behind display text
    TextLink { url: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(flatten)]
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMessage {
    pub text: Option<String>,
    pub caption: Option<String>,
    pub entities: Vec<MessageEntity>,
    pub caption_entities: Vec<MessageEntity>,
    pub reply_to: Option<Box<ChatMessage>>,
}

/// First media URL carried by the message's link entities, falling back
/// to the message it replies to.
pub fn extract_media_url(message: &ChatMessage) -> Option<String> {
    std::iter::once(message)
        .chain(message.reply_to.as_deref())
        .find_map(media_url_in)
}

fn media_url_in(message: &ChatMessage) -> Option<String> {
    // plain-URL entities in the body may index into the caption for media posts
    let body = message.text.as_deref().or(message.caption.as_deref());

    let from_body = message
        .entities
        .iter()
        .filter_map(|entity| entity_url(entity, body));
    let from_caption = message
        .caption_entities
        .iter()
        .filter_map(|entity| entity_url(entity, message.caption.as_deref()));

    from_body
        .chain(from_caption)
        .find(|url| classifier::is_media_url(url))
}

fn entity_url(entity: &MessageEntity, text: Option<&str>) -> Option<String> {
    match &entity.kind {
        EntityKind::Url => utf16_slice(text?, entity.offset, entity.length),
        EntityKind::TextLink { url } => Some(url.clone()),
        EntityKind::Other => None,
    }
}

fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = offset.checked_add(length)?;
    let slice = units.get(offset..end)?;
    String::from_utf16(slice).ok()
}
