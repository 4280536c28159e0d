use serde::{Deserialize, Serialize};

/// Closed classification applied to decoded text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Url,
    Email,
    Phone,
    Sms,
    Wifi,
    Vcard,
    Event,
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Url => "url",
            ContentType::Email => "email",
            ContentType::Phone => "phone",
            ContentType::Sms => "sms",
            ContentType::Wifi => "wifi",
            ContentType::Vcard => "vcard",
            ContentType::Event => "event",
            ContentType::Text => "text",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ContentType::Url => "Website URL",
            ContentType::Email => "Email Address",
            ContentType::Phone => "Phone Number",
            ContentType::Sms => "SMS Message",
            ContentType::Wifi => "WiFi Network",
            ContentType::Vcard => "Contact Card",
            ContentType::Event => "Calendar Event",
            ContentType::Text => "Plain Text",
        }
    }

    /// Whether a host should hand the content to an external handler rather
    /// than copy it.
    pub fn opens_externally(&self) -> bool {
        matches!(
            self,
            ContentType::Url | ContentType::Email | ContentType::Phone | ContentType::Sms
        )
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentInfo {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub description: String,
}

impl From<ContentType> for ContentInfo {
    fn from(content_type: ContentType) -> Self {
        Self {
            content_type,
            description: content_type.description().to_string(),
        }
    }
}

// Checked top to bottom, first hit wins.
const PREFIX_RULES: &[(&str, ContentType)] = &[
    ("http://", ContentType::Url),
    ("https://", ContentType::Url),
    ("mailto:", ContentType::Email),
    ("tel:", ContentType::Phone),
    ("sms:", ContentType::Sms),
    ("wifi:", ContentType::Wifi),
];

const MARKER_RULES: &[(&str, ContentType)] = &[
    ("BEGIN:VCARD", ContentType::Vcard),
    ("BEGIN:VEVENT", ContentType::Event),
];

pub fn content_type_of(data: &str) -> ContentType {
    let lower = data.to_lowercase();
    if let Some((_, tag)) = PREFIX_RULES
        .iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
    {
        return *tag;
    }

    let upper = data.to_uppercase();
    MARKER_RULES
        .iter()
        .find(|(marker, _)| upper.contains(marker))
        .map(|(_, tag)| *tag)
        .unwrap_or(ContentType::Text)
}

pub fn classify(data: &str) -> ContentInfo {
    ContentInfo::from(content_type_of(data))
}
