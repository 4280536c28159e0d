//! Builders for structured payloads users commonly encode.

use chrono::{DateTime, Utc};

use super::ContentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiSecurity {
    Wpa,
    Wep,
    Open,
}

impl WifiSecurity {
    fn as_str(&self) -> &'static str {
        match self {
            WifiSecurity::Wpa => "WPA",
            WifiSecurity::Wep => "WEP",
            WifiSecurity::Open => "nopass",
        }
    }
}

pub fn wifi(ssid: &str, password: &str, security: WifiSecurity) -> String {
    format!(
        "WIFI:T:{};S:{};P:{};H:false;;",
        security.as_str(),
        escape_wifi(ssid),
        escape_wifi(password)
    )
}

// Reserved characters in the WIFI: payload are backslash-escaped.
fn escape_wifi(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | ';' | ',' | ':' | '"') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub fn vcard(name: &str, phone: &str, email: &str, organization: &str) -> String {
    format!(
        "BEGIN:VCARD\nVERSION:3.0\nFN:{name}\nORG:{organization}\nTEL:{phone}\nEMAIL:{email}\nEND:VCARD"
    )
}

pub fn event(title: &str, start: DateTime<Utc>, location: &str, description: &str) -> String {
    format!(
        "BEGIN:VEVENT\nSUMMARY:{title}\nDTSTART:{}\nLOCATION:{location}\nDESCRIPTION:{description}\nEND:VEVENT",
        start.format("%Y%m%dT%H%M%SZ")
    )
}

/// Example payloads offered as starting points, one per common tag.
pub fn presets() -> Vec<(ContentType, &'static str)> {
    vec![
        (ContentType::Url, "https://example.com"),
        (ContentType::Email, "mailto:example@email.com"),
        (ContentType::Phone, "tel:+1234567890"),
        (ContentType::Sms, "sms:+1234567890?body=Hello!"),
        (
            ContentType::Wifi,
            "WIFI:T:WPA;S:NetworkName;P:Password;H:false;;",
        ),
    ]
}
