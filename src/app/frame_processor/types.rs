// SPDX-License-Identifier: MPL-2.0

//! Types for QR scan results

/// What a decoded QR payload represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrAction {
    /// URL that can be opened in a browser
    Url(String),
    /// Phone number (tel: URI)
    Phone(String),
    /// Email address (mailto: URI)
    Email(String),
    /// WiFi network credentials
    Wifi {
        ssid: String,
        password: Option<String>,
        security: String,
    },
    /// Anything else
    Text(String),
}

impl QrAction {
    /// Classify a decoded payload
    pub fn classify(payload: &str) -> Self {
        let trimmed = payload.trim();

        if trimmed.starts_with("WIFI:") {
            return Self::parse_wifi(trimmed);
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Self::Url(trimmed.to_string());
        }

        if let Some(number) = trimmed.strip_prefix("tel:") {
            return Self::Phone(number.to_string());
        }

        if let Some(rest) = trimmed.strip_prefix("mailto:") {
            let address = rest.split_once('?').map_or(rest, |(a, _)| a);
            return Self::Email(address.to_string());
        }

        // Bare domains
        if !trimmed.contains(char::is_whitespace)
            && trimmed.len() < 256
            && (lower.starts_with("www.")
                || [".com", ".org", ".net", ".io"]
                    .iter()
                    .any(|tld| lower.ends_with(tld)))
        {
            return Self::Url(format!("https://{}", trimmed));
        }

        Self::Text(trimmed.to_string())
    }

    /// Parse `WIFI:T:WPA;S:network;P:password;;`
    fn parse_wifi(content: &str) -> Self {
        let mut ssid = String::new();
        let mut password = None;
        let mut security = String::from("nopass");

        let content = content.strip_prefix("WIFI:").unwrap_or(content);
        for part in content.trim_end_matches(';').split(';') {
            if let Some((key, value)) = part.split_once(':') {
                let value = value.replace("\\:", ":").replace("\\\\", "\\");
                match key {
                    "S" => ssid = value,
                    "P" => password = Some(value),
                    "T" => security = value,
                    _ => {}
                }
            }
        }

        Self::Wifi {
            ssid,
            password,
            security,
        }
    }

    /// URI that can be handed to the system opener, if any
    pub fn openable_uri(&self) -> Option<String> {
        match self {
            Self::Url(url) => Some(url.clone()),
            Self::Phone(number) => Some(format!("tel:{}", number)),
            Self::Email(address) => Some(format!("mailto:{}", address)),
            Self::Wifi { .. } | Self::Text(_) => None,
        }
    }

    /// Short label for the status bar
    pub fn label(&self) -> &'static str {
        match self {
            Self::Url(_) => "Link",
            Self::Phone(_) => "Phone",
            Self::Email(_) => "Email",
            Self::Wifi { .. } => "WiFi",
            Self::Text(_) => "Text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_distinguished_from_text() {
        assert_eq!(
            QrAction::classify("https://example.com/a?b=c"),
            QrAction::Url("https://example.com/a?b=c".to_string())
        );
        assert_eq!(
            QrAction::classify("www.example.org"),
            QrAction::Url("https://www.example.org".to_string())
        );
        assert_eq!(
            QrAction::classify("hello world"),
            QrAction::Text("hello world".to_string())
        );
    }

    #[test]
    fn uri_schemes() {
        assert_eq!(
            QrAction::classify("tel:+123456"),
            QrAction::Phone("+123456".to_string())
        );
        assert_eq!(
            QrAction::classify("mailto:a@b.c?subject=hi").openable_uri(),
            Some("mailto:a@b.c".to_string())
        );
    }

    #[test]
    fn wifi_payload() {
        let action = QrAction::classify("WIFI:T:WPA;S:home;P:secret;;");
        assert_eq!(
            action,
            QrAction::Wifi {
                ssid: "home".to_string(),
                password: Some("secret".to_string()),
                security: "WPA".to_string(),
            }
        );
        assert!(action.openable_uri().is_none());
    }
}
