use std::fmt;
use url::Url;

/// Public suffixes Pinterest serves from.
const PINTEREST_SUFFIXES: &[&str] = &[
    "com", "ca", "co.uk", "com.au", "co.kr", "com.mx", "de", "fr", "es", "it", "pt", "ie",
    "nz", "jp", "ph", "se", "dk", "ch", "at", "cl", "ru",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    Instagram,
    TikTok,
    Facebook,
    Pinterest,
    Twitter,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::Instagram => "Instagram",
            Self::TikTok => "TikTok",
            Self::Facebook => "Facebook",
            Self::Pinterest => "Pinterest",
            Self::Twitter => "Twitter/X",
        }
    }

    /// Matches the URL host against the known platform domains, including
    /// subdomains such as `m.` or `vm.`.
    pub fn detect(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        let host = host.trim_end_matches('.');

        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

        if ["youtube.com", "youtu.be", "youtube-nocookie.com"]
            .iter()
            .any(|d| matches(d))
        {
            Some(Self::YouTube)
        } else if ["instagram.com", "instagr.am"].iter().any(|d| matches(d)) {
            Some(Self::Instagram)
        } else if matches("tiktok.com") {
            Some(Self::TikTok)
        } else if ["facebook.com", "fb.watch", "fb.com"].iter().any(|d| matches(d)) {
            Some(Self::Facebook)
        } else if matches("pin.it")
            || PINTEREST_SUFFIXES
                .iter()
                .any(|suffix| matches(&format!("pinterest.{suffix}")))
        {
            Some(Self::Pinterest)
        } else if ["twitter.com", "x.com"].iter().any(|d| matches(d)) {
            Some(Self::Twitter)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a plain text message from a user asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Link(Url),
    /// Looked like a link but could not be parsed.
    MalformedLink(String),
    Search(String),
}

impl Input {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let lower = text.to_ascii_lowercase();

        let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
            Some(text.to_string())
        } else if lower.starts_with("www.") {
            Some(format!("https://{text}"))
        } else {
            None
        };

        match candidate {
            Some(raw) => match Url::parse(&raw) {
                Ok(url) if url.host_str().is_some() => Self::Link(url),
                _ => Self::MalformedLink(text.to_string()),
            },
            None => Self::Search(text.to_string()),
        }
    }
}
