use serde::Serialize;

use crate::model::{ContractStatus, RiskLevel};
use crate::upload::MediaType;

/// Visual weight attached to a status or risk badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Positive,
    Caution,
    Critical,
    Plain,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Caution => "caution",
            Self::Critical => "critical",
            Self::Plain => "plain",
        }
    }
}

pub trait Badge {
    fn label(&self) -> &'static str;
    fn tone(&self) -> Tone;
}

impl Badge for ContractStatus {
    fn label(&self) -> &'static str {
        self.as_str()
    }

    fn tone(&self) -> Tone {
        match self {
            Self::Active => Tone::Positive,
            Self::RenewalDue => Tone::Caution,
            Self::Expired => Tone::Critical,
            Self::Unknown => Tone::Plain,
        }
    }
}

impl Badge for RiskLevel {
    fn label(&self) -> &'static str {
        self.as_str()
    }

    fn tone(&self) -> Tone {
        match self {
            Self::Low => Tone::Positive,
            Self::Medium => Tone::Caution,
            Self::High => Tone::Critical,
            Self::Unknown => Tone::Plain,
        }
    }
}

pub fn render_badge(badge: &impl Badge) -> String {
    match badge.tone() {
        Tone::Plain => badge.label().to_string(),
        tone => format!("{} [{}]", badge.label(), tone.as_str()),
    }
}

pub fn file_glyph(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Pdf => "PDF",
        MediaType::Docx => "DOC",
        MediaType::PlainText => "TXT",
    }
}
