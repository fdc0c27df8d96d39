use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContractStatus {
    Active,
    RenewalDue,
    Expired,
    Unknown,
}

impl ContractStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("Active") => Self::Active,
            Some("Renewal Due") => Self::RenewalDue,
            Some("Expired") => Self::Expired,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::RenewalDue => "Renewal Due",
            Self::Expired => "Expired",
            Self::Unknown => "—",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("Low") => Self::Low,
            Some("Medium") => Self::Medium,
            Some("High") => Self::High,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Unknown => "—",
        }
    }
}

/// A contract row as rendered by the list view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractRecord {
    pub id: String,
    pub name: String,
    pub parties: Vec<String>,
    pub uploaded_on: Option<String>,
    pub status: ContractStatus,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractDetail {
    pub id: String,
    pub name: String,
    pub uploaded_on: Option<String>,
    pub expiry_date: Option<String>,
    pub status: ContractStatus,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContract {
    #[serde(alias = "doc_id")]
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub uploaded_on: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub risk_score: Option<String>,
    #[serde(default)]
    pub parties: Option<Vec<Option<String>>>,
}

impl From<RawContract> for ContractRecord {
    fn from(raw: RawContract) -> Self {
        Self {
            status: ContractStatus::parse(raw.status.as_deref()),
            risk: RiskLevel::parse(raw.risk_score.as_deref()),
            name: raw.filename.unwrap_or_default(),
            parties: raw
                .parties
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .collect(),
            uploaded_on: raw.uploaded_on,
            id: raw.id,
        }
    }
}

impl From<RawContract> for ContractDetail {
    fn from(raw: RawContract) -> Self {
        Self {
            status: ContractStatus::parse(raw.status.as_deref()),
            risk: RiskLevel::parse(raw.risk_score.as_deref()),
            name: raw.filename.unwrap_or_default(),
            uploaded_on: raw.uploaded_on,
            expiry_date: raw.expiry_date,
            id: raw.id,
        }
    }
}

/// The list endpoint answers either with a bare array or with `{"contracts": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContractListBody {
    Bare(Vec<RawContract>),
    Wrapped {
        #[serde(default)]
        contracts: Vec<RawContract>,
    },
}

impl ContractListBody {
    pub fn into_records(self) -> Vec<ContractRecord> {
        let rows = match self {
            Self::Bare(rows) => rows,
            Self::Wrapped { contracts } => contracts,
        };
        rows.into_iter().map(ContractRecord::from).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractCreate {
    pub filename: String,
    pub expiry_date: Option<String>,
    pub status: String,
    pub risk_score: String,
}

impl ContractCreate {
    pub fn for_file(filename: &str, expiry_date: Option<String>) -> Self {
        Self {
            filename: filename.to_string(),
            expiry_date,
            status: ContractStatus::Active.as_str().to_string(),
            risk_score: RiskLevel::Low.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub document: Option<UploadedDocument>,
    #[serde(default)]
    pub chunks: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedDocument {
    #[serde(default)]
    pub doc_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub chunks: Vec<RawChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawChunk {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}
