use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::{ContractStatus, RiskLevel};
use crate::table::Selection;

#[derive(Parser, Debug)]
#[command(
    name = "contractwise",
    version,
    about = "Terminal client for the ContractWise contract dashboard"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Signup(SignupArgs),
    Login(LoginArgs),
    Logout(LogoutArgs),
    Status(StatusArgs),
    #[command(subcommand)]
    Contracts(ContractsCommand),
    Upload(UploadArgs),
    Ask(AskArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    #[arg(long, default_value = ".cache/contractwise")]
    pub cache_root: PathBuf,

    #[arg(
        long,
        env = "CONTRACTWISE_API_BASE_URL",
        default_value = "http://127.0.0.1:8000"
    )]
    pub api_base_url: String,

    #[arg(long, default_value_t = 15_000)]
    pub timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct SignupArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(long)]
    pub username: String,

    #[arg(long, env = "CONTRACTWISE_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long)]
    pub confirm_password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(long)]
    pub username: String,

    #[arg(long, env = "CONTRACTWISE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug, Clone)]
pub struct LogoutArgs {
    #[arg(long, default_value = ".cache/contractwise")]
    pub cache_root: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Subcommand, Debug)]
pub enum ContractsCommand {
    List(ListArgs),
    Show(ShowArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusChoice {
    All,
    Active,
    RenewalDue,
    Expired,
    Unknown,
}

impl StatusChoice {
    pub fn selection(self) -> Selection<ContractStatus> {
        match self {
            Self::All => Selection::All,
            Self::Active => Selection::Only(ContractStatus::Active),
            Self::RenewalDue => Selection::Only(ContractStatus::RenewalDue),
            Self::Expired => Selection::Only(ContractStatus::Expired),
            Self::Unknown => Selection::Only(ContractStatus::Unknown),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RiskChoice {
    All,
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskChoice {
    pub fn selection(self) -> Selection<RiskLevel> {
        match self {
            Self::All => Selection::All,
            Self::Low => Selection::Only(RiskLevel::Low),
            Self::Medium => Selection::Only(RiskLevel::Medium),
            Self::High => Selection::Only(RiskLevel::High),
            Self::Unknown => Selection::Only(RiskLevel::Unknown),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(long, default_value = "")]
    pub search: String,

    #[arg(long, value_enum, default_value_t = StatusChoice::All)]
    pub status: StatusChoice,

    #[arg(long, value_enum, default_value_t = RiskChoice::All)]
    pub risk: RiskChoice,

    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    pub id: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[arg(long)]
    pub expiry_date: Option<String>,

    #[arg(long, default_value_t = 200)]
    pub tick_ms: u64,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    pub question: Option<String>,

    #[arg(long, default_value_t = false)]
    pub interactive: bool,

    #[arg(long, default_value_t = false)]
    pub examples: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
