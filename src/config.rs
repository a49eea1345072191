// Environment-driven configuration

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::fee_router::{FeeSplit, Recipients};
use crate::models::{is_zero_address, Address};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub bind_addr: SocketAddr,
    /// Engine owner and initial fee router owner
    pub owner: Address,
    /// Token the faucet and default markets settle in
    pub settlement_token: String,
    pub fee_split: FeeSplit,
    pub recipients: Recipients,
    pub state_path: PathBuf,
    /// Honour a caller-supplied `timestamp` on `/rpc/call`. Dev and test only.
    pub allow_time_override: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1234)),
            owner: "owner".to_string(),
            settlement_token: "USDC".to_string(),
            fee_split: FeeSplit::default(),
            recipients: Recipients::default(),
            state_path: PathBuf::from("data/engine_state.json"),
            allow_time_override: false,
        }
    }
}

impl EngineConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(v) => v
                .parse()
                .map_err(|e| format!("BIND_ADDR '{}' is not a socket address: {}", v, e))?,
            None => defaults.bind_addr,
        };

        let owner = get("ENGINE_OWNER").unwrap_or(defaults.owner);
        if is_zero_address(&owner) {
            return Err("ENGINE_OWNER must not be the zero address".to_string());
        }

        let fee_split = match get("FEE_SPLIT_BPS") {
            Some(v) => FeeSplit::parse(&v).map_err(|e| format!("FEE_SPLIT_BPS: {}", e))?,
            None => defaults.fee_split,
        };
        fee_split.validate().map_err(|e| format!("FEE_SPLIT_BPS: {}", e))?;

        let recipients = Recipients {
            lp_vault: get("LP_VAULT").unwrap_or(defaults.recipients.lp_vault),
            promo_pool: get("PROMO_POOL").unwrap_or(defaults.recipients.promo_pool),
            insurance_fund: get("INSURANCE_FUND").unwrap_or(defaults.recipients.insurance_fund),
            treasury: get("TREASURY").unwrap_or(defaults.recipients.treasury),
        };
        recipients.validate().map_err(|e| format!("fee recipients: {}", e))?;

        let allow_time_override = match get("ALLOW_TIME_OVERRIDE") {
            Some(v) => parse_flag(&v).ok_or_else(|| format!("ALLOW_TIME_OVERRIDE '{}' is not a boolean", v))?,
            None => defaults.allow_time_override,
        };

        Ok(Self {
            bind_addr,
            owner,
            settlement_token: get("SETTLEMENT_TOKEN").unwrap_or(defaults.settlement_token),
            fee_split,
            recipients,
            state_path: get("STATE_PATH").map(PathBuf::from).unwrap_or(defaults.state_path),
            allow_time_override,
        })
    }

    pub fn log_summary(&self) {
        tracing::info!(
            bind = %self.bind_addr,
            owner = %self.owner,
            token = %self.settlement_token,
            state = %self.state_path.display(),
            "⚙️  configuration loaded"
        );
        if self.allow_time_override {
            tracing::warn!("⚠️  ALLOW_TIME_OVERRIDE is on: callers choose their own block time");
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
