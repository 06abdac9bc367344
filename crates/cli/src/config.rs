//! # CLI設定
//!
//! コマンドライン引数と環境変数からの設定解決。
//! 発行者鍵・コントラクトアドレス等のデプロイパラメータはコードに埋め込まず、実行時に注入する。
//! 引数が環境変数より優先される。必須項目の欠損はデフォルトで補わずにエラーとする。

use clap::Args;

use chain_claim_crypto::KeyPair;
use chain_claim_types::{Address, SigningDomain};

/// 署名ドメイン名の環境変数
pub const ENV_DOMAIN_NAME: &str = "CLAIM_DOMAIN_NAME";
/// 署名ドメインバージョンの環境変数
pub const ENV_DOMAIN_VERSION: &str = "CLAIM_DOMAIN_VERSION";
/// チェーンIDの環境変数
pub const ENV_CHAIN_ID: &str = "CLAIM_CHAIN_ID";
/// 検証コントラクトアドレスの環境変数
pub const ENV_VERIFYING_CONTRACT: &str = "CLAIM_VERIFYING_CONTRACT";
/// 発行者秘密鍵の環境変数
pub const ENV_ISSUER_PRIVATE_KEY: &str = "ISSUER_PRIVATE_KEY";
/// 受取人秘密鍵の環境変数
pub const ENV_RECIPIENT_PRIVATE_KEY: &str = "RECIPIENT_PRIVATE_KEY";
/// 信頼する発行者アドレスの環境変数
pub const ENV_ISSUER_ADDRESS: &str = "CLAIM_ISSUER_ADDRESS";

/// 設定解決のエラー型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// 必須設定の欠損
    #[error("{setting} が設定されていません（--{flag} または環境変数 {env_var}）")]
    Missing {
        /// 設定項目名
        setting: &'static str,
        /// 対応するフラグ名
        flag: &'static str,
        /// 対応する環境変数名
        env_var: &'static str,
    },
    /// 設定値の形式不正
    #[error("{setting} が不正です: {reason}")]
    Invalid {
        /// 設定項目名
        setting: &'static str,
        /// 理由
        reason: String,
    },
}

/// 環境変数の参照関数。テストでは固定のマップに差し替える。
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// 引数 → 環境変数の順で値を解決する。空文字列は未設定として扱う。
pub fn resolve(flag: Option<String>, env_var: &str, env: EnvLookup<'_>) -> Option<String> {
    flag.or_else(|| env(env_var)).filter(|v| !v.trim().is_empty())
}

fn require(
    flag_value: Option<String>,
    setting: &'static str,
    flag: &'static str,
    env_var: &'static str,
    env: EnvLookup<'_>,
) -> Result<String, ConfigError> {
    resolve(flag_value, env_var, env).ok_or(ConfigError::Missing {
        setting,
        flag,
        env_var,
    })
}

/// 署名ドメインを構成する引数（全サブコマンド共通）
#[derive(Debug, Clone, Default, Args)]
pub struct DomainArgs {
    /// EIP-712ドメイン名
    #[arg(long, global = true)]
    pub domain_name: Option<String>,
    /// EIP-712ドメインバージョン
    #[arg(long, global = true)]
    pub domain_version: Option<String>,
    /// チェーンID
    #[arg(long, global = true)]
    pub chain_id: Option<String>,
    /// 検証コントラクトのアドレス
    #[arg(long, global = true)]
    pub verifying_contract: Option<String>,
}

impl DomainArgs {
    /// 署名ドメインを解決・検査する。
    pub fn resolve(&self, env: EnvLookup<'_>) -> Result<SigningDomain, ConfigError> {
        let name = require(
            self.domain_name.clone(),
            "ドメイン名",
            "domain-name",
            ENV_DOMAIN_NAME,
            env,
        )?;
        let version = require(
            self.domain_version.clone(),
            "ドメインバージョン",
            "domain-version",
            ENV_DOMAIN_VERSION,
            env,
        )?;
        let chain_id_raw = require(
            self.chain_id.clone(),
            "チェーンID",
            "chain-id",
            ENV_CHAIN_ID,
            env,
        )?;
        let chain_id = chain_id_raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::Invalid {
                setting: "チェーンID",
                reason: e.to_string(),
            })?;
        let contract_raw = require(
            self.verifying_contract.clone(),
            "検証コントラクトアドレス",
            "verifying-contract",
            ENV_VERIFYING_CONTRACT,
            env,
        )?;
        let verifying_contract: Address =
            contract_raw.parse().map_err(|e: chain_claim_types::TypesError| {
                ConfigError::Invalid {
                    setting: "検証コントラクトアドレス",
                    reason: e.to_string(),
                }
            })?;

        let domain = SigningDomain {
            name,
            version,
            chain_id,
            verifying_contract,
        };
        domain.validate().map_err(|reason| ConfigError::Invalid {
            setting: "署名ドメイン",
            reason,
        })?;
        Ok(domain)
    }
}

/// 発行者秘密鍵を解決する。
pub fn resolve_issuer_key(flag: Option<String>, env: EnvLookup<'_>) -> Result<KeyPair, ConfigError> {
    let raw = require(
        flag,
        "発行者秘密鍵",
        "issuer-key",
        ENV_ISSUER_PRIVATE_KEY,
        env,
    )?;
    KeyPair::from_hex(&raw).map_err(|e| ConfigError::Invalid {
        setting: "発行者秘密鍵",
        reason: e.to_string(),
    })
}

/// 受取人秘密鍵を解決する。未設定なら `None`。
pub fn resolve_recipient_key(
    flag: Option<String>,
    env: EnvLookup<'_>,
) -> Result<Option<KeyPair>, ConfigError> {
    resolve(flag, ENV_RECIPIENT_PRIVATE_KEY, env)
        .map(|raw| {
            KeyPair::from_hex(&raw).map_err(|e| ConfigError::Invalid {
                setting: "受取人秘密鍵",
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// 信頼する発行者アドレスを解決する。
pub fn resolve_issuer_address(
    flag: Option<String>,
    env: EnvLookup<'_>,
) -> Result<Address, ConfigError> {
    let raw = require(
        flag,
        "発行者アドレス",
        "issuer-address",
        ENV_ISSUER_ADDRESS,
        env,
    )?;
    raw.parse().map_err(|e: chain_claim_types::TypesError| ConfigError::Invalid {
        setting: "発行者アドレス",
        reason: e.to_string(),
    })
}
