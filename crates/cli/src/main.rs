//! # Chain Claim CLI
//!
//! クレームコードの発行・償還・検証をオフラインで行うコマンドラインツール。
//!
//! ## サブコマンド
//! - `issue` — 発行者鍵でクレームコードを発行し、1行1件のJSONで出力する
//! - `redeem` — クレームコードから償還バンドル・コントラクト引数・コールデータを出力する
//! - `verify` — 償還バンドルの署名連鎖を検査する（償還済み状態は持たない）
//! - `address` — 秘密鍵に対応するEIP-55アドレスを出力する
//!
//! 標準出力は機械可読なJSONのみ。ログは標準エラー出力に書く（`RUST_LOG`で制御）。

mod config;

use std::io::{Read, Write};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use chain_claim_core::{
    encode_take_balance, issue_batch, redeem, verify_chain, ClaimCallArgs, ClaimCode, KeyPair,
    RedemptionBundle,
};
use chain_claim_crypto::checksum_address;
use chain_claim_types::encode_hex_prefixed;

use crate::config::{
    resolve_issuer_address, resolve_issuer_key, resolve_recipient_key, DomainArgs, EnvLookup,
};

#[derive(Debug, Parser)]
#[command(name = "chain-claim", version, about = "Two-hop EIP-712 claim codes")]
struct Cli {
    #[command(flatten)]
    domain: DomainArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// クレームコードを発行する
    Issue {
        /// 発行者秘密鍵（未指定なら ISSUER_PRIVATE_KEY）
        #[arg(long)]
        issuer_key: Option<String>,
        /// 発行件数
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// クレームコードを償還バンドルに変換する
    Redeem {
        /// クレームコードJSONのパス（`-` で標準入力）
        #[arg(long)]
        claim_code: String,
        /// 受取人秘密鍵（未指定なら RECIPIENT_PRIVATE_KEY、それもなければ新規生成）
        #[arg(long)]
        recipient_key: Option<String>,
    },
    /// 償還バンドルの署名連鎖を検査する
    Verify {
        /// 償還バンドルJSONのパス（`-` で標準入力）。`redeem` の出力もそのまま受け付ける
        #[arg(long)]
        bundle: String,
        /// 信頼する発行者アドレス（未指定なら CLAIM_ISSUER_ADDRESS）
        #[arg(long)]
        issuer_address: Option<String>,
    },
    /// 秘密鍵のアドレスを表示する
    Address {
        /// 秘密鍵（hex）
        #[arg(long)]
        key: String,
    },
}

/// `redeem` の出力
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RedeemOutput {
    bundle: RedemptionBundle,
    call_args: ClaimCallArgs,
    calldata: String,
    /// 受取人鍵を新規生成した場合のみ出力する
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_recipient_key: Option<String>,
}

/// `verify` の出力
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOutput {
    valid: bool,
    one_time_address: String,
    final_recipient_address: String,
}

/// パスまたは標準入力（`-`）から読み込む。
fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("標準入力の読み込みに失敗")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("{path} の読み込みに失敗"))
    }
}

/// 償還バンドルを読む。`redeem` の出力（`bundle` フィールドを持つ）も受け付ける。
fn parse_bundle(raw: &str) -> anyhow::Result<RedemptionBundle> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("償還バンドルのJSONパースに失敗")?;
    let bundle_value = match value.get("bundle") {
        Some(inner) => inner.clone(),
        None => value,
    };
    serde_json::from_value(bundle_value).context("償還バンドルの形式が不正です")
}

fn run(cli: Cli, env: EnvLookup<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
    match cli.command {
        Command::Issue { issuer_key, count } => {
            let domain = cli.domain.resolve(env)?;
            let issuer = resolve_issuer_key(issuer_key, env)?;
            tracing::info!(
                issuer = %checksum_address(&issuer.address()),
                count,
                "クレームコードを発行します"
            );
            for code in issue_batch(&issuer, &domain, count)? {
                writeln!(out, "{}", serde_json::to_string(&code)?)?;
            }
        }
        Command::Redeem {
            claim_code,
            recipient_key,
        } => {
            let domain = cli.domain.resolve(env)?;
            let code: ClaimCode = serde_json::from_str(&read_input(&claim_code)?)
                .context("クレームコードのJSONパースに失敗")?;
            let (recipient, generated) = match resolve_recipient_key(recipient_key, env)? {
                Some(key) => (key, false),
                None => {
                    tracing::warn!("受取人鍵が未指定のため新しい鍵を生成します");
                    (KeyPair::generate(), true)
                }
            };

            let bundle = redeem(&code, &recipient, &domain)?;
            let call_args = bundle.call_args();
            let calldata = encode_hex_prefixed(&encode_take_balance(&call_args));
            tracing::info!(
                one_time_address = %checksum_address(&bundle.one_time_address),
                final_recipient = %checksum_address(&bundle.final_recipient_address),
                "償還バンドルを出力します"
            );

            let output = RedeemOutput {
                bundle,
                call_args,
                calldata,
                generated_recipient_key: generated
                    .then(|| encode_hex_prefixed(&recipient.secret_bytes())),
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        Command::Verify {
            bundle,
            issuer_address,
        } => {
            let domain = cli.domain.resolve(env)?;
            let issuer = resolve_issuer_address(issuer_address, env)?;
            let bundle = parse_bundle(&read_input(&bundle)?)?;
            verify_chain(&domain, issuer, &bundle)?;

            let output = VerifyOutput {
                valid: true,
                one_time_address: checksum_address(&bundle.one_time_address),
                final_recipient_address: checksum_address(&bundle.final_recipient_address),
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        Command::Address { key } => {
            let key = KeyPair::from_hex(&key)?;
            writeln!(out, "{}", checksum_address(&key.address()))?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let env = |key: &str| std::env::var(key).ok();
    run(cli, &env, &mut std::io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use chain_claim_core::{Credential, VerificationError};

    use super::*;
    use crate::config::{
        ENV_CHAIN_ID, ENV_DOMAIN_NAME, ENV_DOMAIN_VERSION, ENV_ISSUER_ADDRESS,
        ENV_ISSUER_PRIVATE_KEY, ENV_VERIFYING_CONTRACT,
    };

    const ISSUER_KEY: &str = "0xad54bdeade5537fb0a553190159783e45d02d316a992db05cbed606d3ca36b39";
    const ISSUER_ADDRESS: &str = "0x0f6A79A579658E401E0B81c6dde1F2cd51d97176";

    fn test_env() -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&str, &str> = [
            (ENV_DOMAIN_NAME, "some name"),
            (ENV_DOMAIN_VERSION, "1"),
            (ENV_CHAIN_ID, "1"),
            (ENV_VERIFYING_CONTRACT, "0xb07dAd0000000000000000000000000000000001"),
            (ENV_ISSUER_PRIVATE_KEY, ISSUER_KEY),
            (ENV_ISSUER_ADDRESS, ISSUER_ADDRESS),
        ]
        .into_iter()
        .collect();
        move |k| map.get(k).map(|v| v.to_string())
    }

    fn run_args(args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(args)?;
        let env = test_env();
        let mut out = Vec::new();
        run(cli, &env, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    /// テスト用の一時ファイルに書き込む
    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "chain-claim-{}-{}-{name}",
            std::process::id(),
            hex::encode(KeyPair::generate().address().as_bytes())
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_issue_outputs_one_code_per_line() {
        let out = run_args(&["chain-claim", "issue", "--count", "3"]).unwrap();
        let codes: Vec<ClaimCode> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(codes.len(), 3);
        assert_ne!(codes[0].private_key, codes[1].private_key);
    }

    #[test]
    fn test_issue_redeem_verify_pipeline() {
        let out = run_args(&["chain-claim", "issue"]).unwrap();
        let code_path = write_temp("code.json", out.trim());

        let redeemed = run_args(&[
            "chain-claim",
            "redeem",
            "--claim-code",
            code_path.to_str().unwrap(),
            "--recipient-key",
            "0x0000000000000000000000000000000000000000000000000000000000000002",
        ])
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&redeemed).unwrap();
        assert_eq!(
            value["bundle"]["finalRecipientAddress"],
            "0x2b5ad5c4795c026514f8317c7a215e218dccd6cf"
        );
        assert!(value["calldata"].as_str().unwrap().starts_with("0x8f770711"));
        assert!(value.get("generatedRecipientKey").is_none());

        let code: ClaimCode = serde_json::from_str(out.trim()).unwrap();
        let expected_one_time = Credential::from_claim_code(&code).unwrap().address();
        assert_eq!(
            value["callArgs"]["oneTimeAddress"],
            expected_one_time.to_string()
        );

        let bundle_path = write_temp("bundle.json", &redeemed);
        let verified = run_args(&[
            "chain-claim",
            "verify",
            "--bundle",
            bundle_path.to_str().unwrap(),
        ])
        .unwrap();
        let verified: serde_json::Value = serde_json::from_str(&verified).unwrap();
        assert_eq!(verified["valid"], true);

        std::fs::remove_file(code_path).ok();
        std::fs::remove_file(bundle_path).ok();
    }

    #[test]
    fn test_redeem_generates_recipient_key_when_absent() {
        let out = run_args(&["chain-claim", "issue"]).unwrap();
        let code_path = write_temp("code.json", out.trim());

        let redeemed = run_args(&[
            "chain-claim",
            "redeem",
            "--claim-code",
            code_path.to_str().unwrap(),
        ])
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&redeemed).unwrap();
        let generated = value["generatedRecipientKey"].as_str().unwrap();
        let key = KeyPair::from_hex(generated).unwrap();
        assert_eq!(
            value["bundle"]["finalRecipientAddress"],
            key.address().to_string()
        );

        std::fs::remove_file(code_path).ok();
    }

    #[test]
    fn test_verify_rejects_untrusted_issuer() {
        let out = run_args(&["chain-claim", "issue"]).unwrap();
        let code: ClaimCode = serde_json::from_str(out.trim()).unwrap();
        let bundle = redeem(
            &code,
            &KeyPair::generate(),
            &DomainArgs::default().resolve(&test_env()).unwrap(),
        )
        .unwrap();
        let bundle_path = write_temp("bundle.json", &serde_json::to_string(&bundle).unwrap());

        let other_issuer = KeyPair::generate().address().to_string();
        let err = run_args(&[
            "chain-claim",
            "verify",
            "--bundle",
            bundle_path.to_str().unwrap(),
            "--issuer-address",
            &other_issuer,
        ])
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VerificationError>(),
            Some(VerificationError::SignatureRecoveryMismatch { .. })
        ));

        std::fs::remove_file(bundle_path).ok();
    }

    #[test]
    fn test_domain_flag_mismatch_breaks_chain() {
        let out = run_args(&["chain-claim", "issue", "--chain-id", "5"]).unwrap();
        let code_path = write_temp("code.json", out.trim());

        // 発行時と異なるチェーンIDで償還すると連鎖検証に失敗する
        let redeemed = run_args(&[
            "chain-claim",
            "redeem",
            "--claim-code",
            code_path.to_str().unwrap(),
        ])
        .unwrap();
        let bundle_path = write_temp("bundle.json", &redeemed);
        assert!(run_args(&[
            "chain-claim",
            "verify",
            "--bundle",
            bundle_path.to_str().unwrap(),
        ])
        .is_err());

        std::fs::remove_file(code_path).ok();
        std::fs::remove_file(bundle_path).ok();
    }

    #[test]
    fn test_address_command() {
        let out = run_args(&["chain-claim", "address", "--key", ISSUER_KEY]).unwrap();
        assert_eq!(out.trim(), ISSUER_ADDRESS);
    }

    #[test]
    fn test_parse_bundle_accepts_raw_and_wrapped() {
        let issuer = KeyPair::generate();
        let domain = DomainArgs::default().resolve(&test_env()).unwrap();
        let code = chain_claim_core::issue(&issuer, &domain).unwrap();
        let bundle = redeem(&code, &KeyPair::generate(), &domain).unwrap();

        let raw = serde_json::to_string(&bundle).unwrap();
        assert_eq!(parse_bundle(&raw).unwrap(), bundle);

        let wrapped = serde_json::json!({ "bundle": bundle }).to_string();
        assert_eq!(parse_bundle(&wrapped).unwrap(), bundle);

        assert!(parse_bundle("{}").is_err());
    }
}
