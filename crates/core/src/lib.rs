//! # Chain Claim Core
//!
//! 2ホップのオフライン譲渡可能なクレーム委任プロトコルを実装する。
//!
//! ## 処理フロー
//! 1. 発行者がワンタイム鍵ペアを生成し、そのアドレスに署名する（[`issue`]）
//! 2. クレームコード（ワンタイム秘密鍵 + 発行者署名）を帯域外で保持者に渡す
//! 3. 保持者が最終受取人のアドレスに対する2つ目の署名を作り、償還バンドルを組み立てる（[`redeem`]）
//! 4. 検証者が2つの署名を連鎖として検証し、クレデンシャルを償還済みにする（[`ClaimVerifier`]）
//!
//! 発行と償還は純粋な計算で、共有状態を持たない。
//! 一回限りの償還を保証する直列化点は検証者の check-and-set のみ。

mod calldata;
mod credential;
mod issuer;
mod redeemer;
mod verifier;

pub use calldata::{encode_take_balance, take_balance_selector, TAKE_BALANCE_SIGNATURE};
pub use credential::Credential;
pub use issuer::{issue, issue_batch};
pub use redeemer::redeem;
pub use verifier::{verify_chain, ClaimVerifier, CredentialState, Hop};

pub use chain_claim_crypto::{CryptoError, KeyPair};
pub use chain_claim_types::{
    Address, ClaimCallArgs, ClaimCode, ClaimMessage, ClaimSignature, RedemptionBundle,
    SigningDomain,
};

/// 発行・償還（署名生成側）のエラー型。
///
/// 署名生成側はローカルな事前検査の失敗のみを返す。
/// 検証者側の拒否は [`VerificationError`] で表す。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    /// 署名ドメインのフィールドが欠損・不正
    #[error("署名ドメインが不正です: {0}")]
    InvalidDomain(String),
    /// 秘密鍵がパースできない、またはゼロ
    #[error("秘密鍵が不正です: {0}")]
    MalformedKey(String),
    /// その他の暗号処理エラー
    #[error("暗号処理に失敗しました: {0}")]
    Crypto(#[source] CryptoError),
}

impl From<CryptoError> for ClaimError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::MalformedKey(msg) => ClaimError::MalformedKey(msg),
            other => ClaimError::Crypto(other),
        }
    }
}

/// 連鎖検証のエラー型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// 検証者に設定された署名ドメインが不正
    #[error("署名ドメインが不正です: {0}")]
    InvalidDomain(String),
    /// 署名から復元したアドレスが期待値と一致しない
    #[error("{hop}署名の署名者が一致しません: 期待値 {expected}, 復元値 {recovered}")]
    SignatureRecoveryMismatch {
        /// どちらのホップの署名か
        hop: Hop,
        /// 期待される署名者
        expected: Address,
        /// 復元された署名者
        recovered: Address,
    },
    /// 署名者を復元できない（v/r/sが不正）
    #[error("{hop}署名から署名者を復元できません: {source}")]
    UnrecoverableSignature {
        /// どちらのホップの署名か
        hop: Hop,
        /// 復元失敗の原因
        #[source]
        source: CryptoError,
    },
    /// 既に償還済みのクレデンシャル
    #[error("クレデンシャルは償還済みです: {0}")]
    CredentialAlreadyRedeemed(Address),
}
