//! # 連鎖署名検証
//!
//! 検証コントラクト側が行う検査の参照実装。
//!
//! クレデンシャル（ワンタイムアドレスで識別）ごとの状態機械 `Issued → Redeemed`（終端）。
//! 遷移条件:
//! - Signature1 が `{chainedAddress: oneTimeAddress}` に対して信頼された発行者に復元される
//! - Signature2 が `{chainedAddress: finalRecipientAddress}` に対して `finalRecipientAddress` に復元される
//! - クレデンシャルが未償還である
//!
//! いずれかが失敗した場合は状態を変えずに中断する。

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chain_claim_crypto::recover_typed_data_signer;
use chain_claim_types::{Address, ClaimMessage, ClaimSignature, RedemptionBundle, SigningDomain};

use crate::VerificationError;

/// 連鎖のどちらの署名か
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    /// Signature1（発行者 → ワンタイムアドレス）
    Issuer,
    /// Signature2（受取人 → 最終受取人アドレス）
    Recipient,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hop::Issuer => f.write_str("発行者"),
            Hop::Recipient => f.write_str("受取人"),
        }
    }
}

/// クレデンシャルの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// 発行済み・未償還
    Issued,
    /// 償還済み（終端）
    Redeemed,
}

fn check_hop(
    hop: Hop,
    domain: &SigningDomain,
    chained_address: Address,
    signature: &ClaimSignature,
    expected: Address,
) -> Result<(), VerificationError> {
    let message = ClaimMessage::new(chained_address);
    let recovered = recover_typed_data_signer(domain, &message, signature)
        .map_err(|source| VerificationError::UnrecoverableSignature { hop, source })?;
    if recovered != expected {
        return Err(VerificationError::SignatureRecoveryMismatch {
            hop,
            expected,
            recovered,
        });
    }
    Ok(())
}

/// 2つの署名を連鎖として検査する。状態は持たない。
pub fn verify_chain(
    domain: &SigningDomain,
    trusted_issuer: Address,
    bundle: &RedemptionBundle,
) -> Result<(), VerificationError> {
    domain.validate().map_err(VerificationError::InvalidDomain)?;
    check_hop(
        Hop::Issuer,
        domain,
        bundle.one_time_address,
        &bundle.issuer_signature,
        trusted_issuer,
    )?;
    check_hop(
        Hop::Recipient,
        domain,
        bundle.final_recipient_address,
        &bundle.recipient_signature,
        bundle.final_recipient_address,
    )
}

/// 一回限りの償還を強制する検証者。
///
/// 償還済み集合への check-and-set は単一のロック下で行うため、
/// 同じクレームコードのバンドルが並行に提出されても成功するのは1件のみ。
#[derive(Debug)]
pub struct ClaimVerifier {
    domain: SigningDomain,
    trusted_issuer: Address,
    redeemed: Mutex<HashSet<Address>>,
}

impl ClaimVerifier {
    /// 信頼する発行者アドレスとドメインで検証者を構築する。
    pub fn new(trusted_issuer: Address, domain: SigningDomain) -> Result<Self, VerificationError> {
        domain.validate().map_err(VerificationError::InvalidDomain)?;
        Ok(Self {
            domain,
            trusted_issuer,
            redeemed: Mutex::new(HashSet::new()),
        })
    }

    /// 信頼する発行者アドレス
    pub fn trusted_issuer(&self) -> Address {
        self.trusted_issuer
    }

    /// 署名連鎖のみを検査する（状態は変えない）。
    pub fn verify_chain(&self, bundle: &RedemptionBundle) -> Result<(), VerificationError> {
        verify_chain(&self.domain, self.trusted_issuer, bundle)
    }

    /// 連鎖を検査し、成功した場合のみクレデンシャルを `Redeemed` に遷移させる。
    pub fn verify_and_redeem(&self, bundle: &RedemptionBundle) -> Result<(), VerificationError> {
        if let Err(e) = self.verify_chain(bundle) {
            tracing::warn!(
                one_time_address = %bundle.one_time_address,
                error = %e,
                "償還を拒否しました"
            );
            return Err(e);
        }

        let mut redeemed = self.redeemed.lock().unwrap_or_else(PoisonError::into_inner);
        if !redeemed.insert(bundle.one_time_address) {
            tracing::warn!(
                one_time_address = %bundle.one_time_address,
                "償還済みクレデンシャルの再提出を拒否しました"
            );
            return Err(VerificationError::CredentialAlreadyRedeemed(
                bundle.one_time_address,
            ));
        }

        tracing::info!(
            one_time_address = %bundle.one_time_address,
            final_recipient = %bundle.final_recipient_address,
            "クレデンシャルを償還しました"
        );
        Ok(())
    }

    /// クレデンシャルの現在の状態
    pub fn state(&self, one_time_address: &Address) -> CredentialState {
        let redeemed = self.redeemed.lock().unwrap_or_else(PoisonError::into_inner);
        if redeemed.contains(one_time_address) {
            CredentialState::Redeemed
        } else {
            CredentialState::Issued
        }
    }
}
