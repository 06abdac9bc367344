//! # クレームコード償還
//!
//! クレームコードの保持者が最終受取人を指名する。
//! 受取人は自分の鍵で自分のアドレス `{chainedAddress: finalRecipientAddress}` に署名し、
//! 発行者署名と合わせて検証者に渡すバンドルを組み立てる。
//!
//! 発行者署名（Signature1）はここでは検証しない。連鎖の検証は検証者の責務。

use chain_claim_crypto::{sign_typed_data, KeyPair};
use chain_claim_types::{ClaimCode, ClaimMessage, RedemptionBundle, SigningDomain};

use crate::credential::Credential;
use crate::ClaimError;

/// クレームコードを償還バンドルに変換する。
///
/// ワンタイム秘密鍵はアドレスの導出にのみ使い、新しい署名には使わない。
/// 秘密鍵がパースできない場合は署名前に `MalformedKey` で失敗する。
pub fn redeem(
    claim_code: &ClaimCode,
    recipient_key: &KeyPair,
    domain: &SigningDomain,
) -> Result<RedemptionBundle, ClaimError> {
    domain.validate().map_err(ClaimError::InvalidDomain)?;

    let one_time_address = Credential::from_claim_code(claim_code)?.address();
    let final_recipient_address = recipient_key.address();

    let message = ClaimMessage::new(final_recipient_address);
    let recipient_signature = sign_typed_data(recipient_key, domain, &message)?;

    tracing::debug!(
        one_time_address = %one_time_address,
        final_recipient = %final_recipient_address,
        "償還バンドルを構築しました"
    );

    Ok(RedemptionBundle {
        one_time_address,
        final_recipient_address,
        issuer_signature: claim_code.signature,
        recipient_signature,
    })
}
