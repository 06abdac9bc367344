//! # クレームコード発行
//!
//! 発行者の長期鍵で、新規生成したワンタイムアドレスに「このアドレスはクレームできる」と署名する。
//! ネットワークや永続状態には触れない。

use chain_claim_crypto::{sign_typed_data, KeyPair};
use chain_claim_types::{ClaimCode, ClaimMessage, SigningDomain};

use crate::credential::Credential;
use crate::ClaimError;

/// クレームコードを1件発行する。
///
/// 1. ドメインを検査する（欠損値は補わずに `InvalidDomain`）
/// 2. ワンタイム鍵ペアを生成する
/// 3. `{chainedAddress: oneTimeAddress}` に発行者鍵で署名する
pub fn issue(issuer_key: &KeyPair, domain: &SigningDomain) -> Result<ClaimCode, ClaimError> {
    domain.validate().map_err(ClaimError::InvalidDomain)?;

    let credential = Credential::generate();
    let message = ClaimMessage::new(credential.address());
    let signature = sign_typed_data(issuer_key, domain, &message)?;

    tracing::debug!(
        issuer = %issuer_key.address(),
        one_time_address = %credential.address(),
        "クレームコードを発行しました"
    );

    Ok(credential.into_claim_code(signature))
}

/// 独立したクレームコードを `count` 件発行する。
pub fn issue_batch(
    issuer_key: &KeyPair,
    domain: &SigningDomain,
    count: usize,
) -> Result<Vec<ClaimCode>, ClaimError> {
    domain.validate().map_err(ClaimError::InvalidDomain)?;
    (0..count).map(|_| issue(issuer_key, domain)).collect()
}
