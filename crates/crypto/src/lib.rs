//! # Chain Claim 暗号処理
//!
//! クレーム委任プロトコルが依存する署名プリミティブを実装する。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | 署名 | ECDSA secp256k1（RFC 6979決定的nonce、low-s正規化） |
//! | ハッシュ | Keccak-256 |
//! | 構造化データ | EIP-712 (v4) |
//! | アドレス | Keccak-256(非圧縮公開鍵)の下位20バイト |

pub mod eip712;

use std::fmt;

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

use chain_claim_types::{decode_hex_array, Address, ClaimSignature};

pub use eip712::{
    claim_struct_hash, claim_type_hash, domain_separator, domain_type_hash,
    recover_typed_data_signer, sign_typed_data, typed_data_digest,
};

/// 暗号処理のエラー型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// 秘密鍵のパース失敗（長さ不正、ゼロ、曲線位数以上）
    #[error("秘密鍵が不正です: {0}")]
    MalformedKey(String),
    /// 署名のr/sが不正
    #[error("署名が不正です: {0}")]
    InvalidSignature(String),
    /// vが27/28（または0/1）以外
    #[error("リカバリIDが不正です: v = {0}")]
    InvalidRecoveryId(u8),
    /// 公開鍵の復元に失敗
    #[error("署名者の復元に失敗しました: {0}")]
    RecoveryFailed(String),
    /// 署名生成に失敗
    #[error("署名生成に失敗しました: {0}")]
    SigningFailed(String),
}

/// Keccak-256ハッシュ計算。
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// 公開鍵からアドレスを導出する。
///
/// 非圧縮SEC1表現の先頭`0x04`を除いた64バイトをKeccak-256し、下位20バイトを取る。
pub fn address_of(verifying_key: &VerifyingKey) -> Address {
    let encoded = verifying_key.as_affine().to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    Address(addr)
}

/// EIP-55形式（大文字小文字混在チェックサム）のアドレス文字列を返す。
pub fn checksum_address(address: &Address) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// 鍵ペア
// ---------------------------------------------------------------------------

/// secp256k1鍵ペアと導出済みアドレス。
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    address: Address,
}

impl KeyPair {
    /// OSの暗号論的乱数源から新しい鍵ペアを生成する。
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// 32バイトの秘密鍵から鍵ペアを復元する。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::MalformedKey(format!(
                "32バイトである必要があります（実際: {}バイト）",
                bytes.len()
            )));
        }
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|_| CryptoError::MalformedKey("ゼロまたは曲線位数以上の値です".to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// `0x`付き（任意）hex文字列から鍵ペアを復元する。
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = decode_hex_array::<32>(s.trim())
            .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// 導出済みアドレス
    pub fn address(&self) -> Address {
        self.address
    }

    /// 秘密鍵の32バイト表現
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// 署名鍵への参照
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// 32バイトのダイジェストにリカバリ可能署名を付与する。
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<ClaimSignature, CryptoError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        Ok(to_claim_signature(&signature, recovery_id))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// 署名の分割・結合・復元
// ---------------------------------------------------------------------------

fn to_claim_signature(signature: &Signature, recovery_id: RecoveryId) -> ClaimSignature {
    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    ClaimSignature {
        v: 27 + recovery_id.to_byte(),
        r,
        s,
    }
}

/// 65バイトのコンパクト署名 `r ‖ s ‖ v` を分割する。
pub fn split_signature(bytes: &[u8]) -> Result<ClaimSignature, CryptoError> {
    if bytes.len() != 65 {
        return Err(CryptoError::InvalidSignature(format!(
            "65バイトである必要があります（実際: {}バイト）",
            bytes.len()
        )));
    }
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..64]);
    let v = match bytes[64] {
        v @ (0 | 1) => v + 27,
        v => v,
    };
    normalize_v(v)?;
    Ok(ClaimSignature { v, r, s })
}

/// 分割済み署名を65バイトの `r ‖ s ‖ v` に結合する。
pub fn join_signature(signature: &ClaimSignature) -> [u8; 65] {
    let mut out = [0u8; 65];
    out[..32].copy_from_slice(&signature.r);
    out[32..64].copy_from_slice(&signature.s);
    out[64] = signature.v;
    out
}

fn normalize_v(v: u8) -> Result<RecoveryId, CryptoError> {
    let id = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => return Err(CryptoError::InvalidRecoveryId(v)),
    };
    RecoveryId::from_byte(id).ok_or(CryptoError::InvalidRecoveryId(v))
}

/// ダイジェストと署名から署名者アドレスを復元する。
///
/// high-s署名は可鍛性を持つため拒否する。
pub fn recover_digest_signer(
    digest: &[u8; 32],
    signature: &ClaimSignature,
) -> Result<Address, CryptoError> {
    let recovery_id = normalize_v(signature.v)?;
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);
    let sig = Signature::from_slice(&rs)
        .map_err(|_| CryptoError::InvalidSignature("r/sがゼロまたは曲線位数以上です".to_string()))?;
    if sig.normalize_s().is_some() {
        return Err(CryptoError::InvalidSignature("sがlow-sではありません".to_string()));
    }
    let verifying_key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
    Ok(address_of(&verifying_key))
}
