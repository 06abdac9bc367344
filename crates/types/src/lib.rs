//! # Chain Claim 共有型定義
//!
//! 発行者・償還者・検証者の間で受け渡されるデータ構造をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - アドレス: `0x`プレフィックス付き40桁hex（入力は大文字小文字を問わない、出力は小文字）
//! - 32バイト値（秘密鍵、署名のr/s）: `0x`プレフィックス付き64桁hex
//! - JSONのフィールド名はcamelCase（ethers.jsの`splitSignature`出力と同じ形）

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 型定義レイヤのエラー型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    /// hex文字列のデコード失敗
    #[error("hexデコードに失敗しました: {0}")]
    InvalidHex(String),
    /// バイト長の不一致
    #[error("バイト長が不正です: 期待値 {expected}, 実際 {actual}")]
    InvalidLength {
        /// 期待されるバイト長
        expected: usize,
        /// 実際のバイト長
        actual: usize,
    },
}

/// `0x`プレフィックス（任意）付きhex文字列を固定長バイト列にデコードする。
pub fn decode_hex_array<const N: usize>(s: &str) -> Result<[u8; N], TypesError> {
    let stripped = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| TypesError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        })
}

/// バイト列を`0x`プレフィックス付き小文字hexに変換する。
pub fn encode_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// 32バイト値を`0x`hexでシリアライズするためのserdeヘルパ。
mod hex32 {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex_prefixed(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex_array(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// アドレス
// ---------------------------------------------------------------------------

/// 20バイトのEVMアカウントアドレス。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// ゼロアドレス
    pub const ZERO: Address = Address([0u8; 20]);

    /// 内部のバイト列を返す。
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// ABIエンコード用に左ゼロ詰めした32バイトワードを返す。
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// ゼロアドレスかどうか
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex_array::<20>(s.trim()).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex_prefixed(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// 署名ドメイン・メッセージ
// ---------------------------------------------------------------------------

/// EIP-712署名ドメイン。
///
/// 発行時・償還時・検証時で完全に同一でなければならない。
/// 一つのデプロイに署名をスコープし、別ドメインへのリプレイを防ぐ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningDomain {
    /// ドメイン名（例: "some name"）
    pub name: String,
    /// ドメインバージョン（例: "1"）
    pub version: String,
    /// チェーンID
    pub chain_id: u64,
    /// 検証コントラクトのアドレス
    pub verifying_contract: Address,
}

impl SigningDomain {
    /// ドメインの各フィールドを検査する。
    ///
    /// 欠損値（空文字列、チェーンID 0、ゼロアドレス）はデフォルトで補わずにエラーとする。
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("nameが空です".to_string());
        }
        if self.version.is_empty() {
            return Err("versionが空です".to_string());
        }
        if self.chain_id == 0 {
            return Err("chainIdが0です".to_string());
        }
        if self.verifying_contract.is_zero() {
            return Err("verifyingContractがゼロアドレスです".to_string());
        }
        Ok(())
    }
}

/// `Claim(address chainedAddress)` 型のメッセージ。両ホップで署名される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimMessage {
    /// 連鎖先のアドレス（1ホップ目: ワンタイムアドレス、2ホップ目: 最終受取人）
    pub chained_address: Address,
}

impl ClaimMessage {
    /// 指定アドレスを対象とするメッセージを構築する。
    pub fn new(chained_address: Address) -> Self {
        Self { chained_address }
    }
}

// ---------------------------------------------------------------------------
// 署名
// ---------------------------------------------------------------------------

/// 分割済みのsecp256k1署名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSignature {
    /// リカバリID（27 or 28）
    pub v: u8,
    /// 署名のr成分
    #[serde(with = "hex32")]
    pub r: [u8; 32],
    /// 署名のs成分（low-s正規化済み）
    #[serde(with = "hex32")]
    pub s: [u8; 32],
}

// ---------------------------------------------------------------------------
// クレームコード
// ---------------------------------------------------------------------------

/// 帯域外で受け渡されるクレームコード。
///
/// ワンタイム秘密鍵と、そのアドレスに対する発行者署名の組。
/// 秘密鍵を読めた者は誰でも償還できるため、秘匿チャネルで運ぶこと。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCode {
    /// ワンタイム鍵ペアの秘密鍵
    #[serde(with = "hex32")]
    pub private_key: [u8; 32],
    /// 発行者署名（Signature1）
    #[serde(flatten)]
    pub signature: ClaimSignature,
}

impl fmt::Debug for ClaimCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimCode")
            .field("private_key", &"<redacted>")
            .field("signature", &self.signature)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// 償還バンドル
// ---------------------------------------------------------------------------

/// 検証者に渡すペイロード。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionBundle {
    /// 償還対象のワンタイムアドレス（クレデンシャルの識別子）
    pub one_time_address: Address,
    /// 最終受取人のアドレス
    pub final_recipient_address: Address,
    /// 発行者署名（Signature1、メッセージ `{chainedAddress: oneTimeAddress}`）
    pub issuer_signature: ClaimSignature,
    /// 受取人署名（Signature2、メッセージ `{chainedAddress: finalRecipientAddress}`）
    pub recipient_signature: ClaimSignature,
}

impl RedemptionBundle {
    /// 検証コントラクトの引数形に並べ替える。Signature1が先。
    pub fn call_args(&self) -> ClaimCallArgs {
        ClaimCallArgs {
            one_time_address: self.one_time_address,
            v: [self.issuer_signature.v, self.recipient_signature.v],
            r: [self.issuer_signature.r, self.recipient_signature.r],
            s: [self.issuer_signature.s, self.recipient_signature.s],
        }
    }
}

/// 検証コントラクトが受け付ける `(oneTimeAddress, [v1, v2], [r1, r2], [s1, s2])`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimCallArgs {
    /// ワンタイムアドレス
    pub one_time_address: Address,
    /// `[v1, v2]`
    pub v: [u8; 2],
    /// `[r1, r2]`
    pub r: [[u8; 32]; 2],
    /// `[s1, s2]`
    pub s: [[u8; 32]; 2],
}

/// JSON出力用の中間表現。
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimCallArgsJson {
    one_time_address: Address,
    v: [u8; 2],
    r: [String; 2],
    s: [String; 2],
}

impl Serialize for ClaimCallArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ClaimCallArgsJson {
            one_time_address: self.one_time_address,
            v: self.v,
            r: [encode_hex_prefixed(&self.r[0]), encode_hex_prefixed(&self.r[1])],
            s: [encode_hex_prefixed(&self.s[0]), encode_hex_prefixed(&self.s[1])],
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClaimCallArgs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = ClaimCallArgsJson::deserialize(deserializer)?;
        let decode = |s: &str| decode_hex_array::<32>(s).map_err(serde::de::Error::custom);
        Ok(ClaimCallArgs {
            one_time_address: raw.one_time_address,
            v: raw.v,
            r: [decode(&raw.r[0])?, decode(&raw.r[1])?],
            s: [decode(&raw.s[0])?, decode(&raw.s[1])?],
        })
    }
}
