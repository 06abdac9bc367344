//! # ワンタイムクレデンシャル
//!
//! クレームコードに埋め込まれるワンタイム鍵ペア。所持がそのまま認可となる持参人式クレデンシャル。
//! 発行者や受取人の長期鍵とは型で区別し、発行ごとにOSの乱数源から新規生成する。

use chain_claim_crypto::KeyPair;
use chain_claim_types::{Address, ClaimCode, ClaimSignature};

use crate::ClaimError;

/// ワンタイム鍵ペア。
#[derive(Debug)]
pub struct Credential {
    key: KeyPair,
}

impl Credential {
    /// 新しいワンタイム鍵ペアを生成する。他のエントロピーからは導出しない。
    pub(crate) fn generate() -> Self {
        Self {
            key: KeyPair::generate(),
        }
    }

    /// 受け取ったクレームコードの秘密鍵からクレデンシャルを復元する。
    pub fn from_claim_code(claim_code: &ClaimCode) -> Result<Self, ClaimError> {
        let key = KeyPair::from_bytes(&claim_code.private_key)?;
        Ok(Self { key })
    }

    /// クレデンシャルを識別するワンタイムアドレス
    pub fn address(&self) -> Address {
        self.key.address()
    }

    /// 発行者署名と組にしてクレームコードを作る。
    pub(crate) fn into_claim_code(self, signature: ClaimSignature) -> ClaimCode {
        ClaimCode {
            private_key: self.key.secret_bytes(),
            signature,
        }
    }
}
