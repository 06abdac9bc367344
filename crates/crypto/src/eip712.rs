//! # EIP-712 構造化データ署名
//!
//! `Claim(address chainedAddress)` 型と
//! `EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)`
//! ドメインに対するハッシュ・署名・署名者復元。
//!
//! エンコーディングはMetaMaskの`eth_signTypedData_v4`（ethers.jsの`_signTypedData`）と同一。
//! 型文字列のフィールド順・名前を変えると全ての既存署名が無効になる。

use chain_claim_types::{Address, ClaimMessage, ClaimSignature, SigningDomain};

use crate::{keccak256, recover_digest_signer, CryptoError, KeyPair};

/// ドメイン型の正規型文字列
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// クレーム型の正規型文字列
pub const CLAIM_TYPE: &str = "Claim(address chainedAddress)";

/// `keccak256(DOMAIN_TYPE)`
pub fn domain_type_hash() -> [u8; 32] {
    keccak256(DOMAIN_TYPE.as_bytes())
}

/// `keccak256(CLAIM_TYPE)`
pub fn claim_type_hash() -> [u8; 32] {
    keccak256(CLAIM_TYPE.as_bytes())
}

fn u64_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// ドメインセパレータ。
///
/// `keccak256(typeHash ‖ keccak256(name) ‖ keccak256(version) ‖ uint256(chainId) ‖ verifyingContract)`
pub fn domain_separator(domain: &SigningDomain) -> [u8; 32] {
    let mut buf = Vec::with_capacity(32 * 5);
    buf.extend_from_slice(&domain_type_hash());
    buf.extend_from_slice(&keccak256(domain.name.as_bytes()));
    buf.extend_from_slice(&keccak256(domain.version.as_bytes()));
    buf.extend_from_slice(&u64_word(domain.chain_id));
    buf.extend_from_slice(&domain.verifying_contract.to_word());
    keccak256(&buf)
}

/// `hashStruct(Claim)` = `keccak256(typeHash ‖ chainedAddress)`
pub fn claim_struct_hash(message: &ClaimMessage) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(&claim_type_hash());
    buf[32..].copy_from_slice(&message.chained_address.to_word());
    keccak256(&buf)
}

/// 署名対象ダイジェスト `keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ hashStruct(message))`
pub fn typed_data_digest(domain: &SigningDomain, message: &ClaimMessage) -> [u8; 32] {
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(&domain_separator(domain));
    buf[34..].copy_from_slice(&claim_struct_hash(message));
    keccak256(&buf)
}

/// 構造化データに署名する。RFC 6979により同じ入力からは同じ署名が得られる。
pub fn sign_typed_data(
    key: &KeyPair,
    domain: &SigningDomain,
    message: &ClaimMessage,
) -> Result<ClaimSignature, CryptoError> {
    key.sign_digest(&typed_data_digest(domain, message))
}

/// 構造化データの署名から署名者アドレスを復元する。
pub fn recover_typed_data_signer(
    domain: &SigningDomain,
    message: &ClaimMessage,
    signature: &ClaimSignature,
) -> Result<Address, CryptoError> {
    recover_digest_signer(&typed_data_digest(domain, message), signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum_address;

    const ISSUER_KEY: &str = "0xad54bdeade5537fb0a553190159783e45d02d316a992db05cbed606d3ca36b39";
    const ONE_TIME_KEY: &str = "0x0a5589471b52f44060df73baf742061ea6dbd62575eb173c63108145bd42a2c5";

    fn test_domain() -> SigningDomain {
        SigningDomain {
            name: "some name".to_string(),
            version: "1".to_string(),
            chain_id: 1,
            verifying_contract: "0xb07dAd0000000000000000000000000000000001".parse().unwrap(),
        }
    }

    #[test]
    fn test_type_hashes() {
        assert_eq!(
            hex::encode(domain_type_hash()),
            "8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f"
        );
        assert_eq!(
            hex::encode(claim_type_hash()),
            "9085804fb491e5bbdf50ca3096299cdc8ff7dfd17941c1156a0c793b11e81be3"
        );
    }

    #[test]
    fn test_domain_separator_known_value() {
        assert_eq!(
            hex::encode(domain_separator(&test_domain())),
            "a7fba4aae837538b1bbc5a7434a7220d3a665f54a5d0c2ced3aed03ed583721c"
        );
    }

    /// ethers.jsの`_signTypedData`が出力したクレームコードと完全に一致すること
    #[test]
    fn test_sign_matches_ethers_output() {
        let issuer = KeyPair::from_hex(ISSUER_KEY).unwrap();
        let one_time = KeyPair::from_hex(ONE_TIME_KEY).unwrap();
        assert_eq!(
            checksum_address(&one_time.address()),
            "0x4E6dcf7f155e69071eaeBc40229C0C0CB140BC5d"
        );

        let message = ClaimMessage::new(one_time.address());
        assert_eq!(
            hex::encode(typed_data_digest(&test_domain(), &message)),
            "7fe63ec8c1dab97057c72828471cf2900b1ccfa146febe8caf5fef85bc661d46"
        );

        let sig = sign_typed_data(&issuer, &test_domain(), &message).unwrap();
        assert_eq!(sig.v, 28);
        assert_eq!(
            hex::encode(sig.r),
            "a12aeea4f5ab2b8c0178a03dee44de8afdf20e29d3372c37596ad1f8b6055b4a"
        );
        assert_eq!(
            hex::encode(sig.s),
            "46f49da040c486ebc0cd78b35487abbb482405765ab1d6fbd3bf535351114cae"
        );

        let recovered = recover_typed_data_signer(&test_domain(), &message, &sig).unwrap();
        assert_eq!(recovered, issuer.address());
    }

    #[test]
    fn test_sign_is_deterministic() {
        let key = KeyPair::generate();
        let message = ClaimMessage::new(KeyPair::generate().address());
        let a = sign_typed_data(&key, &test_domain(), &message).unwrap();
        let b = sign_typed_data(&key, &test_domain(), &message).unwrap();
        assert_eq!(a, b);
    }

    /// ドメイン・メッセージのどの1バイトを変えても復元アドレスが変わること
    #[test]
    fn test_single_byte_changes_invalidate_signature() {
        let key = KeyPair::generate();
        let domain = test_domain();
        let message = ClaimMessage::new(KeyPair::generate().address());
        let sig = sign_typed_data(&key, &domain, &message).unwrap();
        assert_eq!(
            recover_typed_data_signer(&domain, &message, &sig).unwrap(),
            key.address()
        );

        for i in 0..20 {
            let mut changed = domain.clone();
            changed.verifying_contract.0[i] ^= 0x01;
            assert_ne!(
                recover_typed_data_signer(&changed, &message, &sig).ok(),
                Some(key.address()),
                "verifyingContract byte {i}"
            );
        }

        let mut changed = domain.clone();
        changed.chain_id = 2;
        assert_ne!(
            recover_typed_data_signer(&changed, &message, &sig).ok(),
            Some(key.address())
        );

        let mut changed = domain.clone();
        changed.name = "some namf".to_string();
        assert_ne!(
            recover_typed_data_signer(&changed, &message, &sig).ok(),
            Some(key.address())
        );

        for i in 0..20 {
            let mut changed = message;
            changed.chained_address.0[i] ^= 0x80;
            assert_ne!(
                recover_typed_data_signer(&domain, &changed, &sig).ok(),
                Some(key.address()),
                "chainedAddress byte {i}"
            );
        }
    }
}
