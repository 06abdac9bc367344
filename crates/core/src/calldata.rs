//! # 償還コールデータ構築
//!
//! 償還バンドルを検証コントラクトの
//! `takeBalance(address,uint8[2],bytes32[2],bytes32[2])` 呼び出しデータにABIエンコードする。
//! ガス見積もり・送信は扱わない。

use chain_claim_crypto::keccak256;
use chain_claim_types::ClaimCallArgs;

/// 関数シグネチャ
pub const TAKE_BALANCE_SIGNATURE: &str = "takeBalance(address,uint8[2],bytes32[2],bytes32[2])";

/// 関数セレクタ（`keccak256(signature)` の先頭4バイト）
pub fn take_balance_selector() -> [u8; 4] {
    let hash = keccak256(TAKE_BALANCE_SIGNATURE.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn u8_word(value: u8) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[31] = value;
    word
}

/// コールデータを構築する。
///
/// 引数は全て静的型のため、セレクタ + 32バイトワード7個の固定長（228バイト）になる。
pub fn encode_take_balance(args: &ClaimCallArgs) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 7 * 32);
    out.extend_from_slice(&take_balance_selector());
    out.extend_from_slice(&args.one_time_address.to_word());
    for v in args.v {
        out.extend_from_slice(&u8_word(v));
    }
    for r in &args.r {
        out.extend_from_slice(r);
    }
    for s in &args.s {
        out.extend_from_slice(s);
    }
    out
}
