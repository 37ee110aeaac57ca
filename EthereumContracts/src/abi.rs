//! Calldata encoding and return-data decoding for the handful of contracts
//! the orchestrators talk to: ERC-20 tokens, the gateway deposit/bridge pair,
//! the token-pairs registries and the state oracles.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;

use crate::error::{ChainError, ChainResult};
use crate::types::{EventLog, ReceiptSummary};

pub const ERC20_BALANCE_OF: &str = "balanceOf(address)";
pub const ERC20_ALLOWANCE: &str = "allowance(address,address)";
pub const ERC20_APPROVE: &str = "approve(address,uint256)";
pub const ERC20_DECIMALS: &str = "decimals()";
pub const ERC20_SYMBOL: &str = "symbol()";

pub const GATEWAY_DEPOSIT: &str = "deposit(uint96,address,uint256)";
pub const GATEWAY_WITHDRAW: &str = "withdraw(uint96,address,uint256)";
pub const GATEWAY_CLAIM: &str = "claim(uint256,address,uint256,bytes)";
pub const PAIRS_ORIGINAL_TO_MINTED: &str = "originalToMinted(address)";
pub const PAIRS_MINTED_TO_ORIGINAL: &str = "mintedToOriginal(address)";
pub const ORACLE_LAST_BLOCK_NUM: &str = "lastBlockNum()";

pub const DEPOSIT_EVENT: &str = "Deposit(uint256,address,address,uint256)";
pub const WITHDRAWAL_EVENT: &str = "Withdrawal(uint256,address,address,uint256)";

/// Largest value a `uint96` nonce may take.
pub const UINT96_MAX: u128 = (1u128 << 96) - 1;

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn event_topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

pub fn encode_call(signature: &str, tokens: &[Token]) -> Bytes {
    let mut data = Vec::with_capacity(4 + 32 * tokens.len());
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&abi::encode(tokens));
    Bytes::from(data)
}

pub fn balance_of(owner: Address) -> Bytes {
    encode_call(ERC20_BALANCE_OF, &[Token::Address(owner)])
}

pub fn allowance(owner: Address, spender: Address) -> Bytes {
    encode_call(ERC20_ALLOWANCE, &[Token::Address(owner), Token::Address(spender)])
}

pub fn approve(spender: Address, amount: U256) -> Bytes {
    encode_call(ERC20_APPROVE, &[Token::Address(spender), Token::Uint(amount)])
}

pub fn decimals() -> Bytes {
    encode_call(ERC20_DECIMALS, &[])
}

pub fn symbol() -> Bytes {
    encode_call(ERC20_SYMBOL, &[])
}

pub fn gateway_deposit(uid: u128, token: Address, amount: U256) -> ChainResult<Bytes> {
    gateway_outbound(GATEWAY_DEPOSIT, uid, token, amount)
}

pub fn gateway_withdraw(uid: u128, token: Address, amount: U256) -> ChainResult<Bytes> {
    gateway_outbound(GATEWAY_WITHDRAW, uid, token, amount)
}

fn gateway_outbound(signature: &str, uid: u128, token: Address, amount: U256) -> ChainResult<Bytes> {
    if uid > UINT96_MAX {
        return Err(ChainError::AbiError(format!("nonce {} does not fit in uint96", uid)));
    }
    Ok(encode_call(
        signature,
        &[Token::Uint(U256::from(uid)), Token::Address(token), Token::Uint(amount)],
    ))
}

/// Claim calldata. The deployed gateways take the record's id, token and
/// amount (as emitted in its `Deposit`/`Withdrawal` event) alongside the
/// proof, not the source transaction hash.
pub fn gateway_claim(record_id: U256, token: Address, amount: U256, proof: Bytes) -> Bytes {
    encode_call(
        GATEWAY_CLAIM,
        &[
            Token::Uint(record_id),
            Token::Address(token),
            Token::Uint(amount),
            Token::Bytes(proof.to_vec()),
        ],
    )
}

pub fn original_to_minted(original: Address) -> Bytes {
    encode_call(PAIRS_ORIGINAL_TO_MINTED, &[Token::Address(original)])
}

pub fn minted_to_original(minted: Address) -> Bytes {
    encode_call(PAIRS_MINTED_TO_ORIGINAL, &[Token::Address(minted)])
}

pub fn last_block_num() -> Bytes {
    encode_call(ORACLE_LAST_BLOCK_NUM, &[])
}

pub fn decode_uint(data: &[u8]) -> ChainResult<U256> {
    match abi::decode(&[ParamType::Uint(256)], data)?.into_iter().next() {
        Some(Token::Uint(value)) => Ok(value),
        other => Err(ChainError::AbiError(format!("expected uint, got {:?}", other))),
    }
}

pub fn decode_string(data: &[u8]) -> ChainResult<String> {
    match abi::decode(&[ParamType::String], data)?.into_iter().next() {
        Some(Token::String(value)) => Ok(value),
        other => Err(ChainError::AbiError(format!("expected string, got {:?}", other))),
    }
}

pub fn decode_address(data: &[u8]) -> ChainResult<Address> {
    match abi::decode(&[ParamType::Address], data)?.into_iter().next() {
        Some(Token::Address(address)) => Ok(address),
        other => Err(ChainError::AbiError(format!("expected address, got {:?}", other))),
    }
}

/// A `Deposit` or `Withdrawal` record emitted by the gateway contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRecord {
    pub id: U256,
    pub owner: Address,
    pub token: Address,
    pub amount: U256,
    pub block_number: u64,
}

impl GatewayRecord {
    /// Finds the first log with `event` emitted by `contract` in the receipt.
    pub fn from_receipt(
        receipt: &ReceiptSummary,
        contract: Address,
        event: &'static str,
    ) -> ChainResult<Self> {
        let topic = event_topic(event);
        let log = receipt
            .logs
            .iter()
            .find(|log| log.address == contract && log.topics.first() == Some(&topic))
            .ok_or(ChainError::EventNotFound {
                event,
                tx_hash: receipt.tx_hash,
            })?;
        Self::from_log(log, receipt.block_number)
    }

    fn from_log(log: &EventLog, block_number: u64) -> ChainResult<Self> {
        if log.topics.len() < 3 {
            return Err(ChainError::AbiError(format!(
                "expected 3 topics, found {}",
                log.topics.len()
            )));
        }
        let id = U256::from_big_endian(log.topics[1].as_bytes());
        let owner = Address::from(log.topics[2]);

        let tokens = abi::decode(&[ParamType::Address, ParamType::Uint(256)], &log.data)?;
        match tokens.as_slice() {
            [Token::Address(token), Token::Uint(amount)] => Ok(Self {
                id,
                owner,
                token: *token,
                amount: *amount,
                block_number,
            }),
            other => Err(ChainError::AbiError(format!("unexpected event data {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erc20_selectors() {
        assert_eq!(hex_of(&selector(ERC20_APPROVE)), "095ea7b3");
        assert_eq!(hex_of(&selector(ERC20_BALANCE_OF)), "70a08231");
        assert_eq!(hex_of(&selector(ERC20_ALLOWANCE)), "dd62ed3e");
        assert_eq!(hex_of(&selector(ERC20_DECIMALS)), "313ce567");
    }

    #[test]
    fn test_approve_layout() {
        let spender = Address::from_low_u64_be(0xbeef);
        let data = approve(spender, U256::from(42));
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[4 + 12..4 + 32], spender.as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(42));
    }

    #[test]
    fn test_nonce_must_fit_uint96() {
        let token = Address::from_low_u64_be(1);
        assert!(gateway_deposit(UINT96_MAX, token, U256::one()).is_ok());
        assert!(gateway_deposit(UINT96_MAX + 1, token, U256::one()).is_err());
    }

    #[test]
    fn test_record_from_receipt() {
        let contract = Address::from_low_u64_be(7);
        let owner = Address::from_low_u64_be(8);
        let token = Address::from_low_u64_be(9);
        let mut owner_topic = [0u8; 32];
        owner_topic[12..].copy_from_slice(owner.as_bytes());

        let receipt = ReceiptSummary {
            tx_hash: H256::repeat_byte(1),
            block_number: 1234,
            status: Some(1),
            logs: vec![EventLog {
                address: contract,
                topics: vec![
                    event_topic(DEPOSIT_EVENT),
                    H256::from_low_u64_be(77),
                    H256::from(owner_topic),
                ],
                data: Bytes::from(abi::encode(&[Token::Address(token), Token::Uint(U256::from(500))])),
            }],
        };

        let record = GatewayRecord::from_receipt(&receipt, contract, DEPOSIT_EVENT).unwrap();
        assert_eq!(record.id, U256::from(77));
        assert_eq!(record.owner, owner);
        assert_eq!(record.token, token);
        assert_eq!(record.amount, U256::from(500));
        assert_eq!(record.block_number, 1234);

        let missing = GatewayRecord::from_receipt(&receipt, contract, WITHDRAWAL_EVENT);
        assert!(matches!(missing, Err(ChainError::EventNotFound { .. })));
    }

    fn hex_of(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
