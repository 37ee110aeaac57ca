use ethers::types::Address;
use std::str::FromStr;

use crate::error::{ChainError, ChainResult};

pub fn validate_address(address: Address) -> ChainResult<()> {
    if address == Address::zero() {
        return Err(ChainError::InvalidAddress(format!("{:?}", address)));
    }
    Ok(())
}

/// Parses a `0x`-prefixed hex address, rejecting the zero address.
pub fn parse_address(input: &str) -> ChainResult<Address> {
    let address = Address::from_str(input.trim())
        .map_err(|_| ChainError::InvalidAddress(input.trim().to_string()))?;
    validate_address(address)?;
    Ok(address)
}

/// True when `input` looks like an address rather than a token symbol.
pub fn looks_like_address(input: &str) -> bool {
    let input = input.trim();
    input.len() == 42 && input.starts_with("0x") && input[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let parsed = parse_address(" 0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48 ").unwrap();
        assert_eq!(
            parsed,
            Address::from_str("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap()
        );
        assert!(parse_address("0x0000000000000000000000000000000000000000").is_err());
        assert!(parse_address("usdc").is_err());
    }

    #[test]
    fn test_looks_like_address() {
        assert!(looks_like_address("0x6B175474E89094C44Da98b954EedeAC495271d0F"));
        assert!(!looks_like_address("DAI"));
        assert!(!looks_like_address("0x6B17"));
    }
}
