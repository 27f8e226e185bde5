use alloy::{
    core::sol,
    primitives::{Address, U256},
    sol_types::SolCall,
};

// ERC20 allowance interface, as defined by EIP-20: https://eips.ethereum.org/EIPS/eip-20
sol! {
    function approve(address _spender, uint256 _value) public returns (bool success);
    function allowance(address _owner, address _spender) public view returns (uint256 remaining);
}

/// Encode allowance(address,address) call
pub fn encode_allowance(owner: Address, spender: Address) -> Vec<u8> {
    allowanceCall { _owner: owner, _spender: spender }.abi_encode()
}

/// Decode allowance(address,address) return value
pub fn decode_allowance(data: &[u8]) -> Result<U256, alloy::sol_types::Error> {
    allowanceCall::abi_decode_returns(data)
}

/// Encode approve(address,uint256) call
pub fn encode_approve(spender: Address, value: U256) -> Vec<u8> {
    approveCall { _spender: spender, _value: value }.abi_encode()
}
