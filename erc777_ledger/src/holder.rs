//! Helpers for working with token holder addresses.
//!
//! Holders are plain FVM addresses. The ledger never resolves them to actor IDs: two addresses
//! are the same holder exactly when their byte encodings match.

use fvm_ipld_hamt::BytesKey;
use fvm_shared::address::{Address, Payload};
use fvm_shared::ActorID;

/// Namespace of the Ethereum Address Manager, under which Ethereum addresses are embedded as
/// delegated (f4) addresses.
pub const EAM_NAMESPACE: ActorID = 10;

/// Length of an Ethereum address embedded in a delegated address.
pub const ETH_ADDRESS_LEN: usize = 20;

/// The system actor. No account can be credited at this address.
pub const SYSTEM_HOLDER: Address = Address::new_id(0);

/// Returns true for addresses which cannot hold tokens
///
/// That is the system actor `f00` and the Ethereum zero address `0x00..00` in its delegated form.
pub fn is_null_holder(holder: &Address) -> bool {
    if *holder == SYSTEM_HOLDER {
        return true;
    }
    match holder.payload() {
        Payload::Delegated(delegated) => {
            delegated.namespace() == EAM_NAMESPACE
                && delegated.subaddress().len() == ETH_ADDRESS_LEN
                && delegated.subaddress().iter().all(|b| *b == 0)
        }
        _ => false,
    }
}

/// Returns the Ethereum zero address as a delegated FVM address
pub fn eth_zero_address() -> Address {
    // a 20 byte subaddress is always within the delegated address size limit
    Address::new_delegated(EAM_NAMESPACE, &[0u8; ETH_ADDRESS_LEN])
        .unwrap_or(SYSTEM_HOLDER)
}

/// Key under which a holder's balance is stored
pub fn holder_key(holder: &Address) -> BytesKey {
    holder.to_bytes().into()
}

pub fn decode_holder_key(key: &BytesKey) -> Option<Address> {
    Address::from_bytes(key.0.as_slice()).ok()
}
