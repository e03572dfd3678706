use crate::chains::substrate::address::AccountKey;
use crate::core::source::RawRecord;
use crate::core::types::RewardEvent;
use tracing::warn;

/// Recognizes reward-paid records among arbitrary raw events and
/// extracts the canonical event when the rewarded account matches.
#[derive(Debug, Clone)]
pub struct EventFilter {
    key: AccountKey,
    module: String,
    call: String,
}

impl EventFilter {
    /// Staking reward events on KILT-style parachains.
    pub const REWARD_MODULE: &'static str = "parachainstaking";
    pub const REWARD_CALL: &'static str = "rewarded";

    pub fn new(key: AccountKey) -> Self {
        Self {
            key,
            module: Self::REWARD_MODULE.to_string(),
            call: Self::REWARD_CALL.to_string(),
        }
    }

    /// Extract a reward event from one raw record.
    ///
    /// Returns `None` for anything that is not a reward paid to the
    /// resolved account: wrong (module, call) pair, unexpected payload
    /// shape, or a different account. None of those are errors. A record
    /// that matches but carries an unparseable amount is malformed and
    /// dropped with a warning.
    pub fn extract(&self, record: &RawRecord) -> Option<RewardEvent> {
        if !record.module.eq_ignore_ascii_case(&self.module)
            || !record.call.eq_ignore_ascii_case(&self.call)
        {
            return None;
        }

        // Reward payload is exactly [account key, amount].
        if record.params.len() != 2 {
            return None;
        }

        if !self.key.matches_hex(&record.params[0]) {
            return None;
        }

        let amount = match parse_amount(&record.params[1]) {
            Some(amount) => amount,
            None => {
                warn!(
                    source_ref = %record.source_ref,
                    raw = %record.params[1],
                    "Dropping reward record with unparseable amount"
                );
                return None;
            }
        };

        Some(RewardEvent {
            amount,
            timestamp: record.timestamp,
            source_ref: record.source_ref.clone(),
        })
    }
}

/// Amounts arrive as decimal strings from the indexer and as decimal or
/// 0x-hex strings from node-side JSON.
fn parse_amount(raw: &str) -> Option<u128> {
    if let Some(hex_digits) = raw.strip_prefix("0x") {
        u128::from_str_radix(hex_digits, 16).ok()
    } else {
        raw.parse::<u128>().ok()
    }
}
