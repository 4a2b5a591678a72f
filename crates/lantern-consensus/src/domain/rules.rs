//! # Header Rules
//!
//! Pure rule checks of a header against its parent, applied in this order:
//!
//! 1. extra-data length
//! 2. timestamp not beyond `now + allowed_future_secs`
//! 3. timestamp strictly after the parent's
//! 4. gas limit at most 2^63 - 1
//! 5. gas used at most the gas limit
//! 6. gas limit within `parent / divisor` of the parent's, and above the floor
//! 7. number is parent + 1
//!
//! The seal is checked separately by a [`crate::SealEngine`].

use lantern_types::Header;

use crate::config::{ConsensusConfig, MAX_GAS_LIMIT};
use crate::domain::errors::RuleViolation;

/// Check `header` against `parent`. `now` is local unix time in seconds.
pub fn check_header_rules(
    header: &Header,
    parent: &Header,
    config: &ConsensusConfig,
    now: u64,
) -> Result<(), RuleViolation> {
    if header.extra.len() > config.max_extra_data {
        return Err(RuleViolation::ExtraDataTooLong {
            len: header.extra.len(),
            max: config.max_extra_data,
        });
    }

    let limit = now.saturating_add(config.allowed_future_secs);
    if header.time > limit {
        return Err(RuleViolation::FutureBlock {
            time: header.time,
            limit,
        });
    }
    if header.time <= parent.time {
        return Err(RuleViolation::TimestampNotIncreasing {
            time: header.time,
            parent_time: parent.time,
        });
    }

    if header.gas_limit > MAX_GAS_LIMIT {
        return Err(RuleViolation::GasLimitTooHigh {
            gas_limit: header.gas_limit,
            max: MAX_GAS_LIMIT,
        });
    }
    if header.gas_used > header.gas_limit {
        return Err(RuleViolation::GasUsedExceedsLimit {
            gas_used: header.gas_used,
            gas_limit: header.gas_limit,
        });
    }

    let diff = header.gas_limit.abs_diff(parent.gas_limit);
    let bound = parent.gas_limit / config.gas_limit_bound_divisor.max(1);
    if diff >= bound {
        return Err(RuleViolation::GasLimitDelta {
            gas_limit: header.gas_limit,
            parent_gas_limit: parent.gas_limit,
            bound,
        });
    }
    if header.gas_limit < config.min_gas_limit {
        return Err(RuleViolation::GasLimitBelowMinimum {
            gas_limit: header.gas_limit,
            min: config.min_gas_limit,
        });
    }

    let expected = parent.number.saturating_add(1);
    if header.number != expected {
        return Err(RuleViolation::InvalidNumber {
            number: header.number,
            expected,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_types::test_utils::{child_of, genesis_header};
    use proptest::prelude::*;

    const NOW: u64 = 1_700_000_000;

    fn check(header: &Header, parent: &Header) -> Result<(), RuleViolation> {
        check_header_rules(header, parent, &ConsensusConfig::default(), NOW)
    }

    #[test]
    fn test_valid_child_passes() {
        let parent = genesis_header();
        assert_eq!(check(&child_of(&parent, 1), &parent), Ok(()));
    }

    #[test]
    fn test_zero_gas_used_is_allowed() {
        let parent = genesis_header();
        let mut header = child_of(&parent, 1);
        header.gas_used = 0;
        assert_eq!(check(&header, &parent), Ok(()));
    }

    #[test]
    fn test_extra_data_checked_first() {
        let parent = genesis_header();
        let mut header = child_of(&parent, 1);
        header.extra = vec![0; 33];
        header.time = parent.time;
        assert!(matches!(
            check(&header, &parent),
            Err(RuleViolation::ExtraDataTooLong { len: 33, max: 32 })
        ));
    }

    #[test]
    fn test_future_block_rejected() {
        let parent = genesis_header();
        let mut header = child_of(&parent, 1);
        header.time = NOW + 16;
        assert!(matches!(
            check(&header, &parent),
            Err(RuleViolation::FutureBlock { .. })
        ));
        header.time = NOW + 15;
        assert_eq!(check(&header, &parent), Ok(()));
    }

    #[test]
    fn test_equal_timestamp_rejected() {
        let parent = genesis_header();
        let mut header = child_of(&parent, 1);
        header.time = parent.time;
        assert!(matches!(
            check(&header, &parent),
            Err(RuleViolation::TimestampNotIncreasing { .. })
        ));
    }

    #[test]
    fn test_gas_limit_delta_bound_is_exclusive() {
        let parent = genesis_header();
        let bound = parent.gas_limit / 1024;
        let mut header = child_of(&parent, 1);

        header.gas_limit = parent.gas_limit + bound - 1;
        assert_eq!(check(&header, &parent), Ok(()));

        header.gas_limit = parent.gas_limit + bound;
        assert!(matches!(
            check(&header, &parent),
            Err(RuleViolation::GasLimitDelta { .. })
        ));
    }

    #[test]
    fn test_gas_limit_floor() {
        let mut parent = genesis_header();
        parent.gas_limit = 5_000;
        let mut header = child_of(&parent, 1);
        header.gas_used = 0;
        header.gas_limit = 4_999;
        // Delta bound is 4, so the floor is hit only after the delta check passes
        assert!(matches!(
            check(&header, &parent),
            Err(RuleViolation::GasLimitBelowMinimum { .. })
        ));
    }

    #[test]
    fn test_number_must_follow_parent() {
        let parent = genesis_header();
        let mut header = child_of(&parent, 1);
        header.number = 5;
        assert!(matches!(
            check(&header, &parent),
            Err(RuleViolation::InvalidNumber { number: 5, expected: 1 })
        ));
    }

    proptest! {
        #[test]
        fn prop_rules_accept_iff_predicate_holds(
            dt in 0u64..40,
            gas_limit in 7_990_000u64..8_010_000,
            gas_used in 0u64..8_020_000,
            number_offset in 0u64..3,
        ) {
            let parent = genesis_header();
            let mut header = child_of(&parent, 1);
            header.time = parent.time + dt;
            header.gas_limit = gas_limit;
            header.gas_used = gas_used;
            header.number = parent.number + number_offset;

            let expected = header.time > parent.time
                && gas_used <= gas_limit
                && gas_limit.abs_diff(parent.gas_limit) < parent.gas_limit / 1024
                && header.number == parent.number + 1;
            prop_assert_eq!(check(&header, &parent).is_ok(), expected);
        }
    }
}
