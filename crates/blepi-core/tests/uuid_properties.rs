//! Property tests for UUID parsing and formatting

use blepi_core::BleUuid;
use proptest::prelude::*;

proptest! {
    #[test]
    fn short_uuid_round_trips(value in any::<u16>(), upper in any::<bool>()) {
        let text = if upper { format!("{:04X}", value) } else { format!("{:04x}", value) };
        let parsed = BleUuid::parse(&text).unwrap();
        let reparsed = BleUuid::parse(&parsed.to_string()).unwrap();
        prop_assert_eq!(parsed, reparsed);
        prop_assert_eq!(parsed, BleUuid::from_u16(value));
    }

    #[test]
    fn long_uuid_round_trips(value in any::<u128>(), dashed in any::<bool>()) {
        let hyphenated = uuid::Uuid::from_u128(value).hyphenated().to_string();
        let text = if dashed { hyphenated.to_uppercase() } else { hyphenated.replace('-', "") };

        let parsed = BleUuid::parse(&text).unwrap();
        let formatted = parsed.to_string();
        prop_assert_eq!(&formatted, &hyphenated);
        prop_assert_eq!(BleUuid::parse(&formatted).unwrap(), parsed);
    }

    #[test]
    fn wrong_lengths_are_rejected(bytes in proptest::collection::vec(any::<u8>(), 0..24)) {
        prop_assume!(bytes.len() != 2 && bytes.len() != 16);
        prop_assert!(BleUuid::parse(&hex::encode(&bytes)).is_err());
    }
}
