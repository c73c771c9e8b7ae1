//! Property-based tests for the portal token codec
//!
//! Tests for:
//! - Round trip: arbitrary claims survive encode/decode
//! - Tamper resistance: any mutation of the token string fails decode
//! - Key isolation: tokens never decode under a different signing key

use proptest::prelude::*;

use super::codec::{CodecError, PortalClaims, TokenCodec};

const KEY_A: [u8; 32] = [11u8; 32];
const KEY_B: [u8; 32] = [22u8; 32];

fn arb_claims() -> impl Strategy<Value = PortalClaims> {
    (
        "[a-z0-9-]{1,40}",
        "[A-Za-z .'-]{1,60}",
        "[a-z0-9.]{1,30}@[a-z0-9]{1,20}\\.[a-z]{2,6}",
        1_500_000_000u64..2_000_000_000u64,
        1u64..10_000_000u64,
        proptest::collection::vec(any::<u8>(), 16),
    )
        .prop_map(|(pid, name, email, iat, ttl, nonce)| PortalClaims {
            pid,
            name,
            email,
            iat,
            exp: iat + ttl,
            nonce: hex::encode(nonce),
        })
}

proptest! {
    /// Property: encode then decode returns the original claims
    #[test]
    fn codec_round_trip_preserves_claims(claims in arb_claims()) {
        let codec = TokenCodec::new(&KEY_A);
        let token = codec.encode(&claims).unwrap();
        let decoded = codec.decode(&token).unwrap();
        prop_assert_eq!(decoded, claims);
    }

    /// Property: no token decodes under a different signing key
    #[test]
    fn codec_rejects_foreign_key(claims in arb_claims()) {
        let token = TokenCodec::new(&KEY_A).encode(&claims).unwrap();
        let err = TokenCodec::new(&KEY_B).decode(&token).unwrap_err();
        prop_assert_eq!(err, CodecError::BadSignature);
    }

    /// Property: flipping any payload or signature character fails decode.
    /// Mutations either break the hex/structure (Malformed) or break the
    /// MAC (BadSignature); they never decode successfully.
    #[test]
    fn codec_rejects_any_single_character_mutation(
        claims in arb_claims(),
        position in any::<prop::sample::Index>(),
        replacement in proptest::char::range('0', 'f'),
    ) {
        let codec = TokenCodec::new(&KEY_A);
        let token = codec.encode(&claims).unwrap();

        // Mutate one character past the "pp1." prefix
        let body_start = 4;
        let idx = body_start + position.index(token.len() - body_start);
        let original = token.as_bytes()[idx] as char;
        prop_assume!(original != replacement);

        let mut mutated = token.clone();
        mutated.replace_range(idx..idx + 1, &replacement.to_string());

        prop_assert!(codec.decode(&mutated).is_err());
    }

    /// Property: truncated tokens never decode
    #[test]
    fn codec_rejects_truncation(claims in arb_claims(), keep in 0usize..50) {
        let codec = TokenCodec::new(&KEY_A);
        let token = codec.encode(&claims).unwrap();
        prop_assume!(keep < token.len());
        prop_assert!(codec.decode(&token[..keep]).is_err());
    }
}
