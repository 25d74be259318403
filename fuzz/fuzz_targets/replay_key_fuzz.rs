//! Fuzz test for the replay key codec
//!
//! Feeds arbitrary strings to the length-prefixed key decoder to find:
//! - Panics on malformed prefixes or split UTF-8 characters
//! - Inputs that decode but do not re-encode to themselves
//!
//! Run with: cargo +nightly fuzz run replay_key_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use vigil_storage::ReplayKey;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Decoding must never panic
        if let Some(key) = ReplayKey::decode(input) {
            // Only canonical encodings decode, so the codec is a bijection
            assert_eq!(key.encode(), input, "decoded key should re-encode to its input");
        }

        // Any string pair must survive an encode/decode cycle
        let mid = (0..=input.len() / 2)
            .rev()
            .find(|i| input.is_char_boundary(*i))
            .unwrap_or(0);
        let (issuer, message) = input.split_at(mid);
        let decoded = ReplayKey::decode(&ReplayKey::new(issuer, message).encode())
            .expect("encoded key should decode");
        assert_eq!(decoded.issuer_id(), issuer);
        assert_eq!(decoded.message_id(), message);
    }
});
