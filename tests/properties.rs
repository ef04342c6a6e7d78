use allcrypt::crypto::NonceSequence;
use allcrypt::crypto::nonce::chunk_nonce;
use allcrypt::format::header::{MAX_CHUNK_EXP, MIN_CHUNK_EXP};
use allcrypt::format::{ChunkLayout, HEADER_SIZE, Header};
use allcrypt::{AeadAlgorithm, AeadEngine, Password};
use proptest::prelude::*;

fn algorithm() -> impl Strategy<Value = AeadAlgorithm> {
    prop_oneof![
        Just(AeadAlgorithm::Aes256Gcm),
        Just(AeadAlgorithm::ChaCha20Poly1305),
    ]
}

proptest! {
    #[test]
    fn header_survives_encoding(
        algorithm in algorithm(),
        salt in any::<[u8; 16]>(),
        base_nonce in any::<[u8; 12]>(),
        chunk_exp in MIN_CHUNK_EXP..=MAX_CHUNK_EXP,
        original_size in any::<u64>(),
    ) {
        let header = Header::new(algorithm, salt, base_nonce, chunk_exp, original_size);
        let bytes = header.encode();

        prop_assert_eq!(bytes.len(), HEADER_SIZE);
        prop_assert_eq!(&bytes[..4], b"ACRY");
        prop_assert_eq!(Header::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn chunks_partition_the_input(total in 0u64..20_000, chunk_exp in 2u8..=10) {
        let layout = ChunkLayout::new(chunk_exp, 16);
        let count = layout.chunk_count(total);
        let lens: Vec<usize> = (0..count).map(|i| layout.plaintext_len(i, total)).collect();

        prop_assert_eq!(lens.iter().map(|&n| n as u64).sum::<u64>(), total);
        prop_assert!(lens.iter().all(|&n| n > 0 && n <= layout.chunk_size()));
        if let Some((last, full)) = lens.split_last() {
            prop_assert!(full.iter().all(|&n| n == layout.chunk_size()));
            let rem = (total % layout.chunk_size() as u64) as usize;
            prop_assert_eq!(*last, if rem == 0 { layout.chunk_size() } else { rem });
        }
        prop_assert_eq!(layout.encrypted_body_len(total), total + 16 * count);
    }

    #[test]
    fn nonces_never_repeat(base in any::<[u8; 12]>(), len in 1usize..200) {
        let mut seq = NonceSequence::new();
        let mut seen = std::collections::HashSet::new();
        for expected in 0..len as u32 {
            let index = seq.advance().unwrap();
            prop_assert_eq!(index, expected);

            let nonce = chunk_nonce(&base, index);
            prop_assert_eq!(&nonce[..8], &base[..8]);
            prop_assert!(seen.insert(nonce));
        }
    }
}

proptest! {
    // 每个用例都要跑两次 Argon2
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn small_inputs_roundtrip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..64),
        chunk_exp in 2u8..=5,
        algorithm in algorithm(),
    ) {
        let engine = AeadEngine::new(algorithm);
        let container = allcrypt::encrypt_bytes(&engine, Password::new("pw"), &plaintext, chunk_exp)
            .unwrap();

        let layout = ChunkLayout::new(chunk_exp, 16);
        prop_assert_eq!(
            container.len() as u64,
            HEADER_SIZE as u64 + layout.encrypted_body_len(plaintext.len() as u64)
        );

        let restored = allcrypt::decrypt_bytes(&AeadEngine::default(), Password::new("pw"), &container)
            .unwrap();
        prop_assert_eq!(&restored[..], &plaintext[..]);
    }
}
