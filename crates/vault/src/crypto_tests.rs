// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const KEY_HEX: &str = "a3f1c2d4e5b6978812345678deadbeefa3f1c2d4e5b6978812345678deadbeef";

#[test]
fn encrypt_decrypt_round_trip() {
    let key = derive_key(KEY_HEX).unwrap();
    let plaintext = b"tar bytes go here";

    let envelope = encrypt(&key, plaintext).unwrap();
    assert_ne!(&envelope[12..], plaintext.as_slice());
    assert_eq!(decrypt(&key, &envelope).unwrap(), plaintext);
}

#[test]
fn random_nonce_makes_ciphertexts_differ() {
    let key = derive_key(KEY_HEX).unwrap();
    let a = encrypt(&key, b"same input").unwrap();
    let b = encrypt(&key, b"same input").unwrap();
    assert_ne!(a, b);
}

#[test]
fn wrong_key_fails_decryption() {
    let key = derive_key(KEY_HEX).unwrap();
    let other = derive_key(&"00".repeat(32)).unwrap();

    let envelope = encrypt(&key, b"secret").unwrap();
    assert!(matches!(
        decrypt(&other, &envelope),
        Err(CryptoError::Decrypt)
    ));
}

#[test]
fn tampered_ciphertext_fails_authentication() {
    let key = derive_key(KEY_HEX).unwrap();
    let mut envelope = encrypt(&key, b"secret").unwrap();
    let last = envelope.len() - 1;
    envelope[last] ^= 0x01;

    assert!(matches!(
        decrypt(&key, &envelope),
        Err(CryptoError::Decrypt)
    ));
}

#[test]
fn truncated_envelope_is_rejected() {
    let key = derive_key(KEY_HEX).unwrap();
    assert!(matches!(
        decrypt(&key, &[0u8; 10]),
        Err(CryptoError::TooShort)
    ));
}

#[test]
fn derive_key_is_deterministic() {
    assert_eq!(derive_key(KEY_HEX).unwrap(), derive_key(KEY_HEX).unwrap());
}

#[test]
fn non_hex_key_material_is_rejected() {
    assert!(matches!(
        derive_key("not hex at all"),
        Err(CryptoError::BadKeyMaterial)
    ));
}

#[test]
fn sha256_hex_matches_known_vector() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f");
    std::fs::write(&path, b"abc").unwrap();
    assert_eq!(
        sha256_hex(&path).unwrap(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
