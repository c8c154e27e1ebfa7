//! Algorithm lookup through the registry and the software provider.

use std::sync::Arc;
use std::thread;

use serde_json::json;

use cryptofacade_common::{AlgorithmId, Error, KeyFormat};
use cryptofacade_crypto::{ids, AeadAlgorithm, DigestAlgorithm, EncodableKey, HmacAlgorithm};
use cryptofacade_provider::{create_default_registry, default_provider, software};
use cryptofacade_runtime::RuntimeConfig;

#[test]
fn test_lookup_is_memoized() {
    let provider = default_provider().unwrap();

    let first = provider.get(&ids::AES_GCM).unwrap();
    let second = provider.get(&ids::AES_GCM).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let by_name = AlgorithmId::<dyn AeadAlgorithm>::new("AES-GCM");
    let third = provider.get(&by_name).unwrap();
    assert!(Arc::ptr_eq(&first, &third));
}

#[test]
fn test_concurrent_lookups_share_one_instance() {
    let provider = Arc::new(software::provider(&RuntimeConfig::default()).unwrap());

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let provider = Arc::clone(&provider);
            thread::spawn(move || provider.get(&ids::SHA512).unwrap())
        })
        .collect();
    let found: Vec<Arc<dyn DigestAlgorithm>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    for algorithm in &found[1..] {
        assert!(Arc::ptr_eq(&found[0], algorithm));
    }
}

#[test]
fn test_declared_but_unimplemented_algorithm() {
    let provider = default_provider().unwrap();

    assert!(!provider.supports(&ids::SHA1));
    assert!(provider.get_or_null(&ids::SHA1).is_none());
    assert!(matches!(
        provider.get(&ids::SHA1),
        Err(Error::AlgorithmNotFound(_))
    ));
}

#[test]
fn test_family_mismatch_is_absent() {
    let provider = default_provider().unwrap();
    let wrong_family = AlgorithmId::<dyn HmacAlgorithm>::new("SHA-256");
    assert!(provider.get_or_null(&wrong_family).is_none());
}

#[test]
fn test_every_declared_digest_resolves_or_is_reported_missing() {
    let provider = default_provider().unwrap();
    for id in ids::DIGESTS {
        match provider.get(&id) {
            Ok(digest) => {
                let hasher = digest.hasher().create().unwrap();
                assert_eq!(hasher.hash(b"").unwrap().len(), digest.digest_size());
            }
            Err(e) => {
                assert_eq!(id, ids::SHA1);
                assert!(matches!(e, Error::AlgorithmNotFound(_)));
            }
        }
    }
}

#[test]
fn test_unsupported_key_format() {
    let provider = default_provider().unwrap();
    let key = provider
        .get(&ids::AES_GCM)
        .unwrap()
        .key_generator()
        .create()
        .unwrap()
        .generate()
        .unwrap();

    assert!(matches!(
        key.encode(KeyFormat::Pem),
        Err(Error::OperationNotSupported(_))
    ));
    assert_eq!(key.encode(KeyFormat::Raw).unwrap().len(), 32);
}

#[test]
fn test_known_digest_vectors() {
    let provider = default_provider().unwrap();
    let vectors = [
        (
            ids::SHA256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        ),
        (
            ids::SHA384,
            "38b060a751ac96384cd9327eb1b1e36a21fdb71114be07434c0cc7bf63f6e1da274edebfe76f65fbd51ad2f14898b95b",
        ),
        (
            ids::BLAKE2S_256,
            "69217a3079908094e11121d042354a7c1f55b6482ca1a51e1b250dfd1ed0eef9",
        ),
    ];

    for (id, expected) in vectors {
        let hasher = provider.get(&id).unwrap().hasher().create().unwrap();
        assert_eq!(hex::encode(hasher.hash(b"").unwrap()), expected);

        let mut function = hasher.hash_function().unwrap();
        assert_eq!(hex::encode(function.complete().unwrap()), expected);
    }
}

#[test]
fn test_registry_configuration_reaches_pools() {
    let registry = create_default_registry();
    let provider = registry
        .resolve("software", json!({ "pool_capacity": 1 }))
        .unwrap();
    let hasher = provider
        .get(&ids::SHA256)
        .unwrap()
        .hasher()
        .create()
        .unwrap();

    hasher.hash(b"warm up").unwrap();
    assert_eq!(provider.state().pools().capacity(), 1);
    assert!(provider
        .state()
        .pools()
        .names()
        .contains(&"SHA-256".to_string()));
}
