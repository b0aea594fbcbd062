use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use sealstore::container::{ContainerHeader, HEADER_LEN};
use sealstore::error::FailureKind;
use sealstore::integrity;
use sealstore::object_store::MemoryObjectStore;
use sealstore::service::{EncryptionService, OperationResult, Stage};
use sealstore::streaming::{BLOCK_SIZE, CHUNK_SIZE};
use sealstore::vault::EncryptedVault;

const PASSWORD: &str = "correct-horse";

/// Helper to create a temp dir with a plaintext file in it
fn setup_plaintext(data: &[u8]) -> Result<(TempDir, PathBuf)> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("plain.bin");
    fs::write(&input, data)?;
    Ok((tmp, input))
}

/// Encrypt `data` and return the temp dir plus the container path
async fn encrypt_to_container(data: &[u8]) -> Result<(TempDir, PathBuf)> {
    let (tmp, input) = setup_plaintext(data)?;
    let container = tmp.path().join("plain.enc");
    let result = EncryptionService::new()
        .encrypt_file(&input, &container, PASSWORD)
        .await;
    assert!(result.is_success(), "encrypt failed: {:?}", result);
    Ok((tmp, container))
}

#[tokio::test]
async fn hello_world_example() -> Result<()> {
    let (tmp, input) = setup_plaintext(b"hello world")?;
    let container = tmp.path().join("hello.enc");
    let output = tmp.path().join("hello.out");
    let service = EncryptionService::new();

    let report = service
        .encrypt_file(&input, &container, PASSWORD)
        .await
        .into_result()
        .expect("encrypt");
    assert_eq!(report.original_size, 11);
    assert_eq!(report.encrypted_size, 120);
    assert_eq!(fs::metadata(&container)?.len(), 120);
    assert_eq!(report.original_hash, integrity::hash_bytes(b"hello world"));

    let report = service
        .decrypt_file(&container, &output, PASSWORD)
        .await
        .into_result()
        .expect("decrypt");
    assert!(report.integrity_check);
    assert_eq!(report.decrypted_size, 11);
    assert_eq!(report.original_hash, report.decrypted_hash);
    assert_eq!(fs::read(&output)?, b"hello world");

    Ok(())
}

/// Container written by an independent PBKDF2 + AES-256-CBC implementation.
/// Salt is 0x10..0x20, IV is 0xa0..0xb0, plaintext is `(i * 31) % 251` for 66000 bytes.
const REFERENCE_CONTAINER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/reference.enc");

#[tokio::test]
async fn decrypts_reference_container() -> Result<()> {
    let tmp = TempDir::new()?;
    let output = tmp.path().join("reference.out");
    let expected: Vec<u8> = (0..66_000usize).map(|i| (i * 31 % 251) as u8).collect();

    let report = EncryptionService::new()
        .decrypt_file(PathBuf::from(REFERENCE_CONTAINER).as_path(), &output, PASSWORD)
        .await
        .into_result()
        .expect("reference container must decrypt");
    assert!(report.integrity_check);
    assert_eq!(report.original_size, 66_000);
    assert_eq!(
        report.decrypted_hash,
        "77ccb04b779553f3a70e0de6022a20827cb457e2643a9f798873a99a9ab71dc4"
    );
    assert_eq!(fs::read(&output)?, expected);
    Ok(())
}

#[tokio::test]
async fn uppercase_stored_hash_still_verifies() -> Result<()> {
    let (tmp, container) = encrypt_to_container(b"mixed case writer").await?;
    let mut raw = fs::read(&container)?;
    raw[32..96].make_ascii_uppercase();
    fs::write(&container, &raw)?;

    let output = tmp.path().join("out");
    let report = EncryptionService::new()
        .decrypt_file(&container, &output, PASSWORD)
        .await
        .into_result()
        .expect("decrypt");
    assert!(report.integrity_check);
    Ok(())
}

#[tokio::test]
async fn round_trip_size_boundaries() -> Result<()> {
    let service = EncryptionService::new();
    for len in [0usize, 16, CHUNK_SIZE + 1] {
        let data: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        let (tmp, container) = encrypt_to_container(&data).await?;

        let raw = fs::read(&container)?;
        let body_len = raw.len() - HEADER_LEN;
        assert!(body_len > 0 && body_len % BLOCK_SIZE == 0, "len {}", len);
        assert_eq!(body_len, (len / BLOCK_SIZE + 1) * BLOCK_SIZE);

        let output = tmp.path().join("out");
        let report = service
            .decrypt_file(&container, &output, PASSWORD)
            .await
            .into_result()
            .expect("decrypt");
        assert!(report.integrity_check, "len {}", len);
        assert_eq!(fs::read(&output)?, data, "len {}", len);
    }
    Ok(())
}

#[tokio::test]
async fn encryption_is_not_deterministic() -> Result<()> {
    let (tmp, input) = setup_plaintext(b"same input twice")?;
    let a = tmp.path().join("a.enc");
    let b = tmp.path().join("b.enc");
    let service = EncryptionService::new();

    assert!(service.encrypt_file(&input, &a, PASSWORD).await.is_success());
    assert!(service.encrypt_file(&input, &b, PASSWORD).await.is_success());

    let raw_a = fs::read(&a)?;
    let raw_b = fs::read(&b)?;
    assert_ne!(raw_a[..16], raw_b[..16], "salts must differ");
    assert_ne!(raw_a[16..32], raw_b[16..32], "IVs must differ");
    assert_ne!(raw_a[HEADER_LEN..], raw_b[HEADER_LEN..]);

    for container in [&a, &b] {
        let out = tmp.path().join("out");
        let report = service
            .decrypt_file(container, &out, PASSWORD)
            .await
            .into_result()
            .expect("decrypt");
        assert!(report.integrity_check);
        assert_eq!(fs::read(&out)?, b"same input twice");
    }
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_never_verified() -> Result<()> {
    let data = b"hello world";
    let (tmp, container) = encrypt_to_container(data).await?;
    let output = tmp.path().join("out");

    let result = EncryptionService::new()
        .decrypt_file(&container, &output, "wrong-password")
        .await;
    match result {
        OperationResult::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::Decryption);
            assert_eq!(failure.stage, Stage::StreamDecrypt);
        }
        OperationResult::Success(report) => assert!(!report.integrity_check),
    }
    Ok(())
}

#[tokio::test]
async fn bit_flip_in_early_block_fails_integrity() -> Result<()> {
    // 48 bytes -> 4 cipher blocks; the last one is pure padding and stays valid
    let data = vec![b'x'; 48];
    let (tmp, container) = encrypt_to_container(&data).await?;

    let mut raw = fs::read(&container)?;
    raw[HEADER_LEN] ^= 0x01;
    fs::write(&container, &raw)?;

    let output = tmp.path().join("out");
    let report = EncryptionService::new()
        .decrypt_file(&container, &output, PASSWORD)
        .await
        .into_result()
        .expect("padding is untouched, so decrypt must succeed");
    assert!(!report.integrity_check);
    assert_ne!(fs::read(&output)?, data);
    Ok(())
}

#[tokio::test]
async fn bit_flip_anywhere_is_flagged() -> Result<()> {
    let data = b"tamper detection across every block".to_vec();
    let (tmp, container) = encrypt_to_container(&data).await?;
    let pristine = fs::read(&container)?;
    let service = EncryptionService::new();

    for pos in (HEADER_LEN..pristine.len()).step_by(5) {
        let mut raw = pristine.clone();
        raw[pos] ^= 0x80;
        let tampered = tmp.path().join("tampered.enc");
        fs::write(&tampered, &raw)?;

        let output = tmp.path().join("out");
        match service.decrypt_file(&tampered, &output, PASSWORD).await {
            OperationResult::Failure(f) => assert_eq!(f.kind, FailureKind::Decryption),
            OperationResult::Success(report) => {
                assert!(!report.integrity_check, "flip at {} went unnoticed", pos)
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn tampered_header_hash_fails_integrity() -> Result<()> {
    let (tmp, container) = encrypt_to_container(b"header tamper").await?;
    let mut raw = fs::read(&container)?;
    // first hex digit of the stored hash
    raw[32] = if raw[32] == b'0' { b'1' } else { b'0' };
    fs::write(&container, &raw)?;

    let output = tmp.path().join("out");
    let report = EncryptionService::new()
        .decrypt_file(&container, &output, PASSWORD)
        .await
        .into_result()
        .expect("decrypt");
    assert!(!report.integrity_check);
    assert_eq!(fs::read(&output)?, b"header tamper");
    Ok(())
}

#[tokio::test]
async fn stored_length_truncates_output() -> Result<()> {
    let (tmp, container) = encrypt_to_container(b"hello world").await?;
    let mut raw = fs::read(&container)?;
    raw[96..104].copy_from_slice(&5u64.to_be_bytes());
    fs::write(&container, &raw)?;

    let output = tmp.path().join("out");
    let report = EncryptionService::new()
        .decrypt_file(&container, &output, PASSWORD)
        .await
        .into_result()
        .expect("decrypt");
    assert_eq!(report.decrypted_size, 5);
    assert_eq!(report.original_size, 5);
    assert!(!report.integrity_check);
    assert_eq!(fs::read(&output)?, b"hello");
    Ok(())
}

#[tokio::test]
async fn truncated_container_is_format_failure() -> Result<()> {
    let (tmp, container) = encrypt_to_container(b"hello world").await?;
    let raw = fs::read(&container)?;
    let service = EncryptionService::new();
    let output = tmp.path().join("out");

    // shorter than the header
    fs::write(&container, &raw[..50])?;
    let failure = service
        .decrypt_file(&container, &output, PASSWORD)
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::Format);
    assert_eq!(failure.stage, Stage::ReadHeader);

    // header only, no body
    fs::write(&container, &raw[..HEADER_LEN])?;
    let failure = service
        .decrypt_file(&container, &output, PASSWORD)
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::Format);

    // body not a multiple of the block size
    fs::write(&container, &raw[..raw.len() - 3])?;
    let failure = service
        .decrypt_file(&container, &output, PASSWORD)
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::Format);
    assert_eq!(failure.stage, Stage::StreamDecrypt);
    Ok(())
}

#[tokio::test]
async fn missing_container_is_input_failure() -> Result<()> {
    let tmp = TempDir::new()?;
    let result = EncryptionService::new()
        .decrypt_file(&tmp.path().join("missing.enc"), &tmp.path().join("out"), PASSWORD)
        .await;

    let json = serde_json::to_value(&result)?;
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "input");
    assert!(json["error"].as_str().unwrap_or_default().contains("missing.enc"));
    Ok(())
}

#[tokio::test]
async fn header_fields_match_report() -> Result<()> {
    let data = b"inspect the header";
    let (_tmp, container) = encrypt_to_container(data).await?;

    let mut file = tokio::fs::File::open(&container).await?;
    let header = ContainerHeader::read_from(&mut file).await?;
    assert_eq!(header.original_length, data.len() as u64);
    assert_eq!(header.original_hash, integrity::hash_bytes(data));
    Ok(())
}

#[tokio::test]
async fn concurrent_operations() -> Result<()> {
    let tmp = Arc::new(TempDir::new()?);
    let service = EncryptionService::new();

    let mut handles = Vec::new();
    for i in 0..4 {
        let tmp = tmp.clone();
        handles.push(tokio::spawn(async move {
            let input = tmp.path().join(format!("in_{}", i));
            let container = tmp.path().join(format!("enc_{}", i));
            let output = tmp.path().join(format!("out_{}", i));
            let data = format!("content for file {}", i).into_bytes();
            std::fs::write(&input, &data).expect("write input");

            assert!(service.encrypt_file(&input, &container, PASSWORD).await.is_success());
            let report = service
                .decrypt_file(&container, &output, PASSWORD)
                .await
                .into_result()
                .expect("decrypt");
            assert!(report.integrity_check);
            (data, std::fs::read(&output).expect("read output"))
        }));
    }

    for handle in handles {
        let (expected, actual) = handle.await?;
        assert_eq!(expected, actual);
    }
    Ok(())
}

#[tokio::test]
async fn vault_round_trip_through_memory_store() -> Result<()> {
    let vault = EncryptedVault::new(Arc::new(MemoryObjectStore::new()));

    let summary = vault
        .upload_encrypted("quarterly report.pdf", b"numbers go up", PASSWORD)
        .await?;
    assert_eq!(summary.key, "quarterly-report.pdf.encrypted");

    let wrong = vault
        .download_decrypted("quarterly-report.pdf", "wrong-password")
        .await;
    if let Ok(file) = &wrong {
        assert!(!file.report.integrity_check);
    }

    let file = vault
        .download_decrypted("quarterly-report.pdf", PASSWORD)
        .await?;
    assert!(file.report.integrity_check);
    assert_eq!(file.content, b"numbers go up");

    // the name given at upload works for download too
    let file = vault
        .download_decrypted("quarterly report.pdf", PASSWORD)
        .await?;
    assert_eq!(file.filename, "quarterly-report.pdf");
    assert_eq!(file.content, b"numbers go up");
    Ok(())
}
