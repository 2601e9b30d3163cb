use std::process::Command;
use tempfile::tempdir;

fn migrate_command(home: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_image-asset-migrator"));
    command
        .arg("migrate")
        .env("HOME", home)
        .env_remove("IMAGE_ASSET_REPOSITORY_URL")
        .env_remove("IMAGE_ASSET_REPOSITORY_LOGIN")
        .env_remove("IMAGE_ASSET_REPOSITORY_PASSWORD")
        .env_remove("RUST_LOG");
    command
}

#[test]
fn test_migrate_requires_four_positional_arguments() {
    let temp_dir = tempdir().unwrap();

    let output = migrate_command(temp_dir.path())
        .args(["article", "image", "asset"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TARGET_LOCATION"), "stderr: {}", stderr);
}

#[test]
fn test_migrate_without_repository_url_fails() {
    let temp_dir = tempdir().unwrap();

    let output = migrate_command(temp_dir.path())
        .args(["article", "image", "asset", "51", "--yes"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Repository URL not provided"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_migrate_rejects_same_source_and_target_field() {
    let temp_dir = tempdir().unwrap();

    let output = migrate_command(temp_dir.path())
        .args([
            "article",
            "image",
            "image",
            "51",
            "--repository-url",
            "http://127.0.0.1:9/api/ezp/v2",
            "--yes",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Source and target field must differ"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_migrate_fails_when_repository_unreachable() {
    let temp_dir = tempdir().unwrap();

    let output = migrate_command(temp_dir.path())
        .args([
            "article",
            "image",
            "asset",
            "51",
            "--repository-url",
            "http://127.0.0.1:9/api/ezp/v2",
            "--max-retries",
            "0",
            "--yes",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to load import user 123"),
        "stderr: {}",
        stderr
    );
}
