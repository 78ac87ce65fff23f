use std::path::Path;

use kvbind::bind;
use kvbind::BindOptions;
use kvbind::Error;
use kvbind::Result;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::common::config;
use crate::common::wait_until;
use crate::common::Config;
use crate::common::Item;

/// Replaces `path` in one step so watchers never see a half-written file.
async fn replace_file(
    path: &Path,
    content: &str,
) {
    let staging = path.with_file_name(".staging");
    tokio::fs::write(&staging, content).await.unwrap();
    tokio::fs::rename(&staging, path).await.unwrap();
}

fn root_of(dir: &TempDir) -> String {
    dir.path().join("cfg.json").to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_bind_creates_files_and_reloads_them() -> Result<()> {
    crate::enable_logger();
    let dir = TempDir::new()?;
    let ctx = CancellationToken::new();
    let options = BindOptions::new().without_watch(true);

    let binder = bind(ctx.clone(), config(), &root_of(&dir), options.clone()).await?;
    assert!(dir.path().join("cfg.json").exists());
    assert!(dir.path().join("cfg/settings.json").exists());
    assert!(!dir.path().join("cfg/items").exists());

    binder.update(|c| c.items = vec![Item::new(1, "one"), Item::new(2, "two")]);
    binder.save(&ctx).await?;
    let stored = tokio::fs::read_to_string(dir.path().join("cfg/items/1.json")).await?;
    assert_eq!(stored, "{\n\t\"id\": 2,\n\t\"label\": \"two\"\n}");

    let reloaded = bind(ctx.clone(), Config::default(), &root_of(&dir), options).await?;
    assert_eq!(reloaded.get(), binder.get());
    Ok(())
}

#[tokio::test]
async fn test_file_uri_and_force_load() -> Result<()> {
    let dir = TempDir::new()?;
    let ctx = CancellationToken::new();
    let uri = format!("file://{}", root_of(&dir));

    let binder = bind(ctx.clone(), config(), &uri, BindOptions::new().without_watch(true)).await?;
    replace_file(&dir.path().join("cfg/settings.json"), r#"{"theme":"light","retries":1}"#).await;
    tokio::fs::create_dir_all(dir.path().join("cfg/items")).await?;
    replace_file(&dir.path().join("cfg/items/0.json"), r#"{"id":5,"label":"five"}"#).await;

    binder.force_load(&ctx).await?;
    let config = binder.get();
    assert_eq!(config.settings.theme, "light");
    assert_eq!(config.items, vec![Item::new(5, "five")]);
    Ok(())
}

#[tokio::test]
async fn test_force_load_without_files_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let ctx = CancellationToken::new();
    let binder = bind(ctx.clone(), config(), &root_of(&dir), BindOptions::new().without_watch(true)).await?;

    tokio::fs::remove_file(dir.path().join("cfg.json")).await?;
    tokio::fs::remove_dir_all(dir.path().join("cfg")).await?;
    assert!(matches!(binder.force_load(&ctx).await, Err(Error::NoFiles)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_external_edits_are_merged() -> Result<()> {
    crate::enable_logger();
    let dir = TempDir::new()?;
    let ctx = CancellationToken::new();
    let binder = bind(ctx.clone(), config(), &root_of(&dir), BindOptions::new()).await?;

    replace_file(&dir.path().join("cfg/settings.json"), r#"{"theme":"light","retries":3}"#).await;
    assert!(
        wait_until(|| {
            let binder = binder.clone();
            async move { binder.read(|c| c.settings.theme == "light") }
        })
        .await
    );

    replace_file(&dir.path().join("cfg/items/0.json"), r#"{"id":1,"label":"one"}"#).await;
    assert!(
        wait_until(|| {
            let binder = binder.clone();
            async move { binder.read(|c| c.items == vec![Item::new(1, "one")]) }
        })
        .await
    );

    tokio::fs::remove_file(dir.path().join("cfg/items/0.json")).await?;
    assert!(
        wait_until(|| {
            let binder = binder.clone();
            async move { binder.read(|c| c.items.is_empty()) }
        })
        .await
    );

    ctx.cancel();
    Ok(())
}
