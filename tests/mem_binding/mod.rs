use std::sync::Arc;
use std::time::Duration;

use kvbind::bind;
use kvbind::Backend;
use kvbind::BindOptions;
use kvbind::ChangeBatch;
use kvbind::MemoryBackend;
use kvbind::Result;
use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::config;
use crate::common::wait_until;
use crate::common::Config;
use crate::common::Item;

/// Backend names written since the last drain.
async fn drain(rx: &mut mpsc::Receiver<ChangeBatch>) -> Vec<String> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut names = Vec::new();
    while let Ok(batch) = rx.try_recv() {
        names.extend(batch.into_keys());
    }
    names
}

#[tokio::test]
async fn test_object_lifecycle_writes_minimal_sets() -> Result<()> {
    crate::enable_logger();
    let ctx = CancellationToken::new();
    let backend = Arc::new(MemoryBackend::new());
    let (tx, mut rx) = mpsc::channel(64);
    backend
        .watch(ctx.clone(), vec!["cfg.json".to_string(), "cfg/".to_string()], tx)
        .await?;

    let binder = bind(
        ctx.clone(),
        config(),
        "mem://cfg.json",
        BindOptions::new().backend(backend.clone()).without_watch(true),
    )
    .await?;

    // empty collection: no item files
    assert_eq!(drain(&mut rx).await, vec!["cfg.json", "cfg/settings.json"]);
    let entries = backend.entries();
    assert_eq!(entries["cfg.json"], b"{\n\t\"Name\": \"demo\"\n}".to_vec());
    assert_eq!(
        entries["cfg/settings.json"],
        b"{\n\t\"theme\": \"dark\",\n\t\"retries\": 3\n}".to_vec()
    );

    binder.update(|c| c.items.push(Item::new(1, "one")));
    binder.save(&ctx).await?;
    assert_eq!(drain(&mut rx).await, vec!["cfg/items/0.json"]);

    binder.save(&ctx).await?;
    assert!(drain(&mut rx).await.is_empty());

    binder.update(|c| c.items.clear());
    binder.save(&ctx).await?;
    assert_eq!(drain(&mut rx).await, vec!["cfg/items/0.json"]);
    assert!(!backend.entries().contains_key("cfg/items/0.json"));

    ctx.cancel();
    Ok(())
}

#[tokio::test]
async fn test_two_binders_share_a_namespace() -> Result<()> {
    crate::enable_logger();
    let ctx = CancellationToken::new();
    // one registry, one in-memory store
    let options = BindOptions::new();

    let writer = bind(ctx.clone(), config(), "mem://shared/cfg.json", options.clone()).await?;
    let reader = bind(ctx.clone(), config(), "mem://shared/cfg.json", options).await?;

    let labels: Arc<Mutex<Vec<(Value, Value)>>> = Arc::default();
    let sink = labels.clone();
    reader
        .bind_field("items[0].label", move |new, old| sink.lock().push((new.clone(), old.clone())))
        .await?;
    assert_eq!(*labels.lock(), vec![(json!(""), json!(""))]);

    writer.update(|c| {
        c.items.push(Item::new(7, "seven"));
        c.settings.retries = 9;
    });
    writer.save(&ctx).await?;

    assert!(
        wait_until(|| {
            let reader = reader.clone();
            async move { reader.read(|c| c.items.len() == 1 && c.settings.retries == 9) }
        })
        .await
    );
    assert_eq!(reader.get().items[0], Item::new(7, "seven"));
    assert!(wait_until(|| {
        let labels = labels.clone();
        async move { labels.lock().len() == 2 }
    })
    .await);
    assert_eq!(labels.lock()[1], (json!("seven"), json!("")));

    ctx.cancel();
    Ok(())
}

#[tokio::test]
async fn test_second_bind_loads_what_the_first_saved() -> Result<()> {
    let ctx = CancellationToken::new();
    let backend = Arc::new(MemoryBackend::new());
    let options = BindOptions::new().backend(backend.clone()).without_watch(true);

    let first = bind(ctx.clone(), config(), "app/cfg.yaml", options.clone()).await?;
    first.update(|c| {
        c.name = "renamed".to_string();
        c.items = vec![Item::new(1, "a"), Item::new(2, "b")];
    });
    first.save(&ctx).await?;
    assert_eq!(backend.entries()["app/cfg/items/1.yaml"], b"id: 2\nlabel: b\n".to_vec());

    let second = bind(ctx.clone(), Config::default(), "app/cfg.yaml", options).await?;
    assert_eq!(second.get(), first.get());
    Ok(())
}
