use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::test_utils::enable_logger;
use crate::test_utils::sample_config;
use crate::test_utils::AppConfig;
use crate::test_utils::Item;
use crate::test_utils::Settings;
use crate::Backend;
use crate::BindError;
use crate::Entries;
use crate::Error;
use crate::MemoryBackend;
use crate::MockBackend;
use crate::PathExpressionError;
use crate::StorageError;

type Writes = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

/// Mock serving `stored` and recording every write.
fn recording_backend(stored: Entries) -> (MockBackend, Writes) {
    let writes: Writes = Arc::default();
    let sink = writes.clone();
    let mut backend = MockBackend::new();
    backend.expect_load().returning(move |_, path| {
        Ok(stored
            .iter()
            .filter(|(k, _)| if path.ends_with('/') { k.starts_with(path) } else { k.as_str() == path })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    });
    backend.expect_save().returning(move |_, path, data| {
        sink.lock().push((path.to_string(), data));
        Ok(())
    });
    backend.expect_watch().returning(|_, _, _| Ok(()));
    (backend, writes)
}

fn written_names(writes: &Writes) -> Vec<String> {
    writes.lock().iter().map(|(name, _)| name.clone()).collect()
}

fn options(backend: impl Backend) -> BindOptions {
    BindOptions::new().backend(Arc::new(backend)).without_watch(true)
}

fn fresh_config() -> AppConfig {
    AppConfig {
        name: "demo".to_string(),
        settings: Settings {
            theme: "dark".to_string(),
            retries: 3,
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_initial_bind_on_empty_backend_skips_empty_collections() {
    enable_logger();
    let ctx = CancellationToken::new();
    let (backend, writes) = recording_backend(Entries::new());

    let binder = bind(ctx.clone(), fresh_config(), "cfg.json", options(backend)).await.unwrap();
    assert_eq!(written_names(&writes), vec!["cfg.json", "cfg/settings.json"]);

    writes.lock().clear();
    binder.update(|c| c.items.push(Item::new(1, "one")));
    binder.save(&ctx).await.unwrap();
    assert_eq!(written_names(&writes), vec!["cfg/items/0.json"]);
}

#[tokio::test]
async fn test_save_without_changes_writes_nothing() {
    let ctx = CancellationToken::new();
    let (backend, writes) = recording_backend(Entries::new());
    let binder = bind(ctx.clone(), sample_config(), "cfg.json", options(backend)).await.unwrap();
    assert_eq!(writes.lock().len(), 6);

    writes.lock().clear();
    binder.save(&ctx).await.unwrap();
    binder.save(&ctx).await.unwrap();
    assert!(writes.lock().is_empty());
}

#[tokio::test]
async fn test_save_writes_only_changed_keys_and_deletes_removed_ones() {
    let ctx = CancellationToken::new();
    let (backend, writes) = recording_backend(Entries::new());
    let binder = bind(ctx.clone(), sample_config(), "cfg.json", options(backend)).await.unwrap();
    writes.lock().clear();

    binder.update(|c| {
        c.settings.retries = 5;
        c.items.pop();
    });
    binder.save(&ctx).await.unwrap();

    let writes = writes.lock();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].0, "cfg/settings.json");
    assert_eq!(
        String::from_utf8(writes[0].1.clone()).unwrap(),
        "{\n\t\"theme\": \"dark\",\n\t\"retries\": 5\n}"
    );
    assert_eq!(writes[1], ("cfg/items/1.json".to_string(), Vec::new()));
}

#[tokio::test]
async fn test_save_stops_at_first_failure_and_retries_later() {
    let ctx = CancellationToken::new();
    let attempts = Arc::new(Mutex::new(0usize));
    let counter = attempts.clone();
    let mut backend = MockBackend::new();
    backend.expect_load().returning(|_, _| Ok(Entries::new()));
    backend.expect_save().returning(move |_, _, _| {
        let mut n = counter.lock();
        *n += 1;
        if *n == 1 {
            Err(StorageError::Backend("disk full".to_string()).into())
        } else {
            Ok(())
        }
    });

    let result = bind(ctx.clone(), fresh_config(), "cfg.json", options(backend)).await;
    assert!(matches!(result, Err(Error::Storage(StorageError::Backend(_)))));
    assert_eq!(*attempts.lock(), 1);
}

#[tokio::test]
async fn test_failed_write_is_retried_by_next_save() {
    let ctx = CancellationToken::new();
    let fail = Arc::new(Mutex::new(false));
    let writes: Writes = Arc::default();
    let (flag, sink) = (fail.clone(), writes.clone());
    let mut backend = MockBackend::new();
    backend.expect_load().returning(|_, _| Ok(Entries::new()));
    backend.expect_save().returning(move |_, path, data| {
        if *flag.lock() {
            return Err(StorageError::Backend("offline".to_string()).into());
        }
        sink.lock().push((path.to_string(), data));
        Ok(())
    });

    let binder = bind(ctx.clone(), fresh_config(), "cfg.json", options(backend)).await.unwrap();
    writes.lock().clear();

    binder.update(|c| c.name = "next".to_string());
    *fail.lock() = true;
    assert!(binder.save(&ctx).await.is_err());

    *fail.lock() = false;
    binder.save(&ctx).await.unwrap();
    assert_eq!(written_names(&writes), vec!["cfg.json"]);
}

#[tokio::test]
async fn test_bind_loads_existing_content() {
    let ctx = CancellationToken::new();
    let stored = Entries::from([
        ("cfg.json".to_string(), br#"{"name":"stored"}"#.to_vec()),
        ("cfg/items/0.json".to_string(), br#"{"id":9,"label":"nine"}"#.to_vec()),
    ]);
    let (backend, writes) = recording_backend(stored);

    let binder = bind(ctx.clone(), sample_config(), "cfg.json", options(backend)).await.unwrap();
    let config = binder.get();
    assert_eq!(config.name, "stored");
    assert_eq!(config.items, vec![Item::new(9, "nine")]);
    // not stored: keeps the in-memory value
    assert_eq!(config.settings, sample_config().settings);
    assert!(writes.lock().is_empty());

    // the stored keys are cached; only the missing ones are written
    binder.save(&ctx).await.unwrap();
    assert_eq!(
        written_names(&writes),
        vec!["cfg/settings.json", "cfg/labels/env.json", "cfg/labels/zone.json"]
    );
}

#[tokio::test]
async fn test_decode_failure_on_first_load_is_fatal() {
    let ctx = CancellationToken::new();
    let stored = Entries::from([("cfg/settings.json".to_string(), b"{broken".to_vec())]);
    let (backend, _) = recording_backend(stored);

    let result = bind(ctx, sample_config(), "cfg.json", options(backend)).await;
    assert!(matches!(result, Err(Error::Decode { ref path, .. }) if path == "cfg/settings"));
}

#[tokio::test]
async fn test_unsupported_scheme_is_rejected() {
    let ctx = CancellationToken::new();
    let result = bind(ctx, sample_config(), "etcd://localhost/cfg.json", BindOptions::new()).await;
    assert!(matches!(result, Err(Error::Bind(BindError::UnsupportedScheme(_)))));
}

#[tokio::test]
async fn test_cancelled_context_aborts_bind() {
    let ctx = CancellationToken::new();
    ctx.cancel();
    let result = bind(ctx, sample_config(), "cfg.json", options(MemoryBackend::new())).await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_yaml_extension_selects_codec_and_names() {
    let ctx = CancellationToken::new();
    let backend = Arc::new(MemoryBackend::new());
    let binder = bind(
        ctx,
        fresh_config(),
        "app/cfg.yaml",
        BindOptions::new().backend(backend.clone()).without_watch(true),
    )
    .await
    .unwrap();

    assert_eq!(binder.root(), "app/cfg");
    let entries = backend.entries();
    assert_eq!(
        entries.keys().collect::<Vec<_>>(),
        vec!["app/cfg.yaml", "app/cfg/settings.yaml"]
    );
    assert_eq!(entries["app/cfg.yaml"], b"name: demo\n".to_vec());
}

#[tokio::test]
async fn test_without_extension_stores_bare_names() {
    let ctx = CancellationToken::new();
    let backend = Arc::new(MemoryBackend::new());
    let binder = bind(
        ctx,
        fresh_config(),
        "cfg",
        BindOptions::new()
            .backend(backend.clone())
            .without_watch(true)
            .without_extension(true),
    )
    .await
    .unwrap();

    assert_eq!(binder.file_names(), vec!["cfg", "cfg/items/", "cfg/labels/", "cfg/settings"]);
    assert!(backend.entries().contains_key("cfg/settings"));
}

#[tokio::test]
async fn test_bind_field_fires_immediately_and_on_force_load() {
    let ctx = CancellationToken::new();
    let backend = Arc::new(MemoryBackend::new());
    let binder = bind(
        ctx.clone(),
        sample_config(),
        "cfg.json",
        BindOptions::new().backend(backend.clone()).without_watch(true),
    )
    .await
    .unwrap();

    let calls: Arc<Mutex<Vec<(Value, Value)>>> = Arc::default();
    let sink = calls.clone();
    binder
        .bind_field("settings.theme", move |new, old| sink.lock().push((new.clone(), old.clone())))
        .await
        .unwrap();
    assert_eq!(*calls.lock(), vec![(json!("dark"), json!("dark"))]);

    backend
        .save(&ctx, "cfg/settings.json", br#"{"theme":"light","retries":3}"#.to_vec())
        .await
        .unwrap();
    binder.force_load(&ctx).await.unwrap();

    assert_eq!(binder.get().settings.theme, "light");
    assert_eq!(calls.lock().last().cloned(), Some((json!("light"), json!("dark"))));

    // no further change, no further call
    binder.force_load(&ctx).await.unwrap();
    assert_eq!(calls.lock().len(), 2);
}

#[tokio::test]
async fn test_bind_field_as_typed_values() {
    let ctx = CancellationToken::new();
    let binder = bind(ctx, sample_config(), "cfg.json", options(MemoryBackend::new()))
        .await
        .unwrap();

    let seen: Arc<Mutex<Vec<(u32, u32)>>> = Arc::default();
    let sink = seen.clone();
    binder
        .bind_field_as::<u32, _>("settings.retries", move |new, old| sink.lock().push((new, old)))
        .await
        .unwrap();
    assert_eq!(*seen.lock(), vec![(3, 3)]);
}

#[tokio::test]
async fn test_bind_field_rejects_bad_expressions() {
    let ctx = CancellationToken::new();
    let binder = bind(ctx, sample_config(), "cfg.json", options(MemoryBackend::new()))
        .await
        .unwrap();

    let err = binder.bind_field("settings..theme", |_, _| {}).await.unwrap_err();
    assert!(matches!(err, Error::PathExpression(PathExpressionError::Malformed { .. })));

    let err = binder.bind_field("missing", |_, _| {}).await.unwrap_err();
    assert!(matches!(err, Error::PathExpression(PathExpressionError::FieldNotFound(_))));
}

#[tokio::test]
async fn test_field_value_does_not_auto_create() {
    let ctx = CancellationToken::new();
    let binder = bind(ctx, sample_config(), "cfg.json", options(MemoryBackend::new()))
        .await
        .unwrap();

    assert_eq!(binder.field_value("items[1].label").unwrap(), json!("two"));
    let err = binder.field_value("items[5]").unwrap_err();
    assert!(matches!(
        err,
        Error::PathExpression(PathExpressionError::OutOfRange { index: 5, len: 2 })
    ));
}

#[tokio::test]
async fn test_force_load_on_empty_backend_is_no_files() {
    let ctx = CancellationToken::new();
    let backend = Arc::new(MemoryBackend::new());
    let binder = bind(
        ctx.clone(),
        fresh_config(),
        "cfg.json",
        BindOptions::new().backend(backend.clone()).without_watch(true),
    )
    .await
    .unwrap();

    for name in backend.entries().into_keys() {
        backend.save(&ctx, &name, Vec::new()).await.unwrap();
    }
    assert!(matches!(binder.force_load(&ctx).await, Err(Error::NoFiles)));
}

#[tokio::test]
async fn test_shared_locker_serializes_two_binders() {
    let ctx = CancellationToken::new();
    let locker: Locker = Arc::default();
    let backend = Arc::new(MemoryBackend::new());
    let opts = BindOptions::new()
        .backend(backend.clone())
        .without_watch(true)
        .locker(locker.clone());

    let a = bind(ctx.clone(), sample_config(), "a.json", opts.clone()).await.unwrap();
    let b = bind(ctx.clone(), sample_config(), "b.json", opts).await.unwrap();

    let (ra, rb) = tokio::join!(a.save(&ctx), b.save(&ctx));
    ra.unwrap();
    rb.unwrap();
    assert!(locker.try_lock().is_ok());
}

#[tokio::test]
async fn test_ttl_reload_picks_up_backend_changes() {
    let ctx = CancellationToken::new();
    let backend = Arc::new(MemoryBackend::new());
    let binder = bind(
        ctx.clone(),
        sample_config(),
        "cfg.json",
        BindOptions::new()
            .backend(backend.clone())
            .without_watch(true)
            .ttl(Duration::from_millis(20)),
    )
    .await
    .unwrap();

    backend
        .save(&ctx, "cfg.json", br#"{"name":"polled"}"#.to_vec())
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while binder.get().name != "polled" {
        assert!(tokio::time::Instant::now() < deadline, "ttl reload never happened");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    ctx.cancel();
}

#[tokio::test]
async fn test_options_from_config() {
    let config = crate::BinderConfig {
        tag_name: "kv".to_string(),
        without_watch: true,
        ttl_ms: 250,
        ..Default::default()
    };
    let options = BindOptions::from_config(&config);
    assert_eq!(options.tag_name, "kv");
    assert!(options.without_watch);
    assert_eq!(options.ttl, Some(Duration::from_millis(250)));
    assert!(!options.without_extension);
}
