mod common;

use common::{asset, drain_spawned_tasks, InMemoryCatalog, ScriptedThumbnails};
use modelshelf::catalog::{Asset, AssetId};
use modelshelf::service::CatalogService;
use modelshelf::thumbnails::{self, ReconcileStats, ThumbnailCache};
use std::sync::Arc;

fn service_with(assets: Vec<Asset>) -> (Arc<InMemoryCatalog>, Arc<dyn CatalogService>) {
    let concrete = Arc::new(InMemoryCatalog::new(assets));
    let service: Arc<dyn CatalogService> = concrete.clone();
    (concrete, service)
}

#[tokio::test]
async fn satisfied_assets_are_cached_without_rendering() {
    let mut satisfied = asset(2, "/models/b.glb");
    satisfied.thumbnail = "X".to_string();
    satisfied.poly_count = 5;
    let mut assets = vec![asset(1, "/models/a.glb"), satisfied];
    let (concrete, service) = service_with(assets.clone());

    let mut source = ScriptedThumbnails::new();
    source.succeed(1, 12);
    let mut cache = ThumbnailCache::new();

    let stats = thumbnails::reconcile(&mut cache, &mut assets, &mut source, &service).await;
    drain_spawned_tasks().await;

    assert_eq!(stats, ReconcileStats { cached: 1, generated: 1, failed: 0 });
    assert_eq!(source.invoked, [AssetId(1)], "only the unsatisfied asset renders");
    assert_eq!(cache.get(AssetId(2)), Some("X"));
    assert_eq!(cache.get(AssetId(1)), Some("data:image/png;base64,render-1"));
    assert_eq!(assets[0].poly_count, 12);

    concrete.with_state(|s| {
        assert_eq!(s.saved_poly_counts.get(&AssetId(1)), Some(&12));
        assert!(s.saved_thumbnails.contains_key(&AssetId(1)));
        assert!(!s.saved_thumbnails.contains_key(&AssetId(2)));
    });
}

#[tokio::test]
async fn image_without_count_is_recounted_but_not_rerendered() {
    let mut stale = asset(1, "/models/a.glb");
    stale.thumbnail = "existing".to_string();
    let mut assets = vec![stale];
    let (concrete, service) = service_with(assets.clone());

    let mut source = ScriptedThumbnails::new();
    source.succeed(1, 44);
    let mut cache = ThumbnailCache::new();

    let stats = thumbnails::reconcile(&mut cache, &mut assets, &mut source, &service).await;
    drain_spawned_tasks().await;

    // An image-bearing asset tallies as cached even when it is re-counted.
    assert_eq!(stats, ReconcileStats { cached: 1, generated: 0, failed: 0 });
    assert_eq!(assets[0].thumbnail, "existing", "existing image must not be overwritten");
    assert_eq!(cache.get(AssetId(1)), Some("existing"));
    assert_eq!(assets[0].poly_count, 44);
    concrete.with_state(|s| {
        assert!(!s.saved_thumbnails.contains_key(&AssetId(1)));
        assert_eq!(s.saved_poly_counts.get(&AssetId(1)), Some(&44));
    });
}

#[tokio::test]
async fn failed_recount_still_tallies_as_cached() {
    let mut stale = asset(1, "/models/a.glb");
    stale.thumbnail = "existing".to_string();
    let mut assets = vec![stale];
    let (_concrete, service) = service_with(assets.clone());

    let mut source = ScriptedThumbnails::new();
    source.fail(1, "decode error");
    let mut cache = ThumbnailCache::new();

    let stats = thumbnails::reconcile(&mut cache, &mut assets, &mut source, &service).await;

    assert_eq!(stats, ReconcileStats { cached: 1, generated: 0, failed: 0 });
    assert_eq!(assets[0].thumbnail, "existing");
    assert_eq!(assets[0].poly_count, 0);
    assert_eq!(cache.get(AssetId(1)), Some("existing"));
}

#[tokio::test]
async fn per_asset_failures_do_not_stop_the_pass() {
    let mut assets =
        vec![asset(1, "/models/a.glb"), asset(2, "/models/bad.glb"), asset(3, "/models/c.glb")];
    let (_concrete, service) = service_with(assets.clone());

    let mut source = ScriptedThumbnails::new();
    source.succeed(1, 6);
    source.fail(2, "decode error");
    source.succeed(3, 9);
    let mut cache = ThumbnailCache::new();

    let stats = thumbnails::reconcile(&mut cache, &mut assets, &mut source, &service).await;
    drain_spawned_tasks().await;

    assert_eq!(stats, ReconcileStats { cached: 0, generated: 2, failed: 1 });
    assert_eq!(source.invoked, [AssetId(1), AssetId(2), AssetId(3)]);
    assert!(cache.get(AssetId(2)).is_none());
    assert!(!assets[1].has_thumbnail());
    assert_eq!(assets[1].poly_count, 0);
}

#[tokio::test]
async fn zero_triangle_render_keeps_image_but_skips_count_persistence() {
    let mut assets = vec![asset(1, "/models/empty.glb")];
    let (concrete, service) = service_with(assets.clone());

    let mut source = ScriptedThumbnails::new();
    source.succeed(1, 0);
    let mut cache = ThumbnailCache::new();

    let stats = thumbnails::reconcile(&mut cache, &mut assets, &mut source, &service).await;
    drain_spawned_tasks().await;

    assert_eq!(stats.generated, 1);
    assert!(assets[0].has_thumbnail());
    assert_eq!(assets[0].poly_count, 0);
    concrete.with_state(|s| {
        assert!(s.saved_thumbnails.contains_key(&AssetId(1)));
        assert!(s.saved_poly_counts.is_empty());
    });
}

#[tokio::test]
async fn unavailable_renderer_skips_the_pass() {
    let mut satisfied = asset(1, "/models/a.glb");
    satisfied.thumbnail = "X".to_string();
    satisfied.poly_count = 3;
    let mut assets = vec![satisfied, asset(2, "/models/b.glb")];
    let (_concrete, service) = service_with(assets.clone());

    let mut source = ScriptedThumbnails::new();
    source.available = false;
    let mut cache = ThumbnailCache::new();

    let stats = thumbnails::reconcile(&mut cache, &mut assets, &mut source, &service).await;
    assert_eq!(stats, ReconcileStats { cached: 1, generated: 0, failed: 0 });
    assert!(source.invoked.is_empty());
    assert_eq!(cache.get(AssetId(1)), Some("X"));
}

#[tokio::test]
async fn persistence_failure_keeps_the_local_patch() {
    let mut assets = vec![asset(1, "/models/a.glb")];
    let (concrete, service) = service_with(assets.clone());
    concrete.with_state(|s| s.fail_saves = true);

    let mut source = ScriptedThumbnails::new();
    source.succeed(1, 7);
    let mut cache = ThumbnailCache::new();

    let stats = thumbnails::reconcile(&mut cache, &mut assets, &mut source, &service).await;
    drain_spawned_tasks().await;

    assert_eq!(stats.generated, 1);
    assert!(assets[0].has_thumbnail());
    assert_eq!(assets[0].poly_count, 7);
    assert!(cache.get(AssetId(1)).is_some(), "cache writes never roll back");
    concrete.with_state(|s| assert!(s.saved_thumbnails.is_empty()));
}

#[tokio::test]
async fn regenerate_all_invalidates_then_restores() {
    let mut a = asset(1, "/models/a.glb");
    a.thumbnail = "old-1".to_string();
    a.poly_count = 10;
    let mut b = asset(2, "/models/bad.glb");
    b.thumbnail = "old-2".to_string();
    b.poly_count = 20;
    let mut assets = vec![a, b];
    let (_concrete, service) = service_with(assets.clone());

    let mut source = ScriptedThumbnails::new();
    source.succeed(1, 15);
    source.fail(2, "fetch failed");
    let mut cache = ThumbnailCache::new();
    cache.insert(AssetId(1), "old-1".to_string());
    cache.insert(AssetId(2), "old-2".to_string());

    thumbnails::invalidate_all(&mut cache, &mut assets);
    assert!(cache.is_empty());
    assert!(assets.iter().all(|a| !a.has_thumbnail() && a.poly_count == 0));

    let stats = thumbnails::reconcile(&mut cache, &mut assets, &mut source, &service).await;
    drain_spawned_tasks().await;

    assert_eq!(stats, ReconcileStats { cached: 0, generated: 1, failed: 1 });
    assert_eq!(assets[0].poly_count, 15);
    assert!(assets[0].has_thumbnail());
    // The failed asset stays empty until its source file decodes again.
    assert!(!assets[1].has_thumbnail());
    assert_eq!(assets[1].poly_count, 0);
}
