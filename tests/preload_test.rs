use bumble::host::config::HostConfig;
use bumble::host::{Frame, Host};
use bumble::preload::{Asset, Fetcher, Preloader, Resource, ResourceKind};
use bumble::runtime::body::{ScriptBuilder, from_fn};
use bumble::runtime::operation::{Resolver, deferred};
use bumble::runtime::{Awaitable, Operation, Step};
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Hands out deferred operations and lets the test settle them by name.
#[derive(Default)]
struct ManualFetcher {
    resolvers: RefCell<HashMap<String, Resolver<Asset>>>,
    fetches: Cell<usize>,
}

impl ManualFetcher {
    fn resolve(&self, name: &str, asset: Asset) {
        let resolvers = self.resolvers.borrow();
        let resolver = resolvers.get(name).expect("resource was never fetched");
        assert!(resolver.resolve(asset));
    }

    fn reject(&self, name: &str, reason: &str) {
        let resolvers = self.resolvers.borrow();
        let resolver = resolvers.get(name).expect("resource was never fetched");
        assert!(resolver.reject(reason));
    }
}

impl Fetcher for ManualFetcher {
    fn fetch(&self, resource: &Resource) -> Box<dyn Operation<Asset>> {
        let (op, resolver) = deferred();
        self.resolvers.borrow_mut().insert(resource.name.clone(), resolver);
        self.fetches.set(self.fetches.get() + 1);
        Box::new(op)
    }
}

fn png() -> Asset {
    Asset::Image(Arc::from(&b"\x89PNG"[..]))
}

#[test]
fn test_progress_tracks_loaded_resources() {
    let fetcher = Rc::new(ManualFetcher::default());
    let mut preloader = Preloader::new(fetcher.clone());
    assert!(!preloader.loading());
    assert_eq!(preloader.progress(), 1.0);

    preloader.load_image("hero", "img/hero.png");
    preloader.load_data("level", "data/level1.json");
    assert!(preloader.loading());
    assert_eq!(preloader.progress(), 0.0);

    preloader.update();
    assert_eq!(fetcher.fetches.get(), 2);
    assert!(preloader.loading());

    fetcher.resolve("hero", png());
    preloader.update();
    assert_eq!(preloader.progress(), 0.5);
    assert!(preloader.loading());
    assert!(preloader.image("hero").is_some());
    assert!(preloader.data("level").is_none());

    fetcher.resolve("level", Asset::Data(json!({"width": 20})));
    preloader.update();
    assert_eq!(preloader.progress(), 1.0);
    assert!(!preloader.loading());
    assert_eq!(preloader.data("level"), Some(json!({"width": 20})));
    assert_eq!(preloader.cached(), 2);
}

#[test]
fn test_failed_load_is_counted_and_loading_settles() {
    let fetcher = Rc::new(ManualFetcher::default());
    let mut preloader = Preloader::new(fetcher.clone());
    preloader.load_all(vec![
        Resource::new("theme", "audio/theme.ogg", ResourceKind::Audio),
        Resource::new("missing", "audio/missing.ogg", ResourceKind::Audio),
    ]);
    preloader.update();

    fetcher.resolve("theme", Asset::Audio(Arc::from(&b"OggS"[..])));
    fetcher.reject("missing", "404");
    preloader.update();

    // The legacy ratio never reaches 1.0 ...
    assert_eq!(preloader.progress(), 0.5);
    assert_eq!(preloader.loaded(), 1);
    // ... but the failure is visible and loading does not hang.
    assert_eq!(preloader.failed(), ["missing".to_string()]);
    assert_eq!(preloader.failed_count(), 1);
    assert!(preloader.is_settled());
    assert!(!preloader.loading());
    assert!(preloader.audio("missing").is_none());
    assert!(preloader.audio("theme").is_some());
}

#[test]
fn test_cached_resource_is_not_fetched_again() {
    let fetcher = Rc::new(ManualFetcher::default());
    let mut preloader = Preloader::new(fetcher.clone());
    preloader.load_image("hero", "img/hero.png");
    preloader.update();
    fetcher.resolve("hero", png());
    preloader.update();
    assert!(!preloader.loading());

    let handle = preloader.load_image("hero", "img/hero.png");
    assert!(preloader.loading());
    preloader.update();

    assert_eq!(fetcher.fetches.get(), 1);
    assert_eq!(handle.result(), Some(png()));
    assert_eq!(preloader.started(), 2);
    assert_eq!(preloader.loaded(), 2);
    assert!(!preloader.loading());
}

#[test]
fn test_mismatched_asset_kind_fails_load() {
    let fetcher = Rc::new(ManualFetcher::default());
    let mut preloader = Preloader::new(fetcher.clone());
    let handle = preloader.load_image("hero", "img/hero.png");
    preloader.update();

    fetcher.resolve("hero", Asset::Data(Value::Null));
    preloader.update();

    assert!(handle.is_failed());
    assert!(preloader.image("hero").is_none());
    assert_eq!(preloader.failed(), ["hero".to_string()]);
}

#[test]
fn test_clear_caches_by_kind() {
    let fetcher = Rc::new(ManualFetcher::default());
    let mut preloader = Preloader::new(fetcher.clone());
    preloader.load_image("hero", "img/hero.png");
    preloader.load_data("level", "data/level1.json");
    preloader.update();
    fetcher.resolve("hero", png());
    fetcher.resolve("level", Asset::Data(json!([1, 2, 3])));
    preloader.update();
    assert_eq!(preloader.cached(), 2);

    preloader.clear_images();
    assert!(preloader.image("hero").is_none());
    assert!(preloader.get(ResourceKind::Data, "level").is_some());

    preloader.clear_all();
    assert_eq!(preloader.cached(), 0);
}

#[test]
fn test_host_runs_routines_after_preload() {
    let fetcher = Rc::new(ManualFetcher::default());
    let mut host = Host::new(HostConfig::default(), fetcher.clone());
    host.preloader_mut().load_data("level", "data/level1.json");
    let routine = host.run_coroutine(from_fn(|_| Ok(Step::Done(json!("started")))));

    assert_eq!(host.update(), Frame::Loading { progress: 0.0 });
    assert!(!routine.is_finished());

    fetcher.resolve("level", Asset::Data(json!({})));
    assert_eq!(host.update(), Frame::Loading { progress: 1.0 });
    assert!(!routine.is_finished(), "Routines wait for the preloader");

    match host.update() {
        Frame::Running(stats) => assert_eq!(stats.completed, 1),
        other => panic!("expected a running frame, got {:?}", other),
    }
    assert_eq!(routine.result(), Some(json!("started")));
    assert_eq!(host.frames(), 3);
}

#[test]
fn test_host_clear_coroutines() {
    let fetcher = Rc::new(ManualFetcher::default());
    let mut host = Host::new(HostConfig::default(), fetcher);
    let routine = host.run_coroutine(
        ScriptBuilder::<Value>::new()
            .step(|_| Ok(Awaitable::Value(json!(1))))
            .finish(|_| Ok(json!("done"))),
    );
    assert_eq!(host.coroutines(), 1);

    host.clear_coroutines();
    assert_eq!(host.coroutines(), 0);
    host.update();
    host.update();
    assert!(!routine.is_finished());
}

#[tokio::test]
async fn test_host_run_for_drives_routines() {
    let fetcher = Rc::new(ManualFetcher::default());
    let config = HostConfig { framerate: 1000, max_ticks: None };
    let mut host = Host::new(config, fetcher);
    let routine = host.run_coroutine(
        ScriptBuilder::<Value>::new()
            .step(|_| Ok(Awaitable::Value(json!(1))))
            .step(|_| Ok(Awaitable::Value(json!(2))))
            .finish(|input| input.into_required("last value")),
    );

    host.run_for(2).await;
    assert!(!routine.is_finished());
    host.run_for(1).await;
    assert_eq!(routine.result(), Some(json!(2)));
}

#[tokio::test]
async fn test_run_until_loaded_gives_up_after_max_ticks() {
    let fetcher = Rc::new(ManualFetcher::default());
    let config = HostConfig { framerate: 1000, max_ticks: Some(5) };
    let mut host = Host::new(config, fetcher);
    host.preloader_mut().load_image("never", "img/never.png");

    let err = host.run_until_loaded().await.expect_err("preload should time out");
    assert!(err.to_string().contains("did not settle after 5 frames"));
    assert_eq!(host.frames(), 5);
}
