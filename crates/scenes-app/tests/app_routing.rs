//! Routing behaviour of scene apps.
//!
//! Guarantees exercised here:
//! - Rendering pages outside a router fails fast with a structural error.
//! - Tabs share their page's url prefix and the page url shows the first tab,
//!   while breadcrumbs name the container page.
//! - Drilldown pages are built once per concrete url and then reused.
//! - Paths no page, tab or drilldown matches render the fallback view.
//! - Variable state travels between the url query and the routed scene.

use pretty_assertions::assert_eq;
use scenes_app::{
    AppError, SceneApp, SceneAppConfig, SceneAppDrilldownView, SceneAppPage, SceneAppPageState,
    FALLBACK_TEST_ID,
};
use scenes_core::{
    RenderContext, SceneCanvasText, SceneFlexLayout, SceneFlexLayoutState, SceneObjectExt,
    SceneObjectRef, SceneSlots, UrlSyncOptions, UrlValue, ViewNode,
};
use scenes_test_utils::{example_variable, init_tracing, renders_key, text_page, wrap_in_scene, TestRouter};
use scenes_variables::SceneVariableSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn drilldown_scene(id: &str) -> SceneObjectRef {
    wrap_in_scene(SceneCanvasText::new(format!("{id} drilldown!")))
}

fn scene_page(title: &str, url: &str, object: &Arc<SceneCanvasText>) -> Arc<SceneAppPage> {
    let object = Arc::clone(object);
    SceneAppPage::new(
        SceneAppPageState::new(title, url).with_scene(move || wrap_in_scene(object.clone())),
    )
}

fn active_tab(view: &ViewNode) -> Option<String> {
    view.find(&|v| v.kind == "tab" && v.attributes.get("active").map(String::as_str) == Some("true"))
        .and_then(|v| v.attributes.get("title").cloned())
}

/// Tenet: pages need a router.
///
/// A host that forgets to mount the app under a router must learn about it
/// at once instead of seeing an empty screen.
#[test]
fn errors_when_rendered_outside_a_router() {
    let app = SceneApp::new(vec![text_page("Test", "/test", "Page 1")]);

    let err = app.render_app(&RenderContext::new()).unwrap_err();
    assert_eq!(err, AppError::OutsideRouter);
    assert!(err.is_structural());
    assert_eq!(
        err.to_string(),
        "Invariant failed: You should not use <Switch> outside a <Router>"
    );
}

#[test]
fn renders_the_page_for_the_url_and_follows_navigation() {
    init_tracing();
    let p1 = SceneCanvasText::new("Page 1");
    let p2 = SceneCanvasText::new("Page 2");
    let app = SceneApp::new(vec![
        scene_page("Test", "/test", &p1),
        scene_page("Test", "/test1", &p2),
    ]);
    let router = TestRouter::start(app, "/test");

    let view = router.view();
    assert!(renders_key(&view, p1.key()));
    assert!(!renders_key(&view, p2.key()));

    let view = router.push("/test1");
    assert!(renders_key(&view, p2.key()));
    assert!(!renders_key(&view, p1.key()));
    assert!(p2.is_active());
    assert!(!p1.is_active());
}

/// Tenet: the page url stands for its first tab.
///
/// Breadcrumbs report the container page, never the tab, so the trail stays
/// the same while the user switches tabs.
#[test]
fn page_with_tabs_renders_first_tab_for_its_own_url() {
    init_tracing();
    let p2 = SceneCanvasText::new("Page 2");
    let t1 = SceneCanvasText::new("Tab 1");
    let t2 = SceneCanvasText::new("Tab 2");
    let app = SceneApp::new(vec![
        SceneAppPage::new(
            SceneAppPageState::new("Container page", "/test")
                .with_tab(scene_page("Tab1", "/test/tab1", &t1))
                .with_tab(scene_page("Tab2", "/test/tab2", &t2)),
        ),
        scene_page("Test", "/test1", &p2),
    ]);
    let router = TestRouter::start(app, "/test");

    let view = router.view();
    assert_eq!(router.breadcrumbs(), vec!["Container page"]);
    assert!(renders_key(&view, t1.key()));
    assert!(!renders_key(&view, t2.key()));
    assert!(!renders_key(&view, p2.key()));
    assert_eq!(active_tab(&view).as_deref(), Some("Tab1"));

    let view = router.push("/test/tab1");
    assert!(renders_key(&view, t1.key()));

    let view = router.push("/test/tab2");
    assert!(renders_key(&view, t2.key()));
    assert!(!renders_key(&view, t1.key()));
    assert!(!renders_key(&view, p2.key()));
    assert_eq!(active_tab(&view).as_deref(), Some("Tab2"));
    assert_eq!(router.breadcrumbs(), vec!["Container page"]);
}

fn drilldown_app(page_object: &Arc<SceneCanvasText>) -> Arc<SceneApp> {
    let object = Arc::clone(page_object);
    SceneApp::new(vec![SceneAppPage::new(
        SceneAppPageState::new("Top level page", "/test-drilldown")
            .with_scene(move || wrap_in_scene(object.clone()))
            .with_drilldown(
                SceneAppDrilldownView::new("/test-drilldown/:id", |m, parent| {
                    let id = m.param("id").unwrap_or_default().to_string();
                    SceneAppPage::new(
                        SceneAppPageState::new(
                            format!("Drilldown {id}"),
                            &format!("/test-drilldown/{id}"),
                        )
                        .with_scene(move || drilldown_scene(&id))
                        .with_parent_page(parent),
                    )
                })
                .unwrap(),
            ),
    )])
}

#[test]
fn renders_a_page_level_drilldown() {
    init_tracing();
    let p1 = SceneCanvasText::new("Page 1");
    let router = TestRouter::start(drilldown_app(&p1), "/test-drilldown");
    assert!(renders_key(&router.view(), p1.key()));

    let view = router.push("/test-drilldown/some-id");
    assert!(view.contains_text("some-id drilldown!"));
    assert!(!renders_key(&view, p1.key()));
    assert_eq!(
        router.breadcrumbs(),
        vec!["Drilldown some-id", "Top level page"]
    );

    let view = router.push("/test-drilldown/some-other-id");
    assert!(view.contains_text("some-other-id drilldown!"));
    assert!(!view.contains_text("some-id drilldown!"));
    assert!(!renders_key(&view, p1.key()));
}

#[test]
fn unmatched_drilldown_path_renders_fallback() {
    let p1 = SceneCanvasText::new("Page 1");
    let router = TestRouter::start(drilldown_app(&p1), "/test-drilldown");

    let view = router.push("/test-drilldown/some-id/does-not-exist");
    assert!(view.find_by_test_id(FALLBACK_TEST_ID).is_some());
    assert!(!p1.is_active());
}

#[test]
fn drilldown_next_to_tabs_is_reachable_directly() {
    let p1 = SceneCanvasText::new("Page 1");
    let tab_object = Arc::clone(&p1);
    let app = SceneApp::new(vec![SceneAppPage::new(
        SceneAppPageState::new("Top level page", "/main")
            .with_tab(SceneAppPage::new(
                SceneAppPageState::new("Tab ", "/main/tab")
                    .with_scene(move || wrap_in_scene(tab_object.clone())),
            ))
            .with_drilldown(
                SceneAppDrilldownView::new("/main/drilldown/:id", |m, parent| {
                    let id = m.param("id").unwrap_or_default().to_string();
                    SceneAppPage::new(
                        SceneAppPageState::new(format!("Drilldown {id}"), &m.url)
                            .with_scene(move || drilldown_scene(&id))
                            .with_parent_page(parent),
                    )
                })
                .unwrap(),
            ),
    )]);
    let router = TestRouter::start(app, "/main/drilldown/10");

    let view = router.view();
    assert!(view.contains_text("10 drilldown!"));
    assert!(!renders_key(&view, p1.key()));
    assert_eq!(router.breadcrumbs(), vec!["Drilldown 10", "Top level page"]);
}

/// Tenet: drilldown pages are memoized by the url they matched.
///
/// Two distinct ids plus one repeat build exactly two pages; the repeat is
/// served from the declaring tab's cache.
#[test]
fn tab_level_drilldowns_are_cached() {
    init_tracing();
    let t1 = SceneCanvasText::new("Tab 1");
    let generated = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&generated);
    let tab_object = Arc::clone(&t1);

    let app = SceneApp::new(vec![SceneAppPage::new(
        SceneAppPageState::new("Container page", "/test").with_tab(SceneAppPage::new(
            SceneAppPageState::new("Tab ", "/test/tab")
                .with_scene(move || wrap_in_scene(tab_object.clone()))
                .with_drilldown(
                    SceneAppDrilldownView::new("/test/tab/:id", move |m, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        let id = m.param("id").unwrap_or_default().to_string();
                        SceneAppPage::new(
                            SceneAppPageState::new("drilldown", &format!("/test/tab/{id}"))
                                .with_scene(move || drilldown_scene(&id)),
                        )
                    })
                    .unwrap(),
                ),
        )),
    )]);
    let router = TestRouter::start(app, "/test/tab");
    assert!(renders_key(&router.view(), t1.key()));

    let view = router.push("/test/tab/some-id");
    assert!(view.contains_text("some-id drilldown!"));
    assert!(!renders_key(&view, t1.key()));

    let view = router.push("/test/tab/some-other-id");
    assert!(view.contains_text("some-other-id drilldown!"));
    assert!(!view.contains_text("some-id drilldown!"));

    let view = router.push("/test/tab/some-id");
    assert!(view.contains_text("some-id drilldown!"));
    assert_eq!(generated.load(Ordering::SeqCst), 2);

    let view = router.push("/test/tab/drilldown-id/does-not-exist");
    assert!(view.find_by_test_id(FALLBACK_TEST_ID).is_some());
}

#[test]
fn fallback_uses_configured_title() {
    let app = SceneApp::with_config(
        vec![text_page("Test", "/test", "Page 1")],
        SceneAppConfig::new().with_fallback_title("Nothing here"),
    );
    let router = TestRouter::start(app, "/missing");

    let view = router.view();
    let fallback = view.find_by_test_id(FALLBACK_TEST_ID).unwrap();
    assert_eq!(fallback.text.as_deref(), Some("Nothing here"));
}

/// Tenet: the url query and the routed scene's variables stay in step.
///
/// Query values reach the variables on navigation, and later selections are
/// written back without dropping unrelated keys.
#[tokio::test]
async fn variables_follow_the_url_query() {
    init_tracing();
    let server = example_variable("server", &["A", "B"]);
    let variable = Arc::clone(&server);
    let app = SceneApp::with_config(
        vec![SceneAppPage::new(
            SceneAppPageState::new("Servers", "/servers").with_scene(move || {
                let text = SceneCanvasText::new("Server: $server");
                SceneFlexLayout::new(SceneFlexLayoutState {
                    children: vec![text],
                    slots: SceneSlots {
                        variables: Some(SceneVariableSet::new(vec![variable.clone()])),
                        ..SceneSlots::default()
                    },
                    ..SceneFlexLayoutState::default()
                })
            }),
        )],
        SceneAppConfig::new().with_url_sync(UrlSyncOptions::default().with_update_url_on_init(false)),
    );
    let router = TestRouter::start(app, "/servers?var-server=B&tab=2");

    router.view();
    let report = router.app.settle().await.unwrap();
    assert!(report.is_success());
    assert!(router.view().contains_text("Server: B"));

    server.change_value_to("A");
    let next = router.app.sync_url(&router.history).unwrap();
    assert_eq!(next.query.get("var-server"), Some(&UrlValue::Single("A".into())));
    assert_eq!(next.query.get("tab"), Some(&UrlValue::Single("2".into())));
    assert_eq!(router.history.len(), 1);
    assert!(router.view().contains_text("Server: A"));
}
