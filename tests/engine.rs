//! Engine tests against the in-memory shop
//!
//! Run with: cargo test --test engine

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scenario::context::ContextStore;
use scenario::ordering::{Direction, OrderKey};
use scenario::report::{FailureKind, Phase, Reporter, RunStatus, StepStatus, StepTag, TraceEvent};
use scenario::scenario::{
    Action, ActionStep, BuildOptions, Engine, Scenario, ScenarioDoc, SortCase, SortCheckStep, Step,
};
use scenario::session::{MockEffect, MockPage, MockSessionFactory, MockShop, SessionManager};
use scenario::{Error, Result, RunReport};

const LIST: &str = "http://shop/2-home";
const NAMES: &str = ".product-miniature .name";
const SORT_TRIGGER: &str = "- action: click\n  selector: \"a[data-sort='${sort_by}']\"\n";

fn actions(yaml: &str) -> Vec<Action> {
    serde_yaml::from_str(yaml).unwrap()
}

fn step(id: &str, yaml: &str) -> ActionStep {
    ActionStep::new(id, None, actions(yaml))
}

fn open_list() -> ActionStep {
    step("goToAllProducts", &format!("- action: navigate\n  url: {}\n", LIST))
}

fn sorted_effect(sort_by: &str, texts: &[&str]) -> (String, Vec<MockEffect>) {
    (
        format!("a[data-sort='{}']", sort_by),
        vec![MockEffect::SetTexts {
            selector: NAMES.to_string(),
            texts: texts.iter().map(|t| t.to_string()).collect(),
        }],
    )
}

/// A product list showing Banana, Apple, Cherry whose sort links produce `asc`/`desc`
fn shop_with_sort(asc: &[&str], desc: &[&str]) -> MockShop {
    let (asc_sel, asc_fx) = sorted_effect("product.name.asc", asc);
    let (desc_sel, desc_fx) = sorted_effect("product.name.desc", desc);
    MockShop::new().with_page(
        LIST,
        MockPage::new("Home")
            .element(NAMES, ["Banana", "Apple", "Cherry"])
            .element(".sort-by", ["Sort by: Relevance"])
            .on_click(&asc_sel, asc_fx)
            .on_click(&desc_sel, desc_fx),
    )
}

fn sort_case(id: &str, sort_by: &str, direction: Direction) -> SortCase {
    SortCase {
        id: id.to_string(),
        label: id.to_string(),
        attribute: NAMES.to_string(),
        sort_by: sort_by.to_string(),
        direction,
        order: OrderKey::Text,
        skip: None,
    }
}

fn sort_step(id: &str, sort_by: &str, direction: Direction) -> SortCheckStep {
    SortCheckStep::new(sort_case(id, sort_by, direction), actions(SORT_TRIGGER))
}

fn count_started(report: &RunReport, id: &str) -> usize {
    report
        .trace
        .iter()
        .filter(|e| matches!(e, TraceEvent::StepStarted { step } if step == id))
        .count()
}

fn position(report: &RunReport, event: &TraceEvent) -> usize {
    report
        .trace
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("{event:?} not in trace {:?}", report.trace))
}

/// Step failing with an action error
struct Broken(&'static str);

#[async_trait]
impl Step for Broken {
    fn id(&self) -> &str {
        self.0
    }

    async fn execute(&self, _ctx: &mut ContextStore, _sessions: &mut SessionManager) -> Result<()> {
        Err(Error::ElementNotFound("#broken".to_string()))
    }
}

/// Reporter collecting every step tag it is handed
#[derive(Clone, Default)]
struct Tags(Arc<Mutex<Vec<StepTag>>>);

impl Reporter for Tags {
    fn step_started(&mut self, tag: &StepTag) {
        self.0.lock().unwrap().push(tag.clone());
    }
}

#[tokio::test]
async fn test_sort_ascending_and_descending_match_oracle() {
    let shop = shop_with_sort(&["Apple", "Banana", "Cherry"], &["Cherry", "Banana", "Apple"]);
    let scenario = Scenario::new("Sort products list")
        .step(open_list())
        .step(sort_step("sortByNameAsc", "product.name.asc", Direction::Asc))
        .step(sort_step("sortByNameDesc", "product.name.desc", Direction::Desc));

    let report = Engine::new(MockSessionFactory::new(shop.clone()))
        .run(&scenario)
        .await
        .unwrap();

    assert!(report.passed(), "report: {report:?}");
    assert_eq!(report.counts(), (3, 0, 0));
    assert_eq!(
        shop.texts_at(LIST, NAMES).unwrap(),
        vec!["Cherry", "Banana", "Apple"]
    );
}

#[tokio::test]
async fn test_wrong_ui_order_fails_and_unwinds_teardown_once() {
    let shop = shop_with_sort(&["Apple", "Cherry", "Banana"], &["Cherry", "Banana", "Apple"]);
    let scenario = Scenario::new("Sort products list")
        .step(open_list())
        .step(sort_step("sortByNameAsc", "product.name.asc", Direction::Asc))
        .step(sort_step("sortByNameDesc", "product.name.desc", Direction::Desc))
        .teardown(step("closeFo", "- action: wait\n  ms: 0\n"));

    let report = Engine::new(MockSessionFactory::new(shop))
        .run(&scenario)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    match &report.step("sortByNameAsc").unwrap().status {
        StepStatus::Failed {
            kind,
            expected,
            actual,
            ..
        } => {
            assert_eq!(*kind, FailureKind::Assertion);
            assert_eq!(expected.as_deref(), Some(r#"["Apple", "Banana", "Cherry"]"#));
            assert_eq!(actual.as_deref(), Some(r#"["Apple", "Cherry", "Banana"]"#));
        }
        other => panic!("Expected failure, got {other:?}"),
    }

    assert!(report.step("sortByNameDesc").unwrap().skipped());
    assert_eq!(count_started(&report, "sortByNameDesc"), 0);
    assert_eq!(count_started(&report, "closeFo"), 1);
    assert!(report.step("closeFo").unwrap().passed());
}

#[tokio::test]
async fn test_precondition_failure_skips_own_teardown_only() {
    let shop = MockShop::new();
    let scenario = Scenario::new("root")
        .setup(step("installTheme", "- action: store\n  key: theme\n  value: hummingbird\n"))
        .scenario(
            Scenario::new("Sort products list")
                .setup(Broken("changeProductPerPage"))
                .step(step("goToShopFO", "- action: wait\n  ms: 0\n"))
                .teardown(step("ResetProductPerPage", "- action: wait\n  ms: 0\n")),
        )
        .step(step("afterInner", "- action: wait\n  ms: 0\n"))
        .teardown(step("uninstallTheme", "- action: wait\n  ms: 0\n"));

    let report = Engine::new(MockSessionFactory::new(shop))
        .run(&scenario)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    let failed = report.step("changeProductPerPage").unwrap();
    assert_eq!(failed.phase, Phase::Setup);
    assert!(matches!(
        failed.status,
        StepStatus::Failed {
            kind: FailureKind::Precondition,
            ..
        }
    ));
    assert_eq!(failed.scenario, vec!["root", "Sort products list"]);

    assert!(report.step("goToShopFO").unwrap().skipped());
    assert!(report.step("ResetProductPerPage").unwrap().skipped());
    assert_eq!(count_started(&report, "ResetProductPerPage"), 0);
    assert!(report.step("afterInner").unwrap().skipped());

    assert_eq!(count_started(&report, "uninstallTheme"), 1);
    assert!(report.step("uninstallTheme").unwrap().passed());

    let inner_done = position(
        &report,
        &TraceEvent::ScenarioFinished {
            scenario: "Sort products list".into(),
            passed: false,
        },
    );
    let root_teardown = position(
        &report,
        &TraceEvent::TeardownStarted {
            scenario: "root".into(),
        },
    );
    assert!(inner_done < root_teardown);
}

#[tokio::test]
async fn test_context_round_trip_between_steps() {
    let shop = MockShop::new().with_page(
        "http://shop/admin",
        MockPage::new("Products").element(".row.active", ["a", "b", "c"]),
    );
    let scenario = Scenario::new("carry")
        .step(step(
            "getNumberOfActiveProducts",
            "- action: navigate\n  url: \"${base_url}/admin\"\n- action: count\n  selector: .row.active\n  store: active\n",
        ))
        .step(step(
            "useIt",
            "- action: expect_equal\n  actual: \"${active}\"\n  expected: \"3\"\n",
        ));

    let report = Engine::new(MockSessionFactory::new(shop))
        .with_var("base_url", "http://shop")
        .run(&scenario)
        .await
        .unwrap();

    assert!(report.passed(), "report: {report:?}");
}

#[tokio::test]
async fn test_default_sort_check_is_idempotent() {
    let shop = shop_with_sort(&["Apple", "Banana", "Cherry"], &["Cherry", "Banana", "Apple"]);
    let scenario = Scenario::new("default sort")
        .step(open_list())
        .step(step(
            "checkDefaultSort",
            "- action: expect_text\n  selector: .sort-by\n  contains: Relevance\n",
        ));

    for _ in 0..2 {
        let report = Engine::new(MockSessionFactory::new(shop.clone()))
            .run(&scenario)
            .await
            .unwrap();
        assert!(report.passed(), "report: {report:?}");
    }
    assert_eq!(shop.texts_at(LIST, NAMES).unwrap(), vec!["Banana", "Apple", "Cherry"]);
    assert_eq!(shop.sessions_opened(), 2);
    assert_eq!(shop.sessions_closed(), 2);
}

#[tokio::test]
async fn test_session_closed_exactly_once_on_failure() {
    let shop = shop_with_sort(&["Apple", "Banana", "Cherry"], &["Cherry", "Banana", "Apple"]);
    let scenario = Scenario::new("fails")
        .step(open_list())
        .step(Broken("boom"))
        .teardown(step("closeFo", "- action: expect_title\n  equals: Home\n"));

    let report = Engine::new(MockSessionFactory::new(shop.clone()))
        .run(&scenario)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(matches!(
        report.step("boom").unwrap().status,
        StepStatus::Failed {
            kind: FailureKind::Action,
            ..
        }
    ));
    assert_eq!(shop.sessions_opened(), 1);
    assert_eq!(shop.sessions_closed(), 1);
    assert_eq!(report.trace.last(), Some(&TraceEvent::SessionClosed));
    assert_eq!(shop.actions().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_no_session_opened_when_unused() {
    let shop = MockShop::new();
    let scenario = Scenario::new("offline").step(step(
        "store",
        "- action: store\n  key: per_page\n  value: \"12\"\n",
    ));

    let report = Engine::new(MockSessionFactory::new(shop.clone()))
        .run(&scenario)
        .await
        .unwrap();

    assert!(report.passed());
    assert_eq!(shop.sessions_opened(), 0);
    assert!(!report.trace.contains(&TraceEvent::SessionClosed));
}

#[tokio::test]
async fn test_session_open_failure_errors_the_run() {
    let shop = MockShop::new();
    let scenario = Scenario::new("no browser")
        .step(open_list())
        .step(step("next", "- action: wait\n  ms: 0\n"))
        .teardown(step("cleanup", "- action: navigate\n  url: http://shop/\n"));

    let report = Engine::new(MockSessionFactory::refusing(shop))
        .run(&scenario)
        .await
        .unwrap();

    assert!(matches!(report.status, RunStatus::Errored { ref message } if message.contains("connection refused")));
    assert!(matches!(
        report.step("goToAllProducts").unwrap().status,
        StepStatus::Failed {
            kind: FailureKind::Resource,
            ..
        }
    ));
    assert!(report.step("next").unwrap().skipped());
    assert_eq!(count_started(&report, "cleanup"), 1);
}

#[tokio::test]
async fn test_session_close_failure_errors_the_run() {
    let shop = shop_with_sort(&["Apple", "Banana", "Cherry"], &[]).failing_close();
    let scenario = Scenario::new("close fails").step(open_list());

    let report = Engine::new(MockSessionFactory::new(shop))
        .run(&scenario)
        .await
        .unwrap();

    assert!(matches!(report.status, RunStatus::Errored { .. }));
    assert!(report.step("goToAllProducts").unwrap().passed());
}

#[tokio::test]
async fn test_failing_teardown_step_stops_remaining_teardown() {
    let shop = MockShop::new();
    let scenario = Scenario::new("teardown")
        .step(step("body", "- action: wait\n  ms: 0\n"))
        .teardown(Broken("closeFo"))
        .teardown(step("ResetProductPerPage", "- action: wait\n  ms: 0\n"));

    let report = Engine::new(MockSessionFactory::new(shop))
        .run(&scenario)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.step("body").unwrap().passed());
    assert!(report.step("closeFo").unwrap().failed());
    assert!(report.step("ResetProductPerPage").unwrap().skipped());
}

#[tokio::test]
async fn test_duplicate_step_ids_are_rejected_before_running() {
    let shop = MockShop::new();
    let scenario = Scenario::new("dup")
        .step(open_list())
        .scenario(Scenario::new("inner").step(open_list()));

    let err = Engine::new(MockSessionFactory::new(shop.clone()))
        .run(&scenario)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(msg) if msg.contains("goToAllProducts")));
    assert_eq!(shop.sessions_opened(), 0);
}

#[tokio::test]
async fn test_skipped_fixture_is_reported_not_run() {
    let shop = shop_with_sort(&["Apple", "Banana", "Cherry"], &["Apple", "Banana", "Cherry"]);
    let mut known_gap = sort_case("sortByNameDesc", "product.name.desc", Direction::Desc);
    known_gap.skip = Some("https://github.com/PrestaShop/PrestaShop/issues/19810".to_string());

    let cases = vec![
        sort_case("sortByNameAsc", "product.name.asc", Direction::Asc),
        known_gap,
    ];
    let mut scenario = Scenario::new("fixtures").step(open_list());
    for check in SortCheckStep::expand(&cases, &actions(SORT_TRIGGER), 0) {
        scenario = scenario.step(check);
    }

    let report = Engine::new(MockSessionFactory::new(shop.clone()))
        .run(&scenario)
        .await
        .unwrap();

    assert!(report.passed(), "report: {report:?}");
    assert_eq!(report.counts(), (2, 0, 1));
    assert!(matches!(
        &report.step("sortByNameDesc").unwrap().status,
        StepStatus::Skipped { reason } if reason.contains("19810")
    ));
    assert!(!shop
        .actions()
        .contains(&"click a[data-sort='product.name.desc']".to_string()));
}

#[tokio::test]
async fn test_reporter_receives_tagged_steps() {
    let tags = Tags::default();
    let scenario = Scenario::new("tags")
        .step(step("first", "- action: wait\n  ms: 0\n"))
        .step(step("second", "- action: wait\n  ms: 0\n"));

    let report = Engine::new(MockSessionFactory::new(MockShop::new()))
        .with_reporter(tags.clone())
        .with_run_id("run-42")
        .with_base_context("functional_FO_sortProducts")
        .run(&scenario)
        .await
        .unwrap();

    assert_eq!(report.run_id, "run-42");
    let tags = tags.0.lock().unwrap();
    let ids: Vec<_> = tags.iter().map(|t| t.step_id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second"]);
    assert!(tags
        .iter()
        .all(|t| t.run_id == "run-42" && t.base_context == "functional_FO_sortProducts"));
}

const ADMIN: &str = "http://shop/admin-dev/index.php";
const THEMES: &str = "http://shop/admin-dev/index.php?controller=AdminThemes";
const PRODUCTS: &str = "http://shop/admin-dev/index.php/sell/catalog/products";
const SETTINGS: &str = "http://shop/admin-dev/index.php?controller=AdminPPreferences";
const PER_PAGE: &str = "#form_pagination_products_per_page";
const TITLES: &str = ".product-miniature .miniature__infos__top";
const PRICES: &str = ".product-miniature .miniature__price";

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn set(selector: &str, items: &[&str]) -> Vec<MockEffect> {
    vec![MockEffect::SetTexts {
        selector: selector.to_string(),
        texts: texts(items),
    }]
}

fn sort_link(sort_by: &str) -> String {
    format!(".products-sort-order a[href*='order={}']", sort_by)
}

/// The storefront and back office touched by the bundled scenario
///
/// With `opens_tab` unset, "view my shop" opens nothing.
fn prestashop(opens_tab: bool) -> MockShop {
    let view_shop = if opens_tab {
        vec![MockEffect::OpenTab("http://shop/".into())]
    } else {
        Vec::new()
    };
    let success = |msg: &str| set(".alert-success", &[msg]);

    MockShop::new()
        .with_page(
            ADMIN,
            MockPage::new("PrestaShop › Login")
                .element("#email", [""])
                .element("#passwd", [""])
                .on_click(
                    "#submit_login",
                    vec![MockEffect::Navigate("http://shop/admin-dev/dashboard".into())],
                ),
        )
        .with_page(
            "http://shop/admin-dev/dashboard",
            MockPage::new("Dashboard • PrestaShop"),
        )
        .with_page(
            THEMES,
            MockPage::new("Theme & Logo • PrestaShop")
                .element(".alert-success", Vec::<String>::new())
                .on_click(
                    "[data-theme-name='hummingbird'] .js-theme-use",
                    success("Theme enabled successfully"),
                )
                .on_click(
                    "[data-theme-name='classic'] .js-theme-use",
                    success("Theme enabled successfully"),
                ),
        )
        .with_page(
            PRODUCTS,
            MockPage::new("Products • PrestaShop")
                .element("#product_grid_table tbody tr", ["1", "2", "3", "4", "5"])
                .on_click("#product_active option[value=\"1\"]", Vec::new())
                .on_click(
                    "#product_grid_table .grid-search-button",
                    set("#product_grid_table tbody tr", &["1", "2", "4"]),
                ),
        )
        .with_page(
            SETTINGS,
            MockPage::new("Product Settings • PrestaShop")
                .element(PER_PAGE, ["12"])
                .element(".alert-success", Vec::<String>::new())
                .on_click("#form-pagination-save-button", success("Update successful"))
                .on_click("#header_shopname", view_shop),
        )
        .with_page(
            "http://shop/",
            MockPage::new("My Store")
                .element("#index", [""])
                .on_click("#language-selector a[data-iso-code='en']", Vec::new())
                .on_click(
                    "#content a.all-product-link",
                    vec![MockEffect::Navigate(LIST.into())],
                ),
        )
        .with_page(
            LIST,
            MockPage::new("Home")
                .element("#category", [""])
                .element(".products-sort-order .dropdown-toggle", ["Relevance"])
                .element(TITLES, ["Mountain fox notebook", "brown bear cushion", "Hummingbird mug"])
                .element(PRICES, ["€12.90", "€18.90", "€11.90"])
                .on_click(
                    &sort_link("product.name.asc"),
                    set(TITLES, &["brown bear cushion", "Hummingbird mug", "Mountain fox notebook"]),
                )
                .on_click(
                    &sort_link("product.name.desc"),
                    set(TITLES, &["Mountain fox notebook", "Hummingbird mug", "brown bear cushion"]),
                )
                .on_click(
                    &sort_link("product.price.asc"),
                    set(PRICES, &["€11.90", "€12.90", "€18.90"]),
                ),
        )
}

#[tokio::test]
async fn test_bundled_scenario_runs_against_mock_shop() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/sort_products.yaml");
    let doc = ScenarioDoc::load(&path).unwrap();
    let scenario = doc.build(&BuildOptions { tab_timeout_ms: 500 }).unwrap();
    let shop = prestashop(true);

    let mut engine = Engine::new(MockSessionFactory::new(shop.clone()))
        .with_base_context(doc.base_context())
        .with_var("base_url", "http://shop");
    for (key, value) in &doc.vars {
        engine = engine.with_var(key.clone(), value.clone());
    }
    let report = engine.run(&scenario).await.unwrap();

    assert!(report.passed(), "report: {report:#?}");
    assert_eq!(
        report.base_context,
        "functional_FO_hummingbird_menuAndNavigation_sortAndFilter_sortProducts"
    );
    assert_eq!(report.counts(), (15, 0, 1));
    assert!(report.step("sortByPriceDesc").unwrap().skipped());

    // Products per page was raised to the active count, then restored
    let actions = shop.actions();
    assert!(actions.contains(&format!("fill {}=3", PER_PAGE)));
    assert_eq!(shop.texts_at(SETTINGS, PER_PAGE).unwrap(), vec!["12"]);
    assert_eq!(shop.sessions_closed(), 1);
}

#[tokio::test]
async fn test_bundled_scenario_restores_per_page_without_storefront_tab() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/sort_products.yaml");
    let doc = ScenarioDoc::load(&path).unwrap();
    let scenario = doc.build(&BuildOptions { tab_timeout_ms: 200 }).unwrap();
    let shop = prestashop(false);

    let mut engine =
        Engine::new(MockSessionFactory::new(shop.clone())).with_var("base_url", "http://shop");
    for (key, value) in &doc.vars {
        engine = engine.with_var(key.clone(), value.clone());
    }
    let report = engine.run(&scenario).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(matches!(
        &report.step("goToShopFO").unwrap().status,
        StepStatus::Failed {
            kind: FailureKind::Precondition,
            message,
            ..
        } if message.contains("timed out")
    ));
    assert!(report.step("sortByNameAsc").unwrap().skipped());
    assert!(report.step("closeFo").unwrap().skipped());
    assert!(report.step("ResetProductPerPage").unwrap().passed());
    assert!(report.step("uninstallHummingbird").unwrap().passed());

    assert_eq!(count_started(&report, "closeFo"), 0);
    let actions = shop.actions();
    assert!(actions.contains(&format!("fill {}=3", PER_PAGE)));
    assert!(!actions.contains(&"close_tab".to_string()));
    assert_eq!(shop.texts_at(SETTINGS, PER_PAGE).unwrap(), vec!["12"]);
    assert_eq!(shop.sessions_closed(), 1);
}

#[test]
fn test_bundled_scenario_step_order() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/sort_products.yaml");
    let scenario = ScenarioDoc::load(&path)
        .unwrap()
        .build(&BuildOptions::default())
        .unwrap();

    assert_eq!(
        scenario.step_ids(),
        vec![
            "loginBO",
            "installHummingbird",
            "goToProductsPage",
            "getNumberOfActiveProducts",
            "goToProductSettingsPage",
            "changeProductPerPage",
            "goToShopFO",
            "goToAllProducts",
            "checkDefaultSort",
            "sortByNameAsc",
            "sortByNameDesc",
            "sortByPriceAsc",
            "sortByPriceDesc",
            "closeFo",
            "ResetProductPerPage",
            "uninstallHummingbird",
        ]
    );
}
