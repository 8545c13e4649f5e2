mod common;

use common::{Dom, FakeBackend, FakeNode};
use quell_engine::catalog::EDITOR_CANVAS_FRAME;
use quell_engine::config::QuellConfig;
use quell_engine::error::{AuthFailure, StabilizationError};
use quell_engine::orchestrator::{Identity, LogoutRoute, Orchestrator, PublishOutcome};
use quell_engine::target::{LogicalTarget, UiVariant};
use std::sync::Arc;

const ADMIN_URL: &str = "http://localhost:8082/wp-admin/";
const PARAGRAPH: &str = "[data-type=\"core/paragraph\"]";
const APPENDER: &str = ".block-editor-default-block-appender__content";
const CONFIRM: &str = ".editor-post-publish-panel__header-publish-button button";

fn identity() -> Identity {
    Identity::new("admin", "secret")
}

fn orchestrator(backend: &Arc<FakeBackend>, config: QuellConfig) -> Orchestrator {
    Orchestrator::new(backend.as_backend(), config)
}

fn login_form(dom: &mut Dom) {
    dom.insert(FakeNode::new(&["#user_login", "input[name=\"log\"]"]));
    dom.insert(FakeNode::new(&["#user_pass", "input[name=\"pwd\"]"]));
    dom.insert(FakeNode::new(&["#wp-submit"]));
}

fn admin_chrome(dom: &mut Dom) {
    dom.url = ADMIN_URL.to_string();
    dom.insert(FakeNode::new(&["#wpadminbar"]));
    dom.insert(FakeNode::new(&["#adminmenu"]));
}

fn block_editor(dom: &mut Dom) {
    dom.frame(EDITOR_CANVAS_FRAME, true);
    dom.insert(FakeNode::new(&[".block-editor", ".edit-post-layout"]));
    dom.insert(FakeNode::new(&[".editor-post-title__input"]));
    dom.insert(FakeNode::new(&[APPENDER]).in_frame(EDITOR_CANVAS_FRAME));
    dom.insert(FakeNode::new(&[".components-modal__screen-overlay"]).text("Welcome to the editor"));
    dom.on_click(APPENDER, |dom| {
        dom.insert(FakeNode::new(&[PARAGRAPH]).in_frame(EDITOR_CANVAS_FRAME));
    });
}

fn classic_editor(dom: &mut Dom) {
    dom.insert(FakeNode::new(&["#title"]));
    dom.insert(FakeNode::new(&["#content"]));
}

#[tokio::test(start_paused = true)]
async fn test_authenticate_reaches_admin() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin", login_form);
        dom.on_click("#wp-submit", admin_chrome);
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    let report = orchestrator.authenticate(&identity()).await.unwrap();

    assert_eq!(report.url, ADMIN_URL);
    assert!(!report.typed_fallback);
    assert_eq!(report.attempts, 1);
    backend.with_dom(|dom| {
        assert_eq!(dom.value_of_first("#user_login").as_deref(), Some("admin"));
        assert_eq!(dom.value_of_first("#user_pass").as_deref(), Some("secret"));
        assert_eq!(dom.events_with("click:"), vec!["click:#wp-submit".to_string()]);
    });
}

#[tokio::test(start_paused = true)]
async fn test_authenticate_types_when_value_does_not_stick() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin", |dom| {
            // Autofilled leftovers that a direct assignment cannot replace.
            dom.insert(FakeNode::new(&["#user_login"]).value("adm").rejects_set_value());
            dom.insert(FakeNode::new(&["#user_pass"]));
            dom.insert(FakeNode::new(&["#wp-submit"]));
        });
        dom.on_click("#wp-submit", admin_chrome);
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    let report = orchestrator.authenticate(&identity()).await.unwrap();

    assert!(report.typed_fallback);
    backend.with_dom(|dom| {
        assert_eq!(dom.value_of_first("#user_login").as_deref(), Some("admin"));
        assert_eq!(dom.events_with("clear:"), vec!["clear:#user_login".to_string()]);
        assert_eq!(dom.events_with("type:"), vec!["type:#user_login".to_string()]);
    });
}

#[tokio::test(start_paused = true)]
async fn test_authenticate_reports_rejection() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin", login_form);
        dom.on_click("#wp-submit", |dom| {
            dom.insert(
                FakeNode::new(&["#login_error"])
                    .text("Error: The password you entered for the username admin is incorrect."),
            );
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    let err = orchestrator.authenticate(&identity()).await.unwrap_err();

    assert!(err.is_fatal());
    match err {
        StabilizationError::AuthenticationFailed {
            reason: AuthFailure::Rejected { message },
        } => assert!(message.contains("incorrect")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_authenticate_without_login_form() {
    let backend = FakeBackend::new();
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    let err = orchestrator.authenticate(&identity()).await.unwrap_err();

    assert!(matches!(
        err,
        StabilizationError::AuthenticationFailed {
            reason: AuthFailure::LoginFormMissing
        }
    ));
    assert_eq!(err.reason(), "authentication_failed: login form missing");
}

#[tokio::test(start_paused = true)]
async fn test_authenticate_requires_admin_menu() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin", login_form);
        dom.on_click("#wp-submit", |dom| {
            dom.insert(FakeNode::new(&["#wpadminbar"]));
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    let err = orchestrator.authenticate(&identity()).await.unwrap_err();

    assert!(matches!(
        err,
        StabilizationError::AuthenticationFailed {
            reason: AuthFailure::NoAdminMarker
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_author_content_in_block_editor() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| dom.on_navigate("/wp-admin/post-new.php", block_editor));
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    let report = orchestrator
        .author_content("Hello", Some("First paragraph"))
        .await
        .unwrap();

    assert_eq!(report.variant, UiVariant::Block);
    assert!(report.title_entered);
    assert!(report.body_entered);
    assert!(orchestrator.page().watcher().is_running());
    backend.with_dom(|dom| {
        assert_eq!(
            dom.value_of_first(".editor-post-title__input").as_deref(),
            Some("Hello")
        );
        assert_eq!(dom.value_of_first(PARAGRAPH).as_deref(), Some("First paragraph"));
        assert_eq!(dom.attached(".components-modal__screen-overlay"), 0);
        assert_eq!(dom.events_with("click:"), vec![format!("click:{}", APPENDER)]);
    });
}

#[tokio::test(start_paused = true)]
async fn test_author_content_in_classic_editor() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| dom.on_navigate("/wp-admin/post-new.php", classic_editor));
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    let report = orchestrator
        .author_content("Classic title", Some("Classic body"))
        .await
        .unwrap();

    assert_eq!(report.variant, UiVariant::Classic);
    assert!(report.title_entered && report.body_entered);
    backend.with_dom(|dom| {
        assert_eq!(dom.value_of_first("#title").as_deref(), Some("Classic title"));
        assert_eq!(dom.value_of_first("#content").as_deref(), Some("Classic body"));
    });
}

#[tokio::test(start_paused = true)]
async fn test_missing_title_is_skipped_unless_strict() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin/post-new.php", |dom| {
            dom.insert(FakeNode::new(&["#content"]));
        });
    });

    let mut lenient = orchestrator(&backend, QuellConfig::default());
    let report = lenient.author_content("Title", None).await.unwrap();
    assert!(!report.title_entered);
    assert!(!report.body_entered);

    let mut config = QuellConfig::default();
    config.workflow.strict_detection = true;
    let mut strict = orchestrator(&backend, config);
    let err = strict.author_content("Title", None).await.unwrap_err();
    assert!(matches!(err, StabilizationError::ElementNotFound { target } if target == "title_field"));
}

#[tokio::test(start_paused = true)]
async fn test_editor_detection_exhaustion_is_configurable() {
    let backend = FakeBackend::new();

    let mut lenient = orchestrator(&backend, QuellConfig::default());
    lenient.page_mut().navigate("http://localhost:8082/blank").await.unwrap();
    assert_eq!(lenient.wait_for_editor().await.unwrap(), UiVariant::Classic);

    let mut config = QuellConfig::default();
    config.workflow.strict_detection = true;
    let mut strict = orchestrator(&backend, config);
    let err = strict.wait_for_editor().await.unwrap_err();
    assert!(matches!(
        err,
        StabilizationError::DetectionExhausted { attempts: 40, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_publish_block_post_through_panel() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin/post-new.php", |dom| {
            block_editor(dom);
            dom.insert(FakeNode::new(&[".editor-post-publish-button"]));
        });
        dom.on_click(".editor-post-publish-button", |dom| {
            dom.insert(FakeNode::new(&[CONFIRM]));
        });
        dom.on_click(CONFIRM, |dom| {
            dom.insert(FakeNode::new(&[".components-snackbar"]).text("Post published."));
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());
    orchestrator.author_content("Hello", None).await.unwrap();

    let report = orchestrator.publish().await.unwrap();

    assert_eq!(report.variant, UiVariant::Block);
    assert!(report.clicked);
    assert!(report.confirmed_panel);
    assert_eq!(report.outcome, PublishOutcome::Confirmed { attempts: 1 });
}

#[tokio::test(start_paused = true)]
async fn test_publish_skips_disabled_button() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin/post-new.php", |dom| {
            block_editor(dom);
            dom.insert(FakeNode::new(&[".editor-post-publish-button"]).disabled());
            dom.insert(FakeNode::new(&[".editor-header__settings > button"]));
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());
    orchestrator.author_content("Hello", None).await.unwrap();

    let report = orchestrator.publish().await.unwrap();

    assert!(report.clicked);
    assert!(!report.confirmed_panel);
    assert_eq!(report.outcome, PublishOutcome::Unconfirmed);
    backend.with_dom(|dom| {
        assert!(
            dom.events
                .contains(&"click:.editor-header__settings > button".to_string())
        );
        assert!(!dom.events.contains(&"click:.editor-post-publish-button".to_string()));
    });
}

#[tokio::test(start_paused = true)]
async fn test_publish_classic_post() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin/post-new.php", |dom| {
            classic_editor(dom);
            dom.insert(FakeNode::new(&["#publish"]));
        });
        dom.on_click("#publish", |dom| {
            dom.insert(FakeNode::new(&["#message"]).text("Post published. View post"));
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());
    orchestrator.author_content("Classic", Some("Body")).await.unwrap();

    let report = orchestrator.publish().await.unwrap();

    assert_eq!(report.variant, UiVariant::Classic);
    assert!(matches!(report.outcome, PublishOutcome::Confirmed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_publish_fails_in_strict_mode() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin/post-new.php", |dom| {
            classic_editor(dom);
            dom.insert(FakeNode::new(&["#publish"]));
        });
    });
    let mut config = QuellConfig::default();
    config.workflow.strict_detection = true;
    let mut orchestrator = orchestrator(&backend, config);
    orchestrator.author_content("Classic", None).await.unwrap();

    let err = orchestrator.publish().await.unwrap_err();

    assert!(matches!(err, StabilizationError::DetectionExhausted { .. }));
    assert!(!err.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_stops_the_watcher() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| dom.on_navigate("/wp-admin/post-new.php", block_editor));
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());
    orchestrator.author_content("Hello", None).await.unwrap();
    let subscription = orchestrator
        .page()
        .watcher()
        .subscription_id()
        .unwrap()
        .to_string();

    orchestrator
        .page_mut()
        .navigate("http://localhost:8082/wp-admin/edit.php")
        .await
        .unwrap();

    assert!(!orchestrator.page().watcher().is_running());
    assert_eq!(orchestrator.page().variant(), UiVariant::Unknown);
    backend.with_dom(|dom| {
        assert!(dom.events.contains(&format!("disconnect:{}", subscription)));
    });
}

#[tokio::test(start_paused = true)]
async fn test_logout_through_admin_bar() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin", |dom| {
            admin_chrome(dom);
            dom.insert(FakeNode::new(&["#wp-admin-bar-logout a"]));
        });
        dom.on_click("#wp-admin-bar-logout a", |dom| {
            dom.url = "http://localhost:8082/wp-login.php?loggedout=true".to_string();
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    assert_eq!(orchestrator.logout().await.unwrap(), LogoutRoute::AdminBar);
}

#[tokio::test(start_paused = true)]
async fn test_logout_falls_back_to_logout_page() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin", admin_chrome);
        dom.on_navigate("/wp-login.php?action=logout", |dom| {
            dom.insert(FakeNode::new(&["a"]).text("log out"));
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    assert_eq!(orchestrator.logout().await.unwrap(), LogoutRoute::LogoutPage);
    backend.with_dom(|dom| {
        assert_eq!(dom.events_with("click:"), vec!["click:a".to_string()]);
    });
}

#[tokio::test(start_paused = true)]
async fn test_logout_unconfirmed_by_url_uses_logout_page() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin", |dom| {
            admin_chrome(dom);
            dom.insert(FakeNode::new(&["#wp-admin-bar-logout a"]));
        });
        dom.on_click("#wp-admin-bar-logout a", |dom| dom.url_unreadable = true);
        dom.on_navigate("/wp-login.php?action=logout", |dom| {
            dom.url_unreadable = false;
            dom.insert(FakeNode::new(&["a"]).text("Log out"));
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    assert_eq!(orchestrator.logout().await.unwrap(), LogoutRoute::LogoutPage);
    backend.with_dom(|dom| {
        assert_eq!(
            dom.events_with("click:"),
            vec!["click:#wp-admin-bar-logout a".to_string(), "click:a".to_string()]
        );
    });
}

#[tokio::test(start_paused = true)]
async fn test_open_admin_menu_by_text() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/wp-admin", |dom| {
            admin_chrome(dom);
            dom.insert(FakeNode::new(&["#adminmenu a"]).text("Posts"));
            dom.insert(FakeNode::new(&["#adminmenu a"]).text("Add New Post"));
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());
    orchestrator
        .page_mut()
        .navigate("http://localhost:8082/wp-admin")
        .await
        .unwrap();

    assert!(orchestrator.open_admin_menu("Posts", Some("Add New")).await.unwrap());
    assert!(!orchestrator.open_admin_menu("Plugins", None).await.unwrap());
    backend.with_dom(|dom| assert_eq!(dom.events_with("click:").len(), 2));
}

#[tokio::test(start_paused = true)]
async fn test_search_through_admin_bar() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.on_navigate("/", |dom| {
            dom.insert(FakeNode::new(&["#wp-admin-bar-search a"]));
            dom.insert(FakeNode::new(&["#adminbar-search-input"]));
        });
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());
    orchestrator
        .page_mut()
        .navigate("http://localhost:8082/")
        .await
        .unwrap();

    assert!(orchestrator.search("hello").await.unwrap());
    backend.with_dom(|dom| {
        assert_eq!(
            dom.value_of_first("#adminbar-search-input").as_deref(),
            Some("hello")
        );
        assert!(dom.events.contains(&"key:Enter:focused".to_string()));
    });
}

#[tokio::test(start_paused = true)]
async fn test_safe_type_falls_back_to_writing_surface() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.insert(FakeNode::new(&[".block-editor-writing-flow"]));
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    assert!(orchestrator.safe_type(LogicalTarget::TitleField, "typed").await.unwrap());
    backend.with_dom(|dom| {
        assert_eq!(
            dom.value_of_first(".block-editor-writing-flow").as_deref(),
            Some("typed")
        );
    });
}

#[tokio::test(start_paused = true)]
async fn test_clear_environment_sweeps_document_and_frame() {
    let backend = FakeBackend::new();
    backend.with_dom(|dom| {
        dom.frame(EDITOR_CANVAS_FRAME, true);
        dom.insert(FakeNode::new(&["button[aria-label*=\"Close\"]"]).in_frame(EDITOR_CANVAS_FRAME));
        dom.insert(FakeNode::new(&[".components-modal__frame"]).in_frame(EDITOR_CANVAS_FRAME));
        dom.insert(FakeNode::new(&[".edit-site-template-card"]));
    });
    let mut orchestrator = orchestrator(&backend, QuellConfig::default());

    assert_eq!(orchestrator.clear_environment().await, 2);
    backend.with_dom(|dom| {
        assert!(dom.events.contains(&"key:Escape:frame".to_string()));
        assert!(dom.events.contains(&"key:Escape:body".to_string()));
    });
}
