//! Gateway tests against an in-memory backend that counts its calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};

use habgate::backend::ResourceBackend;
use habgate::config::GatewayConfig;
use habgate::error::{AppError, AppResult};
use habgate::gateway::{AuthorizationGateway, Decision, Guarded, Payload};
use habgate::identity::{ForwardedHeaders, Identity, RequestContext};
use habgate::model::{BackendReply, CardEntry, ItemNode, ItemQuery, ResourceKind};

#[derive(Default)]
struct MemoryBackend {
    listings: HashMap<ResourceKind, Value>,
    details: HashMap<String, Value>,
    listing_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl ResourceBackend for MemoryBackend {
    fn list_resources<'a>(&'a self, kind: ResourceKind, _query: &'a str, _headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<Value>> {
        async move {
            self.listing_calls.fetch_add(1, Ordering::SeqCst);
            self.listings.get(&kind).cloned().ok_or_else(|| AppError::backend(Some(503), "no listing"))
        }
        .boxed()
    }

    fn get_resource<'a>(&'a self, _kind: ResourceKind, id: &'a str, _query: &'a str, _headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<Value>> {
        async move {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            self.details.get(id).cloned().ok_or_else(|| AppError::backend(Some(404), format!("{} not found", id)))
        }
        .boxed()
    }

    fn get_item_state<'a>(&'a self, _item: &'a str, _headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<BackendReply<String>>> {
        async { Ok(BackendReply { status: 200, body: "21.5".to_string() }) }.boxed()
    }

    fn get_item_semantic<'a>(&'a self, item: &'a str, class: &'a str, _headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<BackendReply<Value>>> {
        async move { Ok(BackendReply { status: 200, body: json!({"name": item, "class": class}) }) }.boxed()
    }

    fn send_command<'a>(&'a self, _item: &'a str, _command: String, _headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<u16>> {
        async { Ok(202) }.boxed()
    }

    fn send_event_items<'a>(&'a self, _id: &'a str, _items: Vec<String>, _headers: &'a ForwardedHeaders) -> BoxFuture<'a, AppResult<u16>> {
        async { Ok(200) }.boxed()
    }
}

fn backend() -> MemoryBackend {
    let mut b = MemoryBackend::default();
    b.listings.insert(
        ResourceKind::Item,
        json!([
            {"name": "gHouse", "tags": ["acl:family"], "members": [
                {"name": "Lamp", "tags": ["acl:family"]},
                {"name": "Safe", "tags": ["acl:parents"]}
            ]},
            {"name": "Lamp", "tags": ["acl:family"]},
            {"name": "Safe", "tags": ["acl:parents"]},
            {"name": "Temp", "tags": ["acl:everyone"]}
        ]),
    );
    b.listings.insert(ResourceKind::Page, json!([{"uid": "home"}, {"uid": "vault", "tags": ["acl:parents"]}]));
    b.details.insert(
        "family_org_main".into(),
        json!({"name": "family_org_main", "homepage": {"widgets": [
            {"type": "Custom", "item": "legacy-ref"},
            {"type": "Switch", "item": {"name": "Lamp"}},
            {"type": "Switch", "item": {"name": "Safe"}}
        ]}}),
    );
    b.details.insert("gHouse".into(), json!({"name": "gHouse", "members": [{"name": "Lamp"}, {"name": "Safe"}]}));
    b
}

fn gateway_with(config: GatewayConfig) -> (AuthorizationGateway, Arc<MemoryBackend>) {
    let b = Arc::new(backend());
    (AuthorizationGateway::new(Arc::new(config), b.clone()), b)
}

fn ctx(user: &str, orgs: &[&str]) -> RequestContext {
    RequestContext { identity: Identity::new(user, orgs.iter().copied()).unwrap(), forwarded: ForwardedHeaders::default() }
}

#[tokio::test]
async fn authorize_follows_tags_and_admin_bypass() {
    let (gw, b) = gateway_with(GatewayConfig::default());
    assert_eq!(gw.authorize(&ctx("kid", &["family"]), ResourceKind::Item, "Lamp").await, Decision::Allow);
    assert_eq!(gw.authorize(&ctx("kid", &["family"]), ResourceKind::Item, "Safe").await, Decision::Deny);
    assert_eq!(gw.authorize(&ctx("mum", &["admin"]), ResourceKind::Item, "Safe").await, Decision::Allow);
    assert_eq!(gw.authorize_admin(&ctx("kid", &["family"]).identity), Decision::Deny);
    assert_eq!(Decision::Deny.http_status(), 403);
    assert_eq!(b.listing_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn filter_collection_resolves_allow_set_once() {
    let (gw, _) = gateway_with(GatewayConfig::default());
    let c = ctx("kid", &["family"]);
    let items: Vec<ItemNode> = serde_json::from_value(backend().listings[&ResourceKind::Item].clone()).unwrap();
    let before = gw.evaluator().pools().stats(ResourceKind::Item).allow_sets;
    let out = gw.filter_collection(&c, &Payload::Items(items.clone())).await.unwrap();
    let after = gw.evaluator().pools().stats(ResourceKind::Item).allow_sets;
    assert_eq!((after.hits + after.misses) - (before.hits + before.misses), 1);
    match out {
        Payload::Items(filtered) => {
            let names: Vec<&str> = filtered.iter().map(|i| i.name()).collect();
            assert_eq!(names, vec!["gHouse", "Lamp", "Temp"]);
        }
        other => panic!("payload kind changed: {:?}", other),
    }
    // Input untouched.
    assert_eq!(items.len(), 4);
}

#[tokio::test]
async fn item_detail_is_guarded_then_member_filtered() {
    let (gw, b) = gateway_with(GatewayConfig::default());
    let q = ItemQuery::default();
    assert_eq!(gw.item(&ctx("guest", &[]), "gHouse", &q).await.unwrap(), Guarded::Denied);
    assert_eq!(b.detail_calls.load(Ordering::SeqCst), 0);
    match gw.item(&ctx("kid", &["family"]), "gHouse", &q).await.unwrap() {
        Guarded::Allowed(v) => assert_eq!(v["members"], json!([{"name": "Lamp"}])),
        Guarded::Denied => panic!("family member denied"),
    }
    let err = gw.item(&ctx("root", &["admin"]), "Nope", &q).await.unwrap_err();
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn passthrough_operations_are_guarded() {
    let (gw, _) = gateway_with(GatewayConfig::default());
    let kid = ctx("kid", &["family"]);
    assert_eq!(gw.item_state(&kid, "Safe").await.unwrap(), Guarded::Denied);
    assert_eq!(gw.item_state(&kid, "Temp").await.unwrap(), Guarded::Allowed(BackendReply { status: 200, body: "21.5".to_string() }));
    match gw.item_semantic(&kid, "Lamp", "Location").await.unwrap() {
        Guarded::Allowed(reply) => assert_eq!(reply.body["class"], "Location"),
        Guarded::Denied => panic!("denied"),
    }
    assert_eq!(gw.send_command(&kid, "Lamp", "ON".into()).await.unwrap(), Guarded::Allowed(202));
    assert_eq!(gw.send_command(&kid, "Safe", "OPEN".into()).await.unwrap(), Guarded::Denied);
}

#[tokio::test]
async fn event_items_payload_is_filtered_by_item_allow_set() {
    let (gw, _) = gateway_with(GatewayConfig::default());
    let out = gw
        .filter_collection(&ctx("kid", &["family"]), &Payload::EventItems(vec!["Lamp".into(), "Safe".into(), "Temp".into()]))
        .await
        .unwrap();
    assert_eq!(out, Payload::EventItems(vec!["Lamp".into(), "Temp".into()]));
}

#[tokio::test]
async fn home_page_cards_follow_item_acl() {
    let (gw, _) = gateway_with(GatewayConfig { home_separator_collapse: true, ..Default::default() });
    let cards = vec![CardEntry::card("Safe"), CardEntry::separator("Down"), CardEntry::card("Lamp"), CardEntry::separator("Up")];
    let page = json!({"uid": "home", "slots": {"locations": [{"config": {"cardOrder": cards}}]}});
    let out = gw.filter_collection(&ctx("kid", &["family"]), &Payload::Page(page)).await.unwrap().into_value().unwrap();
    let config = &out["slots"]["locations"][0]["config"];
    assert_eq!(config["cardOrder"], json!([{"separator": "Down"}, "Lamp"]));
    assert_eq!(config["excludedCards"], json!(["Safe"]));
}

#[tokio::test]
async fn listing_failure_is_a_backend_error_for_collections() {
    let (gw, _) = gateway_with(GatewayConfig { sitemaps_disabled: false, ..Default::default() });
    // No sitemap listing configured in the memory backend.
    let err = gw.sitemaps(&ctx("x", &["eng"])).await.unwrap_err();
    assert_eq!(err.http_status(), 500);
    assert_eq!(err.upstream_status(), Some(503));
}

#[tokio::test]
async fn sitemap_with_an_unreadable_widget_is_still_served_filtered() {
    let (gw, _) = gateway_with(GatewayConfig { sitemaps_disabled: false, ..Default::default() });
    match gw.sitemap(&ctx("kid", &["family"]), "family_org_main").await.unwrap() {
        Guarded::Allowed(v) => assert_eq!(v["homepage"]["widgets"], json!([{"type": "Switch", "item": {"name": "Lamp"}}])),
        Guarded::Denied => panic!("family sitemap denied"),
    }
}

#[tokio::test]
async fn group_detail_with_malformed_member_does_not_leak() {
    let mut b = backend();
    b.details.insert("gVault".into(), json!({"name": "gVault", "members": [{"name": "Safe"}, {"name": null}]}));
    b.listings.insert(ResourceKind::Item, json!([{"name": "gVault", "tags": ["acl:family"]}, {"name": "Safe", "tags": ["acl:parents"]}]));
    let gw = AuthorizationGateway::new(Arc::new(GatewayConfig::default()), Arc::new(b));
    match gw.item(&ctx("kid", &["family"]), "gVault", &ItemQuery::default()).await.unwrap() {
        Guarded::Allowed(v) => assert_eq!(v["members"], json!([])),
        Guarded::Denied => panic!("group denied"),
    }
}
