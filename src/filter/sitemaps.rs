use crate::acl::AllowSet;
use crate::model::{Sitemap, SitemapPage, Widget, WidgetShape};

pub fn filter_sitemap(sitemap: &Sitemap, allow: &AllowSet) -> Sitemap {
    Sitemap { homepage: sitemap.homepage.as_ref().map(|p| filter_page(p, allow)), extra: sitemap.extra.clone() }
}

pub fn filter_page(page: &SitemapPage, allow: &AllowSet) -> SitemapPage {
    SitemapPage { widgets: page.widgets.as_deref().map(|w| filter_widgets(w, allow)), extra: page.extra.clone() }
}

pub fn filter_widgets(widgets: &[Widget], allow: &AllowSet) -> Vec<Widget> {
    if allow.is_unrestricted() {
        return widgets.to_vec();
    }
    widgets.iter().filter_map(|w| filter_widget(w, allow)).collect()
}

/// Only item-bound widgets are tested; page links and containers always stay.
/// Whatever stays has its children and linked page filtered.
fn filter_widget(widget: &Widget, allow: &AllowSet) -> Option<Widget> {
    if let WidgetShape::ItemBound(item) = widget.shape() {
        if !allow.contains(&item.name) {
            return None;
        }
    }
    Some(Widget {
        item: widget.item.clone(),
        linked_page: widget.linked_page.as_ref().map(|p| filter_page(p, allow)),
        widgets: widget.widgets.as_deref().map(|w| filter_widgets(w, allow)),
        extra: widget.extra.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sitemap() -> Sitemap {
        serde_json::from_value(json!({
            "name": "home_org_main",
            "homepage": {"id": "home", "widgets": [
                {"type": "Frame", "label": "Ground", "widgets": [
                    {"type": "Switch", "item": {"name": "Lamp"}},
                    {"type": "Switch", "item": {"name": "Safe"}},
                    {"type": "Text", "item": {"name": "Kitchen"}, "linkedPage": {"id": "k", "widgets": [
                        {"type": "Switch", "item": {"name": "Oven"}},
                        {"type": "Switch", "item": {"name": "Fridge"}}
                    ]}}
                ]},
                {"type": "Text", "label": "More", "linkedPage": {"id": "more", "widgets": [
                    {"type": "Switch", "item": {"name": "Safe"}}
                ]}},
                {"type": "Webview", "url": "http://x"}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn widget_tree_is_pruned_by_item() {
        let allow: AllowSet = ["Lamp", "Kitchen", "Fridge"].into_iter().collect();
        let out = serde_json::to_value(filter_sitemap(&sitemap(), &allow)).unwrap();
        let expected = json!({
            "name": "home_org_main",
            "homepage": {"id": "home", "widgets": [
                {"type": "Frame", "label": "Ground", "widgets": [
                    {"type": "Switch", "item": {"name": "Lamp"}},
                    {"type": "Text", "item": {"name": "Kitchen"}, "linkedPage": {"id": "k", "widgets": [
                        {"type": "Switch", "item": {"name": "Fridge"}}
                    ]}}
                ]},
                {"type": "Text", "label": "More", "linkedPage": {"id": "more", "widgets": []}},
                {"type": "Webview", "url": "http://x"}
            ]}
        });
        assert_eq!(out, expected);
    }

    #[test]
    fn denied_item_widget_drops_its_linked_page() {
        let allow: AllowSet = ["Oven", "Fridge", "Lamp"].into_iter().collect();
        let out = filter_sitemap(&sitemap(), &allow);
        let frame = &out.homepage.as_ref().unwrap().widgets.as_ref().unwrap()[0];
        assert_eq!(frame.widgets.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn filtering_is_idempotent_and_unrestricted_is_identity() {
        let s = sitemap();
        let allow: AllowSet = ["Lamp", "Oven"].into_iter().collect();
        let once = filter_sitemap(&s, &allow);
        assert_eq!(filter_sitemap(&once, &allow), once);
        assert_eq!(filter_sitemap(&s, &AllowSet::Unrestricted), s);
    }

    #[test]
    fn unreadable_widget_is_dropped_and_the_rest_filtered() {
        let s: Sitemap = serde_json::from_value(json!({"name": "m", "homepage": {"widgets": [
            {"type": "Custom", "item": "legacy-ref"},
            {"type": "Switch", "item": {"name": "Lamp"}},
            {"type": "Switch", "item": {"name": "Safe"}},
            {"type": "Switch", "item": {"name": null}},
            {"type": "Frame", "widgets": {"not": "a list"}}
        ]}}))
        .unwrap();
        let allow: AllowSet = ["Lamp"].into_iter().collect();
        let out = serde_json::to_value(filter_sitemap(&s, &allow)).unwrap();
        let expected = json!({"name": "m", "homepage": {"widgets": [
            {"type": "Switch", "item": {"name": "Lamp"}},
            {"type": "Frame", "widgets": []}
        ]}});
        assert_eq!(out, expected);
    }
}
