//! Resource kinds and the node shapes the filters operate on.
//!
//! Each shape keeps every field it does not interpret in a flattened `extra`
//! map so that a filtered payload serializes back to exactly what the backend
//! sent, minus the pruned nodes.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

type Extra = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Item,
    Page,
    Sitemap,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Item, ResourceKind::Page, ResourceKind::Sitemap];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Item => "item",
            ResourceKind::Page => "page",
            ResourceKind::Sitemap => "sitemap",
        }
    }

    /// JSON field holding the identifier of a resource of this kind.
    pub fn id_field(&self) -> &'static str {
        match self {
            ResourceKind::Item | ResourceKind::Sitemap => "name",
            ResourceKind::Page => "uid",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// A backend answer relayed with its upstream status rather than turned into an error.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply<T> {
    pub status: u16,
    pub body: T,
}

/// Query parameters accepted on the Item endpoints. Anything else is dropped
/// before the request reaches the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemQuery {
    pub metadata: Option<String>,
    pub recursive: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub tags: Option<String>,
    pub fields: Option<String>,
}

impl ItemQuery {
    /// Query string for the collection endpoint; also the listing cache key.
    pub fn listing_query(&self) -> String {
        encode_pairs(&[
            ("metadata", &self.metadata),
            ("recursive", &self.recursive),
            ("type", &self.item_type),
            ("tags", &self.tags),
            ("fields", &self.fields),
        ])
    }

    /// Query string for a single Item: only `metadata` and `recursive` apply.
    pub fn detail_query(&self) -> String {
        encode_pairs(&[("metadata", &self.metadata), ("recursive", &self.recursive)])
    }
}

fn encode_pairs(pairs: &[(&str, &Option<String>)]) -> String {
    pairs
        .iter()
        .filter_map(|(k, v)| v.as_deref().filter(|v| !v.is_empty()).map(|v| format!("{}={}", k, urlencoding::encode(v))))
        .collect::<Vec<_>>()
        .join("&")
}

// ----- Items -----

/// An Item as returned by `/rest/items`. Groups carry a `members` array.
///
/// Any object with a `members` key is a group, whatever its members contain.
/// Members that cannot be read as an Item are dropped, and a non-string `name`
/// leaves the Item nameless so it never passes a restricted allow-set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ItemNode {
    Group(GroupItem),
    Leaf(LeafItem),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupItem {
    pub name: String,
    pub members: Vec<ItemNode>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafItem {
    pub name: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl<'de> Deserialize<'de> for ItemNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Extra::deserialize(deserializer).map(ItemNode::from_object)
    }
}

impl ItemNode {
    pub fn name(&self) -> &str {
        match self {
            ItemNode::Group(g) => &g.name,
            ItemNode::Leaf(l) => &l.name,
        }
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        ItemNode::Leaf(LeafItem { name: name.into(), extra: Extra::new() })
    }

    pub fn group(name: impl Into<String>, members: Vec<ItemNode>) -> Self {
        ItemNode::Group(GroupItem { name: name.into(), members, extra: Extra::new() })
    }

    /// Item from an arbitrary JSON value; None unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(obj) => Some(ItemNode::from_object(obj)),
            _ => None,
        }
    }

    fn from_object(mut extra: Extra) -> Self {
        let name = match extra.remove("name") {
            Some(Value::String(name)) => name,
            _ => String::new(),
        };
        match extra.remove("members") {
            None => ItemNode::Leaf(LeafItem { name, extra }),
            Some(raw) => {
                let members = match raw {
                    Value::Array(raw) => raw.into_iter().filter_map(ItemNode::from_value).collect(),
                    _ => Vec::new(),
                };
                ItemNode::Group(GroupItem { name, members, extra })
            }
        }
    }
}

// ----- Sitemaps -----

/// Full sitemap as returned by `/rest/sitemaps/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sitemap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<SitemapPage>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A sitemap page: the homepage or the target of a linked widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapPage {
    #[serde(default, deserialize_with = "widget_list", skip_serializing_if = "Option::is_none")]
    pub widgets: Option<Vec<Widget>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemRef>,
    #[serde(rename = "linkedPage", default, skip_serializing_if = "Option::is_none")]
    pub linked_page: Option<SitemapPage>,
    #[serde(default, deserialize_with = "widget_list", skip_serializing_if = "Option::is_none")]
    pub widgets: Option<Vec<Widget>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Widgets are read one by one. An entry that does not parse (say an `item`
/// that is not an object) is dropped with everything below it, and a `widgets`
/// value that is not an array reads as an empty list.
fn widget_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<Widget>>, D::Error> {
    let raw = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(raw)) => raw,
        Some(_) => return Ok(Some(Vec::new())),
    };
    Ok(Some(raw.into_iter().filter_map(|w| Widget::deserialize(w).ok()).collect()))
}

/// How a widget is gated. Anything that is neither item-bound nor a page link is a container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WidgetShape<'a> {
    ItemBound(&'a ItemRef),
    PageLink(&'a SitemapPage),
    Container,
}

impl Widget {
    pub fn shape(&self) -> WidgetShape<'_> {
        match (&self.item, &self.linked_page) {
            (Some(item), _) => WidgetShape::ItemBound(item),
            (None, Some(page)) => WidgetShape::PageLink(page),
            (None, None) => WidgetShape::Container,
        }
    }

    pub fn container(widgets: Vec<Widget>) -> Self {
        Widget { item: None, linked_page: None, widgets: Some(widgets), extra: Extra::new() }
    }

    pub fn for_item(name: impl Into<String>, widgets: Option<Vec<Widget>>) -> Self {
        Widget {
            item: Some(ItemRef { name: name.into(), extra: Extra::new() }),
            linked_page: None,
            widgets,
            extra: Extra::new(),
        }
    }

    pub fn link(widgets: Vec<Widget>) -> Self {
        Widget {
            item: None,
            linked_page: Some(SitemapPage { widgets: Some(widgets), extra: Extra::new() }),
            widgets: None,
            extra: Extra::new(),
        }
    }
}

// ----- Home page cards -----

/// One entry of the home page `cardOrder` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardEntry {
    Separator(SeparatorCard),
    Card(String),
    /// Unrecognized entry: kept in place and never tested.
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparatorCard {
    pub separator: Value,
    #[serde(flatten)]
    pub extra: Extra,
}

impl CardEntry {
    pub fn card(name: impl Into<String>) -> Self { CardEntry::Card(name.into()) }

    pub fn separator(label: impl Into<String>) -> Self {
        CardEntry::Separator(SeparatorCard { separator: Value::String(label.into()), extra: Extra::new() })
    }

    pub fn is_separator(&self) -> bool { matches!(self, CardEntry::Separator(_)) }
}
