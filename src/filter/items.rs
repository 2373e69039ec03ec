use crate::acl::AllowSet;
use crate::model::{GroupItem, ItemNode};

/// Items of a collection visible under `allow`, groups pruned recursively.
pub fn filter_items(items: &[ItemNode], allow: &AllowSet) -> Vec<ItemNode> {
    if allow.is_unrestricted() {
        return items.to_vec();
    }
    items.iter().filter_map(|item| filter_item(item, allow)).collect()
}

/// `item` itself if allowed, with group members filtered. Nameless items never pass.
pub fn filter_item(item: &ItemNode, allow: &AllowSet) -> Option<ItemNode> {
    if !allow.contains(item.name()) {
        return None;
    }
    Some(filter_members(item, allow))
}

/// Keep `item` but drop the members of any group below it that are not allowed.
pub fn filter_members(item: &ItemNode, allow: &AllowSet) -> ItemNode {
    match item {
        ItemNode::Leaf(_) => item.clone(),
        ItemNode::Group(g) => ItemNode::Group(GroupItem {
            name: g.name.clone(),
            members: filter_items(&g.members, allow),
            extra: g.extra.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Vec<ItemNode> {
        vec![
            ItemNode::group(
                "gHouse",
                vec![
                    ItemNode::leaf("Lamp"),
                    ItemNode::group("gCellar", vec![ItemNode::leaf("Freezer"), ItemNode::leaf("Pump")]),
                    ItemNode::group("gAttic", vec![ItemNode::leaf("Fan")]),
                ],
            ),
            ItemNode::leaf("Doorbell"),
            ItemNode::leaf(""),
        ]
    }

    #[test]
    fn groups_gate_their_subtree() {
        let allow: AllowSet = ["gHouse", "Lamp", "gCellar", "Pump", "Fan", "Doorbell"].into_iter().collect();
        let out = filter_items(&tree(), &allow);
        let expected = vec![
            ItemNode::group("gHouse", vec![ItemNode::leaf("Lamp"), ItemNode::group("gCellar", vec![ItemNode::leaf("Pump")])]),
            ItemNode::leaf("Doorbell"),
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn filtering_is_idempotent() {
        let allow: AllowSet = ["gHouse", "gAttic", "Freezer", "Doorbell"].into_iter().collect();
        let once = filter_items(&tree(), &allow);
        assert_eq!(filter_items(&once, &allow), once);
    }

    #[test]
    fn unrestricted_returns_identical_copy() {
        let t = tree();
        assert_eq!(filter_items(&t, &AllowSet::Unrestricted), t);
        assert!(filter_items(&t, &AllowSet::empty()).is_empty());
    }

    #[test]
    fn guarded_root_keeps_itself_but_loses_denied_members() {
        let root = &tree()[0];
        let allow: AllowSet = ["Lamp"].into_iter().collect();
        match filter_members(root, &allow) {
            ItemNode::Group(g) => assert_eq!(g.members, vec![ItemNode::leaf("Lamp")]),
            other => panic!("shape changed: {:?}", other),
        }
    }

    #[test]
    fn unreadable_member_cannot_turn_a_group_into_a_leaf() {
        let raw = json!([{"name": "gHouse", "type": "Group", "members": [{"name": "Secret"}, {"name": null}, 7]}]);
        let items: Vec<ItemNode> = serde_json::from_value(raw).unwrap();
        let allow: AllowSet = ["gHouse"].into_iter().collect();
        let out = serde_json::to_value(filter_items(&items, &allow)).unwrap();
        assert_eq!(out, json!([{"name": "gHouse", "type": "Group", "members": []}]));
    }
}
