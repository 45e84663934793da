use slotmap::SlotMap;
use rustc_hash::FxHashMap;

use crate::errors::{EngineError, Result};
use crate::scene::node::{Node, NodeBinding};
use crate::scene::{CameraKey, NodeKey};

/// 场景图容器
///
/// Scene 是纯数据层：节点 arena + 固定根节点 + 名字反查表。
/// 世界矩阵传播由 transform_system 负责，渲染数据由 prepare 阶段写入。
pub struct Scene {
    name: String,

    pub(crate) nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,

    // 可选的节点名反查表 (名字在场景内唯一)
    names: FxHashMap<String, NodeKey>,
}

impl Scene {
    /// Creates an empty scene. The root node is allocated first and lives for
    /// the scene's whole lifetime.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let mut nodes = SlotMap::with_key();
        // 根节点占据 arena 的第一个槽位, 不可移除
        let root = nodes.insert(Node::new(NodeBinding::default()));

        Self {
            name: name.into(),
            nodes,
            root,
            names: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The always-valid root key.
    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of nodes including the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// 获取可变引用 (用于修改 Transform 或绑定)
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Looks a node up by the name it was created with.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<NodeKey> {
        self.names.get(name).copied()
    }

    /// Creates a node under `parent`.
    ///
    /// Named nodes enter the reverse-lookup table; a name collision is an
    /// error and leaves the scene unchanged.
    pub fn add_child(&mut self, parent: NodeKey, binding: NodeBinding) -> Result<NodeKey> {
        if !self.nodes.contains_key(parent) {
            return Err(EngineError::NodeNotFound {
                scene: self.name.clone(),
            });
        }
        if let Some(name) = binding.name.as_deref()
            && self.names.contains_key(name)
        {
            return Err(EngineError::DuplicateId {
                kind: "node",
                id: name.to_owned(),
            });
        }

        let name = binding.name.clone();
        let key = self.nodes.insert(Node::new(binding));

        // 建立父子关系
        self.nodes[key].parent = Some(parent);
        self.nodes[parent].children.push(key);

        if let Some(name) = name {
            self.names.insert(name, key);
        }
        Ok(key)
    }

    /// Removes a node and its whole subtree.
    ///
    /// The root cannot be removed; a stale key is an error, never a no-op.
    pub fn remove(&mut self, node: NodeKey) -> Result<()> {
        if node == self.root {
            return Err(EngineError::RootRemoval {
                scene: self.name.clone(),
            });
        }
        if !self.nodes.contains_key(node) {
            return Err(EngineError::NodeNotFound {
                scene: self.name.clone(),
            });
        }

        // 1. 从父节点的 children 列表摘除
        if let Some(parent) = self.nodes[node].parent
            && let Some(p) = self.nodes.get_mut(parent)
            && let Some(pos) = p.children.iter().position(|&c| c == node)
        {
            p.children.swap_remove(pos);
        }

        // 2. 迭代收集整棵子树, 再统一删除
        let mut doomed = vec![node];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let key = doomed[cursor];
            cursor += 1;
            if let Some(n) = self.nodes.get(key) {
                doomed.extend_from_slice(&n.children);
            }
        }

        for key in doomed {
            if let Some(n) = self.nodes.remove(key)
                && let Some(name) = n.name.as_deref()
            {
                self.names.remove(name);
            }
        }
        Ok(())
    }

    /// Moves `child` (and its subtree) under `new_parent`.
    ///
    /// Attaching a node to itself or to one of its own descendants is
    /// rejected and leaves the scene unchanged.
    pub fn attach(&mut self, child: NodeKey, new_parent: NodeKey) -> Result<()> {
        if !self.nodes.contains_key(child) || !self.nodes.contains_key(new_parent) {
            return Err(EngineError::NodeNotFound {
                scene: self.name.clone(),
            });
        }
        if child == self.root {
            return Err(EngineError::BadAttach {
                scene: self.name.clone(),
                detail: "the root cannot be re-parented",
            });
        }
        if child == new_parent {
            return Err(EngineError::BadAttach {
                scene: self.name.clone(),
                detail: "a node cannot be its own parent",
            });
        }

        // 沿新父节点向上走到根, 途中遇到 child 说明会成环
        let mut probe = self.nodes[new_parent].parent;
        while let Some(key) = probe {
            if key == child {
                return Err(EngineError::BadAttach {
                    scene: self.name.clone(),
                    detail: "the new parent is inside the node's subtree",
                });
            }
            probe = self.nodes[key].parent;
        }

        // 1. 从旧父节点摘除
        if let Some(old_parent) = self.nodes[child].parent
            && let Some(p) = self.nodes.get_mut(old_parent)
            && let Some(pos) = p.children.iter().position(|&c| c == child)
        {
            p.children.swap_remove(pos);
        }

        // 2. 挂到新父节点下
        self.nodes[new_parent].children.push(child);
        let node = &mut self.nodes[child];
        node.parent = Some(new_parent);
        // 下一次传播必须重算世界矩阵
        node.world_version = None;
        Ok(())
    }

    /// Visits every node depth-first, parents strictly before children.
    pub fn walk(&self, mut visitor: impl FnMut(NodeKey, &Node)) {
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            visitor(key, node);
            // 逆序入栈, 保证子节点按插入顺序访问
            stack.extend(node.children.iter().rev().copied());
        }
    }

    /// All nodes in arena order (no hierarchy implied).
    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    /// Drops every per-node cache entry a removed camera left behind.
    pub(crate) fn prune_camera(&mut self, camera: CameraKey) {
        for node in self.nodes.values_mut() {
            node.cam_states.remove(&camera);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_scene_has_a_root() {
        let scene = Scene::new("main");
        assert_eq!(scene.node_count(), 1);
        assert!(scene.node(scene.root()).is_some());
    }

    #[test]
    fn remove_rejects_the_root() {
        let mut scene = Scene::new("main");
        let err = scene.remove(scene.root()).unwrap_err();
        assert!(matches!(err, EngineError::RootRemoval { .. }));
    }

    #[test]
    fn remove_takes_the_subtree_with_it() {
        let mut scene = Scene::new("main");
        let root = scene.root();
        let a = scene.add_child(root, NodeBinding::default()).unwrap();
        let b = scene.add_child(a, NodeBinding::default()).unwrap();
        let c = scene.add_child(b, NodeBinding::default()).unwrap();
        let other = scene.add_child(root, NodeBinding::default()).unwrap();

        scene.remove(a).unwrap();

        assert!(scene.node(a).is_none());
        assert!(scene.node(b).is_none());
        assert!(scene.node(c).is_none());
        assert!(scene.node(other).is_some());
        assert_eq!(scene.node_count(), 2);

        // 再次移除同一个 key 必须报错而不是静默成功
        assert!(matches!(
            scene.remove(a),
            Err(EngineError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut scene = Scene::new("main");
        let root = scene.root();
        let a = scene.add_child(root, NodeBinding::default()).unwrap();
        let b = scene.add_child(a, NodeBinding::default()).unwrap();

        assert!(matches!(
            scene.attach(a, b),
            Err(EngineError::BadAttach { .. })
        ));
        assert!(matches!(
            scene.attach(a, a),
            Err(EngineError::BadAttach { .. })
        ));

        // 合法的重新挂接
        scene.attach(b, root).unwrap();
        assert_eq!(scene.node(b).unwrap().parent(), Some(root));
        assert!(scene.node(a).unwrap().children().is_empty());
    }

    #[test]
    fn walk_visits_parents_before_children() {
        let mut scene = Scene::new("main");
        let root = scene.root();
        let a = scene.add_child(root, NodeBinding::default()).unwrap();
        let b = scene.add_child(a, NodeBinding::default()).unwrap();
        let c = scene.add_child(root, NodeBinding::default()).unwrap();

        let mut order = Vec::new();
        scene.walk(|key, _| order.push(key));

        assert_eq!(order.len(), 4);
        assert_eq!(order[0], root);
        let pos = |k| order.iter().position(|&x| x == k).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(root) < pos(c));
    }

    #[test]
    fn named_nodes_resolve_and_collide() {
        let mut scene = Scene::new("main");
        let root = scene.root();
        let key = scene
            .add_child(root, NodeBinding::default().named("hero"))
            .unwrap();
        assert_eq!(scene.find("hero"), Some(key));

        let err = scene
            .add_child(root, NodeBinding::default().named("hero"))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateId { kind: "node", .. }));

        scene.remove(key).unwrap();
        assert_eq!(scene.find("hero"), None);
    }
}
