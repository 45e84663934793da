//! 变换系统 (Transform System)
//!
//! 负责场景图的世界矩阵层级传播，与 Scene 解耦以避免借用冲突。
//! 只需要借用 nodes arena 和根节点句柄。
//!
//! 脏判定基于 Transform 的显式提交版本号：节点记录上次构建世界矩阵时
//! 用到的版本 (`world_version`)，版本不变且父矩阵不变就跳过重算。
//! 新节点的 `world_version` 为 `None`，首次传播必定计算，即使父节点
//! 这一帧没有变化。

use glam::DMat4;
use slotmap::SlotMap;

use crate::scene::node::Node;
use crate::scene::NodeKey;

/// 自根向下更新整个层级的世界矩阵
///
/// 使用显式栈替代递归调用，避免深层级场景的栈溢出风险。
/// 返回本次传播中重算了世界矩阵的节点数。
pub fn update_hierarchy(nodes: &mut SlotMap<NodeKey, Node>, root: NodeKey) -> usize {
    // 工作栈: (节点句柄, 父世界矩阵, 父是否变化, 父是否启用)
    let mut stack: Vec<(NodeKey, DMat4, bool, bool)> = Vec::with_capacity(64);
    stack.push((root, DMat4::IDENTITY, false, true));

    let mut recomputed = 0;

    while let Some((key, parent_world, parent_changed, parent_enabled)) = stack.pop() {
        let Some(node) = nodes.get_mut(key) else {
            continue;
        };

        // 1. 局部矩阵是否换过版本 (None = 从未构建过世界矩阵)
        let version = node.transform.version();
        let local_changed = node.world_version != Some(version);
        let world_needs_update = local_changed || parent_changed;

        // 2. 世界矩阵 = 父世界矩阵 * 局部矩阵
        if world_needs_update {
            node.world_matrix = parent_world * *node.transform.local_matrix();
            node.world_version = Some(version);
            recomputed += 1;
        }

        // 3. 有效启用状态每次传播都重算 (开关翻转不走版本号)
        node.world_enabled = parent_enabled && node.enabled;

        // 4. 子节点逆序入栈, 保持兄弟节点的访问顺序
        let current_world = node.world_matrix;
        let current_enabled = node.world_enabled;
        for &child in node.children.iter().rev() {
            stack.push((child, current_world, world_needs_update, current_enabled));
        }
    }

    recomputed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::node::NodeBinding;
    use glam::DVec3;

    fn link(nodes: &mut SlotMap<NodeKey, Node>, parent: NodeKey, child: NodeKey) {
        nodes[child].parent = Some(parent);
        nodes[parent].children.push(child);
    }

    #[test]
    fn parent_translation_reaches_children() {
        let mut nodes: SlotMap<NodeKey, Node> = SlotMap::with_key();
        let root = nodes.insert(Node::default());
        let child = nodes.insert(Node::default());
        link(&mut nodes, root, child);

        {
            let mut t = nodes[root].transform.edit();
            t.position = DVec3::new(1.0, 0.0, 0.0);
        }
        {
            let mut t = nodes[child].transform.edit();
            t.position = DVec3::new(0.0, 1.0, 0.0);
        }

        update_hierarchy(&mut nodes, root);

        let world_pos = nodes[child].world_matrix.w_axis;
        assert!((world_pos.x - 1.0).abs() < 1e-12);
        assert!((world_pos.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn second_pass_recomputes_nothing() {
        let mut nodes: SlotMap<NodeKey, Node> = SlotMap::with_key();
        let root = nodes.insert(Node::default());
        let child = nodes.insert(Node::default());
        link(&mut nodes, root, child);

        assert_eq!(update_hierarchy(&mut nodes, root), 2);
        assert_eq!(update_hierarchy(&mut nodes, root), 0);

        // 提交一个真实变更后只有该子树重算
        {
            let mut t = nodes[child].transform.edit();
            t.position = DVec3::new(3.0, 0.0, 0.0);
        }
        assert_eq!(update_hierarchy(&mut nodes, root), 1);
    }

    #[test]
    fn late_child_inherits_settled_parent() {
        let mut nodes: SlotMap<NodeKey, Node> = SlotMap::with_key();
        let root = nodes.insert(Node::default());
        {
            let mut t = nodes[root].transform.edit();
            t.position = DVec3::new(5.0, 0.0, 0.0);
        }
        update_hierarchy(&mut nodes, root);

        // 父节点已经静止后再挂子节点
        let child = nodes.insert(Node::new(NodeBinding::default()));
        link(&mut nodes, root, child);
        update_hierarchy(&mut nodes, root);

        let world_pos = nodes[child].world_matrix.w_axis;
        assert!((world_pos.x - 5.0).abs() < 1e-12);
    }

    #[test]
    fn disabled_parent_disables_subtree() {
        let mut nodes: SlotMap<NodeKey, Node> = SlotMap::with_key();
        let root = nodes.insert(Node::default());
        let mid = nodes.insert(Node::default());
        let leaf = nodes.insert(Node::default());
        link(&mut nodes, root, mid);
        link(&mut nodes, mid, leaf);

        nodes[mid].enabled = false;
        update_hierarchy(&mut nodes, root);

        assert!(nodes[root].world_enabled);
        assert!(!nodes[mid].world_enabled);
        assert!(!nodes[leaf].world_enabled);

        nodes[mid].enabled = true;
        update_hierarchy(&mut nodes, root);
        assert!(nodes[leaf].world_enabled);
    }
}
