//! 骨链构建
//!
//! 按关节顺序扫描：后一关节的骨骼必须是当前链尾骨骼的严格后代，
//! 否则结束当前链（长度不足 2 丢弃）并以该关节开始新链。
//! 一个 Spring 可能得到零条、一条或多条独立骨链（例如左右对称的饰品共用一个 Spring）。

use crate::skeleton::BoneSet;
use super::spring::SpringJoint;

/// 骨链：Spring 关节列表中的下标序列，每帧重建
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Chain {
    pub joints: Vec<usize>,
}

impl Chain {
    #[inline]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// 相邻关节对 (head, tail)
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.joints.windows(2).map(|w| (w[0], w[1]))
    }
}

/// 由关节列表与当前层级构建骨链
pub fn build_chains(joints: &[SpringJoint], bones: &BoneSet) -> Vec<Chain> {
    let mut chains = Vec::new();
    let mut current: Vec<usize> = Vec::new();

    for (joint_index, joint) in joints.iter().enumerate() {
        let Some(bone) = joint.bone.filter(|&b| b < bones.len()) else {
            close_chain(&mut chains, &mut current);
            continue;
        };

        let extends = current
            .last()
            .and_then(|&tail| joints[tail].bone)
            .is_some_and(|tail_bone| bones.is_descendant(tail_bone, bone));

        if !extends {
            close_chain(&mut chains, &mut current);
        }
        current.push(joint_index);
    }
    close_chain(&mut chains, &mut current);
    chains
}

fn close_chain(chains: &mut Vec<Chain>, current: &mut Vec<usize>) {
    let joints = std::mem::take(current);
    if joints.len() >= 2 {
        chains.push(Chain { joints });
    }
}
