//! Control-flow graph
//!
//! Blocks hold an ordered list of AST handles; a block with two successors
//! ends in its branch condition expression. After preprocessing, `succs[0]`
//! is always the true branch and `succs[1]` the false branch.

use serde::{Deserialize, Serialize};

use super::ast::{ExprId, StmtId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfgNode {
    Stmt(StmtId),
    Expr(ExprId),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub nodes: Vec<CfgNode>,
    pub succs: Vec<BlockId>,
    pub preds: Vec<BlockId>,
    /// Terminates the function (ends in `return` or falls off the end)
    pub is_return: bool,
    /// Dead blocks stay in the arena but are skipped by traversals
    pub live: bool,
}

impl Block {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            succs: Vec::new(),
            preds: Vec::new(),
            is_return: false,
            live: true,
        }
    }

    /// Branch condition of a two-successor block: its final expression node.
    pub fn branch_cond(&self) -> Option<ExprId> {
        if self.succs.len() != 2 {
            return None;
        }
        match self.nodes.last() {
            Some(CfgNode::Expr(e)) => Some(*e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cfg {
    pub blocks: Vec<Block>,
    pub entry: BlockId,
}

impl Cfg {
    pub fn new() -> Self {
        let mut cfg = Cfg {
            blocks: Vec::new(),
            entry: BlockId(0),
        };
        cfg.add_block();
        cfg
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new());
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    /// Add an edge, maintaining both successor and predecessor lists.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).succs.push(to);
        self.block_mut(to).preds.push(from);
    }

    /// Remove all successor edges of `from`.
    pub fn clear_succs(&mut self, from: BlockId) {
        let succs = std::mem::take(&mut self.block_mut(from).succs);
        for s in succs {
            let preds = &mut self.block_mut(s).preds;
            if let Some(i) = preds.iter().position(|p| *p == from) {
                preds.remove(i);
            }
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn live_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.live)
            .map(|(i, _)| BlockId(i as u32))
    }

    /// Blocks that terminate the function.
    pub fn return_blocks(&self) -> Vec<BlockId> {
        self.live_blocks()
            .filter(|id| {
                let b = self.block(*id);
                b.is_return || b.succs.is_empty()
            })
            .collect()
    }

    /// Reverse postorder from the entry, visiting live blocks only. The
    /// backprop worklist seeds from the reverse of this order.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut visited = vec![false; self.blocks.len()];
        let mut post = Vec::with_capacity(self.blocks.len());
        // Iterative DFS; frame is (block, next successor index).
        let mut stack = vec![(self.entry, 0usize)];
        visited[self.entry.0 as usize] = true;
        while let Some((id, idx)) = stack.pop() {
            let succs = &self.block(id).succs;
            if idx < succs.len() {
                stack.push((id, idx + 1));
                let next = succs[idx];
                if !visited[next.0 as usize] && self.block(next).live {
                    visited[next.0 as usize] = true;
                    stack.push((next, 0));
                }
            } else {
                post.push(id);
            }
        }
        post.reverse();
        post
    }
}

impl Default for Cfg {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Cfg {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let mut cfg = Cfg::new();
        let b1 = cfg.add_block();
        let b2 = cfg.add_block();
        let b3 = cfg.add_block();
        cfg.add_edge(cfg.entry, b1);
        cfg.add_edge(cfg.entry, b2);
        cfg.add_edge(b1, b3);
        cfg.add_edge(b2, b3);
        cfg.block_mut(b3).is_return = true;
        cfg
    }

    #[test]
    fn test_edges_maintain_preds() {
        let cfg = diamond();
        assert_eq!(cfg.block(BlockId(3)).preds, vec![BlockId(1), BlockId(2)]);
        assert_eq!(cfg.block(BlockId(0)).succs, vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn test_reverse_postorder_starts_at_entry() {
        let cfg = diamond();
        let order = cfg.reverse_postorder();
        assert_eq!(order.first(), Some(&BlockId(0)));
        assert_eq!(order.last(), Some(&BlockId(3)));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_clear_succs() {
        let mut cfg = diamond();
        cfg.clear_succs(BlockId(0));
        assert!(cfg.block(BlockId(0)).succs.is_empty());
        assert!(cfg.block(BlockId(1)).preds.is_empty());
        assert!(cfg.block(BlockId(2)).preds.is_empty());
    }

    #[test]
    fn test_return_blocks() {
        let cfg = diamond();
        assert_eq!(cfg.return_blocks(), vec![BlockId(3)]);
    }
}
