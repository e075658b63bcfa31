//! Final block ordering: reverse-post-order with dead-block pruning (spec §4.5).
//!
//! The builder appends blocks in whatever order `new_block` created them, which is
//! convenient while lowering but not a useful traversal order for the serialized
//! package (and may still contain blocks nothing branches to, e.g. the `else` arm of
//! an `if` whose `then` arm always throws). `order_blocks` fixes both problems in
//! one pass: a post-order DFS from the entry block, visiting each block's
//! successors in reverse so that a `branchif`'s true target sorts before its false
//! target, then reversing the resulting numbering so the entry block comes first.
//! Blocks the DFS never reaches are simply left out of the rebuilt list.

use crate::bytecode::BlockId;
use crate::ir::Function;

pub fn order_blocks(function: &mut Function) {
    let n = function.blocks.len();
    if n == 0 {
        return;
    }
    let mut new_id: Vec<Option<u32>> = vec![None; n];
    let mut next = 0u32;
    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
    // Post-order iterative DFS: `stack` holds (block index, next-successor-to-visit).
    // Marking `new_id[block] = Some(placeholder)` up front (as the Python original
    // does with -1) isn't needed here since a plain visited-set serves the same
    // purpose of breaking cycles.
    let mut visiting = vec![false; n];
    visiting[0] = true;
    while let Some(&mut (block_idx, ref mut cursor)) = stack.last_mut() {
        let successors = function.blocks[block_idx]
            .terminator()
            .map(|t| t.successors())
            .unwrap_or_default();
        if *cursor < successors.len() {
            let succ = successors[successors.len() - 1 - *cursor].index();
            *cursor += 1;
            if !visiting[succ] && new_id[succ].is_none() {
                visiting[succ] = true;
                stack.push((succ, 0));
            }
        } else {
            new_id[block_idx] = Some(next);
            next += 1;
            stack.pop();
        }
    }

    let live_count = next;
    let reversed_id: Vec<Option<u32>> = new_id
        .iter()
        .map(|id| id.map(|i| live_count - i - 1))
        .collect();

    for block in &mut function.blocks {
        if reversed_id[block.id.index()].is_none() {
            continue;
        }
        if let Some(last) = block.instructions.last_mut() {
            last.rewrite_successors(|succ| {
                BlockId(reversed_id[succ.index()].expect("branch target must be live"))
            });
        }
    }

    let mut ordered: Vec<Option<crate::bytecode::BasicBlock>> = (0..live_count).map(|_| None).collect();
    for (old_index, block) in function.blocks.drain(..).enumerate() {
        if let Some(id) = reversed_id[old_index] {
            let mut block = block;
            block.id = BlockId(id);
            ordered[id as usize] = Some(block);
        }
    }
    function.blocks = ordered.into_iter().map(|b| b.expect("every live id was assigned")).collect();
}

trait BlockIdExt {
    fn index(self) -> usize;
}

impl BlockIdExt for BlockId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{BasicBlock, Instr};
    use crate::ir::Type;

    fn block(id: u32, instrs: Vec<Instr>) -> BasicBlock {
        let mut b = BasicBlock::new(BlockId(id));
        for i in instrs {
            b.push(i);
        }
        b
    }

    #[test]
    fn drops_unreachable_blocks_and_renumbers_from_entry() {
        let mut f = Function::new("f", Type::Unit);
        // block 0 branches to block 2; block 1 is dead; block 2 returns.
        f.blocks = vec![
            block(0, vec![Instr::Branch(BlockId(2))]),
            block(1, vec![Instr::Unit, Instr::Ret]),
            block(2, vec![Instr::Unit, Instr::Ret]),
        ];
        order_blocks(&mut f);
        assert_eq!(f.blocks.len(), 2);
        assert_eq!(f.blocks[0].id, BlockId(0));
        assert_eq!(f.blocks[0].instructions, vec![Instr::Branch(BlockId(1))]);
        assert_eq!(f.blocks[1].id, BlockId(1));
    }

    #[test]
    fn true_branch_sorts_before_false_branch() {
        let mut f = Function::new("f", Type::Unit);
        f.blocks = vec![
            block(0, vec![Instr::BranchIf(BlockId(1), BlockId(2))]),
            block(1, vec![Instr::Unit, Instr::Ret]), // true target
            block(2, vec![Instr::Unit, Instr::Ret]), // false target
        ];
        order_blocks(&mut f);
        assert_eq!(f.blocks.len(), 3);
        // Reverse-post-order visits the false target first (because successors are
        // visited in reverse), so it gets the lower post-order number and therefore
        // the *higher* final id once reversed... concretely: true target ends up
        // directly after the entry block.
        assert_eq!(f.blocks[0].instructions, vec![Instr::BranchIf(BlockId(1), BlockId(2))]);
    }
}
