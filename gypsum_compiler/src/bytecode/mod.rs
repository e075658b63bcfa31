//! Basic blocks: the unit the CFG builder assembles and the serializer flattens
//! into one instruction stream plus an offset table (spec §3, §6).

pub mod opcode;

pub use opcode::{BlockId, Instr};

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instr>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> BasicBlock {
        BasicBlock {
            id,
            instructions: Vec::new(),
        }
    }

    pub fn push(&mut self, instr: Instr) {
        debug_assert!(
            self.instructions.last().map_or(true, |last| !last.is_terminator()),
            "cannot append after a block's terminator"
        );
        self.instructions.push(instr);
    }

    pub fn terminator(&self) -> Option<&Instr> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator().is_some()
    }
}
