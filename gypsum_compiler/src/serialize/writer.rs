//! Binary package writer: header, string table, functions, and classes, in that
//! order, written directly to any `std::io::Write` (spec §6).

use std::io::{self, Write};

use crate::builtins::BuiltinRegistry;
use crate::bytecode::Instr;
use crate::error::CompileResult;
use crate::ir::{Class, Function, Package, Type};
use crate::serialize::vbn;

/// `spkg` in little-endian bytes, written as the first four bytes of every package.
const MAGIC: u32 = 0x676b_7073;
const MAJOR_VERSION: u16 = 0;
const MINOR_VERSION: u16 = 4;
const FLAGS: u64 = 0;

pub fn write_package(package: &Package, builtins: &BuiltinRegistry, out: &mut impl Write) -> CompileResult<()> {
    let mut w = Writer { out, builtins };
    w.write_header(package)?;
    for s in &package.strings {
        w.write_string(s)?;
    }
    for f in &package.functions {
        w.write_function(f)?;
    }
    for c in &package.classes {
        w.write_class(c)?;
    }
    Ok(())
}

struct Writer<'a, W> {
    out: &'a mut W,
    builtins: &'a BuiltinRegistry,
}

impl<'a, W: Write> Writer<'a, W> {
    /// Fixed-width, not VBN: the header is read before anything is known about the
    /// rest of the file, so its layout can't depend on variable-length fields.
    fn write_header(&mut self, package: &Package) -> io::Result<()> {
        self.out.write_all(&MAGIC.to_le_bytes())?;
        self.out.write_all(&MAJOR_VERSION.to_le_bytes())?;
        self.out.write_all(&MINOR_VERSION.to_le_bytes())?;
        self.out.write_all(&FLAGS.to_le_bytes())?;
        self.out.write_all(&(package.strings.len() as u64).to_le_bytes())?;
        self.out.write_all(&(package.functions.len() as u64).to_le_bytes())?;
        self.out.write_all(&(package.classes.len() as u64).to_le_bytes())?;
        let entry = package.entry_function.map_or(-1i64, |id| id.0 as i64);
        self.out.write_all(&entry.to_le_bytes())?;
        Ok(())
    }

    fn write_vbn(&mut self, value: i64) -> io::Result<()> {
        self.out.write_all(&vbn::encoded(value))
    }

    fn write_string(&mut self, s: &str) -> io::Result<()> {
        let char_count = s.chars().count() as i64;
        let encoded = s.as_bytes();
        self.write_vbn(char_count)?;
        self.write_vbn(encoded.len() as i64)?;
        self.out.write_all(encoded)
    }

    fn write_function(&mut self, function: &Function) -> io::Result<()> {
        self.write_type(&function.return_type)?;
        self.write_vbn(function.parameter_types.len() as i64)?;
        for ty in &function.parameter_types {
            self.write_type(ty)?;
        }
        let locals_size: i64 = 8 * function
            .variables
            .iter()
            .filter(|v| v.kind == crate::ir::VariableKind::Local)
            .count() as i64;
        self.write_vbn(locals_size)?;

        let (instructions, block_offsets) = self.encode_instructions(function);
        self.write_vbn(instructions.len() as i64)?;
        self.out.write_all(&instructions)?;
        self.write_vbn(block_offsets.len() as i64)?;
        for offset in block_offsets {
            self.write_vbn(offset as i64)?;
        }
        Ok(())
    }

    /// Flattens every block's instructions into one byte stream and records each
    /// block's starting offset. Branch/try operands are already block ids at this
    /// point (`crate::cfg::order` has rewritten them after any reordering), so no
    /// further fix-up is needed here.
    fn encode_instructions(&self, function: &Function) -> (Vec<u8>, Vec<usize>) {
        let mut buf = Vec::new();
        let mut offsets = Vec::with_capacity(function.blocks.len());
        for block in &function.blocks {
            offsets.push(buf.len());
            for instr in &block.instructions {
                buf.push(instr.opcode_byte());
                encode_operands(instr, &mut buf);
            }
        }
        (buf, offsets)
    }

    fn write_class(&mut self, class: &Class) -> io::Result<()> {
        let supertype = class
            .supertype
            .clone()
            .unwrap_or_else(|| Type::class(self.builtins.root_class(), vec![]));
        self.write_type(&supertype)?;
        self.write_vbn(class.fields.len() as i64)?;
        for field in &class.fields {
            self.write_type(&field.ty)?;
        }
        self.write_vbn(class.constructors.len() as i64)?;
        for &ctor in &class.constructors {
            self.write_vbn(ctor.0 as i64)?;
        }
        self.write_vbn(class.methods.len() as i64)?;
        for &method in &class.methods {
            self.write_vbn(method.0 as i64)?;
        }
        Ok(())
    }

    fn write_type(&mut self, ty: &Type) -> io::Result<()> {
        let flags: i64 = if ty.is_nullable() { 1 } else { 0 };
        self.write_vbn(flags)?;
        let class_id = match ty {
            Type::Class { class, .. } => *class,
            Type::Variable(_) => self.builtins.root_class(),
            _ => self.builtins.class_for_primitive(ty),
        };
        self.write_vbn(class_id.0 as i64)
    }
}

/// Encodes an instruction's operands. Float literals are the one exception to VBN:
/// they're written as raw IEEE-754 bytes so the value survives exactly.
fn encode_operands(instr: &Instr, buf: &mut Vec<u8>) {
    match instr {
        Instr::F32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Instr::F64(v) => buf.extend_from_slice(&v.to_le_bytes()),

        Instr::LdLocal(i) | Instr::StLocal(i) => vbn::encode(*i as i64, buf),

        Instr::LdP(i) | Instr::LdPc(i) | Instr::Ld8(i) | Instr::Ld16(i) | Instr::Ld32(i)
        | Instr::Ld64(i) | Instr::StP(i) | Instr::St8(i) | Instr::St16(i) | Instr::St32(i)
        | Instr::St64(i) => vbn::encode(*i as i64, buf),

        Instr::I8(v) => vbn::encode(*v as i64, buf),
        Instr::I16(v) => vbn::encode(*v as i64, buf),
        Instr::I32(v) => vbn::encode(*v as i64, buf),
        Instr::I64(v) => vbn::encode(*v, buf),
        Instr::StringLit(id) => vbn::encode(id.0 as i64, buf),

        Instr::True
        | Instr::False
        | Instr::Null
        | Instr::Unit
        | Instr::Uninitialized
        | Instr::Dup
        | Instr::Drop
        | Instr::Swap
        | Instr::Swap2
        | Instr::Eqp
        | Instr::Throw
        | Instr::Ret => {}

        Instr::Branch(b) => vbn::encode(b.0 as i64, buf),
        Instr::BranchIf(t, f) => {
            vbn::encode(t.0 as i64, buf);
            vbn::encode(f.0 as i64, buf);
        }
        Instr::PushTry(t, c) => {
            vbn::encode(t.0 as i64, buf);
            vbn::encode(c.0 as i64, buf);
        }
        Instr::PopTry(b) => vbn::encode(b.0 as i64, buf),

        Instr::CallG(argc, f) => {
            vbn::encode(*argc as i64, buf);
            vbn::encode(f.0 as i64, buf);
        }
        Instr::CallV(argc, idx) => {
            vbn::encode(*argc as i64, buf);
            vbn::encode(*idx as i64, buf);
        }
        Instr::AllocObj(c) => vbn::encode(c.0 as i64, buf),
        Instr::AllocArri(c, len) => {
            vbn::encode(c.0 as i64, buf);
            vbn::encode(*len, buf);
        }
        Instr::Cls(c) => vbn::encode(c.0 as i64, buf),
        Instr::TyCs(c) => vbn::encode(c.0 as i64, buf),
        Instr::TyVs(p) => vbn::encode(p.0 as i64, buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinRegistry;
    use crate::bytecode::{BasicBlock, BlockId};
    use crate::ir::{Function, Package};

    fn registry() -> BuiltinRegistry {
        BuiltinRegistry::load().unwrap()
    }

    #[test]
    fn header_starts_with_magic_and_version_bytes() {
        let package = Package::new("empty");
        let builtins = registry();
        let mut buf = Vec::new();
        write_package(&package, &builtins, &mut buf).unwrap();
        assert_eq!(&buf[0..4], &[0x73, 0x70, 0x6b, 0x67]);
        assert_eq!(&buf[4..6], &[0x00, 0x00]); // major
        assert_eq!(&buf[6..8], &[0x04, 0x00]); // minor
        assert_eq!(&buf[8..16], &[0, 0, 0, 0, 0, 0, 0, 0]); // flags
        assert!(buf.len() >= 48); // four 8-byte lengths follow flags
    }

    #[test]
    fn identity_function_encodes_to_ldlocal_ret() {
        let mut function = Function::new("identity", Type::i64());
        function.add_parameter("x", Type::i64());
        let mut block = BasicBlock::new(BlockId(0));
        block.push(Instr::LdLocal(0));
        block.push(Instr::Ret);
        function.blocks.push(block);

        let builtins = registry();
        let mut sink: Vec<u8> = Vec::new();
        let w = Writer {
            out: &mut sink,
            builtins: &builtins,
        };
        let (bytes, offsets) = w.encode_instructions(&function);
        assert_eq!(offsets, vec![0]);
        assert_eq!(bytes, vec![Instr::LdLocal(0).opcode_byte(), 0x00, Instr::Ret.opcode_byte()]);
    }
}
