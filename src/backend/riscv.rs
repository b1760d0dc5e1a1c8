//! RV32 code generation.
//!
//! Register allocation is per-function and per-value: every instruction
//! that produces a value gets a stack slot in the frame, and a bank of 15
//! general-purpose registers caches values between their definition and
//! their uses within a block. A register is `free`, `cached` (holds a
//! still-valid value and may be evicted), or `pinned` (mid-use as an
//! operand and must not be evicted). Values cross block boundaries
//! through their slots: every terminator flushes the cached registers.

use core::fmt::Write;

use hashbrown::{HashMap, HashSet};

use crate::{
    backend::{CodeGenerator, CodegenOptions},
    middle::ir::{
        self, BinaryOp, FunctionData, Program, Type, ValueId, ValueKind, align_to,
    },
};

/// Usable bounds of the I-type signed immediate. Offsets and stack
/// adjustments outside this range are synthesized through a scratch
/// register instead of a single immediate instruction.
pub const IMM12_MIN: i32 = -2048;
pub const IMM12_MAX: i32 = 2047;

/// Stack frames are rounded up to this boundary per the ABI
pub const FRAME_ALIGN: usize = 16;

/// Integer arguments beyond this count are passed through caller stack
/// slots
pub const MAX_REG_ARGS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Reg {
    /// Hardwired zero
    X0,
    Ra,
    Sp,
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
}

/// The allocatable bank: every caller-saved general-purpose register
const BANK: [Reg; 15] = [
    Reg::T0,
    Reg::T1,
    Reg::T2,
    Reg::T3,
    Reg::T4,
    Reg::T5,
    Reg::T6,
    Reg::A0,
    Reg::A1,
    Reg::A2,
    Reg::A3,
    Reg::A4,
    Reg::A5,
    Reg::A6,
    Reg::A7,
];

const ARG_REGS: [Reg; MAX_REG_ARGS] = [
    Reg::A0,
    Reg::A1,
    Reg::A2,
    Reg::A3,
    Reg::A4,
    Reg::A5,
    Reg::A6,
    Reg::A7,
];

fn bank_index(reg: Reg) -> Option<usize> {
    BANK.iter().position(|candidate| *candidate == reg)
}

fn imm12_fits(value: i32) -> bool {
    (IMM12_MIN..=IMM12_MAX).contains(&value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegState {
    Free,
    /// Holds a still-valid value; evictable (spilling the value first if
    /// its slot does not hold it yet)
    Cached { value: ValueId, since: u64 },
    /// In active use as an operand; not evictable except where the binary
    /// operator case explicitly permits it
    Pinned { value: ValueId },
}

pub struct CodeGeneratorRiscv32;

impl CodeGenerator for CodeGeneratorRiscv32 {
    fn translate_to_asm(&self, program: &Program, options: &CodegenOptions) -> String {
        let mut output = String::new();

        for global in program.globals.iter() {
            emit_global(&mut output, global);
        }

        for function in program.functions.iter().filter(|f| !f.is_declaration) {
            let mut codegen = FunctionCodegen::new(program, function, options, &mut output);
            codegen.run();
        }

        output
    }
}

/* Global data */

fn emit_global(output: &mut String, global: &ir::GlobalData) {
    writeln!(output, "    .data").unwrap();
    writeln!(output, "    .globl {}", global.name).unwrap();
    writeln!(output, "{}:", global.name).unwrap();

    if global.init.is_all_zero() {
        writeln!(output, "    .zero {}", global.ty.size()).unwrap();
        return;
    }

    let mut words = Vec::new();
    global.init.flatten_words(&global.ty, &mut words);

    emit_words(output, &words);
}

/// Renders a word sequence compactly: nonzero values as `.word`, runs of
/// zeros compressed back into `.zero`
fn emit_words(output: &mut String, words: &[i32]) {
    let mut position = 0;

    while position < words.len() {
        if words[position] == 0 {
            let run_start = position;

            while position < words.len() && words[position] == 0 {
                position += 1;
            }

            writeln!(output, "    .zero {}", 4 * (position - run_start)).unwrap();
        } else {
            writeln!(output, "    .word {}", words[position]).unwrap();
            position += 1;
        }
    }
}

/* Function code generation */

struct FunctionCodegen<'a> {
    program: &'a Program,
    function: &'a FunctionData,
    options: &'a CodegenOptions,
    output: &'a mut String,

    frame_size: i32,
    has_call: bool,
    /// Spill slot (sp-relative) for every value-producing instruction
    slot_offsets: HashMap<ValueId, i32>,
    /// Storage region (sp-relative) for every `alloc`
    storage_offsets: HashMap<ValueId, i32>,

    regs: [RegState; BANK.len()],
    /// Values currently live in a register
    reg_of: HashMap<ValueId, Reg>,
    /// Values whose slot holds their value (a spilled value can be
    /// re-validated from memory without being recomputed)
    spilled: HashSet<ValueId>,
    tick: u64,
}

impl<'a> FunctionCodegen<'a> {
    fn new(
        program: &'a Program,
        function: &'a FunctionData,
        options: &'a CodegenOptions,
        output: &'a mut String,
    ) -> Self {
        let mut codegen = Self {
            program,
            function,
            options,
            output,
            frame_size: 0,
            has_call: false,
            slot_offsets: HashMap::new(),
            storage_offsets: HashMap::new(),
            regs: [RegState::Free; BANK.len()],
            reg_of: HashMap::new(),
            spilled: HashSet::new(),
            tick: 0,
        };

        codegen.compute_frame_layout();
        codegen
    }

    /// Lays out the stack frame: the outgoing-argument overflow area at
    /// the bottom, then one slot per value-producing instruction (arrays
    /// sized by their full storage), then the return address slot, all
    /// rounded up to the frame alignment
    fn compute_frame_layout(&mut self) {
        let mut outgoing_area = 0usize;

        for block_id in &self.function.layout {
            for inst in &self.function.block(*block_id).insts {
                if let ValueKind::Call { arguments, .. } = &self.function.value(*inst).kind {
                    self.has_call = true;
                    outgoing_area =
                        outgoing_area.max(arguments.len().saturating_sub(MAX_REG_ARGS) * 4);
                }
            }
        }

        let mut cursor = outgoing_area;

        for (index, param) in self.function.params.iter().enumerate() {
            if index < MAX_REG_ARGS {
                self.slot_offsets.insert(*param, cursor as i32);
                cursor += 4;
            }
        }

        for block_id in &self.function.layout {
            for inst in &self.function.block(*block_id).insts {
                let value = self.function.value(*inst);

                match &value.kind {
                    ValueKind::Alloc => {
                        self.storage_offsets.insert(*inst, cursor as i32);
                        cursor += value.ty.pointee().size();
                    }
                    _ if !value.ty.is_unit() => {
                        self.slot_offsets.insert(*inst, cursor as i32);
                        cursor += 4;
                    }
                    _ => {}
                }
            }
        }

        if self.has_call {
            cursor += 4;
        }

        self.frame_size = align_to(cursor, FRAME_ALIGN) as i32;

        // Arguments 9 and later live in the caller's frame, right above
        // ours; they are in memory from the start
        for (index, param) in self.function.params.iter().enumerate() {
            if index >= MAX_REG_ARGS {
                self.slot_offsets
                    .insert(*param, self.frame_size + ((index - MAX_REG_ARGS) * 4) as i32);
                self.spilled.insert(*param);
            }
        }
    }

    fn ra_offset(&self) -> i32 {
        self.frame_size - 4
    }

    fn emit(&mut self, line: impl AsRef<str>) {
        self.output.push_str("    ");
        self.output.push_str(line.as_ref());
        self.output.push('\n');
    }

    fn label(&mut self, name: impl AsRef<str>) {
        self.output.push_str(name.as_ref());
        self.output.push_str(":\n");
    }

    fn run(&mut self) {
        self.emit(".text");
        self.emit(format!(".globl {}", self.function.name));
        self.label(self.function.name.value().to_string());

        self.emit_prologue();

        for (position, block_id) in self.function.layout.iter().enumerate() {
            // The entry block needs no label; nothing branches to it
            if position > 0 {
                let name = format!(".L{}", self.function.block(*block_id).name);
                self.label(name);

                // Register contents depend on which predecessor ran, so a
                // block starts with no register assumptions at all
                self.reset_registers();
            }

            for inst in &self.function.block(*block_id).insts {
                if self.options.emit_comments {
                    let comment =
                        crate::middle::ir::text::render_inst(self.program, self.function, *inst);
                    self.emit(format!("# {comment}"));
                }

                self.emit_inst(*inst);
            }
        }
    }

    fn emit_prologue(&mut self) {
        if self.frame_size > 0 {
            if imm12_fits(-self.frame_size) {
                self.emit(format!("addi sp, sp, -{}", self.frame_size));
            } else {
                // The frame adjustment exceeds the immediate range, so it
                // is synthesized through a scratch register; the bank is
                // untouched this early
                self.emit(format!("li t0, {}", self.frame_size));
                self.emit("sub sp, sp, t0");
            }
        }

        if self.has_call {
            let offset = self.ra_offset();

            if imm12_fits(offset) {
                self.emit(format!("sw ra, {offset}(sp)"));
            } else {
                self.emit(format!("li t0, {offset}"));
                self.emit("add t0, t0, sp");
                self.emit("sw ra, 0(t0)");
            }
        }

        // Incoming register parameters start out cached in their argument
        // registers; they are copied into local storage by the stores the
        // lowering emitted at the top of the entry block, and the raw
        // registers are scratch from then on
        for (index, param) in self.function.params.iter().enumerate() {
            if index < MAX_REG_ARGS {
                self.set_cached(ARG_REGS[index], *param);
            }
        }
    }

    fn emit_epilogue(&mut self) {
        if self.has_call {
            let offset = self.ra_offset();

            if imm12_fits(offset) {
                self.emit(format!("lw ra, {offset}(sp)"));
            } else {
                // Every value is dead at a return, so t0 is usable as the
                // address scratch
                self.emit(format!("li t0, {offset}"));
                self.emit("add t0, t0, sp");
                self.emit("lw ra, 0(t0)");
            }
        }

        if self.frame_size > 0 {
            if imm12_fits(self.frame_size) {
                self.emit(format!("addi sp, sp, {}", self.frame_size));
            } else {
                self.emit(format!("li t0, {}", self.frame_size));
                self.emit("add sp, sp, t0");
            }
        }

        self.emit("ret");
    }

    /* Register bank */

    fn set_cached(&mut self, reg: Reg, value: ValueId) {
        let index = bank_index(reg).expect("only bank registers cache values");

        self.regs[index] = RegState::Cached {
            value,
            since: self.tick,
        };
        self.tick += 1;
        self.reg_of.insert(value, reg);
    }

    fn pin(&mut self, reg: Reg) {
        let Some(index) = bank_index(reg) else {
            // x0 is not in the bank and needs no protection
            return;
        };

        if let RegState::Cached { value, .. } = self.regs[index] {
            self.regs[index] = RegState::Pinned { value };
        }
    }

    fn unpin(&mut self, reg: Reg) {
        let Some(index) = bank_index(reg) else {
            return;
        };

        if let RegState::Pinned { value } = self.regs[index] {
            self.regs[index] = RegState::Cached {
                value,
                since: self.tick,
            };
            self.tick += 1;
        }
    }

    /// Writes a cached value back to its slot if the slot does not hold
    /// it yet. Values without slots (integer literals, allocs, global
    /// references) are rematerialized on their next read instead.
    fn evict(&mut self, index: usize) {
        let value = match self.regs[index] {
            RegState::Cached { value, .. } | RegState::Pinned { value } => value,
            RegState::Free => return,
        };

        let reg = BANK[index];

        if let Some(slot) = self.slot_offsets.get(&value).copied() {
            if !self.spilled.contains(&value) {
                self.store_to_frame(reg, slot);
                self.spilled.insert(value);
            }
        }

        self.regs[index] = RegState::Free;
        self.reg_of.remove(&value);
    }

    /// Finds a register to hold a new value: a free register if any, else
    /// the oldest cached register (spilling its value), else one of the
    /// explicitly permitted pinned registers. The pinned escape hatch is
    /// used only for a binary operation's destination, which may
    /// overwrite an operand register after both operands are read.
    fn acquire(&mut self, may_evict_pinned: &[Reg]) -> Reg {
        if let Some(index) = self.regs.iter().position(|state| *state == RegState::Free) {
            return BANK[index];
        }

        let oldest_cached = self
            .regs
            .iter()
            .enumerate()
            .filter_map(|(index, state)| match state {
                RegState::Cached { since, .. } => Some((index, *since)),
                _ => None,
            })
            .min_by_key(|(_, since)| *since);

        if let Some((index, _)) = oldest_cached {
            self.evict(index);
            return BANK[index];
        }

        for reg in may_evict_pinned {
            if let Some(index) = bank_index(*reg) {
                self.evict(index);
                return BANK[index];
            }
        }

        unreachable!("register bank exhausted with no eviction permitted")
    }

    /// Flushes every cached register to memory; emitted before each
    /// control transfer so values cross block boundaries through their
    /// slots
    fn spill_all(&mut self) {
        for index in 0..BANK.len() {
            debug_assert!(
                !matches!(self.regs[index], RegState::Pinned { .. }),
                "a register was left pinned at a flush point"
            );

            self.evict(index);
        }
    }

    /// Forgets every register assignment without touching memory; used at
    /// block entry, where register contents are unknown
    fn reset_registers(&mut self) {
        self.regs = [RegState::Free; BANK.len()];
        self.reg_of.clear();
    }

    fn scan_free_reg(&self, exclude: Reg) -> Option<Reg> {
        self.regs
            .iter()
            .enumerate()
            .find(|(index, state)| **state == RegState::Free && BANK[*index] != exclude)
            .map(|(index, _)| BANK[index])
    }

    /* Frame access with immediate-range handling */

    fn store_to_frame(&mut self, src: Reg, offset: i32) {
        if imm12_fits(offset) {
            self.emit(format!("sw {src}, {offset}(sp)"));
        } else if let Some(scratch) = self.scan_free_reg(src) {
            self.emit(format!("li {scratch}, {offset}"));
            self.emit(format!("add {scratch}, {scratch}, sp"));
            self.emit(format!("sw {src}, 0({scratch})"));
        } else {
            self.frame_access_by_stepping(offset, |codegen, reachable| {
                codegen.emit(format!("sw {src}, {reachable}(sp)"));
            });
        }
    }

    fn load_from_frame(&mut self, dst: Reg, offset: i32) {
        if imm12_fits(offset) {
            self.emit(format!("lw {dst}, {offset}(sp)"));
        } else {
            // The destination doubles as the address scratch
            self.emit(format!("li {dst}, {offset}"));
            self.emit(format!("add {dst}, {dst}, sp"));
            self.emit(format!("lw {dst}, 0({dst})"));
        }
    }

    /// Last-resort frame access when the offset is out of range and no
    /// register is free: walk sp forward in encodable steps, access, and
    /// walk it back
    fn frame_access_by_stepping(&mut self, offset: i32, access: impl FnOnce(&mut Self, i32)) {
        let mut moved = 0;

        while !imm12_fits(offset - moved) {
            let step = IMM12_MAX.min(offset - moved);
            self.emit(format!("addi sp, sp, {step}"));
            moved += step;
        }

        access(self, offset - moved);

        while moved > 0 {
            let step = IMM12_MAX.min(moved);
            self.emit(format!("addi sp, sp, -{step}"));
            moved -= step;
        }
    }

    /// Materializes the address `sp + offset` into `dst`
    fn frame_address(&mut self, dst: Reg, offset: i32) {
        if imm12_fits(offset) {
            self.emit(format!("addi {dst}, sp, {offset}"));
        } else {
            self.emit(format!("li {dst}, {offset}"));
            self.emit(format!("add {dst}, {dst}, sp"));
        }
    }

    /* Value access */

    /// Brings a value into a register, reusing a live register when the
    /// value has one and re-validating it from its slot (or
    /// rematerializing it) when it does not
    fn read_value(&mut self, value: ValueId) -> Reg {
        if let Some(reg) = self.reg_of.get(&value).copied() {
            return reg;
        }

        match &self.function.value(value).kind {
            ValueKind::Integer(0) => Reg::X0,
            ValueKind::Integer(literal) => {
                let literal = *literal;
                let reg = self.acquire(&[]);
                self.emit(format!("li {reg}, {literal}"));
                self.set_cached(reg, value);
                reg
            }
            ValueKind::Alloc => {
                let offset = self.storage_offsets[&value];
                let reg = self.acquire(&[]);
                self.frame_address(reg, offset);
                self.set_cached(reg, value);
                reg
            }
            ValueKind::GlobalRef(global) => {
                let name = self.program.globals[*global].name;
                let reg = self.acquire(&[]);
                self.emit(format!("la {reg}, {name}"));
                self.set_cached(reg, value);
                reg
            }
            _ => {
                debug_assert!(
                    self.spilled.contains(&value),
                    "a value was read before it was computed or spilled"
                );

                let slot = self.slot_offsets[&value];
                let reg = self.acquire(&[]);
                self.load_from_frame(reg, slot);
                self.set_cached(reg, value);
                reg
            }
        }
    }

    /* Instruction selection */

    fn emit_inst(&mut self, inst: ValueId) {
        let value = self.function.value(inst);

        match &value.kind {
            // The storage was laid out with the frame; the address is
            // materialized on demand at each use
            ValueKind::Alloc => {}
            ValueKind::Load { source } => self.emit_load(inst, *source),
            ValueKind::Store { value, target } => self.emit_store(*value, *target),
            ValueKind::Binary { op, lhs, rhs } => self.emit_binary(inst, *op, *lhs, *rhs),
            ValueKind::Branch {
                condition,
                then_block,
                else_block,
            } => {
                let condition = self.read_value(*condition);
                self.spill_all();

                let then_name = self.function.block(*then_block).name.clone();
                let else_name = self.function.block(*else_block).name.clone();
                self.emit(format!("bnez {condition}, .L{then_name}"));
                self.emit(format!("j .L{else_name}"));
            }
            ValueKind::Jump { target } => {
                self.spill_all();

                let name = self.function.block(*target).name.clone();
                self.emit(format!("j .L{name}"));
            }
            ValueKind::Call { callee, arguments } => self.emit_call(inst, *callee, arguments),
            ValueKind::GetElemPtr { source, index } => {
                let stride = match self.function.value(*source).ty.pointee() {
                    Type::Array(element, _) => element.size(),
                    other => unreachable!("getelemptr through non-array type {other:?}"),
                };

                self.emit_address_step(inst, *source, *index, stride);
            }
            ValueKind::GetPtr { source, index } => {
                let stride = self.function.value(*source).ty.pointee().size();
                self.emit_address_step(inst, *source, *index, stride);
            }
            ValueKind::Return { value } => {
                if let Some(value) = value {
                    let reg = self.read_value(*value);

                    if reg != Reg::A0 {
                        self.emit(format!("mv a0, {reg}"));
                    }
                }

                // Every value is dead past this point; nothing to flush
                self.emit_epilogue();
            }
            ValueKind::Integer(_) | ValueKind::FuncArgRef(_) | ValueKind::GlobalRef(_) => {
                unreachable!("inline values are never instructions")
            }
        }
    }

    fn emit_load(&mut self, inst: ValueId, source: ValueId) {
        match &self.function.value(source).kind {
            // Loading straight through an alloc or global skips the
            // address materialization
            ValueKind::Alloc => {
                let offset = self.storage_offsets[&source];
                let dst = self.acquire(&[]);
                self.load_from_frame(dst, offset);
                self.set_cached(dst, inst);
            }
            ValueKind::GlobalRef(global) => {
                let name = self.program.globals[*global].name;
                let dst = self.acquire(&[]);
                self.emit(format!("la {dst}, {name}"));
                self.emit(format!("lw {dst}, 0({dst})"));
                self.set_cached(dst, inst);
            }
            _ => {
                let address = self.read_value(source);
                self.pin(address);

                let dst = self.acquire(&[]);
                self.emit(format!("lw {dst}, 0({address})"));

                self.unpin(address);
                self.set_cached(dst, inst);
            }
        }
    }

    fn emit_store(&mut self, value: ValueId, target: ValueId) {
        let src = self.read_value(value);
        self.pin(src);

        match &self.function.value(target).kind {
            ValueKind::Alloc => {
                let offset = self.storage_offsets[&target];
                self.store_to_frame(src, offset);
            }
            ValueKind::GlobalRef(global) => {
                let name = self.program.globals[*global].name;
                let scratch = self.acquire(&[]);
                self.emit(format!("la {scratch}, {name}"));
                self.emit(format!("sw {src}, 0({scratch})"));
            }
            _ => {
                let address = self.read_value(target);
                self.emit(format!("sw {src}, 0({address})"));
            }
        }

        self.unpin(src);
    }

    fn emit_binary(&mut self, inst: ValueId, op: BinaryOp, lhs: ValueId, rhs: ValueId) {
        // Each operand register is pinned while the other operand is
        // brought in, so neither can be evicted out from under the
        // operation
        let lhs = self.read_value(lhs);
        self.pin(lhs);

        let rhs = self.read_value(rhs);
        self.pin(rhs);

        // The destination may reuse an operand register; both operands
        // are consumed by the single instruction sequence below
        let dst = self.acquire(&[lhs, rhs]);

        match op {
            BinaryOp::Add => self.emit(format!("add {dst}, {lhs}, {rhs}")),
            BinaryOp::Sub => self.emit(format!("sub {dst}, {lhs}, {rhs}")),
            BinaryOp::Mul => self.emit(format!("mul {dst}, {lhs}, {rhs}")),
            BinaryOp::Div => self.emit(format!("div {dst}, {lhs}, {rhs}")),
            BinaryOp::Mod => self.emit(format!("rem {dst}, {lhs}, {rhs}")),
            BinaryOp::And => self.emit(format!("and {dst}, {lhs}, {rhs}")),
            BinaryOp::Or => self.emit(format!("or {dst}, {lhs}, {rhs}")),
            BinaryOp::Lt => self.emit(format!("slt {dst}, {lhs}, {rhs}")),
            BinaryOp::Gt => self.emit(format!("sgt {dst}, {lhs}, {rhs}")),
            BinaryOp::Le => {
                self.emit(format!("sgt {dst}, {lhs}, {rhs}"));
                self.emit(format!("seqz {dst}, {dst}"));
            }
            BinaryOp::Ge => {
                self.emit(format!("slt {dst}, {lhs}, {rhs}"));
                self.emit(format!("seqz {dst}, {dst}"));
            }
            BinaryOp::Eq => {
                self.emit(format!("xor {dst}, {lhs}, {rhs}"));
                self.emit(format!("seqz {dst}, {dst}"));
            }
            BinaryOp::NotEq => {
                self.emit(format!("xor {dst}, {lhs}, {rhs}"));
                self.emit(format!("snez {dst}, {dst}"));
            }
        }

        self.unpin(lhs);
        self.unpin(rhs);
        self.set_cached(dst, inst);
    }

    /// Computes `dst = source + index * stride` for the two address
    /// instructions, folding constant indices into an immediate offset
    /// when the result is encodable
    fn emit_address_step(&mut self, inst: ValueId, source: ValueId, index: ValueId, stride: usize) {
        if let ValueKind::Integer(literal) = self.function.value(index).kind {
            let offset = literal.wrapping_mul(stride as i32);

            let src = self.read_value(source);
            self.pin(src);
            let dst = self.acquire(&[]);

            if imm12_fits(offset) {
                self.emit(format!("addi {dst}, {src}, {offset}"));
            } else {
                self.emit(format!("li {dst}, {offset}"));
                self.emit(format!("add {dst}, {src}, {dst}"));
            }

            self.unpin(src);
            self.set_cached(dst, inst);
            return;
        }

        let src = self.read_value(source);
        self.pin(src);

        let idx = self.read_value(index);
        self.pin(idx);

        // The li-then-mul sequence reads both operands after writing the
        // destination, so the destination must be a third register here
        let dst = self.acquire(&[]);
        self.emit(format!("li {dst}, {stride}"));
        self.emit(format!("mul {dst}, {idx}, {dst}"));
        self.emit(format!("add {dst}, {src}, {dst}"));

        self.unpin(src);
        self.unpin(idx);
        self.set_cached(dst, inst);
    }

    fn emit_call(&mut self, inst: ValueId, callee: ir::FunctionId, arguments: &[ValueId]) {
        // Every live value goes to memory: all bank registers are
        // caller-saved and the argument registers are about to be staged
        self.spill_all();

        // Arguments beyond the register count go into the outgoing area
        // at the bottom of our frame, which is offset 0 from the callee's
        // point of view of its incoming stack arguments
        for (index, argument) in arguments.iter().enumerate().skip(MAX_REG_ARGS) {
            self.materialize_into(Reg::T0, *argument);
            self.emit(format!("sw t0, {}(sp)", (index - MAX_REG_ARGS) * 4));
        }

        for (index, argument) in arguments.iter().enumerate().take(MAX_REG_ARGS) {
            self.materialize_into(ARG_REGS[index], *argument);
        }

        let callee = &self.program.functions[callee];
        self.emit(format!("call {}", callee.name));

        // Nothing survives the call in registers
        self.reset_registers();

        if !self.function.value(inst).ty.is_unit() {
            self.set_cached(Reg::A0, inst);
        }
    }

    /// Loads a value into a specific register without going through the
    /// allocator; only valid right after `spill_all`, when every value is
    /// recoverable from memory or rematerializable
    fn materialize_into(&mut self, dst: Reg, value: ValueId) {
        match &self.function.value(value).kind {
            ValueKind::Integer(literal) => {
                let literal = *literal;
                self.emit(format!("li {dst}, {literal}"));
            }
            ValueKind::Alloc => {
                let offset = self.storage_offsets[&value];
                self.frame_address(dst, offset);
            }
            ValueKind::GlobalRef(global) => {
                let name = self.program.globals[*global].name;
                self.emit(format!("la {dst}, {name}"));
            }
            _ => {
                let slot = self.slot_offsets[&value];
                self.load_from_frame(dst, slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_range_bounds_are_inclusive() {
        assert!(imm12_fits(IMM12_MIN));
        assert!(imm12_fits(IMM12_MAX));
        assert!(!imm12_fits(IMM12_MAX + 1));
        assert!(!imm12_fits(IMM12_MIN - 1));
        assert!(imm12_fits(0));
    }

    #[test]
    fn zero_runs_compress_back_into_zero_directives() {
        let mut output = String::new();
        emit_words(&mut output, &[0, 0, 0, 5, 0, 0, 7]);

        assert_eq!(
            output,
            "    .zero 12\n    .word 5\n    .zero 8\n    .word 7\n"
        );
    }

    #[test]
    fn frames_round_up_to_the_alignment_boundary() {
        assert_eq!(align_to(0, FRAME_ALIGN), 0);
        assert_eq!(align_to(4, FRAME_ALIGN), 16);
        assert_eq!(align_to(16, FRAME_ALIGN), 16);
        assert_eq!(align_to(20, FRAME_ALIGN), 32);
    }

    #[test]
    fn register_names_render_lowercase() {
        assert_eq!(Reg::T0.to_string(), "t0");
        assert_eq!(Reg::A7.to_string(), "a7");
        assert_eq!(Reg::X0.to_string(), "x0");
    }
}
