//! Lowers an AST into the `_start` instruction stream plus generated
//! zero-division and input-interrupt service routines, then lays out and
//! renders the image.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::isa::registers::{self, Register, TEMPORARIES};
use crate::isa::Mnemonic::{
    Add, Addi, And, Cmp, Div, Halt, Jo, Jz, Lli, Lui, Lw, Lwr, Mul, Mv, Neg, Not, Or, Rem, Reti, Seteq, Setge,
    Setle, Setne, Setsg, Setsl, Shl, Shr, Sub, Sw, Swr,
};
use crate::parser::ast::{BinaryOp, DataType, Expression, Program, Statement, UnaryOp};
use crate::word::Word;

use super::lazy::{LazyInstruction, Operand};
use super::memory_manager::{MemoryManager, VarValue, INPUT_ADDR, OUTPUT_ADDR, PROGRAM_START_ADDR};
use super::register_manager::RegisterManager;
use super::{Image, TranslateError};

/// Where a bound variable's word lives: a dedicated saved register, or a
/// data-memory slot resolved once layout has run.
#[derive(Debug, Clone, Copy)]
enum SymbolLoc {
    Reg(Register),
    Mem,
}

/// Where a string constant's bytes (or a computed result) live, for operands
/// that are not already sitting in a register.
#[derive(Debug, Clone)]
enum MemRef {
    Variable(String),
    Constant(String),
}

/// The outcome of evaluating an expression: either a register already
/// holding the result, or a memory location that still needs loading.
#[derive(Debug, Clone)]
enum Value {
    Reg(Register),
    Mem(MemRef),
}

#[derive(Debug, Default)]
struct LoopFrame {
    continue_targets: Vec<(usize, Rc<Cell<Option<i32>>>)>,
    break_targets: Vec<(usize, Rc<Cell<Option<i32>>>)>,
}

/// Walks a parsed program, emitting `_start`'s instructions and a generated
/// input ISR, and owns the memory/register allocators used along the way.
pub(super) struct Translator {
    memory: MemoryManager,
    registers: RegisterManager,
    symbols: HashMap<String, (SymbolLoc, DataType)>,
    start: Vec<LazyInstruction>,
    loop_stack: Vec<LoopFrame>,
    input_buf_count: u32,
}

impl Translator {
    pub fn new() -> Self {
        Self {
            memory: MemoryManager::new(),
            registers: RegisterManager::new(),
            symbols: HashMap::new(),
            start: Vec::new(),
            loop_stack: Vec::new(),
            input_buf_count: 0,
        }
    }

    pub fn lower_program(&mut self, program: &Program) -> Result<(), TranslateError> {
        for stmt in &program.statements {
            self.lower_statement(stmt)?;
            debug_assert!(
                self.registers.temporaries_are_free(),
                "every temporary must be freed once a top-level statement is fully lowered"
            );
        }
        self.push(Halt, vec![]);
        Ok(())
    }

    pub fn finish(mut self) -> Result<Image, TranslateError> {
        self.memory.layout()?;

        let zero_div_isr = Self::build_zero_division_isr();
        // Each section is spaced from the next by `len(instructions) + 1`
        // words, not placed flush against it.
        let zero_div_addr = PROGRAM_START_ADDR + (self.start.len() as u32 + 1) * 4;

        let input_isr = self.build_input_isr();
        let input_isr_addr = zero_div_addr + (zero_div_isr.len() as u32 + 1) * 4;
        let image_len = input_isr_addr as usize + input_isr.len() * 4;

        let mut bytes = vec![0u8; image_len];
        let mut disassembly = String::new();

        for (slot, addr) in [(0u32, zero_div_addr), (15u32, input_isr_addr)] {
            let offset = (slot * 4) as usize;
            bytes[offset..offset + 4].copy_from_slice(&Word::from_bits(addr).to_be_bytes());
        }
        {
            let offset = super::memory_manager::INPUT_PORT_WORD_ADDR as usize;
            bytes[offset..offset + 4].copy_from_slice(&Word::from_integer(INPUT_ADDR as i32).to_be_bytes());
            let offset = super::memory_manager::OUTPUT_PORT_WORD_ADDR as usize;
            bytes[offset..offset + 4].copy_from_slice(&Word::from_integer(OUTPUT_ADDR as i32).to_be_bytes());
            let offset = self.memory.io_data_addr() as usize;
            bytes[offset..offset + 4].copy_from_slice(&Word::from_bits(self.memory.io_buffer_addr()).to_be_bytes());
            let offset = self.memory.io_data_read_addr() as usize;
            bytes[offset..offset + 4].copy_from_slice(&Word::from_bits(self.memory.io_buffer_addr()).to_be_bytes());
        }

        for (addr, value) in self.memory.data_words_in_layout_order() {
            let mut word_addr = addr as usize;
            for word in super::word_vec_from_value(value) {
                bytes[word_addr..word_addr + 4].copy_from_slice(&word.to_be_bytes());
                word_addr += 4;
            }
        }

        self.render_section(&self.start, PROGRAM_START_ADDR, &mut bytes, &mut disassembly)?;
        self.render_section(&zero_div_isr, zero_div_addr, &mut bytes, &mut disassembly)?;
        self.render_section(&input_isr, input_isr_addr, &mut bytes, &mut disassembly)?;

        Ok(Image { bytes, disassembly })
    }

    /// The default `ZERO_DIVISION` handler: nothing to recover, so it just
    /// returns, leaving the divide's destination register unwritten.
    fn build_zero_division_isr() -> Vec<LazyInstruction> {
        vec![LazyInstruction::new(Reti, vec![])]
    }

    fn render_section(
        &self,
        instructions: &[LazyInstruction],
        base_addr: u32,
        bytes: &mut [u8],
        disassembly: &mut String,
    ) -> Result<(), TranslateError> {
        let mut addr = base_addr;
        for lazy in instructions {
            let inst = lazy.realize(&self.memory)?;
            disassembly.push_str(&format!("{addr:#06x}  {}\n", inst.disassemble()));
            let word = inst.bits()?;
            let offset = addr as usize;
            bytes[offset..offset + 4].copy_from_slice(&word.to_be_bytes());
            addr += 4;
        }
        Ok(())
    }

    fn push(&mut self, op: crate::isa::Mnemonic, args: Vec<Operand>) {
        self.start.push(LazyInstruction::new(op, args));
    }

    fn take_scratch(&mut self, fallback: Register) -> Register {
        self.registers.take_temporary("__scratch").unwrap_or(fallback)
    }

    fn free_scratch(&mut self, reg: Register) {
        if TEMPORARIES.contains(&reg) {
            let _ = self.registers.free(reg);
        }
    }

    fn emit_load_immediate(&mut self, reg: Register, operand: Operand) {
        self.push(Lli, vec![Operand::Register(reg), Operand::Lo16(Box::new(operand.clone()))]);
        self.push(Lui, vec![Operand::Register(reg), Operand::Hi16(Box::new(operand))]);
    }

    /// The input ISR owns only the write cursor (`io_data_addr`): it stashes
    /// the freshly arrived character at the next free slot and advances that
    /// cursor past it. It never touches `io_data_read_addr` — consuming a
    /// word and advancing the read cursor is `eval_input`'s job, not the
    /// producer's.
    #[allow(clippy::unused_self)]
    fn build_input_isr(&self) -> Vec<LazyInstruction> {
        let data = registers::INTERRUPT_TEMP_1;
        let cursor = registers::INTERRUPT_TEMP_2;
        vec![
            LazyInstruction::new(Lw, vec![Operand::Register(cursor), Operand::IoDataAddr]),
            LazyInstruction::new(Lw, vec![Operand::Register(data), Operand::Immediate(INPUT_ADDR as i32)]),
            LazyInstruction::new(Swr, vec![Operand::Register(data), Operand::Register(cursor)]),
            LazyInstruction::new(Addi, vec![Operand::Register(cursor), Operand::Immediate(4)]),
            LazyInstruction::new(Sw, vec![Operand::Register(cursor), Operand::IoDataAddr]),
            LazyInstruction::new(Reti, vec![]),
        ]
    }

    // -- statements ----------------------------------------------------

    fn lower_statement(&mut self, stmt: &Statement) -> Result<(), TranslateError> {
        match stmt {
            Statement::VarDef { name, ty, value, .. } => self.lower_var_def(name, *ty, value),
            Statement::Assign { name, value, .. } => self.lower_assign(name, value),
            Statement::Print { value, .. } => self.lower_print(value),
            Statement::If { branches, else_body, .. } => self.lower_if(branches, else_body),
            Statement::For { init, cond, step, body, .. } => self.lower_for(init, cond, step, body),
            Statement::Break(_) => self.lower_break(),
            Statement::Continue(_) => self.lower_continue(),
            Statement::Return(_, _) => Err(TranslateError::UnsupportedConstruct("return".to_string())),
            Statement::FunctionDef { name, .. } => {
                Err(TranslateError::UnsupportedConstruct(format!("function `{name}`")))
            }
            Statement::Expr(expr, _) => {
                let (value, _ty) = self.eval_expression(expr)?;
                if let Value::Reg(r) = value {
                    self.free_scratch(r);
                }
                Ok(())
            }
        }
    }

    fn lower_var_def(&mut self, name: &str, ty: DataType, value_expr: &Expression) -> Result<(), TranslateError> {
        if self.symbols.contains_key(name) {
            return Err(TranslateError::VariableAlreadyDeclared(name.to_string()));
        }
        match ty {
            DataType::Void => Err(TranslateError::UnsupportedConstruct("a `void` variable".to_string())),
            DataType::Int => {
                let (value, _vty) = self.eval_expression(value_expr)?;
                let reg = self.to_register(value, DataType::Int, registers::LOAD_TEMP_1)?;
                match self.registers.take_saved(name) {
                    Ok(saved) => {
                        if reg != saved {
                            self.push(Mv, vec![Operand::Register(saved), Operand::Register(reg)]);
                        }
                        self.free_scratch(reg);
                        self.symbols.insert(name.to_string(), (SymbolLoc::Reg(saved), DataType::Int));
                    }
                    Err(_) => {
                        self.memory.declare_variable(name, VarValue::Int(0))?;
                        self.push(Sw, vec![Operand::Register(reg), var_ref(name)]);
                        self.free_scratch(reg);
                        self.symbols.insert(name.to_string(), (SymbolLoc::Mem, DataType::Int));
                    }
                }
                Ok(())
            }
            DataType::Str => {
                let (value, _vty) = self.eval_expression(value_expr)?;
                let reg = self.to_register(value, DataType::Str, registers::LOAD_TEMP_1)?;
                self.memory.declare_variable(name, VarValue::Int(0))?;
                self.push(Sw, vec![Operand::Register(reg), var_ref(name)]);
                self.free_scratch(reg);
                self.symbols.insert(name.to_string(), (SymbolLoc::Mem, DataType::Str));
                Ok(())
            }
        }
    }

    fn lower_assign(&mut self, name: &str, value_expr: &Expression) -> Result<(), TranslateError> {
        let (loc, ty) = self
            .symbols
            .get(name)
            .copied()
            .map(|(loc, ty)| (loc, ty))
            .ok_or_else(|| TranslateError::UnknownVariable(name.to_string()))?;
        let (value, _vty) = self.eval_expression(value_expr)?;
        let src = self.to_register(value, ty, registers::LOAD_TEMP_1)?;
        match loc {
            SymbolLoc::Reg(dest) => {
                if src != dest {
                    self.push(Mv, vec![Operand::Register(dest), Operand::Register(src)]);
                }
            }
            SymbolLoc::Mem => {
                self.push(Sw, vec![Operand::Register(src), var_ref(name)]);
            }
        }
        self.free_scratch(src);
        Ok(())
    }

    fn lower_print(&mut self, expr: &Expression) -> Result<(), TranslateError> {
        let (value, ty) = self.eval_expression(expr)?;
        match ty {
            DataType::Str => self.lower_print_string(value),
            DataType::Int | DataType::Void => self.lower_print_int(value),
        }
    }

    fn lower_print_int(&mut self, value: Value) -> Result<(), TranslateError> {
        let reg = self.to_register(value, DataType::Int, registers::LOAD_TEMP_1)?;
        self.push(Sw, vec![Operand::Register(reg), Operand::Immediate(OUTPUT_ADDR as i32)]);
        self.free_scratch(reg);
        Ok(())
    }

    /// Walks a NUL-terminated word string pointed to by `value`, writing each
    /// character to the output port: `LWR, ADDI 0, JZ, SW, ADDI 4, JO`.
    fn lower_print_string(&mut self, value: Value) -> Result<(), TranslateError> {
        let ptr = self.to_register(value, DataType::Str, registers::LOAD_TEMP_1)?;
        let ch = self.take_scratch(registers::LOAD_TEMP_2);

        let loop_start = self.start.len();
        self.push(Lwr, vec![Operand::Register(ch), Operand::Register(ptr)]);
        self.push(Addi, vec![Operand::Register(ch), Operand::Immediate(0)]);

        let (skip_operand, skip_cell) = Operand::new_offset();
        let skip_index = self.start.len();
        self.push(Jz, vec![skip_operand]);

        self.push(Sw, vec![Operand::Register(ch), Operand::Immediate(OUTPUT_ADDR as i32)]);
        self.push(Addi, vec![Operand::Register(ptr), Operand::Immediate(4)]);

        let back_index = self.start.len();
        self.push(Jo, vec![Operand::Immediate(backward_offset(loop_start, back_index))]);

        let end_index = self.start.len();
        skip_cell.set(Some(forward_offset(skip_index, end_index)));

        self.free_scratch(ch);
        self.free_scratch(ptr);
        Ok(())
    }

    fn lower_if(
        &mut self,
        branches: &[(Expression, Vec<Statement>)],
        else_body: &Option<Vec<Statement>>,
    ) -> Result<(), TranslateError> {
        let mut pending_end = Vec::new();
        let n = branches.len();

        for (i, (cond, body)) in branches.iter().enumerate() {
            self.lower_condition(cond)?;

            let (skip_operand, skip_cell) = Operand::new_offset();
            let skip_index = self.start.len();
            self.push(Jz, vec![skip_operand]);

            for stmt in body {
                self.lower_statement(stmt)?;
            }

            let has_more = i + 1 < n || else_body.is_some();
            if has_more {
                let (end_operand, end_cell) = Operand::new_offset();
                let jo_index = self.start.len();
                self.push(Jo, vec![end_operand]);
                pending_end.push((jo_index, end_cell));
            }

            let after = self.start.len();
            skip_cell.set(Some(forward_offset(skip_index, after)));
        }

        if let Some(body) = else_body {
            for stmt in body {
                self.lower_statement(stmt)?;
            }
        }

        let end_index = self.start.len();
        for (jo_index, cell) in pending_end {
            cell.set(Some(forward_offset(jo_index, end_index)));
        }
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: &Statement,
        cond: &Expression,
        step: &Statement,
        body: &[Statement],
    ) -> Result<(), TranslateError> {
        self.lower_statement(init)?;

        let cond_index = self.start.len();
        self.lower_condition(cond)?;

        let (skip_operand, skip_cell) = Operand::new_offset();
        let skip_index = self.start.len();
        self.push(Jz, vec![skip_operand]);

        self.loop_stack.push(LoopFrame::default());
        for stmt in body {
            self.lower_statement(stmt)?;
        }

        let step_index = self.start.len();
        self.lower_statement(step)?;

        let back_index = self.start.len();
        self.push(Jo, vec![Operand::Immediate(backward_offset(cond_index, back_index))]);

        let end_index = self.start.len();
        skip_cell.set(Some(forward_offset(skip_index, end_index)));

        let frame = self.loop_stack.pop().expect("pushed above");
        for (idx, cell) in frame.continue_targets {
            cell.set(Some(signed_delta(idx, step_index)));
        }
        for (idx, cell) in frame.break_targets {
            cell.set(Some(signed_delta(idx, end_index)));
        }
        Ok(())
    }

    fn lower_break(&mut self) -> Result<(), TranslateError> {
        if self.loop_stack.is_empty() {
            return Err(TranslateError::NotInLoop("break"));
        }
        let (operand, cell) = Operand::new_offset();
        let idx = self.start.len();
        self.push(Jo, vec![operand]);
        self.loop_stack.last_mut().expect("checked above").break_targets.push((idx, cell));
        Ok(())
    }

    fn lower_continue(&mut self) -> Result<(), TranslateError> {
        if self.loop_stack.is_empty() {
            return Err(TranslateError::NotInLoop("continue"));
        }
        let (operand, cell) = Operand::new_offset();
        let idx = self.start.len();
        self.push(Jo, vec![operand]);
        self.loop_stack.last_mut().expect("checked above").continue_targets.push((idx, cell));
        Ok(())
    }

    /// Evaluates `cond`, then runs `ADDI reg, 0` purely to set `Z` from
    /// whether the result is zero, leaving flags ready for a following
    /// `JZ`/`JNZ`.
    fn lower_condition(&mut self, cond: &Expression) -> Result<(), TranslateError> {
        let (value, _ty) = self.eval_expression(cond)?;
        let reg = self.to_register(value, DataType::Int, registers::LOAD_TEMP_1)?;
        self.push(Addi, vec![Operand::Register(reg), Operand::Immediate(0)]);
        self.free_scratch(reg);
        Ok(())
    }

    // -- expressions -----------------------------------------------------

    fn eval_expression(&mut self, expr: &Expression) -> Result<(Value, DataType), TranslateError> {
        match expr {
            Expression::Number(n, _) => self.eval_number(*n as i32),
            Expression::Str(s, _) => {
                let label = self.memory.pool_string_constant(s);
                Ok((Value::Mem(MemRef::Constant(label)), DataType::Str))
            }
            Expression::Var(name, _) => {
                let (loc, ty) = self
                    .symbols
                    .get(name)
                    .copied()
                    .ok_or_else(|| TranslateError::UnknownVariable(name.clone()))?;
                match loc {
                    SymbolLoc::Reg(r) => Ok((Value::Reg(r), ty)),
                    SymbolLoc::Mem => Ok((Value::Mem(MemRef::Variable(name.clone())), ty)),
                }
            }
            Expression::Unary { op, expr, .. } => self.eval_unary(*op, expr),
            Expression::Binary { op, lhs, rhs, .. } => self.eval_binary(*op, lhs, rhs),
            Expression::Input { count, .. } => self.eval_input(count.as_deref()),
            Expression::Call { name, .. } => {
                Err(TranslateError::UnsupportedConstruct(format!("function call `{name}`")))
            }
        }
    }

    fn eval_number(&mut self, value: i32) -> Result<(Value, DataType), TranslateError> {
        if let Ok(reg) = self.registers.take_temporary("__literal") {
            self.emit_load_immediate(reg, Operand::Immediate(value));
            Ok((Value::Reg(reg), DataType::Int))
        } else {
            let label = self.memory.pool_int_constant(value);
            Ok((Value::Mem(MemRef::Constant(label)), DataType::Int))
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, expr: &Expression) -> Result<(Value, DataType), TranslateError> {
        let (value, _ty) = self.eval_expression(expr)?;
        let src = self.to_register(value, DataType::Int, registers::LOAD_TEMP_1)?;
        let dst = if TEMPORARIES.contains(&src) { src } else { self.take_scratch(registers::LOAD_TEMP_1) };
        let mnemonic = match op {
            UnaryOp::Neg => Neg,
            UnaryOp::Not => Not,
        };
        self.push(mnemonic, vec![Operand::Register(dst), Operand::Register(src)]);
        if src != dst {
            self.free_scratch(src);
        }
        Ok((Value::Reg(dst), DataType::Int))
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Expression, rhs: &Expression) -> Result<(Value, DataType), TranslateError> {
        let (lval, _lty) = self.eval_expression(lhs)?;
        let rs1 = self.to_register(lval, DataType::Int, registers::LOAD_TEMP_1)?;
        let (rval, _rty) = self.eval_expression(rhs)?;
        let rs2 = self.to_register(rval, DataType::Int, registers::LOAD_TEMP_2)?;

        let rd = if TEMPORARIES.contains(&rs1) { rs1 } else { self.take_scratch(registers::LOAD_TEMP_1) };

        if op.is_comparison() {
            self.push(Cmp, vec![Operand::Register(rs1), Operand::Register(rs2)]);
            let set = match op {
                BinaryOp::Eq => Seteq,
                BinaryOp::Ne => Setne,
                BinaryOp::Ge => Setge,
                BinaryOp::Le => Setle,
                BinaryOp::Gt => Setsg,
                BinaryOp::Lt => Setsl,
                _ => unreachable!("is_comparison() guards this match"),
            };
            self.push(set, vec![Operand::Register(rd)]);
        } else {
            let arith = match op {
                BinaryOp::Add => Add,
                BinaryOp::Sub => Sub,
                BinaryOp::Mul => Mul,
                BinaryOp::Div => Div,
                BinaryOp::Rem => Rem,
                BinaryOp::Shl => Shl,
                BinaryOp::Shr => Shr,
                BinaryOp::And => And,
                BinaryOp::Or => Or,
                _ => unreachable!("is_comparison() guards the rest"),
            };
            self.push(arith, vec![Operand::Register(rd), Operand::Register(rs1), Operand::Register(rs2)]);
        }

        self.free_scratch(rs2);
        if rs1 != rd {
            self.free_scratch(rs1);
        }
        Ok((Value::Reg(rd), DataType::Int))
    }

    /// Waits for one pending input word and consumes it: spins comparing the
    /// write cursor (`io_data_addr`) against the read cursor
    /// (`io_data_read_addr`) until they differ, then reads the word at the
    /// read cursor, advances it past that word, and writes it back. Returns
    /// the register the word ends up in.
    fn emit_read_one_input_word(&mut self) -> Register {
        let written = self.take_scratch(registers::LOAD_TEMP_1);
        let read = self.take_scratch(registers::LOAD_TEMP_2);

        let spin_index = self.start.len();
        self.push(Lw, vec![Operand::Register(written), Operand::IoDataAddr]);
        self.push(Lw, vec![Operand::Register(read), Operand::IoDataReadAddr]);
        self.push(Cmp, vec![Operand::Register(written), Operand::Register(read)]);

        let back_index = self.start.len();
        self.push(Jz, vec![Operand::Immediate(backward_offset(spin_index, back_index))]);

        self.push(Lwr, vec![Operand::Register(written), Operand::Register(read)]);
        self.push(Addi, vec![Operand::Register(read), Operand::Immediate(4)]);
        self.push(Sw, vec![Operand::Register(read), Operand::IoDataReadAddr]);

        self.free_scratch(read);
        written
    }

    /// Waits for `n` more words on the input interrupt, then returns either
    /// the single word read (`count` unspecified) or the address of a fresh
    /// buffer the words were copied into in order (`count` given, a string).
    fn eval_input(&mut self, count: Option<&Expression>) -> Result<(Value, DataType), TranslateError> {
        let n = match count {
            None => 1,
            Some(Expression::Number(v, _)) => *v as i32,
            Some(_) => {
                return Err(TranslateError::UnsupportedConstruct(
                    "input() count must be a literal integer".to_string(),
                ))
            }
        };
        if n <= 0 {
            return Err(TranslateError::UnsupportedConstruct("input() count must be positive".to_string()));
        }

        if n == 1 {
            let word = self.emit_read_one_input_word();
            return Ok((Value::Reg(word), DataType::Int));
        }

        let buf_name = format!("__input_buf_{}", self.input_buf_count);
        self.input_buf_count += 1;
        // `n` NUL placeholder words plus the automatic terminator word
        // reserve exactly `n + 1` words: the `n` data words below, followed
        // by one word left zero so a later `print` of this string halts.
        self.memory.declare_variable(&buf_name, VarValue::Str("\0".repeat(n as usize)))?;

        for i in 0..n {
            let word = self.emit_read_one_input_word();
            self.push(
                Sw,
                vec![Operand::Register(word), Operand::VariableRef { name: buf_name.clone(), offset: i * 4 }],
            );
            self.free_scratch(word);
        }

        let ptr = self.take_scratch(registers::LOAD_TEMP_1);
        self.emit_load_immediate(ptr, Operand::VariableRef { name: buf_name, offset: 0 });
        Ok((Value::Reg(ptr), DataType::Str))
    }

    /// Materializes `value` into some register, loading memory-resident
    /// values as needed: a data variable's word always holds its content; a
    /// pooled string constant's *address* is the string value itself.
    fn to_register(&mut self, value: Value, ty: DataType, fallback: Register) -> Result<Register, TranslateError> {
        match value {
            Value::Reg(r) => Ok(r),
            Value::Mem(MemRef::Variable(name)) => {
                let reg = self.take_scratch(fallback);
                self.push(Lw, vec![Operand::Register(reg), var_ref(&name)]);
                Ok(reg)
            }
            Value::Mem(MemRef::Constant(label)) => {
                let reg = self.take_scratch(fallback);
                if ty == DataType::Str {
                    self.emit_load_immediate(reg, Operand::ConstantRef(label));
                } else {
                    self.push(Lw, vec![Operand::Register(reg), Operand::ConstantRef(label)]);
                }
                Ok(reg)
            }
        }
    }
}

fn var_ref(name: &str) -> Operand {
    Operand::VariableRef { name: name.to_string(), offset: 0 }
}

/// Byte offset a `JO`/`JZ`/`JNZ` at `from_index` must carry to land exactly
/// on `to_index`, given the control unit adds the offset to the already
/// incremented program counter.
fn signed_delta(from_index: usize, to_index: usize) -> i32 {
    ((to_index as i64) - (from_index as i64 + 1)) as i32 * 4
}

fn forward_offset(jump_index: usize, target_index: usize) -> i32 {
    signed_delta(jump_index, target_index)
}

fn backward_offset(target_index: usize, jump_index: usize) -> i32 {
    signed_delta(jump_index, target_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Program;
    use crate::translate::translate;
    use crate::word::Word;

    fn word_at(bytes: &[u8], addr: u32) -> u32 {
        let addr = addr as usize;
        Word::from_be_bytes(bytes[addr..addr + 4].try_into().unwrap()).as_u32()
    }

    #[test]
    fn vector_table_points_zero_division_and_input_data_at_distinct_handlers() {
        let image = translate(&Program { statements: vec![] }).unwrap();
        let bytes = image.to_bytes();

        let zero_div_target = word_at(bytes, 0);
        let input_target = word_at(bytes, 15 * 4);

        assert_ne!(zero_div_target, 0, "ZERO_DIVISION must not point back at the vector table itself");
        assert_ne!(zero_div_target, input_target);
        assert!(zero_div_target >= PROGRAM_START_ADDR);
        assert!(input_target > zero_div_target);
    }
}
