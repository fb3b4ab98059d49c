#![allow(dead_code)]

use jlite::arm::{Cond, Instr, Operand, Reg};
use jlite::ast::Program;
use jlite::codegen::{DataTable, MALLOC, PRINTF, READ_BOOL, READ_INT, READ_STRING};
use jlite::emit::entry_stub;
use jlite::error::CompileError;
use jlite::lexer::lex;
use jlite::parser::parse_program;
use jlite::pipeline::{analyze, compile, Compilation};
use jlite::tables::{Storage, SymbolTable};
use std::collections::{HashMap, VecDeque};

pub const STACK_TOP: i32 = 0x10_0000;
const HEAP_BASE: i32 = 0x20_0000;
const DATA_BASE: i32 = 0x1000;
const DATA_STRIDE: i32 = 0x100;
/// Return address that stops the machine.
const HALT: i32 = -1;
const STEP_LIMIT: usize = 1_000_000;

pub fn parse(source: &str) -> Program {
    match parse_program(&mut lex(source)) {
        Ok(program) => program,
        Err(e) => panic!("failed to parse: {}", e),
    }
}

/// Parses and type checks `source`, returning the annotated tree.
pub fn checked(source: &str) -> Result<Program, CompileError> {
    let mut program = parse(source);
    analyze(&mut program)?;
    Ok(program)
}

pub fn compile_source(source: &str) -> Compilation {
    match compile(parse(source)) {
        Ok(compilation) => compilation,
        Err(e) => panic!("failed to compile: {}", e),
    }
}

/// Runs a whole compilation from the entry stub and returns the final state.
pub fn run(compilation: &Compilation, input: &[&str]) -> Machine {
    let mut code = entry_stub(&compilation.entry_class);
    code.extend(compilation.code.iter().cloned());

    let mut machine = Machine::with_data(&compilation.data).with_input(input);
    machine.execute(&code);
    machine
}

/// A small interpreter for the target instructions. External functions are
/// simulated: `malloc` bumps a heap pointer, `printf` appends one line to
/// `output`, the `readln_*` family consumes `input`.
#[derive(Debug, Default)]
pub struct Machine {
    regs: HashMap<Reg, i32>,
    memory: HashMap<i32, i32>,
    flags: Option<(i32, i32)>,
    strings: HashMap<i32, String>,
    data_labels: HashMap<String, i32>,
    next_heap: i32,
    input: VecDeque<String>,
    pub output: Vec<String>,
    /// External calls with the argument registers at the time of the call.
    pub calls: Vec<(String, [i32; 4])>,
}

impl Machine {
    pub fn new() -> Self {
        let mut machine = Self {
            next_heap: HEAP_BASE,
            ..Self::default()
        };
        machine.set_reg(Reg::Sp, STACK_TOP);
        machine.set_reg(Reg::Fp, STACK_TOP);
        machine.set_reg(Reg::Lr, HALT);
        machine
    }

    pub fn with_data(data: &DataTable) -> Self {
        let mut machine = Self::new();
        for (i, (label, text)) in data.iter().enumerate() {
            let address = DATA_BASE + i as i32 * DATA_STRIDE;
            machine.data_labels.insert(label.to_string(), address);
            machine.strings.insert(address, text.to_string());
        }
        machine
    }

    pub fn with_input(mut self, lines: &[&str]) -> Self {
        self.input = lines.iter().map(|line| line.to_string()).collect();
        self
    }

    /// Sets up an empty frame of `size` bytes below `fp`, as a function
    /// prologue would.
    pub fn enter_frame(&mut self, size: u32) {
        self.set_reg(Reg::Fp, STACK_TOP);
        self.set_reg(Reg::Sp, STACK_TOP - size as i32);
    }

    pub fn reg(&self, reg: Reg) -> i32 {
        self.regs.get(&reg).copied().unwrap_or(0)
    }

    pub fn set_reg(&mut self, reg: Reg, value: i32) {
        self.regs.insert(reg, value);
    }

    pub fn word(&self, address: i32) -> i32 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    pub fn set_word(&mut self, address: i32, value: i32) {
        self.memory.insert(address, value);
    }

    pub fn string_at(&self, address: i32) -> &str {
        match self.strings.get(&address) {
            Some(text) => text,
            None => panic!("no string at {:#x}", address),
        }
    }

    pub fn label_address(&self, label: &str) -> i32 {
        self.data_labels[label]
    }

    pub fn alloc(&mut self, size: i32) -> i32 {
        let address = self.next_heap;
        self.next_heap += size.max(4);
        address
    }

    pub fn alloc_string(&mut self, text: &str) -> i32 {
        let address = self.alloc(text.len() as i32 + 1);
        self.strings.insert(address, text.to_string());
        address
    }

    fn slot(&self, table: &SymbolTable, name: &str) -> Result<Reg, i32> {
        match table.entry(name).storage {
            Storage::Register(reg) => Ok(reg),
            Storage::Stack(offset) => {
                Err(self.reg(Reg::Fp) + offset as i32 - table.frame_size() as i32)
            }
        }
    }

    /// Reads a symbol from wherever the table placed it.
    pub fn symbol(&self, table: &SymbolTable, name: &str) -> i32 {
        match self.slot(table, name) {
            Ok(reg) => self.reg(reg),
            Err(address) => self.word(address),
        }
    }

    pub fn set_symbol(&mut self, table: &SymbolTable, name: &str, value: i32) {
        match self.slot(table, name) {
            Ok(reg) => self.set_reg(reg, value),
            Err(address) => self.set_word(address, value),
        }
    }

    fn operand(&self, operand: &Operand) -> i32 {
        match operand {
            Operand::Reg(reg) => self.reg(*reg),
            Operand::Imm(value) => *value,
        }
    }

    fn holds(&self, cond: Option<Cond>) -> bool {
        match cond {
            None => true,
            Some(cond) => match self.flags {
                Some((lhs, rhs)) => cond.holds(lhs, rhs),
                None => panic!("condition `{}` tested before any compare", cond),
            },
        }
    }

    /// Executes `code` from its first instruction until control falls off
    /// the end or returns to the halt address.
    pub fn execute(&mut self, code: &[Instr]) {
        let labels: HashMap<&str, i32> = code
            .iter()
            .enumerate()
            .filter_map(|(i, instr)| match instr {
                Instr::Label(label) => Some((label.as_str(), i as i32)),
                _ => None,
            })
            .collect();

        let mut pc = 0;
        let mut steps = 0;
        while pc >= 0 && (pc as usize) < code.len() {
            steps += 1;
            assert!(steps < STEP_LIMIT, "step limit exceeded");

            let mut next = pc + 1;
            match &code[pc as usize] {
                Instr::Label(_) => {}
                Instr::Mov { dest, src } => self.set_reg(*dest, self.reg(*src)),
                Instr::LoadImm { dest, value } => self.set_reg(*dest, *value),
                Instr::LoadLabel { cond, dest, label } => {
                    if self.holds(*cond) {
                        self.set_reg(*dest, self.label_address(label));
                    }
                }
                Instr::Load { dest, base, offset } => {
                    let address = self.reg(*base) + self.operand(offset);
                    self.set_reg(*dest, self.word(address));
                }
                Instr::Store { src, base, offset } => {
                    let address = self.reg(*base) + self.operand(offset);
                    self.set_word(address, self.reg(*src));
                }
                Instr::Arith {
                    op,
                    cond,
                    dest,
                    lhs,
                    rhs,
                } => {
                    if self.holds(*cond) {
                        let value = op.apply(self.reg(*lhs), self.operand(rhs));
                        self.set_reg(*dest, value);
                    }
                }
                Instr::Cmp { lhs, rhs } => {
                    self.flags = Some((self.reg(*lhs), self.operand(rhs)));
                }
                Instr::Branch { cond, label } => {
                    if self.holds(*cond) {
                        next = labels[label.as_str()];
                    }
                }
                Instr::BranchLink(target) => match labels.get(target.as_str()) {
                    Some(&entry) => {
                        self.set_reg(Reg::Lr, next);
                        next = entry;
                    }
                    None => self.external(target),
                },
                Instr::Push(regs) => {
                    let sp = self.reg(Reg::Sp) - 4 * regs.len() as i32;
                    for (i, reg) in regs.iter().enumerate() {
                        self.set_word(sp + 4 * i as i32, self.reg(*reg));
                    }
                    self.set_reg(Reg::Sp, sp);
                }
                Instr::Pop(regs) => {
                    let sp = self.reg(Reg::Sp);
                    for (i, reg) in regs.iter().enumerate() {
                        let value = self.word(sp + 4 * i as i32);
                        if *reg == Reg::Pc {
                            next = value;
                        } else {
                            self.set_reg(*reg, value);
                        }
                    }
                    self.set_reg(Reg::Sp, sp + 4 * regs.len() as i32);
                }
            }
            pc = next;
        }
    }

    fn external(&mut self, function: &str) {
        let args = [
            self.reg(Reg::A1),
            self.reg(Reg::A2),
            self.reg(Reg::A3),
            self.reg(Reg::A4),
        ];
        self.calls.push((function.to_string(), args));

        let result = match function {
            MALLOC => self.alloc(args[0]),
            PRINTF => {
                let line = match self.string_at(args[0]) {
                    "%d\\n" => args[1].to_string(),
                    "%s\\n" => self.string_at(args[1]).to_string(),
                    format => panic!("unexpected format {:?}", format),
                };
                self.output.push(line);
                0
            }
            READ_INT => match self.input.pop_front() {
                Some(line) => line.trim().parse().expect("integer input"),
                None => panic!("input exhausted"),
            },
            READ_BOOL => match self.input.pop_front() {
                Some(line) => (line.trim() == "true") as i32,
                None => panic!("input exhausted"),
            },
            READ_STRING => match self.input.pop_front() {
                Some(line) => self.alloc_string(&line),
                None => panic!("input exhausted"),
            },
            other => panic!("call to unknown function `{}`", other),
        };
        self.set_reg(Reg::A1, result);
    }
}
