//! IR Evaluator
//!
//! Executes a module directly, without a native toolchain. Words are 32-bit
//! and wrap on overflow. Stack slots live in a flat word memory that is
//! released when the owning call returns. `printf` and `sleep` go through
//! a [`Host`].

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use log::trace;

use crate::middle::ir::*;
use crate::utils::{Error, Result};

/// Deepest call chain the evaluator allows
pub const MAX_CALL_DEPTH: usize = 256;

/// Side effects of external calls
pub trait Host {
    /// Write formatted output
    fn print(&mut self, text: &str) -> Result<()>;

    /// Pause for the given number of seconds
    fn sleep(&mut self, seconds: u32) -> Result<()>;
}

/// Host that writes to stdout and really sleeps
#[derive(Debug, Default)]
pub struct StdHost;

impl Host for StdHost {
    fn print(&mut self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    fn sleep(&mut self, seconds: u32) -> Result<()> {
        std::thread::sleep(Duration::from_secs(u64::from(seconds)));
        Ok(())
    }
}

/// Host that records output and sleeps instead of performing them
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordingHost {
    pub output: String,
    pub sleeps: Vec<u32>,
}

impl Host for RecordingHost {
    fn print(&mut self, text: &str) -> Result<()> {
        self.output.push_str(text);
        Ok(())
    }

    fn sleep(&mut self, seconds: u32) -> Result<()> {
        self.sleeps.push(seconds);
        Ok(())
    }
}

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum RtValue {
    Int(i32),
    Bool(bool),
    /// Word address in evaluator memory
    Ptr(usize),
    Str(String),
}

impl RtValue {
    fn as_int(&self) -> Result<i32> {
        match self {
            RtValue::Int(n) => Ok(*n),
            RtValue::Bool(b) => Ok(i32::from(*b)),
            other => Err(Error::runtime(format!("expected integer, found {:?}", other))),
        }
    }

    fn as_bool(&self) -> Result<bool> {
        match self {
            RtValue::Bool(b) => Ok(*b),
            RtValue::Int(n) => Ok(*n != 0),
            other => Err(Error::runtime(format!("expected bool, found {:?}", other))),
        }
    }

    fn as_ptr(&self) -> Result<usize> {
        match self {
            RtValue::Ptr(p) => Ok(*p),
            other => Err(Error::runtime(format!("expected pointer, found {:?}", other))),
        }
    }
}

/// IR evaluator
pub struct Evaluator<'m, H: Host> {
    module: &'m IRModule,
    host: H,
    memory: Vec<i32>,
    depth: usize,
}

impl<'m, H: Host> Evaluator<'m, H> {
    pub fn new(module: &'m IRModule, host: H) -> Self {
        Self {
            module,
            host,
            memory: Vec::new(),
            depth: 0,
        }
    }

    /// Call a function with no arguments and return its exit value
    pub fn run(&mut self, entry: &str) -> Result<i32> {
        self.call(entry, Vec::new())?.as_int()
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Call a defined or external function by name
    pub fn call(&mut self, name: &str, args: Vec<RtValue>) -> Result<RtValue> {
        let module = self.module;
        if let Some(func) = module.get_function(name) {
            if func.params.len() != args.len() {
                return Err(Error::runtime(format!(
                    "function `{}` expects {} arguments, got {}",
                    name,
                    func.params.len(),
                    args.len()
                )));
            }
            if self.depth >= MAX_CALL_DEPTH {
                return Err(Error::runtime("call depth exceeded"));
            }
            self.depth += 1;
            let frame = self.memory.len();
            let result = self.run_function(func, &args);
            self.memory.truncate(frame);
            self.depth -= 1;
            return result;
        }

        if module.get_extern(name).is_some() {
            return self.call_extern(name, &args);
        }

        Err(Error::runtime(format!("unknown function `{}`", name)))
    }

    fn run_function(&mut self, func: &IRFunction, args: &[RtValue]) -> Result<RtValue> {
        trace!("enter {} ({} args)", func.name, args.len());
        let mut registers: HashMap<Register, RtValue> = HashMap::new();
        let mut current = func.entry_block;

        loop {
            let block = func
                .get_block(current)
                .ok_or_else(|| Error::runtime(format!("missing block {} in `{}`", current.0, func.name)))?;

            for inst in &block.instructions {
                self.execute(inst, &mut registers, args)?;
            }

            match &block.terminator {
                Some(Terminator::Return { value }) => {
                    return self.value(value, &registers, args);
                }
                Some(Terminator::Jump { target }) => current = *target,
                Some(Terminator::Branch { cond, then_target, else_target }) => {
                    current = if self.value(cond, &registers, args)?.as_bool()? {
                        *then_target
                    } else {
                        *else_target
                    };
                }
                None => {
                    return Err(Error::runtime(format!(
                        "block `{}` in `{}` has no terminator",
                        block.label, func.name
                    )))
                }
            }
        }
    }

    fn value(&self, value: &Value, registers: &HashMap<Register, RtValue>, args: &[RtValue]) -> Result<RtValue> {
        match value {
            Value::Register(r) => registers
                .get(r)
                .cloned()
                .ok_or_else(|| Error::runtime(format!("use of undefined register {}", r))),
            Value::Constant(Constant::Int(n)) => Ok(RtValue::Int(*n as i32)),
            Value::Constant(Constant::String(s)) => Ok(RtValue::Str(s.clone())),
            Value::Parameter(i) => args
                .get(*i)
                .cloned()
                .ok_or_else(|| Error::runtime(format!("missing argument {}", i))),
        }
    }

    fn execute(
        &mut self,
        inst: &Instruction,
        registers: &mut HashMap<Register, RtValue>,
        args: &[RtValue],
    ) -> Result<()> {
        match inst {
            Instruction::BinOp { dest, op, left, right } => {
                let left = self.value(left, registers, args)?;
                let right = self.value(right, registers, args)?;
                registers.insert(*dest, binop(*op, &left, &right)?);
            }
            Instruction::UnaryOp { dest, op: UnaryOp::Not, value } => {
                let value = self.value(value, registers, args)?.as_int()?;
                registers.insert(*dest, RtValue::Int(!value));
            }
            Instruction::Call { dest, func, args: call_args } => {
                let call_args = call_args
                    .iter()
                    .map(|a| self.value(a, registers, args))
                    .collect::<Result<Vec<_>>>()?;
                let result = self.call(func, call_args)?;
                if let Some(dest) = dest {
                    registers.insert(*dest, result);
                }
            }
            Instruction::Alloca { dest, ty } => {
                let base = self.memory.len();
                self.memory.resize(base + ty.size_words(), 0);
                registers.insert(*dest, RtValue::Ptr(base));
            }
            Instruction::Load { dest, ptr, .. } => {
                let addr = self.value(ptr, registers, args)?.as_ptr()?;
                let word = *self
                    .memory
                    .get(addr)
                    .ok_or_else(|| Error::runtime(format!("load from invalid address {}", addr)))?;
                registers.insert(*dest, RtValue::Int(word));
            }
            Instruction::Store { ptr, value } => {
                let addr = self.value(ptr, registers, args)?.as_ptr()?;
                let word = self.value(value, registers, args)?.as_int()?;
                let slot = self
                    .memory
                    .get_mut(addr)
                    .ok_or_else(|| Error::runtime(format!("store to invalid address {}", addr)))?;
                *slot = word;
            }
            Instruction::GetElementPtr { dest, ptr, index, .. } => {
                let base = self.value(ptr, registers, args)?.as_ptr()?;
                let index = self.value(index, registers, args)?.as_int()?;
                let offset = usize::try_from(index)
                    .map_err(|_| Error::runtime(format!("negative element index {}", index)))?;
                registers.insert(*dest, RtValue::Ptr(base + offset));
            }
            Instruction::Cast { dest, value, .. } => {
                let value = self.value(value, registers, args)?.as_int()?;
                registers.insert(*dest, RtValue::Int(value));
            }
        }
        Ok(())
    }

    fn call_extern(&mut self, name: &str, args: &[RtValue]) -> Result<RtValue> {
        match name {
            "printf" => {
                let format = match args.first() {
                    Some(RtValue::Str(s)) => s,
                    _ => return Err(Error::runtime("printf needs a format string")),
                };
                let text = format_printf(format, &args[1..])?;
                self.host.print(&text)?;
                Ok(RtValue::Int(text.len() as i32))
            }
            "sleep" => {
                let seconds = args
                    .first()
                    .ok_or_else(|| Error::runtime("sleep needs a duration"))?
                    .as_int()?;
                // sleep takes an unsigned duration
                self.host.sleep(seconds as u32)?;
                Ok(RtValue::Int(0))
            }
            other => Err(Error::runtime(format!("unsupported external function `{}`", other))),
        }
    }
}

fn binop(op: BinOp, left: &RtValue, right: &RtValue) -> Result<RtValue> {
    if matches!(op, BinOp::And | BinOp::Or) {
        let (l, r) = (left.as_bool()?, right.as_bool()?);
        return Ok(RtValue::Bool(if op == BinOp::And { l && r } else { l || r }));
    }

    let (l, r) = (left.as_int()?, right.as_int()?);
    let value = match op {
        BinOp::Add => RtValue::Int(l.wrapping_add(r)),
        BinOp::Sub => RtValue::Int(l.wrapping_sub(r)),
        BinOp::Mul => RtValue::Int(l.wrapping_mul(r)),
        BinOp::Div => {
            if r == 0 {
                return Err(Error::runtime("division by zero"));
            }
            RtValue::Int(l.wrapping_div(r))
        }
        BinOp::Mod => {
            if r == 0 {
                return Err(Error::runtime("modulo by zero"));
            }
            RtValue::Int(l.wrapping_rem(r))
        }
        BinOp::Eq => RtValue::Bool(l == r),
        BinOp::Ne => RtValue::Bool(l != r),
        BinOp::Lt => RtValue::Bool(l < r),
        BinOp::Le => RtValue::Bool(l <= r),
        BinOp::Gt => RtValue::Bool(l > r),
        BinOp::Ge => RtValue::Bool(l >= r),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    };
    Ok(value)
}

/// Render a printf format with `%d %i %u %x %c %s %%`
pub fn format_printf(format: &str, args: &[RtValue]) -> Result<String> {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        // Length modifiers do not matter for 32-bit words
        while matches!(chars.peek(), Some('l') | Some('h')) {
            chars.next();
        }
        let conv = match chars.next() {
            Some(conv) => conv,
            None => {
                out.push('%');
                break;
            }
        };
        if conv == '%' {
            out.push('%');
            continue;
        }
        if !matches!(conv, 'd' | 'i' | 'u' | 'x' | 'c' | 's') {
            out.push('%');
            out.push(conv);
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| Error::runtime(format!("printf: missing argument for %{}", conv)))?;
        match conv {
            'd' | 'i' => out.push_str(&arg.as_int()?.to_string()),
            'u' => out.push_str(&(arg.as_int()? as u32).to_string()),
            'x' => out.push_str(&format!("{:x}", arg.as_int()? as u32)),
            'c' => out.push(char::from(arg.as_int()? as u8)),
            _ => match arg {
                RtValue::Str(s) => out.push_str(s),
                other => {
                    return Err(Error::runtime(format!("printf: %s needs a string, found {:?}", other)))
                }
            },
        }
    }

    Ok(out)
}

/// Evaluate `entry` with a recording host, returning exit value and host
pub fn run_module(module: &IRModule, entry: &str) -> Result<(i32, RecordingHost)> {
    let mut eval = Evaluator::new(module, RecordingHost::default());
    let code = eval.run(entry)?;
    Ok((code, eval.into_host()))
}
