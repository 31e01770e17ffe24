//! Classical memory and register bits of one shot

use crate::error::{Result, SimulatorError};

/// Measurement outcomes of one shot
///
/// Bit `i` of the memory is the outcome stored at memory slot `i`. The hex
/// rendering puts slot 0 in the least significant position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassicalRegister {
    memory: Vec<bool>,
    registers: Vec<bool>,
}

impl ClassicalRegister {
    pub fn new(num_memory: usize, num_registers: usize) -> Self {
        Self {
            memory: vec![false; num_memory],
            registers: vec![false; num_registers],
        }
    }

    pub fn memory(&self) -> &[bool] {
        &self.memory
    }

    pub fn registers(&self) -> &[bool] {
        &self.registers
    }

    /// Store measured bits into memory and register slots
    ///
    /// Bit `i` of `outcome` goes to `memory[i]` and `registers[i]`. Either slot
    /// list may be empty; a non-empty one must match the measured width.
    pub fn store_measure(&mut self, outcome: u64, memory: &[usize], registers: &[usize]) -> Result<()> {
        store_bits(&mut self.memory, outcome, memory, "memory")?;
        store_bits(&mut self.registers, outcome, registers, "register")
    }

    pub fn memory_hex(&self) -> String {
        to_hex(&self.memory)
    }

    pub fn register_hex(&self) -> String {
        to_hex(&self.registers)
    }
}

fn store_bits(bits: &mut [bool], outcome: u64, slots: &[usize], kind: &str) -> Result<()> {
    for (i, &slot) in slots.iter().enumerate() {
        let len = bits.len();
        let target = bits.get_mut(slot).ok_or_else(|| {
            SimulatorError::shape("measure", format!("{kind} slot {slot} out of range for {len} bits"))
        })?;
        *target = (outcome >> i) & 1 == 1;
    }
    Ok(())
}

fn to_hex(bits: &[bool]) -> String {
    let mut digits: Vec<char> = bits
        .chunks(4)
        .map(|nibble| {
            let value = nibble
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, &b)| acc | (u32::from(b) << i));
            char::from_digit(value, 16).unwrap_or('0')
        })
        .collect();
    while digits.len() > 1 && digits.last() == Some(&'0') {
        digits.pop();
    }
    if digits.is_empty() {
        digits.push('0');
    }
    let mut hex = String::from("0x");
    hex.extend(digits.iter().rev());
    hex
}
