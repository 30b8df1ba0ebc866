//! Layout of the fixed header, constants, variables, and the reserved I/O
//! buffer that precede the program section.

use indexmap::IndexMap;

use super::TranslateError;

/// The fixed byte address the interrupt vector table begins at.
pub const VECTOR_TABLE_ADDR: u32 = 0;
/// Number of populated interrupt vector slots.
pub const VECTOR_COUNT: u32 = 16;
/// Byte address of the word holding the memory-mapped input port's address.
pub const INPUT_PORT_WORD_ADDR: u32 = VECTOR_COUNT * 4;
/// Byte address of the word holding the memory-mapped output port's address.
pub const OUTPUT_PORT_WORD_ADDR: u32 = INPUT_PORT_WORD_ADDR + 4;
/// The memory-mapped input port address (a value, not a label).
pub const INPUT_ADDR: u32 = 0x10;
/// The memory-mapped output port address (a value, not a label).
pub const OUTPUT_ADDR: u32 = 0x11;
/// First byte address past the fixed header, where user constants begin.
pub const HEADER_END_ADDR: u32 = OUTPUT_PORT_WORD_ADDR + 4;
/// Every generated program's instructions must start strictly below this
/// address; everything from here up is reserved for the translator's layout.
pub const PROGRAM_START_ADDR: u32 = 0x1000;

/// A literal value held by a constant or the initial value of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    /// A single-word signed integer.
    Int(i32),
    /// A NUL-terminated string, one word per byte plus a terminator.
    Str(String),
}

impl VarValue {
    /// Size of this value in whole 32-bit words.
    #[must_use]
    pub fn size_words(&self) -> u32 {
        match self {
            Self::Int(_) => 1,
            Self::Str(s) => s.len() as u32 + 1,
        }
    }
}

/// A constant or a declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Byte address, assigned during layout. `None` until then.
    pub addr: Option<u32>,
    /// The variable's initial/constant value.
    pub value: VarValue,
}

/// Owns the constant pool and the variable table, and performs address
/// layout once the program has been fully lowered.
#[derive(Debug, Default)]
pub struct MemoryManager {
    constants: IndexMap<String, Variable>,
    variables: IndexMap<String, Variable>,
    io_data_addr: Option<u32>,
    io_data_read_addr: Option<u32>,
    io_buffer_addr: Option<u32>,
    io_buffer_words: u32,
}

impl MemoryManager {
    /// Create an empty memory manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an integer literal as a pooled constant, returning its label.
    pub fn pool_int_constant(&mut self, value: i32) -> String {
        let label = format!("__const_int_{value}");
        self.constants.entry(label.clone()).or_insert_with(|| Variable {
            addr: None,
            value: VarValue::Int(value),
        });
        label
    }

    /// Intern a string literal as a pooled constant, returning its label.
    pub fn pool_string_constant(&mut self, value: &str) -> String {
        let label = format!("__const_str_{value}_{}", value.len());
        self.constants.entry(label.clone()).or_insert_with(|| Variable {
            addr: None,
            value: VarValue::Str(value.to_string()),
        });
        label
    }

    /// Declare a new data-memory variable. Returns an error if `name` is
    /// already a variable (re-declaration of a source-level name).
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::VariableAlreadyDeclared`] on re-declaration.
    pub fn declare_variable(&mut self, name: &str, initial: VarValue) -> Result<(), TranslateError> {
        if self.variables.contains_key(name) {
            return Err(TranslateError::VariableAlreadyDeclared(name.to_string()));
        }
        self.variables.insert(name.to_string(), Variable { addr: None, value: initial });
        Ok(())
    }

    /// Look up a declared variable's address. Only meaningful after layout.
    #[must_use]
    pub fn variable_addr(&self, name: &str) -> Option<u32> {
        self.variables.get(name).and_then(|v| v.addr)
    }

    /// Look up a pooled constant's address. Only meaningful after layout.
    #[must_use]
    pub fn constant_addr(&self, label: &str) -> Option<u32> {
        self.constants.get(label).and_then(|v| v.addr)
    }

    /// `true` if a variable with this name has been declared.
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// The reserved cursor word the input ISR advances when it stashes a
    /// fresh character (address of the next free slot in the I/O buffer).
    #[must_use]
    pub fn io_data_addr(&self) -> u32 {
        self.io_data_addr.expect("layout must run before io_data_addr is read")
    }

    /// The reserved cursor word the *consumer* (`eval_input`) advances each
    /// time it reads a pending word out of the I/O buffer: the address of
    /// the next word still unread. Starts equal to [`Self::io_buffer_addr`],
    /// same as `io_data_addr`, so an empty buffer compares equal.
    #[must_use]
    pub fn io_data_read_addr(&self) -> u32 {
        self.io_data_read_addr.expect("layout must run before io_data_read_addr is read")
    }

    /// Assign concrete byte addresses to every constant and variable, then
    /// reserve the two I/O cursor words and the I/O buffer, sized to exactly
    /// fill the remaining space below [`PROGRAM_START_ADDR`].
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::MemoryOut`] if the fixed header, constants,
    /// variables, and cursor words alone do not leave room for at least one
    /// buffer word before `PROGRAM_START_ADDR`.
    pub fn layout(&mut self) -> Result<(), TranslateError> {
        let mut addr = HEADER_END_ADDR;

        for variable in self.constants.values_mut() {
            variable.addr = Some(addr);
            addr += variable.value.size_words() * 4;
        }
        for variable in self.variables.values_mut() {
            variable.addr = Some(addr);
            addr += variable.value.size_words() * 4;
        }

        self.io_data_addr = Some(addr);
        addr += 4;
        self.io_data_read_addr = Some(addr);
        addr += 4;

        if addr >= PROGRAM_START_ADDR {
            return Err(TranslateError::MemoryOut {
                max: PROGRAM_START_ADDR,
                got: addr,
            });
        }

        self.io_buffer_addr = Some(addr);
        self.io_buffer_words = (PROGRAM_START_ADDR - addr) / 4;
        Ok(())
    }

    /// Byte address of the reserved I/O buffer (valid after [`Self::layout`]).
    #[must_use]
    pub fn io_buffer_addr(&self) -> u32 {
        self.io_buffer_addr.expect("layout must run before io_buffer_addr is read")
    }

    /// Size of the reserved I/O buffer, in words.
    #[must_use]
    pub fn io_buffer_words(&self) -> u32 {
        self.io_buffer_words
    }

    /// Iterate constants and variables together, in the order they occupy
    /// memory (constants first, then variables), for emitting the data
    /// section of the final image.
    pub fn data_words_in_layout_order(&self) -> impl Iterator<Item = (u32, &VarValue)> {
        self.constants
            .values()
            .chain(self.variables.values())
            .map(|v| (v.addr.expect("layout must run before data is emitted"), &v.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_places_header_then_data_then_cursors() {
        let mut mm = MemoryManager::new();
        mm.pool_int_constant(3);
        mm.declare_variable("a", VarValue::Int(0)).unwrap();
        mm.layout().unwrap();

        assert_eq!(mm.constant_addr("__const_int_3"), Some(HEADER_END_ADDR));
        assert_eq!(mm.variable_addr("a"), Some(HEADER_END_ADDR + 4));
        assert_eq!(mm.io_data_addr(), HEADER_END_ADDR + 8);
        assert_eq!(mm.io_data_read_addr(), HEADER_END_ADDR + 12);
        assert!(mm.io_buffer_addr() < PROGRAM_START_ADDR);
        assert!(mm.io_buffer_words() > 0);
    }

    #[test]
    fn redeclaring_a_variable_is_an_error() {
        let mut mm = MemoryManager::new();
        mm.declare_variable("a", VarValue::Int(0)).unwrap();
        assert!(matches!(
            mm.declare_variable("a", VarValue::Int(1)),
            Err(TranslateError::VariableAlreadyDeclared(_))
        ));
    }
}
