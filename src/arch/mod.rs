//! Architecture-specific support. Only 32-bit x86 (protected mode, no PAE,
//! no long mode) is implemented.

pub mod x86;
