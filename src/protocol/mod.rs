//! Wire protocol shared by the command and discovery channels.
//!
//! Both channels carry UTF-8 JSON objects with PascalCase field names and a
//! `Type` discriminator. The TCP channel frames them one per line.

pub mod codec;
