use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

// system specs

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Protocol {
    MESI,
    Dragon,
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mesi" => Ok(Protocol::MESI),
            "dragon" => Ok(Protocol::Dragon),
            _ => Err(ConfigError::UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::MESI => f.write_str("MESI"),
            Protocol::Dragon => f.write_str("Dragon"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SystemSpec {         // unit         reasonable defaults
    pub protocol: Protocol,     //              MESI
    pub word_size: u32,         // bytes        4
    pub address_size: u32,      // bytes        4
    pub mem_lat: u32,           // cpu cycles   100
    pub cache_hit_lat: u32,     // cpu cycles   1
    pub bus_word_tf_lat: u32,   // cpu cycles   2
    pub block_size: u32,        // bytes        32
    pub cache_size: u32,        // bytes        4096
    pub cache_assoc: u32,       // blocks       2
    pub num_procs: usize,       //              4
}

impl Default for SystemSpec {
    fn default() -> Self {
        SystemSpec {
            protocol: Protocol::MESI,
            word_size: 4,
            address_size: 4,
            mem_lat: 100,
            cache_hit_lat: 1,
            bus_word_tf_lat: 2,
            block_size: 32,
            cache_size: 4096,
            cache_assoc: 2,
            num_procs: 4,
        }
    }
}

impl SystemSpec {
    // timing
    pub fn t_cache_hit(&self) -> u64 {
        self.cache_hit_lat.into()
    }
    pub fn t_cache_to_cache_msg(&self) -> u64 {
        // assuming immediate response through wired OR
        u64::from(self.bus_word_tf_lat) * u64::from(self.address_size) / u64::from(self.word_size)
    }
    pub fn t_cache_to_cache_transfer(&self) -> u64 {
        u64::from(self.bus_word_tf_lat) * u64::from(self.block_size) / u64::from(self.word_size)
    }
    pub fn t_flush(&self) -> u64 {
        self.mem_lat.into()
    }
    pub fn t_mem_fetch(&self) -> u64 {
        self.mem_lat.into()
    }

    /// Validates the cache geometry and derives the address layout from it.
    pub fn layout(&self) -> Result<AddrLayout, ConfigError> {
        for (what, value) in [
            ("word size", self.word_size),
            ("block size", self.block_size),
            ("cache size", self.cache_size),
            ("associativity", self.cache_assoc),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { what });
            }
        }
        if self.num_procs == 0 {
            return Err(ConfigError::Zero { what: "processor count" });
        }
        if !self.block_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                what: "block size",
                value: self.block_size,
            });
        }

        let set_bytes = u64::from(self.block_size) * u64::from(self.cache_assoc);
        if u64::from(self.cache_size) % set_bytes != 0 {
            return Err(ConfigError::Geometry {
                cache_size: self.cache_size,
                block_size: self.block_size,
                assoc: self.cache_assoc,
            });
        }
        let num_sets = (u64::from(self.cache_size) / set_bytes) as u32;
        if !num_sets.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                what: "set count",
                value: num_sets,
            });
        }

        let offset_bits = self.block_size.trailing_zeros();
        let index_bits = num_sets.trailing_zeros();
        if offset_bits + index_bits > u32::BITS {
            return Err(ConfigError::AddressTooWide {
                offset_bits,
                index_bits,
            });
        }
        Ok(AddrLayout {
            offset_bits,
            index_bits,
        })
    }
}

// addresses and blocks

/// Splits `addr` into `(tag, index)`.
pub fn decompose(addr: u32, offset_bits: u32, index_bits: u32) -> (u32, u32) {
    // widened so that a shift by the full address width stays defined
    let a = u64::from(addr);
    let index = (a >> offset_bits) & ((1u64 << index_bits) - 1);
    let tag = a >> (offset_bits + index_bits);
    (tag as u32, index as u32)
}

/// Inverse of [`decompose`]; the offset bits of the result are zero.
pub fn reassemble(tag: u32, index: u32, offset_bits: u32, index_bits: u32) -> u32 {
    let a = (u64::from(tag) << (offset_bits + index_bits)) | (u64::from(index) << offset_bits);
    a as u32
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AddrLayout {
    pub offset_bits: u32,
    pub index_bits: u32,
}

impl AddrLayout {
    pub fn num_sets(&self) -> usize {
        1usize << self.index_bits
    }
    pub fn decompose(&self, addr: Addr) -> (u32, u32) {
        decompose(addr.0, self.offset_bits, self.index_bits)
    }
    pub fn reassemble(&self, tag: u32, index: u32) -> Addr {
        Addr(reassemble(tag, index, self.offset_bits, self.index_bits))
    }
    pub fn offset(&self, addr: Addr) -> u32 {
        (u64::from(addr.0) & ((1u64 << self.offset_bits) - 1)) as u32
    }
    /// The address of the first byte of the block containing `addr`.
    pub fn block_addr(&self, addr: Addr) -> Addr {
        let (tag, index) = self.decompose(addr);
        self.reassemble(tag, index)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Addr(pub u32);

impl Addr {
    /// get cache index and tag of this address under given layout
    pub fn pos(&self, layout: &AddrLayout) -> (usize, u32) {
        let (tag, index) = layout.decompose(*self);
        (index as usize, tag)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

// instructions

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instr {
    Read(Addr),
    Write(Addr),
    Other(u32),
}

pub type Instructions = VecDeque<Instr>;
