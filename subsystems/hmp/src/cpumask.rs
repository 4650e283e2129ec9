//! # CPU Masks
//!
//! Fixed-width CPU sets. Domains, affinity and the schedulable set are all
//! stored as masks rather than references into the CPU arena.

use crate::{CpuId, MAX_CPUS};
use core::fmt;
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not, Sub};
use static_assertions::const_assert;

const_assert!(MAX_CPUS <= u64::BITS as usize);

/// A set of CPUs, one bit per CPU id
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct CpuMask(u64);

impl CpuMask {
    /// Empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Set containing CPUs `0..nr_cpus`
    pub const fn first_n(nr_cpus: usize) -> Self {
        if nr_cpus >= MAX_CPUS {
            Self(u64::MAX)
        } else {
            Self((1u64 << nr_cpus) - 1)
        }
    }

    /// Build from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Build from a list of CPU ids
    pub fn from_cpus(cpus: &[u32]) -> Self {
        let mut mask = Self::empty();
        for &cpu in cpus {
            mask.set(CpuId::new(cpu));
        }
        mask
    }

    /// Raw bits
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Add a CPU
    pub fn set(&mut self, cpu: CpuId) {
        if cpu.index() < MAX_CPUS {
            self.0 |= 1 << cpu.index();
        }
    }

    /// Remove a CPU
    pub fn clear(&mut self, cpu: CpuId) {
        if cpu.index() < MAX_CPUS {
            self.0 &= !(1 << cpu.index());
        }
    }

    /// Copy with `cpu` added
    pub fn with(mut self, cpu: CpuId) -> Self {
        self.set(cpu);
        self
    }

    /// Copy with `cpu` removed
    pub fn without(mut self, cpu: CpuId) -> Self {
        self.clear(cpu);
        self
    }

    /// Membership test
    pub const fn contains(self, cpu: CpuId) -> bool {
        cpu.index() < MAX_CPUS && self.0 & (1 << cpu.index()) != 0
    }

    /// Number of CPUs in the set
    pub const fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Is the set empty?
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Is every CPU of `self` also in `other`?
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Do the sets share a CPU?
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Lowest CPU in the set
    pub fn first(self) -> Option<CpuId> {
        if self.0 == 0 {
            None
        } else {
            Some(CpuId::new(self.0.trailing_zeros()))
        }
    }

    /// Highest CPU in the set
    pub fn last(self) -> Option<CpuId> {
        if self.0 == 0 {
            None
        } else {
            Some(CpuId::new(u64::BITS - 1 - self.0.leading_zeros()))
        }
    }

    /// Iterate CPUs in ascending id order
    pub fn iter(self) -> CpuMaskIter {
        CpuMaskIter(self.0)
    }
}

/// Iterator over the CPUs of a mask
#[derive(Debug, Clone)]
pub struct CpuMaskIter(u64);

impl Iterator for CpuMaskIter {
    type Item = CpuId;

    fn next(&mut self) -> Option<CpuId> {
        if self.0 == 0 {
            return None;
        }
        let cpu = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(CpuId::new(cpu))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl IntoIterator for CpuMask {
    type Item = CpuId;
    type IntoIter = CpuMaskIter;

    fn into_iter(self) -> CpuMaskIter {
        self.iter()
    }
}

impl FromIterator<CpuId> for CpuMask {
    fn from_iter<I: IntoIterator<Item = CpuId>>(iter: I) -> Self {
        let mut mask = Self::empty();
        for cpu in iter {
            mask.set(cpu);
        }
        mask
    }
}

impl BitOr for CpuMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CpuMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CpuMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for CpuMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Sub for CpuMask {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 & !rhs.0)
    }
}

impl Not for CpuMask {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for CpuMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(CpuId::raw)).finish()
    }
}

impl fmt::Display for CpuMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
