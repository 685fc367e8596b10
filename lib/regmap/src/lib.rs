// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed memory-mapped register handles.
//!
//! A peripheral is described by a `#[repr(C)]` struct whose fields are
//! [`Reg`]s, declared with [`register_block!`] from a table of byte offsets.
//! The struct is never constructed; drivers obtain a `&RegisterBlock` by
//! casting the peripheral's fixed base address, once, when they are
//! configured. Every access through a [`Reg`] is a single volatile load or
//! store of the register's natural width.
//!
//! Bit sub-fields are plain [`Field`] constants (shift and width) kept next to
//! the block definition; the register offers `get`/`set` helpers that take
//! them.
//!
//! Because nothing here knows about real addresses, the same blocks can be
//! backed by ordinary memory in host tests.

#![cfg_attr(not(test), no_std)]

use core::marker::PhantomData;
use vcell::VolatileCell;

#[doc(hidden)]
pub use static_assertions;

/// Read-only access marker.
pub enum RO {}
/// Read-write access marker.
pub enum RW {}
/// Write-only access marker.
pub enum WO {}

pub trait Readable {}
pub trait Writable {}

impl Readable for RO {}
impl Readable for RW {}
impl Writable for RW {}
impl Writable for WO {}

mod private {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

/// Register widths: 8, 16 or 32 bits.
pub trait Width: Copy + Eq + private::Sealed {
    fn into_u32(self) -> u32;
    /// Truncates to this width.
    fn from_u32(v: u32) -> Self;
}

impl Width for u8 {
    fn into_u32(self) -> u32 {
        self.into()
    }
    fn from_u32(v: u32) -> Self {
        v as u8
    }
}

impl Width for u16 {
    fn into_u32(self) -> u32 {
        self.into()
    }
    fn from_u32(v: u32) -> Self {
        v as u16
    }
}

impl Width for u32 {
    fn into_u32(self) -> u32 {
        self
    }
    fn from_u32(v: u32) -> Self {
        v
    }
}

/// A bit field within a register: `width` bits starting at bit `shift`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Field {
    pub shift: u8,
    pub width: u8,
}

impl Field {
    pub const fn new(shift: u8, width: u8) -> Self {
        assert!(width > 0 && shift as u32 + width as u32 <= 32);
        Self { shift, width }
    }

    /// A single-bit field.
    pub const fn bit(n: u8) -> Self {
        Self::new(n, 1)
    }

    pub const fn mask(self) -> u32 {
        (u32::MAX >> (32 - self.width as u32)) << self.shift
    }

    /// `value` positioned in this field; excess high bits are dropped.
    pub const fn bits(self, value: u32) -> u32 {
        (value << self.shift) & self.mask()
    }

    pub const fn extract(self, reg: u32) -> u32 {
        (reg & self.mask()) >> self.shift
    }

    /// `reg` with this field replaced by `value`.
    pub const fn insert(self, reg: u32, value: u32) -> u32 {
        (reg & !self.mask()) | self.bits(value)
    }
}

/// A memory-mapped register of width `T` with access `A`.
#[repr(transparent)]
pub struct Reg<T: Width, A = RW> {
    cell: VolatileCell<T>,
    _access: PhantomData<A>,
}

impl<T: Width, A> Reg<T, A> {
    /// Raw pointer to the register, for the rare access the typed API can't
    /// express (and for tests that need to play the hardware's side).
    pub fn as_ptr(&self) -> *mut T {
        self.cell.as_ptr()
    }
}

impl<T: Width, A: Readable> Reg<T, A> {
    #[inline(always)]
    pub fn read(&self) -> T {
        self.cell.get()
    }

    pub fn get(&self, field: Field) -> u32 {
        field.extract(self.read().into_u32())
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.get(field) != 0
    }
}

impl<T: Width, A: Writable> Reg<T, A> {
    #[inline(always)]
    pub fn write(&self, value: T) {
        self.cell.set(value)
    }

    /// Writes a value assembled from `(field, value)` pairs, all other bits
    /// zero.
    pub fn write_fields(&self, fields: &[(Field, u32)]) {
        let v = fields.iter().fold(0, |acc, &(f, x)| f.insert(acc, x));
        self.write(T::from_u32(v));
    }
}

impl<T: Width> Reg<T, RW> {
    /// Read-modify-write. Not atomic with respect to interrupts; callers that
    /// share a register with a handler must hold off that handler.
    #[inline(always)]
    pub fn modify(&self, f: impl FnOnce(T) -> T) {
        self.write(f(self.read()))
    }

    pub fn set(&self, field: Field, value: u32) {
        self.modify(|r| T::from_u32(field.insert(r.into_u32(), value)))
    }

    pub fn set_bit(&self, field: Field) {
        self.set(field, 1)
    }

    pub fn clear_bit(&self, field: Field) {
        self.set(field, 0)
    }
}

/// Declares a `#[repr(C)]` register block from an offset table.
///
/// ```ignore
/// register_block! {
///     pub struct RegisterBlock {
///         0x00 => pub ctrl: Reg<u8>,
///         0x01 => _reserved0: [u8; 3],
///         0x04 => pub data: Reg<u32>,
///     }
/// }
/// ```
///
/// Gaps must be filled explicitly; each entry's offset is checked against
/// the compiled layout, so a missing gap or a wrong width is a build error.
#[macro_export]
macro_rules! register_block {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fattr:meta])*
                $off:literal => $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$attr])*
        #[repr(C)]
        #[allow(dead_code)]
        $vis struct $name {
            $( $(#[$fattr])* $fvis $field: $ty, )*
        }

        $(
            $crate::static_assertions::const_assert_eq!(
                ::core::mem::offset_of!($name, $field),
                $off
            );
        )*
    };
}
