// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-capacity byte FIFO shared between an interrupt handler and the main
//! loop.
//!
//! Every interrupt-driven serial or SPI driver in this workspace moves bytes
//! between interrupt context and application context through a pair of
//! these: one carrying received bytes from the handler to the main loop, one
//! carrying queued bytes the other way.
//!
//! # Contract
//!
//! A `Fifo` has exactly one producer context, which calls [`Fifo::put`], and
//! exactly one consumer context, which calls [`Fifo::get`]. Either side may
//! call [`Fifo::length`] at any time. The put cursor is only ever written by
//! the producer and the get cursor only by the consumer, so no lock and no
//! read-modify-write atomic is needed: each side publishes its own cursor with
//! a plain store and observes the other's with a plain load.
//!
//! [`Fifo::split`] hands out a [`Producer`] and a [`Consumer`] that encode
//! this contract in the types; statics shared with interrupt handlers use
//! the `&self` methods directly and rely on the caller keeping to it.
//!
//! # Overflow
//!
//! There is no reserved slot, and `put` never refuses a byte. Putting the
//! `N`th unread byte moves the put cursor onto the get cursor, after which
//! the FIFO reports a length of zero; further puts overwrite unread data.
//! This keeps `put` constant-time with no error path, which is what an
//! interrupt handler wants. The number of times this has happened is kept
//! in a separate counter ([`Fifo::overruns`]) that does not affect the data
//! path.
//!
//! # Reading an empty FIFO
//!
//! [`Fifo::get`] does not check for data. On an empty FIFO it returns
//! whatever byte last occupied the slot under the get cursor and moves the
//! cursor anyway. Check [`Fifo::length`] first, or use [`Consumer::pop`].

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

/// A byte FIFO of capacity `N`.
///
/// Storage is inline, so a `Fifo` is normally a `static` or a field of the
/// driver state that owns it.
pub struct Fifo<const N: usize> {
    buffer: [AtomicU8; N],
    get: AtomicUsize,
    put: AtomicUsize,
    overruns: AtomicU32,
}

impl<const N: usize> Fifo<N> {
    const NONZERO: () = assert!(N > 0, "a Fifo needs at least one slot");

    /// Creates an empty FIFO with both cursors at zero.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NONZERO;
        Self {
            buffer: [const { AtomicU8::new(0) }; N],
            get: AtomicUsize::new(0),
            put: AtomicUsize::new(0),
            overruns: AtomicU32::new(0),
        }
    }

    /// Discards all content by moving both cursors back to zero, and resets
    /// the overrun count.
    ///
    /// Neither the producer nor the consumer may be active while this runs;
    /// drivers call it with the relevant interrupt disabled.
    pub fn clear(&self) {
        self.get.store(0, Ordering::Relaxed);
        self.put.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
    }

    /// Stores `byte` at the put cursor and advances it. Producer only.
    pub fn put(&self, byte: u8) {
        // We are the only writer of `put` and `overruns`, so a relaxed load
        // of our own state is always current.
        let put = self.put.load(Ordering::Relaxed);
        let next = bump::<N>(put);

        let wrapped = next == self.get.load(Ordering::Acquire);
        let overruns = self.overruns.load(Ordering::Relaxed);
        self.overruns
            .store(overruns.wrapping_add(wrapped as u32), Ordering::Relaxed);

        self.buffer[put].store(byte, Ordering::Relaxed);
        // Publish the byte to the consumer.
        self.put.store(next, Ordering::Release);
    }

    /// Reads the byte at the get cursor and advances it. Consumer only.
    ///
    /// The caller must have seen `length() > 0`; see the crate docs for what
    /// happens otherwise.
    pub fn get(&self) -> u8 {
        let get = self.get.load(Ordering::Relaxed);
        let byte = self.buffer[get].load(Ordering::Relaxed);
        // Hand the slot back to the producer.
        self.get.store(bump::<N>(get), Ordering::Release);
        byte
    }

    /// Returns the number of unread bytes, `(put - get) mod N`.
    pub fn length(&self) -> usize {
        let put = self.put.load(Ordering::Acquire);
        let get = self.get.load(Ordering::Acquire);
        if put >= get {
            put - get
        } else {
            N + put - get
        }
    }

    /// Returns the capacity `N`.
    pub const fn size(&self) -> usize {
        N
    }

    /// Current get cursor.
    pub fn pos_get(&self) -> usize {
        self.get.load(Ordering::Relaxed)
    }

    /// Current put cursor.
    pub fn pos_put(&self) -> usize {
        self.put.load(Ordering::Relaxed)
    }

    /// Number of puts that landed the put cursor on the get cursor since the
    /// last [`Fifo::clear`].
    ///
    /// Nonzero means data was lost, but the count is a lower bound: once the
    /// cursors have met, the true unread count is gone, and later puts that
    /// overwrite unread bytes without meeting the get cursor again are not
    /// counted.
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Splits the FIFO into its producer and consumer halves.
    ///
    /// Holding `&mut self` for the lifetime of the halves guarantees nobody
    /// else can put, get or clear while they exist.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let fifo = &*self;
        (Producer { fifo }, Consumer { fifo })
    }
}

impl<const N: usize> Default for Fifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Steps a cursor forward by one slot without using a divide; our targets
/// have no hardware modulus.
#[inline(always)]
fn bump<const N: usize>(cursor: usize) -> usize {
    let next = cursor + 1;
    if next >= N {
        0
    } else {
        next
    }
}

/// The writing half of a split [`Fifo`].
pub struct Producer<'a, const N: usize> {
    fifo: &'a Fifo<N>,
}

impl<const N: usize> Producer<'_, N> {
    pub fn put(&mut self, byte: u8) {
        self.fifo.put(byte)
    }

    pub fn length(&self) -> usize {
        self.fifo.length()
    }

    /// Slots that can be filled before the FIFO reports itself empty again.
    pub fn space(&self) -> usize {
        N - 1 - self.fifo.length()
    }
}

/// The reading half of a split [`Fifo`].
pub struct Consumer<'a, const N: usize> {
    fifo: &'a Fifo<N>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Unchecked read; see [`Fifo::get`].
    pub fn get(&mut self) -> u8 {
        self.fifo.get()
    }

    /// Reads one byte if there is one.
    pub fn pop(&mut self) -> Option<u8> {
        if self.fifo.length() > 0 {
            Some(self.fifo.get())
        } else {
            None
        }
    }

    pub fn length(&self) -> usize {
        self.fifo.length()
    }
}
