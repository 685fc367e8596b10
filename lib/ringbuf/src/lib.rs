// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring buffer for debugging drivers and firmware
//!
//! This contains an implementation for a static ring buffer designed to be used
//! to instrument arbitrary contexts, including interrupt handlers.  While there
//! is nothing to prevent these ring buffers from being left in production
//! code, the design center is primarily around debugging in development: the
//! ring buffers are meant to be read out with a debugger.
//!
//! ## Constraints
//!
//! The main constraint for a ring buffer is that the type in the ring buffer
//! must implement both `Copy` and `PartialEq`.
//!
//! Recording an entry takes a [`critical_section`], so the final binary must
//! link exactly one critical-section implementation. On the RX targets that is
//! the one that masks interrupts through the `I` flag in PSW; host tests use
//! the `std` implementation.
//!
//! If you use the variants of the `ringbuf!` macro that leave the name of the
//! data structure implicit, you can only have one per module. (You can lift
//! this constraint by providing a name.)
//!
//! ## Creating a ring buffer
//!
//! Ring buffers are instantiated with the [`ringbuf!`] macro, to which one
//! must provide the type of per-entry payload, the number of entries, and a
//! static initializer.  For example, to define a 16-entry ring buffer with
//! each entry containing a [`core::u32`].
//!
//! ```
//! ringbuf!(u32, 16, 0);
//! ```
//!
//! Ring buffer entries are generated with [`ringbuf_entry!`] specifying a
//! payload of the appropriate type, e.g.:
//!
//! ```
//! ringbuf_entry!(ssr.bits());
//! ```
//!
//! You can also provide a name for the ring buffer, to distinguish between them
//! if you have more than one:
//!
//! ```
//! ringbuf!(MY_RINGBUF, u32, 16, 0);
//!
//! // ...
//!
//! ringbuf_entry!(MY_RINGBUF, ssr.bits());
//! ```
//!
//! ## Inspecting a ring buffer via GDB
//!
//! Assuming symbols are loaded, one can use GDB's `print` command,
//! specifying the crate that contains the ring buffer and the appropriate
//! `RINGBUF` variable.  The entries sit behind the critical-section mutex:
//!
//! ```console
//! (gdb) set print pretty on
//! (gdb) print drv_rx_rspi::__RINGBUF.inner.value
//! ```

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;

/// Re-export the bits we use from `critical_section` so that code generated by
/// the macros is guaranteed to be able to find them.
pub use critical_section;
pub use critical_section::Mutex;

/// Declares a ringbuffer in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ringbuffer named `NAME`,
/// containing entries of type `Type`, with room for `N` such entries, all of
/// which are initialized to `expr`.
///
/// The resulting ringbuffer will be static, so `NAME` should be uppercase, and
/// by convention it ends in `RINGBUF`.
///
/// The actual type of `name` will be `Mutex<RefCell<Ringbuf<T, N>>>`.
///
/// To support the common case of having one quickly-installed ringbuffer per
/// module, if you omit the name, it will default to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::Mutex<
            ::core::cell::RefCell<$crate::Ringbuf<$t, $n>>,
        > = $crate::Mutex::new(::core::cell::RefCell::new(
            $crate::Ringbuf::new($init),
        ));
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
        // Named entries still take a reference to the buffer.
        #[allow(dead_code)]
        static $name: () = ();
    };
    ($t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
}

/// Inserts data into a named ringbuffer (which should have been declared with
/// the `ringbuf!` macro).
///
/// `ringbuf_entry!(NAME, expr)` will insert `expr` into the ringbuffer called
/// `NAME`.
///
/// If you declared your ringbuffer without a name, you can also use this
/// without a name, and it will default to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate both buf and payload, without letting them access each
        // other, by evaluating them in a tuple where each cannot
        // accidentally use the other's binding.
        let (p, buf) = ($payload, &$buf);
        $crate::record(buf, line!() as u16, p);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let _ = &$buf;
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}

/// Inserts data into a ringbuffer at the root of this crate.
#[cfg(not(feature = "disabled"))]
#[allow(clippy::crate_in_macro_def)]
#[macro_export]
macro_rules! ringbuf_entry_root {
    ($buf:ident, $payload:expr) => {
        $crate::ringbuf_entry!(crate::$buf, $payload);
    };
    ($payload:expr) => {
        $crate::ringbuf_entry!(crate::__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry_root {
    ($buf:ident, $payload:expr) => {{
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}

/// Records `payload` into `buf` under a critical section. This is what
/// [`ringbuf_entry!`] expands to; calling it directly is unusual.
#[doc(hidden)]
pub fn record<T: Copy + PartialEq, const N: usize>(
    buf: &Mutex<RefCell<Ringbuf<T, N>>>,
    line: u16,
    payload: T,
) {
    critical_section::with(|cs| {
        // Only reentry from inside `entry` could find it borrowed; such an
        // entry is dropped.
        if let Ok(mut ring) = buf.borrow(cs).try_borrow_mut() {
            ring.entry(line, payload);
        }
    })
}

///
/// The structure of a single [`Ringbuf`] entry, carrying a payload of arbitrary
/// type.  When a ring buffer entry is generated with an identical payload to
/// the most recent entry (in terms of both `line` and `payload`), `count` will
/// be incremented rather than generating a new entry.
///
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

///
/// A ring buffer of parametrized type and size.  In practice, instantiating
/// this directly is strange -- see the [`ringbuf!`] macro.
///
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // If this is the first time this ringbuf has been poked, last will be
        // None. In this specific case we want to make sure we don't add to the
        // count of an existing entry, and also that we deposit the first entry
        // in slot 0. From a code generation perspective, the cheapest thing to
        // do is to treat None as an out-of-range value:
        let last = self.last.unwrap_or(usize::MAX);

        // Check to see if we can reuse the most recent entry. get_mut also
        // covers a corrupted `last`, in which case we start over at 0 below
        // instead of panicking on a bounds check.
        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                // Only reuse this entry if we don't overflow the
                // count.
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // Advance last and wrap if required. wrapping_add turns usize::MAX
        // into 0 for the starting condition. No remainder: the RX cores have
        // a divider but it's many cycles, and we're often in an ISR.
        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }

    /// Returns the most recently recorded entry, if any.
    pub fn latest(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|i| self.buffer.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq)]
    enum Trace {
        None,
        Start(u32),
        Stop,
    }

    #[test]
    fn first_entry_lands_in_slot_zero() {
        let mut ring = Ringbuf::<Trace, 4>::new(Trace::None);
        assert!(ring.latest().is_none());

        ring.entry(10, Trace::Start(1));
        assert_eq!(ring.last, Some(0));
        let ent = ring.latest().unwrap();
        assert_eq!(ent.line, 10);
        assert_eq!(ent.count, 1);
        assert_eq!(ent.generation, 1);
        assert_eq!(ent.payload, Trace::Start(1));
    }

    #[test]
    fn repeats_are_counted() {
        let mut ring = Ringbuf::<Trace, 4>::new(Trace::None);

        for _ in 0..5 {
            ring.entry(20, Trace::Stop);
        }
        assert_eq!(ring.last, Some(0));
        assert_eq!(ring.buffer[0].count, 5);

        // Same payload from a different line is a new entry.
        ring.entry(21, Trace::Stop);
        assert_eq!(ring.last, Some(1));
        assert_eq!(ring.buffer[1].count, 1);
    }

    #[test]
    fn wraps_and_bumps_generation() {
        let mut ring = Ringbuf::<Trace, 3>::new(Trace::None);

        for i in 0..7 {
            ring.entry(1, Trace::Start(i));
        }
        // Seven entries into three slots: slot 0 has been written three
        // times and holds the last one.
        assert_eq!(ring.last, Some(0));
        assert_eq!(ring.buffer[0].generation, 3);
        assert_eq!(ring.buffer[0].payload, Trace::Start(6));
        assert_eq!(ring.buffer[1].generation, 2);
        assert_eq!(ring.buffer[2].generation, 2);
    }

    #[test]
    fn corrupted_last_restarts_at_zero() {
        let mut ring = Ringbuf::<Trace, 2>::new(Trace::None);
        ring.last = Some(17);
        ring.entry(3, Trace::Stop);
        assert_eq!(ring.last, Some(0));
    }

    #[cfg(not(feature = "disabled"))]
    #[test]
    fn macro_records_through_critical_section() {
        ringbuf!(TEST_RINGBUF, Trace, 8, Trace::None);

        ringbuf_entry!(TEST_RINGBUF, Trace::Start(9));
        ringbuf_entry!(TEST_RINGBUF, Trace::Stop);

        critical_section::with(|cs| {
            let ring = TEST_RINGBUF.borrow(cs).borrow();
            assert_eq!(ring.last, Some(1));
            assert_eq!(ring.buffer[0].payload, Trace::Start(9));
            assert_eq!(ring.buffer[1].payload, Trace::Stop);
            assert!(ring.buffer[1].line > ring.buffer[0].line);
        });
    }
}
