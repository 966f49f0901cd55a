use std::fmt;
use std::ops::{Deref, Range};
use std::sync::Arc;

pub trait Input: Clone + Send + Sync + std::fmt::Debug + 'static {
    fn as_bytes(&self) -> &[u8];
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
}

impl Input for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }
    fn len(&self) -> usize {
        self.len()
    }
    fn is_empty(&self) -> bool {
        self.is_empty()
    }
}

/// One fuzz case as handed to an entry point.
///
/// Entry points wrap the driver's buffer in place, so a parser reading past
/// the end of the input hits the driver's own allocation boundary. Every chunk
/// handed downstream is a view into that buffer, never a copy.
#[derive(Clone)]
pub struct FuzzInput {
    storage: Storage,
}

#[derive(Clone)]
enum Storage {
    Owned(Arc<[u8]>),
    /// Borrowed from the caller of [`FuzzInput::wrap`].
    Wrapped { ptr: *const u8, len: usize },
}

// SAFETY: the bytes behind either variant are never written through. A
// wrapped buffer outlives every clone by the contract of `FuzzInput::wrap`,
// so sharing the pointer with streaming threads is sound.
unsafe impl Send for FuzzInput {}
unsafe impl Sync for FuzzInput {}

impl FuzzInput {
    /// Takes a private copy of `data`. For inputs that outlive any single
    /// call, such as replayed files.
    pub fn copied(data: &[u8]) -> Self {
        Self {
            storage: Storage::Owned(Arc::from(data)),
        }
    }

    /// Wraps `data` without copying it.
    ///
    /// # Safety
    ///
    /// The returned input and every clone or slice of it must be dropped
    /// before `data` is. Entry points uphold this by tearing down the
    /// pipeline or discoverer that holds them before returning.
    pub unsafe fn wrap(data: &[u8]) -> Self {
        Self {
            storage: Storage::Wrapped {
                ptr: data.as_ptr(),
                len: data.len(),
            },
        }
    }

    /// Total size as the framework expects it.
    pub fn total_size(&self) -> u64 {
        self.as_bytes().len() as u64
    }

    /// Zero-copy view of `range`. Panics if the range is out of bounds, which
    /// callers rule out by clamping against `total_size` first.
    pub fn slice(&self, range: Range<usize>) -> InputSlice {
        let len = self.as_bytes().len();
        assert!(
            range.start <= range.end && range.end <= len,
            "slice {range:?} out of bounds for input of {len} bytes"
        );
        InputSlice {
            input: self.clone(),
            range,
        }
    }
}

impl PartialEq for FuzzInput {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for FuzzInput {}

impl fmt::Debug for FuzzInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuzzInput")
            .field("len", &self.len())
            .field("md5", &format_args!("{:x}", md5::compute(self.as_bytes())))
            .finish()
    }
}

impl Input for FuzzInput {
    fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(bytes) => &bytes[..],
            // SAFETY: `ptr` and `len` came from a live slice, which `wrap`'s
            // caller keeps alive and unmodified for as long as `self` exists.
            Storage::Wrapped { ptr, len } => unsafe { std::slice::from_raw_parts(*ptr, *len) },
        }
    }
    fn len(&self) -> usize {
        self.as_bytes().len()
    }
    fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// A contiguous window of a [`FuzzInput`] starting at `offset()`.
#[derive(Clone)]
pub struct InputSlice {
    input: FuzzInput,
    range: Range<usize>,
}

impl InputSlice {
    pub fn offset(&self) -> u64 {
        self.range.start as u64
    }
}

impl AsRef<[u8]> for InputSlice {
    fn as_ref(&self) -> &[u8] {
        &self.input.as_bytes()[self.range.clone()]
    }
}

impl Deref for InputSlice {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

impl PartialEq for InputSlice {
    fn eq(&self, other: &Self) -> bool {
        self.range == other.range && self.as_ref() == other.as_ref()
    }
}

impl Eq for InputSlice {}

impl fmt::Debug for InputSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputSlice({:?})", self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_u8_impl_input() {
        let data: Vec<u8> = vec![1, 2, 3];
        let empty_data: Vec<u8> = vec![];
        assert_eq!(data.as_bytes(), &[1, 2, 3]);
        assert_eq!(data.len(), 3);
        assert!(!data.is_empty());
        assert!(empty_data.is_empty());
    }

    #[test]
    fn fuzz_input_slices_share_storage() {
        let input = FuzzInput::copied(b"OggS\0\x02rest");
        let head = input.slice(0..4);
        let tail = input.slice(4..10);

        assert_eq!(&*head, b"OggS");
        assert_eq!(tail.offset(), 4);
        assert_eq!(tail.len(), 6);
        assert_eq!(
            head.as_ptr(),
            input.as_bytes().as_ptr(),
            "slices must view the input, not copy it"
        );
    }

    #[test]
    fn wrapped_input_aliases_the_callers_buffer() {
        let driver = b"OggS\0\x02 driver-owned bytes".to_vec();
        // SAFETY: `input` and its slices are dropped before `driver`.
        let input = unsafe { FuzzInput::wrap(&driver) };
        let tail = input.slice(4..driver.len());

        assert_eq!(
            input.as_bytes().as_ptr(),
            driver.as_ptr(),
            "driver ptr {:p} input ptr {:p}",
            driver.as_ptr(),
            input.as_bytes().as_ptr()
        );
        assert_eq!(input.total_size(), driver.len() as u64);
        assert_eq!(tail.as_ptr(), driver[4..].as_ptr());
        assert_eq!(input, FuzzInput::copied(&driver));
        drop(tail);
        drop(input);
    }

    #[test]
    fn wrapped_empty_input_is_empty() {
        // SAFETY: the empty literal is 'static.
        let input = unsafe { FuzzInput::wrap(&[]) };
        assert!(input.is_empty());
        assert!(input.slice(0..0).is_empty());
    }

    #[test]
    fn empty_range_at_end_is_allowed() {
        let input = FuzzInput::copied(&[7, 7]);
        let slice = input.slice(2..2);
        assert!(slice.is_empty());
        assert_eq!(slice.offset(), 2);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn slice_past_end_panics() {
        let input = FuzzInput::copied(&[1]);
        let _ = input.slice(0..2);
    }
}
