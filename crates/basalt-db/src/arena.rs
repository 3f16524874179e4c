//! Allocation arena for buffers handed across the library boundary.
//!
//! Strings and blobs returned by value accessors are allocated from an
//! [`Arena`] and must be released through the same arena. Inside Rust the
//! RAII wrappers ([`ArenaString`], [`ArenaBlob`]) do this on drop; at the C
//! boundary `basalt_free` releases into the process-wide [`SystemArena`].
//!
//! Every block carries a small header recording its size so that release
//! needs only the pointer.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Alignment of every block handed out by [`SystemArena`].
pub const BLOCK_ALIGN: usize = 16;

/// Header placed before the user region; padded to keep it aligned.
const HEADER: usize = BLOCK_ALIGN;

/// Point-in-time allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Blocks allocated and not yet released.
    pub live_blocks: usize,
    /// Bytes in live blocks, excluding headers.
    pub live_bytes: usize,
    /// Blocks allocated over the arena's lifetime.
    pub total_blocks: usize,
}

/// An allocator for buffers that outlive the call that produced them.
pub trait Arena: Send + Sync + fmt::Debug {
    /// Allocate `size` bytes aligned to [`BLOCK_ALIGN`].
    ///
    /// Returns `None` when the allocation cannot be satisfied.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Return a block to the arena.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same arena and
    /// must not have been released already.
    unsafe fn release(&self, ptr: NonNull<u8>);

    /// Current counters.
    fn stats(&self) -> ArenaStats;
}

/// Arena backed by the global allocator with live-block accounting.
#[derive(Debug, Default)]
pub struct SystemArena {
    live_blocks: AtomicUsize,
    live_bytes: AtomicUsize,
    total_blocks: AtomicUsize,
}

impl SystemArena {
    /// Create an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            live_blocks: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
            total_blocks: AtomicUsize::new(0),
        }
    }

    fn layout_for(size: usize) -> Option<Layout> {
        Layout::from_size_align(size.checked_add(HEADER)?, BLOCK_ALIGN).ok()
    }
}

impl Arena for SystemArena {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let layout = Self::layout_for(size)?;
        // SAFETY: layout has non-zero size (HEADER > 0).
        let base = NonNull::new(unsafe { alloc::alloc(layout) })?;
        // SAFETY: base is aligned to BLOCK_ALIGN >= align_of::<usize>() and
        // the block is at least HEADER bytes long.
        unsafe { base.as_ptr().cast::<usize>().write(size) };

        self.live_blocks.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(size, Ordering::Relaxed);
        self.total_blocks.fetch_add(1, Ordering::Relaxed);
        // SAFETY: HEADER is within the allocated block.
        Some(unsafe { base.add(HEADER) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: caller guarantees ptr came from `allocate`, which placed
        // the header HEADER bytes before it.
        let base = unsafe { ptr.sub(HEADER) };
        // SAFETY: header was written in `allocate`.
        let size = unsafe { base.as_ptr().cast::<usize>().read() };
        let Some(layout) = Self::layout_for(size) else {
            return;
        };
        // SAFETY: same pointer and layout as the original allocation.
        unsafe { alloc::dealloc(base.as_ptr(), layout) };

        self.live_blocks.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    fn stats(&self) -> ArenaStats {
        ArenaStats {
            live_blocks: self.live_blocks.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            total_blocks: self.total_blocks.load(Ordering::Relaxed),
        }
    }
}

static GLOBAL_ARENA: SystemArena = SystemArena::new();

/// The process-wide arena used by the C ABI.
#[must_use]
pub fn global_arena() -> &'static SystemArena {
    &GLOBAL_ARENA
}

/// Shared handle to the process-wide arena.
#[must_use]
pub fn default_arena() -> Arc<dyn Arena> {
    static SHARED: OnceLock<Arc<dyn Arena>> = OnceLock::new();
    Arc::clone(SHARED.get_or_init(|| Arc::new(GlobalArenaRef)))
}

/// Forwards to [`GLOBAL_ARENA`] so that buffers produced through an
/// `Arc<dyn Arena>` can still be released by `basalt_free`.
#[derive(Debug)]
struct GlobalArenaRef;

impl Arena for GlobalArenaRef {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        GLOBAL_ARENA.allocate(size)
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded contract.
        unsafe { GLOBAL_ARENA.release(ptr) }
    }

    fn stats(&self) -> ArenaStats {
        GLOBAL_ARENA.stats()
    }
}

/// An owned block from an [`Arena`], released on drop.
pub struct ArenaBuffer {
    arena: Arc<dyn Arena>,
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the buffer exclusively owns its block; the arena is Send + Sync.
unsafe impl Send for ArenaBuffer {}
// SAFETY: shared access only reads the block.
unsafe impl Sync for ArenaBuffer {}

impl ArenaBuffer {
    /// Copy `bytes` into a new block, optionally followed by a NUL byte.
    ///
    /// `len()` never counts the terminator.
    #[must_use]
    pub fn copy_from(arena: Arc<dyn Arena>, bytes: &[u8], nul_terminate: bool) -> Option<Self> {
        let capacity = bytes.len() + usize::from(nul_terminate);
        let ptr = arena.allocate(capacity)?;
        // SAFETY: the block holds `capacity` bytes and does not overlap `bytes`.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
            if nul_terminate {
                ptr.as_ptr().add(bytes.len()).write(0);
            }
        }
        Some(Self {
            arena,
            ptr,
            len: bytes.len(),
        })
    }

    /// Contents, excluding any terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: ptr points at `len` initialized bytes owned by self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Length in bytes, excluding any terminator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Give up ownership of the block.
    ///
    /// The caller becomes responsible for releasing the pointer into the
    /// arena it came from.
    #[must_use]
    pub fn into_raw(self) -> (*mut u8, usize) {
        let this = std::mem::ManuallyDrop::new(self);
        // Drop the arena handle; the block itself stays allocated.
        // SAFETY: `this` is never used again and its Drop does not run.
        drop(unsafe { std::ptr::read(&this.arena) });
        (this.ptr.as_ptr(), this.len)
    }
}

impl Drop for ArenaBuffer {
    fn drop(&mut self) {
        // SAFETY: the block came from this arena and is released once.
        unsafe { self.arena.release(self.ptr) };
    }
}

impl fmt::Debug for ArenaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaBuffer")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// A NUL-terminated UTF-8 string allocated from an arena.
#[derive(Debug)]
pub struct ArenaString(ArenaBuffer);

impl ArenaString {
    /// Copy `s` into the arena.
    #[must_use]
    pub fn new(arena: Arc<dyn Arena>, s: &str) -> Option<Self> {
        ArenaBuffer::copy_from(arena, s.as_bytes(), true).map(Self)
    }

    /// Borrow as `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // SAFETY: constructed only from `&str`.
        unsafe { std::str::from_utf8_unchecked(self.0.as_bytes()) }
    }

    /// Give up ownership, returning a NUL-terminated C string pointer.
    #[must_use]
    pub fn into_raw(self) -> *mut std::ffi::c_char {
        self.0.into_raw().0.cast()
    }
}

impl std::ops::Deref for ArenaString {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

/// An opaque byte buffer allocated from an arena.
#[derive(Debug)]
pub struct ArenaBlob(ArenaBuffer);

impl ArenaBlob {
    /// Copy `bytes` into the arena.
    #[must_use]
    pub fn new(arena: Arc<dyn Arena>, bytes: &[u8]) -> Option<Self> {
        ArenaBuffer::copy_from(arena, bytes, false).map(Self)
    }

    /// Borrow the bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Give up ownership, returning pointer and length.
    #[must_use]
    pub fn into_raw(self) -> (*mut u8, usize) {
        self.0.into_raw()
    }
}

impl std::ops::Deref for ArenaBlob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release_updates_counters() {
        let arena = SystemArena::new();
        let a = arena.allocate(10).unwrap();
        let b = arena.allocate(0).unwrap();
        assert_eq!(a.as_ptr() as usize % BLOCK_ALIGN, 0);
        assert_eq!(
            arena.stats(),
            ArenaStats {
                live_blocks: 2,
                live_bytes: 10,
                total_blocks: 2,
            }
        );

        // SAFETY: both came from `arena`.
        unsafe {
            arena.release(a);
            arena.release(b);
        }
        let stats = arena.stats();
        assert_eq!(stats.live_blocks, 0);
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.total_blocks, 2);
    }

    #[test]
    fn test_string_is_nul_terminated() {
        let arena: Arc<dyn Arena> = Arc::new(SystemArena::new());
        let s = ArenaString::new(Arc::clone(&arena), "héllo").unwrap();
        assert_eq!(s.as_str(), "héllo");
        assert_eq!(arena.stats().live_bytes, "héllo".len() + 1);

        let raw = s.into_raw();
        // SAFETY: raw is a NUL-terminated string we own.
        let c = unsafe { std::ffi::CStr::from_ptr(raw) };
        assert_eq!(c.to_str().unwrap(), "héllo");
        // SAFETY: raw came from `arena`.
        unsafe { arena.release(NonNull::new(raw.cast()).unwrap()) };
        assert_eq!(arena.stats().live_blocks, 0);
    }

    #[test]
    fn test_drop_releases() {
        let arena: Arc<dyn Arena> = Arc::new(SystemArena::new());
        {
            let blob = ArenaBlob::new(Arc::clone(&arena), &[1, 2, 3]).unwrap();
            assert_eq!(&*blob, &[1, 2, 3]);
            assert_eq!(arena.stats().live_blocks, 1);
        }
        assert_eq!(arena.stats().live_blocks, 0);
    }
}
