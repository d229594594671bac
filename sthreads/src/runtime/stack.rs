use crate::error::{Error, Result};

use libc::{
    MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, MAP_STACK, PROT_NONE, PROT_READ, PROT_WRITE,
    _SC_PAGESIZE, c_void, mmap, mprotect, munmap, sysconf,
};
use std::io;
use std::ptr;

/// Default usable stack size of a spawned thread (800 KiB).
pub const DEFAULT_STACK_SIZE: usize = 800 * 1024;

/// Smallest stack size accepted by the builder.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// An anonymous memory mapping used as a thread stack.
///
/// The lowest page is mapped `PROT_NONE` so running off the end of the
/// stack faults instead of silently corrupting a neighbouring mapping.
/// The mapping is released on drop.
pub(crate) struct Stack {
    /// Start of the whole mapping, guard page included.
    mapping: *mut c_void,
    /// Length of the whole mapping.
    mapping_len: usize,
    /// Length of the guard page.
    guard_len: usize,
}

impl Stack {
    /// Maps a stack with at least `size` usable bytes.
    pub(crate) fn new(size: usize) -> Result<Self> {
        let page = page_size();
        let mapping_len = size
            .checked_next_multiple_of(page)
            .and_then(|usable| usable.checked_add(page))
            .ok_or_else(|| Error::Resource {
                what: "thread stack",
                source: io::Error::from_raw_os_error(libc::ENOMEM),
            })?;

        let mapping = unsafe {
            mmap(
                ptr::null_mut(),
                mapping_len,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_STACK,
                -1,
                0,
            )
        };
        if mapping == MAP_FAILED {
            return Err(Error::resource("thread stack"));
        }

        if unsafe { mprotect(mapping, page, PROT_NONE) } != 0 {
            let err = Error::resource("stack guard page");
            unsafe { munmap(mapping, mapping_len) };
            return Err(err);
        }

        Ok(Self {
            mapping,
            mapping_len,
            guard_len: page,
        })
    }

    /// Lowest usable address (just above the guard page).
    pub(crate) fn base(&self) -> *mut c_void {
        unsafe { (self.mapping as *mut u8).add(self.guard_len) as *mut c_void }
    }

    /// Usable size in bytes.
    pub(crate) fn len(&self) -> usize {
        self.mapping_len - self.guard_len
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            munmap(self.mapping, self.mapping_len);
        }
    }
}

fn page_size() -> usize {
    match unsafe { sysconf(_SC_PAGESIZE) } {
        n if n > 0 => n as usize,
        _ => 4096,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usable_size_is_rounded_up_to_pages() {
        let stack = Stack::new(MIN_STACK_SIZE + 1).unwrap();
        let page = page_size();

        assert!(stack.len() > MIN_STACK_SIZE);
        assert_eq!(stack.len() % page, 0);
        assert_eq!(stack.base() as usize % page, 0);
    }

    #[test]
    fn oversized_stack_is_a_resource_error() {
        assert!(matches!(
            Stack::new(usize::MAX),
            Err(Error::Resource { what: "thread stack", .. })
        ));
        assert!(matches!(
            Stack::new(1 << 62),
            Err(Error::Resource { .. })
        ));
    }

    #[test]
    fn usable_region_is_writable() {
        let stack = Stack::new(MIN_STACK_SIZE).unwrap();

        unsafe {
            let bytes = std::slice::from_raw_parts_mut(stack.base() as *mut u8, stack.len());
            bytes[0] = 0xAA;
            bytes[stack.len() - 1] = 0x55;
            assert_eq!(bytes[0], 0xAA);
            assert_eq!(bytes[stack.len() - 1], 0x55);
        }
    }
}
