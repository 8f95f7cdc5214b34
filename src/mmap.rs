//! Raw address-space reservation for the young semispace and the Immix
//! chunk arena. Both spaces need a stable, page-backed region that can be
//! decommitted (`dontneed`) and recommitted without moving, which rules out
//! a `Vec<u8>` standing in for the storage.

#[cfg(unix)]
mod _unix {
    use std::ptr::null_mut;

    pub struct Mmap {
        start: *mut u8,
        end: *mut u8,
        size: usize,
    }

    impl Mmap {
        pub const fn uninit() -> Self {
            Self {
                start: null_mut(),
                end: null_mut(),
                size: 0,
            }
        }

        /// Reserve `size` bytes, rounded up so the mapping start can be
        /// aligned to `align` by the caller via [`Mmap::aligned_start`].
        pub fn new(size: usize, align: usize) -> Self {
            let request = size + align;
            unsafe {
                let map = libc::mmap(
                    null_mut(),
                    request,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANON,
                    -1,
                    0,
                );
                if map == libc::MAP_FAILED {
                    panic!("mmap: reservation of {} bytes failed", request);
                }
                libc::madvise(map, request, libc::MADV_SEQUENTIAL);
                Self {
                    start: map.cast(),
                    end: map.cast::<u8>().add(request),
                    size: request,
                }
            }
        }

        pub fn aligned_start(&self, align: usize) -> *mut u8 {
            crate::util::align_up(self.start as usize, align) as *mut u8
        }

        pub fn start(&self) -> *mut u8 {
            self.start
        }

        pub fn end(&self) -> *mut u8 {
            self.end
        }

        pub const fn size(&self) -> usize {
            self.size
        }

        pub fn dontneed(&self, page: *mut u8, size: usize) {
            unsafe {
                libc::madvise(page.cast(), size, libc::MADV_DONTNEED);
            }
        }

        pub fn commit(&self, page: *mut u8, size: usize) {
            unsafe {
                libc::madvise(page.cast(), size, libc::MADV_WILLNEED);
            }
        }
    }

    impl Drop for Mmap {
        fn drop(&mut self) {
            if self.start.is_null() {
                return;
            }
            unsafe {
                libc::munmap(self.start.cast(), self.size);
            }
        }
    }
}

#[cfg(windows)]
mod _win {
    use std::ptr::null_mut;
    use winapi::um::{
        memoryapi::{VirtualAlloc, VirtualFree},
        winnt::{MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE},
    };

    pub struct Mmap {
        start: *mut u8,
        end: *mut u8,
        size: usize,
    }

    impl Mmap {
        pub const fn uninit() -> Self {
            Self {
                start: null_mut(),
                end: null_mut(),
                size: 0,
            }
        }

        pub fn new(size: usize, align: usize) -> Self {
            let request = size + align;
            unsafe {
                let mem = VirtualAlloc(null_mut(), request, MEM_RESERVE, PAGE_READWRITE) as *mut u8;
                if mem.is_null() {
                    panic!("VirtualAlloc: reservation of {} bytes failed", request);
                }
                Self {
                    start: mem,
                    end: mem.add(request),
                    size: request,
                }
            }
        }

        pub fn aligned_start(&self, align: usize) -> *mut u8 {
            crate::util::align_up(self.start as usize, align) as *mut u8
        }

        pub fn start(&self) -> *mut u8 {
            self.start
        }

        pub fn end(&self) -> *mut u8 {
            self.end
        }

        pub const fn size(&self) -> usize {
            self.size
        }

        pub fn dontneed(&self, page: *mut u8, size: usize) {
            unsafe {
                VirtualFree(page.cast(), size, MEM_DECOMMIT);
            }
        }

        pub fn commit(&self, page: *mut u8, size: usize) {
            unsafe {
                VirtualAlloc(page.cast(), size, MEM_COMMIT, PAGE_READWRITE);
            }
        }
    }

    impl Drop for Mmap {
        fn drop(&mut self) {
            if self.start.is_null() {
                return;
            }
            unsafe {
                VirtualFree(self.start.cast(), 0, MEM_RELEASE);
            }
        }
    }
}

#[cfg(unix)]
pub use _unix::Mmap;
#[cfg(windows)]
pub use _win::Mmap;

unsafe impl Send for Mmap {}
unsafe impl Sync for Mmap {}
