//! Scoped floating-point environment control.
//!
//! Range normalization intentionally divides by zero in unused SIMD lanes,
//! so compression runs with floating-point exception traps disabled. The
//! guard saves the ambient environment on construction and restores it on
//! drop, covering every exit path of the compression call.

/// Disables floating-point exception traps for the guard's lifetime.
///
/// Construct one at the top of a compression call; the previous environment
/// is restored when the guard goes out of scope.
// The `libc` crate does not expose `fenv.h` bindings, so the glibc ABI for
// `fenv_t` (opaque 32-byte/4-byte-aligned struct on x86_64) and the two
// functions we need are declared directly against libc here.
#[cfg(target_os = "linux")]
#[repr(C, align(4))]
#[derive(Clone, Copy)]
struct fenv_t([u8; 32]);

#[cfg(target_os = "linux")]
extern "C" {
    fn feholdexcept(envp: *mut fenv_t) -> libc::c_int;
    fn fesetenv(envp: *const fenv_t) -> libc::c_int;
}

#[cfg(target_os = "linux")]
pub(crate) struct FpExceptionGuard {
    saved: fenv_t,
}

#[cfg(target_os = "linux")]
impl FpExceptionGuard {
    pub(crate) fn new() -> Self {
        let mut saved = core::mem::MaybeUninit::<fenv_t>::uninit();
        // feholdexcept saves the environment, clears exception flags and
        // installs non-stop mode in a single call.
        let rc = unsafe { feholdexcept(saved.as_mut_ptr()) };
        debug_assert_eq!(rc, 0, "feholdexcept failed");
        Self { saved: unsafe { saved.assume_init() } }
    }
}

#[cfg(target_os = "linux")]
impl Drop for FpExceptionGuard {
    fn drop(&mut self) {
        let rc = unsafe { fesetenv(&self.saved) };
        debug_assert_eq!(rc, 0, "fesetenv failed");
    }
}

/// No-op guard for targets without `fenv` access; exception traps are off by
/// default there.
#[cfg(not(target_os = "linux"))]
pub(crate) struct FpExceptionGuard;

#[cfg(not(target_os = "linux"))]
impl FpExceptionGuard {
    pub(crate) fn new() -> Self {
        Self
    }
}
