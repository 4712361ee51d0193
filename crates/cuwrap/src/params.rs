//! Marshalling of kernel arguments.
//!
//! The driver takes one pointer per kernel parameter, each pointing at the
//! parameter's bytes. [`KernelParams`] copies every argument into its own
//! 8-byte aligned slot, so the pointers stay valid for as long as the buffer
//! lives, regardless of where the caller's values were.

use std::ffi::c_void;

use bytemuck::Pod;

/// Argument values laid out for the driver.
#[derive(Debug, Clone, Default)]
pub struct KernelParams {
    slots: Vec<Slot>,
}

#[derive(Debug, Clone)]
struct Slot {
    words: Vec<u64>,
    len: usize,
}

impl KernelParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one parameter given as raw bytes.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let mut words = vec![0u64; bytes.len().div_ceil(8).max(1)];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        self.slots.push(Slot { words, len: bytes.len() });
    }

    pub fn push<T: KernelParameter + ?Sized>(&mut self, value: &T) {
        value.write_param(self);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bytes of parameter `index`.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.slots
            .get(index)
            .map(|s| &bytemuck::cast_slice::<u64, u8>(&s.words)[..s.len])
    }

    /// One pointer per slot, valid while `self` is neither moved nor modified.
    pub(crate) fn pointers(&mut self) -> Vec<*mut c_void> {
        self.slots
            .iter_mut()
            .map(|s| s.words.as_mut_ptr() as *mut c_void)
            .collect()
    }
}

/// A value that can be passed to a kernel.
pub trait KernelParameter {
    fn write_param(&self, params: &mut KernelParams);
}

macro_rules! impl_scalar_param {
    ($($t:ty),* $(,)?) => {
        $(
            impl KernelParameter for $t {
                fn write_param(&self, params: &mut KernelParams) {
                    params.push_bytes(bytemuck::bytes_of(self));
                }
            }
        )*
    };
}

impl_scalar_param!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, usize, isize, f32, f64);

impl KernelParameter for bool {
    fn write_param(&self, params: &mut KernelParams) {
        params.push_bytes(&[u8::from(*self)]);
    }
}

/// References pass the referenced value.
impl<T: KernelParameter + ?Sized> KernelParameter for &T {
    fn write_param(&self, params: &mut KernelParams) {
        (**self).write_param(params);
    }
}

impl<T: KernelParameter + ?Sized> KernelParameter for &mut T {
    fn write_param(&self, params: &mut KernelParams) {
        (**self).write_param(params);
    }
}

/// Slices pass the address of their first element.
impl<T> KernelParameter for [T] {
    fn write_param(&self, params: &mut KernelParams) {
        let address = self.as_ptr() as usize as u64;
        params.push_bytes(&address.to_ne_bytes());
    }
}

/// Arrays pass the address of their first element, like slices.
impl<T, const N: usize> KernelParameter for [T; N] {
    fn write_param(&self, params: &mut KernelParams) {
        self.as_slice().write_param(params);
    }
}

/// Passes any plain-old-data value (such as a `#[repr(C)]` struct) by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByValue<T>(pub T);

impl<T: Pod> KernelParameter for ByValue<T> {
    fn write_param(&self, params: &mut KernelParams) {
        params.push_bytes(bytemuck::bytes_of(&self.0));
    }
}

/// The full argument list of a launch: a tuple of [`KernelParameter`]s.
pub trait KernelArgs {
    fn marshal(&self) -> KernelParams;
}

impl KernelArgs for KernelParams {
    fn marshal(&self) -> KernelParams {
        self.clone()
    }
}

impl KernelArgs for () {
    fn marshal(&self) -> KernelParams {
        KernelParams::new()
    }
}

macro_rules! impl_kernel_args {
    ($($name:ident),+) => {
        impl<$($name: KernelParameter),+> KernelArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn marshal(&self) -> KernelParams {
                let ($($name,)+) = self;
                let mut params = KernelParams::new();
                $(params.push($name);)+
                params
            }
        }
    };
}

impl_kernel_args!(A);
impl_kernel_args!(A, B);
impl_kernel_args!(A, B, C);
impl_kernel_args!(A, B, C, D);
impl_kernel_args!(A, B, C, D, E);
impl_kernel_args!(A, B, C, D, E, F);
impl_kernel_args!(A, B, C, D, E, F, G);
impl_kernel_args!(A, B, C, D, E, F, G, H);
impl_kernel_args!(A, B, C, D, E, F, G, H, I);
impl_kernel_args!(A, B, C, D, E, F, G, H, I, J);
impl_kernel_args!(A, B, C, D, E, F, G, H, I, J, K);
impl_kernel_args!(A, B, C, D, E, F, G, H, I, J, K, L);
