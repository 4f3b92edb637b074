/// Wraps a value that a Python method may move out, leaving the Python object empty.
/// Using an emptied object raises instead of panicking.
#[macro_export]
macro_rules! MakeConsumable {
    ($name:ident, $inner_type:ty, $obj_name:ident) => {
        pub(super) struct $name {
            obj: Option<$inner_type>,
        }
        impl $name {
            pub(super) fn acquire(val: $inner_type) -> Self {
                Self { obj: Some(val) }
            }
            fn get_ref(&self) -> Result<&$inner_type, $crate::python_ffi::Consumed> {
                self.obj
                    .as_ref()
                    .ok_or($crate::python_ffi::Consumed(std::stringify!($obj_name)))
            }
            fn get_ref_mut(&mut self) -> Result<&mut $inner_type, $crate::python_ffi::Consumed> {
                self.obj
                    .as_mut()
                    .ok_or($crate::python_ffi::Consumed(std::stringify!($obj_name)))
            }
            fn release(&mut self) -> Result<$inner_type, $crate::python_ffi::Consumed> {
                self.obj
                    .take()
                    .ok_or($crate::python_ffi::Consumed(std::stringify!($obj_name)))
            }
        }
    };
}

#[macro_export]
macro_rules! Impl_to_PyErr {
    (for $($t:ty),+) => {
        $(impl From<$t> for PyErr {
            fn from(err: $t) -> Self {
                pyo3::exceptions::PyValueError::new_err(format!("{}", err))
            }
        }
        )*
    }
}
