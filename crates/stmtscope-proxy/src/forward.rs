//! Mechanical delegation.

/// Generate trait methods that call the same method on a field.
///
/// ```ignore
/// forward! { delegate =>
///     fn get_fetch_size(&self) -> SqlResult<u32>;
///     fn set_fetch_size(&mut self, rows: u32) -> SqlResult<()>;
/// }
/// ```
macro_rules! forward {
    ($field:ident => $($body:tt)*) => {
        forward!(@munch $field; $($body)*);
    };
    (@munch $field:ident;) => {};
    (@munch $field:ident;
        fn $name:ident(&self $(, $arg:ident: $ty:ty)* $(,)?) -> $ret:ty;
        $($rest:tt)*
    ) => {
        fn $name(&self $(, $arg: $ty)*) -> $ret {
            self.$field.$name($($arg),*)
        }
        forward!(@munch $field; $($rest)*);
    };
    (@munch $field:ident;
        fn $name:ident(&mut self $(, $arg:ident: $ty:ty)* $(,)?) -> $ret:ty;
        $($rest:tt)*
    ) => {
        fn $name(&mut self $(, $arg: $ty)*) -> $ret {
            self.$field.$name($($arg),*)
        }
        forward!(@munch $field; $($rest)*);
    };
}
