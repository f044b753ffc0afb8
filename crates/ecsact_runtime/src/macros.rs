//! Internal macros for declaring native function tables

/// Declare a table of native entry points for one ABI module.
///
/// Generates a `Copy` struct of [`NativeFn`](crate::NativeFn) fields plus
/// `missing()` (every entry unresolved), `resolve()` and `SYMBOLS`.
///
/// # Example
/// ```ignore
/// native_fns! {
///     pub(crate) struct CoreFns: AbiModule::Core {
///         create_entity: "ecsact_create_entity" => CreateEntityFn,
///     }
/// }
/// ```
macro_rules! native_fns {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident: $module:path {
            $($field:ident: $symbol:literal => $ty:ty,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug)]
        $vis struct $name {
            $(pub(crate) $field: $crate::NativeFn<$ty>,)+
        }

        impl $name {
            #[allow(dead_code)]
            pub(crate) const SYMBOLS: &'static [&'static str] = &[$($symbol),+];

            pub(crate) const fn missing() -> Self {
                Self {
                    $($field: $crate::NativeFn::missing($symbol),)+
                }
            }

            pub(crate) fn resolve(
                source: &dyn $crate::SymbolSource,
                loaded: &mut $crate::LoadedMethods,
            ) -> Self {
                let mut resolver = $crate::loader::Resolver::new(source, loaded, $module);
                // SAFETY: each field type mirrors the C declaration of its symbol.
                unsafe {
                    Self {
                        $($field: resolver.load::<$ty>($symbol),)+
                    }
                }
            }
        }
    };
}
